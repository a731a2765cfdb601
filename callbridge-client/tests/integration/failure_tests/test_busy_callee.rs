use callbridge_client::{CallError, CallEvent, CallState, EndReason};

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT, MemoryRelay, TestPeer, establish_call};

#[tokio::test]
async fn test_busy_callee_declines() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut alice = TestPeer::join(&relay).await.expect("Alice failed");
    let mut bob = TestPeer::join(&relay).await.expect("Bob failed");
    let mut carol = TestPeer::join(&relay).await.expect("Carol failed");
    establish_call(&mut alice, &mut bob)
        .await
        .expect("Call failed");
    bob.events.drain();

    carol
        .client
        .start_call(bob.id.clone(), Default::default())
        .await
        .expect("Start failed");

    let ended = carol
        .events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::Ended(_)))
        .await
        .expect("Carol never ended");
    assert!(matches!(ended, CallEvent::Ended(EndReason::RemoteHangup)));

    // The existing call is untouched.
    assert_eq!(alice.client.state(), CallState::Connected);
    assert_eq!(bob.client.state(), CallState::Connected);
    assert!(
        !bob.events
            .drain()
            .iter()
            .any(|e| matches!(e, CallEvent::IncomingCall(_)))
    );
}

#[tokio::test]
async fn test_second_call_rejected() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut alice = TestPeer::join(&relay).await.expect("Alice failed");
    let mut bob = TestPeer::join(&relay).await.expect("Bob failed");
    let carol = TestPeer::join(&relay).await.expect("Carol failed");
    establish_call(&mut alice, &mut bob)
        .await
        .expect("Call failed");

    assert_eq!(
        alice
            .client
            .start_call(carol.id.clone(), Default::default())
            .await,
        Err(CallError::CallInProgress)
    );
    assert_eq!(alice.client.state(), CallState::Connected);
}
