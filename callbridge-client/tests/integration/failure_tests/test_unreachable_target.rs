use callbridge_client::{CallError, CallEvent, CallState, EndReason};
use callbridge_core::SessionId;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT, MemoryRelay, TestPeer};

#[tokio::test]
async fn test_unreachable_target() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut caller = TestPeer::join(&relay).await.expect("Caller failed");

    caller
        .client
        .start_call(SessionId::from("nobody"), Default::default())
        .await
        .expect("Start failed");

    let ended = caller
        .events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::Ended(_)))
        .await
        .expect("Call never ended");
    assert!(matches!(ended, CallEvent::Ended(EndReason::PeerUnreachable)));
    caller.wait_idle().await.expect("Caller not idle");
    assert!(caller.media.tracks().iter().all(|t| t.is_stopped()));
}

#[tokio::test]
async fn test_self_call_rejected() {
    init_tracing();

    let relay = MemoryRelay::new();
    let peer = TestPeer::join(&relay).await.expect("Peer failed");

    assert_eq!(
        peer.client
            .start_call(peer.id.clone(), Default::default())
            .await,
        Err(CallError::SelfCall(peer.id.clone()))
    );
    assert_eq!(peer.client.state(), CallState::Idle);
}
