use callbridge_client::{CallEvent, CallState, CallTopic, EndReason};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT, MemoryRelay, TestPeer, establish_call};

#[tokio::test]
async fn test_hang_up_ends_both_sides() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut caller = TestPeer::join(&relay).await.expect("Caller failed");
    let mut callee = TestPeer::join(&relay).await.expect("Callee failed");
    establish_call(&mut caller, &mut callee)
        .await
        .expect("Call failed");

    caller.client.end_call().await.expect("End failed");

    let ended = callee
        .events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::Ended(_)))
        .await
        .expect("Callee never ended");
    assert!(matches!(ended, CallEvent::Ended(EndReason::RemoteHangup)));

    caller.wait_idle().await.expect("Caller not idle");
    callee.wait_idle().await.expect("Callee not idle");

    let caller_events = caller.events.drain();
    assert!(
        caller_events
            .iter()
            .any(|e| matches!(e, CallEvent::Ended(EndReason::LocalHangup)))
    );

    // Local media released and links closed on both sides.
    for peer in [&caller, &callee] {
        assert!(peer.media.tracks().iter().all(|t| t.is_stopped()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(peer.peers.links().iter().all(|l| l.is_closed()));
    }
}

#[tokio::test]
async fn test_end_call_from_idle() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut peer = TestPeer::join(&relay).await.expect("Peer failed");

    peer.client.end_call().await.expect("End from idle failed");
    peer.client.end_call().await.expect("Second end failed");

    assert_eq!(peer.client.state(), CallState::Idle);
    let ended = peer
        .events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::Ended(_)))
        .await
        .expect("No ended event");
    assert!(matches!(ended, CallEvent::Ended(EndReason::LocalHangup)));
}

#[tokio::test]
async fn test_late_messages_after_end_are_ignored() {
    init_tracing();

    let relay = MemoryRelay::new();
    let caller = TestPeer::join(&relay).await.expect("Caller failed");
    let mut callee = TestPeer::join(&relay).await.expect("Callee failed");

    caller
        .client
        .start_call(callee.id.clone(), Default::default())
        .await
        .expect("Start failed");
    callee
        .events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::IncomingCall(_)))
        .await
        .expect("Callee never rang");

    // Caller gives up before the callee answers; the callee's answer then arrives late.
    caller.client.end_call().await.expect("End failed");
    callee.wait_idle().await.expect("Callee not idle");
    caller.wait_idle().await.expect("Caller not idle");

    assert!(callee.client.accept_call(Default::default()).await.is_err());
    assert_eq!(caller.client.state(), CallState::Idle);
    assert_eq!(callee.client.state(), CallState::Idle);
}

#[tokio::test]
async fn test_call_subscriptions_cleared_on_end() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut caller = TestPeer::join(&relay).await.expect("Caller failed");
    let mut callee = TestPeer::join(&relay).await.expect("Callee failed");

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    caller
        .client
        .subscribe_for_call(CallTopic::StateChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    establish_call(&mut caller, &mut callee)
        .await
        .expect("Call failed");
    caller.client.end_call().await.expect("End failed");
    caller.wait_idle().await.expect("Caller not idle");
    let during_call = seen.load(Ordering::SeqCst);
    assert!(during_call >= 4);

    establish_call(&mut caller, &mut callee)
        .await
        .expect("Second call failed");
    assert_eq!(seen.load(Ordering::SeqCst), during_call);
}
