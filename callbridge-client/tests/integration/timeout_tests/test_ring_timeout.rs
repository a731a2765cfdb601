use callbridge_client::{CallEvent, CallState, ClientConfig, EndReason};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT, MemoryRelay, MockMediaBackend, TestPeer};

#[tokio::test(start_paused = true)]
async fn test_unanswered_call_times_out() {
    init_tracing();

    let relay = MemoryRelay::new();
    let config = ClientConfig {
        ring_timeout: Some(Duration::from_secs(45)),
        ..ClientConfig::default()
    };
    let mut caller = TestPeer::join_with(&relay, config, MockMediaBackend::new())
        .await
        .expect("Caller failed");
    // The callee would ring forever on its own.
    let callee_config = ClientConfig {
        ring_timeout: None,
        ..ClientConfig::default()
    };
    let mut callee = TestPeer::join_with(&relay, callee_config, MockMediaBackend::new())
        .await
        .expect("Callee failed");

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

    let ended = caller
        .events
        .expect(Duration::from_secs(60), |e| matches!(e, CallEvent::Ended(_)))
        .await
        .expect("Caller never timed out");
    assert!(matches!(ended, CallEvent::Ended(EndReason::RingTimeout)));

    // The callee stops ringing too.
    let ended = callee
        .events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::Ended(_)))
        .await
        .expect("Callee kept ringing");
    assert!(matches!(ended, CallEvent::Ended(EndReason::RemoteHangup)));
    assert_eq!(callee.client.state(), CallState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_answered_call_does_not_time_out() {
    init_tracing();

    let relay = MemoryRelay::new();
    let config = ClientConfig {
        ring_timeout: Some(Duration::from_secs(10)),
        negotiation_timeout: Some(Duration::from_secs(10)),
        ..ClientConfig::default()
    };
    let mut caller = TestPeer::join_with(&relay, config.clone(), MockMediaBackend::new())
        .await
        .expect("Caller failed");
    let mut callee = TestPeer::join_with(&relay, config, MockMediaBackend::new())
        .await
        .expect("Callee failed");
    crate::utils::establish_call(&mut caller, &mut callee)
        .await
        .expect("Call failed");

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(caller.client.state(), CallState::Connected);
    assert_eq!(callee.client.state(), CallState::Connected);
}
