use callbridge_client::{CallClient, CallEvent, CallState, ClientConfig};
use callbridge_server::{RelayServer, ServerConfig};
use std::net::Ipv4Addr;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT, EventLog, MockMediaBackend, MockPeerFactory};

async fn wait_for(client: &CallClient, wanted: CallState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(EVENT_TIMEOUT, rx.wait_for(|s| *s == wanted))
        .await
        .expect("Timeout waiting for state")
        .expect("Agent stopped");
}

#[tokio::test]
async fn test_websocket_call() {
    init_tracing();

    let server_config = ServerConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        ..ServerConfig::default()
    };
    let server = RelayServer::bind(&server_config)
        .await
        .expect("Failed to bind relay");
    let addr = server.local_addr().expect("No local addr");
    tokio::spawn(server.run());

    let config = ClientConfig::with_relay_url(format!(
        "ws://{}{}",
        addr, server_config.relay_path
    ));

    let caller = CallClient::connect(
        config.clone(),
        MockPeerFactory::new(),
        MockMediaBackend::new(),
    )
    .await
    .expect("Caller failed to connect");
    let callee = CallClient::connect(config, MockPeerFactory::new(), MockMediaBackend::new())
        .await
        .expect("Callee failed to connect");
    let mut callee_events = EventLog::attach(&callee);

    caller.registered().await.expect("Caller not registered");
    let callee_id = callee.registered().await.expect("Callee not registered");

    caller
        .start_call(callee_id, Default::default())
        .await
        .expect("Start failed");
    callee_events
        .expect(EVENT_TIMEOUT, |e| matches!(e, CallEvent::IncomingCall(_)))
        .await
        .expect("Callee never rang");
    callee
        .accept_call(Default::default())
        .await
        .expect("Accept failed");

    wait_for(&caller, CallState::Connected).await;
    wait_for(&callee, CallState::Connected).await;

    caller.end_call().await.expect("End failed");
    wait_for(&callee, CallState::Idle).await;
}
