use super::{MemoryLink, MemoryRelay, MockMediaBackend, MockPeerFactory};
use anyhow::{Context, Result};
use callbridge_client::{CallClient, CallEvent, CallState, CallTopic, ClientConfig};
use callbridge_core::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to listen before concluding nothing was published.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(300);

const ALL_TOPICS: [CallTopic; 7] = [
    CallTopic::Registered,
    CallTopic::IncomingCall,
    CallTopic::StateChanged,
    CallTopic::LocalStream,
    CallTopic::RemoteStream,
    CallTopic::Ended,
    CallTopic::Error,
];

/// Records every event a client publishes, in order.
pub struct EventLog {
    rx: mpsc::UnboundedReceiver<CallEvent>,
}

impl EventLog {
    pub fn attach(client: &CallClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for topic in ALL_TOPICS {
            let tx = tx.clone();
            client.subscribe(topic, move |event| {
                let _ = tx.send(event.clone());
            });
        }
        Self { rx }
    }

    /// Skips events until one matches.
    pub async fn expect<F>(&mut self, within: Duration, mut predicate: F) -> Result<CallEvent>
    where
        F: FnMut(&CallEvent) -> bool,
    {
        tokio::time::timeout(within, async {
            while let Some(event) = self.rx.recv().await {
                if predicate(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .context("Timeout waiting for event")?
        .context("Client stopped publishing")
    }

    /// Everything published so far.
    pub fn drain(&mut self) -> Vec<CallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub struct TestPeer {
    pub client: CallClient,
    pub id: SessionId,
    pub link: Arc<MemoryLink>,
    pub peers: Arc<MockPeerFactory>,
    pub media: Arc<MockMediaBackend>,
    pub events: EventLog,
}

impl TestPeer {
    pub async fn join(relay: &MemoryRelay) -> Result<Self> {
        Self::join_with(relay, ClientConfig::default(), MockMediaBackend::new()).await
    }

    pub async fn join_with(
        relay: &MemoryRelay,
        config: ClientConfig,
        media: Arc<MockMediaBackend>,
    ) -> Result<Self> {
        let (link, inbound) = relay.connect();
        let peers = MockPeerFactory::new();
        let client = CallClient::spawn(config, link.clone(), inbound, peers.clone(), media.clone());
        let events = EventLog::attach(&client);

        let id = tokio::time::timeout(EVENT_TIMEOUT, client.registered())
            .await
            .context("Timeout waiting for registration")??;
        tracing::debug!("[TestPeer] registered as {}", id);

        Ok(Self {
            client,
            id,
            link,
            peers,
            media,
            events,
        })
    }

    pub async fn wait_for_state<F>(&self, within: Duration, predicate: F) -> Result<CallState>
    where
        F: FnMut(&CallState) -> bool,
    {
        let mut rx = self.client.watch_state();
        let state = tokio::time::timeout(within, rx.wait_for(predicate))
            .await
            .context("Timeout waiting for state")??;
        Ok(state.clone())
    }

    pub async fn wait_connected(&self) -> Result<()> {
        self.wait_for_state(EVENT_TIMEOUT, |s| *s == CallState::Connected)
            .await
            .map(|_| ())
    }

    pub async fn wait_idle(&self) -> Result<()> {
        self.wait_for_state(EVENT_TIMEOUT, CallState::is_idle)
            .await
            .map(|_| ())
    }
}

/// Brings `caller` and `callee` to Connected.
pub async fn establish_call(caller: &mut TestPeer, callee: &mut TestPeer) -> Result<()> {
    caller
        .client
        .start_call(callee.id.clone(), Default::default())
        .await?;
    callee
        .wait_for_state(EVENT_TIMEOUT, |s| matches!(s, CallState::Ringing { .. }))
        .await?;
    callee.client.accept_call(Default::default()).await?;

    caller.wait_connected().await?;
    callee.wait_connected().await?;
    Ok(())
}
