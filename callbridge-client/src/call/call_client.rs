use crate::call::call_agent::{AgentChannels, AgentCommand, CallAgent, Reply};
use crate::call::{CallEvent, CallState, CallTopic};
use crate::config::ClientConfig;
use crate::error::{CallError, SignalingError};
use crate::media::{MediaBackend, MediaDevice, TrackKind};
use crate::peer::PeerFactory;
use crate::signaling::{SignalingLink, WsSignaling};
use callbridge_core::{CallConfig, Emitter, ServerMessage, SessionId, Subscription};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

const COMMAND_BUFFER: usize = 32;

/// Handle to a running call agent.
///
/// Cheap to clone. The agent stops when every handle is dropped or when the relay connection
/// closes; after that every call operation returns [`CallError::AgentStopped`].
///
/// Event handlers run on the agent task and must not block.
#[derive(Clone)]
pub struct CallClient {
    commands: mpsc::Sender<AgentCommand>,
    events: Arc<Emitter<CallTopic, CallEvent>>,
    call_events: Arc<Emitter<CallTopic, CallEvent>>,
    media: Arc<MediaDevice>,
    state_rx: watch::Receiver<CallState>,
    id_rx: watch::Receiver<Option<SessionId>>,
}

impl CallClient {
    /// Starts an agent over an already open relay connection.
    pub fn spawn(
        config: ClientConfig,
        signaling: Arc<dyn SignalingLink>,
        inbound: mpsc::UnboundedReceiver<ServerMessage>,
        peers: Arc<dyn PeerFactory>,
        media_backend: Arc<dyn MediaBackend>,
    ) -> Self {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(CallState::Idle);
        let (id_tx, id_rx) = watch::channel(None);
        let events = Arc::new(Emitter::new());
        let call_events = Arc::new(Emitter::new());
        let media = Arc::new(MediaDevice::new(media_backend));

        let agent = CallAgent::new(
            config,
            signaling,
            inbound,
            peers,
            media.clone(),
            AgentChannels {
                commands,
                events: events.clone(),
                call_events: call_events.clone(),
                state_tx,
                id_tx,
            },
        );
        tokio::spawn(agent.run());

        Self {
            commands: commands_tx,
            events,
            call_events,
            media,
            state_rx,
            id_rx,
        }
    }

    /// Connects to `config.relay_url` over WebSocket and starts an agent on it.
    pub async fn connect(
        config: ClientConfig,
        peers: Arc<dyn PeerFactory>,
        media_backend: Arc<dyn MediaBackend>,
    ) -> Result<Self, SignalingError> {
        let (signaling, inbound) = WsSignaling::connect(&config.relay_url).await?;
        Ok(Self::spawn(
            config,
            Arc::new(signaling),
            inbound,
            peers,
            media_backend,
        ))
    }

    /// Dials `target`. Dialing the session that is currently ringing us answers it instead.
    pub async fn start_call(&self, target: SessionId, config: CallConfig) -> Result<(), CallError> {
        self.request(|reply| AgentCommand::Start {
            target,
            config,
            reply,
        })
        .await
    }

    pub async fn accept_call(&self, config: CallConfig) -> Result<(), CallError> {
        self.request(|reply| AgentCommand::Accept { config, reply })
            .await
    }

    pub async fn reject_call(&self) -> Result<(), CallError> {
        self.request(|reply| AgentCommand::Reject { reply }).await
    }

    /// Hangs up. Succeeds in every state.
    pub async fn end_call(&self) -> Result<(), CallError> {
        self.request(|reply| AgentCommand::End { reply }).await
    }

    async fn request<F>(&self, command: F) -> Result<(), CallError>
    where
        F: FnOnce(Reply) -> AgentCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CallError::AgentStopped)?;
        rx.await.map_err(|_| CallError::AgentStopped)?
    }

    pub fn state(&self) -> CallState {
        self.state_rx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.state_rx.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.id_rx.borrow().clone()
    }

    /// Waits until the relay has assigned an identifier.
    pub async fn registered(&self) -> Result<SessionId, CallError> {
        let mut rx = self.id_rx.clone();
        let id = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CallError::AgentStopped)?;
        id.clone().ok_or(CallError::AgentStopped)
    }

    pub fn subscribe<F>(&self, topic: CallTopic, handler: F) -> Subscription
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(topic, handler)
    }

    pub fn unsubscribe(&self, topic: CallTopic, subscription: Option<Subscription>) {
        self.events.unsubscribe(&topic, subscription);
    }

    /// Like [`CallClient::subscribe`], but the handler is dropped when the current call ends.
    pub fn subscribe_for_call<F>(&self, topic: CallTopic, handler: F) -> Subscription
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.call_events.subscribe(topic, handler)
    }

    pub fn toggle(&self, kind: TrackKind, on: Option<bool>) {
        self.media.toggle(kind, on);
    }

    pub fn media(&self) -> &Arc<MediaDevice> {
        &self.media
    }
}
