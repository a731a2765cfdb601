use crate::call::{
    CallAction, CallEvent, CallFailure, CallId, CallRole, CallSession, CallState, CallTopic,
    EndReason,
};
use crate::config::{ClientConfig, TimeoutKind};
use crate::error::{CallError, MediaError};
use crate::media::{LocalStream, MediaConstraints, MediaDevice, TrackKind};
use crate::peer::{PeerEvent, PeerEventSink, PeerFactory, PeerLink};
use crate::signaling::SignalingLink;
use callbridge_core::{
    CallConfig, ClientMessage, Emitter, IceCandidate, IceServerConfig, InboundCall, ServerMessage,
    SessionDescription, SessionId,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub(crate) type Reply = oneshot::Sender<Result<(), CallError>>;

pub(crate) enum AgentCommand {
    Start {
        target: SessionId,
        config: CallConfig,
        reply: Reply,
    },
    Accept {
        config: CallConfig,
        reply: Reply,
    },
    Reject {
        reply: Reply,
    },
    End {
        reply: Reply,
    },
}

#[derive(Debug)]
pub(crate) enum PrepareError {
    Media(MediaError),
    Peer(String),
}

/// Results of work the agent started, tagged with the call that started it.
pub(crate) enum AgentInput {
    Prepared {
        call_id: CallId,
        result: Result<(Arc<dyn PeerLink>, LocalStream), PrepareError>,
    },
    RemoteApplied {
        call_id: CallId,
        result: Result<(), String>,
    },
    LocalDescription {
        call_id: CallId,
        result: Result<SessionDescription, String>,
    },
    Peer {
        call_id: CallId,
        event: PeerEvent,
    },
}

impl AgentInput {
    fn call_id(&self) -> CallId {
        match self {
            Self::Prepared { call_id, .. }
            | Self::RemoteApplied { call_id, .. }
            | Self::LocalDescription { call_id, .. }
            | Self::Peer { call_id, .. } => *call_id,
        }
    }
}

enum PeerOp {
    CreateOffer,
    AcceptOffer(SessionDescription),
    ApplyAnswer(SessionDescription),
    AddCandidate(Option<IceCandidate>),
}

/// Serializes operations on one peer link. Dropping the handle closes the link.
struct PeerHandle {
    ops: mpsc::UnboundedSender<PeerOp>,
    _close: oneshot::Sender<()>,
}

impl PeerHandle {
    fn spawn(
        call_id: CallId,
        link: Arc<dyn PeerLink>,
        tx: mpsc::UnboundedSender<AgentInput>,
    ) -> Self {
        let (ops, mut ops_rx) = mpsc::unbounded_channel();
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = &mut close_rx => break,

                    op = ops_rx.recv() => match op {
                        Some(op) => run_peer_op(call_id, link.as_ref(), op, &tx).await,
                        None => break,
                    },
                }
            }

            if let Err(e) = link.close().await {
                warn!("Failed to close peer link of {}: {}", call_id, e);
            }
            debug!("Peer link of {} closed", call_id);
        });

        Self {
            ops,
            _close: close_tx,
        }
    }
}

async fn run_peer_op(
    call_id: CallId,
    link: &dyn PeerLink,
    op: PeerOp,
    tx: &mpsc::UnboundedSender<AgentInput>,
) {
    let report = |input: AgentInput| {
        let _ = tx.send(input);
    };

    match op {
        PeerOp::CreateOffer => {
            let result = link.create_offer().await.map_err(|e| e.to_string());
            report(AgentInput::LocalDescription { call_id, result });
        }
        PeerOp::AcceptOffer(offer) => {
            if let Err(e) = link.set_remote_description(offer).await {
                report(AgentInput::RemoteApplied {
                    call_id,
                    result: Err(e.to_string()),
                });
                return;
            }
            report(AgentInput::RemoteApplied {
                call_id,
                result: Ok(()),
            });
            let result = link.create_answer().await.map_err(|e| e.to_string());
            report(AgentInput::LocalDescription { call_id, result });
        }
        PeerOp::ApplyAnswer(answer) => {
            let result = link
                .set_remote_description(answer)
                .await
                .map_err(|e| e.to_string());
            report(AgentInput::RemoteApplied { call_id, result });
        }
        PeerOp::AddCandidate(candidate) => {
            if let Err(e) = link.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate for {}: {}", call_id, e);
            }
        }
    }
}

async fn prepare_call(
    peers: Arc<dyn PeerFactory>,
    media: Arc<MediaDevice>,
    ice_servers: Vec<IceServerConfig>,
    constraints: MediaConstraints,
    config: CallConfig,
    sink: PeerEventSink,
) -> Result<(Arc<dyn PeerLink>, LocalStream), PrepareError> {
    let link = peers
        .create(&ice_servers, sink)
        .await
        .map_err(|e| PrepareError::Peer(e.to_string()))?;

    let stream = match media.acquire(&constraints).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = link.close().await;
            return Err(PrepareError::Media(e));
        }
    };

    media.toggle(TrackKind::Audio, Some(config.audio));
    media.toggle(TrackKind::Video, Some(config.video));

    if let Err(e) = link.attach_local_stream(&stream).await {
        let _ = link.close().await;
        return Err(PrepareError::Peer(e.to_string()));
    }

    Ok((link, stream))
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct ActiveCall {
    session: CallSession,
    peer: Option<PeerHandle>,
}

pub(crate) struct AgentChannels {
    pub commands: mpsc::Receiver<AgentCommand>,
    pub events: Arc<Emitter<CallTopic, CallEvent>>,
    pub call_events: Arc<Emitter<CallTopic, CallEvent>>,
    pub state_tx: watch::Sender<CallState>,
    pub id_tx: watch::Sender<Option<SessionId>>,
}

/// Owns the relay connection and at most one [`CallSession`], and carries out the session's
/// actions.
pub(crate) struct CallAgent {
    config: ClientConfig,
    signaling: Arc<dyn SignalingLink>,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    commands: mpsc::Receiver<AgentCommand>,
    internal_tx: mpsc::UnboundedSender<AgentInput>,
    internal_rx: mpsc::UnboundedReceiver<AgentInput>,
    peers: Arc<dyn PeerFactory>,
    media: Arc<MediaDevice>,
    events: Arc<Emitter<CallTopic, CallEvent>>,
    call_events: Arc<Emitter<CallTopic, CallEvent>>,
    state_tx: watch::Sender<CallState>,
    id_tx: watch::Sender<Option<SessionId>>,
    session_id: Option<SessionId>,
    active: Option<ActiveCall>,
    deadline: Option<Instant>,
    armed: Option<(CallId, TimeoutKind)>,
}

impl CallAgent {
    pub(crate) fn new(
        config: ClientConfig,
        signaling: Arc<dyn SignalingLink>,
        inbound: mpsc::UnboundedReceiver<ServerMessage>,
        peers: Arc<dyn PeerFactory>,
        media: Arc<MediaDevice>,
        channels: AgentChannels,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        Self {
            config,
            signaling,
            inbound,
            commands: channels.commands,
            internal_tx,
            internal_rx,
            peers,
            media,
            events: channels.events,
            call_events: channels.call_events,
            state_tx: channels.state_tx,
            id_tx: channels.id_tx,
            session_id: None,
            active: None,
            deadline: None,
            armed: None,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Call agent started");
        self.send(ClientMessage::Init).await;

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        info!("Client handle dropped. Shutting down call agent.");
                        break;
                    }
                },

                msg = self.inbound.recv() => match msg {
                    Some(msg) => self.handle_server_message(msg).await,
                    None => {
                        warn!("Relay connection lost");
                        self.drive(CallSession::on_transport_lost).await;
                        break;
                    }
                },

                Some(input) = self.internal_rx.recv() => self.handle_internal(input).await,

                _ = sleep_until_opt(self.deadline) => {
                    self.deadline = None;
                    self.drive(CallSession::on_timeout).await;
                }
            }
        }

        self.drive(CallSession::hang_up).await;
        self.id_tx.send_replace(None);
        info!("Call agent finished");
    }

    async fn handle_command(&mut self, cmd: AgentCommand) {
        match cmd {
            AgentCommand::Start {
                target,
                config,
                reply,
            } => {
                let result = self.start_call(target, config).await;
                let _ = reply.send(result);
            }

            AgentCommand::Accept { config, reply } => {
                let result = match self.active.as_mut() {
                    Some(active) => active.session.accept(config),
                    None => Err(CallError::NotRinging),
                };
                let _ = reply.send(self.apply(result).await);
            }

            AgentCommand::Reject { reply } => {
                let result = match self.active.as_mut() {
                    Some(active) => active.session.reject(),
                    None => Err(CallError::NotRinging),
                };
                let _ = reply.send(self.apply(result).await);
            }

            AgentCommand::End { reply } => {
                if self.active.is_some() {
                    self.drive(CallSession::hang_up).await;
                } else {
                    debug!("End requested with no active call");
                    self.emit(CallEvent::Ended(EndReason::LocalHangup));
                }
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn start_call(&mut self, target: SessionId, config: CallConfig) -> Result<(), CallError> {
        let own = self.session_id.as_ref().ok_or(CallError::NotRegistered)?;
        if *own == target {
            return Err(CallError::SelfCall(target));
        }

        if let Some(active) = self.active.as_mut() {
            // Dialing whoever is ringing us picks the call up.
            let ringing_from_target = matches!(
                active.session.state(),
                CallState::Ringing { from } if *from == target
            );
            if !ringing_from_target {
                return Err(CallError::CallInProgress);
            }
            let result = active.session.accept(config);
            return self.apply(result).await;
        }

        let (session, actions) = CallSession::outgoing(target, config);
        self.active = Some(ActiveCall {
            session,
            peer: None,
        });
        self.execute(actions).await;
        self.settle();
        Ok(())
    }

    async fn apply(
        &mut self,
        result: Result<Vec<CallAction>, CallError>,
    ) -> Result<(), CallError> {
        let actions = result?;
        self.execute(actions).await;
        self.settle();
        Ok(())
    }

    async fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Init { id } => {
                info!("Registered with relay as {}", id);
                self.session_id = Some(id.clone());
                self.id_tx.send_replace(Some(id.clone()));
                self.emit(CallEvent::Registered(id));
            }

            ServerMessage::Error { message } => {
                warn!("Relay refused registration: {}", message);
                self.emit(CallEvent::Error(CallFailure::Registration(message)));
            }

            ServerMessage::Request { from } => {
                if let Some(active) = &self.active {
                    if *active.session.remote() == from {
                        // Both sides dialed each other. The lower id answers, the other keeps ringing.
                        let unanswered = active.session.role() == CallRole::Caller
                            && matches!(
                                active.session.state(),
                                CallState::AwaitingLocalMedia | CallState::Requesting
                            );
                        let crossed = unanswered
                            && self.session_id.as_ref().is_some_and(|own| *own < from);
                        if crossed {
                            info!("Crossed call with {}, answering theirs", from);
                            self.drive(CallSession::yield_to_remote).await;
                        } else {
                            debug!("Duplicate request from {}", from);
                        }
                        return;
                    }
                    info!("Busy, declining request from {}", from);
                    self.send(ClientMessage::End { to: from }).await;
                    return;
                }

                let (session, actions) = CallSession::incoming(from);
                self.active = Some(ActiveCall {
                    session,
                    peer: None,
                });
                self.execute(actions).await;
                self.settle();
            }

            ServerMessage::Call(InboundCall { from, negotiation }) => {
                if self.active.is_none() {
                    warn!("Dropping negotiation from {} with no active call", from);
                    return;
                }
                self.drive(|session| session.on_negotiation(&from, &negotiation))
                    .await;
            }

            ServerMessage::Failed => self.drive(CallSession::on_unreachable).await,

            ServerMessage::End { from } => {
                let from_remote = self
                    .active
                    .as_ref()
                    .is_some_and(|active| *active.session.remote() == from);
                if !from_remote {
                    debug!("Ignoring end from {}, not in a call with it", from);
                    return;
                }
                self.drive(CallSession::on_remote_end).await;
            }
        }
    }

    async fn handle_internal(&mut self, input: AgentInput) {
        let call_id = input.call_id();
        let current = self.active.as_ref().map(|active| active.session.id());
        if current != Some(call_id) {
            debug!("Dropping late result of {}", call_id);
            if let AgentInput::Prepared {
                result: Ok((link, _)),
                ..
            } = input
            {
                tokio::spawn(async move {
                    let _ = link.close().await;
                });
            }
            return;
        }

        match input {
            AgentInput::Prepared { result, .. } => match result {
                Ok((link, stream)) => {
                    if let Some(active) = self.active.as_mut() {
                        active.peer = Some(PeerHandle::spawn(
                            call_id,
                            link,
                            self.internal_tx.clone(),
                        ));
                    }
                    self.drive(|session| session.on_local_media_ready(stream))
                        .await;
                }
                Err(PrepareError::Media(e)) => {
                    self.drive(|session| session.on_media_failed(e)).await;
                }
                Err(PrepareError::Peer(message)) => {
                    self.drive(|session| session.on_peer_failed(message)).await;
                }
            },

            AgentInput::RemoteApplied { result, .. } => match result {
                Ok(()) => self.drive(CallSession::on_remote_description_applied).await,
                Err(message) => {
                    self.drive(|session| session.on_negotiation_error(message))
                        .await
                }
            },

            AgentInput::LocalDescription { result, .. } => match result {
                Ok(desc) => {
                    self.drive(|session| session.on_local_description(desc))
                        .await
                }
                Err(message) => {
                    self.drive(|session| session.on_negotiation_error(message))
                        .await
                }
            },

            AgentInput::Peer { event, .. } => match event {
                PeerEvent::LocalCandidate(candidate) => {
                    self.drive(|session| session.on_local_candidate(candidate))
                        .await
                }
                PeerEvent::RemoteStream(stream) => {
                    self.drive(|session| session.on_remote_stream(stream))
                        .await
                }
                PeerEvent::Failed(message) => {
                    self.drive(|session| session.on_peer_failed(message))
                        .await
                }
            },
        }
    }

    /// Feeds one input to the active session, if any, and carries out what it asks for.
    async fn drive<F>(&mut self, input: F)
    where
        F: FnOnce(&mut CallSession) -> Vec<CallAction>,
    {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let actions = input(&mut active.session);
        self.execute(actions).await;
        self.settle();
    }

    async fn execute(&mut self, actions: Vec<CallAction>) {
        for action in actions {
            match action {
                CallAction::PrepareMedia(config) => self.prepare(config),
                CallAction::Send(msg) => self.send(msg).await,
                CallAction::CreateOffer => self.peer_op(PeerOp::CreateOffer),
                CallAction::AcceptOffer(offer) => self.peer_op(PeerOp::AcceptOffer(offer)),
                CallAction::ApplyAnswer(answer) => self.peer_op(PeerOp::ApplyAnswer(answer)),
                CallAction::AddCandidate(candidate) => {
                    self.peer_op(PeerOp::AddCandidate(candidate))
                }
                CallAction::Emit(event) => self.emit(event),
                CallAction::Teardown => {
                    if let Some(active) = self.active.as_mut() {
                        active.peer = None;
                    }
                    self.media.release();
                }
            }
        }
    }

    fn prepare(&self, config: CallConfig) {
        let Some(active) = &self.active else {
            return;
        };
        let call_id = active.session.id();
        let sink = PeerEventSink::new(call_id, self.internal_tx.clone());
        let peers = self.peers.clone();
        let media = self.media.clone();
        let ice_servers = self.config.ice_servers.clone();
        let constraints = self.config.constraints.clone();
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = prepare_call(peers, media, ice_servers, constraints, config, sink).await;
            let _ = tx.send(AgentInput::Prepared { call_id, result });
        });
    }

    fn peer_op(&self, op: PeerOp) {
        let Some(peer) = self.active.as_ref().and_then(|active| active.peer.as_ref()) else {
            warn!("No peer link for negotiation step");
            return;
        };
        if peer.ops.send(op).is_err() {
            warn!("Peer link worker has stopped");
        }
    }

    async fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.signaling.send(msg).await {
            error!("Failed to send to relay: {}", e);
        }
    }

    fn emit(&self, event: CallEvent) {
        if let CallEvent::StateChanged(state) = &event {
            self.state_tx.send_replace(state.clone());
        }
        let topic = event.topic();
        self.call_events.publish(&topic, &event);
        self.events.publish(&topic, &event);
    }

    /// Drops a finished session and re-arms the phase timer.
    fn settle(&mut self) {
        let finished = self
            .active
            .as_ref()
            .is_some_and(|active| active.session.is_finished());

        if finished {
            self.active = None;
            if !self.state_tx.borrow().is_idle() {
                self.emit(CallEvent::StateChanged(CallState::Idle));
            }
            self.call_events.clear();
        }

        let wanted = self.active.as_ref().and_then(|active| {
            active
                .session
                .timeout_kind()
                .map(|kind| (active.session.id(), kind))
        });
        if wanted == self.armed {
            return;
        }
        self.armed = wanted;
        self.deadline = wanted
            .and_then(|(_, kind)| self.config.timeout_for(kind))
            .map(|timeout| Instant::now() + timeout);
    }
}
