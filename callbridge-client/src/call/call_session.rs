use crate::call::{CallAction, CallEvent, CallFailure, CallId, CallRole, CallState, EndReason};
use crate::config::TimeoutKind;
use crate::error::{CallError, MediaError};
use crate::media::LocalStream;
use crate::peer::RemoteStream;
use callbridge_core::{
    CallConfig, ClientMessage, IceCandidate, Negotiation, NegotiationPayload, SdpKind,
    SessionDescription, SessionId,
};
use tracing::{debug, info, warn};

/// One call attempt, from the first ring or dial until it ends.
///
/// The session does no I/O. Every input returns the actions the caller has to perform, in
/// order; results of those actions are fed back through the `on_*` methods. Once
/// [`CallSession::is_finished`] the session ignores all further input and should be dropped.
#[derive(Debug)]
pub struct CallSession {
    id: CallId,
    state: CallState,
    role: CallRole,
    remote: SessionId,
    config: CallConfig,
    /// The remote side knows about this call and must hear about its end.
    remote_aware: bool,
    answer_seen: bool,
    remote_applied: bool,
    pending_candidates: Vec<Option<IceCandidate>>,
    pending_remote_stream: Option<RemoteStream>,
    end_reason: Option<EndReason>,
}

impl CallSession {
    fn new(role: CallRole, remote: SessionId, state: CallState) -> Self {
        Self {
            id: CallId::next(),
            state,
            role,
            remote,
            config: CallConfig::default(),
            remote_aware: false,
            answer_seen: false,
            remote_applied: false,
            pending_candidates: Vec::new(),
            pending_remote_stream: None,
            end_reason: None,
        }
    }

    /// Dials `target`. Local media is prepared before the target is rung.
    pub fn outgoing(target: SessionId, config: CallConfig) -> (Self, Vec<CallAction>) {
        let mut session = Self::new(CallRole::Caller, target, CallState::Idle);
        session.config = config;
        let mut actions = Vec::new();
        session.transition(CallState::AwaitingLocalMedia, &mut actions);
        actions.push(CallAction::PrepareMedia(config));
        info!("{} dialing {}", session.id, session.remote);
        (session, actions)
    }

    /// An inbound `request` rang this client.
    pub fn incoming(from: SessionId) -> (Self, Vec<CallAction>) {
        let mut session = Self::new(CallRole::Callee, from.clone(), CallState::Idle);
        session.remote_aware = true;
        let mut actions = Vec::new();
        session.transition(CallState::Ringing { from: from.clone() }, &mut actions);
        actions.push(CallAction::Emit(CallEvent::IncomingCall(from)));
        info!("{} ringing from {}", session.id, session.remote);
        (session, actions)
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn role(&self) -> CallRole {
        self.role
    }

    pub fn remote(&self) -> &SessionId {
        &self.remote
    }

    pub fn config(&self) -> CallConfig {
        self.config
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, CallState::Idle | CallState::Ended)
    }

    /// Timer guarding the current phase, if any.
    pub fn timeout_kind(&self) -> Option<TimeoutKind> {
        match self.state {
            CallState::Ringing { .. } | CallState::Requesting => Some(TimeoutKind::Ring),
            CallState::Negotiating { .. } => Some(TimeoutKind::Negotiation),
            _ => None,
        }
    }

    pub fn accept(&mut self, config: CallConfig) -> Result<Vec<CallAction>, CallError> {
        if !matches!(self.state, CallState::Ringing { .. }) {
            return Err(CallError::CallInProgress);
        }
        self.config = config;
        let mut actions = Vec::new();
        self.transition(CallState::AwaitingLocalMedia, &mut actions);
        actions.push(CallAction::PrepareMedia(config));
        info!("{} accepted", self.id);
        Ok(actions)
    }

    /// Declines a ringing call. No media is touched.
    pub fn reject(&mut self) -> Result<Vec<CallAction>, CallError> {
        if !matches!(self.state, CallState::Ringing { .. }) {
            return Err(CallError::NotRinging);
        }
        let mut actions = vec![CallAction::Send(ClientMessage::End {
            to: self.remote.clone(),
        })];
        self.remote_aware = false;
        self.transition(CallState::Idle, &mut actions);
        info!("{} rejected", self.id);
        Ok(actions)
    }

    /// The remote side dialed us while this outgoing call was still unanswered. This side drops
    /// its own ring and answers, producing the offer as a callee would.
    pub fn yield_to_remote(&mut self) -> Vec<CallAction> {
        if self.role != CallRole::Caller {
            return Vec::new();
        }
        match self.state {
            CallState::AwaitingLocalMedia => {
                // Media is still on its way; `on_local_media_ready` takes the callee path.
                self.role = CallRole::Callee;
                self.remote_aware = true;
                info!("{} answering crossed call from {}", self.id, self.remote);
                Vec::new()
            }
            CallState::Requesting => {
                self.role = CallRole::Callee;
                let mut actions = Vec::new();
                self.transition(
                    CallState::Negotiating {
                        role: CallRole::Callee,
                    },
                    &mut actions,
                );
                actions.push(CallAction::CreateOffer);
                info!("{} answering crossed call from {}", self.id, self.remote);
                actions
            }
            _ => Vec::new(),
        }
    }

    pub fn hang_up(&mut self) -> Vec<CallAction> {
        self.finish(EndReason::LocalHangup)
    }

    pub fn on_local_media_ready(&mut self, stream: LocalStream) -> Vec<CallAction> {
        if self.state != CallState::AwaitingLocalMedia {
            debug!("{} ignoring local media in state {}", self.id, self.state);
            return Vec::new();
        }

        let mut actions = vec![CallAction::Emit(CallEvent::LocalStream(stream))];
        match self.role {
            CallRole::Caller => {
                self.transition(CallState::Requesting, &mut actions);
                actions.push(CallAction::Send(ClientMessage::Request {
                    to: self.remote.clone(),
                }));
                self.remote_aware = true;
            }
            CallRole::Callee => {
                self.transition(
                    CallState::Negotiating {
                        role: CallRole::Callee,
                    },
                    &mut actions,
                );
                actions.push(CallAction::CreateOffer);
            }
        }
        actions
    }

    pub fn on_media_failed(&mut self, error: MediaError) -> Vec<CallAction> {
        if self.is_finished() {
            return Vec::new();
        }
        let mut actions = vec![CallAction::Emit(CallEvent::Error(CallFailure::Media(
            error.clone(),
        )))];
        actions.extend(self.finish(EndReason::MediaUnavailable(error)));
        actions
    }

    /// The local offer or answer is installed and has to reach the remote side.
    pub fn on_local_description(&mut self, desc: SessionDescription) -> Vec<CallAction> {
        if !matches!(
            self.state,
            CallState::Negotiating { .. } | CallState::Connected
        ) {
            return Vec::new();
        }
        match Negotiation::description(&desc) {
            Ok(negotiation) => vec![CallAction::Send(ClientMessage::call(
                self.remote.clone(),
                negotiation,
            ))],
            Err(e) => self.on_negotiation_error(e.to_string()),
        }
    }

    pub fn on_remote_description_applied(&mut self) -> Vec<CallAction> {
        if self.is_finished() || self.remote_applied {
            return Vec::new();
        }
        self.remote_applied = true;

        let mut actions: Vec<CallAction> = self
            .pending_candidates
            .drain(..)
            .map(CallAction::AddCandidate)
            .collect();

        if let Some(stream) = self.pending_remote_stream.take() {
            actions.extend(self.on_remote_stream(stream));
        }
        actions
    }

    /// A peer operation failed. The call stays where it is; the negotiation timer bounds the stall.
    pub fn on_negotiation_error(&mut self, message: String) -> Vec<CallAction> {
        if self.is_finished() {
            return Vec::new();
        }
        warn!("{} negotiation error: {}", self.id, message);
        vec![CallAction::Emit(CallEvent::Error(CallFailure::Negotiation(
            message,
        )))]
    }

    /// Relayed `call` message.
    pub fn on_negotiation(
        &mut self,
        from: &SessionId,
        negotiation: &Negotiation,
    ) -> Vec<CallAction> {
        if self.is_finished() {
            return Vec::new();
        }
        if *from != self.remote {
            warn!("{} dropping negotiation from unexpected {}", self.id, from);
            return Vec::new();
        }

        let payload = match negotiation.decode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{} dropping negotiation message: {}", self.id, e);
                return Vec::new();
            }
        };

        match payload {
            NegotiationPayload::Description(desc) => self.on_remote_description(desc),
            NegotiationPayload::Candidate(candidate) => self.on_remote_candidate(candidate),
        }
    }

    fn on_remote_description(&mut self, desc: SessionDescription) -> Vec<CallAction> {
        match (&self.state, desc.kind) {
            (CallState::Requesting, SdpKind::Offer) => {
                let mut actions = Vec::new();
                self.transition(
                    CallState::Negotiating {
                        role: CallRole::Caller,
                    },
                    &mut actions,
                );
                actions.push(CallAction::AcceptOffer(desc));
                actions
            }
            (
                CallState::Negotiating {
                    role: CallRole::Callee,
                },
                SdpKind::Answer,
            ) if !self.answer_seen => {
                self.answer_seen = true;
                vec![CallAction::ApplyAnswer(desc)]
            }
            (state, kind) => {
                warn!("{} dropping {:?} in state {}", self.id, kind, state);
                Vec::new()
            }
        }
    }

    fn on_remote_candidate(&mut self, candidate: Option<IceCandidate>) -> Vec<CallAction> {
        match self.state {
            CallState::Requesting | CallState::Negotiating { .. } | CallState::Connected => {
                if self.remote_applied {
                    vec![CallAction::AddCandidate(candidate)]
                } else {
                    self.pending_candidates.push(candidate);
                    Vec::new()
                }
            }
            _ => {
                warn!("{} dropping candidate in state {}", self.id, self.state);
                Vec::new()
            }
        }
    }

    pub fn on_local_candidate(&mut self, candidate: Option<IceCandidate>) -> Vec<CallAction> {
        if !matches!(
            self.state,
            CallState::Requesting | CallState::Negotiating { .. } | CallState::Connected
        ) {
            return Vec::new();
        }
        match Negotiation::candidate(candidate.as_ref()) {
            Ok(negotiation) => vec![CallAction::Send(ClientMessage::call(
                self.remote.clone(),
                negotiation,
            ))],
            Err(e) => self.on_negotiation_error(e.to_string()),
        }
    }

    pub fn on_remote_stream(&mut self, stream: RemoteStream) -> Vec<CallAction> {
        match self.state {
            CallState::Negotiating { .. } if self.remote_applied => {
                let mut actions = Vec::new();
                self.transition(CallState::Connected, &mut actions);
                actions.push(CallAction::Emit(CallEvent::RemoteStream(stream)));
                info!("{} connected with {}", self.id, self.remote);
                actions
            }
            CallState::Negotiating { .. } => {
                self.pending_remote_stream = Some(stream);
                Vec::new()
            }
            CallState::Connected => vec![CallAction::Emit(CallEvent::RemoteStream(stream))],
            _ => Vec::new(),
        }
    }

    pub fn on_peer_failed(&mut self, message: String) -> Vec<CallAction> {
        self.finish(EndReason::PeerFailed(message))
    }

    /// The relay delivered `end`.
    pub fn on_remote_end(&mut self) -> Vec<CallAction> {
        self.finish(EndReason::RemoteHangup)
    }

    /// The relay answered `failed` to something this session sent.
    pub fn on_unreachable(&mut self) -> Vec<CallAction> {
        match self.state {
            CallState::Requesting | CallState::Negotiating { .. } | CallState::Connected => {
                self.finish(EndReason::PeerUnreachable)
            }
            _ => {
                debug!("{} ignoring failed in state {}", self.id, self.state);
                Vec::new()
            }
        }
    }

    pub fn on_transport_lost(&mut self) -> Vec<CallAction> {
        self.finish(EndReason::TransportLost)
    }

    pub fn on_timeout(&mut self) -> Vec<CallAction> {
        match self.timeout_kind() {
            Some(TimeoutKind::Ring) => self.finish(EndReason::RingTimeout),
            Some(TimeoutKind::Negotiation) => self.finish(EndReason::NegotiationTimeout),
            None => Vec::new(),
        }
    }

    fn finish(&mut self, reason: EndReason) -> Vec<CallAction> {
        if self.is_finished() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.remote_aware && reason.notifies_remote() {
            actions.push(CallAction::Send(ClientMessage::End {
                to: self.remote.clone(),
            }));
        }
        info!("{} ended: {:?}", self.id, reason);
        self.end_reason = Some(reason.clone());
        self.transition(CallState::Ended, &mut actions);
        actions.push(CallAction::Emit(CallEvent::Ended(reason)));
        actions.push(CallAction::Teardown);
        actions
    }

    fn transition(&mut self, state: CallState, actions: &mut Vec<CallAction>) {
        debug!("{}: {} -> {}", self.id, self.state, state);
        self.state = state.clone();
        actions.push(CallAction::Emit(CallEvent::StateChanged(state)));
    }
}
