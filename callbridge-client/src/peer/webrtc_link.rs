use crate::error::PeerError;
use crate::media::{LocalStream, MediaTrack, TrackKind};
use crate::peer::{PeerEvent, PeerEventSink, PeerFactory, PeerLink, RemoteStream};
use async_trait::async_trait;
use callbridge_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

impl From<webrtc::Error> for PeerError {
    fn from(e: webrtc::Error) -> Self {
        PeerError::Transport(e.to_string())
    }
}

/// Local track backed by a sample writer. Whoever owns the capture device writes encoded
/// samples into [`WebRtcTrack::sample_track`] while the track is enabled.
#[derive(Debug)]
pub struct WebRtcTrack {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl WebRtcTrack {
    pub fn new(kind: TrackKind, id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        let mime_type = match kind {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            id.into(),
            stream_id.into(),
        );

        Self {
            kind,
            track: Arc::new(track),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn sample_track(&self) -> &Arc<TrackLocalStaticSample> {
        &self.track
    }

    /// True while samples should be written.
    pub fn is_live(&self) -> bool {
        self.is_enabled() && !self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for WebRtcTrack {
    fn id(&self) -> &str {
        self.track.id()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds peer connections with the default codecs and interceptors.
#[derive(Debug, Default)]
pub struct WebRtcPeerFactory;

#[async_trait]
impl PeerFactory for WebRtcPeerFactory {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerLink>, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
        wire_callbacks(&pc, events);

        Ok(Arc::new(WebRtcPeerLink { pc }))
    }
}

fn wire_callbacks(pc: &Arc<RTCPeerConnection>, events: PeerEventSink) {
    let ice_events = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let events = ice_events.clone();
        Box::pin(async move {
            let candidate = match candidate.map(|c| c.to_json()).transpose() {
                Ok(init) => init.map(|init| IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }),
                Err(e) => {
                    warn!("Failed to encode local ICE candidate: {}", e);
                    return;
                }
            };
            events.emit(PeerEvent::LocalCandidate(candidate));
        })
    }));

    // Audio and video arrive as separate tracks of one stream; announce it once.
    let announced = Arc::new(AtomicBool::new(false));
    let track_events = events.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let events = track_events.clone();
        let announced = announced.clone();
        Box::pin(async move {
            let id = track.stream_id();
            debug!("Remote {} track on stream {}", track.kind(), id);
            if !announced.swap(true, Ordering::SeqCst) {
                events.emit(PeerEvent::RemoteStream(RemoteStream { id }));
            }
        })
    }));

    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        info!("Peer connection state changed: {}", state);
        if state == RTCPeerConnectionState::Failed {
            events.emit(PeerEvent::Failed("peer connection failed".to_owned()));
        }
        Box::pin(async {})
    }));
}

pub struct WebRtcPeerLink {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcPeerLink {
    async fn install_local(
        &self,
        desc: RTCSessionDescription,
    ) -> Result<SessionDescription, PeerError> {
        self.pc.set_local_description(desc.clone()).await?;
        let local = self.pc.local_description().await.unwrap_or(desc);
        Ok(to_session_description(local))
    }
}

fn to_session_description(desc: RTCSessionDescription) -> SessionDescription {
    match desc.sdp_type {
        RTCSdpType::Answer => SessionDescription::answer(desc.sdp),
        _ => SessionDescription::offer(desc.sdp),
    }
}

#[async_trait]
impl PeerLink for WebRtcPeerLink {
    async fn attach_local_stream(&self, stream: &LocalStream) -> Result<(), PeerError> {
        for track in stream.tracks() {
            let Some(track) = track.as_any().downcast_ref::<WebRtcTrack>() else {
                return Err(PeerError::Transport(format!(
                    "track {} was not captured for WebRTC",
                    track.id()
                )));
            };
            let local: Arc<dyn TrackLocal + Send + Sync> = track.sample_track().clone();
            self.pc.add_track(local).await?;
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, PeerError> {
        let offer = self.pc.create_offer(None).await?;
        self.install_local(offer).await
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self.pc.create_answer(None).await?;
        self.install_local(answer).await
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError> {
        let desc = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
        };
        self.pc.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), PeerError> {
        // The stack has no end-of-candidates signal; the remote side just stops sending.
        let Some(candidate) = candidate else {
            return Ok(());
        };
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.pc.close().await?;
        Ok(())
    }
}
