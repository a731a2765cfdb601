use crate::error::MediaError;
use crate::media::{LocalStream, MediaBackend, MediaConstraints, TrackKind};
use callbridge_core::{Emitter, Subscription};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaTopic {
    StreamReady,
    Released,
    Failed,
}

#[derive(Debug, Clone)]
pub enum MediaEvent {
    StreamReady(LocalStream),
    Released,
    Failed(MediaError),
}

impl MediaEvent {
    pub fn topic(&self) -> MediaTopic {
        match self {
            Self::StreamReady(_) => MediaTopic::StreamReady,
            Self::Released => MediaTopic::Released,
            Self::Failed(_) => MediaTopic::Failed,
        }
    }
}

/// Owns the local capture stream.
///
/// Every `acquire` and `release` starts a new generation; an acquisition that completes
/// after a newer generation began is stopped on arrival instead of being installed.
pub struct MediaDevice {
    backend: Arc<dyn MediaBackend>,
    stream: Mutex<Option<LocalStream>>,
    generation: AtomicU64,
    events: Emitter<MediaTopic, MediaEvent>,
}

impl MediaDevice {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            stream: Mutex::new(None),
            generation: AtomicU64::new(0),
            events: Emitter::new(),
        }
    }

    pub async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream, MediaError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let stream = match self.backend.acquire(constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot open camera and/or microphone: {}", e);
                self.events
                    .publish(&MediaTopic::Failed, &MediaEvent::Failed(e.clone()));
                return Err(e);
            }
        };

        {
            let mut held = self.held();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Stream {} arrived after release, stopping it", stream.id());
                stream.stop();
                return Err(MediaError::Cancelled);
            }
            if let Some(previous) = held.replace(stream.clone()) {
                previous.stop();
            }
        }

        info!("Local stream {} ready", stream.id());
        self.events.publish(
            &MediaTopic::StreamReady,
            &MediaEvent::StreamReady(stream.clone()),
        );
        Ok(stream)
    }

    /// Sets every track of `kind` to `on`, or flips each one when `on` is `None`.
    /// Does nothing without a held stream.
    pub fn toggle(&self, kind: TrackKind, on: Option<bool>) {
        let held = self.held();
        let Some(stream) = held.as_ref() else {
            return;
        };
        for track in stream.tracks_of(kind) {
            let enabled = on.unwrap_or(!track.is_enabled());
            track.set_enabled(enabled);
        }
    }

    /// Stops all tracks and forgets the stream. Safe to call repeatedly.
    pub fn release(&self) {
        let released = {
            let mut held = self.held();
            self.generation.fetch_add(1, Ordering::SeqCst);
            held.take()
        };

        if let Some(stream) = released {
            stream.stop();
            info!("Local stream {} released", stream.id());
            self.events
                .publish(&MediaTopic::Released, &MediaEvent::Released);
        }
    }

    pub fn stream(&self) -> Option<LocalStream> {
        self.held().clone()
    }

    pub fn subscribe<F>(&self, topic: MediaTopic, handler: F) -> Subscription
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(topic, handler)
    }

    pub fn unsubscribe(&self, topic: MediaTopic, subscription: Option<Subscription>) {
        self.events.unsubscribe(&topic, subscription);
    }

    fn held(&self) -> MutexGuard<'_, Option<LocalStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
