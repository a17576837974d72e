//! Session notifications and the observers that watch them.
//!
//! The session broadcasts [`SessionEvent`]s; the [`EventRouter`] drains that
//! feed on its own task and fans each event out to the registered observers,
//! so a slow observer only delays the router, never the session.

use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use bytes::Bytes;
use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tokio_util::sync::CancellationToken;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type SessionEventSender = broadcast::Sender<SessionEvent>;
pub type SessionEventReceiver = broadcast::Receiver<SessionEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Lost,
}

impl Display for ConnectionQuality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Poor => "POOR",
            Self::Lost => "LOST",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Unknown,
    Camera,
    Microphone,
    ScreenShare,
    ScreenShareAudio,
}

/// Remote track as seen in subscribe/unsubscribe notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub sid: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub participant: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DataReceived {
        participant: String,
        data: Bytes,
    },
    QualityChanged {
        participant: String,
        quality: ConnectionQuality,
    },
    RoomMetadataChanged {
        metadata: String,
    },
    TrackSubscribed(RemoteTrackInfo),
    TrackUnsubscribed(RemoteTrackInfo),
}

/// Side-effect-only callbacks. Implementations must return quickly and must
/// not perform blocking I/O.
pub trait SessionObserver: Send + Sync {
    fn on_data_received(&self, _participant: &str, _data: &[u8]) {}

    fn on_connection_quality_changed(&self, _participant: &str, _quality: ConnectionQuality) {}

    fn on_room_metadata_changed(&self, _metadata: &str) {}

    fn on_track_subscribed(&self, _track: &RemoteTrackInfo) {}

    fn on_track_unsubscribed(&self, _track: &RemoteTrackInfo) {}
}

/// Fans session events out to observers.
#[derive(Default, Clone)]
pub struct EventRouter {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn dispatch(&self, event: &SessionEvent) {
        for observer in &self.observers {
            match event {
                SessionEvent::DataReceived { participant, data } => {
                    observer.on_data_received(participant, data)
                }
                SessionEvent::QualityChanged {
                    participant,
                    quality,
                } => observer.on_connection_quality_changed(participant, *quality),
                SessionEvent::RoomMetadataChanged { metadata } => {
                    observer.on_room_metadata_changed(metadata)
                }
                SessionEvent::TrackSubscribed(track) => observer.on_track_subscribed(track),
                SessionEvent::TrackUnsubscribed(track) => observer.on_track_unsubscribed(track),
            }
        }
    }

    /// Runs the router until the feed closes or `cancel` fires.
    pub fn spawn(self, events: SessionEventReceiver, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stream = BroadcastStream::new(events);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(event)) => self.dispatch(&event),
                        Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                            log::warn!("event router lagged, {} events dropped", n);
                        }
                        None => break,
                    },
                }
            }
            log::debug!("event router stopped");
        })
    }
}

/// Logs every event the way the CLI reports them.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_data_received(&self, participant: &str, data: &[u8]) {
        log::info!("received data: participant={} bytes={}", participant, data.len());
    }

    fn on_connection_quality_changed(&self, participant: &str, quality: ConnectionQuality) {
        log::debug!(
            "connection quality changed: participant={} quality={}",
            participant,
            quality
        );
    }

    fn on_room_metadata_changed(&self, metadata: &str) {
        log::info!("room metadata changed: metadata={}", metadata);
    }

    fn on_track_subscribed(&self, track: &RemoteTrackInfo) {
        log::info!(
            "track subscribed: kind={:?} trackID={} source={:?}",
            track.kind,
            track.sid,
            track.source
        );
    }

    fn on_track_unsubscribed(&self, track: &RemoteTrackInfo) {
        log::info!(
            "track unsubscribed: kind={:?} trackID={} source={:?}",
            track.kind,
            track.sid,
            track.source
        );
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;
