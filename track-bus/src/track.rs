use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
};

use tokio_util::sync::CancellationToken;

use crate::{
    kind::MediaKind,
    sample::{SampleReceiver, SampleSender},
    synthetic::VideoQuality,
};

pub const DEFAULT_TRACK_BUFFER: usize = 32;

/// Lifecycle of a published track.
///
/// `Created -> Publishing -> Completing -> Unpublished` on EOF, or
/// `Publishing -> Unpublished` on shutdown. `Unpublished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackState {
    Created = 0,
    Publishing = 1,
    Completing = 2,
    Unpublished = 3,
}

impl TrackState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Publishing,
            2 => Self::Completing,
            _ => Self::Unpublished,
        }
    }
}

/// Publication options passed to the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackOptions {
    pub name: String,
}

impl TrackOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Simulcast placement of one local track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerInfo {
    pub quality: VideoQuality,
    pub width: u32,
    pub height: u32,
}

/// Receiving half of an outgoing track, handed to the session on publish.
#[derive(Debug)]
pub struct LocalTrack {
    pub kind: MediaKind,
    pub layer: Option<LayerInfo>,
    pub samples: SampleReceiver,
}

impl LocalTrack {
    /// Bounded track channel. The sender is the pump's end.
    pub fn new(kind: MediaKind, capacity: usize) -> (SampleSender, Self) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                kind,
                layer: None,
                samples: rx,
            },
        )
    }

    pub fn with_layer(mut self, layer: LayerInfo) -> Self {
        self.layer = Some(layer);
        self
    }
}

/// What the session returns for an accepted publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackPublication {
    pub sid: String,
    pub name: String,
    pub kind: MediaKind,
}

/// A live published track.
///
/// The state transition into `Unpublished` happens once; whoever wins it
/// performs the single session-side unpublish.
#[derive(Debug)]
pub struct TrackHandle {
    sid: String,
    name: String,
    kind: MediaKind,
    source_key: String,
    state: AtomicU8,
    completion_observed: AtomicBool,
    completed: CancellationToken,
    written: AtomicU64,
}

impl TrackHandle {
    pub fn new(publication: TrackPublication, source_key: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            sid: publication.sid,
            name: publication.name,
            kind: publication.kind,
            source_key: source_key.into(),
            state: AtomicU8::new(TrackState::Created as u8),
            completion_observed: AtomicBool::new(false),
            completed: CancellationToken::new(),
            written: AtomicU64::new(0),
        })
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn state(&self) -> TrackState {
        TrackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            TrackState::Publishing | TrackState::Completing
        )
    }

    pub fn completion_observed(&self) -> bool {
        self.completion_observed.load(Ordering::Acquire)
    }

    /// Samples accepted by the track so far.
    pub fn samples_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    /// `Created -> Publishing`.
    pub fn mark_publishing(&self) -> bool {
        self.transition(TrackState::Created, TrackState::Publishing)
    }

    /// Records source exhaustion. Returns `true` only for the first call, and
    /// only while the track is still publishing.
    pub fn complete(&self) -> bool {
        if !self.transition(TrackState::Publishing, TrackState::Completing) {
            return false;
        }
        self.completion_observed.store(true, Ordering::Release);
        self.completed.cancel();
        true
    }

    /// Moves to `Unpublished`. Returns `true` for exactly one caller.
    pub fn begin_unpublish(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current == TrackState::Unpublished as u8 {
                return false;
            }
            match self.state.compare_exchange(
                current,
                TrackState::Unpublished as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Resolves once the source behind this track has been exhausted.
    pub async fn completed(&self) {
        self.completed.cancelled().await
    }

    fn transition(&self, from: TrackState, to: TrackState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
#[path = "track_test.rs"]
mod track_test;
