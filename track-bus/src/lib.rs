//! Publishing media sources as tracks into a joined room.
//!
//! Sources (files, stdin, unix sockets, synthetic patterns) are framed into
//! [`Sample`]s, paced and pushed into bounded per-track channels that a
//! [`Session`] drains. [`TrackPublisher`] owns the per-track pumps and the
//! complete-then-unpublish lifecycle.

pub mod error;
pub mod events;
pub mod kind;
pub mod local;
pub mod pacer;
pub mod publisher;
pub mod reader;
pub mod sample;
pub mod session;
pub mod source;
pub mod synthetic;
pub mod token;
pub mod track;

#[cfg(test)]
mod testutil;

pub use error::{BusError, Result};
pub use events::{EventRouter, LoggingObserver, SessionEvent, SessionObserver};
pub use kind::MediaKind;
pub use local::LocalSession;
pub use publisher::{CompletionCallback, PublishRequest, TrackPublisher};
pub use sample::Sample;
pub use session::{ConnectInfo, Session};
pub use source::MediaSource;
pub use synthetic::{SimulcastLayerSet, VideoQuality};
pub use token::AccessToken;
pub use track::{TrackHandle, TrackState};
