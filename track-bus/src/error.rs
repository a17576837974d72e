use std::io;

pub type Result<T> = std::result::Result<T, BusError>;

/// Failures surfaced by the publishing pipeline.
///
/// Every variant is scoped to one source, track or group, except a
/// `Connection` error returned by the initial session connect.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("unsupported source type: {0}")]
    UnsupportedSourceType(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl BusError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedSourceType(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }
}
