use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
};

use crate::{
    error::{BusError, Result},
    kind::MediaKind,
    reader::{ByteStream, H264Reader, IvfReader, OggReader},
    sample::Sample,
    synthetic::{PatternGenerator, VideoQuality},
};

/// Where a track's samples come from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MediaSource {
    File(PathBuf),
    Stdin,
    UnixSocket(String),
    Synthetic { height: u32, quality: VideoQuality },
}

impl MediaSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn socket(addr: impl Into<String>) -> Self {
        Self::UnixSocket(addr.into())
    }

    /// Identity used to keep one active track per source.
    pub fn key(&self) -> String {
        match self {
            Self::File(path) => format!("file:{}", path.display()),
            Self::Stdin => "stdin".to_string(),
            Self::UnixSocket(addr) => format!("unix:{}", addr),
            Self::Synthetic { height, quality } => {
                format!("synthetic:{}:{}", quality.as_str(), height)
            }
        }
    }

    /// Default track name: the file path or socket address, like the CLI arguments.
    pub fn track_name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "stdin".to_string(),
            Self::UnixSocket(addr) => addr.clone(),
            Self::Synthetic { quality, .. } => format!("demo-{}", quality.as_str()),
        }
    }

    /// Kind implied by the source itself. Stdin needs an explicit MIME type.
    pub fn infer_kind(&self) -> Result<MediaKind> {
        match self {
            Self::File(path) => MediaKind::from_path(path),
            Self::UnixSocket(addr) => MediaKind::from_socket_addr(addr),
            Self::Synthetic { .. } => Ok(MediaKind::VideoH264),
            Self::Stdin => Err(BusError::unsupported(
                "stdin requires an explicit mime type",
            )),
        }
    }

    /// Opens the underlying handle and wraps it in the reader for `kind`.
    pub async fn open(&self, kind: MediaKind) -> Result<SampleReader> {
        let stream: ByteStream = match self {
            Self::File(path) => {
                let file = tokio::fs::File::open(path).await.map_err(|e| {
                    BusError::publish(format!("opening {}: {}", path.display(), e))
                })?;
                Box::new(file)
            }
            Self::Stdin => Box::new(tokio::io::stdin()),
            Self::UnixSocket(addr) => open_socket(addr).await?,
            Self::Synthetic { height, quality } => {
                let generator = PatternGenerator::new(*quality, *height)?;
                return Ok(SampleReader::Synthetic(generator));
            }
        };
        SampleReader::with_stream(stream, kind).await
    }
}

impl Display for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(unix)]
async fn open_socket(addr: &str) -> Result<ByteStream> {
    let sock = tokio::net::UnixStream::connect(addr)
        .await
        .map_err(|e| BusError::connection(format!("dialing unix socket {}: {}", addr, e)))?;
    Ok(Box::new(sock))
}

#[cfg(not(unix))]
async fn open_socket(addr: &str) -> Result<ByteStream> {
    Err(BusError::connection(format!(
        "unix socket {} is not supported on this platform",
        addr
    )))
}

/// Pull interface over every source variant.
pub enum SampleReader {
    H264(H264Reader<ByteStream>),
    Ivf(IvfReader<ByteStream>),
    Ogg(OggReader<ByteStream>),
    Synthetic(PatternGenerator),
}

impl SampleReader {
    /// Wraps an already-open byte stream. Container headers are validated here,
    /// so an unexpected codec fails before anything is published.
    pub async fn with_stream(stream: ByteStream, kind: MediaKind) -> Result<Self> {
        Ok(match kind {
            MediaKind::VideoH264 => Self::H264(H264Reader::new(stream)),
            MediaKind::VideoVP8 => Self::Ivf(IvfReader::open(stream).await?),
            MediaKind::AudioOpus => Self::Ogg(OggReader::open(stream).await?),
        })
    }

    /// Next sample, or `None` once the source is exhausted.
    pub async fn next_sample(&mut self) -> std::io::Result<Option<Sample>> {
        match self {
            Self::H264(r) => r.next_sample().await,
            Self::Ivf(r) => r.next_sample().await,
            Self::Ogg(r) => r.next_sample().await,
            Self::Synthetic(g) => Ok(Some(g.next_frame())),
        }
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
