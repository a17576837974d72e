use std::{
    fmt::{Display, Formatter},
    path::Path,
};

use crate::error::{BusError, Result};

pub const MIME_TYPE_H264: &str = "video/H264";
pub const MIME_TYPE_VP8: &str = "video/VP8";
pub const MIME_TYPE_OPUS: &str = "audio/opus";

/// Media kind of a published track. Resolved once when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    VideoH264,
    VideoVP8,
    AudioOpus,
}

impl MediaKind {
    /// Resolve from a file extension: `.h264`, `.ivf` (VP8) or `.ogg` (Opus).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("h264") => Ok(Self::VideoH264),
            Some("ivf") => Ok(Self::VideoVP8),
            Some("ogg") => Ok(Self::AudioOpus),
            _ => Err(BusError::unsupported(format!(
                "file {} (supports .h264, .ivf, .ogg)",
                path.display()
            ))),
        }
    }

    /// Resolve from the literal socket address. The first keyword found wins,
    /// checked in the order `h264`, `vp8`, `opus`.
    pub fn from_socket_addr(addr: &str) -> Result<Self> {
        if addr.contains("h264") {
            Ok(Self::VideoH264)
        } else if addr.contains("vp8") {
            Ok(Self::VideoVP8)
        } else if addr.contains("opus") {
            Ok(Self::AudioOpus)
        } else {
            Err(BusError::unsupported(format!(
                "socket {} (address must contain one of: h264, vp8, opus)",
                addr
            )))
        }
    }

    /// Resolve from an explicit MIME string, compared case-insensitively.
    pub fn from_mime(mime: &str) -> Result<Self> {
        [Self::VideoH264, Self::VideoVP8, Self::AudioOpus]
            .into_iter()
            .find(|k| k.mime().eq_ignore_ascii_case(mime))
            .ok_or_else(|| {
                BusError::unsupported(format!(
                    "mime {} (must be one of: video/h264, video/vp8, audio/opus)",
                    mime
                ))
            })
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::VideoH264 => MIME_TYPE_H264,
            Self::VideoVP8 => MIME_TYPE_VP8,
            Self::AudioOpus => MIME_TYPE_OPUS,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::VideoH264 | Self::VideoVP8)
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

#[cfg(test)]
#[path = "kind_test.rs"]
mod kind_test;
