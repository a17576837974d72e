//! Framing for the byte-stream sources.
//!
//! ```text
//!   .h264 / video/h264  ──► H264Reader  (Annex-B NAL units)
//!   .ivf  / video/vp8   ──► IvfReader   (DKIF frames, VP80 only)
//!   .ogg  / audio/opus  ──► OggReader   (Ogg pages after OpusHead/OpusTags)
//! ```
//!
//! Every reader yields `Ok(None)` exactly when its input is exhausted. A
//! truncated trailing frame is logged and treated as exhaustion.

pub mod h264;
pub mod ivf;
pub mod ogg;

use tokio::io::AsyncRead;

/// Any owned byte stream a reader can sit on.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

pub use h264::H264Reader;
pub use ivf::IvfReader;
pub use ogg::OggReader;
