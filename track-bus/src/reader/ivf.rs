use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    error::{BusError, Result},
    sample::Sample,
};

pub const IVF_SIGNATURE: &[u8; 4] = b"DKIF";
pub const IVF_FILE_HEADER_SIZE: usize = 32;
pub const IVF_FRAME_HEADER_SIZE: usize = 12;
/// Larger frame sizes are treated as a corrupt stream.
pub const MAX_IVF_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Parsed 32-byte IVF file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfHeader {
    pub fourcc: [u8; 4],
    pub width: u16,
    pub height: u16,
    pub timebase_denominator: u32,
    pub timebase_numerator: u32,
    pub num_frames: u32,
}

impl IvfHeader {
    pub fn parse(buf: &[u8; IVF_FILE_HEADER_SIZE]) -> Result<Self> {
        if &buf[0..4] != IVF_SIGNATURE {
            return Err(BusError::unsupported("ivf: missing DKIF signature"));
        }
        let header_size = u16::from_le_bytes([buf[6], buf[7]]);
        if header_size as usize != IVF_FILE_HEADER_SIZE {
            return Err(BusError::unsupported(format!(
                "ivf: unexpected header size {}",
                header_size
            )));
        }
        Ok(Self {
            fourcc: [buf[8], buf[9], buf[10], buf[11]],
            width: u16::from_le_bytes([buf[12], buf[13]]),
            height: u16::from_le_bytes([buf[14], buf[15]]),
            timebase_denominator: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            timebase_numerator: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            num_frames: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
        })
    }

    /// Seconds per timestamp tick.
    pub fn timebase(&self) -> f64 {
        if self.timebase_denominator == 0 {
            return 0.0;
        }
        self.timebase_numerator as f64 / self.timebase_denominator as f64
    }
}

/// Reads VP8 frames out of an IVF container.
pub struct IvfReader<R> {
    inner: R,
    header: IvfHeader,
    last_timestamp: u64,
    eof: bool,
}

impl<R: AsyncRead + Unpin> IvfReader<R> {
    /// Reads and validates the file header. Only `VP80` streams are accepted.
    pub async fn open(mut inner: R) -> Result<Self> {
        let mut buf = [0u8; IVF_FILE_HEADER_SIZE];
        inner
            .read_exact(&mut buf)
            .await
            .map_err(|e| BusError::unsupported(format!("ivf: reading file header: {}", e)))?;
        let header = IvfHeader::parse(&buf)?;
        if &header.fourcc != b"VP80" {
            return Err(BusError::unsupported(format!(
                "ivf: codec {} is not VP8",
                String::from_utf8_lossy(&header.fourcc)
            )));
        }
        log::debug!(
            "ivf: {}x{} timebase {}/{}",
            header.width,
            header.height,
            header.timebase_numerator,
            header.timebase_denominator
        );
        Ok(Self {
            inner,
            header,
            last_timestamp: 0,
            eof: false,
        })
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    pub async fn next_sample(&mut self) -> std::io::Result<Option<Sample>> {
        if self.eof {
            return Ok(None);
        }

        let mut frame_header = [0u8; IVF_FRAME_HEADER_SIZE];
        if !read_full(&mut self.inner, &mut frame_header).await? {
            self.eof = true;
            return Ok(None);
        }
        let size = u32::from_le_bytes([
            frame_header[0],
            frame_header[1],
            frame_header[2],
            frame_header[3],
        ]) as usize;
        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&frame_header[4..12]);
        let timestamp = u64::from_le_bytes(ts_bytes);

        if size > MAX_IVF_FRAME_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "ivf: frame of {} bytes at timestamp {} exceeds {} bytes",
                    size, timestamp, MAX_IVF_FRAME_SIZE
                ),
            ));
        }

        let mut frame = BytesMut::zeroed(size);
        if !read_full(&mut self.inner, &mut frame).await? {
            log::warn!("ivf: truncated frame at timestamp {}", timestamp);
            self.eof = true;
            return Ok(None);
        }

        let delta = timestamp.saturating_sub(self.last_timestamp);
        self.last_timestamp = timestamp;
        let seconds = self.header.timebase() * delta as f64;
        let duration = Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|d| !d.is_zero());

        Ok(Some(Sample::new(frame.freeze(), duration)))
    }
}

/// Fills `buf` completely. Returns `false` on a clean or partial EOF.
pub(crate) async fn read_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled > 0 {
                log::warn!("short read: {} of {} bytes", filled, buf.len());
            }
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
#[path = "ivf_test.rs"]
mod ivf_test;
