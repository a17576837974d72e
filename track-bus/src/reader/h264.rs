use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::sample::Sample;

const READ_CHUNK: usize = 4096;

/// Splits an H.264 Annex-B byte stream into NAL units.
pub struct H264Reader<R> {
    inner: R,
    buf: BytesMut,
    // true once the first start code has been consumed
    synced: bool,
    // bytes of `buf` already searched for the next start code
    scanned: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> H264Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK * 4),
            synced: false,
            scanned: 0,
            eof: false,
        }
    }

    pub async fn next_sample(&mut self) -> std::io::Result<Option<Sample>> {
        loop {
            if !self.synced {
                if let Some((pos, len)) = find_start_code(&self.buf, 0) {
                    self.buf.advance(pos + len);
                    self.synced = true;
                    continue;
                }
                if self.eof {
                    if !self.buf.is_empty() {
                        log::warn!("h264: {} bytes without start code dropped", self.buf.len());
                        self.buf.clear();
                    }
                    return Ok(None);
                }
                // keep a possible partial start code across reads
                let keep = self.buf.len().min(3);
                let stale = self.buf.len() - keep;
                self.buf.advance(stale);
            } else if let Some((pos, len)) = find_start_code(&self.buf, self.scanned) {
                let nal = self.buf.split_to(pos);
                self.buf.advance(len);
                self.scanned = 0;
                match to_sample(nal) {
                    Some(sample) => return Ok(Some(sample)),
                    None => continue,
                }
            } else if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let nal = self.buf.split();
                match to_sample(nal) {
                    Some(sample) => return Ok(Some(sample)),
                    None => return Ok(None),
                }
            } else {
                self.scanned = self.buf.len().saturating_sub(2);
            }

            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> std::io::Result<()> {
        self.buf.reserve(READ_CHUNK);
        let n = self.inner.read_buf(&mut self.buf).await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

/// Coded slice NAL unit types (non-IDR, partitions A-C, IDR).
pub fn is_frame_nal(nal_type: u8) -> bool {
    (1..=5).contains(&nal_type)
}

pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|b| b & 0x1f)
}

fn to_sample(mut nal: BytesMut) -> Option<Sample> {
    // trailing_zero_8bits and the leading zero of a 4-byte start code
    while nal.last() == Some(&0) {
        nal.truncate(nal.len() - 1);
    }
    let nal_type = nal_type(&nal)?;
    let data = nal.freeze();
    if is_frame_nal(nal_type) {
        Some(Sample::new(data, None))
    } else {
        Some(Sample::side_data(data))
    }
}

/// Position and length of the next `00 00 01` start code at or after `from`.
fn find_start_code(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    if buf.len() < 3 {
        return None;
    }
    (from..buf.len() - 2)
        .find(|&i| buf[i] == 0 && buf[i + 1] == 0 && buf[i + 2] == 1)
        .map(|i| (i, 3))
}

#[cfg(test)]
#[path = "h264_test.rs"]
mod h264_test;
