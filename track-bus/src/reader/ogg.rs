use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;

use crate::{
    error::{BusError, Result},
    reader::ivf::read_full,
    sample::Sample,
};

pub const OGG_CAPTURE_PATTERN: &[u8; 4] = b"OggS";
pub const OGG_PAGE_HEADER_SIZE: usize = 27;
pub const OPUS_HEAD: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS: &[u8; 8] = b"OpusTags";
pub const OPUS_SAMPLE_RATE: f64 = 48_000.0;
/// Granule position of a page on which no packet ends.
pub const NO_GRANULE: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPageHeader {
    pub header_type: u8,
    pub granule_position: u64,
    pub serial: u32,
    pub sequence: u32,
    pub checksum: u32,
    pub segments: u8,
}

/// Fields of the `OpusHead` identification header that matter for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpusHead {
    pub version: u8,
    pub channels: u8,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
}

impl OpusHead {
    fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 19 || &payload[..8] != OPUS_HEAD {
            return Err(BusError::unsupported("ogg: first page is not OpusHead"));
        }
        Ok(Self {
            version: payload[8],
            channels: payload[9],
            pre_skip: u16::from_le_bytes([payload[10], payload[11]]),
            input_sample_rate: u32::from_le_bytes([
                payload[12],
                payload[13],
                payload[14],
                payload[15],
            ]),
        })
    }
}

/// Reads Opus pages out of an Ogg container, one sample per page.
pub struct OggReader<R> {
    inner: R,
    head: OpusHead,
    last_granule: u64,
    eof: bool,
}

impl<R: AsyncRead + Unpin> OggReader<R> {
    /// Reads the first page and requires it to be an `OpusHead`.
    pub async fn open(mut inner: R) -> Result<Self> {
        let (header, payload) = match read_page(&mut inner).await {
            Ok(Some(page)) => page,
            Ok(None) => return Err(BusError::unsupported("ogg: empty stream")),
            Err(e) => return Err(BusError::unsupported(format!("ogg: {}", e))),
        };
        let head = OpusHead::parse(&payload)?;
        log::debug!(
            "ogg: opus stream serial {} channels {} pre-skip {}",
            header.serial,
            head.channels,
            head.pre_skip
        );
        Ok(Self {
            inner,
            head,
            last_granule: if header.granule_position == NO_GRANULE {
                0
            } else {
                header.granule_position
            },
            eof: false,
        })
    }

    pub fn head(&self) -> &OpusHead {
        &self.head
    }

    pub async fn next_sample(&mut self) -> std::io::Result<Option<Sample>> {
        loop {
            if self.eof {
                return Ok(None);
            }
            let Some((header, payload)) = read_page(&mut self.inner).await? else {
                self.eof = true;
                return Ok(None);
            };
            if payload.starts_with(OPUS_TAGS) || payload.starts_with(OPUS_HEAD) {
                continue;
            }

            if header.granule_position == NO_GRANULE {
                return Ok(Some(Sample::new(payload, None)));
            }
            let samples = header.granule_position.saturating_sub(self.last_granule);
            self.last_granule = header.granule_position;
            let duration =
                (samples > 0).then(|| Duration::from_secs_f64(samples as f64 / OPUS_SAMPLE_RATE));
            return Ok(Some(Sample::new(payload, duration)));
        }
    }
}

/// Reads one page. `Ok(None)` on EOF or a truncated trailing page.
async fn read_page<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<(OggPageHeader, Bytes)>> {
    let mut head = [0u8; OGG_PAGE_HEADER_SIZE];
    if !read_full(reader, &mut head).await? {
        return Ok(None);
    }
    if &head[0..4] != OGG_CAPTURE_PATTERN {
        return Err(invalid("missing OggS capture pattern"));
    }
    let mut granule = [0u8; 8];
    granule.copy_from_slice(&head[6..14]);
    let header = OggPageHeader {
        header_type: head[5],
        granule_position: u64::from_le_bytes(granule),
        serial: u32::from_le_bytes([head[14], head[15], head[16], head[17]]),
        sequence: u32::from_le_bytes([head[18], head[19], head[20], head[21]]),
        checksum: u32::from_le_bytes([head[22], head[23], head[24], head[25]]),
        segments: head[26],
    };

    let mut table = vec![0u8; header.segments as usize];
    if !read_full(reader, &mut table).await? {
        return Ok(None);
    }
    let size: usize = table.iter().map(|&s| s as usize).sum();
    let mut payload = BytesMut::zeroed(size);
    if !read_full(reader, &mut payload).await? {
        log::warn!("ogg: truncated page {}", header.sequence);
        return Ok(None);
    }

    head[22..26].fill(0);
    let mut crc = ogg_crc(0, &head);
    crc = ogg_crc(crc, &table);
    crc = ogg_crc(crc, &payload);
    if crc != header.checksum {
        return Err(invalid(&format!(
            "checksum mismatch on page {}: {:08x} != {:08x}",
            header.sequence, crc, header.checksum
        )));
    }

    Ok(Some((header, payload.freeze())))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, format!("ogg: {}", msg))
}

/// CRC-32 as used by Ogg: polynomial 0x04c11db7, no reflection, zero init.
pub fn ogg_crc(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04c1_1db7
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
#[path = "ogg_test.rs"]
mod ogg_test;
