//! Builders for small media files used across the test modules.

use crate::reader::{
    ivf::IVF_SIGNATURE,
    ogg::{OPUS_HEAD, OPUS_TAGS, ogg_crc},
};

/// Annex-B stream; even-indexed NALs get a 4-byte start code.
pub fn annexb(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, nal) in nals.iter().enumerate() {
        if i % 2 == 0 {
            out.extend_from_slice(&[0, 0, 0, 1]);
        } else {
            out.extend_from_slice(&[0, 0, 1]);
        }
        out.extend_from_slice(nal);
    }
    out
}

/// `count` non-IDR coded slices, each tagged with its index.
pub fn h264_slices(count: usize) -> Vec<u8> {
    let nals: Vec<Vec<u8>> = (0..count).map(|i| vec![0x41, 0x9a, i as u8 | 0x80]).collect();
    let refs: Vec<&[u8]> = nals.iter().map(|n| n.as_slice()).collect();
    annexb(&refs)
}

/// IVF file; `timebase` is (numerator, denominator).
pub fn ivf_file(fourcc: &[u8; 4], timebase: (u32, u32), frames: &[(u64, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(IVF_SIGNATURE);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&32u16.to_le_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&640u16.to_le_bytes());
    out.extend_from_slice(&360u16.to_le_bytes());
    out.extend_from_slice(&timebase.1.to_le_bytes());
    out.extend_from_slice(&timebase.0.to_le_bytes());
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for (ts, data) in frames {
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&ts.to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

/// One Ogg page with a valid checksum. Payload must be shorter than 255 * 255 bytes.
pub fn ogg_page(granule: u64, sequence: u32, header_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut table = vec![255u8; payload.len() / 255];
    table.push((payload.len() % 255) as u8);

    let mut page = Vec::new();
    page.extend_from_slice(b"OggS");
    page.push(0);
    page.push(header_type);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&0x1234u32.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&0u32.to_le_bytes());
    page.push(table.len() as u8);
    page.extend_from_slice(&table);
    page.extend_from_slice(payload);

    let crc = ogg_crc(0, &page);
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    page
}

pub fn opus_head() -> Vec<u8> {
    let mut head = OPUS_HEAD.to_vec();
    head.push(1);
    head.push(2);
    head.extend_from_slice(&312u16.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes());
    head.push(0);
    head
}

/// Ogg Opus file; each data page advances the granule by `granule_step`.
pub fn ogg_opus_file(pages: &[&[u8]], granule_step: u64) -> Vec<u8> {
    let mut tags = OPUS_TAGS.to_vec();
    tags.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);

    let mut out = ogg_page(0, 0, 0x02, &opus_head());
    out.extend(ogg_page(0, 1, 0, &tags));
    for (i, payload) in pages.iter().enumerate() {
        let granule = granule_step * (i as u64 + 1);
        let header_type = if i + 1 == pages.len() { 0x04 } else { 0 };
        out.extend(ogg_page(granule, i as u32 + 2, header_type, payload));
    }
    out
}
