//! Looping colour-bar test pattern for the simulcast demo.
//!
//! Each tier owns its own [`PatternGenerator`]. Frames are raw I420 pictures;
//! the session's transport is responsible for encoding them.

use bytes::{Bytes, BytesMut};

use crate::{
    error::{BusError, Result},
    sample::Sample,
};

pub const DEFAULT_BASE_HEIGHT: u32 = 180;
pub const DEFAULT_DEMO_FPS: f64 = 30.0;
pub const PATTERN_LOOP_FRAMES: u64 = 60;
const MAX_HEIGHT: u32 = 4320;

// 75% SMPTE bars: white, yellow, cyan, green, magenta, red, blue (BT.601 YUV)
const BARS: [(u8, u8, u8); 7] = [
    (180, 128, 128),
    (162, 44, 142),
    (131, 156, 44),
    (112, 72, 58),
    (84, 184, 198),
    (65, 100, 212),
    (35, 212, 114),
];
const BAND_LUMA: u8 = 235;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VideoQuality {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn index(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// `base * 2^i` for each of `tiers` tiers.
pub fn layer_heights(base: u32, tiers: u32) -> Vec<u32> {
    (0..tiers).map(|i| base * 2u32.pow(i)).collect()
}

/// Height for a tier, or an error when the ladder leaves the supported range.
pub fn tier_height(base: u32, quality: VideoQuality) -> Result<u32> {
    base.checked_mul(1 << quality.index())
        .filter(|h| *h > 0 && *h <= MAX_HEIGHT)
        .ok_or_else(|| {
            BusError::publish(format!(
                "no {} layer for base height {}",
                quality.as_str(),
                base
            ))
        })
}

/// 16:9 width rounded down to an even number of pixels.
pub fn width_for_height(height: u32) -> u32 {
    (height * 16 / 9) & !1
}

/// One simulcast tier: resolution plus its own generator.
pub struct SimulcastLayer {
    pub quality: VideoQuality,
    pub width: u32,
    pub height: u32,
    pub generator: PatternGenerator,
}

/// Ordered tiers of one logical demo track.
pub struct SimulcastLayerSet {
    pub name: String,
    pub layers: Vec<SimulcastLayer>,
}

impl SimulcastLayerSet {
    /// Builds every tier from `low` to `high` inclusive; any invalid tier fails the set.
    pub fn new(
        name: impl Into<String>,
        base_height: u32,
        low: VideoQuality,
        high: VideoQuality,
    ) -> Result<Self> {
        let mut layers = Vec::new();
        for quality in VideoQuality::ALL
            .into_iter()
            .filter(|q| *q >= low && *q <= high)
        {
            let height = tier_height(base_height, quality)?;
            let generator = PatternGenerator::new(quality, height)?;
            layers.push(SimulcastLayer {
                quality,
                width: generator.width(),
                height,
                generator,
            });
        }
        if layers.is_empty() {
            return Err(BusError::publish("simulcast group has no layers"));
        }
        Ok(Self {
            name: name.into(),
            layers,
        })
    }

    pub fn heights(&self) -> Vec<u32> {
        self.layers.iter().map(|l| l.height).collect()
    }
}

/// Deterministic, never-ending I420 pattern source.
pub struct PatternGenerator {
    quality: VideoQuality,
    width: u32,
    height: u32,
    base: Bytes,
    frame: u64,
}

impl PatternGenerator {
    pub fn new(quality: VideoQuality, height: u32) -> Result<Self> {
        let width = width_for_height(height);
        if height < 2 || height % 2 != 0 || height > MAX_HEIGHT || width < 2 {
            return Err(BusError::publish(format!(
                "invalid pattern size {}x{}",
                width, height
            )));
        }
        Ok(Self {
            quality,
            width,
            height,
            base: color_bars(width as usize, height as usize),
            frame: 0,
        })
    }

    pub fn quality(&self) -> VideoQuality {
        self.quality
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Next picture of the loop. Frame `n` and frame `n + PATTERN_LOOP_FRAMES` are identical.
    pub fn next_frame(&mut self) -> Sample {
        let position = self.frame % PATTERN_LOOP_FRAMES;
        self.frame = self.frame.wrapping_add(1);

        let width = self.width as usize;
        let height = self.height as usize;
        let band = (height / 12).max(2);
        let travel = height - band;
        let top = (position as usize * travel) / (PATTERN_LOOP_FRAMES as usize - 1);

        let mut data = BytesMut::from(&self.base[..]);
        data[top * width..(top + band) * width].fill(BAND_LUMA);
        Sample::new(data.freeze(), None)
    }
}

fn color_bars(width: usize, height: usize) -> Bytes {
    let chroma_w = width / 2;
    let chroma_h = height / 2;
    let mut data = BytesMut::zeroed(width * height + 2 * chroma_w * chroma_h);
    let (luma, chroma) = data.split_at_mut(width * height);
    let (u_plane, v_plane) = chroma.split_at_mut(chroma_w * chroma_h);

    let bar = |x: usize, w: usize| BARS[(x * BARS.len() / w).min(BARS.len() - 1)];
    for row in luma.chunks_exact_mut(width) {
        for (x, px) in row.iter_mut().enumerate() {
            *px = bar(x, width).0;
        }
    }
    for (u_row, v_row) in u_plane
        .chunks_exact_mut(chroma_w)
        .zip(v_plane.chunks_exact_mut(chroma_w))
    {
        for x in 0..chroma_w {
            let (_, u, v) = bar(x, chroma_w);
            u_row[x] = u;
            v_row[x] = v;
        }
    }
    data.freeze()
}

#[cfg(test)]
#[path = "synthetic_test.rs"]
mod synthetic_test;
