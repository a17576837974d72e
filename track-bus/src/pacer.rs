use std::time::Duration;

use tokio::time::Instant;

use crate::{kind::MediaKind, sample::Sample};

/// Holds frame samples back so successive emissions are at least `1 / fps` apart.
///
/// Pacing only applies to video elementary streams with a positive frame rate;
/// everything else passes through without added delay. The pacer never buffers:
/// callers await [`FramePacer::pace`] before each write, so a slow consumer
/// simply delays the next read.
#[derive(Debug)]
pub struct FramePacer {
    interval: Option<Duration>,
    next: Option<Instant>,
}

impl FramePacer {
    pub fn new(kind: MediaKind, fps: Option<f64>) -> Self {
        let interval = fps
            .filter(|_| kind.is_video())
            .and_then(frame_interval);
        Self {
            interval,
            next: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits until `sample` may be emitted and stamps the pacing interval on it.
    pub async fn pace(&mut self, sample: &mut Sample) {
        let Some(interval) = self.interval else {
            return;
        };
        if !sample.frame {
            return;
        }
        if let Some(next) = self.next {
            tokio::time::sleep_until(next).await;
        }
        sample.duration = Some(interval);
        self.next = Some(Instant::now() + interval);
    }
}

/// `1 / fps` as a duration, e.g. 30 fps is 33.333 ms. `None` for rates that
/// do not pace: zero, negative, non-finite, or too slow for a `Duration`.
pub fn frame_interval(fps: f64) -> Option<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / fps)
        .ok()
        .filter(|interval| !interval.is_zero())
}

#[cfg(test)]
#[path = "pacer_test.rs"]
mod pacer_test;
