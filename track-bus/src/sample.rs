use std::time::Duration;

use bytes::Bytes;

pub type SampleSender = tokio::sync::mpsc::Sender<Sample>;
pub type SampleReceiver = tokio::sync::mpsc::Receiver<Sample>;

/// One outgoing media sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    pub data: Bytes,
    // container timing, or the pacer interval when paced
    pub duration: Option<Duration>,
    // false for H.264 parameter sets, SEI and similar side data
    pub frame: bool,
}

impl Sample {
    pub fn new(data: impl Into<Bytes>, duration: Option<Duration>) -> Self {
        Self {
            data: data.into(),
            duration,
            frame: true,
        }
    }

    pub fn side_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            duration: None,
            frame: false,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
