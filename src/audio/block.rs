use crate::error::StreamError;

/// Interleaved floating-point frames: `samples[frame * channels + channel]`.
///
/// Always holds at least one whole frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    samples: Vec<f32>,
    channels: usize,
}

impl SampleBlock {
    pub fn new(samples: Vec<f32>, channels: usize) -> Result<Self, StreamError> {
        if samples.is_empty() {
            return Err(StreamError::EmptyBlock);
        }
        if channels == 0 || samples.len() % channels != 0 {
            return Err(StreamError::InvalidBlock {
                len: samples.len(),
                channels,
            });
        }

        Ok(Self { samples, channels })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples of one frame, one per channel.
    #[inline]
    pub fn frame(&self, index: usize) -> &[f32] {
        let start = index * self.channels;
        &self.samples[start..start + self.channels]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Keep only the first `frames` frames. Returns how many frames were cut.
    pub(crate) fn truncate_frames(&mut self, frames: usize) -> usize {
        let before = self.frame_count();
        if frames < before {
            self.samples.truncate(frames * self.channels);
        }
        before.saturating_sub(frames)
    }
}
