//! Jitter buffer between variably-sized arrivals and fixed-size renders.
//!
//! Blocks are queued in arrival order. A read cursor tracks how many frames
//! of the head block have already been rendered; a pull copies whole frames
//! across block boundaries until the period is full and pads with silence
//! once the queue runs dry.

use std::collections::VecDeque;

use crate::audio::SampleBlock;
use crate::config::{OverflowPolicy, StreamConfig};
use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Nothing queued; pulls emit silence.
    Starved,
    /// At least one frame queued.
    Flowing,
}

/// Outcome of one pull. Real frames always precede silent frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    pub real_frames: usize,
    pub silent_frames: usize,
}

impl PullReport {
    pub fn is_underrun(&self) -> bool {
        self.silent_frames > 0
    }
}

pub struct PlaybackBuffer {
    queue: VecDeque<SampleBlock>,
    /// Frame offset into `queue.front()`; always 0 when the queue is empty.
    read_cursor: usize,
    buffered_frames: usize,
    channels: usize,
    max_buffered_frames: Option<usize>,
    overflow_policy: OverflowPolicy,
}

impl PlaybackBuffer {
    pub fn new(
        channels: usize,
        max_buffered_frames: Option<usize>,
        overflow_policy: OverflowPolicy,
    ) -> Self {
        Self {
            queue: VecDeque::new(),
            read_cursor: 0,
            buffered_frames: 0,
            channels: channels.max(1),
            max_buffered_frames,
            overflow_policy,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        let mut buffer = Self::new(
            config.channels,
            config.max_buffered_frames,
            config.overflow_policy,
        );
        // Room for a full ingress ring, so the render side rarely grows it.
        buffer.queue.reserve(config.ingress_capacity);
        buffer
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames queued and not yet rendered.
    pub fn buffered_frames(&self) -> usize {
        self.buffered_frames
    }

    pub fn queued_blocks(&self) -> usize {
        self.queue.len()
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn state(&self) -> BufferState {
        if self.queue.is_empty() {
            BufferState::Starved
        } else {
            BufferState::Flowing
        }
    }

    /// Append a block at the tail.
    ///
    /// Returns how many frames the overflow policy discarded to respect the
    /// buffering cap (0 when under the cap).
    pub fn push(&mut self, mut block: SampleBlock) -> Result<usize, StreamError> {
        if block.channels() != self.channels {
            return Err(StreamError::ChannelMismatch {
                expected: self.channels,
                got: block.channels(),
            });
        }

        let Some(max) = self.max_buffered_frames else {
            self.enqueue(block);
            return Ok(0);
        };

        match self.overflow_policy {
            OverflowPolicy::DropOldest => {
                self.enqueue(block);
                Ok(self.discard_oldest(self.buffered_frames.saturating_sub(max)))
            }
            OverflowPolicy::DropNewest => {
                let room = max.saturating_sub(self.buffered_frames);
                if room == 0 {
                    return Ok(block.frame_count());
                }
                let dropped = block.truncate_frames(room);
                self.enqueue(block);
                Ok(dropped)
            }
        }
    }

    /// Fill one output period given as one slice per output channel.
    ///
    /// The period length is the shortest channel slice. Source channels with
    /// no matching output are skipped; outputs with no matching source
    /// channel are written with silence.
    pub fn pull(&mut self, outputs: &mut [&mut [f32]]) -> PullReport {
        let frames_needed = outputs.iter().map(|out| out.len()).min().unwrap_or(0);

        let real_frames = self.drain_into(frames_needed, |pos, frame| {
            for (ch, out) in outputs.iter_mut().enumerate() {
                out[pos] = frame.get(ch).copied().unwrap_or(0.0);
            }
        });

        for out in outputs.iter_mut() {
            out[real_frames..].fill(0.0);
        }

        PullReport {
            real_frames,
            silent_frames: frames_needed - real_frames,
        }
    }

    pub fn pull_stereo(&mut self, left: &mut [f32], right: &mut [f32]) -> PullReport {
        self.pull(&mut [left, right])
    }

    /// Fill an interleaved output period of `out_channels` channels.
    ///
    /// A trailing partial frame in `output` is left as silence.
    pub fn pull_interleaved(&mut self, output: &mut [f32], out_channels: usize) -> PullReport {
        if out_channels == 0 {
            return PullReport::default();
        }
        let frames_needed = output.len() / out_channels;

        let real_frames = self.drain_into(frames_needed, |pos, frame| {
            let base = pos * out_channels;
            for ch in 0..out_channels {
                output[base + ch] = frame.get(ch).copied().unwrap_or(0.0);
            }
        });

        output[real_frames * out_channels..].fill(0.0);

        PullReport {
            real_frames,
            silent_frames: frames_needed - real_frames,
        }
    }

    /// Drop everything queued and rewind the cursor.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.read_cursor = 0;
        self.buffered_frames = 0;
    }

    fn enqueue(&mut self, block: SampleBlock) {
        self.buffered_frames += block.frame_count();
        self.queue.push_back(block);
    }

    /// Copy up to `frames_needed` frames, handing each to `write` with its
    /// output position. Returns the number of frames copied.
    fn drain_into<F>(&mut self, frames_needed: usize, mut write: F) -> usize
    where
        F: FnMut(usize, &[f32]),
    {
        let mut written = 0;

        while written < frames_needed {
            let Some(chunk) = self.queue.front() else {
                break;
            };

            let frames_in_chunk = chunk.frame_count();
            let available = frames_in_chunk - self.read_cursor;
            let to_copy = (frames_needed - written).min(available);

            for f in 0..to_copy {
                write(written + f, chunk.frame(self.read_cursor + f));
            }

            self.read_cursor += to_copy;
            self.buffered_frames -= to_copy;
            written += to_copy;

            if self.read_cursor >= frames_in_chunk {
                self.queue.pop_front();
                self.read_cursor = 0;
            }
        }

        written
    }

    /// Skip `frames` frames from the head of the queue.
    fn discard_oldest(&mut self, mut frames: usize) -> usize {
        let mut discarded = 0;

        while frames > 0 {
            let Some(head) = self.queue.front() else {
                break;
            };
            let remaining = head.frame_count() - self.read_cursor;

            if remaining <= frames {
                self.queue.pop_front();
                self.read_cursor = 0;
                frames -= remaining;
                discarded += remaining;
            } else {
                self.read_cursor += frames;
                discarded += frames;
                frames = 0;
            }
        }

        self.buffered_frames -= discarded;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(frames: &[(f32, f32)]) -> SampleBlock {
        let samples = frames.iter().flat_map(|&(l, r)| [l, r]).collect();
        SampleBlock::new(samples, 2).unwrap()
    }

    fn unbounded() -> PlaybackBuffer {
        PlaybackBuffer::new(2, None, OverflowPolicy::DropOldest)
    }

    #[test]
    fn empty_buffer_renders_silence() {
        let mut buffer = unbounded();
        let mut left = vec![1.0; 8];
        let mut right = vec![1.0; 8];

        let report = buffer.pull_stereo(&mut left, &mut right);

        assert_eq!(report, PullReport { real_frames: 0, silent_frames: 8 });
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
        assert_eq!(buffer.state(), BufferState::Starved);
    }

    #[test]
    fn deinterleaves_into_channels() {
        let mut buffer = unbounded();
        buffer.push(block(&[(0.1, -0.1), (0.2, -0.2), (0.3, -0.3)])).unwrap();

        let mut left = vec![0.0; 3];
        let mut right = vec![0.0; 3];
        buffer.pull_stereo(&mut left, &mut right);

        assert_eq!(left, vec![0.1, 0.2, 0.3]);
        assert_eq!(right, vec![-0.1, -0.2, -0.3]);
        assert_eq!(buffer.state(), BufferState::Starved);
        assert_eq!(buffer.read_cursor(), 0);
    }

    #[test]
    fn pull_spans_block_boundaries() {
        let mut buffer = unbounded();
        buffer.push(block(&[(1.0, 1.0), (2.0, 2.0)])).unwrap();
        buffer.push(block(&[(3.0, 3.0)])).unwrap();
        buffer.push(block(&[(4.0, 4.0), (5.0, 5.0)])).unwrap();

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        let report = buffer.pull_stereo(&mut left, &mut right);

        assert_eq!(report.real_frames, 4);
        assert_eq!(left, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.buffered_frames(), 1);
        assert_eq!(buffer.queued_blocks(), 1);
        assert_eq!(buffer.read_cursor(), 1);
    }

    #[test]
    fn interleaved_pull_matches_source_layout() {
        let mut buffer = unbounded();
        buffer.push(block(&[(0.5, -0.5), (0.25, -0.25)])).unwrap();

        let mut out = vec![9.0; 6];
        let report = buffer.pull_interleaved(&mut out, 2);

        assert_eq!(report, PullReport { real_frames: 2, silent_frames: 1 });
        assert_eq!(out, vec![0.5, -0.5, 0.25, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn extra_output_channels_are_silent() {
        let mut buffer = unbounded();
        buffer.push(block(&[(0.5, -0.5)])).unwrap();

        let mut out = vec![9.0; 3];
        buffer.pull_interleaved(&mut out, 3);

        assert_eq!(out, vec![0.5, -0.5, 0.0]);
    }

    #[test]
    fn rejects_channel_mismatch() {
        let mut buffer = unbounded();
        let mono = SampleBlock::new(vec![0.1, 0.2], 1).unwrap();
        assert_eq!(
            buffer.push(mono),
            Err(StreamError::ChannelMismatch { expected: 2, got: 1 })
        );
        assert_eq!(buffer.buffered_frames(), 0);
    }

    #[test]
    fn drop_oldest_advances_into_head_block() {
        let mut buffer = PlaybackBuffer::new(2, Some(4), OverflowPolicy::DropOldest);
        buffer.push(block(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)])).unwrap();

        let dropped = buffer.push(block(&[(4.0, 4.0), (5.0, 5.0)])).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(buffer.buffered_frames(), 4);
        assert_eq!(buffer.read_cursor(), 1);

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        buffer.pull_stereo(&mut left, &mut right);
        assert_eq!(left, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn drop_oldest_can_cut_into_new_block() {
        let mut buffer = PlaybackBuffer::new(2, Some(2), OverflowPolicy::DropOldest);
        buffer.push(block(&[(1.0, 1.0)])).unwrap();

        let dropped = buffer
            .push(block(&[(2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]))
            .unwrap();
        assert_eq!(dropped, 2);

        let mut left = vec![0.0; 2];
        let mut right = vec![0.0; 2];
        buffer.pull_stereo(&mut left, &mut right);
        assert_eq!(left, vec![3.0, 4.0]);
    }

    #[test]
    fn drop_newest_truncates_incoming_block() {
        let mut buffer = PlaybackBuffer::new(2, Some(3), OverflowPolicy::DropNewest);
        buffer.push(block(&[(1.0, 1.0), (2.0, 2.0)])).unwrap();

        assert_eq!(buffer.push(block(&[(3.0, 3.0), (4.0, 4.0)])).unwrap(), 1);
        assert_eq!(buffer.push(block(&[(5.0, 5.0)])).unwrap(), 1);
        assert_eq!(buffer.buffered_frames(), 3);
        assert_eq!(buffer.queued_blocks(), 2);

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        buffer.pull_stereo(&mut left, &mut right);
        assert_eq!(left, vec![1.0, 2.0, 3.0, 0.0]);
    }
}
