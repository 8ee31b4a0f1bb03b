//! Render-clock side of the pipeline.
//!
//! Called once per hardware period. Picks up whatever the ingress side has
//! sent, applies pending clears, then pulls exactly one period from the
//! playback buffer. Nothing here blocks, logs or waits for data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::buffer::{BufferState, PlaybackBuffer, PullReport};
use super::channel::SequencedBlock;
use super::stats::PlaybackStats;
use crate::config::StreamConfig;
use crate::traits::AudioRenderer;

pub struct RenderScheduler {
    incoming: HeapCons<SequencedBlock>,
    buffer: PlaybackBuffer,
    clear_generation: Arc<AtomicU64>,
    generation: u64,
    stats: Arc<PlaybackStats>,
}

impl RenderScheduler {
    pub(crate) fn new(
        config: &StreamConfig,
        incoming: HeapCons<SequencedBlock>,
        clear_generation: Arc<AtomicU64>,
        stats: Arc<PlaybackStats>,
    ) -> Self {
        Self {
            incoming,
            buffer: PlaybackBuffer::from_config(config),
            clear_generation,
            generation: 0,
            stats,
        }
    }

    /// Render one period into per-channel output slices.
    pub fn render(&mut self, outputs: &mut [&mut [f32]]) -> PullReport {
        self.drain_incoming();
        let report = self.buffer.pull(outputs);
        self.stats.record_pull(report, self.buffer.buffered_frames());
        report
    }

    /// Render one period into an interleaved output slice.
    pub fn render_interleaved(&mut self, output: &mut [f32], channels: usize) -> PullReport {
        self.drain_incoming();
        let report = self.buffer.pull_interleaved(output, channels);
        self.stats.record_pull(report, self.buffer.buffered_frames());
        report
    }

    pub fn state(&self) -> BufferState {
        self.buffer.state()
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.buffered_frames()
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.stats
    }

    fn drain_incoming(&mut self) {
        self.apply_generation(self.clear_generation.load(Ordering::Acquire));

        while let Some(SequencedBlock { generation, block }) = self.incoming.try_pop() {
            if generation < self.generation {
                continue;
            }
            self.apply_generation(generation);

            let frames = block.frame_count();
            match self.buffer.push(block) {
                Ok(dropped) => self.stats.record_push(frames, dropped),
                Err(_) => self.stats.record_malformed(),
            }
        }
    }

    fn apply_generation(&mut self, generation: u64) {
        if generation > self.generation {
            self.buffer.clear();
            self.generation = generation;
            self.stats.record_clear();
        }
    }
}

impl AudioRenderer for RenderScheduler {
    fn process_block(&mut self, output_left: &mut [f32], output_right: &mut [f32]) {
        self.render(&mut [output_left, output_right]);
    }
}
