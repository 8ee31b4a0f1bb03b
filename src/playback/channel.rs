//! Single-producer/single-consumer hand-off from ingress to render.
//!
//! Blocks cross over a lock-free ring. Clearing is a generation counter
//! rather than a queued command: every block carries the generation that
//! was current when it was sent, and the render side throws away anything
//! older than the newest generation it has seen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};

use super::scheduler::RenderScheduler;
use super::stats::PlaybackStats;
use crate::audio::SampleBlock;
use crate::config::StreamConfig;
use crate::error::StreamError;

pub(crate) struct SequencedBlock {
    pub(crate) generation: u64,
    pub(crate) block: SampleBlock,
}

/// Ingress half of the playback channel.
pub struct BlockSender {
    producer: HeapProd<SequencedBlock>,
    clear_generation: Arc<AtomicU64>,
    stats: Arc<PlaybackStats>,
    channels: usize,
}

impl BlockSender {
    /// Queue a block for playback without blocking.
    pub fn send_block(&mut self, block: SampleBlock) -> Result<(), StreamError> {
        if block.channels() != self.channels {
            return Err(StreamError::ChannelMismatch {
                expected: self.channels,
                got: block.channels(),
            });
        }

        // Only this half ever bumps the generation.
        let generation = self.clear_generation.load(Ordering::Relaxed);
        self.producer
            .try_push(SequencedBlock { generation, block })
            .map_err(|_| {
                self.stats.record_ingress_rejection();
                StreamError::IngressFull {
                    capacity: self.producer.capacity().get(),
                }
            })
    }

    /// Discard everything sent so far. Takes effect on the next render period.
    pub fn request_clear(&self) {
        self.clear_generation.fetch_add(1, Ordering::Release);
    }

    /// Blocks sent but not yet picked up by the render side.
    pub fn pending_blocks(&self) -> usize {
        self.producer.occupied_len()
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.stats
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Create the two halves of a playback pipeline for `config`.
pub fn playback_channel(
    config: &StreamConfig,
) -> Result<(BlockSender, RenderScheduler), StreamError> {
    config.validate()?;

    let ring = HeapRb::<SequencedBlock>::new(config.ingress_capacity);
    let (producer, consumer) = ring.split();
    let clear_generation = Arc::new(AtomicU64::new(0));
    let stats = Arc::new(PlaybackStats::new());

    let sender = BlockSender {
        producer,
        clear_generation: Arc::clone(&clear_generation),
        stats: Arc::clone(&stats),
        channels: config.channels,
    };
    let scheduler = RenderScheduler::new(config, consumer, clear_generation, stats);

    Ok((sender, scheduler))
}
