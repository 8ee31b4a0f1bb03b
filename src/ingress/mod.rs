//! Network-side entry point.
//!
//! Driven by the transport's lifecycle hooks. Each binary message is
//! validated, decoded to floats, metered and handed to the render side.
//! Runs on the non-real-time context, so this is where logging happens.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::{block_level, decode_le_i16, SampleBlock};
use crate::config::BYTES_PER_SAMPLE;
use crate::error::StreamError;
use crate::playback::{BlockSender, PlaybackStats};
use crate::traits::LevelSink;

const STATS_LOG_INTERVAL: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Connected, no valid audio received yet.
    AwaitingAudio,
    Streaming,
}

pub struct IngressAdapter<L: LevelSink> {
    sender: BlockSender,
    level_sink: L,
    state: SessionState,
    frame_bytes: usize,
    accepted: u64,
}

impl<L: LevelSink> IngressAdapter<L> {
    pub fn new(sender: BlockSender, level_sink: L) -> Self {
        let frame_bytes = sender.channels() * BYTES_PER_SAMPLE;
        Self {
            sender,
            level_sink,
            state: SessionState::Disconnected,
            frame_bytes,
            accepted: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        self.sender.stats()
    }

    /// Blocks accepted but not yet picked up by the render side.
    pub fn pending_blocks(&self) -> usize {
        self.sender.pending_blocks()
    }

    pub fn on_connect(&mut self) {
        if self.state == SessionState::Disconnected {
            info!("stream connected, awaiting audio");
            self.state = SessionState::AwaitingAudio;
        }
    }

    /// Handle one binary message.
    ///
    /// Returns the level of the decoded block. Rejected messages leave the
    /// playback state untouched.
    pub fn on_message(&mut self, bytes: &[u8]) -> Result<f32, StreamError> {
        let stats = Arc::clone(self.sender.stats());
        stats.record_message();

        if self.state == SessionState::Disconnected {
            stats.record_ignored();
            return Err(StreamError::NotConnected);
        }

        let block = match self.decode(bytes) {
            Ok(block) => block,
            Err(err) => {
                stats.record_malformed();
                warn!("dropping message: {}", err);
                return Err(err);
            }
        };

        let level = block_level(&block);
        stats.record_level(level);
        self.level_sink.on_level(level);

        if let Err(err) = self.sender.send_block(block) {
            warn!("dropping message: {}", err);
            return Err(err);
        }

        if self.state == SessionState::AwaitingAudio {
            info!("receiving audio");
            self.state = SessionState::Streaming;
        }

        self.accepted += 1;
        if self.accepted % STATS_LOG_INTERVAL == 0 {
            let snapshot = stats.snapshot();
            debug!(
                "ingress: messages={}, malformed={}, buffered={} frames, underrun periods={}",
                snapshot.messages_received,
                snapshot.malformed_messages,
                snapshot.buffered_frames,
                snapshot.underrun_periods
            );
        }

        Ok(level)
    }

    /// Stop playback of anything already received.
    pub fn on_disconnect(&mut self) {
        self.sender.request_clear();
        if self.state != SessionState::Disconnected {
            info!("stream disconnected, playback cleared");
        }
        self.state = SessionState::Disconnected;
    }

    fn decode(&self, bytes: &[u8]) -> Result<SampleBlock, StreamError> {
        if bytes.len() % self.frame_bytes != 0 {
            return Err(StreamError::MalformedMessage {
                len: bytes.len(),
                frame_bytes: self.frame_bytes,
            });
        }
        SampleBlock::new(decode_le_i16(bytes), self.sender.channels())
    }
}
