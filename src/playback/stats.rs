//! Counters shared between the ingress and render contexts.
//!
//! Everything is a relaxed atomic: the render path only ever does
//! `fetch_add`/`store`, so it stays wait-free.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

use super::buffer::PullReport;

#[derive(Debug, Default)]
pub struct PlaybackStats {
    messages_received: AtomicU64,
    malformed_messages: AtomicU64,
    ignored_messages: AtomicU64,
    ingress_rejections: AtomicU64,
    frames_pushed: AtomicU64,
    frames_dropped: AtomicU64,
    frames_rendered: AtomicU64,
    silent_frames: AtomicU64,
    underrun_periods: AtomicU64,
    periods_rendered: AtomicU64,
    clears: AtomicU64,
    buffered_frames: AtomicU64,
    last_level: AtomicU32,
}

/// Point-in-time copy of [`PlaybackStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub malformed_messages: u64,
    pub ignored_messages: u64,
    pub ingress_rejections: u64,
    pub frames_pushed: u64,
    pub frames_dropped: u64,
    pub frames_rendered: u64,
    pub silent_frames: u64,
    pub underrun_periods: u64,
    pub periods_rendered: u64,
    pub clears: u64,
    pub buffered_frames: u64,
    pub last_level: f32,
}

impl PlaybackStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ingress_rejection(&self) {
        self.ingress_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_level(&self, level: f32) {
        self.last_level.store(level.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn record_push(&self, frames: usize, dropped: usize) {
        self.frames_pushed.fetch_add(frames as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.frames_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pull(&self, report: PullReport, buffered_frames: usize) {
        self.periods_rendered.fetch_add(1, Ordering::Relaxed);
        self.frames_rendered
            .fetch_add(report.real_frames as u64, Ordering::Relaxed);
        if report.is_underrun() {
            self.silent_frames
                .fetch_add(report.silent_frames as u64, Ordering::Relaxed);
            self.underrun_periods.fetch_add(1, Ordering::Relaxed);
        }
        self.set_buffered(buffered_frames);
    }

    pub(crate) fn set_buffered(&self, frames: usize) {
        self.buffered_frames.store(frames as u64, Ordering::Relaxed);
    }

    pub fn buffered_frames(&self) -> u64 {
        self.buffered_frames.load(Ordering::Relaxed)
    }

    pub fn last_level(&self) -> f32 {
        f32::from_bits(self.last_level.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            ignored_messages: self.ignored_messages.load(Ordering::Relaxed),
            ingress_rejections: self.ingress_rejections.load(Ordering::Relaxed),
            frames_pushed: self.frames_pushed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            silent_frames: self.silent_frames.load(Ordering::Relaxed),
            underrun_periods: self.underrun_periods.load(Ordering::Relaxed),
            periods_rendered: self.periods_rendered.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            buffered_frames: self.buffered_frames.load(Ordering::Relaxed),
            last_level: self.last_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulls_count_underruns_only_when_silent() {
        let stats = PlaybackStats::new();
        stats.record_pull(PullReport { real_frames: 128, silent_frames: 0 }, 10);
        stats.record_pull(PullReport { real_frames: 28, silent_frames: 100 }, 0);

        let snap = stats.snapshot();
        assert_eq!(snap.periods_rendered, 2);
        assert_eq!(snap.frames_rendered, 156);
        assert_eq!(snap.silent_frames, 100);
        assert_eq!(snap.underrun_periods, 1);
        assert_eq!(snap.buffered_frames, 0);
    }

    #[test]
    fn level_round_trips_through_bits() {
        let stats = PlaybackStats::new();
        stats.record_level(0.3125);
        assert_eq!(stats.last_level(), 0.3125);
    }
}
