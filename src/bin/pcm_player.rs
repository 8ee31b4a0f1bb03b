mod cpal_host;
mod feed;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use cpal_host::AudioHost;
use feed::{FeedTiming, PcmSource, PeakMeter};
use pcm_stream_player::{playback_channel, IngressAdapter, PlaybackStats, StreamConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const METER_WIDTH: usize = 30;
const STATS_INTERVAL: Duration = Duration::from_secs(1);
const DRAIN_POLL: Duration = Duration::from_millis(20);
const DRAIN_MARGIN: Duration = Duration::from_secs(1);

/// Play a live interleaved s16le PCM stream through the default output device.
///
/// The input is delivered in message-sized chunks with randomized arrival
/// times, so the jitter buffer sees the same irregular timing a network
/// socket produces.
#[derive(Debug, Parser)]
#[command(name = "pcm_player", version)]
struct Args {
    /// Raw PCM file, `-` for stdin, or a 16-bit .wav file
    input: String,

    /// Frames per emulated network message
    #[arg(long, default_value_t = 960)]
    chunk_frames: usize,

    /// Maximum extra arrival delay per message, in milliseconds
    #[arg(long, default_value_t = 20)]
    jitter_ms: u64,

    /// Cap on buffered audio, in milliseconds
    #[arg(long)]
    max_buffered_ms: Option<u32>,

    /// JSON stream configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preferred audio host (e.g. ALSA, JACK, CoreAudio, WASAPI)
    #[arg(long)]
    host: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            StreamConfig::from_json(&json)?
        }
        None => StreamConfig::default(),
    };
    if let Some(millis) = args.max_buffered_ms {
        config = config.with_max_buffered_millis(millis);
    }

    let source = PcmSource::open(&args.input, &config)?;
    let (sender, scheduler) = playback_channel(&config)?;
    let stats = Arc::clone(scheduler.stats());
    let meter = PeakMeter::default();

    let host = AudioHost::with_host_preference(scheduler, args.host.as_deref(), config.sample_rate)?;
    info!(
        "stream: {} Hz, {} channels, cap {:?} frames ({:?}), output on {} via {}",
        config.sample_rate,
        config.channels,
        config.max_buffered_frames,
        config.overflow_policy,
        host.config().device_name,
        host.config().host_name
    );

    let feeder = feed::spawn_feeder(
        source,
        IngressAdapter::new(sender, meter.clone()),
        &config,
        FeedTiming {
            chunk_frames: args.chunk_frames,
            jitter: Duration::from_millis(args.jitter_ms),
        },
    );

    while !feeder.is_finished() {
        thread::sleep(STATS_INTERVAL);
        log_stats(&stats, meter.take_peak());
        if host.has_failed() {
            anyhow::bail!("audio output stopped while streaming");
        }
    }

    let mut ingress = feeder
        .join()
        .map_err(|_| anyhow::anyhow!("feeder thread panicked"))??;

    // Let the tail of the stream play out before disconnecting.
    let queued_frames = stats.buffered_frames() + ingress.pending_blocks() * args.chunk_frames;
    let drained = wait_for_drain(
        || ingress.pending_blocks() == 0 && stats.buffered_frames() == 0,
        || host.has_failed(),
        drain_deadline(queued_frames, config.sample_rate),
    );
    ingress.on_disconnect();
    log_stats(&stats, meter.take_peak());

    drained
}

/// Time the queued audio needs to play out, plus slack for the host period.
fn drain_deadline(queued_frames: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(queued_frames as f64 / sample_rate.max(1) as f64) + DRAIN_MARGIN
}

/// Poll until `is_idle` holds twice in a row, since the render side updates
/// the gauge after popping. Gives up when the output fails or `deadline`
/// passes.
fn wait_for_drain(
    mut is_idle: impl FnMut() -> bool,
    has_failed: impl Fn() -> bool,
    deadline: Duration,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut idle_polls = 0;
    while idle_polls < 2 {
        if has_failed() {
            anyhow::bail!("audio output stopped before the stream drained");
        }
        if start.elapsed() > deadline {
            anyhow::bail!("stream did not drain within {:?}", deadline);
        }
        thread::sleep(DRAIN_POLL);
        if is_idle() {
            idle_polls += 1;
        } else {
            idle_polls = 0;
        }
    }
    Ok(())
}

fn log_stats(stats: &PlaybackStats, peak: f32) {
    let snap = stats.snapshot();
    info!(
        "[{}] buffered={} frames, rendered={}, silent={}, underruns={}, dropped={}, malformed={}",
        meter_bar(peak),
        snap.buffered_frames,
        snap.frames_rendered,
        snap.silent_frames,
        snap.underrun_periods,
        snap.frames_dropped,
        snap.malformed_messages
    );
}

/// Text level meter with a square-root display curve.
fn meter_bar(level: f32) -> String {
    let filled = ((level.clamp(0.0, 1.0).sqrt() * METER_WIDTH as f32).round() as usize)
        .min(METER_WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(METER_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_bar_uses_square_root_curve() {
        assert_eq!(meter_bar(0.0), "-".repeat(METER_WIDTH));
        assert_eq!(meter_bar(1.0), "#".repeat(METER_WIDTH));
        assert_eq!(meter_bar(0.25).matches('#').count(), METER_WIDTH / 2);
        assert_eq!(meter_bar(4.0).len(), METER_WIDTH);
    }

    #[test]
    fn drain_deadline_covers_queued_audio() {
        assert_eq!(drain_deadline(0, 48_000), DRAIN_MARGIN);
        assert_eq!(drain_deadline(96_000, 48_000), Duration::from_secs(2) + DRAIN_MARGIN);
    }

    #[test]
    fn drain_finishes_after_two_idle_polls() {
        let mut polls = 0;
        let result = wait_for_drain(
            || {
                polls += 1;
                polls > 1
            },
            || false,
            Duration::from_secs(5),
        );
        assert!(result.is_ok());
        assert_eq!(polls, 3);
    }

    #[test]
    fn drain_gives_up_when_output_never_renders() {
        let start = Instant::now();
        let result = wait_for_drain(|| false, || false, Duration::from_millis(100));
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn drain_stops_on_failed_output() {
        let result = wait_for_drain(|| false, || true, Duration::from_secs(60));
        assert!(result.unwrap_err().to_string().contains("audio output stopped"));
    }
}
