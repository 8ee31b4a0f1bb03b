//! Emulated network source.
//!
//! Cuts a PCM source into wire messages and delivers them to the ingress
//! adapter with irregular arrival times, the way a live socket would.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use pcm_stream_player::{IngressAdapter, LevelSink, StreamConfig, StreamError};
use rand::Rng;
use tracing::{info, warn};

/// Where the wire bytes come from.
pub enum PcmSource {
    /// Raw interleaved s16le frames.
    Raw(Box<dyn Read + Send>),
    Wav(hound::WavReader<BufReader<File>>),
}

impl PcmSource {
    /// Open `path` (`-` for stdin). Files ending in `.wav` are parsed as WAV.
    pub fn open(path: &str, config: &StreamConfig) -> anyhow::Result<Self> {
        if path == "-" {
            return Ok(Self::Raw(Box::new(io::stdin())));
        }

        if path.to_ascii_lowercase().ends_with(".wav") {
            let reader = hound::WavReader::open(path)
                .with_context(|| format!("failed to open WAV file {}", path))?;
            let spec = reader.spec();
            if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
                anyhow::bail!(
                    "unsupported WAV format: bits_per_sample={} sample_format={:?}",
                    spec.bits_per_sample,
                    spec.sample_format
                );
            }
            if spec.channels as usize != config.channels {
                anyhow::bail!(
                    "WAV has {} channels, stream expects {}",
                    spec.channels,
                    config.channels
                );
            }
            if spec.sample_rate != config.sample_rate {
                warn!(
                    "WAV is {} Hz, stream is {} Hz; playing without resampling",
                    spec.sample_rate, config.sample_rate
                );
            }
            return Ok(Self::Wav(reader));
        }

        let file = File::open(path).with_context(|| format!("failed to open {}", path))?;
        Ok(Self::Raw(Box::new(BufReader::new(file))))
    }

    /// Next message of up to `frames` frames, or `None` at end of input.
    fn next_message(&mut self, frames: usize, frame_bytes: usize) -> anyhow::Result<Option<Vec<u8>>> {
        let wanted = frames * frame_bytes;
        let mut message = Vec::with_capacity(wanted);

        match self {
            Self::Raw(reader) => {
                reader
                    .by_ref()
                    .take(wanted as u64)
                    .read_to_end(&mut message)
                    .context("failed to read PCM input")?;
                // A torn trailing frame can only happen at end of input.
                message.truncate(message.len() - message.len() % frame_bytes);
            }
            Self::Wav(reader) => {
                let samples = wanted / 2;
                for sample in reader.samples::<i16>().take(samples) {
                    let sample = sample.context("failed to read WAV sample")?;
                    message.extend_from_slice(&sample.to_le_bytes());
                }
                message.truncate(message.len() - message.len() % frame_bytes);
            }
        }

        Ok((!message.is_empty()).then_some(message))
    }
}

/// Arrival pacing of emulated messages.
#[derive(Debug, Clone, Copy)]
pub struct FeedTiming {
    pub chunk_frames: usize,
    pub jitter: Duration,
}

/// Level sink keeping the loudest level since it was last read.
#[derive(Clone, Default)]
pub struct PeakMeter {
    peak_bits: Arc<AtomicU32>,
}

impl PeakMeter {
    /// Return the peak level and reset it.
    pub fn take_peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.swap(0, Ordering::Relaxed))
    }
}

impl LevelSink for PeakMeter {
    fn on_level(&mut self, level: f32) {
        // Non-negative floats order the same as their bit patterns.
        self.peak_bits.fetch_max(level.max(0.0).to_bits(), Ordering::Relaxed);
    }
}

/// Deliver the whole source, then hand the adapter back still connected.
pub fn spawn_feeder(
    mut source: PcmSource,
    mut ingress: IngressAdapter<PeakMeter>,
    config: &StreamConfig,
    timing: FeedTiming,
) -> JoinHandle<anyhow::Result<IngressAdapter<PeakMeter>>> {
    let frame_bytes = config.frame_bytes();
    let chunk_frames = timing.chunk_frames.max(1);
    let period = Duration::from_secs_f64(chunk_frames as f64 / config.sample_rate as f64);

    thread::spawn(move || {
        let mut rng = rand::rng();
        let start = Instant::now();
        let mut due = Duration::ZERO;
        let mut sent = 0u64;

        ingress.on_connect();

        while let Some(message) = source.next_message(chunk_frames, frame_bytes)? {
            // Late by a random amount, but never drifting from the source rate.
            let lateness = if timing.jitter.is_zero() {
                Duration::ZERO
            } else {
                timing.jitter.mul_f64(rng.random::<f64>())
            };
            let arrival = start + due + lateness;
            if let Some(wait) = arrival.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
            due += period;

            match ingress.on_message(&message) {
                Ok(_) => sent += 1,
                Err(StreamError::IngressFull { capacity }) => {
                    warn!("render side is not keeping up ({} blocks queued)", capacity)
                }
                Err(err) => warn!("message rejected: {}", err),
            }
        }

        info!("end of input after {} messages", sent);
        Ok(ingress)
    })
}
