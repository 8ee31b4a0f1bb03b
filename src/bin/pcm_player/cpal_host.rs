//! CPAL-based audio host for native playback
//!
//! This module handles CPAL-specific functionality: device selection,
//! stream configuration, and sample format conversion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Sample, SampleFormat, SizedSample, StreamConfig, SupportedBufferSize};
use dasp_sample::FromSample;
use pcm_stream_player::AudioRenderer;
use tracing::{debug, error, info, warn};

// Host callback sizes. ALSA needs larger buffers to avoid underruns.
const JACK_HOST_BUFFER: u32 = 512;
const ALSA_HOST_BUFFER: u32 = 1024;
const DEFAULT_HOST_BUFFER: u32 = 512;

// Scratch size before the first callback tells us the real period.
const INITIAL_SCRATCH_FRAMES: usize = 4096;

/// Configuration the host ended up with
#[derive(Debug, Clone)]
pub struct AudioHostConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: BufferSize,
    pub device_name: String,
    pub host_name: String,
}

/// Audio host that drives a renderer from the CPAL output callback
pub struct AudioHost {
    _stream: cpal::Stream,
    config: AudioHostConfig,
    failed: Arc<AtomicBool>,
}

/// Per-stream state owned by the output callback
struct CallbackState<R: AudioRenderer> {
    renderer: R,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl AudioHost {
    /// Create and start a new audio host.
    ///
    /// If `preferred_host` is provided, it will try to use that host first before
    /// falling back to other available hosts. The device is opened at
    /// `sample_rate` when it supports it; otherwise its default rate is used
    /// and playback runs at the wrong speed.
    pub fn with_host_preference<R: AudioRenderer>(
        renderer: R,
        preferred_host: Option<&str>,
        sample_rate: u32,
    ) -> anyhow::Result<Self> {
        let (device, config, sample_format, host_name) =
            select_output_device(preferred_host, sample_rate)?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());

        if config.sample_rate.0 != sample_rate {
            warn!(
                "device runs at {} Hz but the stream is {} Hz; audio will be pitched",
                config.sample_rate.0, sample_rate
            );
        }

        let host_config = AudioHostConfig {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            buffer_size: config.buffer_size.clone(),
            device_name: device_name.clone(),
            host_name: host_name.clone(),
        };

        let state = CallbackState {
            renderer,
            scratch_left: vec![0.0; INITIAL_SCRATCH_FRAMES],
            scratch_right: vec![0.0; INITIAL_SCRATCH_FRAMES],
        };

        let failed = Arc::new(AtomicBool::new(false));
        let stream_failed = Arc::clone(&failed);
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, R>(&device, &config, state, stream_failed)?,
            SampleFormat::I16 => build_stream::<i16, R>(&device, &config, state, stream_failed)?,
            SampleFormat::U16 => build_stream::<u16, R>(&device, &config, state, stream_failed)?,
            other => anyhow::bail!("unsupported sample format: {:?}", other),
        };

        stream.play().context("failed to start stream")?;

        info!(
            "playing on host '{}', device '{}', {} Hz, {} channels, buffer {:?}",
            host_name, device_name, host_config.sample_rate, host_config.channels,
            host_config.buffer_size
        );

        Ok(Self {
            _stream: stream,
            config: host_config,
            failed,
        })
    }

    /// True once the output stream has reported an error. The callback
    /// may never run again after that.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Get the audio configuration
    pub fn config(&self) -> &AudioHostConfig {
        &self.config
    }
}

/// Select an output device and configure it
fn select_output_device(
    preferred_host: Option<&str>,
    sample_rate: u32,
) -> anyhow::Result<(cpal::Device, StreamConfig, SampleFormat, String)> {
    let mut last_error: Option<anyhow::Error> = None;
    let available_hosts = cpal::available_hosts();

    for host_id in &available_hosts {
        debug!("available audio host: {}", host_id.name());
    }

    // Build host priority list: preferred first, then others
    let mut host_priority = Vec::new();
    if let Some(preferred) = preferred_host {
        match available_hosts.iter().find(|h| h.name() == preferred) {
            Some(&host_id) => host_priority.push(host_id),
            None => warn!("preferred audio host '{}' is not available", preferred),
        }
    }
    for host_id in available_hosts {
        if !host_priority.contains(&host_id) {
            host_priority.push(host_id);
        }
    }

    for host_id in host_priority {
        let host = cpal::host_from_id(host_id)?;
        let host_name = host_id.name().to_string();

        let Some(device) = host.default_output_device() else {
            last_error = Some(anyhow::anyhow!(
                "host {} has no default output device",
                host_name
            ));
            continue;
        };

        match device.supported_output_configs() {
            Ok(configs) => {
                for supported in configs {
                    let sample_format = supported.sample_format();

                    if !matches!(
                        sample_format,
                        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
                    ) {
                        continue;
                    }

                    if supported.min_sample_rate().0 <= sample_rate
                        && supported.max_sample_rate().0 >= sample_rate
                    {
                        let supported_config =
                            supported.with_sample_rate(cpal::SampleRate(sample_rate));
                        let buffer_size =
                            choose_buffer_size(supported_config.buffer_size(), &host_name);
                        let mut config = supported_config.config();
                        config.buffer_size = buffer_size;
                        return Ok((device, config, sample_format, host_name));
                    }
                }
            }
            Err(err) => {
                last_error = Some(anyhow::anyhow!(
                    "failed to enumerate output configs for host {}: {}",
                    host_name,
                    err
                ));
            }
        }

        // Fall back to default config if the stream rate is not available
        match device.default_output_config() {
            Ok(supported) => {
                let sample_format = supported.sample_format();
                let buffer_size = choose_buffer_size(supported.buffer_size(), &host_name);
                let mut config = supported.config();
                config.buffer_size = buffer_size;
                return Ok((device, config, sample_format, host_name));
            }
            Err(err) => {
                last_error = Some(anyhow::anyhow!(
                    "failed to query default output config for host {}: {}",
                    host_name,
                    err
                ));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no usable output device found")))
}

/// Choose an appropriate buffer size based on device capabilities and host type
fn choose_buffer_size(supported: &SupportedBufferSize, host_name: &str) -> BufferSize {
    let preferred = match host_name {
        "JACK" => JACK_HOST_BUFFER,
        "ALSA" => ALSA_HOST_BUFFER,
        _ => DEFAULT_HOST_BUFFER,
    };

    match *supported {
        // JACK picks its own period size and may change it at runtime.
        SupportedBufferSize::Range { .. } if host_name == "JACK" => BufferSize::Default,
        SupportedBufferSize::Range { min, max } => BufferSize::Fixed(preferred.clamp(min, max)),
        SupportedBufferSize::Unknown => BufferSize::Fixed(preferred),
    }
}

/// Build an output stream for the given sample type
fn build_stream<T, R>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: CallbackState<R>,
    failed: Arc<AtomicBool>,
) -> anyhow::Result<cpal::Stream>
where
    T: Sample + SizedSample + FromSample<f32>,
    R: AudioRenderer,
{
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                process_cpal_callback(data, channels, &mut state);
            },
            move |err| {
                error!("stream error: {}", err);
                failed.store(true, Ordering::Release);
            },
            None,
        )
        .context("failed to build stream")?;

    Ok(stream)
}

/// Render one host period and convert it to the device sample format.
///
/// The renderer always produces exactly the number of frames the host asks
/// for, so no carry-over between callbacks is needed.
fn process_cpal_callback<T, R>(output: &mut [T], channels: usize, state: &mut CallbackState<R>)
where
    T: Sample + FromSample<f32>,
    R: AudioRenderer,
{
    if channels == 0 {
        return;
    }
    let frames = output.len() / channels;

    // Only grows if the host hands us a bigger period than ever before.
    if state.scratch_left.len() < frames {
        state.scratch_left.resize(frames, 0.0);
        state.scratch_right.resize(frames, 0.0);
    }

    let left = &mut state.scratch_left[..frames];
    let right = &mut state.scratch_right[..frames];
    state.renderer.process_block(left, right);

    if channels == 1 {
        for (i, sample) in output.iter_mut().enumerate() {
            *sample = T::from_sample::<f32>((left[i] + right[i]) * 0.5);
        }
        return;
    }

    for (i, frame) in output.chunks_exact_mut(channels).enumerate() {
        for (ch, sample) in frame.iter_mut().enumerate() {
            let value = match ch {
                0 => left[i],
                1 => right[i],
                _ => 0.0,
            };
            *sample = T::from_sample::<f32>(value);
        }
    }
}
