//! Stream configuration and wire-format constants.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Channels carried by the wire format (interleaved left/right).
pub const WIRE_CHANNELS: usize = 2;
/// Bytes per wire sample (signed 16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;
/// Rate the producer samples at.
pub const WIRE_SAMPLE_RATE: u32 = 48_000;

const DEFAULT_MAX_BUFFERED_SECONDS: usize = 2;
const DEFAULT_INGRESS_CAPACITY: usize = 256;

/// What the playback buffer discards once `max_buffered_frames` is exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest buffered frames, keeping latency bounded.
    #[default]
    DropOldest,
    /// Truncate the incoming block to whatever still fits.
    DropNewest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// `None` disables the cap entirely.
    pub max_buffered_frames: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub ingress_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: WIRE_SAMPLE_RATE,
            channels: WIRE_CHANNELS,
            max_buffered_frames: Some(WIRE_SAMPLE_RATE as usize * DEFAULT_MAX_BUFFERED_SECONDS),
            overflow_policy: OverflowPolicy::DropOldest,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
        }
    }
}

impl StreamConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        let config: StreamConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.sample_rate == 0 {
            return Err(StreamError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(StreamError::InvalidConfig(
                "channels must be positive".to_string(),
            ));
        }
        if self.max_buffered_frames == Some(0) {
            return Err(StreamError::InvalidConfig(
                "max_buffered_frames must be positive or null".to_string(),
            ));
        }
        if self.ingress_capacity == 0 {
            return Err(StreamError::InvalidConfig(
                "ingress_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Size in bytes of one wire frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels * BYTES_PER_SAMPLE
    }

    pub fn frames_for_millis(&self, millis: u32) -> usize {
        (self.sample_rate as u64 * millis as u64 / 1000) as usize
    }

    /// Builder-style override of the buffering cap expressed in milliseconds.
    pub fn with_max_buffered_millis(mut self, millis: u32) -> Self {
        self.max_buffered_frames = Some(self.frames_for_millis(millis).max(1));
        self
    }
}

/// Normalize a user-supplied stream endpoint.
///
/// Plain `ws://` URLs are upgraded to `wss://`; any other scheme is refused.
pub fn secure_endpoint(url: &str) -> Result<String, StreamError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(StreamError::MissingEndpoint);
    }

    if let Some(rest) = url.strip_prefix("ws://") {
        return Ok(format!("wss://{}", rest));
    }

    if url.starts_with("wss://") {
        Ok(url.to_string())
    } else {
        Err(StreamError::InsecureEndpoint(url.to_string()))
    }
}
