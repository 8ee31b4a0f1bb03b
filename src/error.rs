use thiserror::Error;

/// Errors surfaced by the streaming pipeline.
///
/// None of these are fatal: the pipeline drops the offending message or
/// block, counts it, and keeps playing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("message of {len} bytes is not a whole number of {frame_bytes}-byte frames")]
    MalformedMessage { len: usize, frame_bytes: usize },

    #[error("sample block is empty")]
    EmptyBlock,

    #[error("sample block of {len} samples does not hold whole {channels}-channel frames")]
    InvalidBlock { len: usize, channels: usize },

    #[error("sample block has {got} channels, playback expects {expected}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("ingress queue is full ({capacity} pending blocks)")]
    IngressFull { capacity: usize },

    #[error("message received while disconnected")]
    NotConnected,

    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),

    #[error("endpoint must use wss:// (got `{0}`)")]
    InsecureEndpoint(String),

    #[error("no endpoint given")]
    MissingEndpoint,
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::InvalidConfig(err.to_string())
    }
}
