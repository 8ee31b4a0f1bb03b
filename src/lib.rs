pub mod audio;
pub mod config;
pub mod error;
pub mod ingress;
pub mod playback;
pub mod traits;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use audio::{block_level, decode_le_i16, i16_to_f32, rms_level, SampleBlock};
pub use config::{secure_endpoint, OverflowPolicy, StreamConfig};
pub use error::StreamError;
pub use ingress::{IngressAdapter, SessionState};
pub use playback::{
    playback_channel, BlockSender, BufferState, PlaybackBuffer, PlaybackStats, PullReport,
    RenderScheduler, StatsSnapshot,
};
pub use traits::{AudioRenderer, LevelSink, NoLevel};

#[cfg(feature = "wasm")]
pub use wasm::{normalize_endpoint, PcmStreamProcessor};
