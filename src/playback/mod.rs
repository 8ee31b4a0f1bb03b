pub mod buffer;
pub mod channel;
pub mod scheduler;
pub mod stats;

pub use buffer::{BufferState, PlaybackBuffer, PullReport};
pub use channel::{playback_channel, BlockSender};
pub use scheduler::RenderScheduler;
pub use stats::{PlaybackStats, StatsSnapshot};

#[cfg(test)]
mod tests;
