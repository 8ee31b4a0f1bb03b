pub mod block;
pub mod convert;
pub mod meter;

pub use block::SampleBlock;
pub use convert::{decode_le_i16, i16_to_f32, i16_to_f32_block};
pub use meter::{block_level, rms_level};
