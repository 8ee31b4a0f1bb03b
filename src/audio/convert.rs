//! Integer PCM to normalized float conversion.

use crate::config::BYTES_PER_SAMPLE;

/// Full-scale magnitude of a signed 16-bit sample.
pub const I16_FULL_SCALE: f32 = 32_768.0;

/// Maps `[-32768, 32767]` onto `[-1.0, 1.0)`.
#[inline(always)]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_FULL_SCALE
}

/// Convert a run of samples, keeping their order.
pub fn i16_to_f32_block<I>(input: I) -> Vec<f32>
where
    I: IntoIterator<Item = i16>,
{
    input.into_iter().map(i16_to_f32).collect()
}

/// Decode little-endian signed 16-bit samples straight to floats.
///
/// A trailing odd byte, if any, is ignored; callers validate frame
/// alignment before decoding.
pub fn decode_le_i16(bytes: &[u8]) -> Vec<f32> {
    i16_to_f32_block(
        bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    )
}
