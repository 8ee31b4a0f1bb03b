//! Instantaneous loudness of a block.

use super::block::SampleBlock;

/// RMS of the per-frame channel average.
///
/// Each frame is collapsed to the mean of its channels before squaring, so
/// perfectly out-of-phase channels read as silence. Returns 0 for no frames.
pub fn rms_level(samples: &[f32], channels: usize) -> f32 {
    if channels == 0 {
        return 0.0;
    }
    let frames = samples.len() / channels;
    if frames == 0 {
        return 0.0;
    }

    let scale = 1.0 / channels as f64;
    let sum: f64 = samples
        .chunks_exact(channels)
        .map(|frame| {
            let mid = frame.iter().map(|&s| s as f64).sum::<f64>() * scale;
            mid * mid
        })
        .sum();

    (sum / frames as f64).sqrt() as f32
}

pub fn block_level(block: &SampleBlock) -> f32 {
    rms_level(block.as_slice(), block.channels())
}
