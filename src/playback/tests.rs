use super::buffer::{BufferState, PlaybackBuffer, PullReport};
use crate::audio::SampleBlock;
use crate::config::OverflowPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CHANNELS: usize = 2;

/// Frames numbered from `first`; left = n, right = -n - 0.5 so that every
/// sample in a test run is distinct and channel swaps are detectable.
fn numbered_block(first: usize, frames: usize) -> SampleBlock {
    let samples = (first..first + frames)
        .flat_map(|n| [n as f32, -(n as f32) - 0.5])
        .collect();
    SampleBlock::new(samples, CHANNELS).unwrap()
}

fn unbounded() -> PlaybackBuffer {
    PlaybackBuffer::new(CHANNELS, None, OverflowPolicy::DropOldest)
}

fn pull_period(buffer: &mut PlaybackBuffer, frames: usize) -> (Vec<f32>, Vec<f32>, PullReport) {
    let mut left = vec![f32::NAN; frames];
    let mut right = vec![f32::NAN; frames];
    let report = buffer.pull_stereo(&mut left, &mut right);
    (left, right, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sequence_preserved_across_random_periods() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _round in 0..20 {
            let mut buffer = unbounded();
            let mut total = 0;
            for _ in 0..rng.random_range(1..12) {
                let frames = rng.random_range(1..400);
                buffer.push(numbered_block(total, frames)).unwrap();
                total += frames;
            }

            let mut left_out = Vec::new();
            let mut right_out = Vec::new();
            let mut real = 0;
            while left_out.len() < total + 64 {
                let period = rng.random_range(1..300);
                let (left, right, report) = pull_period(&mut buffer, period);
                assert_eq!(report.real_frames + report.silent_frames, period);
                real += report.real_frames;
                left_out.extend(left);
                right_out.extend(right);
            }

            assert_eq!(real, total, "real frames must equal pushed frames");
            for n in 0..total {
                assert_eq!(left_out[n], n as f32, "left frame {}", n);
                assert_eq!(right_out[n], -(n as f32) - 0.5, "right frame {}", n);
            }
            assert!(left_out[total..].iter().all(|&s| s == 0.0));
            assert!(right_out[total..].iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_interleaved_pulls_preserve_sequence_with_interleaved_pushes() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut buffer = unbounded();
        let mut pushed = 0;
        let mut out = Vec::new();

        for _ in 0..500 {
            if rng.random_bool(0.5) {
                let frames = rng.random_range(1..256);
                buffer.push(numbered_block(pushed, frames)).unwrap();
                pushed += frames;
            }
            let period = rng.random_range(1..200);
            let mut period_out = vec![f32::NAN; period * CHANNELS];
            let report = buffer.pull_interleaved(&mut period_out, CHANNELS);
            out.extend_from_slice(&period_out[..report.real_frames * CHANNELS]);
            assert!(period_out[report.real_frames * CHANNELS..]
                .iter()
                .all(|&s| s == 0.0));
        }

        let rendered = out.len() / CHANNELS;
        assert_eq!(rendered + buffer.buffered_frames(), pushed);
        for n in 0..rendered {
            assert_eq!(out[n * CHANNELS], n as f32);
            assert_eq!(out[n * CHANNELS + 1], -(n as f32) - 0.5);
        }
    }

    #[test]
    fn test_underrun_yields_silence_of_requested_length() {
        let mut buffer = unbounded();
        for &period in &[1usize, 128, 441] {
            let (left, right, report) = pull_period(&mut buffer, period);
            assert_eq!(left.len(), period);
            assert_eq!(report, PullReport { real_frames: 0, silent_frames: period });
            assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_partial_chunk_boundary() {
        let mut buffer = unbounded();
        buffer.push(numbered_block(0, 100)).unwrap();

        let (left, _, report) = pull_period(&mut buffer, 60);
        assert_eq!(report.real_frames, 60);
        assert_eq!(left, (0..60).map(|n| n as f32).collect::<Vec<_>>());
        assert_eq!(buffer.read_cursor(), 60);
        assert_eq!(buffer.state(), BufferState::Flowing);

        let (left, right, report) = pull_period(&mut buffer, 60);
        assert_eq!(report, PullReport { real_frames: 40, silent_frames: 20 });
        assert_eq!(&left[..40], &(60..100).map(|n| n as f32).collect::<Vec<_>>()[..]);
        assert!(left[40..].iter().all(|&s| s == 0.0));
        assert!(right[40..].iter().all(|&s| s == 0.0));
        assert_eq!(buffer.state(), BufferState::Starved);
        assert_eq!(buffer.read_cursor(), 0);
    }

    #[test]
    fn test_clear_resets_to_fresh_state() {
        let mut buffer = unbounded();
        buffer.push(numbered_block(0, 50)).unwrap();
        buffer.push(numbered_block(50, 50)).unwrap();
        pull_period(&mut buffer, 30);

        buffer.clear();
        assert_eq!(buffer.read_cursor(), 0);
        assert_eq!(buffer.buffered_frames(), 0);
        assert_eq!(buffer.queued_blocks(), 0);

        let (left, right, _) = pull_period(&mut buffer, 16);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));

        buffer.push(numbered_block(0, 10)).unwrap();
        let (left, _, report) = pull_period(&mut buffer, 10);
        assert_eq!(report.real_frames, 10);
        assert_eq!(left, (0..10).map(|n| n as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_cap_bounds_buffered_frames_under_oversupply() {
        let mut rng = StdRng::seed_from_u64(7);
        for policy in [OverflowPolicy::DropOldest, OverflowPolicy::DropNewest] {
            let mut buffer = PlaybackBuffer::new(CHANNELS, Some(1_000), policy);
            let mut pushed = 0;
            let mut dropped = 0;
            let mut rendered = 0;

            for _ in 0..200 {
                let frames = rng.random_range(50..400);
                dropped += buffer.push(numbered_block(pushed, frames)).unwrap();
                pushed += frames;
                assert!(buffer.buffered_frames() <= 1_000);

                let (_, _, report) = pull_period(&mut buffer, 64);
                rendered += report.real_frames;
            }

            assert_eq!(rendered + dropped + buffer.buffered_frames(), pushed);
        }
    }

    #[test]
    fn test_drop_oldest_keeps_newest_frames_in_order() {
        let mut buffer = PlaybackBuffer::new(CHANNELS, Some(150), OverflowPolicy::DropOldest);
        buffer.push(numbered_block(0, 100)).unwrap();
        buffer.push(numbered_block(100, 100)).unwrap();

        let (left, _, report) = pull_period(&mut buffer, 200);
        assert_eq!(report.real_frames, 150);
        assert_eq!(&left[..150], &(50..200).map(|n| n as f32).collect::<Vec<_>>()[..]);
    }
}
