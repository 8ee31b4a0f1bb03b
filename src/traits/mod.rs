// src/traits/mod.rs

/// Something an audio host can call once per hardware period.
pub trait AudioRenderer: Send + 'static {
    /// Fill the provided buffers with exactly one period of audio.
    fn process_block(&mut self, output_left: &mut [f32], output_right: &mut [f32]);
}

/// Receiver of per-message loudness values (a level meter display).
pub trait LevelSink {
    fn on_level(&mut self, level: f32);
}

impl<F> LevelSink for F
where
    F: FnMut(f32),
{
    fn on_level(&mut self, level: f32) {
        self(level)
    }
}

/// Discards level values.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLevel;

impl LevelSink for NoLevel {
    fn on_level(&mut self, _level: f32) {}
}
