//! JavaScript surface for running the player inside an AudioWorklet.
//!
//! The worklet's message port feeds `on_message` and the worklet's
//! `process` callback calls `process` once per render quantum. Both run on
//! the audio rendering thread, so the channel between them is never
//! contended here, but the same pipeline is used as on native hosts.

use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use web_sys::console;

use crate::config::{secure_endpoint, StreamConfig};
use crate::error::StreamError;
use crate::ingress::{IngressAdapter, SessionState};
use crate::playback::{playback_channel, RenderScheduler};
use crate::traits::NoLevel;

#[cfg(target_arch = "wasm32")]
fn log_console(message: &str) {
    console::log_1(&message.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn log_console(message: &str) {
    tracing::info!("{}", message);
}

fn to_js(err: StreamError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct PcmStreamProcessor {
    ingress: IngressAdapter<NoLevel>,
    scheduler: RenderScheduler,
}

#[wasm_bindgen]
impl PcmStreamProcessor {
    /// `max_buffered_ms` of 0 keeps the default cap.
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: u32, max_buffered_ms: u32) -> Result<PcmStreamProcessor, JsValue> {
        let mut config = StreamConfig {
            sample_rate,
            ..StreamConfig::default()
        };
        if max_buffered_ms > 0 {
            config = config.with_max_buffered_millis(max_buffered_ms);
        }

        let (sender, scheduler) = playback_channel(&config).map_err(to_js)?;
        log_console(&format!(
            "PCM stream processor: {} Hz, {} channels, cap {:?} frames",
            config.sample_rate, config.channels, config.max_buffered_frames
        ));

        Ok(Self {
            ingress: IngressAdapter::new(sender, NoLevel),
            scheduler,
        })
    }

    pub fn on_connect(&mut self) {
        self.ingress.on_connect();
        log_console("Connected, awaiting audio");
    }

    /// Returns the message level for the meter display.
    pub fn on_message(&mut self, bytes: &[u8]) -> Result<f32, JsValue> {
        let was_waiting = self.ingress.state() == SessionState::AwaitingAudio;
        let level = self.ingress.on_message(bytes).map_err(to_js)?;
        if was_waiting {
            log_console("Receiving audio");
        }
        Ok(level)
    }

    pub fn on_disconnect(&mut self) {
        self.ingress.on_disconnect();
        log_console("Disconnected");
    }

    /// AudioWorklet render callback. Always keeps the processor alive.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        self.scheduler.render(&mut [left, right]);
        true
    }

    pub fn level(&self) -> f32 {
        self.ingress.stats().last_level()
    }

    pub fn buffered_frames(&self) -> usize {
        self.scheduler.buffered_frames()
    }

    pub fn is_streaming(&self) -> bool {
        self.ingress.state() == SessionState::Streaming
    }

    pub fn stats(&self) -> Result<JsValue, JsValue> {
        let snapshot = self.ingress.stats().snapshot();
        serde_wasm_bindgen::to_value(&snapshot).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

/// Upgrade `ws://` to `wss://` and refuse anything else.
#[wasm_bindgen]
pub fn normalize_endpoint(url: &str) -> Result<String, JsValue> {
    secure_endpoint(url).map_err(to_js)
}
