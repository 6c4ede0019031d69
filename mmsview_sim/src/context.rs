//! Simulated media element and control surface for deterministic testing.

use mmsview_env::{ControlSurface, EnvError, MediaElement, MediaEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Timing model of the simulated player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaTiming {
    /// Nominal interval between presented frames, seconds of wall time
    pub frame_interval: f64,
    /// Relative jitter of each interval, `0.3` = ±30%
    pub jitter: f64,
    /// Frames the element may still present after a pause request
    pub max_pause_latency: u32,
}

impl Default for MediaTiming {
    fn default() -> Self {
        Self {
            frame_interval: 1.0 / 30.0,
            jitter: 0.3,
            max_pause_latency: 3,
        }
    }
}

/// Media element backed by a virtual clock.
///
/// Nothing moves unless [`tick`](Self::tick) is called. Frame intervals and
/// the delay between a pause request and its confirmation are drawn from a
/// seeded ChaCha8 RNG, so a run is reproducible from its seed.
pub struct SimMedia {
    time: f64,
    duration: f64,
    rate: f64,
    playing: bool,
    /// Frames left before the pause is confirmed
    pause_pending: Option<u32>,
    timing: MediaTiming,
    rng: ChaCha8Rng,
    /// Virtual wall-clock seconds elapsed
    wall_time: f64,
    frames_presented: u64,
    seeks: u64,
}

impl SimMedia {
    pub fn new(seed: u64, duration: f64) -> Self {
        Self::with_timing(seed, duration, MediaTiming::default())
    }

    pub fn with_timing(seed: u64, duration: f64, timing: MediaTiming) -> Self {
        Self {
            time: 0.0,
            duration: duration.max(0.0),
            rate: 1.0,
            playing: false,
            pause_pending: None,
            timing,
            rng: ChaCha8Rng::seed_from_u64(seed),
            wall_time: 0.0,
            frames_presented: 0,
            seeks: 0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn wall_time(&self) -> f64 {
        self.wall_time
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn seeks(&self) -> u64 {
        self.seeks
    }

    pub fn is_pause_pending(&self) -> bool {
        self.pause_pending.is_some()
    }

    fn next_interval(&mut self) -> f64 {
        let j = self.timing.jitter.clamp(0.0, 0.9);
        let factor = if j > 0.0 { self.rng.gen_range(1.0 - j..1.0 + j) } else { 1.0 };
        self.timing.frame_interval * factor
    }

    /// Advances to the next display refresh and returns what the element
    /// reports, or `None` while it is stopped.
    pub fn tick(&mut self) -> Option<MediaEvent> {
        if !self.playing {
            return None;
        }

        if let Some(remaining) = self.pause_pending {
            if remaining == 0 {
                self.playing = false;
                self.pause_pending = None;
                return Some(MediaEvent::Paused);
            }
            self.pause_pending = Some(remaining - 1);
        }

        let interval = self.next_interval();
        self.wall_time += interval;
        self.time = (self.time + interval * self.rate).min(self.duration);
        self.frames_presented += 1;

        if self.time >= self.duration && self.pause_pending.is_none() {
            // Ended: the element stops on its own right after this frame
            self.pause_pending = Some(0);
        }
        Some(MediaEvent::Frame { media_time: self.time })
    }
}

impl MediaElement for SimMedia {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn seek(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.time = seconds.clamp(0.0, self.duration);
            self.seeks += 1;
        }
    }

    fn play(&mut self) -> Result<(), EnvError> {
        if self.duration <= 0.0 {
            return Err(EnvError::media("no media loaded"));
        }
        self.playing = true;
        self.pause_pending = None;
        Ok(())
    }

    fn request_pause(&mut self) {
        if self.playing && self.pause_pending.is_none() {
            let latency = self.rng.gen_range(0..=self.timing.max_pause_latency);
            self.pause_pending = Some(latency);
        }
    }

    fn is_paused(&self) -> bool {
        !self.playing
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), EnvError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EnvError::UnsupportedRate(rate));
        }
        self.rate = rate;
        Ok(())
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }
}

/// Control surface that records what the core wrote to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimControls {
    pub slider: Option<usize>,
    pub numeric_input: Option<usize>,
    pub max: usize,
    pub label: String,
    pub playing: bool,
    pub enabled: bool,
    pub slider_writes: u64,
    pub input_writes: u64,
}

impl SimControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// What a user typing or dragging leaves on the control before the core
    /// sees the change. Non-numeric text leaves the shown index alone.
    pub fn show_raw(&mut self, slider: bool, value: f64) {
        if !value.is_finite() {
            return;
        }
        let shown = Some(value.max(0.0).floor() as usize);
        if slider {
            self.slider = shown;
        } else {
            self.numeric_input = shown;
        }
    }
}

impl ControlSurface for SimControls {
    fn set_slider(&mut self, position: usize, max: usize) {
        self.slider = Some(position);
        self.max = max;
        self.slider_writes += 1;
    }

    fn set_numeric_input(&mut self, position: usize, max: usize) {
        self.numeric_input = Some(position);
        self.max = max;
        self.input_writes += 1;
    }

    fn set_time_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
