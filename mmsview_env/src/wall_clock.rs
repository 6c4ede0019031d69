//! Production implementation of MediaElement driven by the monotonic clock.

use crate::{EnvError, MediaElement, MediaEvent};
use std::time::Instant;

/// Headless media clock backed by `std::time::Instant`.
///
/// Used when frames are rendered natively without a video decoder: the
/// "video" is just a clock running from 0 to `duration` at the playback rate.
/// Pause requests are confirmed on the next [`poll`](Self::poll).
pub struct WallClockMedia {
    /// Media time at the last anchor (seek, play, rate change)
    anchor_time: f64,

    /// Wall-clock instant of the last anchor while playing
    anchor_instant: Option<Instant>,

    /// Total media duration in seconds
    duration: f64,

    /// Playback rate multiplier
    rate: f64,

    /// Pause requested but not yet confirmed
    pause_pending: bool,
}

impl WallClockMedia {
    /// Creates a paused clock at time 0.
    pub fn new(duration: f64) -> Self {
        Self {
            anchor_time: 0.0,
            anchor_instant: None,
            duration: duration.max(0.0),
            rate: 1.0,
            pause_pending: false,
        }
    }

    /// Total media duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Returns the next media event, if any.
    ///
    /// While playing every poll presents a frame; a pending pause is
    /// confirmed first and freezes the clock. Reaching the end of the
    /// media pauses on its own.
    pub fn poll(&mut self) -> Option<MediaEvent> {
        if self.pause_pending {
            self.freeze();
            self.pause_pending = false;
            return Some(MediaEvent::Paused);
        }

        self.anchor_instant?;

        let media_time = self.current_time();
        if media_time >= self.duration {
            self.freeze();
            return Some(MediaEvent::Paused);
        }

        Some(MediaEvent::Frame { media_time })
    }

    fn freeze(&mut self) {
        self.anchor_time = self.current_time();
        self.anchor_instant = None;
    }

    fn reanchor(&mut self) {
        if self.anchor_instant.is_some() {
            self.anchor_time = self.current_time();
            self.anchor_instant = Some(Instant::now());
        }
    }
}

impl MediaElement for WallClockMedia {
    fn current_time(&self) -> f64 {
        let elapsed = self
            .anchor_instant
            .map(|start| start.elapsed().as_secs_f64() * self.rate)
            .unwrap_or(0.0);
        (self.anchor_time + elapsed).min(self.duration)
    }

    fn seek(&mut self, seconds: f64) {
        self.anchor_time = seconds.clamp(0.0, self.duration);
        if self.anchor_instant.is_some() {
            self.anchor_instant = Some(Instant::now());
        }
    }

    fn play(&mut self) -> Result<(), EnvError> {
        if self.duration <= 0.0 {
            return Err(EnvError::media("no media loaded"));
        }
        self.pause_pending = false;
        if self.anchor_instant.is_none() {
            self.anchor_instant = Some(Instant::now());
        }
        Ok(())
    }

    fn request_pause(&mut self) {
        if self.anchor_instant.is_some() {
            self.pause_pending = true;
        }
    }

    fn is_paused(&self) -> bool {
        self.anchor_instant.is_none()
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), EnvError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EnvError::UnsupportedRate(rate));
        }
        self.reanchor();
        self.rate = rate;
        Ok(())
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }
}
