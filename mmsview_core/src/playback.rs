//! The "SYNC" Engine - single-position playback synchronization
//! =============================================================
//!
//! One logical position drives the pose, the point-cloud slice, the video
//! time, the slider, the numeric input and the time label. Exactly one
//! source writes the position per update cycle; everything else is derived
//! from it and written back without echoing.
//!
//! ```text
//!            control change                 apply (a)-(d)
//!   Idle ───────────────────► Seeking ─────────────────────► Idle
//!    │ ▲                                                       (or Playing
//!    │ │ media "paused" confirmation                            if the media
//!    ▼ │                                                        keeps running)
//!   Playing ◄── media frame clock advances the position
//! ```
//!
//! While playing the position follows the media element's own frame clock,
//! never a fixed timer, so video and point cloud cannot drift apart.

use mmsview_env::{ControlSurface, MediaElement, MediaEvent, PositionSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// TIME AXIS
// ============================================================================

/// Relation between a frame index and video time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeAxis {
    /// Per-frame capture times in seconds from the first frame
    Timestamps(Vec<f64>),
    /// Constant frame rate
    FixedFps(f64),
}

impl TimeAxis {
    /// Video time of `position`.
    pub fn time_of(&self, position: usize) -> f64 {
        match self {
            TimeAxis::Timestamps(ts) => ts
                .get(position)
                .or_else(|| ts.last())
                .copied()
                .unwrap_or(0.0),
            TimeAxis::FixedFps(fps) => position as f64 / fps,
        }
    }

    /// Frames this axis can address, or `None` when unbounded.
    fn capacity(&self) -> Option<usize> {
        match self {
            TimeAxis::Timestamps(ts) => Some(ts.len()),
            TimeAxis::FixedFps(_) => None,
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            TimeAxis::Timestamps(_) => true,
            TimeAxis::FixedFps(fps) => fps.is_finite() && *fps > 0.0,
        }
    }
}

/// Formats seconds as zero-padded `mm:ss` of the whole seconds.
pub fn format_time_label(seconds: f64) -> String {
    let whole = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    Idle,
    /// `pause_requested` is set between the pause request and the media's
    /// own confirmation; frames still advance the position meanwhile.
    Playing { pause_requested: bool },
    /// Only observable while a seek is being applied.
    Seeking,
}

impl PlaybackPhase {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackPhase::Playing { .. })
    }
}

/// Position plus the data that maps it to video time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub position: usize,
    pub frame_count: usize,
    pub axis: TimeAxis,
}

impl PlaybackState {
    pub fn last_frame(&self) -> usize {
        self.frame_count.saturating_sub(1)
    }

    pub fn video_time(&self) -> f64 {
        self.axis.time_of(self.position)
    }

    /// First position whose time is at or beyond `media_time`, clamped.
    pub fn position_for_time(&self, media_time: f64) -> usize {
        let mut pos = 0;
        while pos < self.last_frame() && self.axis.time_of(pos) < media_time {
            pos += 1;
        }
        pos
    }

    /// Integer position for a raw control value: floored, clamped,
    /// `None` for non-finite input.
    pub fn clamp_position(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        Some((value.floor().max(0.0) as usize).min(self.last_frame()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Arrow-key jump length in seconds
    pub step_seconds: f64,
    /// Playback stops this many frames before the end
    pub end_margin: usize,
    /// Subtracted from the media time before labelling a playing frame
    pub label_epsilon: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            step_seconds: 3.0,
            end_margin: 2,
            label_epsilon: 0.001,
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Numeric input or slider changed; carries the firing control's raw value
    ControlChanged { source: PositionSource, value: f64 },
    /// The media element was seeked from outside
    MediaSeeked { media_time: f64 },
    Play,
    Pause,
    TogglePlay,
    /// Keyboard jump by a signed number of seconds
    StepSeconds(f64),
    RateChanged(f64),
    Media(MediaEvent),
}

/// What a handled event did; drives the derived layers (pose, chunks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Controls disabled or input rejected
    Ignored,
    /// Accepted but the position did not move
    Unchanged,
    /// Position jumped
    Seeked { position: usize, media_time: f64 },
    /// Position followed the media clock
    Advanced { position: usize, media_time: f64 },
    Started { position: usize, restarted: bool },
    Stopped { position: usize },
}

// ============================================================================
// SYNCHRONIZER
// ============================================================================

/// Owns the playback position. Every mutation goes through [`handle`](Self::handle).
#[derive(Debug, Clone)]
pub struct PlaybackSynchronizer {
    state: PlaybackState,
    phase: PlaybackPhase,
    config: SyncConfig,
}

impl PlaybackSynchronizer {
    /// `frame_count` is capped by the number of timestamps when the axis has them.
    pub fn new(axis: TimeAxis, frame_count: usize, config: SyncConfig) -> Self {
        let frame_count = if axis.is_valid() {
            axis.capacity().map_or(frame_count, |cap| cap.min(frame_count))
        } else {
            warn!("invalid time axis {:?}; playback disabled", axis);
            0
        };
        Self {
            state: PlaybackState {
                position: 0,
                frame_count,
                axis,
            },
            phase: PlaybackPhase::Idle,
            config,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn position(&self) -> usize {
        self.state.position
    }

    pub fn frame_count(&self) -> usize {
        self.state.frame_count
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn is_enabled(&self) -> bool {
        self.state.frame_count > 0
    }

    /// Pushes the full derived state to a freshly attached control surface.
    pub fn attach<M: MediaElement, C: ControlSurface>(&self, media: &mut M, controls: &mut C) {
        controls.set_enabled(self.is_enabled());
        controls.set_playing(self.phase.is_playing());
        if self.is_enabled() {
            media.seek(self.state.video_time());
            self.sync_controls(None, controls);
            controls.set_time_label(&format_time_label(self.state.video_time()));
        }
    }

    pub fn handle<M: MediaElement, C: ControlSurface>(
        &mut self,
        event: PlaybackEvent,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        if !self.is_enabled() {
            return SyncOutcome::Ignored;
        }

        match event {
            PlaybackEvent::ControlChanged { source, value } => {
                self.on_control_changed(source, value, media, controls)
            }
            PlaybackEvent::MediaSeeked { media_time } => {
                let target = self.state.position_for_time(media_time);
                self.seek_to(target, PositionSource::MediaSeek, media, controls)
            }
            PlaybackEvent::Play => self.play(media, controls),
            PlaybackEvent::Pause => self.request_pause(media),
            PlaybackEvent::TogglePlay => {
                if self.phase.is_playing() {
                    self.request_pause(media)
                } else {
                    self.play(media, controls)
                }
            }
            PlaybackEvent::StepSeconds(delta) => self.step(delta, media, controls),
            PlaybackEvent::RateChanged(rate) => match media.set_playback_rate(rate) {
                Ok(()) => SyncOutcome::Unchanged,
                Err(e) => {
                    warn!("playback rate rejected: {}", e);
                    SyncOutcome::Ignored
                }
            },
            PlaybackEvent::Media(MediaEvent::Frame { media_time }) => {
                self.on_media_frame(media_time, media, controls)
            }
            PlaybackEvent::Media(MediaEvent::Paused) => self.on_media_paused(media, controls),
        }
    }

    fn on_control_changed<M: MediaElement, C: ControlSurface>(
        &mut self,
        source: PositionSource,
        value: f64,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        let Some(target) = self.state.clamp_position(value) else {
            debug!("ignoring non-numeric {} value", source);
            return SyncOutcome::Ignored;
        };

        // The firing control shows its own raw value; correct it if clamped
        if target as f64 != value {
            self.sync_one(source, target, controls);
        }
        self.seek_to(target, source, media, controls)
    }

    /// Seeking → Idle (or back to Playing): applies the position everywhere
    /// except the source that produced it.
    fn seek_to<M: MediaElement, C: ControlSurface>(
        &mut self,
        target: usize,
        source: PositionSource,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        if target == self.state.position {
            return SyncOutcome::Unchanged;
        }

        let resume = self.phase;
        self.phase = PlaybackPhase::Seeking;
        self.state.position = target;

        let video_time = self.state.video_time();
        if source != PositionSource::MediaSeek {
            media.seek(video_time);
        }
        self.sync_controls(Some(source), controls);
        controls.set_time_label(&format_time_label(video_time));

        self.phase = match resume {
            PlaybackPhase::Playing { .. } if !media.is_paused() => resume,
            _ => PlaybackPhase::Idle,
        };
        debug!("seek to {} from {} ({:.3}s)", target, source, video_time);

        SyncOutcome::Seeked {
            position: target,
            media_time: video_time,
        }
    }

    fn step<M: MediaElement, C: ControlSurface>(
        &mut self,
        delta: f64,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        if !delta.is_finite() || delta == 0.0 {
            return SyncOutcome::Ignored;
        }
        let axis = &self.state.axis;
        let last = self.state.last_frame();
        let mut target = self.state.position;

        if delta < 0.0 {
            let new_time = (axis.time_of(target) + delta).max(0.0);
            while target > 0 && axis.time_of(target) > new_time {
                target -= 1;
            }
        } else {
            let new_time = (axis.time_of(target) + delta).min(axis.time_of(last));
            while target < last && axis.time_of(target) < new_time {
                target += 1;
            }
        }
        self.seek_to(target, PositionSource::Keyboard, media, controls)
    }

    fn at_end(&self) -> bool {
        self.state.position + self.config.end_margin >= self.state.frame_count
    }

    /// Idle → Playing. Starting at the end rewinds to the first frame.
    fn play<M: MediaElement, C: ControlSurface>(&mut self, media: &mut M, controls: &mut C) -> SyncOutcome {
        if self.phase.is_playing() {
            return SyncOutcome::Unchanged;
        }

        let restarted = self.at_end();
        if restarted {
            self.state.position = 0;
            media.seek(self.state.video_time());
            self.sync_controls(None, controls);
            controls.set_time_label(&format_time_label(self.state.video_time()));
        }

        if let Err(e) = media.play() {
            warn!("media refused to play: {}", e);
            // The rewind already happened; derived layers must follow it
            return if restarted {
                SyncOutcome::Seeked {
                    position: self.state.position,
                    media_time: self.state.video_time(),
                }
            } else {
                SyncOutcome::Ignored
            };
        }
        self.phase = PlaybackPhase::Playing {
            pause_requested: false,
        };
        controls.set_playing(true);

        SyncOutcome::Started {
            position: self.state.position,
            restarted,
        }
    }

    /// Only asks; the transition to Idle waits for the media's confirmation.
    fn request_pause<M: MediaElement>(&mut self, media: &mut M) -> SyncOutcome {
        match self.phase {
            PlaybackPhase::Playing { pause_requested: false } => {
                media.request_pause();
                self.phase = PlaybackPhase::Playing {
                    pause_requested: true,
                };
                SyncOutcome::Unchanged
            }
            _ => SyncOutcome::Unchanged,
        }
    }

    fn on_media_frame<M: MediaElement, C: ControlSurface>(
        &mut self,
        media_time: f64,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        if !self.phase.is_playing() || !media_time.is_finite() {
            return SyncOutcome::Unchanged;
        }

        let last = self.state.last_frame();
        let mut pos = self.state.position;
        while pos < last && self.state.axis.time_of(pos) < media_time {
            pos += 1;
        }
        self.state.position = pos;

        if self.at_end() {
            // Show the last frame and stop; Idle follows the confirmation
            self.request_pause(media);
            self.state.position = last;
        }

        self.sync_controls(None, controls);
        let label_time = (media_time - self.config.label_epsilon).max(0.0);
        controls.set_time_label(&format_time_label(label_time));

        SyncOutcome::Advanced {
            position: self.state.position,
            media_time,
        }
    }

    /// Playing → Idle once the media confirms it has stopped.
    fn on_media_paused<M: MediaElement, C: ControlSurface>(
        &mut self,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        if !self.phase.is_playing() {
            controls.set_playing(false);
            return SyncOutcome::Unchanged;
        }
        self.phase = PlaybackPhase::Idle;

        // Settle the decoder on the frame it actually stopped at
        let media_time = media.current_time();
        media.seek(media_time);

        controls.set_playing(false);
        self.sync_controls(None, controls);
        let label_time = (media_time - self.config.label_epsilon).max(0.0);
        controls.set_time_label(&format_time_label(label_time));
        debug!("playback stopped at {} ({:.3}s)", self.state.position, media_time);

        SyncOutcome::Stopped {
            position: self.state.position,
        }
    }

    fn sync_one<C: ControlSurface>(&self, control: PositionSource, position: usize, controls: &mut C) {
        let max = self.state.last_frame();
        match control {
            PositionSource::Slider => controls.set_slider(position, max),
            PositionSource::NumericInput => controls.set_numeric_input(position, max),
            PositionSource::MediaSeek | PositionSource::Keyboard => {}
        }
    }

    /// Writes the position to every control except `source`.
    fn sync_controls<C: ControlSurface>(&self, source: Option<PositionSource>, controls: &mut C) {
        for control in [PositionSource::Slider, PositionSource::NumericInput] {
            if Some(control) != source {
                self.sync_one(control, self.state.position, controls);
            }
        }
    }
}

// ============================================================================
// POINT-CLOUD CHUNK WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkWindowConfig {
    /// Chunks shown at once in divided mode
    pub layers: usize,
    /// Show the whole cloud as one layer instead of a moving window
    pub united: bool,
}

impl Default for ChunkWindowConfig {
    fn default() -> Self {
        Self {
            layers: 10,
            united: false,
        }
    }
}

/// The point-cloud chunks visible at the current media time.
///
/// Rebuilt on every seek; during playback it is a ring buffer where the
/// oldest chunk is overwritten by the newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkWindow {
    timestamps: Vec<f64>,
    slots: Vec<usize>,
    ring_index: usize,
    chunk_position: usize,
    united: bool,
}

impl ChunkWindow {
    pub fn new(timestamps: Vec<f64>, config: ChunkWindowConfig) -> Self {
        Self {
            timestamps,
            slots: vec![0; config.layers.max(1)],
            ring_index: 0,
            chunk_position: 0,
            united: config.united,
        }
    }

    pub fn is_united(&self) -> bool {
        self.united
    }

    pub fn set_united(&mut self, united: bool, media_time: f64) {
        self.united = united;
        if !united {
            self.rebuild(media_time);
        }
    }

    /// Chunk indices to draw; empty in united mode or without chunks.
    pub fn visible(&self) -> &[usize] {
        if self.united || self.timestamps.is_empty() {
            &[]
        } else {
            &self.slots
        }
    }

    pub fn chunk_position(&self) -> usize {
        self.chunk_position
    }

    fn last(&self) -> usize {
        self.timestamps.len().saturating_sub(1)
    }

    /// After a jump: newest chunk at or beyond `media_time`, then older ones
    /// backwards, repeating chunk 0 at the start.
    pub fn rebuild(&mut self, media_time: f64) {
        if self.united {
            return;
        }
        let mut pos = 0;
        while pos < self.last() && self.timestamps[pos] < media_time {
            pos += 1;
        }
        self.chunk_position = pos;

        for slot in self.slots.iter_mut().rev() {
            *slot = pos;
            pos = pos.saturating_sub(1);
        }
        self.ring_index = 0;
    }

    /// During playback: each newly reached chunk replaces the oldest slot.
    pub fn advance(&mut self, media_time: f64) {
        if self.united {
            return;
        }
        while self.chunk_position < self.last() && self.timestamps[self.chunk_position] < media_time {
            self.chunk_position += 1;
            self.slots[self.ring_index] = self.chunk_position;
            self.ring_index = (self.ring_index + 1) % self.slots.len();
        }
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = 0);
        self.chunk_position = 0;
        self.ring_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmsview_env::EnvError;
    use proptest::prelude::*;

    /// Media double with instant seeks and explicit pause confirmation.
    #[derive(Default)]
    struct FakeMedia {
        time: f64,
        playing: bool,
        pause_requested: bool,
        seeks: usize,
        rate: f64,
        refuse_play: bool,
    }

    impl MediaElement for FakeMedia {
        fn current_time(&self) -> f64 {
            self.time
        }
        fn seek(&mut self, seconds: f64) {
            self.time = seconds;
            self.seeks += 1;
        }
        fn play(&mut self) -> Result<(), EnvError> {
            if self.refuse_play {
                return Err(EnvError::media("autoplay blocked"));
            }
            self.playing = true;
            Ok(())
        }
        fn request_pause(&mut self) {
            self.pause_requested = true;
        }
        fn is_paused(&self) -> bool {
            !self.playing
        }
        fn set_playback_rate(&mut self, rate: f64) -> Result<(), EnvError> {
            if rate <= 0.0 {
                return Err(EnvError::UnsupportedRate(rate));
            }
            self.rate = rate;
            Ok(())
        }
        fn playback_rate(&self) -> f64 {
            self.rate
        }
    }

    #[derive(Default)]
    struct FakeControls {
        slider: Option<usize>,
        input: Option<usize>,
        label: String,
        playing: bool,
        enabled: bool,
        slider_writes: usize,
        input_writes: usize,
    }

    impl ControlSurface for FakeControls {
        fn set_slider(&mut self, position: usize, _max: usize) {
            self.slider = Some(position);
            self.slider_writes += 1;
        }
        fn set_numeric_input(&mut self, position: usize, _max: usize) {
            self.input = Some(position);
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

    fn sync_25fps(frames: usize) -> PlaybackSynchronizer {
        let ts = (0..frames).map(|i| i as f64 / 25.0).collect();
        PlaybackSynchronizer::new(TimeAxis::Timestamps(ts), frames, SyncConfig::default())
    }

    fn control(source: PositionSource, value: f64) -> PlaybackEvent {
        PlaybackEvent::ControlChanged { source, value }
    }

    #[test]
    fn test_time_label() {
        assert_eq!(format_time_label(125.4), "02:05");
        assert_eq!(format_time_label(0.0), "00:00");
        assert_eq!(format_time_label(-3.0), "00:00");
        assert_eq!(format_time_label(3599.99), "59:59");
    }

    #[test]
    fn test_numeric_input_drives_slider() {
        let mut sync = sync_25fps(500);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        let out = sync.handle(control(PositionSource::NumericInput, 100.0), &mut media, &mut controls);
        assert!(matches!(out, SyncOutcome::Seeked { position: 100, .. }));
        assert_eq!(controls.slider, Some(100));
        // Firing control is not echoed
        assert_eq!(controls.input_writes, 0);
        assert!((media.time - 4.0).abs() < 1e-12);
        assert_eq!(controls.label, "00:04");
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_slider_drives_numeric_input() {
        let mut sync = sync_25fps(500);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(control(PositionSource::Slider, 250.7), &mut media, &mut controls);
        assert_eq!(sync.position(), 250);
        assert_eq!(controls.input, Some(250));
        // Floored value written back to the slider itself
        assert_eq!(controls.slider, Some(250));
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let mut sync = sync_25fps(500);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(control(PositionSource::NumericInput, 10_000.0), &mut media, &mut controls);
        assert_eq!(sync.position(), 499);
        assert_eq!(controls.input, Some(499));
        assert_eq!(controls.slider, Some(499));

        sync.handle(control(PositionSource::NumericInput, -5.0), &mut media, &mut controls);
        assert_eq!(sync.position(), 0);
    }

    #[test]
    fn test_equal_position_is_noop() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(control(PositionSource::Slider, 10.0), &mut media, &mut controls);
        let seeks = media.seeks;
        let out = sync.handle(control(PositionSource::NumericInput, 10.0), &mut media, &mut controls);
        assert_eq!(out, SyncOutcome::Unchanged);
        assert_eq!(media.seeks, seeks);
    }

    #[test]
    fn test_nan_input_is_ignored() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());
        let out = sync.handle(control(PositionSource::NumericInput, f64::NAN), &mut media, &mut controls);
        assert_eq!(out, SyncOutcome::Ignored);
        assert_eq!(sync.position(), 0);
    }

    #[test]
    fn test_empty_survey_disables_controls() {
        let mut sync = sync_25fps(0);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());
        controls.enabled = true;

        sync.attach(&mut media, &mut controls);
        assert!(!controls.enabled);
        assert_eq!(sync.handle(PlaybackEvent::Play, &mut media, &mut controls), SyncOutcome::Ignored);
        assert!(!media.playing);
    }

    #[test]
    fn test_media_clock_advances_position() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        assert!(controls.playing);
        let out = sync.handle(
            PlaybackEvent::Media(MediaEvent::Frame { media_time: 1.01 }),
            &mut media,
            &mut controls,
        );
        // First timestamp at or beyond 1.01s is frame 26 (1.04s)
        assert!(matches!(out, SyncOutcome::Advanced { position: 26, .. }));
        assert_eq!(controls.slider, Some(26));
        assert_eq!(controls.input, Some(26));
        assert_eq!(controls.label, "00:01");
    }

    #[test]
    fn test_pause_waits_for_confirmation() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        sync.handle(PlaybackEvent::TogglePlay, &mut media, &mut controls);
        assert!(media.pause_requested);
        assert!(sync.phase().is_playing());

        // A frame presented before confirmation still counts
        sync.handle(
            PlaybackEvent::Media(MediaEvent::Frame { media_time: 0.5 }),
            &mut media,
            &mut controls,
        );
        assert_eq!(sync.position(), 13);

        media.playing = false;
        media.time = 0.5;
        let out = sync.handle(PlaybackEvent::Media(MediaEvent::Paused), &mut media, &mut controls);
        assert_eq!(out, SyncOutcome::Stopped { position: 13 });
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
        assert!(!controls.playing);

        // Frames after the stop are ignored
        sync.handle(
            PlaybackEvent::Media(MediaEvent::Frame { media_time: 2.0 }),
            &mut media,
            &mut controls,
        );
        assert_eq!(sync.position(), 13);
    }

    #[test]
    fn test_end_of_survey_pins_last_frame() {
        let mut sync = sync_25fps(50);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        sync.handle(
            PlaybackEvent::Media(MediaEvent::Frame { media_time: 1.93 }),
            &mut media,
            &mut controls,
        );
        assert_eq!(sync.position(), 49);
        assert!(media.pause_requested);
    }

    #[test]
    fn test_play_at_end_restarts() {
        let mut sync = sync_25fps(50);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(control(PositionSource::Slider, 49.0), &mut media, &mut controls);
        let out = sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        assert_eq!(out, SyncOutcome::Started { position: 0, restarted: true });
        assert_eq!(media.time, 0.0);
        assert_eq!(controls.slider, Some(0));
    }

    #[test]
    fn test_refused_restart_reports_rewind() {
        let mut sync = sync_25fps(50);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(control(PositionSource::Slider, 49.0), &mut media, &mut controls);
        media.refuse_play = true;
        let out = sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        assert_eq!(out, SyncOutcome::Seeked { position: 0, media_time: 0.0 });
        assert_eq!(sync.phase(), PlaybackPhase::Idle);
        assert_eq!(controls.slider, Some(0));

        // Away from the end a refusal changes nothing
        media.refuse_play = false;
        sync.handle(control(PositionSource::Slider, 10.0), &mut media, &mut controls);
        media.refuse_play = true;
        let out = sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        assert_eq!(out, SyncOutcome::Ignored);
        assert_eq!(sync.position(), 10);
    }

    #[test]
    fn test_seek_while_playing_keeps_playing() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(PlaybackEvent::Play, &mut media, &mut controls);
        sync.handle(control(PositionSource::Slider, 60.0), &mut media, &mut controls);
        assert!(sync.phase().is_playing());
        assert!((media.time - 2.4).abs() < 1e-12);
    }

    #[test]
    fn test_keyboard_steps_three_seconds() {
        let mut sync = sync_25fps(500);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(PlaybackEvent::StepSeconds(3.0), &mut media, &mut controls);
        assert_eq!(sync.position(), 75);
        assert_eq!(controls.slider, Some(75));
        assert_eq!(controls.input, Some(75));

        sync.handle(PlaybackEvent::StepSeconds(-10.0), &mut media, &mut controls);
        assert_eq!(sync.position(), 0);

        sync.handle(control(PositionSource::NumericInput, 490.0), &mut media, &mut controls);
        sync.handle(PlaybackEvent::StepSeconds(3.0), &mut media, &mut controls);
        assert_eq!(sync.position(), 499);
    }

    #[test]
    fn test_external_media_seek() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        media.time = 2.0;
        let out = sync.handle(PlaybackEvent::MediaSeeked { media_time: 2.0 }, &mut media, &mut controls);
        assert!(matches!(out, SyncOutcome::Seeked { position: 50, .. }));
        // The media was the source; it is not seeked again
        assert_eq!(media.seeks, 0);
        assert_eq!(controls.slider, Some(50));
        assert_eq!(controls.input, Some(50));
    }

    #[test]
    fn test_fixed_fps_axis() {
        let mut sync = PlaybackSynchronizer::new(TimeAxis::FixedFps(10.0), 200, SyncConfig::default());
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());

        sync.handle(control(PositionSource::NumericInput, 125.0), &mut media, &mut controls);
        assert!((media.time - 12.5).abs() < 1e-12);
        assert_eq!(controls.label, "00:12");
    }

    #[test]
    fn test_invalid_fps_disables_playback() {
        let sync = PlaybackSynchronizer::new(TimeAxis::FixedFps(0.0), 200, SyncConfig::default());
        assert!(!sync.is_enabled());
    }

    #[test]
    fn test_rate_change() {
        let mut sync = sync_25fps(100);
        let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());
        assert_eq!(sync.handle(PlaybackEvent::RateChanged(0.5), &mut media, &mut controls), SyncOutcome::Unchanged);
        assert_eq!(media.rate, 0.5);
        assert_eq!(sync.handle(PlaybackEvent::RateChanged(-1.0), &mut media, &mut controls), SyncOutcome::Ignored);
    }

    #[test]
    fn test_chunk_window_rebuild_fills_backwards() {
        let ts: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let mut window = ChunkWindow::new(ts, ChunkWindowConfig::default());

        window.rebuild(0.65);
        assert_eq!(window.visible(), &[0, 0, 0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_chunk_window_ring_advance() {
        let ts: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let mut window = ChunkWindow::new(ts, ChunkWindowConfig::default());

        window.rebuild(0.65);
        window.advance(0.85);
        // Two new chunks replace the two oldest slots
        assert_eq!(window.visible(), &[8, 9, 0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(window.chunk_position(), 9);
    }

    #[test]
    fn test_chunk_window_united_mode() {
        let ts: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let config = ChunkWindowConfig {
            united: true,
            ..Default::default()
        };
        let mut window = ChunkWindow::new(ts, config);
        window.rebuild(3.0);
        assert!(window.visible().is_empty());

        window.set_united(false, 3.0);
        assert_eq!(window.visible().last(), Some(&3));
    }

    proptest! {
        #[test]
        fn prop_controls_agree_after_any_control_change(
            frames in 1usize..400,
            values in proptest::collection::vec((any::<bool>(), -50.0f64..500.0), 1..20),
        ) {
            let mut sync = sync_25fps(frames);
            let (mut media, mut controls) = (FakeMedia::default(), FakeControls::default());
            sync.attach(&mut media, &mut controls);

            for (use_slider, value) in values {
                let source = if use_slider { PositionSource::Slider } else { PositionSource::NumericInput };
                // The firing control already shows what the user entered
                let shown = Some(value.max(0.0).floor() as usize);
                if use_slider { controls.slider = shown } else { controls.input = shown }
                sync.handle(control(source, value), &mut media, &mut controls);

                prop_assert!(sync.position() < frames);
                prop_assert_eq!(controls.slider, Some(sync.position()));
                prop_assert_eq!(controls.input, Some(sync.position()));
                prop_assert!((media.time - sync.state().video_time()).abs() < 1e-12);
                prop_assert_eq!(sync.phase(), PlaybackPhase::Idle);
            }
        }
    }
}
