//! Scenario runner - drives a playback session through user-like event streams.
//!
//! After every handled event the runner checks the synchronization
//! invariant: slider and numeric input show the position, the position is in
//! range, and it agrees with the media clock to within one frame.

use crate::context::{MediaTiming, SimControls, SimMedia};
use crate::exporter::{SimExport, SimFrame};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use mmsview_core::context::{ContextConfig, PlaybackContext};
use mmsview_core::distortion::{CanvasSize, DistortionParams, PresentMode};
use mmsview_core::playback::{PlaybackEvent, PlaybackPhase, SyncOutcome};
use mmsview_env::{MediaElement, PositionSource};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total events handled
    pub total_events: u64,

    /// Playback position at the end
    pub final_position: usize,

    /// Final media time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Position jumps applied
    pub seeks: u64,

    /// Frames that moved the position while playing
    pub frames_advanced: u64,

    /// Frames presented between pause requests and their confirmation
    pub frames_after_pause_request: u64,

    /// Plays that rewound from the end
    pub restarts: u64,

    /// Events rejected by the synchronizer
    pub ignored: u64,

    /// Distortion tables dropped for being stale
    pub stale_tables_discarded: u64,

    /// Invariant checks performed
    pub invariant_checks: u64,
}

type Check = Result<(), String>;

/// Tolerance when comparing media times derived from the same axis.
const TIME_EPS: f64 = 1e-9;

// ============================================================================
// SESSION
// ============================================================================

/// One viewer session wired to simulated media and controls.
struct Session {
    ctx: PlaybackContext,
    media: SimMedia,
    controls: SimControls,
    rng: ChaCha8Rng,
    metrics: ScenarioMetrics,
    step: u64,
    export: Option<SimExport>,
}

impl Session {
    fn new(world: &SimWorld, seed: u64, timing: MediaTiming, export: Option<SimExport>) -> Result<Self, String> {
        let mut ctx = world
            .build_context(ContextConfig::default())
            .map_err(|e| format!("context setup failed: {}", e))?;
        let mut media = SimMedia::with_timing(seed, world.duration(), timing);
        let mut controls = SimControls::new();
        ctx.attach(&mut media, &mut controls);

        Ok(Self {
            ctx,
            media,
            controls,
            // User input draws from its own stream, independent of media timing
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x9e3779b97f4a7c15)),
            metrics: ScenarioMetrics::default(),
            step: 0,
            export,
        })
    }

    fn frame_count(&self) -> usize {
        self.ctx.synchronizer().frame_count()
    }

    fn position(&self) -> usize {
        self.ctx.position()
    }

    fn phase(&self) -> PlaybackPhase {
        self.ctx.synchronizer().phase()
    }

    fn time_of(&self, position: usize) -> f64 {
        self.ctx.synchronizer().state().axis.time_of(position)
    }

    fn send(&mut self, event: PlaybackEvent) -> Result<SyncOutcome, String> {
        if let PlaybackEvent::ControlChanged { source, value } = event {
            if source.is_control() {
                self.controls.show_raw(source == PositionSource::Slider, value);
            }
        }

        let outcome = self.ctx.handle(event, &mut self.media, &mut self.controls);
        self.step += 1;

        match outcome {
            SyncOutcome::Seeked { .. } => self.metrics.seeks += 1,
            SyncOutcome::Advanced { .. } => {
                self.metrics.frames_advanced += 1;
                if self.media.is_pause_pending() {
                    self.metrics.frames_after_pause_request += 1;
                }
            }
            SyncOutcome::Started { restarted: true, .. } => self.metrics.restarts += 1,
            SyncOutcome::Ignored => self.metrics.ignored += 1,
            _ => {}
        }

        if let Some(export) = &mut self.export {
            export.add_frame(SimFrame {
                step: self.step,
                time_sec: self.media.wall_time(),
                media_time: self.media.current_time(),
                event: format!("{:?}", event),
                outcome,
                phase: format!("{:?}", self.ctx.synchronizer().phase()),
                label: self.controls.label.clone(),
                state: self.ctx.frame(),
            });
        }

        self.check_invariant()
            .map_err(|e| format!("step {} ({:?}): {}", self.step, event, e))?;
        Ok(outcome)
    }

    fn check_invariant(&mut self) -> Check {
        self.metrics.invariant_checks += 1;
        let n = self.frame_count();
        if n == 0 {
            return Ok(());
        }

        let pos = self.position();
        if pos >= n {
            return Err(format!("position {} out of range (frames={})", pos, n));
        }
        if self.controls.slider != Some(pos) || self.controls.numeric_input != Some(pos) {
            return Err(format!(
                "controls disagree: slider={:?} input={:?} position={}",
                self.controls.slider, self.controls.numeric_input, pos
            ));
        }

        let expected = self
            .ctx
            .synchronizer()
            .state()
            .position_for_time(self.media.current_time());
        if pos.abs_diff(expected) > 1 {
            return Err(format!(
                "position {} drifted from media time {:.3}s (frame {})",
                pos,
                self.media.current_time(),
                expected
            ));
        }
        Ok(())
    }

    /// One display refresh. Returns false once the media is stopped.
    fn tick(&mut self) -> Result<bool, String> {
        match self.media.tick() {
            Some(event) => self.send(PlaybackEvent::Media(event)).map(|_| true),
            None => Ok(false),
        }
    }

    fn play_for(&mut self, ticks: usize) -> Check {
        for _ in 0..ticks {
            if !self.tick()? {
                break;
            }
        }
        Ok(())
    }

    /// Requests a pause and drains frames until the media confirms it.
    fn pause_and_settle(&mut self) -> Check {
        if !self.phase().is_playing() {
            return Ok(());
        }
        let requested_at = self.position();
        self.send(PlaybackEvent::Pause)?;

        for _ in 0..1_000 {
            if !self.tick()? {
                break;
            }
        }
        if self.phase() != PlaybackPhase::Idle {
            return Err(format!("pause never confirmed (phase {:?})", self.phase()));
        }
        if self.position() < requested_at {
            return Err(format!(
                "position went backwards while pausing: {} -> {}",
                requested_at,
                self.position()
            ));
        }
        if self.controls.playing {
            return Err("play indicator still on after pause".to_string());
        }
        Ok(())
    }

    fn seek(&mut self, source: PositionSource, value: f64) -> Result<SyncOutcome, String> {
        self.send(PlaybackEvent::ControlChanged { source, value })
    }

    fn expect_media_at_position(&self) -> Check {
        let expected = self.time_of(self.position());
        if (self.media.current_time() - expected).abs() > TIME_EPS {
            return Err(format!(
                "media at {:.6}s, frame {} is at {:.6}s",
                self.media.current_time(),
                self.position(),
                expected
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Runs playback scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Synthetic survey settings
    sim_config: SimConfig,

    /// Media timing model
    timing: MediaTiming,

    /// Loaded survey replacing the synthetic one
    world: Option<SimWorld>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            sim_config: SimConfig {
                seed,
                ..Default::default()
            },
            timing: MediaTiming::default(),
            world: None,
        }
    }

    /// Sets the synthetic survey length.
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.sim_config.frames = frames;
        self
    }

    pub fn with_timing(mut self, timing: MediaTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Runs against a loaded survey instead of a synthetic one.
    pub fn with_world(mut self, world: SimWorld) -> Self {
        self.world = Some(world);
        self
    }

    fn world(&self) -> SimWorld {
        self.world
            .clone()
            .unwrap_or_else(|| SimWorld::synthetic(&self.sim_config))
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, false).0
    }

    /// Runs a scenario and records every handled event.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, true);
        let mut export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed, 0));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, record: bool) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = self.world();
        if scenario == ScenarioId::FixedFps {
            world = world.with_fixed_fps(10.0);
        }
        let export = record.then(|| SimExport::new(scenario.name(), self.seed, world.frame_count()));

        let mut session = match Session::new(&world, self.seed, self.timing, export) {
            Ok(s) => s,
            Err(reason) => {
                return (
                    ScenarioResult {
                        scenario,
                        seed: self.seed,
                        passed: false,
                        total_events: 0,
                        final_position: 0,
                        final_time_secs: 0.0,
                        failure_reason: Some(reason),
                        metrics: ScenarioMetrics::default(),
                    },
                    None,
                )
            }
        };

        let outcome = if session.frame_count() < 3 {
            Err(format!("survey too short: {} frames", session.frame_count()))
        } else {
            match scenario {
                ScenarioId::ScrubSlider => run_scrub_slider(&mut session),
                ScenarioId::TypeInput => run_type_input(&mut session),
                ScenarioId::PlayPause => run_play_pause(&mut session),
                ScenarioId::ArrowJump => run_arrow_jump(&mut session),
                ScenarioId::ResizeDuringPrecompute => run_resize_during_precompute(&mut session),
                ScenarioId::EndOfSurvey => run_end_of_survey(&mut session),
                ScenarioId::FixedFps => run_fixed_fps(&mut session, 10.0),
                ScenarioId::SpeedChange => run_speed_change(&mut session),
            }
        };

        if let Err(reason) = &outcome {
            warn!("{} failed: {}", scenario.name(), reason);
        }
        debug!("{} metrics: {:?}", scenario.name(), session.metrics);

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            total_events: session.step,
            final_position: session.position(),
            final_time_secs: session.media.current_time(),
            failure_reason: outcome.err(),
            metrics: session.metrics.clone(),
        };
        (result, session.export)
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// SYNC-001: random slider drags.
fn run_scrub_slider(s: &mut Session) -> Check {
    let n = s.frame_count();
    for i in 0..200 {
        let value = if i % 50 == 49 {
            f64::NAN
        } else {
            s.rng.gen_range(-20.0..n as f64 + 20.0)
        };
        let before = s.position();
        let outcome = s.seek(PositionSource::Slider, value)?;

        if value.is_nan() {
            if outcome != SyncOutcome::Ignored || s.position() != before {
                return Err(format!("NaN slider value moved the position: {:?}", outcome));
            }
            continue;
        }
        let expected = (value.floor().max(0.0) as usize).min(n - 1);
        if s.position() != expected {
            return Err(format!("slider {} gave position {}, expected {}", value, s.position(), expected));
        }
        s.expect_media_at_position()?;
    }
    Ok(())
}

/// SYNC-002: typed indices mirror to the slider without echoing.
fn run_type_input(s: &mut Session) -> Check {
    let n = s.frame_count();
    for _ in 0..100 {
        let value = s.rng.gen_range(-5..n as i64 + 50) as f64;
        let in_range = value >= 0.0 && (value as usize) < n;
        let input_writes = s.controls.input_writes;

        s.seek(PositionSource::NumericInput, value)?;

        let expected = (value.max(0.0) as usize).min(n - 1);
        if s.position() != expected {
            return Err(format!("input {} gave position {}", value, s.position()));
        }
        if in_range && s.controls.input_writes != input_writes {
            return Err(format!("in-range input {} was echoed back", value));
        }
        s.expect_media_at_position()?;
    }
    Ok(())
}

/// SYNC-003: play/pause cycles.
fn run_play_pause(s: &mut Session) -> Check {
    s.seek(PositionSource::Slider, 0.0)?;
    for cycle in 0..5 {
        let outcome = s.send(PlaybackEvent::Play)?;
        if !matches!(outcome, SyncOutcome::Started { .. }) {
            return Err(format!("cycle {}: play gave {:?}", cycle, outcome));
        }
        if !s.controls.playing {
            return Err("play indicator not set".to_string());
        }
        let ticks = s.rng.gen_range(10..60);
        s.play_for(ticks)?;
        s.pause_and_settle()?;
    }
    if s.metrics.frames_advanced == 0 {
        return Err("playback never advanced".to_string());
    }
    Ok(())
}

/// SYNC-004: keyboard jumps.
fn run_arrow_jump(s: &mut Session) -> Check {
    let n = s.frame_count();
    let last_time = s.time_of(n - 1);
    s.seek(PositionSource::NumericInput, (n / 2) as f64)?;

    for _ in 0..60 {
        let forward = s.rng.gen_bool(0.5);
        let delta = if forward { 3.0 } else { -3.0 };
        let p = s.position();
        let start = s.time_of(p);

        s.send(PlaybackEvent::StepSeconds(delta))?;
        let q = s.position();

        if forward {
            let target = (start + 3.0).min(last_time);
            let overshoot = q > p && s.time_of(q - 1) >= target;
            if s.time_of(q) < target - TIME_EPS || overshoot {
                return Err(format!("+3s from frame {} landed on {}", p, q));
            }
        } else {
            let target = (start - 3.0).max(0.0);
            let undershoot = q < p && s.time_of(q + 1) <= target;
            if s.time_of(q) > target + TIME_EPS || undershoot {
                return Err(format!("-3s from frame {} landed on {}", p, q));
            }
        }
        s.expect_media_at_position()?;
    }
    Ok(())
}

/// SYNC-005: a resize makes an in-flight table stale.
fn run_resize_during_precompute(s: &mut Session) -> Check {
    let first = CanvasSize::new(64, 36);
    let second = CanvasSize::new(80, 45);

    s.ctx.resize_canvas(first).map_err(|e| e.to_string())?;
    let job = s
        .ctx
        .distortion_mut()
        .pending_job()
        .ok_or("no precompute scheduled after resize")?;

    // User scrubs while the table is being built
    for _ in 0..5 {
        let value = s.rng.gen_range(0.0..s.frame_count() as f64);
        s.seek(PositionSource::Slider, value)?;
    }
    s.ctx.resize_canvas(second).map_err(|e| e.to_string())?;

    let stale = job.run().map_err(|e| e.to_string())?;
    if s.ctx.distortion_mut().install(stale) {
        return Err("stale table was installed".to_string());
    }
    s.metrics.stale_tables_discarded += 1;

    let mut src = vec![0u8; second.rgba_len()];
    s.rng.fill(&mut src[..]);
    src.iter_mut().skip(3).step_by(4).for_each(|a| *a = 255);
    let mut dst = vec![0u8; second.rgba_len()];

    let mode = s.ctx.present(&src, &mut dst).map_err(|e| e.to_string())?;
    if mode != PresentMode::Distorted {
        return Err(format!("expected a distorted frame, got {:?}", mode));
    }
    match s.ctx.distortion_mut().table() {
        Some(table) if table.size() == second => {}
        _ => return Err("table missing or built for the wrong size".to_string()),
    }

    let bad = DistortionParams {
        k1: f64::NAN,
        ..Default::default()
    };
    if s.ctx.distortion_mut().set_params(bad).is_ok() {
        return Err("non-finite coefficients accepted".to_string());
    }
    if s.ctx.distortion_mut().table().is_none() {
        return Err("rejected coefficients dropped the valid table".to_string());
    }

    s.ctx.distortion_mut().set_enabled(false);
    let mode = s.ctx.present(&src, &mut dst).map_err(|e| e.to_string())?;
    if mode != PresentMode::Bypassed || dst != src {
        return Err("bypass did not copy the frame".to_string());
    }
    Ok(())
}

/// SYNC-006: playing into the end, then playing again.
fn run_end_of_survey(s: &mut Session) -> Check {
    let n = s.frame_count();
    s.seek(PositionSource::NumericInput, n.saturating_sub(10) as f64)?;
    s.send(PlaybackEvent::Play)?;

    for _ in 0..10_000 {
        if !s.tick()? {
            break;
        }
    }
    if s.phase() != PlaybackPhase::Idle {
        return Err(format!("playback did not stop at the end ({:?})", s.phase()));
    }
    if s.position() != n - 1 {
        return Err(format!("stopped at {}, expected last frame {}", s.position(), n - 1));
    }

    let outcome = s.send(PlaybackEvent::Play)?;
    if outcome != (SyncOutcome::Started { position: 0, restarted: true }) {
        return Err(format!("play at the end gave {:?}", outcome));
    }
    if s.media.current_time() != 0.0 {
        return Err(format!("restart left media at {:.3}s", s.media.current_time()));
    }
    s.play_for(5)?;
    s.pause_and_settle()
}

/// SYNC-007: video time from a constant frame rate.
fn run_fixed_fps(s: &mut Session, fps: f64) -> Check {
    let n = s.frame_count();
    for _ in 0..50 {
        let value = s.rng.gen_range(0..n) as f64;
        s.seek(PositionSource::NumericInput, value)?;
        let expected = s.position() as f64 / fps;
        if (s.media.current_time() - expected).abs() > TIME_EPS {
            return Err(format!(
                "frame {} at {:.4}s, expected {:.4}s",
                s.position(),
                s.media.current_time(),
                expected
            ));
        }
    }
    s.seek(PositionSource::Slider, 0.0)?;
    s.send(PlaybackEvent::Play)?;
    s.play_for(30)?;
    s.pause_and_settle()
}

/// SYNC-008: playback rate changes.
fn run_speed_change(s: &mut Session) -> Check {
    if s.send(PlaybackEvent::RateChanged(2.0))? != SyncOutcome::Unchanged {
        return Err("rate 2.0 rejected".to_string());
    }
    let wall_start = s.media.wall_time();
    s.send(PlaybackEvent::Play)?;
    s.play_for(30)?;

    let wall = s.media.wall_time() - wall_start;
    let media = s.media.current_time();
    let ended = media >= s.media.duration();
    if !ended && (media - 2.0 * wall).abs() > 1e-6 {
        return Err(format!("2x playback: {:.3}s media in {:.3}s wall", media, wall));
    }

    if s.send(PlaybackEvent::RateChanged(-1.0))? != SyncOutcome::Ignored {
        return Err("negative rate accepted".to_string());
    }
    if s.media.playback_rate() != 2.0 {
        return Err("rejected rate changed the element".to_string());
    }

    s.send(PlaybackEvent::RateChanged(0.5))?;
    s.play_for(30)?;
    s.pause_and_settle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42).with_frames(300);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert!(result.metrics.invariant_checks > 0);
        }
    }

    #[test]
    fn test_play_pause_counts_late_frames() {
        let timing = MediaTiming {
            max_pause_latency: 4,
            ..Default::default()
        };
        let runner = ScenarioRunner::new(7).with_frames(400).with_timing(timing);
        let result = runner.run(ScenarioId::PlayPause);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.frames_advanced > 0);
    }

    #[test]
    fn test_end_of_survey_restarts() {
        let result = ScenarioRunner::new(42).with_frames(120).run(ScenarioId::EndOfSurvey);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.restarts, 1);
    }

    #[test]
    fn test_resize_discards_stale_table() {
        let result = ScenarioRunner::new(42).with_frames(50).run(ScenarioId::ResizeDuringPrecompute);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.stale_tables_discarded, 1);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let a = ScenarioRunner::new(99).with_frames(200).run(ScenarioId::PlayPause);
        let b = ScenarioRunner::new(99).with_frames(200).run(ScenarioId::PlayPause);

        assert_eq!(a.total_events, b.total_events);
        assert_eq!(a.final_position, b.final_position);
        assert_eq!(a.final_time_secs, b.final_time_secs);
    }

    #[test]
    fn test_export_records_every_event() {
        let runner = ScenarioRunner::new(42).with_frames(100);
        let (result, export) = runner.run_with_export(ScenarioId::TypeInput);

        assert!(export.passed);
        assert_eq!(export.frames.len() as u64, result.total_events);
        assert_eq!(export.frame_count, 100);
    }

    #[test]
    fn test_tiny_survey_fails_cleanly() {
        let result = ScenarioRunner::new(1).with_frames(2).run(ScenarioId::ScrubSlider);
        assert!(!result.passed);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_scrub_holds_for_any_seed(seed in any::<u64>(), frames in 3usize..400) {
            let result = ScenarioRunner::new(seed).with_frames(frames).run(ScenarioId::ScrubSlider);
            prop_assert!(result.passed, "{:?}", result.failure_reason);
        }

        #[test]
        fn prop_arrow_jumps_hold_for_any_seed(seed in any::<u64>(), frames in 3usize..400) {
            let result = ScenarioRunner::new(seed).with_frames(frames).run(ScenarioId::ArrowJump);
            prop_assert!(result.passed, "{:?}", result.failure_reason);
        }
    }
}
