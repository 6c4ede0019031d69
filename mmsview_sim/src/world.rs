//! SimWorld - the survey a simulation runs against.

use mmsview_core::context::{ContextConfig, PlaybackContext, Survey};
use mmsview_core::distortion::DistortionParams;
use mmsview_core::loading::Calibration;
use mmsview_core::playback::TimeAxis;
use mmsview_core::pose::{CameraEulerSigns, PoseSequence};
use mmsview_core::profile::{ProfileDistance, ProfileSet, ProfileTrack};
use mmsview_core::projection::CameraIntrinsics;
use mmsview_core::ContextError;
use nalgebra::{Matrix3, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration for a synthetic survey.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of camera frames
    pub frames: usize,

    /// Nominal capture rate in Hz
    pub capture_hz: f64,

    /// Relative capture-interval variation (0.5 = ±50%)
    pub rate_variation: f64,

    /// Train speed in m/s
    pub speed: f64,

    /// Seconds between point-cloud chunks
    pub chunk_interval: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            frames: 500,
            capture_hz: 25.0,
            rate_variation: 0.5,
            speed: 15.0,
            chunk_interval: 0.5,
        }
    }
}

/// A loaded or generated survey plus its calibration.
#[derive(Debug, Clone)]
pub struct SimWorld {
    pub name: String,
    pub survey: Survey,
    pub calibration: Calibration,
}

impl SimWorld {
    /// A train running along a gentle S-curve, captured at a variable rate.
    pub fn synthetic(config: &SimConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let n = config.frames;

        let mut timestamps = Vec::with_capacity(n);
        let mut t = 0.0;
        for _ in 0..n {
            timestamps.push(t);
            let v = config.rate_variation.clamp(0.0, 0.9);
            let factor = if v > 0.0 { rng.gen_range(1.0 - v..1.0 + v) } else { 1.0 };
            t += factor / config.capture_hz;
        }

        let track_point = |s: f64| Vector3::new(s, 10.0 * (s / 80.0).sin(), 0.0);
        let heading_deg = |s: f64| (10.0 / 80.0 * (s / 80.0).cos()).atan().to_degrees();

        let translations: Vec<Vector3<f64>> = timestamps
            .iter()
            .map(|&ts| track_point(ts * config.speed))
            .collect();
        // File order (x, z, y): small sway, heading about z, slight pitch
        let rotations: Vec<Vector3<f64>> = timestamps
            .iter()
            .map(|&ts| {
                let s = ts * config.speed;
                Vector3::new(0.5 * (ts * 0.7).sin(), heading_deg(s), 0.2 * (ts * 0.3).cos())
            })
            .collect();
        let poses = PoseSequence::from_rows(&translations, &rotations, CameraEulerSigns::default());

        let tracks = ProfileDistance::ALL.map(|distance| {
            let ahead = distance.meters() as f64;
            let points: Vec<_> = timestamps
                .iter()
                .map(|&ts| track_point(ts * config.speed + ahead))
                .collect();
            let rotations_inv = vec![Matrix3::identity(); points.len()];
            ProfileTrack::new(points, &rotations_inv)
        });

        let duration = timestamps.last().copied().unwrap_or(0.0);
        let chunk_count = (duration / config.chunk_interval).ceil() as usize + 1;
        let chunk_timestamps = (0..chunk_count).map(|i| i as f64 * config.chunk_interval).collect();

        let rail = |offset: f64| -> Vec<Vector3<f64>> {
            translations
                .iter()
                .step_by(10)
                .map(|p| p + Vector3::new(0.0, offset, -1.5))
                .collect()
        };

        Self {
            name: format!("synthetic-{}", config.seed),
            survey: Survey {
                poses,
                axis: Some(TimeAxis::Timestamps(timestamps)),
                chunk_timestamps,
                profiles: ProfileSet::new(tracks),
                polylines: vec![rail(-0.7175), rail(0.7175)],
                profile_shape: loading_gauge(),
            },
            calibration: Calibration {
                intrinsics: CameraIntrinsics::new(1920.0, 1080.0, 1400.0, 1400.0, 960.0, 540.0),
                distortion: DistortionParams {
                    k1: -0.12,
                    k2: 0.02,
                    k3: 0.0,
                    p1: 0.001,
                    p2: -0.0005,
                },
            },
        }
    }

    /// Same survey, video time from a constant frame rate instead of timestamps.
    pub fn with_fixed_fps(mut self, fps: f64) -> Self {
        self.survey.axis = Some(TimeAxis::FixedFps(fps));
        self
    }

    pub fn frame_count(&self) -> usize {
        self.survey.poses.frame_count()
    }

    /// Video duration implied by the time axis.
    pub fn duration(&self) -> f64 {
        match &self.survey.axis {
            Some(axis) => axis.time_of(self.frame_count().saturating_sub(1)),
            None => 0.0,
        }
    }

    pub fn build_context(&self, config: ContextConfig) -> Result<PlaybackContext, ContextError> {
        PlaybackContext::new(self.survey.clone(), self.calibration, config)
    }
}

/// Simplified loading-gauge outline in the train's cross-section plane.
fn loading_gauge() -> Vec<Vector3<f64>> {
    [
        (-1.6, 0.0),
        (-1.6, 3.2),
        (-1.0, 4.3),
        (1.0, 4.3),
        (1.6, 3.2),
        (1.6, 0.0),
        (-1.6, 0.0),
    ]
    .iter()
    .map(|&(y, z)| Vector3::new(0.0, y, z))
    .collect()
}
