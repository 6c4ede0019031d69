//! Playback Context - the single owner of a viewer session's mutable state.
//!
//! Survey arrays are loaded once and shared read-only. Everything that changes
//! while the user works (position, calibration, distortion table, color scale,
//! camera offset) lives here and is mutated only through these methods, so a
//! frame is always derived from one consistent snapshot.

use crate::color::{ColorScale, IntensityHistogram, Palette, Rgb};
use crate::distortion::{CanvasSize, DistortionRemapper, PresentMode};
use crate::error::{ColorScaleError, ContextError, DistortionError};
use crate::loading::Calibration;
use crate::playback::{
    ChunkWindow, ChunkWindowConfig, PlaybackEvent, PlaybackSynchronizer, SyncConfig, SyncOutcome,
    TimeAxis,
};
use crate::pose::{AxisConvention, PoseSequence};
use crate::profile::{ProfileDistance, ProfileSet};
use crate::projection::{ProjectionBuilder, ProjectionMatrix, ProjectionUpdate};
use crate::transform::{camera_view_transform, overlay_transform, OverlayOrientation, Transform4x4};
use crate::view::{CameraOffset, ViewState};
use mmsview_env::{ControlSurface, MediaElement};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// INPUTS
// ============================================================================

/// Everything loaded from one survey.
#[derive(Debug, Clone, Default)]
pub struct Survey {
    pub poses: PoseSequence,
    /// Video time per pose
    pub axis: Option<TimeAxis>,
    /// Capture time of each point-cloud chunk, seconds
    pub chunk_timestamps: Vec<f64>,
    pub profiles: ProfileSet,
    /// Static vector overlays (rails, signals), renderer order
    pub polylines: Vec<Vec<Vector3<f64>>>,
    /// Outline of the train profile, placed at the selected distance
    pub profile_shape: Vec<Vector3<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub sync: SyncConfig,
    pub chunks: ChunkWindowConfig,
    pub convention: AxisConvention,
    pub overlay: OverlayOrientation,
    pub profile_distance: ProfileDistance,
    /// Used when the survey carries no timestamps
    pub fallback_fps: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            chunks: ChunkWindowConfig::default(),
            convention: AxisConvention::SURVEY,
            overlay: OverlayOrientation::default(),
            profile_distance: ProfileDistance::default(),
            fallback_fps: 25.0,
        }
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// What the renderer draws for the current position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub position: usize,
    pub video_time: f64,
    pub view: Option<ViewState>,
    /// Column-major camera view matrix
    pub camera_view: Option<[f64; 16]>,
    /// Column-major overlay matrix
    pub overlay: Option<[f64; 16]>,
    pub profile: Option<Vec<Vector3<f64>>>,
    pub chunks: Vec<usize>,
    pub projection_generation: u64,
}

// ============================================================================
// CONTEXT
// ============================================================================

pub struct PlaybackContext {
    poses: Arc<PoseSequence>,
    profiles: Arc<ProfileSet>,
    polylines: Arc<Vec<Vec<Vector3<f64>>>>,
    profile_shape: Vec<Vector3<f64>>,
    config: ContextConfig,
    projection: ProjectionBuilder,
    distortion: DistortionRemapper,
    colors: ColorScale,
    sync: PlaybackSynchronizer,
    chunks: ChunkWindow,
    offset: CameraOffset,
}

impl PlaybackContext {
    pub fn new(survey: Survey, calibration: Calibration, config: ContextConfig) -> Result<Self, ContextError> {
        let projection = ProjectionBuilder::new(calibration.intrinsics)?;
        let distortion = DistortionRemapper::new(calibration.distortion)?;

        let frame_count = survey.poses.frame_count();
        let axis = survey
            .axis
            .unwrap_or(TimeAxis::FixedFps(config.fallback_fps));
        let sync = PlaybackSynchronizer::new(axis, frame_count, config.sync);
        let chunks = ChunkWindow::new(survey.chunk_timestamps, config.chunks);

        info!(
            "playback context ready: {} poses, {} playable frames",
            frame_count,
            sync.frame_count()
        );

        Ok(Self {
            poses: Arc::new(survey.poses),
            profiles: Arc::new(survey.profiles),
            polylines: Arc::new(survey.polylines),
            profile_shape: survey.profile_shape,
            config,
            projection,
            distortion,
            colors: ColorScale::default(),
            sync,
            chunks,
            offset: CameraOffset::default(),
        })
    }

    pub fn poses(&self) -> Arc<PoseSequence> {
        Arc::clone(&self.poses)
    }

    pub fn polylines(&self) -> Arc<Vec<Vec<Vector3<f64>>>> {
        Arc::clone(&self.polylines)
    }

    pub fn synchronizer(&self) -> &PlaybackSynchronizer {
        &self.sync
    }

    pub fn position(&self) -> usize {
        self.sync.position()
    }

    pub fn chunks(&self) -> &ChunkWindow {
        &self.chunks
    }

    pub fn attach<M: MediaElement, C: ControlSurface>(&mut self, media: &mut M, controls: &mut C) {
        self.sync.attach(media, controls);
        self.chunks.rebuild(self.sync.state().video_time());
    }

    /// Swaps in a newly uploaded survey.
    ///
    /// Playback restarts at frame 0 and the controls are re-synced (or
    /// disabled for an empty survey). Calibration, lens table, colors,
    /// camera offset and overlay settings carry over.
    pub fn replace_survey<M: MediaElement, C: ControlSurface>(
        &mut self,
        survey: Survey,
        media: &mut M,
        controls: &mut C,
    ) {
        if !media.is_paused() {
            media.request_pause();
        }

        let frame_count = survey.poses.frame_count();
        let axis = survey
            .axis
            .unwrap_or(TimeAxis::FixedFps(self.config.fallback_fps));
        let chunk_config = ChunkWindowConfig {
            united: self.chunks.is_united(),
            ..self.config.chunks
        };

        self.poses = Arc::new(survey.poses);
        self.profiles = Arc::new(survey.profiles);
        self.polylines = Arc::new(survey.polylines);
        self.profile_shape = survey.profile_shape;
        self.sync = PlaybackSynchronizer::new(axis, frame_count, self.config.sync);
        self.chunks = ChunkWindow::new(survey.chunk_timestamps, chunk_config);

        info!(
            "survey replaced: {} poses, {} playable frames",
            frame_count,
            self.sync.frame_count()
        );
        self.attach(media, controls);
    }

    /// Routes an event through the synchronizer and updates the derived
    /// point-cloud window.
    pub fn handle<M: MediaElement, C: ControlSurface>(
        &mut self,
        event: PlaybackEvent,
        media: &mut M,
        controls: &mut C,
    ) -> SyncOutcome {
        let outcome = self.sync.handle(event, media, controls);
        match outcome {
            SyncOutcome::Seeked { media_time, .. } => self.chunks.rebuild(media_time),
            SyncOutcome::Advanced { media_time, .. } => self.chunks.advance(media_time),
            SyncOutcome::Started { restarted: true, .. } => self.chunks.reset(),
            _ => {}
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Calibration and lens
    // ------------------------------------------------------------------------

    pub fn projection(&self) -> &ProjectionMatrix {
        self.projection.matrix()
    }

    pub fn projection_builder_mut(&mut self) -> &mut ProjectionBuilder {
        &mut self.projection
    }

    /// A new calibration document replaces intrinsics and lens coefficients.
    /// Either part may be rejected on its own.
    pub fn set_calibration(&mut self, calibration: Calibration) -> (ProjectionUpdate, Result<(), DistortionError>) {
        let projection = self.projection.set_calibration(calibration.intrinsics);
        let distortion = self.distortion.set_params(calibration.distortion);
        (projection, distortion)
    }

    pub fn distortion_mut(&mut self) -> &mut DistortionRemapper {
        &mut self.distortion
    }

    pub fn resize_canvas(&mut self, size: CanvasSize) -> Result<(), DistortionError> {
        self.distortion.resize(size)
    }

    pub fn present(&mut self, src: &[u8], dst: &mut [u8]) -> Result<PresentMode, DistortionError> {
        self.distortion.present(src, dst)
    }

    // ------------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------------

    pub fn offset(&self) -> CameraOffset {
        self.offset
    }

    pub fn set_offset(&mut self, offset: CameraOffset) {
        debug!("camera offset {:?}", offset);
        self.offset = offset;
    }

    pub fn set_overlay_orientation(&mut self, orientation: OverlayOrientation) {
        self.config.overlay = orientation;
    }

    pub fn set_profile_distance(&mut self, distance: ProfileDistance) {
        self.config.profile_distance = distance;
    }

    pub fn profile_distance(&self) -> ProfileDistance {
        self.config.profile_distance
    }

    pub fn set_united_cloud(&mut self, united: bool) {
        self.chunks.set_united(united, self.sync.state().video_time());
    }

    pub fn view_state(&self) -> Option<ViewState> {
        let pos = self.position();
        let pose = self.poses.pose(pos)?;
        let derived = self.poses.derived(pos)?;
        Some(ViewState::from_pose(pose, derived, &self.offset))
    }

    pub fn camera_view(&self) -> Option<Transform4x4> {
        let pos = self.position();
        let pose = self.poses.pose(pos)?;
        let derived = self.poses.derived(pos)?;
        let convention = &self.config.convention;
        Some(camera_view_transform(
            convention.to_file(&pose.translation),
            &derived.rotation_matrix,
            convention,
        ))
    }

    pub fn overlay(&self) -> Option<Transform4x4> {
        let pos = self.position();
        let pose = self.poses.pose(pos)?;
        let derived = self.poses.derived(pos)?;
        Some(overlay_transform(&pose.translation, derived, self.config.overlay))
    }

    /// The profile outline placed at the selected look-ahead distance.
    pub fn placed_profile(&self) -> Option<Vec<Vector3<f64>>> {
        if self.profile_shape.is_empty() {
            return None;
        }
        self.profiles
            .place_shape(self.config.profile_distance, self.position(), &self.profile_shape)
    }

    /// Snapshot of everything derived from the current position.
    pub fn frame(&self) -> FrameState {
        FrameState {
            position: self.position(),
            video_time: self.sync.state().video_time(),
            view: self.view_state(),
            camera_view: self.camera_view().map(|m| m.to_column_major()),
            overlay: self.overlay().map(|m| m.to_column_major()),
            profile: self.placed_profile(),
            chunks: self.chunks.visible().to_vec(),
            projection_generation: self.projection.generation(),
        }
    }

    // ------------------------------------------------------------------------
    // Intensity coloring
    // ------------------------------------------------------------------------

    pub fn color_scale(&self) -> &ColorScale {
        &self.colors
    }

    pub fn set_color_range(&mut self, from: f64, to: f64) -> Result<(), ColorScaleError> {
        self.colors.set_range(from, to)
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.colors.set_palette(palette);
    }

    pub fn colorize(&self, intensities: &[f64]) -> Vec<Rgb> {
        intensities.iter().map(|&i| self.colors.color(i)).collect()
    }

    pub fn histogram(&self, intensities: &[f64]) -> IntensityHistogram {
        IntensityHistogram::from_values(intensities.iter().copied())
    }
}
