//! MMS View Core - geometry and playback synchronization for survey viewers
//!
//! A mobile-mapping survey is a video, a pose per frame and a point cloud.
//! This library keeps the three aligned:
//! 1. **Pose pipeline**: file rows to rotation matrices and camera angles
//! 2. **Projection & transforms**: calibration to a renderer projection, poses to 4×4 placements
//! 3. **Lens distortion**: precomputed remap table applied per frame
//! 4. **Playback sync**: one position driving video, slider, input and label
//! 5. **Intensity coloring**: piecewise-linear color scales and histograms

pub mod color;
pub mod context;
pub mod distortion;
pub mod error;
pub mod loading;
pub mod playback;
pub mod pose;
pub mod profile;
pub mod projection;
pub mod transform;
pub mod view;

// Re-export key types for convenience
pub use color::{ColorScale, IntensityHistogram, Palette};
pub use context::{ContextConfig, FrameState, PlaybackContext, Survey};
pub use distortion::{CanvasSize, DistortionLookupTable, DistortionParams, DistortionRemapper};
pub use error::{ColorScaleError, ContextError, DistortionError, LoadError, ProjectionError};
pub use loading::Calibration;
pub use playback::{
    format_time_label, ChunkWindow, PlaybackEvent, PlaybackPhase, PlaybackSynchronizer, SyncOutcome,
    TimeAxis,
};
pub use pose::{AxisConvention, DerivedPose, Pose, PoseSequence};
pub use profile::{ProfileDistance, ProfileSet};
pub use projection::{CameraIntrinsics, ProjectionBuilder, ProjectionMatrix};
pub use transform::Transform4x4;
pub use view::{CameraOffset, ViewState};
