//! Error types shared by the MMS View core.
//!
//! Nothing here is fatal to a viewer: every variant describes an input that
//! was rejected while the previously valid state stays in place.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading survey inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Calibration document is not valid YAML
    #[error("calibration yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Data has the wrong number of values
    #[error("shape error: {0}")]
    Shape(String),
}

impl LoadError {
    /// Creates an I/O error tagged with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

/// Rejected camera intrinsics edits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("calibration matrix must be 3x3, got {rows}x{cols}")]
    NotThreeByThree { rows: usize, cols: usize },

    #[error("invalid intrinsic value {name} = {value}")]
    InvalidIntrinsic { name: &'static str, value: f64 },

    #[error("far plane {far} must be finite and beyond near plane {near}")]
    InvalidFarPlane { far: f64, near: f64 },
}

/// Rejected lens distortion inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistortionError {
    #[error("distortion coefficient {name} is not finite")]
    NonFinite { name: &'static str },

    #[error("canvas size {width}x{height} is empty")]
    EmptyCanvas { width: usize, height: usize },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Rejected color-scale edits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColorScaleError {
    #[error("scale range is inverted: from {from} > to {to}")]
    Inverted { from: f64, to: f64 },

    #[error("scale bound is not finite")]
    NonFinite,
}

/// Failures assembling a [`PlaybackContext`](crate::context::PlaybackContext).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("projection: {0}")]
    Projection(#[from] ProjectionError),

    #[error("distortion: {0}")]
    Distortion(#[from] DistortionError),
}
