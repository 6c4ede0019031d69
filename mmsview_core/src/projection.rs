//! Projection Builder - pinhole intrinsics to a renderer projection matrix.
//!
//! The renderer expects a flat, column-major 4×4 array. Near and far planes
//! are folded into the z row; everything else comes from the calibration.

use crate::error::ProjectionError;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default near clipping plane (meters)
pub const DEFAULT_NEAR_PLANE: f64 = 0.1;

/// Default far clipping plane (meters)
pub const DEFAULT_FAR_PLANE: f64 = 300.0;

/// Pinhole camera intrinsics plus clipping planes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Image width in pixels
    pub width: f64,
    /// Image height in pixels
    pub height: f64,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub near_plane: f64,
    pub far_plane: f64,
}

impl CameraIntrinsics {
    /// Creates intrinsics with the default clipping planes.
    pub fn new(width: f64, height: f64, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
            near_plane: DEFAULT_NEAR_PLANE,
            far_plane: DEFAULT_FAR_PLANE,
        }
    }

    pub fn with_far_plane(mut self, far: f64) -> Self {
        self.far_plane = far;
        self
    }

    /// Replaces focal lengths and principal point from a user 3×3 matrix.
    ///
    /// Uses `K[0][0]`, `K[1][1]`, `K[0][2]`, `K[1][2]`; image size is kept.
    pub fn with_calibration_matrix(&self, k: &[Vec<f64>]) -> Result<Self, ProjectionError> {
        let cols = k.first().map(Vec::len).unwrap_or(0);
        if k.len() != 3 || k.iter().any(|row| row.len() != 3) {
            return Err(ProjectionError::NotThreeByThree {
                rows: k.len(),
                cols,
            });
        }

        let updated = Self {
            fx: k[0][0],
            fy: k[1][1],
            cx: k[0][2],
            cy: k[1][2],
            ..*self
        };
        updated.validate()?;
        Ok(updated)
    }

    /// Checks every value the projection formula divides by or relies on.
    pub fn validate(&self) -> Result<(), ProjectionError> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("fx", self.fx),
            ("fy", self.fy),
            ("near_plane", self.near_plane),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ProjectionError::InvalidIntrinsic { name, value });
            }
        }
        for (name, value) in [("cx", self.cx), ("cy", self.cy)] {
            if !value.is_finite() {
                return Err(ProjectionError::InvalidIntrinsic { name, value });
            }
        }
        if !self.far_plane.is_finite() || self.far_plane <= self.near_plane {
            return Err(ProjectionError::InvalidFarPlane {
                far: self.far_plane,
                near: self.near_plane,
            });
        }
        Ok(())
    }
}

/// Flattened column-major 4×4 projection matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMatrix(pub [f64; 16]);

impl ProjectionMatrix {
    /// Standard pinhole-to-NDC projection.
    pub fn from_intrinsics(k: &CameraIntrinsics) -> Self {
        let (w, h) = (k.width, k.height);
        let (n, f) = (k.near_plane, k.far_plane);

        // Matrix4::new takes its arguments row by row
        let m = Matrix4::new(
            2.0 * k.fx / w, 0.0, 2.0 * k.cx / w - 1.0, 0.0,
            0.0, 2.0 * k.fy / h, 2.0 * k.cy / h - 1.0, 0.0,
            0.0, 0.0, -(f + n) / (f - n), -(2.0 * f * n) / (f - n),
            0.0, 0.0, -1.0, 0.0,
        );

        let mut flat = [0.0; 16];
        flat.copy_from_slice(m.as_slice());
        Self(flat)
    }

    pub fn as_array(&self) -> &[f64; 16] {
        &self.0
    }

    pub fn to_matrix4(&self) -> Matrix4<f64> {
        Matrix4::from_column_slice(&self.0)
    }

    /// Element at `(row, col)` of the unflattened matrix.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.0[col * 4 + row]
    }
}

/// Outcome of an intrinsics edit.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionUpdate {
    /// Matrix recomputed; new generation stamp
    Updated { generation: u64 },
    /// Input equal to the current intrinsics
    Unchanged,
    /// Input rejected; previous matrix kept
    Rejected(ProjectionError),
}

impl ProjectionUpdate {
    pub fn is_updated(&self) -> bool {
        matches!(self, ProjectionUpdate::Updated { .. })
    }
}

/// Owns the current intrinsics and the matrix derived from them.
///
/// Every accepted change bumps `generation`, which downstream caches compare
/// against to know they are stale.
#[derive(Debug, Clone)]
pub struct ProjectionBuilder {
    intrinsics: CameraIntrinsics,
    matrix: ProjectionMatrix,
    generation: u64,
}

impl ProjectionBuilder {
    pub fn new(intrinsics: CameraIntrinsics) -> Result<Self, ProjectionError> {
        intrinsics.validate()?;
        Ok(Self {
            matrix: ProjectionMatrix::from_intrinsics(&intrinsics),
            intrinsics,
            generation: 0,
        })
    }

    pub fn matrix(&self) -> &ProjectionMatrix {
        &self.matrix
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A freshly loaded calibration replaces everything, including overrides.
    pub fn set_calibration(&mut self, intrinsics: CameraIntrinsics) -> ProjectionUpdate {
        self.apply(intrinsics.validate().map(|_| intrinsics))
    }

    /// User-pasted 3×3 calibration matrix.
    pub fn set_calibration_matrix(&mut self, k: &[Vec<f64>]) -> ProjectionUpdate {
        let candidate = self.intrinsics.with_calibration_matrix(k);
        self.apply(candidate)
    }

    /// User-edited far plane.
    pub fn set_far_plane(&mut self, far: f64) -> ProjectionUpdate {
        let candidate = self.intrinsics.with_far_plane(far);
        self.apply(candidate.validate().map(|_| candidate))
    }

    fn apply(&mut self, candidate: Result<CameraIntrinsics, ProjectionError>) -> ProjectionUpdate {
        let intrinsics = match candidate {
            Ok(k) => k,
            Err(e) => {
                warn!("rejected intrinsics edit: {}", e);
                return ProjectionUpdate::Rejected(e);
            }
        };
        if intrinsics == self.intrinsics {
            return ProjectionUpdate::Unchanged;
        }

        self.intrinsics = intrinsics;
        self.matrix = ProjectionMatrix::from_intrinsics(&intrinsics);
        self.generation += 1;
        debug!("projection matrix rebuilt (generation {})", self.generation);
        ProjectionUpdate::Updated {
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(2000.0, 1000.0, 1000.0, 1000.0, 1000.0, 500.0)
    }

    #[test]
    fn test_centered_principal_point() {
        let m = ProjectionMatrix::from_intrinsics(&reference_intrinsics());
        assert_relative_eq!(m.at(0, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.at(0, 2), 0.0, epsilon = 1e-12);
        assert_relative_eq!(m.at(1, 1), 2.0, epsilon = 1e-12);
        assert_relative_eq!(m.at(1, 2), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_column_major_layout() {
        let m = ProjectionMatrix::from_intrinsics(&reference_intrinsics());
        let flat = m.as_array();

        // row3 = [0, 0, -1, 0] lands at index 2*4 + 3
        assert_eq!(flat[11], -1.0);
        assert_eq!(flat[15], 0.0);
        // -2fn/(f-n) sits in the last column, third row
        let (n, f) = (DEFAULT_NEAR_PLANE, DEFAULT_FAR_PLANE);
        assert_relative_eq!(flat[14], -(2.0 * f * n) / (f - n), epsilon = 1e-12);
        assert_eq!(m.to_matrix4()[(3, 2)], -1.0);
    }

    #[test]
    fn test_far_plane_edit_bumps_generation() {
        let mut builder = ProjectionBuilder::new(reference_intrinsics()).unwrap();
        assert_eq!(builder.generation(), 0);

        let update = builder.set_far_plane(150.0);
        assert_eq!(update, ProjectionUpdate::Updated { generation: 1 });
        assert_eq!(builder.intrinsics().far_plane, 150.0);

        // Same value again is not a change
        assert_eq!(builder.set_far_plane(150.0), ProjectionUpdate::Unchanged);
        assert_eq!(builder.generation(), 1);
    }

    #[test]
    fn test_rejects_bad_far_plane() {
        let mut builder = ProjectionBuilder::new(reference_intrinsics()).unwrap();
        let before = *builder.matrix();

        for far in [0.0, -5.0, f64::NAN, DEFAULT_NEAR_PLANE] {
            let update = builder.set_far_plane(far);
            assert!(matches!(update, ProjectionUpdate::Rejected(_)));
        }
        assert_eq!(*builder.matrix(), before);
        assert_eq!(builder.generation(), 0);
    }

    #[test]
    fn test_rejects_non_square_calibration_matrix() {
        let mut builder = ProjectionBuilder::new(reference_intrinsics()).unwrap();
        let k = vec![vec![1000.0, 0.0, 1000.0], vec![0.0, 1000.0, 500.0]];

        let update = builder.set_calibration_matrix(&k);
        assert_eq!(
            update,
            ProjectionUpdate::Rejected(ProjectionError::NotThreeByThree { rows: 2, cols: 3 })
        );
        assert_eq!(builder.generation(), 0);
    }

    #[test]
    fn test_calibration_matrix_override() {
        let mut builder = ProjectionBuilder::new(reference_intrinsics()).unwrap();
        let k = vec![
            vec![500.0, 0.0, 800.0],
            vec![0.0, 500.0, 400.0],
            vec![0.0, 0.0, 1.0],
        ];

        assert!(builder.set_calibration_matrix(&k).is_updated());
        let m = builder.matrix();
        assert_relative_eq!(m.at(0, 0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(m.at(0, 2), -0.2, epsilon = 1e-12);
        assert_relative_eq!(m.at(1, 2), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_new_calibration_resets_far_plane_override() {
        let mut builder = ProjectionBuilder::new(reference_intrinsics()).unwrap();
        builder.set_far_plane(120.0);

        let fresh = CameraIntrinsics::new(1024.0, 768.0, 800.0, 800.0, 512.0, 384.0);
        assert!(builder.set_calibration(fresh).is_updated());
        assert_eq!(builder.intrinsics().far_plane, DEFAULT_FAR_PLANE);
    }
}
