//! The "POSE" Pipeline - per-frame rigid-body poses
//! ================================================
//!
//! Survey files store poses in their own axis convention:
//! - translation rows are ordered `(y, z, x)`
//! - rotation rows are Euler angles in degrees, order `x, z, y`
//!
//! Both facts are the same convention seen twice. Permuting translations
//! `yzx → xyz` is only valid together with reading rotations as `xzy`
//! instead of `zyx`, so the pair lives in one place: [`AxisConvention`].

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// AXIS CONVENTION
// ============================================================================

/// Euler axis order used to interpret a rotation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EulerOrder {
    /// Intrinsic x, then z, then y
    Xzy,
    /// Intrinsic z, then y, then x
    Zyx,
}

/// Coupled translation permutation + rotation order of a pose file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConvention {
    /// `renderer[i] = file[permutation[i]]`
    pub permutation: [usize; 3],

    /// Euler order of the rotation rows stored alongside
    pub rotation_order: EulerOrder,
}

impl AxisConvention {
    /// Convention of the survey pose files: `(y, z, x)` rows, `xzy` rotations.
    pub const SURVEY: AxisConvention = AxisConvention {
        permutation: [2, 0, 1],
        rotation_order: EulerOrder::Xzy,
    };

    /// File-order row → renderer-order vector.
    pub fn to_renderer(&self, row: [f64; 3]) -> Vector3<f64> {
        let p = self.permutation;
        Vector3::new(row[p[0]], row[p[1]], row[p[2]])
    }

    /// Renderer-order vector → file-order row.
    pub fn to_file(&self, v: &Vector3<f64>) -> [f64; 3] {
        let mut row = [0.0; 3];
        for (i, &src) in self.permutation.iter().enumerate() {
            row[src] = v[i];
        }
        row
    }

    /// Re-indexes a matrix with the same permutation applied to rows and columns.
    ///
    /// `permute_matrix(m) · to_renderer(v) == to_renderer(m · v)`.
    pub fn permute_matrix(&self, m: &Matrix3<f64>) -> Matrix3<f64> {
        let p = self.permutation;
        Matrix3::from_fn(|i, j| m[(p[i], p[j])])
    }

    /// Inverse of [`permute_matrix`](Self::permute_matrix).
    pub fn unpermute_matrix(&self, m: &Matrix3<f64>) -> Matrix3<f64> {
        let p = self.permutation;
        let mut out = Matrix3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                out[(p[i], p[j])] = m[(i, j)];
            }
        }
        out
    }
}

impl Default for AxisConvention {
    fn default() -> Self {
        Self::SURVEY
    }
}

// ============================================================================
// ROTATION CONVERSIONS
// ============================================================================

/// Builds a rotation from `[x, z, y]` Euler angles in degrees (intrinsic order).
pub fn to_rotation(euler_xzy_deg: &Vector3<f64>) -> Rotation3<f64> {
    let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), euler_xzy_deg[0].to_radians());
    let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), euler_xzy_deg[1].to_radians());
    let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), euler_xzy_deg[2].to_radians());
    rx * rz * ry
}

/// The rotation as a plain 3×3 matrix.
pub fn to_matrix(r: &Rotation3<f64>) -> Matrix3<f64> {
    *r.matrix()
}

/// The inverse (transpose) rotation matrix.
pub fn to_inverse_matrix(r: &Rotation3<f64>) -> Matrix3<f64> {
    *r.inverse().matrix()
}

/// Sign flips applied to the camera Euler angles.
///
/// These were matched by eye against recorded footage, not derived.
/// Both flags on is the current convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEulerSigns {
    pub negate_yaw: bool,
    pub negate_roll: bool,
}

impl Default for CameraEulerSigns {
    fn default() -> Self {
        Self {
            negate_yaw: true,
            negate_roll: true,
        }
    }
}

/// Camera Euler angles `[yaw, pitch, roll]` (degrees) of the inverse
/// rotation, extrinsic `zyx`, with the configured sign flips.
///
/// Extrinsic `zyx` of `R⁻¹` is `R⁻¹ = Rx(γ)·Ry(β)·Rz(α)`, so
/// `R = Rz(-α)·Ry(-β)·Rx(-γ)` and the angles fall out of the intrinsic
/// `ZYX` decomposition of `R` itself.
pub fn to_camera_euler(r: &Rotation3<f64>, signs: CameraEulerSigns) -> Vector3<f64> {
    let (roll, pitch, yaw) = r.euler_angles();
    let (alpha, beta, gamma) = (-yaw.to_degrees(), -pitch.to_degrees(), -roll.to_degrees());
    Vector3::new(
        if signs.negate_yaw { -alpha } else { alpha },
        beta,
        if signs.negate_roll { -gamma } else { gamma },
    )
}

// ============================================================================
// POSES
// ============================================================================

/// One frame's pose in renderer axis order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub index: usize,
    pub translation: Vector3<f64>,
    pub rotation_euler_xzy_deg: Vector3<f64>,
}

/// Quantities computed once per pose at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedPose {
    pub rotation_matrix: Matrix3<f64>,
    pub rotation_matrix_inv: Matrix3<f64>,
    /// `[yaw, pitch, roll]` for the renderer's camera
    pub rotation_euler_zyx_deg: Vector3<f64>,
}

impl DerivedPose {
    pub fn from_euler(euler_xzy_deg: &Vector3<f64>, signs: CameraEulerSigns) -> Self {
        let r = to_rotation(euler_xzy_deg);
        Self {
            rotation_matrix: to_matrix(&r),
            rotation_matrix_inv: to_inverse_matrix(&r),
            rotation_euler_zyx_deg: to_camera_euler(&r, signs),
        }
    }
}

/// The loaded pose track, replaced wholesale on every new upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseSequence {
    poses: Vec<Pose>,
    derived: Vec<DerivedPose>,
}

impl PoseSequence {
    /// Pairs translation and rotation rows.
    ///
    /// `translations` are already in renderer order. Only the first
    /// `min(N, M)` rows are combined; an empty result is legal.
    pub fn from_rows(
        translations: &[Vector3<f64>],
        rotations_xzy_deg: &[Vector3<f64>],
        signs: CameraEulerSigns,
    ) -> Self {
        if translations.len() != rotations_xzy_deg.len() {
            warn!(
                "pose length mismatch: {} translations, {} rotations; truncating",
                translations.len(),
                rotations_xzy_deg.len()
            );
        }

        let (poses, derived) = translations
            .iter()
            .zip(rotations_xzy_deg)
            .enumerate()
            .map(|(index, (t, e))| {
                let pose = Pose {
                    index,
                    translation: *t,
                    rotation_euler_xzy_deg: *e,
                };
                (pose, DerivedPose::from_euler(e, signs))
            })
            .unzip();

        Self { poses, derived }
    }

    pub fn frame_count(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn pose(&self, index: usize) -> Option<&Pose> {
        self.poses.get(index)
    }

    pub fn derived(&self, index: usize) -> Option<&DerivedPose> {
        self.derived.get(index)
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn translations(&self) -> Vec<Vector3<f64>> {
        self.poses.iter().map(|p| p.translation).collect()
    }

    pub fn rotation_matrices(&self) -> Vec<Matrix3<f64>> {
        self.derived.iter().map(|d| d.rotation_matrix).collect()
    }
}
