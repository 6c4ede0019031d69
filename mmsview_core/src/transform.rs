//! Per-Frame Transform Calculator
//!
//! Every placement in the scene is `T(point) · R`: rotate about the local
//! origin, then move to `point`. The camera and the overlays only differ in
//! how `point` and `R` are prepared beforehand.

use crate::pose::{AxisConvention, DerivedPose};
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Homogeneous rigid transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform4x4(pub Matrix4<f64>);

impl Transform4x4 {
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// Transforms a point (w = 1).
    pub fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        let h = self.0 * p.push(1.0);
        Vector3::new(h.x, h.y, h.z)
    }

    /// Transforms a fixed shape, e.g. the loading gauge outline.
    pub fn transform_points(&self, points: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Flat column-major array, the layout the renderer consumes.
    pub fn to_column_major(&self) -> [f64; 16] {
        let mut flat = [0.0; 16];
        flat.copy_from_slice(self.0.as_slice());
        flat
    }
}

/// `T(point) · R`.
pub fn compose_pose(point: &Vector3<f64>, rotation: &Matrix3<f64>) -> Transform4x4 {
    let mut m = rotation.to_homogeneous();
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(point);
    Transform4x4(m)
}

/// Combines the first `min(N, M)` translation/rotation pairs.
pub fn compose_batch(translations: &[Vector3<f64>], rotations: &[Matrix3<f64>]) -> Vec<Transform4x4> {
    if translations.len() != rotations.len() {
        warn!(
            "transform batch mismatch: {} translations, {} rotations",
            translations.len(),
            rotations.len()
        );
    }
    translations
        .iter()
        .zip(rotations)
        .map(|(t, r)| compose_pose(t, r))
        .collect()
}

/// Camera view transform from a file-order translation and file-frame rotation.
///
/// The translation is negated and permuted to `(-t.z, -t.x, -t.y)` and the
/// rotation re-indexed with the same permutation, so both follow the pose
/// file's axis convention.
pub fn camera_view_transform(
    file_translation: [f64; 3],
    file_rotation: &Matrix3<f64>,
    convention: &AxisConvention,
) -> Transform4x4 {
    let t = -convention.to_renderer(file_translation);
    let r = convention.permute_matrix(file_rotation);
    compose_pose(&t, &r)
}

/// Whether an overlay turns with the track or against the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayOrientation {
    /// Rotation matrix as loaded
    Direct,
    /// Precomputed inverse rotation
    #[default]
    CounterRotated,
}

/// Places an overlay at `translation`, already in renderer order.
pub fn overlay_transform(
    translation: &Vector3<f64>,
    derived: &DerivedPose,
    orientation: OverlayOrientation,
) -> Transform4x4 {
    let r = match orientation {
        OverlayOrientation::Direct => &derived.rotation_matrix,
        OverlayOrientation::CounterRotated => &derived.rotation_matrix_inv,
    };
    compose_pose(translation, r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{to_matrix, to_rotation, CameraEulerSigns};
    use approx::assert_relative_eq;

    #[test]
    fn test_origin_maps_to_point() {
        let r = to_matrix(&to_rotation(&Vector3::new(33.0, -12.0, 70.0)));
        let t = Vector3::new(4.5, -2.25, 10.0);

        let out = compose_pose(&t, &r).apply(&Vector3::zeros());
        assert_eq!(out, t);
    }

    #[test]
    fn test_rotate_then_translate() {
        // 90 degrees about y takes x to -z
        let r = to_matrix(&to_rotation(&Vector3::new(0.0, 0.0, 90.0)));
        let t = Vector3::new(1.0, 2.0, 3.0);

        let out = compose_pose(&t, &r).apply(&Vector3::x());
        assert_relative_eq!(out, Vector3::new(1.0, 2.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_batch_uses_shorter_length() {
        let translations: Vec<_> = (0..500).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();
        let rotations = vec![Matrix3::identity(); 480];

        let batch = compose_batch(&translations, &rotations);
        assert_eq!(batch.len(), 480);
        assert_eq!(batch[479].apply(&Vector3::zeros()).x, 479.0);
    }

    #[test]
    fn test_camera_view_negates_and_permutes() {
        let file_t = [1.0, 2.0, 3.0];
        let m = camera_view_transform(file_t, &Matrix3::identity(), &AxisConvention::SURVEY);
        assert_eq!(m.apply(&Vector3::zeros()), Vector3::new(-3.0, -1.0, -2.0));
    }

    #[test]
    fn test_camera_view_rotation_reindex() {
        let r = Matrix3::new(
            0.0, 1.0, 2.0,
            10.0, 11.0, 12.0,
            20.0, 21.0, 22.0,
        );
        let m = camera_view_transform([0.0; 3], &r, &AxisConvention::SURVEY);

        // [[R22,R20,R21],[R02,R00,R01],[R12,R10,R11]]
        let expected = Matrix3::new(
            22.0, 20.0, 21.0,
            2.0, 0.0, 1.0,
            12.0, 10.0, 11.0,
        );
        assert_eq!(m.matrix().fixed_view::<3, 3>(0, 0).into_owned(), expected);
    }

    #[test]
    fn test_overlay_counter_rotation_uses_inverse() {
        let derived = DerivedPose::from_euler(&Vector3::new(0.0, 45.0, 0.0), CameraEulerSigns::default());
        let t = Vector3::new(0.0, 0.0, 5.0);

        let direct = overlay_transform(&t, &derived, OverlayOrientation::Direct);
        let counter = overlay_transform(&t, &derived, OverlayOrientation::CounterRotated);

        let p = Vector3::new(1.0, 0.0, 0.0);
        let back = counter.apply(&(direct.apply(&p) - t));
        assert_relative_eq!(back, p + t, epsilon = 1e-12);
    }

    #[test]
    fn test_column_major_translation() {
        let m = compose_pose(&Vector3::new(7.0, 8.0, 9.0), &Matrix3::identity());
        let flat = m.to_column_major();
        assert_eq!(&flat[12..15], &[7.0, 8.0, 9.0]);
    }
}
