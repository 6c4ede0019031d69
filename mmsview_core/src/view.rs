//! First-person camera view state derived from the active pose.

use crate::pose::{DerivedPose, Pose};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Bearing of the renderer's camera when the train heads along +x.
const BASE_BEARING_DEG: f64 = 90.0;

/// User-adjustable camera offset relative to the recorded camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl CameraOffset {
    /// From the `[x, y, z, yaw, pitch, roll]` layout used by the offset inputs.
    pub fn from_array(v: [f64; 6]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
            yaw: v[3],
            pitch: v[4],
            roll: v[5],
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Everything the renderer needs to place its camera for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub position: Vector3<f64>,
    /// Degrees
    pub bearing: f64,
    /// Degrees
    pub pitch: f64,
    /// Applied by rotating the output canvas, in degrees
    pub roll: f64,
}

impl ViewState {
    /// The offset is expressed in the camera frame, so it is added after
    /// rotating the translation and the sum is rotated back.
    pub fn from_pose(pose: &Pose, derived: &DerivedPose, offset: &CameraOffset) -> Self {
        let sum = offset.translation() + derived.rotation_matrix * pose.translation;
        let euler = derived.rotation_euler_zyx_deg;
        Self {
            position: derived.rotation_matrix_inv * sum,
            bearing: BASE_BEARING_DEG + euler[0] + offset.yaw,
            pitch: euler[1] + offset.pitch,
            roll: euler[2] + offset.roll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::CameraEulerSigns;
    use approx::assert_relative_eq;

    fn pose_at(t: Vector3<f64>, euler: Vector3<f64>) -> (Pose, DerivedPose) {
        let pose = Pose {
            index: 0,
            translation: t,
            rotation_euler_xzy_deg: euler,
        };
        let derived = DerivedPose::from_euler(&euler, CameraEulerSigns::default());
        (pose, derived)
    }

    #[test]
    fn test_zero_offset_keeps_recorded_position() {
        let (pose, derived) = pose_at(Vector3::new(10.0, -4.0, 2.0), Vector3::new(5.0, 40.0, -15.0));
        let view = ViewState::from_pose(&pose, &derived, &CameraOffset::default());

        assert_relative_eq!(view.position, pose.translation, epsilon = 1e-9);
        assert_relative_eq!(view.bearing, 90.0 + derived.rotation_euler_zyx_deg[0], epsilon = 1e-12);
    }

    #[test]
    fn test_offset_is_in_camera_frame() {
        // Heading rotated 90 degrees about z: a camera-frame x offset moves along -y
        let (pose, derived) = pose_at(Vector3::zeros(), Vector3::new(0.0, 90.0, 0.0));
        let offset = CameraOffset::from_array([1.0, 0.0, 0.0, 5.0, -2.0, 3.0]);
        let view = ViewState::from_pose(&pose, &derived, &offset);

        assert_relative_eq!(view.position, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(view.bearing, 90.0 + 90.0 + 5.0, epsilon = 1e-9);
        assert_relative_eq!(view.pitch, -2.0, epsilon = 1e-9);
        assert_relative_eq!(view.roll, 3.0, epsilon = 1e-9);
    }
}
