//! Camera placement in the world.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::CameraModelError;

/// Position and orientation of a camera.
///
/// `orientation` rotates camera-frame vectors into the world frame; the camera
/// looks along its +Z axis with +Y pointing down in the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    position: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl CameraPose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at `position` looking at `target`, with `up` appearing upward in the image.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::InvalidParams` if `target == position` or `up` is
    ///   parallel to the view direction
    pub fn look_at(
        position: Vector3<f64>,
        target: Vector3<f64>,
        up: Vector3<f64>,
    ) -> Result<Self, CameraModelError> {
        Ok(Self {
            position,
            orientation: look_rotation(&position, &target, &up)?,
        })
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    /// Viewing direction in world coordinates.
    pub fn forward(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    /// World direction that appears upward in the image.
    pub fn up(&self) -> Vector3<f64> {
        -(self.orientation * Vector3::y())
    }

    /// World direction that appears to the right in the image.
    pub fn right(&self) -> Vector3<f64> {
        self.orientation * Vector3::x()
    }

    /// A point one unit in front of the camera.
    pub fn look_position(&self) -> Vector3<f64> {
        self.position + self.forward()
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    /// Sets the orientation from roll, pitch and yaw in degrees (X, Y, Z).
    pub fn set_orientation_from_euler(&mut self, angles_deg: Vector3<f64>) {
        self.orientation = UnitQuaternion::from_euler_angles(
            angles_deg.x.to_radians(),
            angles_deg.y.to_radians(),
            angles_deg.z.to_radians(),
        );
    }

    /// Turns the camera to face `target`. The pose is unchanged on error.
    pub fn set_look_at(
        &mut self,
        target: Vector3<f64>,
        up: Vector3<f64>,
    ) -> Result<(), CameraModelError> {
        self.orientation = look_rotation(&self.position, &target, &up)?;
        Ok(())
    }

    /// Expresses a world point in the camera frame.
    pub fn world_to_camera(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse_transform_vector(&(point - self.position))
    }

    /// Rotates a camera-frame direction into the world frame.
    pub fn camera_to_world_direction(&self, direction: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * direction
    }
}

fn look_rotation(
    position: &Vector3<f64>,
    target: &Vector3<f64>,
    up: &Vector3<f64>,
) -> Result<UnitQuaternion<f64>, CameraModelError> {
    let z = (target - position)
        .try_normalize(1e-12)
        .ok_or_else(|| {
            CameraModelError::InvalidParams("Look-at target coincides with the camera".to_string())
        })?;

    let up_orthogonal = up - z * up.dot(&z);
    let y = -up_orthogonal.try_normalize(1e-9).ok_or_else(|| {
        CameraModelError::InvalidParams(format!(
            "Up vector {:?} is parallel to the view direction",
            up.as_slice()
        ))
    })?;
    let x = y.cross(&z);

    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
    Ok(UnitQuaternion::from_rotation_matrix(&rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_pose_is_identity() {
        let pose = CameraPose::default();
        let p = Vector3::new(0.1, -0.2, 3.0);
        assert_relative_eq!(pose.world_to_camera(&p), p);
        assert_relative_eq!(pose.forward(), Vector3::z());
        assert_relative_eq!(pose.look_position(), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_look_at_puts_target_on_axis() {
        let position = Vector3::new(1.0, 2.0, -3.0);
        let target = Vector3::new(-0.5, 0.0, 4.0);
        let pose = CameraPose::look_at(position, target, Vector3::y()).unwrap();

        let in_camera = pose.world_to_camera(&target);
        assert_relative_eq!(in_camera.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(in_camera.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(in_camera.z, (target - position).norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_look_at_up_maps_to_negative_y() {
        let pose =
            CameraPose::look_at(Vector3::zeros(), Vector3::new(0.0, 0.0, 5.0), Vector3::y())
                .unwrap();
        let above = pose.world_to_camera(&Vector3::new(0.0, 1.0, 5.0));
        assert!(above.y < 0.0);
        assert_relative_eq!(pose.up(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(pose.right().cross(&pose.up().scale(-1.0)), pose.forward(), epsilon = 1e-12);
    }

    #[test]
    fn test_look_at_rejects_parallel_up() {
        let mut pose = CameraPose::default();
        let before = pose;
        assert!(pose
            .set_look_at(Vector3::new(0.0, 0.0, 2.0), Vector3::z())
            .is_err());
        assert_eq!(pose, before);
        assert!(CameraPose::look_at(Vector3::zeros(), Vector3::zeros(), Vector3::y()).is_err());
    }

    #[test]
    fn test_set_orientation_from_euler() {
        let mut pose = CameraPose::default();
        pose.set_orientation_from_euler(Vector3::new(0.0, 90.0, 0.0));
        // Pitching by 90 degrees about Y turns +Z toward +X.
        assert_relative_eq!(pose.forward(), Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_camera_to_world_direction() {
        let pose = CameraPose::new(
            Vector3::new(0.0, 0.0, -1.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let d = pose.camera_to_world_direction(&Vector3::x());
        assert_relative_eq!(d, Vector3::y(), epsilon = 1e-12);
        let p = pose.world_to_camera(&Vector3::new(0.0, 1.0, -1.0));
        assert_relative_eq!(p, Vector3::x(), epsilon = 1e-12);
    }
}
