//! A camera placed in a scene: lens model, pose, safe zone and distortion maps.

use std::sync::{Arc, Mutex};

use log::info;
use nalgebra::{Vector2, Vector3};

use super::{
    CameraModel, CameraModelError, CameraPose, Intrinsics, PinholeModel, RadTanModel, Resolution,
    SafeZone,
};
use crate::config::SimConfig;
use crate::distortion::{DistortionCoefficients, DistortionModel, InverseMapConfig};

/// Camera handle shared between a renderer and the code driving it.
///
/// Pose changes and renders for one camera are serialized through its mutex.
pub type SharedCamera = Arc<Mutex<SceneCamera>>;

/// Intrinsics, pose and lens of one simulated camera.
///
/// The distortion maps are built once per lens and shared through an [`Arc`];
/// moving the camera never rebuilds them.
#[derive(Debug, Clone)]
pub struct SceneCamera {
    model: RadTanModel,
    pose: CameraPose,
    safe_zone: SafeZone,
    inverse_config: InverseMapConfig,
    distortion: Arc<DistortionModel>,
}

impl SceneCamera {
    /// Builds the camera and precomputes its distortion maps.
    ///
    /// The safe-zone margin is derived from `config.safe_zone_ratio` and the
    /// model's resolution.
    pub fn new(
        model: RadTanModel,
        pose: CameraPose,
        config: &SimConfig,
    ) -> Result<Self, CameraModelError> {
        model.validate_params()?;
        let safe_zone = SafeZone::from_ratio(&model.resolution, config.safe_zone_ratio)?;
        let distortion = DistortionModel::from_coefficients(
            model.intrinsics,
            model.distortion,
            model.resolution,
            safe_zone,
            &config.inverse_map,
        )?;

        info!("scene camera {model:?} at {:?}", pose.position().as_slice());
        Ok(Self {
            model,
            pose,
            safe_zone,
            inverse_config: config.inverse_map,
            distortion: Arc::new(distortion),
        })
    }

    /// Builds a camera from a resolution and horizontal field of view, with the
    /// principal point at the image center and square pixels.
    pub fn from_field_of_view(
        resolution: Resolution,
        hfov_deg: f64,
        coefficients: &[f64],
        pose: CameraPose,
        config: &SimConfig,
    ) -> Result<Self, CameraModelError> {
        let intrinsics = Intrinsics::from_field_of_view(&resolution, hfov_deg, None)?;
        let distortion = DistortionCoefficients::from_slice(coefficients)?;
        let model = RadTanModel::from_parts(intrinsics, resolution, distortion)?;
        Self::new(model, pose, config)
    }

    /// Wraps the camera for sharing with a renderer.
    pub fn into_shared(self) -> SharedCamera {
        Arc::new(Mutex::new(self))
    }

    pub fn model(&self) -> &RadTanModel {
        &self.model
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn intrinsics(&self) -> Intrinsics {
        self.model.intrinsics
    }

    pub fn resolution(&self) -> Resolution {
        self.model.resolution
    }

    pub fn safe_zone(&self) -> SafeZone {
        self.safe_zone
    }

    pub fn distortion_model(&self) -> Arc<DistortionModel> {
        Arc::clone(&self.distortion)
    }

    /// Replaces the lens coefficients and rebuilds the maps.
    ///
    /// The previous coefficients and maps are kept if the new ones are rejected.
    pub fn set_distortion(&mut self, coefficients: &[f64]) -> Result<(), CameraModelError> {
        let distortion = DistortionModel::new(
            self.model.intrinsics,
            coefficients,
            self.model.resolution,
            self.safe_zone,
            &self.inverse_config,
        )?;
        self.model.distortion = *distortion.coefficients();
        self.distortion = Arc::new(distortion);
        Ok(())
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.pose.set_position(position);
    }

    pub fn set_orientation_from_euler(&mut self, angles_deg: Vector3<f64>) {
        self.pose.set_orientation_from_euler(angles_deg);
    }

    pub fn set_look_at(
        &mut self,
        target: Vector3<f64>,
        up: Vector3<f64>,
    ) -> Result<(), CameraModelError> {
        self.pose.set_look_at(target, up)
    }

    /// Ideal pinhole projection of world points, in nominal pixel coordinates.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::DegenerateProjection` if any point is not in front of the camera
    pub fn project_points(
        &self,
        object_points: &[Vector3<f64>],
    ) -> Result<Vec<Vector2<f64>>, CameraModelError> {
        let pinhole = self.model.as_pinhole();
        object_points
            .iter()
            .map(|p| pinhole.project(&self.pose.world_to_camera(p)))
            .collect()
    }

    /// Projection of world points through the lens polynomial.
    pub fn project_points_distorted(
        &self,
        object_points: &[Vector3<f64>],
    ) -> Result<Vec<Vector2<f64>>, CameraModelError> {
        object_points
            .iter()
            .map(|p| self.model.project(&self.pose.world_to_camera(p)))
            .collect()
    }

    /// Pixels at which world points show up in a render of this camera.
    ///
    /// With `apply_distortion` the ideal projection is carried through the
    /// same remap that [`DistortionModel::distort_image`] applies.
    pub fn locate_points_in_image(
        &self,
        object_points: &[Vector3<f64>],
        apply_distortion: bool,
    ) -> Result<Vec<Vector2<f64>>, CameraModelError> {
        let ideal = self.project_points(object_points)?;
        if !apply_distortion {
            return Ok(ideal);
        }
        ideal
            .iter()
            .map(|p| self.distortion.image_position_of(p))
            .collect()
    }

    /// Image size, optionally including the safe-zone margin.
    pub fn effective_resolution(&self, include_safe_zone: bool) -> Resolution {
        if include_safe_zone {
            self.safe_zone.expand(&self.model.resolution)
        } else {
            self.model.resolution
        }
    }

    /// Intrinsics of the effective frame (principal point shifted by the margin).
    pub fn effective_intrinsics(&self, include_safe_zone: bool) -> Intrinsics {
        if include_safe_zone {
            self.safe_zone.shift(&self.model.intrinsics)
        } else {
            self.model.intrinsics
        }
    }

    /// Horizontal and vertical field of view in degrees.
    pub fn effective_field_of_view(&self, include_safe_zone: bool) -> (f64, f64) {
        PinholeModel {
            intrinsics: self.effective_intrinsics(include_safe_zone),
            resolution: self.effective_resolution(include_safe_zone),
        }
        .field_of_view()
    }

    /// World-frame direction of the ray through a pixel of the effective frame.
    pub fn ray_direction(&self, pixel: &Vector2<f64>, include_safe_zone: bool) -> Vector3<f64> {
        let n = self.effective_intrinsics(include_safe_zone).normalize(pixel);
        self.pose
            .camera_to_world_direction(&Vector3::new(n.x, n.y, 1.0))
            .normalize()
    }
}
