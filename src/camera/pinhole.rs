//! Ideal pinhole camera model.
//!
//! Projection without lens distortion: `u = fx·X/Z + cx`, `v = fy·Y/Z + cy`.
//! The simulator renders through this model and adds distortion afterwards as
//! an image-space remap.

use crate::camera::{
    validate_point_in_front, validation, yaml_io, CameraModel, CameraModelError, Intrinsics,
    Resolution,
};
use log::info;
use nalgebra::{DVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pinhole camera described by intrinsics and resolution only.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeModel {
    /// Camera intrinsic parameters: `fx`, `fy`, `cx`, `cy`.
    pub intrinsics: Intrinsics,
    /// Image resolution as width and height in pixels.
    pub resolution: Resolution,
}

impl PinholeModel {
    /// Creates a new [`PinholeModel`] from `[fx, fy, cx, cy]`.
    ///
    /// The resolution starts at 0x0 and is expected to be set by the caller or
    /// loaded from YAML.
    pub fn new(parameters: &DVector<f64>) -> Result<Self, CameraModelError> {
        if parameters.len() != 4 {
            return Err(CameraModelError::InvalidParams(format!(
                "Expected 4 parameters (fx, fy, cx, cy), got {}",
                parameters.len()
            )));
        }

        let model = PinholeModel {
            intrinsics: Intrinsics {
                fx: parameters[0],
                fy: parameters[1],
                cx: parameters[2],
                cy: parameters[3],
            },
            resolution: Resolution {
                width: 0,
                height: 0,
            },
        };

        info!("new pinhole model is: {model:?}");
        Ok(model)
    }

    /// Creates a model whose principal point sits at the image center.
    pub fn from_field_of_view(
        resolution: Resolution,
        hfov_deg: f64,
        vfov_deg: Option<f64>,
    ) -> Result<Self, CameraModelError> {
        let intrinsics = Intrinsics::from_field_of_view(&resolution, hfov_deg, vfov_deg)?;
        Ok(PinholeModel {
            intrinsics,
            resolution,
        })
    }

    /// Horizontal and vertical field of view in degrees.
    ///
    /// Computed per side of the principal point, so an off-center principal
    /// point is accounted for.
    pub fn field_of_view(&self) -> (f64, f64) {
        let w = self.resolution.width as f64;
        let h = self.resolution.height as f64;
        let i = &self.intrinsics;
        let hfov = (i.cx / i.fx).atan() + ((w - i.cx) / i.fx).atan();
        let vfov = (i.cy / i.fy).atan() + ((h - i.cy) / i.fy).atan();
        (hfov.to_degrees(), vfov.to_degrees())
    }
}

impl fmt::Debug for PinholeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pinhole [fx: {} fy: {} cx: {} cy: {}] {}x{}",
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.resolution.width,
            self.resolution.height
        )
    }
}

impl CameraModel for PinholeModel {
    /// Projects a camera-frame point to pixels. Points outside the frame are
    /// not rejected.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::DegenerateProjection`]: If `z <= 0`.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        validate_point_in_front(point_3d.z)?;
        Ok(Vector2::new(
            self.intrinsics.fx * point_3d.x / point_3d.z + self.intrinsics.cx,
            self.intrinsics.fy * point_3d.y / point_3d.z + self.intrinsics.cy,
        ))
    }

    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let n = self.intrinsics.normalize(point_2d);
        Ok(Vector3::new(n.x, n.y, 1.0).normalize())
    }

    /// Loads a `pinhole` camera (`intrinsics: [fx, fy, cx, cy]`).
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let (intrinsics, resolution, extra_params) = yaml_io::parse_yaml_camera(path, 4)?;
        if !extra_params.is_empty() {
            return Err(CameraModelError::InvalidParams(format!(
                "Pinhole model expects exactly 4 parameters (fx, fy, cx, cy), got {}",
                4 + extra_params.len()
            )));
        }

        let model = PinholeModel {
            intrinsics,
            resolution,
        };
        model.validate_params()?;
        Ok(model)
    }

    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        yaml_io::save_yaml_camera(path, "pinhole", &self.intrinsics, &self.resolution, &[])
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn get_distortion(&self) -> Vec<f64> {
        vec![]
    }

    fn get_model_name(&self) -> &'static str {
        "pinhole"
    }
}
