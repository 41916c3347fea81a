//! Radial-Tangential (Brown–Conrady) Camera Model Implementation
//!
//! This module implements the five-coefficient radial-tangential lens model
//! used by OpenCV. A camera-frame point is projected to normalized coordinates,
//! the polynomial is applied, and the result is scaled by the intrinsics. It
//! adheres to the [`CameraModel`] trait defined in the parent `camera` module
//! ([`crate::camera`]).
//!
//! # References
//!
//! Brown, D. C. (1966). Decentering Distortion of Lenses.

use crate::camera::{
    validate_point_in_front, validation, yaml_io, CameraModel, CameraModelError, Intrinsics,
    PinholeModel, Resolution,
};
use crate::distortion::DistortionCoefficients;
use log::info;
use nalgebra::{DVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Implements the Brown–Conrady camera model.
///
/// # Fields
///
/// *   `intrinsics`: [`Intrinsics`] - Holds the focal lengths (fx, fy) and principal point (cx, cy).
/// *   `resolution`: [`Resolution`] - The width and height of the camera image in pixels.
/// *   `distortion`: [`DistortionCoefficients`] - `k1, k2, p1, p2, k3`.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{DVector, Vector3};
/// use camera_sim::camera::rad_tan::RadTanModel;
/// use camera_sim::camera::{CameraModel, Resolution};
///
/// // Parameters: fx, fy, cx, cy, k1, k2, p1, p2, k3
/// let params = DVector::from_vec(vec![1000.0, 1000.0, 360.0, 360.0, -0.1, 0.0, 0.0, 0.0, 0.0]);
/// let mut model = RadTanModel::new(&params).unwrap();
/// model.resolution = Resolution { width: 720, height: 720 };
///
/// let pixel = model.project(&Vector3::new(0.2, 0.0, 1.0)).unwrap();
/// assert!((pixel.x - 559.2).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadTanModel {
    /// Camera intrinsic parameters: `fx`, `fy`, `cx`, `cy`.
    pub intrinsics: Intrinsics,
    /// Image resolution as width and height in pixels.
    pub resolution: Resolution,
    /// Lens distortion coefficients.
    pub distortion: DistortionCoefficients,
}

impl RadTanModel {
    /// Creates a new [`RadTanModel`] from a DVector of parameters.
    ///
    /// The image resolution is initialized to 0x0 and should be set explicitly
    /// or by loading from a configuration file like YAML.
    ///
    /// # Arguments
    ///
    /// * `parameters`: A `&DVector<f64>` containing, in order:
    ///   `fx, fy, cx, cy, k1, k2, p1, p2, k3`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::ShapeMismatch`]: If the vector does not hold 9 values.
    pub fn new(parameters: &DVector<f64>) -> Result<Self, CameraModelError> {
        if parameters.len() != 9 {
            return Err(CameraModelError::ShapeMismatch {
                expected: 9,
                actual: parameters.len(),
            });
        }

        let model = RadTanModel {
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
            distortion: DistortionCoefficients::from_slice(&parameters.as_slice()[4..])?,
        };

        info!("new RadTan model is: {model:?}");
        Ok(model)
    }

    /// Creates a model from its parts, validating the intrinsics.
    pub fn from_parts(
        intrinsics: Intrinsics,
        resolution: Resolution,
        distortion: DistortionCoefficients,
    ) -> Result<Self, CameraModelError> {
        let model = RadTanModel {
            intrinsics,
            resolution,
            distortion,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// The same camera with the lens removed.
    pub fn as_pinhole(&self) -> PinholeModel {
        PinholeModel {
            intrinsics: self.intrinsics,
            resolution: self.resolution,
        }
    }
}

/// Provides a debug string representation for [`RadTanModel`].
impl fmt::Debug for RadTanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadTan [fx: {} fy: {} cx: {} cy: {} distortion: {:?}]",
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.distortion.to_array()
        )
    }
}

impl CameraModel for RadTanModel {
    /// Projects a 3D point from camera coordinates to distorted pixel coordinates.
    ///
    /// The point is divided by its depth, the radial-tangential polynomial is
    /// applied to the normalized coordinate, and the result is scaled by the
    /// focal lengths and offset by the principal point.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::DegenerateProjection`]: If the point's z-coordinate is not positive.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        validate_point_in_front(point_3d.z)?;

        let x = point_3d.x / point_3d.z;
        let y = point_3d.y / point_3d.z;
        let (xd, yd) = self.distortion.distort_normalized(x, y);

        Ok(self.intrinsics.denormalize(&Vector2::new(xd, yd)))
    }

    /// Unprojects a distorted pixel to a unit ray in camera coordinates.
    ///
    /// The polynomial is inverted with Newton's method on the normalized
    /// coordinate.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::NumericalError`]: If the inversion does not converge.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let n = self.intrinsics.normalize(point_2d);
        let (x, y) = self.distortion.undistort_normalized(n.x, n.y)?;
        Ok(Vector3::new(x, y, 1.0).normalize())
    }

    /// Loads [`RadTanModel`] parameters from a YAML file.
    ///
    /// The `intrinsics` array under `cam0` holds
    /// `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::IOError`]: If there's an issue reading the file.
    /// * [`CameraModelError::YamlError`]: If the YAML content is malformed.
    /// * [`CameraModelError::InvalidParams`]: If fields are missing or of the wrong type.
    /// * [`CameraModelError::ShapeMismatch`]: If there are not exactly 5 distortion coefficients.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let (intrinsics, resolution, extra_params) = yaml_io::parse_yaml_camera(path, 4)?;
        let distortion = DistortionCoefficients::from_slice(&extra_params)?;

        let model = RadTanModel {
            intrinsics,
            resolution,
            distortion,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// Saves the [`RadTanModel`] parameters to a YAML file under `cam0`.
    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        yaml_io::save_yaml_camera(
            path,
            "rad_tan",
            &self.intrinsics,
            &self.resolution,
            &self.distortion.to_array(),
        )
    }

    /// Validates the intrinsics and checks that every coefficient is finite.
    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        DistortionCoefficients::from_slice(&self.distortion.to_array())?;
        Ok(())
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    /// Returns `[k1, k2, p1, p2, k3]`.
    fn get_distortion(&self) -> Vec<f64> {
        self.distortion.to_array().to_vec()
    }

    fn get_model_name(&self) -> &'static str {
        "rad_tan"
    }
}

/// Unit tests for the [`RadTanModel`].
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn get_sample_model() -> RadTanModel {
        RadTanModel {
            intrinsics: Intrinsics {
                fx: 461.629,
                fy: 460.152,
                cx: 362.680,
                cy: 246.049,
            },
            resolution: Resolution {
                width: 752,
                height: 480,
            },
            distortion: DistortionCoefficients::new(
                -0.27695497,
                0.06712482,
                0.00087538,
                0.00011556,
                -0.00628,
            ),
        }
    }

    /// Tests loading [`RadTanModel`] parameters from "samples/rad_tan.yaml".
    #[test]
    fn test_rad_tan_load_from_yaml() {
        let model = RadTanModel::load_from_yaml("samples/rad_tan.yaml").unwrap();
        let expected = get_sample_model();

        assert_eq!(model.intrinsics, expected.intrinsics);
        assert_eq!(model.resolution, expected.resolution);
        assert_eq!(model.distortion, expected.distortion);
    }

    #[test]
    fn test_rad_tan_save_to_yaml() {
        std::fs::create_dir_all("output").unwrap_or_else(|_| {
            info!("Output directory already exists or couldn't be created");
        });

        let model = get_sample_model();
        let output_path = "output/rad_tan_saved.yaml";
        model.save_to_yaml(output_path).unwrap();
        let reloaded = RadTanModel::load_from_yaml(output_path).unwrap();

        assert_relative_eq!(reloaded.intrinsics.fx, model.intrinsics.fx);
        assert_relative_eq!(reloaded.intrinsics.cy, model.intrinsics.cy);
        assert_eq!(reloaded.resolution, model.resolution);
        for (a, b) in reloaded
            .get_distortion()
            .iter()
            .zip(model.get_distortion().iter())
        {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_rad_tan_project_unproject() {
        let model = get_sample_model();
        let point_3d = Vector3::new(0.3, -0.15, 1.2);
        let pixel = model.project(&point_3d).unwrap();
        let ray = model.unproject(&pixel).unwrap();
        assert_relative_eq!(ray, point_3d.normalize(), epsilon = 1e-8);
    }

    #[test]
    fn test_rad_tan_zero_coefficients_match_pinhole() {
        let mut model = get_sample_model();
        model.distortion = DistortionCoefficients::default();
        let point = Vector3::new(-0.4, 0.25, 2.0);
        assert_relative_eq!(
            model.project(&point).unwrap(),
            model.as_pinhole().project(&point).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rad_tan_new_shape() {
        let params = DVector::from_vec(vec![1000.0, 1000.0, 360.0, 360.0, -0.1]);
        assert!(matches!(
            RadTanModel::new(&params),
            Err(CameraModelError::ShapeMismatch {
                expected: 9,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_rad_tan_behind_camera() {
        let model = get_sample_model();
        assert!(matches!(
            model.project(&Vector3::new(0.1, 0.1, -0.5)),
            Err(CameraModelError::DegenerateProjection { .. })
        ));
    }
}
