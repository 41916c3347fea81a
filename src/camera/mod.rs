//! Camera projection for the simulator.
//!
//! A camera is split the same way a lens rig is: the intrinsic model maps
//! camera-frame points to pixels ([`PinholeModel`] for the ideal lens,
//! [`RadTanModel`] for the Brown–Conrady lens), [`CameraPose`] places the camera
//! in the world, and [`SceneCamera`] bundles both with the precomputed
//! distortion maps and the safe-zone margin the renderer needs.
//!
//! Camera frame convention: +X right, +Y down, +Z along the optical axis.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod pinhole;
pub mod pose;
pub mod rad_tan;
pub mod scene_camera;

pub use pinhole::PinholeModel;
pub use pose::CameraPose;
pub use rad_tan::RadTanModel;
pub use scene_camera::{SceneCamera, SharedCamera};

/// Represents the intrinsic parameters of a camera.
///
/// These parameters define the internal geometry of the camera,
/// including focal length and principal point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// The focal length along the x-axis, in pixels.
    pub fx: f64,
    /// The focal length along the y-axis, in pixels.
    pub fy: f64,
    /// The x-coordinate of the principal point (optical center), in pixels.
    pub cx: f64,
    /// The y-coordinate of the principal point (optical center), in pixels.
    pub cy: f64,
}

impl Intrinsics {
    /// Derives intrinsics from a resolution and a horizontal field of view.
    ///
    /// The principal point is placed at the image center. When `vfov_deg` is
    /// `None` pixels are square (`fy == fx`).
    pub fn from_field_of_view(
        resolution: &Resolution,
        hfov_deg: f64,
        vfov_deg: Option<f64>,
    ) -> Result<Self, CameraModelError> {
        validation::validate_resolution(resolution)?;
        let check_fov = |fov: f64| {
            if !fov.is_finite() || fov <= 0.0 || fov >= 180.0 {
                Err(CameraModelError::InvalidParams(format!(
                    "Field of view must be in (0, 180) degrees, got {fov}"
                )))
            } else {
                Ok(())
            }
        };
        check_fov(hfov_deg)?;

        let width = resolution.width as f64;
        let height = resolution.height as f64;
        let fx = (width / 2.0) / (hfov_deg.to_radians() / 2.0).tan();
        let fy = match vfov_deg {
            Some(vfov) => {
                check_fov(vfov)?;
                (height / 2.0) / (vfov.to_radians() / 2.0).tan()
            }
            None => fx,
        };

        Ok(Intrinsics {
            fx,
            fy,
            cx: width / 2.0,
            cy: height / 2.0,
        })
    }

    /// Normalized camera coordinates of a pixel.
    pub fn normalize(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            (pixel.x - self.cx) / self.fx,
            (pixel.y - self.cy) / self.fy,
        )
    }

    /// Pixel coordinates of a normalized camera coordinate.
    pub fn denormalize(&self, normalized: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            normalized.x * self.fx + self.cx,
            normalized.y * self.fy + self.cy,
        )
    }
}

/// Represents the resolution of a camera image.
///
/// This struct holds the width and height of the image sensor in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
}

/// Extra border rendered around the nominal frame, in pixels per side.
///
/// Forward distortion samples the render slightly outside the nominal frame;
/// rendering this margin keeps those samples valid. The same margin must be
/// used for the render request and the distortion map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafeZone {
    /// Margin added on the left and on the right.
    pub x: u32,
    /// Margin added on the top and on the bottom.
    pub y: u32,
}

impl SafeZone {
    /// Margin covering `ratio` of each dimension in total, split across both sides.
    pub fn from_ratio(resolution: &Resolution, ratio: f64) -> Result<Self, CameraModelError> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(CameraModelError::InvalidParams(format!(
                "Safe zone ratio must be a non-negative number, got {ratio}"
            )));
        }
        Ok(SafeZone {
            x: (resolution.width as f64 * ratio / 2.0).round() as u32,
            y: (resolution.height as f64 * ratio / 2.0).round() as u32,
        })
    }

    /// Resolution of the padded frame.
    pub fn expand(&self, resolution: &Resolution) -> Resolution {
        Resolution {
            width: resolution.width + 2 * self.x,
            height: resolution.height + 2 * self.y,
        }
    }

    /// Intrinsics of the padded frame (principal point shifted by the margin).
    pub fn shift(&self, intrinsics: &Intrinsics) -> Intrinsics {
        Intrinsics {
            cx: intrinsics.cx + self.x as f64,
            cy: intrinsics.cy + self.y as f64,
            ..*intrinsics
        }
    }
}

/// Defines the possible errors that can occur during camera model operations.
#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    /// The point lies on or behind the camera plane (z <= 0) and has no projection.
    #[error("Point is behind the camera plane (z = {z})")]
    DegenerateProjection { z: f64 },
    /// A coefficient or array argument has the wrong number of elements.
    #[error("Expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    /// An image does not match the size the distortion maps were built for.
    #[error(
        "Image is {actual_width}x{actual_height} but the distortion map expects {expected_width}x{expected_height}"
    )]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    /// Error indicating that a focal length parameter (fx or fy) is not positive.
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    /// Error indicating that a principal point coordinate (cx or cy) is not a finite number.
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    /// Error indicating that one or more camera parameters are invalid.
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    /// Error indicating a failure during YAML deserialization when loading camera parameters.
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    /// Error indicating a failure during file input/output operations.
    #[error("IO Error: {0}")]
    IOError(String),
    /// Error indicating a numerical instability or issue during calculations.
    #[error("NumericalError: {0}")]
    NumericalError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Validates that a camera-frame point lies strictly in front of the camera.
///
/// # Errors
///
/// * `CameraModelError::DegenerateProjection` if `z <= 0` or `z` is not finite
pub fn validate_point_in_front(z: f64) -> Result<(), CameraModelError> {
    if !z.is_finite() || z <= 0.0 {
        return Err(CameraModelError::DegenerateProjection { z });
    }
    Ok(())
}

/// Defines the core functionality and interface for all camera models.
///
/// Models work in the camera frame; world placement is handled by [`CameraPose`].
pub trait CameraModel {
    /// Projects a 3D point from the camera's coordinate system to 2D pixel coordinates.
    ///
    /// Points outside the image bounds are still projected; callers decide
    /// whether to keep them.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::DegenerateProjection` if the point is not in front of the camera.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Unprojects a 2D pixel to a unit-length 3D ray in the camera's coordinate system.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    /// Loads camera parameters from a YAML file.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError>
    where
        Self: Sized;

    /// Saves the camera model's parameters to a YAML file.
    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError>;

    /// Validates the current camera parameters.
    fn validate_params(&self) -> Result<(), CameraModelError>;

    /// Returns the resolution of the camera.
    fn get_resolution(&self) -> Resolution;

    /// Returns the intrinsic parameters of the camera.
    fn get_intrinsics(&self) -> Intrinsics;

    /// Returns the distortion parameters of the camera.
    fn get_distortion(&self) -> Vec<f64>;

    /// Returns the name of the camera model.
    fn get_model_name(&self) -> &'static str;
}

/// Provides common validation functions for camera parameters.
pub mod validation {
    use super::*;

    /// Checks that the focal lengths are positive and the principal point is finite.
    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > 0.0) || !(intrinsics.fy > 0.0) {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    /// Checks that both image dimensions are non-zero.
    pub fn validate_resolution(resolution: &Resolution) -> Result<(), CameraModelError> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CameraModelError::InvalidParams(format!(
                "Resolution must be non-zero, got {}x{}",
                resolution.width, resolution.height
            )));
        }
        Ok(())
    }
}

/// YAML helpers shared by the camera models.
///
/// Files follow the layout:
/// ```yaml
/// cam0:
///   camera_model: rad_tan
///   intrinsics: [fx, fy, cx, cy, ...extra_params]
///   resolution: [width, height]
/// ```
pub mod yaml_io {
    use super::*;
    use std::fs;
    use yaml_rust::{Yaml, YamlLoader};

    fn as_number(value: &Yaml) -> Option<f64> {
        value.as_f64().or_else(|| value.as_i64().map(|v| v as f64))
    }

    /// Parses intrinsics, resolution, and the extra parameters after `[fx, fy, cx, cy]`.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::IOError` if the file cannot be read
    /// * `CameraModelError::YamlError` if the document does not parse
    /// * `CameraModelError::InvalidParams` if nodes are missing or malformed
    pub fn parse_yaml_camera(
        path: &str,
        min_intrinsics_len: usize,
    ) -> Result<(Intrinsics, Resolution, Vec<f64>), CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;

        let doc = docs.first().ok_or_else(|| {
            CameraModelError::InvalidParams("Empty YAML document".to_string())
        })?;
        let cam_node = &doc["cam0"];
        if cam_node.is_badvalue() {
            return Err(CameraModelError::InvalidParams(
                "Missing 'cam0' node in YAML".to_string(),
            ));
        }

        let values = cam_node["intrinsics"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams(
                "YAML missing 'intrinsics' array under 'cam0'".to_string(),
            )
        })?;
        if values.len() < min_intrinsics_len {
            return Err(CameraModelError::InvalidParams(format!(
                "Intrinsics array must have at least {} elements, got {}",
                min_intrinsics_len,
                values.len()
            )));
        }
        let params = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                as_number(v).ok_or_else(|| {
                    CameraModelError::InvalidParams(format!(
                        "Invalid intrinsics entry at index {i}: not a number"
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let res = cam_node["resolution"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams(
                "YAML missing 'resolution' array under 'cam0'".to_string(),
            )
        })?;
        if res.len() < 2 {
            return Err(CameraModelError::InvalidParams(
                "Resolution array must have at least 2 elements (width, height)".to_string(),
            ));
        }
        let dim = |v: &Yaml, name: &str| {
            v.as_i64()
                .filter(|d| *d >= 0 && *d <= u32::MAX as i64)
                .map(|d| d as u32)
                .ok_or_else(|| {
                    CameraModelError::InvalidParams(format!("Invalid {name}: not an integer"))
                })
        };
        let resolution = Resolution {
            width: dim(&res[0], "width")?,
            height: dim(&res[1], "height")?,
        };

        let intrinsics = Intrinsics {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
        };

        Ok((intrinsics, resolution, params[4..].to_vec()))
    }

    /// Saves camera model parameters to a YAML file in the `cam0` layout.
    pub fn save_yaml_camera(
        path: &str,
        model_name: &str,
        intrinsics: &Intrinsics,
        resolution: &Resolution,
        extra_params: &[f64],
    ) -> Result<(), CameraModelError> {
        let mut values = vec![intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy];
        values.extend_from_slice(extra_params);

        let mut cam = serde_yaml::Mapping::new();
        cam.insert("camera_model".into(), model_name.into());
        cam.insert(
            "intrinsics".into(),
            serde_yaml::to_value(values).map_err(|e| CameraModelError::YamlError(e.to_string()))?,
        );
        cam.insert(
            "resolution".into(),
            serde_yaml::to_value([resolution.width, resolution.height])
                .map_err(|e| CameraModelError::YamlError(e.to_string()))?,
        );
        let mut root = serde_yaml::Mapping::new();
        root.insert("cam0".into(), serde_yaml::Value::Mapping(cam));

        let yaml_string = serde_yaml::to_string(&root)
            .map_err(|e| CameraModelError::YamlError(e.to_string()))?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, yaml_string)?;
        Ok(())
    }
}
