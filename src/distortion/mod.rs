//! Brown–Conrady lens distortion applied to and removed from images.
//!
//! [`DistortionModel`] precomputes two dense maps at construction:
//!
//! * the forward map, evaluated analytically from the polynomial, which tells
//!   every output pixel of a distorted image where to sample the ideal render;
//! * the inverse map, obtained from the forward map by damped fixed-point
//!   iteration ([`invert_map`]).
//!
//! Both maps are immutable. Changing intrinsics or coefficients means building
//! a new model.

pub mod map;

pub use map::{compute_forward_map, invert_map, DistortionMap, InverseMapConfig};

use image::{ImageBuffer, Pixel};
use log::{info, warn};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::camera::{validation, CameraModelError, Intrinsics, Resolution, SafeZone};
use crate::util::{remap_with, Sample};

const UNDISTORT_MAX_ITERATIONS: usize = 20;
const UNDISTORT_EPSILON: f64 = 1e-12;
const UNDISTORT_TOLERANCE: f64 = 1e-9;

/// The five Brown–Conrady coefficients, in OpenCV order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistortionCoefficients {
    /// First radial coefficient.
    pub k1: f64,
    /// Second radial coefficient.
    pub k2: f64,
    /// First tangential coefficient.
    pub p1: f64,
    /// Second tangential coefficient.
    pub p2: f64,
    /// Third radial coefficient.
    pub k3: f64,
}

impl DistortionCoefficients {
    pub fn new(k1: f64, k2: f64, p1: f64, p2: f64, k3: f64) -> Self {
        Self { k1, k2, p1, p2, k3 }
    }

    /// Builds coefficients from `[k1, k2, p1, p2, k3]`.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::ShapeMismatch` if the slice does not hold exactly 5 values
    /// * `CameraModelError::InvalidParams` if a value is not finite
    pub fn from_slice(values: &[f64]) -> Result<Self, CameraModelError> {
        if values.len() != 5 {
            return Err(CameraModelError::ShapeMismatch {
                expected: 5,
                actual: values.len(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(CameraModelError::InvalidParams(format!(
                "Distortion coefficients must be finite, got {bad}"
            )));
        }
        Ok(Self::new(values[0], values[1], values[2], values[3], values[4]))
    }

    /// `[k1, k2, p1, p2, k3]`
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|c| *c == 0.0)
    }

    /// Applies the polynomial to a normalized image coordinate.
    pub fn distort_normalized(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }

    fn jacobian(&self, x: f64, y: f64) -> Matrix2<f64> {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        // d(radial)/d(r2)
        let t = self.k1 + 2.0 * self.k2 * r2 + 3.0 * self.k3 * r2 * r2;

        let dxd_dx = radial + 2.0 * x * x * t + 2.0 * self.p1 * y + 6.0 * self.p2 * x;
        let dxd_dy = 2.0 * x * y * t + 2.0 * self.p1 * x + 2.0 * self.p2 * y;
        let dyd_dx = 2.0 * x * y * t + 2.0 * self.p1 * x + 2.0 * self.p2 * y;
        let dyd_dy = radial + 2.0 * y * y * t + 6.0 * self.p1 * y + 2.0 * self.p2 * x;

        Matrix2::new(dxd_dx, dxd_dy, dyd_dx, dyd_dy)
    }

    /// Solves `distort_normalized(x, y) == (xd, yd)` with Newton's method.
    ///
    /// Only solutions inside the region where the polynomial is one-to-one are
    /// accepted: positive radial factor and positive Jacobian determinant.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::NumericalError` if the Jacobian becomes singular, the
    ///   iteration does not converge, or the only solution lies past the fold
    pub fn undistort_normalized(&self, xd: f64, yd: f64) -> Result<(f64, f64), CameraModelError> {
        let target = Vector2::new(xd, yd);
        let mut p = target;
        let mut converged = false;

        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            let (fx, fy) = self.distort_normalized(p.x, p.y);
            let residual = Vector2::new(fx, fy) - target;
            if residual.norm() < UNDISTORT_EPSILON {
                converged = true;
                break;
            }
            let j_inv = self.jacobian(p.x, p.y).try_inverse().ok_or_else(|| {
                CameraModelError::NumericalError(format!(
                    "Singular distortion Jacobian at ({:.6}, {:.6})",
                    p.x, p.y
                ))
            })?;
            p -= j_inv * residual;
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(CameraModelError::NumericalError(format!(
                    "Undistortion diverged for ({xd:.6}, {yd:.6})"
                )));
            }
        }

        if !converged {
            let (fx, fy) = self.distort_normalized(p.x, p.y);
            if (Vector2::new(fx, fy) - target).norm() > UNDISTORT_TOLERANCE {
                return Err(CameraModelError::NumericalError(format!(
                    "Undistortion did not converge for ({xd:.6}, {yd:.6})"
                )));
            }
        }

        let r2 = p.norm_squared();
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        if radial <= 0.0 || self.jacobian(p.x, p.y).determinant() <= 0.0 {
            return Err(CameraModelError::NumericalError(format!(
                "({xd:.6}, {yd:.6}) lies outside the invertible range of the lens"
            )));
        }

        Ok((p.x, p.y))
    }
}

/// Lens distortion for one camera: intrinsics, coefficients and the
/// precomputed forward and inverse maps.
///
/// When a [`SafeZone`] is set, [`distort_image`](Self::distort_image) expects
/// the padded render and returns an image of the nominal resolution.
#[derive(Debug, Clone)]
pub struct DistortionModel {
    intrinsics: Intrinsics,
    coefficients: DistortionCoefficients,
    resolution: Resolution,
    safe_zone: SafeZone,
    forward: DistortionMap,
    inverse: DistortionMap,
}

impl DistortionModel {
    /// Builds the model from `[k1, k2, p1, p2, k3]`.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::ShapeMismatch` if `coefficients` does not hold 5 values
    /// * Errors from intrinsics and resolution validation
    pub fn new(
        intrinsics: Intrinsics,
        coefficients: &[f64],
        resolution: Resolution,
        safe_zone: SafeZone,
        inverse_config: &InverseMapConfig,
    ) -> Result<Self, CameraModelError> {
        let coefficients = DistortionCoefficients::from_slice(coefficients)?;
        Self::from_coefficients(intrinsics, coefficients, resolution, safe_zone, inverse_config)
    }

    pub fn from_coefficients(
        intrinsics: Intrinsics,
        coefficients: DistortionCoefficients,
        resolution: Resolution,
        safe_zone: SafeZone,
        inverse_config: &InverseMapConfig,
    ) -> Result<Self, CameraModelError> {
        validation::validate_intrinsics(&intrinsics)?;
        validation::validate_resolution(&resolution)?;

        let forward = compute_forward_map(&intrinsics, &coefficients, &resolution);
        let inverse = invert_map(&forward, inverse_config);
        info!(
            "built distortion maps {}x{} for {:?} (safe zone {}x{})",
            resolution.width, resolution.height, coefficients, safe_zone.x, safe_zone.y
        );

        Ok(Self {
            intrinsics,
            coefficients,
            resolution,
            safe_zone,
            forward,
            inverse,
        })
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn coefficients(&self) -> &DistortionCoefficients {
        &self.coefficients
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn safe_zone(&self) -> SafeZone {
        self.safe_zone
    }

    /// Forward map in nominal pixel coordinates.
    pub fn forward_map(&self) -> &DistortionMap {
        &self.forward
    }

    /// Iterative inverse of [`forward_map`](Self::forward_map).
    pub fn inverse_map(&self) -> &DistortionMap {
        &self.inverse
    }

    /// Size of the render that [`distort_image`](Self::distort_image) consumes.
    pub fn source_resolution(&self) -> Resolution {
        self.safe_zone.expand(&self.resolution)
    }

    fn check_size(expected: Resolution, actual: (u32, u32)) -> Result<(), CameraModelError> {
        if (expected.width, expected.height) != actual {
            return Err(CameraModelError::SizeMismatch {
                expected_width: expected.width,
                expected_height: expected.height,
                actual_width: actual.0,
                actual_height: actual.1,
            });
        }
        Ok(())
    }

    /// Resamples an ideal render at the forward-map coordinates.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::SizeMismatch` if the image is not
    ///   [`source_resolution`](Self::source_resolution)
    pub fn distort_image<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
    ) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, CameraModelError>
    where
        P: Pixel,
        P::Subpixel: Sample,
    {
        Self::check_size(self.source_resolution(), image.dimensions())?;
        let dx = self.safe_zone.x as f32;
        let dy = self.safe_zone.y as f32;
        Ok(remap_with(
            image,
            self.resolution.width,
            self.resolution.height,
            |u, v| {
                let (x, y) = self.forward.get(u, v);
                Some((x + dx, y + dy))
            },
        ))
    }

    /// Removes distortion by solving the polynomial for every output pixel.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::SizeMismatch` if the image is not the nominal resolution
    /// * `CameraModelError::NumericalError` if the polynomial cannot be inverted at
    ///   some output pixel (coefficients outside the supported range)
    pub fn undistort_image<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
    ) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, CameraModelError>
    where
        P: Pixel,
        P::Subpixel: Sample,
    {
        Self::check_size(self.resolution, image.dimensions())?;
        let failures = std::cell::Cell::new(0usize);
        let output = remap_with(
            image,
            self.resolution.width,
            self.resolution.height,
            |u, v| match self.image_position_of(&Vector2::new(u as f64, v as f64)) {
                Ok(p) => Some((p.x as f32, p.y as f32)),
                Err(_) => {
                    failures.set(failures.get() + 1);
                    None
                }
            },
        );
        if failures.get() > 0 {
            warn!("undistortion solve failed for {} pixels", failures.get());
            return Err(CameraModelError::NumericalError(format!(
                "lens polynomial is not invertible at {} of {} pixels",
                failures.get(),
                self.resolution.width as usize * self.resolution.height as usize
            )));
        }
        Ok(output)
    }

    /// Removes distortion by remapping through the iterative inverse map.
    ///
    /// Approximate: accuracy depends on the inverse map's iteration count and
    /// degrades where the forward map leaves the frame.
    ///
    /// # Errors
    ///
    /// * `CameraModelError::SizeMismatch` if the image is not the nominal resolution
    pub fn undistort_image_with_inverse_map<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
    ) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, CameraModelError>
    where
        P: Pixel,
        P::Subpixel: Sample,
    {
        Self::check_size(self.resolution, image.dimensions())?;
        Ok(remap_with(
            image,
            self.resolution.width,
            self.resolution.height,
            |u, v| Some(self.inverse.get(u, v)),
        ))
    }

    /// Pixel of the distorted output image that shows the content found at
    /// `ideal` in the undistorted render (both in nominal coordinates).
    ///
    /// # Errors
    ///
    /// * `CameraModelError::NumericalError` if the polynomial cannot be inverted there
    pub fn image_position_of(&self, ideal: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let n = self.intrinsics.normalize(ideal);
        let (x, y) = self.coefficients.undistort_normalized(n.x, n.y)?;
        Ok(self.intrinsics.denormalize(&Vector2::new(x, y)))
    }

    /// Where the forward polynomial sends a nominal pixel.
    pub fn distort_point(&self, ideal: &Vector2<f64>) -> Vector2<f64> {
        let n = self.intrinsics.normalize(ideal);
        let (x, y) = self.coefficients.distort_normalized(n.x, n.y);
        self.intrinsics.denormalize(&Vector2::new(x, y))
    }
}
