//! Image-space edge segment and its local frame.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::EsfError;

const DEGENERATE_LENGTH: f64 = 1e-9;

/// Segment from `p0` to `p1` in pixel coordinates.
///
/// The normal is the direction rotated by +90 degrees in image coordinates,
/// so signed distances are positive to the right of `p0 → p1` when +Y points down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeSegment {
    pub p0: Vector2<f64>,
    pub p1: Vector2<f64>,
}

impl EdgeSegment {
    pub fn new(p0: Vector2<f64>, p1: Vector2<f64>) -> Self {
        Self { p0, p1 }
    }

    pub fn length(&self) -> f64 {
        (self.p1 - self.p0).norm()
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.length() > DEGENERATE_LENGTH)
    }

    pub fn midpoint(&self) -> Vector2<f64> {
        (self.p0 + self.p1) * 0.5
    }

    /// Unit vector from `p0` to `p1`, `None` for a degenerate segment.
    pub fn direction(&self) -> Option<Vector2<f64>> {
        (self.p1 - self.p0).try_normalize(DEGENERATE_LENGTH)
    }

    pub fn normal(&self) -> Option<Vector2<f64>> {
        self.direction().map(|d| Vector2::new(-d.y, d.x))
    }

    /// Angle of the segment from the image +Y axis, in degrees.
    pub fn angle(&self) -> Option<f64> {
        self.direction().map(|d| d.x.atan2(d.y).to_degrees())
    }

    /// Signed perpendicular distance of `pixel` from the edge line and its
    /// position along the segment as a fraction (`0` at `p0`, `1` at `p1`).
    ///
    /// # Errors
    ///
    /// * `EsfError::InsufficientSamples` if `p0 == p1`
    pub fn distance_and_projection(&self, pixel: &Vector2<f64>) -> Result<(f64, f64), EsfError> {
        let delta = self.p1 - self.p0;
        let length_sq = delta.norm_squared();
        if !(length_sq.sqrt() > DEGENERATE_LENGTH) {
            return Err(EsfError::InsufficientSamples(
                "edge segment has zero length".to_string(),
            ));
        }
        let length = length_sq.sqrt();
        let rel = pixel - self.p0;
        // Normal (-dy, dx) / |d|.
        let distance = (rel.y * delta.x - rel.x * delta.y) / length;
        let fraction = rel.dot(&delta) / length_sq;
        Ok((distance, fraction))
    }
}
