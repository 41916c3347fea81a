//! Dense pixel maps and their construction.

use log::debug;
use serde::{Deserialize, Serialize};

use super::DistortionCoefficients;
use crate::camera::{Intrinsics, Resolution};

/// Settings for the fixed-point inversion of a forward map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverseMapConfig {
    /// Number of fixed-point iterations.
    pub iterations: usize,
    /// Fraction of the residual applied per iteration.
    pub damping: f64,
    /// Stop early once the largest per-pixel correction (pixels) drops below this.
    pub tolerance: Option<f64>,
}

impl Default for InverseMapConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            damping: 0.5,
            tolerance: None,
        }
    }
}

/// Source coordinates to sample for every destination pixel.
///
/// Stored row-major as two `height`×`width` arrays of `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionMap {
    width: u32,
    height: u32,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl DistortionMap {
    /// Map every pixel onto itself.
    pub fn identity(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |u, v| (u as f64, v as f64))
    }

    /// Build a map from a per-pixel function returning the source coordinate.
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> (f64, f64),
    {
        let len = width as usize * height as usize;
        let mut map_x = Vec::with_capacity(len);
        let mut map_y = Vec::with_capacity(len);
        for v in 0..height {
            for u in 0..width {
                let (x, y) = f(u, v);
                map_x.push(x as f32);
                map_y.push(y as f32);
            }
        }
        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    /// Row-major x-coordinates.
    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    /// Row-major y-coordinates.
    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source coordinate stored for destination pixel `(u, v)`.
    ///
    /// # Panics
    ///
    /// Panics if `(u, v)` is outside the map.
    pub fn get(&self, u: u32, v: u32) -> (f32, f32) {
        let idx = v as usize * self.width as usize + u as usize;
        (self.map_x[idx], self.map_y[idx])
    }

    /// Bilinearly interpolate the map at a continuous coordinate.
    ///
    /// Coordinates are clamped to the map so that the border entries extend
    /// outward.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> (f64, f64) {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

        let x0 = x.floor();
        let y0 = y.floor();
        let wx = x - x0;
        let wy = y - y0;
        let x0 = x0 as usize;
        let y0 = y0 as usize;
        let x1 = (x0 + 1).min(self.width as usize - 1);
        let y1 = (y0 + 1).min(self.height as usize - 1);
        let stride = self.width as usize;

        let lerp = |m: &[f32]| {
            let top = m[y0 * stride + x0] as f64 * (1.0 - wx) + m[y0 * stride + x1] as f64 * wx;
            let bottom = m[y1 * stride + x0] as f64 * (1.0 - wx) + m[y1 * stride + x1] as f64 * wx;
            top * (1.0 - wy) + bottom * wy
        };

        (lerp(&self.map_x), lerp(&self.map_y))
    }

    /// Copy of the map with a constant offset added to every coordinate.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            width: self.width,
            height: self.height,
            map_x: self.map_x.iter().map(|x| (*x as f64 + dx) as f32).collect(),
            map_y: self.map_y.iter().map(|y| (*y as f64 + dy) as f32).collect(),
        }
    }

    /// Largest coordinate difference against another map of the same size.
    pub fn max_abs_difference(&self, other: &DistortionMap) -> Option<f64> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        let dx = self.map_x.iter().zip(&other.map_x);
        let dy = self.map_y.iter().zip(&other.map_y);
        Some(
            dx.chain(dy)
                .map(|(a, b)| (*a as f64 - *b as f64).abs())
                .fold(0.0, f64::max),
        )
    }
}

/// Analytic forward map: for every ideal pixel, where it lands under the
/// Brown–Conrady polynomial, in the same pixel frame.
pub fn compute_forward_map(
    intrinsics: &Intrinsics,
    coefficients: &DistortionCoefficients,
    resolution: &Resolution,
) -> DistortionMap {
    DistortionMap::from_fn(resolution.width, resolution.height, |u, v| {
        let x = (u as f64 - intrinsics.cx) / intrinsics.fx;
        let y = (v as f64 - intrinsics.cy) / intrinsics.fy;
        let (xd, yd) = coefficients.distort_normalized(x, y);
        (xd * intrinsics.fx + intrinsics.cx, yd * intrinsics.fy + intrinsics.cy)
    })
}

/// Invert a forward map by damped fixed-point iteration.
///
/// Starting from the identity, each iteration resamples `forward` at the
/// current estimate and adds `damping` times the residual to the identity
/// grid. There is no fold detection: coefficients whose forward map is not
/// contractive give undefined results.
pub fn invert_map(forward: &DistortionMap, config: &InverseMapConfig) -> DistortionMap {
    let width = forward.width();
    let height = forward.height();
    let len = width as usize * height as usize;

    let mut px: Vec<f64> = Vec::with_capacity(len);
    let mut py: Vec<f64> = Vec::with_capacity(len);
    for v in 0..height {
        for u in 0..width {
            px.push(u as f64);
            py.push(v as f64);
        }
    }

    for iteration in 0..config.iterations {
        let mut max_correction: f64 = 0.0;
        for v in 0..height {
            for u in 0..width {
                let idx = v as usize * width as usize + u as usize;
                let (fx, fy) = forward.sample_bilinear(px[idx], py[idx]);
                let cx = u as f64 - fx;
                let cy = v as f64 - fy;
                px[idx] += cx * config.damping;
                py[idx] += cy * config.damping;
                max_correction = max_correction.max(cx.abs()).max(cy.abs());
            }
        }

        debug!("inverse map iteration {iteration}: max residual {max_correction:.3e} px");
        if let Some(tolerance) = config.tolerance {
            if max_correction < tolerance {
                break;
            }
        }
    }

    DistortionMap::from_fn(width, height, |u, v| {
        let idx = v as usize * width as usize + u as usize;
        (px[idx], py[idx])
    })
}
