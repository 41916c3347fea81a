//! Super-resolved ESF from pixels around an edge segment.

use std::collections::BTreeMap;

use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::{EdgeSegment, EsfError, GaussianEsfFit, GrayF32Image};

/// Sampling window and binning of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsfConfig {
    /// Half-width of the window across the edge, in pixels.
    pub boundary_region: f64,
    /// Half-length of the window along the edge, around the segment midpoint, in pixels.
    pub search_region: f64,
    /// Width of one distance bin, in pixels.
    pub bin_width: f64,
    /// Samples required on each side of the edge.
    pub min_samples_per_side: usize,
}

impl Default for EsfConfig {
    fn default() -> Self {
        Self {
            boundary_region: 50.0,
            search_region: 30.0,
            bin_width: 0.25,
            min_samples_per_side: 4,
        }
    }
}

/// Edge response ordered by strictly increasing signed distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsfCurve {
    /// Bin centers.
    pub distances: Vec<f64>,
    /// Response per bin: the fitted model when `fit` is set, else `binned_values`.
    pub values: Vec<f64>,
    /// Mean pixel intensity per bin.
    pub binned_values: Vec<f64>,
    pub fit: Option<GaussianEsfFit>,
    /// Pixels that went into the curve.
    pub sample_count: usize,
}

/// Derivative of an ESF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSpread {
    pub distances: Vec<f64>,
    pub values: Vec<f64>,
}

impl EsfCurve {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.distances.iter().copied().zip(self.values.iter().copied())
    }

    /// Copy rescaled so the response spans `[0, 1]`.
    ///
    /// A flat curve is returned unchanged.
    pub fn normalized(&self) -> EsfCurve {
        let (min, max) = min_max(&self.values);
        let range = max - min;
        if !(range > 0.0) {
            return self.clone();
        }
        let scale = |v: &f64| (v - min) / range;
        EsfCurve {
            distances: self.distances.clone(),
            values: self.values.iter().map(scale).collect(),
            binned_values: self.binned_values.iter().map(scale).collect(),
            fit: self.fit.map(|f| GaussianEsfFit {
                low: (f.low - min) / range,
                high: (f.high - min) / range,
                rms_residual: f.rms_residual / range,
                ..f
            }),
            sample_count: self.sample_count,
        }
    }

    /// Line spread function by central differences of `values`.
    pub fn line_spread(&self) -> LineSpread {
        let n = self.len();
        let d = &self.distances;
        let v = &self.values;
        let values = (0..n)
            .map(|i| {
                if n < 2 {
                    return 0.0;
                }
                let (a, b) = match i {
                    0 => (0, 1),
                    _ if i == n - 1 => (n - 2, n - 1),
                    _ => (i - 1, i + 1),
                };
                (v[b] - v[a]) / (d[b] - d[a])
            })
            .collect();
        LineSpread {
            distances: d.clone(),
            values,
        }
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

/// Collects, bins and optionally fits the ESF of an image around an edge.
#[derive(Debug, Clone, Default)]
pub struct EsfEstimator {
    config: EsfConfig,
}

impl EsfEstimator {
    pub fn new(config: EsfConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EsfConfig {
        &self.config
    }

    /// Raw `(signed distance, intensity)` samples inside the window, sorted by distance.
    pub fn collect_samples(
        &self,
        image: &GrayF32Image,
        edge: &EdgeSegment,
    ) -> Result<Vec<(f64, f64)>, EsfError> {
        let (Some(direction), Some(normal)) = (edge.direction(), edge.normal()) else {
            return Err(EsfError::InsufficientSamples(
                "edge segment has zero length".to_string(),
            ));
        };
        let boundary = self.config.boundary_region;
        let search = self.config.search_region;
        if !(boundary > 0.0) || !(search > 0.0) {
            return Err(EsfError::InvalidParams(format!(
                "boundary_region and search_region must be positive, got {boundary} and {search}"
            )));
        }

        let length = edge.length();
        let center = edge.midpoint();
        let (width, height) = image.dimensions();

        // Bounding box of the oriented window, clipped to the image.
        let corners = [
            center + direction * search + normal * boundary,
            center + direction * search - normal * boundary,
            center - direction * search + normal * boundary,
            center - direction * search - normal * boundary,
        ];
        let min_x = corners.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|c| c.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|c| c.y).fold(f64::NEG_INFINITY, f64::max);
        let x_start = min_x.floor().max(0.0) as u32;
        let y_start = min_y.floor().max(0.0) as u32;
        let x_end = (max_x.ceil().max(-1.0) as i64).min(width as i64 - 1);
        let y_end = (max_y.ceil().max(-1.0) as i64).min(height as i64 - 1);

        let mut samples = Vec::new();
        for y in y_start as i64..=y_end {
            for x in x_start as i64..=x_end {
                let pixel = Vector2::new(x as f64, y as f64);
                let (distance, fraction) = edge.distance_and_projection(&pixel)?;
                let along = (fraction - 0.5) * length;
                if distance.abs() <= boundary && along.abs() <= search {
                    let value = image.get_pixel(x as u32, y as u32)[0] as f64;
                    samples.push((distance, value));
                }
            }
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(samples)
    }

    /// Estimates the ESF of `image` across `edge`.
    ///
    /// # Errors
    ///
    /// * `EsfError::InsufficientSamples` for a zero-length edge, an empty window,
    ///   too few samples on either side of the edge, or (with `apply_gaussian`)
    ///   a response too flat to fit
    pub fn estimate(
        &self,
        image: &GrayF32Image,
        edge: &EdgeSegment,
        apply_gaussian: bool,
    ) -> Result<EsfCurve, EsfError> {
        let samples = self.collect_samples(image, edge)?;
        if samples.is_empty() {
            return Err(EsfError::InsufficientSamples(
                "no pixels inside the sampling window".to_string(),
            ));
        }

        // Samples on the line itself are binned but count for neither side.
        let negative = samples.iter().filter(|(d, _)| *d < 0.0).count();
        let positive = samples.iter().filter(|(d, _)| *d > 0.0).count();
        let required = self.config.min_samples_per_side.max(1);
        if negative < required || positive < required {
            return Err(EsfError::InsufficientSamples(format!(
                "edge window is one-sided: {negative} samples before the edge, {positive} after"
            )));
        }

        let bin_width = self.config.bin_width;
        if !(bin_width > 0.0) {
            return Err(EsfError::InvalidParams(format!(
                "bin_width must be positive, got {bin_width}"
            )));
        }
        let mut bins: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for (distance, value) in &samples {
            let entry = bins
                .entry((distance / bin_width).floor() as i64)
                .or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        let distances: Vec<f64> = bins
            .keys()
            .map(|idx| (*idx as f64 + 0.5) * bin_width)
            .collect();
        let binned_values: Vec<f64> = bins
            .values()
            .map(|(sum, count)| sum / *count as f64)
            .collect();

        let fit = if apply_gaussian {
            Some(GaussianEsfFit::fit(&distances, &binned_values)?)
        } else {
            None
        };
        let values = match &fit {
            Some(f) => distances.iter().map(|d| f.eval(*d)).collect(),
            None => binned_values.clone(),
        };

        debug!(
            "ESF from {} samples in {} bins ({negative} before, {positive} after the edge)",
            samples.len(),
            distances.len()
        );
        Ok(EsfCurve {
            distances,
            values,
            binned_values,
            fit,
            sample_count: samples.len(),
        })
    }
}
