//! Edge-spread-function estimation from a slanted edge.
//!
//! Pixels near an edge segment are projected onto the edge normal; their
//! signed distances are finer than the pixel grid because the edge is tilted
//! relative to the pixel lattice. Binning those samples by distance gives a
//! super-resolved 1D ESF, optionally smoothed by fitting an error function.

use image::{ImageBuffer, Luma};

pub mod edge;
pub mod estimator;
pub mod gaussian;

pub use edge::EdgeSegment;
pub use estimator::{EsfConfig, EsfCurve, EsfEstimator, LineSpread};
pub use gaussian::GaussianEsfFit;

/// Single-channel floating point image analysed by the estimator.
pub type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(thiserror::Error, Debug)]
pub enum EsfError {
    /// The edge or the sampling window does not provide enough data.
    #[error("Insufficient samples: {0}")]
    InsufficientSamples(String),
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}
