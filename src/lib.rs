//! Camera Simulation Library
//!
//! Synthetic camera experiments for lens calibration and sharpness analysis:
//! - Pinhole and Radial-Tangential (Brown–Conrady) camera models
//! - Dense forward and iterative inverse distortion maps, applied to images
//! - A ray-cast reference renderer with supersampling and ROI masks
//! - Slanted-edge ESF estimation with an optional error-function fit
//!
//! Settings are passed explicitly through [`config::SimConfig`].

pub mod camera;
pub mod config;
pub mod distortion;
pub mod esf;
pub mod render;
pub mod routine;
pub mod util;

// Re-export commonly used types
pub use camera::{
    CameraModel, CameraModelError, CameraPose, Intrinsics, PinholeModel, RadTanModel, Resolution,
    SafeZone, SceneCamera, SharedCamera,
};
pub use config::SimConfig;
pub use distortion::{DistortionCoefficients, DistortionMap, DistortionModel, InverseMapConfig};
pub use esf::{EdgeSegment, EsfCurve, EsfError, EsfEstimator};
pub use render::{RaycastRenderer, RenderError, RenderRequest, RenderedImage, Renderer};
pub use routine::{RoutineError, RunOptions, SlantedEdgeRoutine};
