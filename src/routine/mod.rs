//! Slanted-edge measurement routine.
//!
//! The routine projects the edge of a [`SceneTarget`] into the camera, renders
//! the whole frame cheaply, re-renders a thin band around the edge with heavy
//! supersampling, composites the two and estimates the ESF across the edge.
//!
//! ```text
//! Configured → EdgeProjected → MaskBuilt → Rendered → Composited → EsfComputed
//! ```
//!
//! Any failure returns the routine to `Configured`; no partial result is kept.

use log::{debug, info};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::camera::CameraModelError;
use crate::config::SimConfig;
use crate::esf::{EdgeSegment, EsfConfig, EsfCurve, EsfError, EsfEstimator, GrayF32Image};
use crate::render::{
    lock_camera, BitDepth, RegionMask, RenderError, RenderRequest, RenderedImage, Renderer,
    SharedTarget,
};

#[derive(thiserror::Error, Debug)]
pub enum RoutineError {
    #[error("Render failed: {0}")]
    RenderFailure(String),
    #[error(transparent)]
    Camera(#[from] CameraModelError),
    #[error(transparent)]
    Esf(#[from] EsfError),
}

impl From<RenderError> for RoutineError {
    fn from(err: RenderError) -> Self {
        RoutineError::RenderFailure(err.to_string())
    }
}

/// Render settings of the routine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutineConfig {
    pub camera_index: usize,
    /// Rays per pixel for the full-frame pass.
    pub low_sample_count: u32,
    /// Rays per pixel inside the edge band.
    pub high_sample_count: u32,
    /// Width of the edge band, in pixels.
    pub mask_thickness: u32,
    pub bit_depth: BitDepth,
    pub apply_distortion: bool,
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            low_sample_count: 1,
            high_sample_count: 100 * 100,
            mask_thickness: 6,
            bit_depth: BitDepth::Float,
            apply_distortion: true,
        }
    }
}

/// Post-processing of one [`SlantedEdgeRoutine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Rescale the ESF to `[0, 1]`.
    pub normalize: bool,
    /// Truncate the analysis image to 8-bit levels before estimation.
    pub convert_to_8_bit: bool,
    /// Fit the error-function edge model.
    pub apply_gaussian: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            convert_to_8_bit: false,
            apply_gaussian: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineState {
    Configured,
    EdgeProjected,
    MaskBuilt,
    Rendered,
    Composited,
    EsfComputed,
}

/// Composited render and the edge it contains.
#[derive(Debug, Clone)]
pub struct EdgeImage {
    pub image: RenderedImage,
    pub p0: Vector2<f64>,
    pub p1: Vector2<f64>,
}

#[derive(Debug, Clone)]
pub struct SlantedEdgeOutput {
    pub esf: EsfCurve,
    /// Channel-mean image the ESF was estimated from.
    pub image: GrayF32Image,
    pub p0: Vector2<f64>,
    pub p1: Vector2<f64>,
}

pub struct SlantedEdgeRoutine<R: Renderer> {
    renderer: R,
    target: SharedTarget,
    config: RoutineConfig,
    estimator: EsfEstimator,
    state: RoutineState,
}

impl<R: Renderer> SlantedEdgeRoutine<R> {
    /// Adds `target` to the renderer's scene.
    pub fn new(mut renderer: R, target: SharedTarget, config: &SimConfig) -> Self {
        renderer.add_object(target.clone());
        Self {
            renderer,
            target,
            config: config.routine,
            estimator: EsfEstimator::new(config.esf),
            state: RoutineState::Configured,
        }
    }

    pub fn config(&self) -> &RoutineConfig {
        &self.config
    }

    pub fn esf_config(&self) -> &EsfConfig {
        self.estimator.config()
    }

    pub fn state(&self) -> RoutineState {
        self.state
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn target(&self) -> &SharedTarget {
        &self.target
    }

    /// Renders the composited edge image and returns it with the projected edge.
    pub fn generate_image(&mut self) -> Result<EdgeImage, RoutineError> {
        self.state = RoutineState::Configured;
        let result = self.generate_image_inner();
        if result.is_err() {
            self.state = RoutineState::Configured;
        }
        result
    }

    /// Generates the edge image and estimates its ESF.
    pub fn run(&mut self, options: &RunOptions) -> Result<SlantedEdgeOutput, RoutineError> {
        self.state = RoutineState::Configured;
        let result = self.run_inner(options);
        if result.is_err() {
            self.state = RoutineState::Configured;
        }
        result
    }

    fn generate_image_inner(&mut self) -> Result<EdgeImage, RoutineError> {
        let edge_points = self
            .target
            .lock()
            .map_err(|e| RoutineError::RenderFailure(format!("scene target unavailable: {e}")))?
            .edge_points();

        // One lock covers projection and both passes so they share a pose.
        let handle = self.renderer.camera(self.config.camera_index)?;
        let camera = lock_camera(&handle)?;
        let points = camera.locate_points_in_image(&edge_points, self.config.apply_distortion)?;
        let (p0, p1) = (points[0], points[1]);
        let resolution = camera.resolution();
        let (width, height) = (resolution.width, resolution.height);
        self.state = RoutineState::EdgeProjected;
        debug!("edge projected to ({:.2}, {:.2}) → ({:.2}, {:.2})", p0.x, p0.y, p1.x, p1.y);

        let mask = RegionMask::from_line(width, height, &p0, &p1, self.config.mask_thickness);
        if mask.is_empty() {
            return Err(RoutineError::RenderFailure(
                "edge does not cross the image".to_string(),
            ));
        }
        self.state = RoutineState::MaskBuilt;

        let base_request = RenderRequest::new(self.config.camera_index, self.config.low_sample_count)
            .with_bit_depth(self.config.bit_depth)
            .with_distortion(self.config.apply_distortion);
        let background = self.renderer.render_with_camera(&camera, &base_request)?;
        let detail = self.renderer.render_with_camera(
            &camera,
            &RenderRequest {
                sample_count: self.config.high_sample_count,
                mask: Some(&mask),
                ..base_request
            },
        )?;
        drop(camera);
        self.state = RoutineState::Rendered;

        for image in [&background, &detail] {
            if image.dimensions() != (width, height) {
                return Err(RoutineError::RenderFailure(format!(
                    "renderer returned {}x{} for a {width}x{height} camera",
                    image.dimensions().0,
                    image.dimensions().1
                )));
            }
        }
        let image = background.composite(&detail, &mask)?;
        self.state = RoutineState::Composited;
        info!(
            "composited {} high-sample pixels into a {width}x{height} frame",
            mask.count()
        );

        Ok(EdgeImage { image, p0, p1 })
    }

    fn run_inner(&mut self, options: &RunOptions) -> Result<SlantedEdgeOutput, RoutineError> {
        let EdgeImage { image, p0, p1 } = self.generate_image_inner()?;

        let mut gray = image.to_gray_f32();
        if options.convert_to_8_bit {
            for p in gray.pixels_mut() {
                p[0] = p[0].clamp(0.0, 255.0).trunc();
            }
        }

        let edge = EdgeSegment::new(p0, p1);
        let esf = self
            .estimator
            .estimate(&gray, &edge, options.apply_gaussian)?;
        let esf = if options.normalize {
            esf.normalized()
        } else {
            esf
        };
        self.state = RoutineState::EsfComputed;
        info!(
            "ESF with {} bins from {} samples (edge angle {:.2} deg)",
            esf.len(),
            esf.sample_count,
            edge.angle().unwrap_or(0.0)
        );

        Ok(SlantedEdgeOutput {
            esf,
            image: gray,
            p0,
            p1,
        })
    }
}
