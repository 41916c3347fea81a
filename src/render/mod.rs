//! Rendering contracts between the simulator and image backends.
//!
//! A [`Renderer`] owns cameras and scene objects and produces a
//! [`RenderedImage`] for a [`RenderRequest`]. Scene objects implement
//! [`SceneTarget`]. [`RaycastRenderer`] is the reference backend.

use std::sync::{Arc, Mutex, MutexGuard};

use image::{Rgb, Rgb32FImage, RgbImage};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraModelError, SceneCamera, SharedCamera};
use crate::esf::GrayF32Image;

pub mod mask;
pub mod raycast;
pub mod target;

pub use mask::RegionMask;
pub use raycast::RaycastRenderer;
pub use target::SlantedEdgeTarget;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Camera index {index} out of bounds ({count} cameras)")]
    CameraIndexOutOfBounds { index: usize, count: usize },
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("Scene object unavailable: {0}")]
    ObjectUnavailable(String),
    #[error("Expected a {}x{} buffer, got {}x{}", .expected.0, .expected.1, .actual.0, .actual.1)]
    ShapeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Images have different bit depths")]
    BitDepthMismatch,
    #[error("Camera error: {0}")]
    Camera(#[from] CameraModelError),
    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Pixel storage of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitDepth {
    Eight,
    Float,
}

/// RGB render, either 8-bit or float scaled to 0–255.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedImage {
    Rgb8(RgbImage),
    Rgb32F(Rgb32FImage),
}

impl RenderedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            RenderedImage::Rgb8(img) => img.dimensions(),
            RenderedImage::Rgb32F(img) => img.dimensions(),
        }
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            RenderedImage::Rgb8(_) => BitDepth::Eight,
            RenderedImage::Rgb32F(_) => BitDepth::Float,
        }
    }

    /// Converts a float render (values 0–255) to the requested depth.
    pub fn from_float(image: Rgb32FImage, bit_depth: BitDepth) -> Self {
        match bit_depth {
            BitDepth::Float => RenderedImage::Rgb32F(image),
            BitDepth::Eight => {
                let (width, height) = image.dimensions();
                RenderedImage::Rgb8(RgbImage::from_fn(width, height, |x, y| {
                    let p = image.get_pixel(x, y);
                    Rgb(p.0.map(|c| c.round().clamp(0.0, 255.0) as u8))
                }))
            }
        }
    }

    /// Mean over the color channels.
    pub fn to_gray_f32(&self) -> GrayF32Image {
        let (width, height) = self.dimensions();
        GrayF32Image::from_fn(width, height, |x, y| {
            let sum: f32 = match self {
                RenderedImage::Rgb8(img) => img.get_pixel(x, y).0.iter().map(|c| *c as f32).sum(),
                RenderedImage::Rgb32F(img) => img.get_pixel(x, y).0.iter().sum(),
            };
            image::Luma([sum / 3.0])
        })
    }

    /// Copy of `self` with the pixels selected by `mask` taken from `overlay`.
    ///
    /// # Errors
    ///
    /// * `RenderError::ShapeMismatch` if the images or the mask differ in size
    /// * `RenderError::BitDepthMismatch` if the images differ in bit depth
    pub fn composite(
        &self,
        overlay: &RenderedImage,
        mask: &RegionMask,
    ) -> Result<RenderedImage, RenderError> {
        let expected = self.dimensions();
        for actual in [overlay.dimensions(), mask.dimensions()] {
            if actual != expected {
                return Err(RenderError::ShapeMismatch { expected, actual });
            }
        }

        match (self, overlay) {
            (RenderedImage::Rgb8(base), RenderedImage::Rgb8(top)) => {
                let mut out = base.clone();
                for (x, y) in mask.pixels() {
                    out.put_pixel(x, y, *top.get_pixel(x, y));
                }
                Ok(RenderedImage::Rgb8(out))
            }
            (RenderedImage::Rgb32F(base), RenderedImage::Rgb32F(top)) => {
                let mut out = base.clone();
                for (x, y) in mask.pixels() {
                    out.put_pixel(x, y, *top.get_pixel(x, y));
                }
                Ok(RenderedImage::Rgb32F(out))
            }
            _ => Err(RenderError::BitDepthMismatch),
        }
    }
}

/// Parameters of one render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub camera_index: usize,
    /// Rays traced per pixel.
    pub sample_count: u32,
    /// Only pixels inside the mask need to be rendered accurately.
    pub mask: Option<&'a RegionMask>,
    pub bit_depth: BitDepth,
    /// Render the safe-zone frame and apply the camera's lens distortion.
    pub apply_distortion: bool,
}

impl<'a> RenderRequest<'a> {
    pub fn new(camera_index: usize, sample_count: u32) -> Self {
        Self {
            camera_index,
            sample_count,
            mask: None,
            bit_depth: BitDepth::Float,
            apply_distortion: true,
        }
    }

    pub fn with_mask(mut self, mask: &'a RegionMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn with_distortion(mut self, apply_distortion: bool) -> Self {
        self.apply_distortion = apply_distortion;
        self
    }
}

/// Closest intersection of a ray with a scene object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance along the (unit) ray direction.
    pub distance: f64,
    /// Linear RGB in `[0, 1]`.
    pub color: [f32; 3],
}

/// A 3D object the renderer can draw.
pub trait SceneTarget: Send {
    /// Characteristic points of the object in world coordinates.
    fn object_points(&self) -> Vec<Vector3<f64>>;

    /// World-space endpoints of the object's edge.
    fn edge_points(&self) -> [Vector3<f64>; 2];

    /// Orientation as roll, pitch and yaw in degrees.
    fn set_euler_angles(&mut self, angles_deg: Vector3<f64>);

    fn set_position(&mut self, position: Vector3<f64>);

    /// Intersects a world-space ray; `direction` must be unit length.
    fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<RayHit>;
}

pub type SharedTarget = Arc<Mutex<dyn SceneTarget>>;

/// Rendering backend.
pub trait Renderer {
    fn add_object(&mut self, object: SharedTarget);

    fn camera_count(&self) -> usize;

    /// Shared handle to camera `index`.
    fn camera(&self, index: usize) -> Result<SharedCamera, RenderError>;

    fn set_camera_position(
        &mut self,
        index: usize,
        position: Vector3<f64>,
    ) -> Result<(), RenderError> {
        let camera = self.camera(index)?;
        lock_camera(&camera)?.set_position(position);
        Ok(())
    }

    fn set_camera_look_at(
        &mut self,
        index: usize,
        target: Vector3<f64>,
        up: Vector3<f64>,
    ) -> Result<(), RenderError> {
        let camera = self.camera(index)?;
        lock_camera(&camera)?.set_look_at(target, up)?;
        Ok(())
    }

    /// Renders camera `request.camera_index`, holding its lock for the whole pass.
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<RenderedImage, RenderError> {
        let handle = self.camera(request.camera_index)?;
        let camera = lock_camera(&handle)?;
        self.render_with_camera(&camera, request)
    }

    /// Renders through a camera the caller has already locked.
    ///
    /// `request.camera_index` is not consulted. Passes that must see the same
    /// pose are rendered under one lock.
    fn render_with_camera(
        &mut self,
        camera: &SceneCamera,
        request: &RenderRequest<'_>,
    ) -> Result<RenderedImage, RenderError>;
}

/// Locks a camera, reporting a poisoned mutex as `CameraUnavailable`.
pub fn lock_camera(camera: &SharedCamera) -> Result<MutexGuard<'_, SceneCamera>, RenderError> {
    camera
        .lock()
        .map_err(|e| RenderError::CameraUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;
    use nalgebra::Vector2;

    #[test]
    fn test_from_float_rounds_and_clamps() {
        let mut img = Rgb32FImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([12.4, 12.6, 300.0]));
        img.put_pixel(1, 0, Rgb([-3.0, 0.0, 255.0]));
        let RenderedImage::Rgb8(out) = RenderedImage::from_float(img, BitDepth::Eight) else {
            panic!("expected an 8-bit image");
        };
        assert_eq!(out.get_pixel(0, 0), &Rgb([12, 13, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_to_gray_is_channel_mean() {
        let img = RenderedImage::Rgb8(RgbImage::from_pixel(2, 2, Rgb([30, 60, 90])));
        let gray = img.to_gray_f32();
        assert_relative_eq!(gray.get_pixel(1, 1)[0], 60.0);
    }

    #[test]
    fn test_composite_uses_mask() {
        let base = RenderedImage::Rgb32F(Rgb32FImage::from_pixel(8, 8, Rgb([1.0; 3])));
        let top = RenderedImage::Rgb32F(Rgb32FImage::from_pixel(8, 8, Rgb([9.0; 3])));
        let mask = RegionMask::from_line(8, 8, &Vector2::new(4.0, 0.0), &Vector2::new(4.0, 7.0), 1);
        let out = base.composite(&top, &mask).unwrap().to_gray_f32();
        assert_relative_eq!(out.get_pixel(4, 3)[0], 9.0);
        assert_relative_eq!(out.get_pixel(0, 3)[0], 1.0);
    }

    #[test]
    fn test_composite_shape_mismatch() {
        let base = RenderedImage::Rgb8(RgbImage::new(8, 8));
        let top = RenderedImage::Rgb8(RgbImage::new(8, 6));
        let mask = RegionMask::new(8, 8);
        assert!(matches!(
            base.composite(&top, &mask),
            Err(RenderError::ShapeMismatch { .. })
        ));
        let float = RenderedImage::Rgb32F(Rgb32FImage::new(8, 8));
        assert!(matches!(
            base.composite(&float, &mask),
            Err(RenderError::BitDepthMismatch)
        ));
    }
}
