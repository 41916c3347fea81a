//! CPU ray-cast reference renderer.
//!
//! Each pixel is supersampled on a regular `k × k` grid (`k = ⌈√n⌉` for `n`
//! requested samples); rays that miss every object take the background color.
//! Colors are scaled to 0–255 before distortion and bit-depth conversion.

use image::{Rgb, Rgb32FImage};
use log::{debug, info};
use nalgebra::Vector2;

use super::{
    RegionMask, RenderError, RenderRequest, RenderedImage, Renderer, SceneTarget,
    SharedTarget,
};
use crate::camera::{SceneCamera, SharedCamera};

const DEFAULT_BACKGROUND: [f32; 3] = [0.2, 0.2, 0.2];

pub struct RaycastRenderer {
    cameras: Vec<SharedCamera>,
    objects: Vec<SharedTarget>,
    background: [f32; 3],
}

impl RaycastRenderer {
    pub fn new(cameras: Vec<SharedCamera>) -> Self {
        Self {
            cameras,
            objects: Vec::new(),
            background: DEFAULT_BACKGROUND,
        }
    }

    /// Background color in `[0, 1]`.
    pub fn with_background(mut self, background: [f32; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn add_camera(&mut self, camera: SharedCamera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn shade(
        &self,
        camera: &SceneCamera,
        objects: &[&dyn SceneTarget],
        u: u32,
        v: u32,
        grid: u32,
        include_safe_zone: bool,
    ) -> [f32; 3] {
        let origin = camera.pose().position();
        let step = 1.0 / grid as f64;
        let mut acc = [0.0f32; 3];

        for sy in 0..grid {
            for sx in 0..grid {
                let pixel = Vector2::new(
                    u as f64 - 0.5 + (sx as f64 + 0.5) * step,
                    v as f64 - 0.5 + (sy as f64 + 0.5) * step,
                );
                let direction = camera.ray_direction(&pixel, include_safe_zone);
                let color = objects
                    .iter()
                    .filter_map(|o| o.intersect(&origin, &direction))
                    .min_by(|a, b| a.distance.total_cmp(&b.distance))
                    .map_or(self.background, |hit| hit.color);
                for (a, c) in acc.iter_mut().zip(color) {
                    *a += c;
                }
            }
        }

        let n = (grid * grid) as f32;
        acc.map(|a| a / n * 255.0)
    }
}

/// Pixels of the render frame that a masked request has to trace.
///
/// With distortion, a masked output pixel samples the render at its
/// forward-map position, so the 2×2 neighbourhood there is selected.
fn trace_footprint(
    camera: &SceneCamera,
    mask: &RegionMask,
    apply_distortion: bool,
) -> Result<Vec<bool>, RenderError> {
    let nominal = camera.resolution();
    let expected = (nominal.width, nominal.height);
    if mask.dimensions() != expected {
        return Err(RenderError::ShapeMismatch {
            expected,
            actual: mask.dimensions(),
        });
    }

    let frame = camera.effective_resolution(apply_distortion);
    let width = frame.width as i64;
    let height = frame.height as i64;
    let mut footprint = vec![false; (frame.width * frame.height) as usize];
    let mut mark = |x: i64, y: i64| {
        if x >= 0 && y >= 0 && x < width && y < height {
            footprint[(y * width + x) as usize] = true;
        }
    };

    if !apply_distortion {
        for (x, y) in mask.pixels() {
            mark(x as i64, y as i64);
        }
        return Ok(footprint);
    }

    let distortion = camera.distortion_model();
    let zone = camera.safe_zone();
    for (x, y) in mask.pixels() {
        let (sx, sy) = distortion.forward_map().get(x, y);
        let x0 = (sx + zone.x as f32).floor() as i64;
        let y0 = (sy + zone.y as f32).floor() as i64;
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            mark(x0 + dx, y0 + dy);
        }
    }
    Ok(footprint)
}

impl Renderer for RaycastRenderer {
    fn add_object(&mut self, object: SharedTarget) {
        self.objects.push(object);
    }

    fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    fn camera(&self, index: usize) -> Result<SharedCamera, RenderError> {
        self.cameras
            .get(index)
            .cloned()
            .ok_or(RenderError::CameraIndexOutOfBounds {
                index,
                count: self.cameras.len(),
            })
    }

    fn render_with_camera(
        &mut self,
        camera: &SceneCamera,
        request: &RenderRequest<'_>,
    ) -> Result<RenderedImage, RenderError> {
        let guards = self
            .objects
            .iter()
            .map(|o| {
                o.lock()
                    .map_err(|e| RenderError::ObjectUnavailable(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let objects: Vec<&dyn SceneTarget> = guards.iter().map(|g| &**g).collect();

        let include_safe_zone = request.apply_distortion;
        let frame = camera.effective_resolution(include_safe_zone);
        let footprint = request
            .mask
            .map(|mask| trace_footprint(camera, mask, request.apply_distortion))
            .transpose()?;

        let grid = (request.sample_count.max(1) as f64).sqrt().ceil() as u32;
        info!(
            "ray casting {}x{} frame, {} rays per pixel{}",
            frame.width,
            frame.height,
            grid * grid,
            if footprint.is_some() { " (masked)" } else { "" }
        );

        let mut traced = 0usize;
        let mut render = Rgb32FImage::new(frame.width, frame.height);
        for v in 0..frame.height {
            for u in 0..frame.width {
                if let Some(fp) = &footprint {
                    if !fp[(v * frame.width + u) as usize] {
                        continue;
                    }
                }
                let color = self.shade(camera, &objects, u, v, grid, include_safe_zone);
                render.put_pixel(u, v, Rgb(color));
                traced += 1;
            }
        }
        debug!("traced {traced} pixels");

        let image = if request.apply_distortion {
            camera.distortion_model().distort_image(&render)?
        } else {
            render
        };
        Ok(RenderedImage::from_float(image, request.bit_depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPose, Resolution};
    use crate::config::SimConfig;
    use crate::render::{BitDepth, SlantedEdgeTarget};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::sync::{Arc, Mutex};

    fn renderer(coefficients: &[f64]) -> RaycastRenderer {
        let camera = SceneCamera::from_field_of_view(
            Resolution {
                width: 40,
                height: 30,
            },
            60.0,
            coefficients,
            CameraPose::default(),
            &SimConfig::default(),
        )
        .unwrap();
        let mut target = SlantedEdgeTarget::new(20.0, 0.0);
        target.set_position(Vector3::new(0.0, 0.0, 10.0));

        let mut renderer = RaycastRenderer::new(vec![camera.into_shared()]);
        renderer.add_object(Arc::new(Mutex::new(target)));
        renderer
    }

    #[test]
    fn test_render_vertical_edge() {
        let mut r = renderer(&[0.0; 5]);
        let request = RenderRequest::new(0, 1).with_distortion(false);
        let image = r.render(&request).unwrap();
        assert_eq!(image.dimensions(), (40, 30));
        assert_eq!(image.bit_depth(), BitDepth::Float);

        let gray = image.to_gray_f32();
        assert_relative_eq!(gray.get_pixel(5, 15)[0], 0.0);
        assert_relative_eq!(gray.get_pixel(35, 15)[0], 255.0);
    }

    #[test]
    fn test_background_outside_target() {
        let mut r = renderer(&[0.0; 5]);
        {
            let camera = r.camera(0).unwrap();
            camera
                .lock()
                .unwrap()
                .set_position(Vector3::new(100.0, 0.0, 0.0));
        }
        let image = r
            .render(&RenderRequest::new(0, 1).with_distortion(false))
            .unwrap();
        let gray = image.to_gray_f32();
        assert_relative_eq!(gray.get_pixel(20, 15)[0], 51.0, epsilon = 1e-4);
    }

    #[test]
    fn test_supersampling_blends_edge_pixel() {
        let mut r = renderer(&[0.0; 5]);
        // Pixel 20 straddles the optical axis, where the edge lies.
        let coarse = r
            .render(&RenderRequest::new(0, 1).with_distortion(false))
            .unwrap()
            .to_gray_f32();
        let fine = r
            .render(&RenderRequest::new(0, 16).with_distortion(false))
            .unwrap()
            .to_gray_f32();
        assert_relative_eq!(fine.get_pixel(20, 15)[0], 127.5, epsilon = 1e-3);
        assert!(coarse.get_pixel(20, 15)[0] == 0.0 || coarse.get_pixel(20, 15)[0] == 255.0);
    }

    #[test]
    fn test_masked_render_only_traces_mask() {
        let mut r = renderer(&[-0.05, 0.0, 0.0, 0.0, 0.0]);
        let mask = RegionMask::from_line(
            40,
            30,
            &Vector2::new(20.0, 0.0),
            &Vector2::new(20.0, 29.0),
            4,
        );
        let image = r
            .render(&RenderRequest::new(0, 4).with_mask(&mask))
            .unwrap()
            .to_gray_f32();
        assert_eq!(image.dimensions(), (40, 30));
        // Far from the mask nothing was traced.
        assert_relative_eq!(image.get_pixel(2, 15)[0], 0.0);
        assert_relative_eq!(image.get_pixel(38, 15)[0], 0.0);
        // Inside the mask, right of the edge, the chart is light.
        assert!(image.get_pixel(21, 15)[0] > 200.0);
    }

    #[test]
    fn test_mask_size_mismatch_and_bad_index() {
        let mut r = renderer(&[0.0; 5]);
        let mask = RegionMask::new(10, 10);
        assert!(matches!(
            r.render(&RenderRequest::new(0, 1).with_mask(&mask)),
            Err(RenderError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            r.render(&RenderRequest::new(3, 1)),
            Err(RenderError::CameraIndexOutOfBounds { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_eight_bit_render() {
        let mut r = renderer(&[0.0; 5]);
        let image = r
            .render(&RenderRequest::new(0, 1).with_bit_depth(BitDepth::Eight))
            .unwrap();
        assert_eq!(image.bit_depth(), BitDepth::Eight);
        assert_eq!(image.dimensions(), (40, 30));
    }
}
