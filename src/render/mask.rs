//! Binary region-of-interest masks.

use image::{GrayImage, Luma};
use nalgebra::Vector2;

/// Pixels selected for an expensive render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    image: GrayImage,
}

impl RegionMask {
    /// Empty mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Every non-zero pixel of `image` is selected.
    pub fn from_image(image: GrayImage) -> Self {
        Self { image }
    }

    /// A thick line between two points.
    ///
    /// Endpoints are truncated to integer pixels, then every pixel whose center
    /// lies within `thickness / 2` of the segment is selected.
    pub fn from_line(
        width: u32,
        height: u32,
        p0: &Vector2<f64>,
        p1: &Vector2<f64>,
        thickness: u32,
    ) -> Self {
        let a = Vector2::new(p0.x.trunc(), p0.y.trunc());
        let b = Vector2::new(p1.x.trunc(), p1.y.trunc());
        let half = (thickness.max(1) as f64) / 2.0;
        let ab = b - a;
        let len_sq = ab.norm_squared();

        let image = GrayImage::from_fn(width, height, |x, y| {
            let p = Vector2::new(x as f64, y as f64);
            let t = if len_sq > 0.0 {
                ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let closest = a + ab * t;
            if (p - closest).norm() <= half {
                Luma([1])
            } else {
                Luma([0])
            }
        });
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.image.width() && y < self.image.height() && self.image.get_pixel(x, y)[0] > 0
    }

    /// Selected pixel coordinates in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
    }

    pub fn count(&self) -> usize {
        self.pixels().count()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels().next().is_none()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line_thickness() {
        let mask = RegionMask::from_line(
            20,
            20,
            &Vector2::new(2.9, 10.4),
            &Vector2::new(17.0, 10.0),
            6,
        );
        // Rows 7..=13 lie within 3 pixels of y = 10.
        assert!(mask.contains(10, 7));
        assert!(mask.contains(10, 13));
        assert!(!mask.contains(10, 6));
        assert!(!mask.contains(10, 14));
        // Round caps around the truncated endpoint (2, 10).
        assert!(mask.contains(0, 10));
        assert!(!mask.contains(0, 7));
        assert!(!mask.contains(25, 10));
    }

    #[test]
    fn test_degenerate_line_is_a_disc() {
        let p = Vector2::new(5.0, 5.0);
        let mask = RegionMask::from_line(11, 11, &p, &p, 2);
        assert_eq!(mask.count(), 5);
        assert!(!mask.is_empty());
    }

    #[test]
    fn test_empty_mask() {
        let mask = RegionMask::new(4, 4);
        assert!(mask.is_empty());
        assert_eq!(mask.pixels().count(), 0);
    }
}
