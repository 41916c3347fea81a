//! Bilinear sampling and remapping over `image` buffers.
//!
//! All resampling in the crate goes through this module so that the distortion
//! model, the inverse map and the renderers agree on the pixel-center
//! convention: pixel `(u, v)` covers the continuous coordinate `(u, v)` at its
//! center, as in OpenCV's `remap`.

use image::{ImageBuffer, Pixel};

/// Channel types that can be resampled in floating point.
pub trait Sample: Copy {
    /// Widen the channel value to `f32`.
    fn to_f32(self) -> f32;
    /// Narrow an interpolated value back to the channel type.
    fn from_f32(value: f32) -> Self;
}

impl Sample for u8 {
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value.round().clamp(0.0, 255.0) as u8
    }
}

impl Sample for u16 {
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

impl Sample for f32 {
    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

/// Bilinearly interpolate `image` at the continuous coordinate `(x, y)`.
///
/// Neighbours that fall outside the buffer contribute a constant zero border,
/// matching a constant-border remap. Returns `None` when the coordinate is not
/// finite or when none of the four neighbours lies inside the image.
pub fn sample_bilinear<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, x: f32, y: f32) -> Option<P>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    if !x.is_finite() || !y.is_finite() {
        return None;
    }

    let (width, height) = image.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    if x0 < -1.0 || y0 < -1.0 || x0 >= width as f32 || y0 >= height as f32 {
        return None;
    }

    let wx = x - x0;
    let wy = y - y0;
    let x0 = x0 as i64;
    let y0 = y0 as i64;

    let channels = P::CHANNEL_COUNT as usize;
    let mut acc = [0.0f32; 4];
    let neighbours = [
        (0, 0, (1.0 - wx) * (1.0 - wy)),
        (1, 0, wx * (1.0 - wy)),
        (0, 1, (1.0 - wx) * wy),
        (1, 1, wx * wy),
    ];

    for (dx, dy, weight) in neighbours {
        let xi = x0 + dx;
        let yi = y0 + dy;
        if weight == 0.0 || xi < 0 || yi < 0 || xi >= width as i64 || yi >= height as i64 {
            continue;
        }
        let pixel = image.get_pixel(xi as u32, yi as u32);
        for (a, c) in acc.iter_mut().zip(pixel.channels()) {
            *a += weight * c.to_f32();
        }
    }

    let mut out = [P::Subpixel::from_f32(0.0); 4];
    for (o, a) in out.iter_mut().zip(acc.iter()).take(channels) {
        *o = P::Subpixel::from_f32(*a);
    }
    Some(*P::from_slice(&out[..channels]))
}

/// Build a `width`×`height` image by sampling `image` at the coordinate that
/// `source_of(u, v)` returns for each destination pixel.
///
/// Destination pixels whose source is `None` or outside the image stay zero.
pub fn remap_with<P, F>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
    source_of: F,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
    P::Subpixel: Sample,
    F: Fn(u32, u32) -> Option<(f32, f32)>,
{
    let mut output = ImageBuffer::new(width, height);
    for v in 0..height {
        for u in 0..width {
            if let Some((x, y)) = source_of(u, v) {
                if let Some(pixel) = sample_bilinear(image, x, y) {
                    output.put_pixel(u, v, pixel);
                }
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Luma, Rgb, RgbImage};

    fn ramp() -> ImageBuffer<Luma<f32>, Vec<f32>> {
        ImageBuffer::from_fn(4, 3, |x, y| Luma([x as f32 + 10.0 * y as f32]))
    }

    #[test]
    fn test_sample_on_pixel_centers() {
        let img = ramp();
        let p = sample_bilinear(&img, 2.0, 1.0).unwrap();
        assert_relative_eq!(p[0], 12.0);
    }

    #[test]
    fn test_sample_between_pixels() {
        let img = ramp();
        let p = sample_bilinear(&img, 1.5, 0.5).unwrap();
        // Mean of 1, 2, 11, 12.
        assert_relative_eq!(p[0], 6.5, epsilon = 1e-5);
    }

    #[test]
    fn test_sample_outside_is_none() {
        let img = ramp();
        assert!(sample_bilinear(&img, -1.5, 0.0).is_none());
        assert!(sample_bilinear(&img, 4.0, 0.0).is_none());
        assert!(sample_bilinear(&img, f32::NAN, 0.0).is_none());
    }

    #[test]
    fn test_sample_border_fades_to_zero() {
        let img = ImageBuffer::from_pixel(2, 2, Luma([100.0f32]));
        let p = sample_bilinear(&img, 1.5, 0.0).unwrap();
        assert_relative_eq!(p[0], 50.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sample_u8_rounds_and_clamps() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 10, 255]));
        img.put_pixel(1, 0, Rgb([1, 11, 255]));
        let p = sample_bilinear(&img, 0.5, 0.0).unwrap();
        assert_eq!(p, Rgb([1, 11, 255]));
    }

    #[test]
    fn test_remap_identity() {
        let img = ramp();
        let out = remap_with(&img, 4, 3, |u, v| Some((u as f32, v as f32)));
        assert_eq!(out, img);
    }

    #[test]
    fn test_remap_none_leaves_zero() {
        let img = ramp();
        let out = remap_with(&img, 2, 2, |_, _| None);
        assert!(out.pixels().all(|p| p[0] == 0.0));
    }
}
