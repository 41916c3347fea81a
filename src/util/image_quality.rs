//! Image comparison metrics.
//!
//! Used to quantify how closely an undistorted image reconstructs its source,
//! ignoring a border fringe where resampling has no valid source pixels.

use image::{ImageBuffer, Pixel};

use super::interpolate::Sample;
use super::UtilError;

fn check_comparable<P>(
    img1: &ImageBuffer<P, Vec<P::Subpixel>>,
    img2: &ImageBuffer<P, Vec<P::Subpixel>>,
    margin: u32,
) -> Result<(), UtilError>
where
    P: Pixel,
{
    if img1.dimensions() != img2.dimensions() {
        return Err(UtilError::InvalidParams(format!(
            "Images must have the same dimensions, got {:?} and {:?}",
            img1.dimensions(),
            img2.dimensions()
        )));
    }
    let (width, height) = img1.dimensions();
    if 2 * margin >= width || 2 * margin >= height {
        return Err(UtilError::EmptyRegion { margin });
    }
    Ok(())
}

/// Mean absolute per-channel difference, excluding `margin` pixels on every side.
///
/// # Errors
///
/// * `UtilError::InvalidParams` - If the images have different dimensions
/// * `UtilError::EmptyRegion` - If the margin leaves no pixels to compare
pub fn mean_absolute_error<P>(
    img1: &ImageBuffer<P, Vec<P::Subpixel>>,
    img2: &ImageBuffer<P, Vec<P::Subpixel>>,
    margin: u32,
) -> Result<f64, UtilError>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    check_comparable(img1, img2, margin)?;
    let (width, height) = img1.dimensions();

    let mut sum = 0.0;
    let mut count = 0usize;
    for y in margin..(height - margin) {
        for x in margin..(width - margin) {
            let a = img1.get_pixel(x, y);
            let b = img2.get_pixel(x, y);
            for (ca, cb) in a.channels().iter().zip(b.channels()) {
                sum += (ca.to_f32() as f64 - cb.to_f32() as f64).abs();
                count += 1;
            }
        }
    }

    Ok(sum / count as f64)
}

/// Peak Signal-to-Noise Ratio in dB over the region inside `margin`.
///
/// `peak` is the maximum representable intensity (255 for 8-bit and for the
/// 0–255 scaled float renders). Identical regions give `f64::INFINITY`.
pub fn calculate_psnr<P>(
    img1: &ImageBuffer<P, Vec<P::Subpixel>>,
    img2: &ImageBuffer<P, Vec<P::Subpixel>>,
    margin: u32,
    peak: f64,
) -> Result<f64, UtilError>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    check_comparable(img1, img2, margin)?;
    let (width, height) = img1.dimensions();

    let mut mse = 0.0;
    let mut count = 0usize;
    for y in margin..(height - margin) {
        for x in margin..(width - margin) {
            let a = img1.get_pixel(x, y);
            let b = img2.get_pixel(x, y);
            for (ca, cb) in a.channels().iter().zip(b.channels()) {
                let diff = ca.to_f32() as f64 - cb.to_f32() as f64;
                mse += diff * diff;
                count += 1;
            }
        }
    }
    mse /= count as f64;

    if mse <= 1e-10 {
        Ok(f64::INFINITY)
    } else {
        Ok(10.0 * (peak * peak / mse).log10())
    }
}
