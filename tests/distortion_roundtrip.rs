//! Integration tests for applying and removing lens distortion on images

use camera_sim::camera::{CameraModelError, Intrinsics, Resolution, SafeZone};
use camera_sim::distortion::{DistortionMap, DistortionModel, InverseMapConfig};
use camera_sim::util::{calculate_psnr, mean_absolute_error};
use image::{ImageBuffer, Luma, Rgb, RgbImage};

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

const WIDTH: u32 = 120;
const HEIGHT: u32 = 90;
const MARGIN: u32 = 8;

fn intrinsics() -> Intrinsics {
    Intrinsics {
        fx: 100.0,
        fy: 100.0,
        cx: 60.0,
        cy: 45.0,
    }
}

fn resolution() -> Resolution {
    Resolution {
        width: WIDTH,
        height: HEIGHT,
    }
}

fn model(coefficients: &[f64], safe_zone: SafeZone) -> DistortionModel {
    DistortionModel::new(
        intrinsics(),
        coefficients,
        resolution(),
        safe_zone,
        &InverseMapConfig::default(),
    )
    .expect("Failed to build distortion model")
}

/// Smooth test pattern in 0..255, defined over any frame offset.
fn pattern(width: u32, height: u32, offset_x: u32, offset_y: u32) -> GrayF32 {
    ImageBuffer::from_fn(width, height, |x, y| {
        let u = x as f32 - offset_x as f32;
        let v = y as f32 - offset_y as f32;
        Luma([128.0 + 100.0 * (u / 7.0).sin() * (v / 9.0).cos()])
    })
}

#[test]
fn test_undistort_distort_round_trip() {
    let m = model(&[-0.1, 0.01, 0.001, -0.001, 0.0], SafeZone::default());
    let img = pattern(WIDTH, HEIGHT, 0, 0);

    let distorted = m.distort_image(&img).expect("Distortion failed");
    let restored = m.undistort_image(&distorted).expect("Undistortion failed");

    let mae = mean_absolute_error(&img, &restored, MARGIN).expect("MAE failed");
    let psnr = calculate_psnr(&img, &restored, MARGIN, 255.0).expect("PSNR failed");
    assert!(mae < 2.0, "round-trip MAE too large: {mae}");
    assert!(psnr > 30.0, "round-trip PSNR too low: {psnr}");

    // Without correction the images differ clearly.
    let uncorrected = mean_absolute_error(&img, &distorted, MARGIN).expect("MAE failed");
    assert!(uncorrected > mae * 2.0);
}

#[test]
fn test_round_trip_with_safe_zone() {
    let zone = SafeZone::from_ratio(&resolution(), 0.1).expect("Invalid safe zone");
    let m = model(&[-0.15, 0.0, 0.0, 0.0, 0.0], zone);
    let padded_res = zone.expand(&resolution());

    let padded = pattern(padded_res.width, padded_res.height, zone.x, zone.y);
    let nominal = pattern(WIDTH, HEIGHT, 0, 0);

    let distorted = m.distort_image(&padded).expect("Distortion failed");
    assert_eq!(distorted.dimensions(), (WIDTH, HEIGHT));
    let restored = m.undistort_image(&distorted).expect("Undistortion failed");

    let mae = mean_absolute_error(&nominal, &restored, MARGIN).expect("MAE failed");
    assert!(mae < 2.0, "round-trip MAE too large: {mae}");
}

#[test]
fn test_inverse_map_path_agrees_with_direct_path() {
    let m = model(&[-0.1, 0.0, 0.0005, 0.0005, 0.0], SafeZone::default());
    let img = pattern(WIDTH, HEIGHT, 0, 0);
    let distorted = m.distort_image(&img).expect("Distortion failed");

    let direct = m.undistort_image(&distorted).expect("Undistortion failed");
    let via_map = m
        .undistort_image_with_inverse_map(&distorted)
        .expect("Undistortion failed");

    let mae = mean_absolute_error(&direct, &via_map, MARGIN).expect("MAE failed");
    assert!(mae < 1.0, "inverse map disagrees with the direct solve: {mae}");
}

#[test]
fn test_distort_is_deterministic() {
    let m = model(&[-0.2, 0.05, 0.0, 0.0, 0.0], SafeZone::default());
    let img = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
    });

    let first = m.distort_image(&img).expect("Distortion failed");
    let second = m.distort_image(&img).expect("Distortion failed");
    assert_eq!(first, second);
}

#[test]
fn test_zero_coefficients_are_identity() {
    let m = model(&[0.0; 5], SafeZone::default());
    let identity = DistortionMap::identity(WIDTH, HEIGHT);
    let diff = m
        .forward_map()
        .max_abs_difference(&identity)
        .expect("Maps differ in size");
    assert!(diff < 1e-4);

    let img = pattern(WIDTH, HEIGHT, 0, 0);
    let distorted = m.distort_image(&img).expect("Distortion failed");
    let undistorted = m.undistort_image(&img).expect("Undistortion failed");
    let mae = mean_absolute_error(&img, &distorted, 0).expect("MAE failed");
    assert!(mae < 1e-3);
    let mae = mean_absolute_error(&img, &undistorted, 0).expect("MAE failed");
    assert!(mae < 1e-3);
}

#[test]
fn test_wrong_coefficient_count() {
    let result = DistortionModel::new(
        intrinsics(),
        &[-0.1, 0.0, 0.0, 0.0],
        resolution(),
        SafeZone::default(),
        &InverseMapConfig::default(),
    );
    assert!(matches!(
        result,
        Err(CameraModelError::ShapeMismatch {
            expected: 5,
            actual: 4
        })
    ));
}

#[test]
fn test_size_mismatch_leaves_model_usable() {
    let m = model(&[-0.1, 0.0, 0.0, 0.0, 0.0], SafeZone::default());
    let forward = m.forward_map().clone();
    let inverse = m.inverse_map().clone();

    let wrong = pattern(WIDTH + 1, HEIGHT, 0, 0);
    assert!(matches!(
        m.distort_image(&wrong),
        Err(CameraModelError::SizeMismatch { .. })
    ));
    assert!(matches!(
        m.undistort_image_with_inverse_map(&wrong),
        Err(CameraModelError::SizeMismatch { .. })
    ));

    assert_eq!(m.forward_map(), &forward);
    assert_eq!(m.inverse_map(), &inverse);
    let img = pattern(WIDTH, HEIGHT, 0, 0);
    assert!(m.distort_image(&img).is_ok());
}

#[test]
fn test_inverse_map_iterations_improve_accuracy() {
    let forward_model = model(&[-0.2, 0.0, 0.0, 0.0, 0.0], SafeZone::default());
    let few = DistortionModel::new(
        intrinsics(),
        &[-0.2, 0.0, 0.0, 0.0, 0.0],
        resolution(),
        SafeZone::default(),
        &InverseMapConfig {
            iterations: 1,
            ..Default::default()
        },
    )
    .expect("Failed to build distortion model");

    // forward(inverse(p)) should return p; compare the residual at a corner region pixel.
    let residual = |m: &DistortionModel| {
        let (ix, iy) = m.inverse_map().get(100, 75);
        let (fx, fy) = m.forward_map().sample_bilinear(ix as f64, iy as f64);
        ((fx - 100.0).powi(2) + (fy - 75.0).powi(2)).sqrt()
    };
    assert!(residual(&forward_model) < residual(&few));
    assert!(residual(&forward_model) < 0.05);
}
