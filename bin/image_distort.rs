//! Image Distortion Tool
//!
//! Apply or remove Brown–Conrady lens distortion using a camera calibration file.
//!
//! Usage:
//!   cargo run --bin image_distort -- -i image.png -c samples/rad_tan.yaml -o output.png --mode undistort

use camera_sim::camera::{CameraModel, RadTanModel, SafeZone};
use camera_sim::distortion::{DistortionModel, InverseMapConfig};
use camera_sim::util::{calculate_psnr, mean_absolute_error};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Resample an ideal image through the forward map
    Distort,
    /// Solve the lens polynomial per pixel
    Undistort,
    /// Remap through the iterative inverse map
    UndistortInverseMap,
}

#[derive(Parser)]
#[command(author, version, about = "Distort or undistort images using camera calibration")]
struct Cli {
    /// Input image path
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Camera calibration YAML file (rad_tan)
    #[arg(short = 'c', long)]
    calib: PathBuf,

    /// Output image path
    #[arg(short = 'o', long)]
    output: PathBuf,

    #[arg(short = 'm', long, value_enum, default_value = "undistort")]
    mode: Mode,

    /// Fixed-point iterations for the inverse map
    #[arg(long, default_value = "10")]
    iterations: usize,

    /// Also distort the result back and report the round-trip error (undistort modes)
    #[arg(long)]
    check: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    println!("🎯 Image Distortion Tool");
    println!("========================");
    println!("Input: {:?}", cli.input);
    println!("Calibration: {:?}", cli.calib);
    println!("Output: {:?}", cli.output);
    println!();

    let calib_path = cli
        .calib
        .to_str()
        .ok_or("calibration path is not valid UTF-8")?;
    let model = RadTanModel::load_from_yaml(calib_path)?;
    let intrinsics = model.get_intrinsics();
    println!("✓ Loaded {} camera model", model.get_model_name());
    println!(
        "  fx={:.2}, fy={:.2}, cx={:.2}, cy={:.2}",
        intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy
    );
    println!("  distortion={:?}", model.get_distortion());

    let img = image::open(&cli.input)?.to_rgb8();
    println!("✓ Loaded input image: {}x{}", img.width(), img.height());

    // The input is already the nominal frame, so no safe-zone margin.
    let config = InverseMapConfig {
        iterations: cli.iterations,
        ..Default::default()
    };
    let distortion = DistortionModel::from_coefficients(
        model.intrinsics,
        model.distortion,
        model.resolution,
        SafeZone::default(),
        &config,
    )?;

    println!("⏳ Processing ({:?})...", cli.mode);
    let output = match cli.mode {
        Mode::Distort => distortion.distort_image(&img)?,
        Mode::Undistort => distortion.undistort_image(&img)?,
        Mode::UndistortInverseMap => distortion.undistort_image_with_inverse_map(&img)?,
    };
    output.save(&cli.output)?;
    println!("✓ Saved result to: {:?}", cli.output);

    if cli.check && !matches!(cli.mode, Mode::Distort) {
        let roundtrip = distortion.distort_image(&output)?;
        let margin = (img.width().min(img.height()) / 20).max(1);
        let mae = mean_absolute_error(&img, &roundtrip, margin)?;
        let psnr = calculate_psnr(&img, &roundtrip, margin, 255.0)?;
        info!("round-trip margin {margin}px: MAE {mae:.3}, PSNR {psnr:.2} dB");
        println!("  Round trip: MAE={mae:.3}, PSNR={psnr:.2} dB");
    }

    println!();
    println!("✅ Done!");
    Ok(())
}
