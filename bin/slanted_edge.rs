//! Slanted-Edge ESF Tool
//!
//! Renders a slanted-edge chart through a distorted camera with the ray-cast
//! renderer and writes the measured edge spread function as CSV.
//!
//! Usage:
//!   cargo run --release --bin slanted_edge -- -c samples/slanted_edge_camera.yaml --angle 5 --gaussian

use camera_sim::camera::{CameraModel, CameraPose, RadTanModel, SceneCamera};
use camera_sim::config::SimConfig;
use camera_sim::render::{RaycastRenderer, SceneTarget, SharedTarget, SlantedEdgeTarget};
use camera_sim::routine::{RunOptions, SlantedEdgeRoutine};
use clap::Parser;
use log::info;
use nalgebra::Vector3;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(author, version, about = "Measure the edge spread function of a simulated camera")]
struct Cli {
    /// Camera calibration YAML file (rad_tan)
    #[arg(short = 'c', long, default_value = "samples/slanted_edge_camera.yaml")]
    calib: PathBuf,

    /// Simulation settings YAML file
    #[arg(short = 's', long)]
    config: Option<PathBuf>,

    /// Edge angle from vertical, in degrees
    #[arg(short = 'a', long, default_value = "5.0")]
    angle: f64,

    /// Chart side length, in world units
    #[arg(long, default_value = "5.0")]
    size: f64,

    /// Distance of the chart along the optical axis
    #[arg(short = 'd', long, default_value = "20.0")]
    distance: f64,

    /// Override the number of rays per pixel along the edge
    #[arg(long)]
    high_samples: Option<u32>,

    /// Fit the error-function edge model
    #[arg(long)]
    gaussian: bool,

    /// Keep raw intensities instead of rescaling the ESF to [0, 1]
    #[arg(long)]
    no_normalize: bool,

    /// Quantize the analysis image to 8-bit levels
    #[arg(long)]
    eight_bit: bool,

    /// Render without lens distortion
    #[arg(long)]
    no_distortion: bool,

    /// CSV output path (stdout when omitted)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Save the analysis image
    #[arg(long)]
    image: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::load_from_yaml(path)?,
        None => SimConfig::default(),
    };
    if let Some(samples) = cli.high_samples {
        config.routine.high_sample_count = samples;
    }
    config.routine.apply_distortion = !cli.no_distortion;

    let calib_path = cli
        .calib
        .to_str()
        .ok_or("calibration path is not valid UTF-8")?;
    let model = RadTanModel::load_from_yaml(calib_path)?;
    info!("loaded {} camera {:?}", model.get_model_name(), model);

    let camera = SceneCamera::new(model, CameraPose::default(), &config)?;
    let (hfov, vfov) = camera.effective_field_of_view(false);
    info!("field of view {hfov:.2} x {vfov:.2} deg");

    let mut target = SlantedEdgeTarget::new(cli.size, cli.angle);
    target.set_position(Vector3::new(0.0, 0.0, cli.distance));
    let target: SharedTarget = Arc::new(Mutex::new(target));

    let renderer = RaycastRenderer::new(vec![camera.into_shared()]);
    let mut routine = SlantedEdgeRoutine::new(renderer, target, &config);
    let output = routine.run(&RunOptions {
        normalize: !cli.no_normalize,
        convert_to_8_bit: cli.eight_bit,
        apply_gaussian: cli.gaussian,
    })?;

    info!(
        "edge from ({:.2}, {:.2}) to ({:.2}, {:.2})",
        output.p0.x, output.p0.y, output.p1.x, output.p1.y
    );
    if let Some(fit) = &output.esf.fit {
        info!("fitted sigma {:.4} px, mu {:.4} px", fit.sigma, fit.mu);
    }

    if let Some(path) = &cli.image {
        let (width, height) = output.image.dimensions();
        let gray = image::GrayImage::from_fn(width, height, |x, y| {
            image::Luma([output.image.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
        });
        gray.save(path)?;
    }

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let lsf = output.esf.line_spread();
    writeln!(writer, "distance,esf,lsf")?;
    for ((d, v), l) in output.esf.points().zip(lsf.values.iter()) {
        writeln!(writer, "{d:.4},{v:.6},{l:.6}")?;
    }
    writer.flush()?;

    Ok(())
}
