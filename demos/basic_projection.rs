//! Basic Projection Example
//!
//! This example demonstrates the fundamental camera operations:
//! - Creating a radial-tangential camera model from parameters
//! - Projecting 3D points with and without lens distortion
//! - Placing the camera in a scene with a look-at pose
//! - Locating points in a distorted render
//!
//! Run with: cargo run --example basic_projection

use camera_sim::camera::{CameraModel, CameraPose, RadTanModel, Resolution, SceneCamera};
use camera_sim::config::SimConfig;
use nalgebra::{DVector, Vector3};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Basic Camera Projection Example ===\n");

    // fx, fy, cx, cy, k1, k2, p1, p2, k3
    let params = DVector::from_vec(vec![
        1000.0, 1000.0, 360.0, 360.0, -0.1, 0.0, 0.0, 0.0, 0.0,
    ]);
    let mut model = RadTanModel::new(&params)?;
    model.resolution = Resolution {
        width: 720,
        height: 720,
    };

    println!("Camera Model: {}", model.get_model_name());
    println!(
        "Intrinsics: fx={}, fy={}, cx={}, cy={}",
        model.intrinsics.fx, model.intrinsics.fy, model.intrinsics.cx, model.intrinsics.cy
    );
    println!("Distortion: {:?}\n", model.get_distortion());

    println!("--- Example 1: Ideal vs distorted projection ---");
    for point in [Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.2, 0.0, 1.0)] {
        let ideal = model.as_pinhole().project(&point)?;
        let distorted = model.project(&point)?;
        println!(
            "[{:.2}, {:.2}, {:.2}] → ideal [{:.2}, {:.2}], distorted [{:.2}, {:.2}]",
            point.x, point.y, point.z, ideal.x, ideal.y, distorted.x, distorted.y
        );
    }
    println!();

    println!("--- Example 2: Camera in a scene ---");
    let pose = CameraPose::look_at(
        Vector3::new(0.5, -0.5, -4.0),
        Vector3::zeros(),
        Vector3::new(0.0, -1.0, 0.0),
    )?;
    let camera = SceneCamera::new(model, pose, &SimConfig::default())?;
    let (hfov, vfov) = camera.effective_field_of_view(false);
    let (hfov_padded, vfov_padded) = camera.effective_field_of_view(true);
    println!("FOV: {hfov:.2}° x {vfov:.2}° ({hfov_padded:.2}° x {vfov_padded:.2}° with safe zone)");

    let corners = [
        Vector3::new(-1.0, -1.0, 0.0),
        Vector3::new(1.0, -1.0, 0.0),
        Vector3::new(1.0, 1.0, 0.0),
        Vector3::new(-1.0, 1.0, 0.0),
    ];
    let ideal = camera.project_points(&corners)?;
    let rendered = camera.locate_points_in_image(&corners, true)?;
    for (i, (a, b)) in ideal.iter().zip(rendered.iter()).enumerate() {
        println!(
            "Corner {i}: ideal [{:.2}, {:.2}], in distorted render [{:.2}, {:.2}]",
            a.x, a.y, b.x, b.y
        );
    }

    println!("\n--- Example 3: Point behind the camera ---");
    match camera.project_points(&[Vector3::new(0.0, 0.0, -10.0)]) {
        Ok(_) => println!("unexpected projection"),
        Err(e) => println!("Projection failed as expected: {e}"),
    }

    Ok(())
}
