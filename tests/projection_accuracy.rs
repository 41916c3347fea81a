//! Integration tests for projection accuracy

use approx::assert_relative_eq;
use camera_sim::camera::{
    CameraModel, CameraModelError, CameraPose, PinholeModel, RadTanModel, Resolution, SceneCamera,
};
use camera_sim::config::SimConfig;
use nalgebra::{DVector, Vector2, Vector3};

fn reference_camera() -> SceneCamera {
    let params = DVector::from_vec(vec![
        1000.0, 1000.0, 360.0, 360.0, -0.1, 0.0, 0.0, 0.0, 0.0,
    ]);
    let mut model = RadTanModel::new(&params).expect("Failed to create model");
    model.resolution = Resolution {
        width: 720,
        height: 720,
    };
    SceneCamera::new(model, CameraPose::default(), &SimConfig::default())
        .expect("Failed to create camera")
}

#[test]
fn test_principal_point_projection() {
    let camera = reference_camera();
    let points = [Vector3::new(0.0, 0.0, 1.0)];

    let ideal = camera.project_points(&points).expect("Projection failed");
    let distorted = camera
        .project_points_distorted(&points)
        .expect("Projection failed");

    assert_relative_eq!(ideal[0], Vector2::new(360.0, 360.0), epsilon = 1e-12);
    assert_relative_eq!(distorted[0], Vector2::new(360.0, 360.0), epsilon = 1e-12);
}

#[test]
fn test_barrel_distortion_pulls_inward() {
    let camera = reference_camera();
    let points = [Vector3::new(0.2, 0.0, 1.0)];

    let ideal = camera.project_points(&points).expect("Projection failed");
    let distorted = camera
        .project_points_distorted(&points)
        .expect("Projection failed");

    assert_relative_eq!(ideal[0].x, 560.0, epsilon = 1e-9);
    // 1000 * 0.2 * (1 - 0.1 * 0.04) + 360
    assert_relative_eq!(distorted[0].x, 559.2, epsilon = 1e-9);
    assert_relative_eq!(distorted[0].y, 360.0, epsilon = 1e-12);
    assert!(distorted[0].x < 560.0);
}

#[test]
fn test_projection_behind_camera() {
    let camera = reference_camera();
    let result = camera.project_points(&[Vector3::new(0.1, 0.2, -1.0)]);
    assert!(matches!(
        result,
        Err(CameraModelError::DegenerateProjection { .. })
    ));

    let result = camera.project_points_distorted(&[Vector3::new(0.0, 0.0, 0.0)]);
    assert!(result.is_err(), "Should fail to project point at camera center");
}

#[test]
fn test_projection_outside_frame_is_returned() {
    let camera = reference_camera();
    let pixels = camera
        .project_points(&[Vector3::new(1.0, 0.0, 1.0)])
        .expect("Projection failed");
    assert!(pixels[0].x > 720.0);
}

#[test]
fn test_look_at_projects_target_to_principal_point() {
    let mut camera = reference_camera();
    camera.set_position(Vector3::new(2.0, -1.0, -5.0));
    camera
        .set_look_at(Vector3::new(0.5, 0.5, 3.0), Vector3::new(0.0, -1.0, 0.0))
        .expect("Look-at failed");

    let pixels = camera
        .project_points(&[Vector3::new(0.5, 0.5, 3.0)])
        .expect("Projection failed");
    assert_relative_eq!(pixels[0], Vector2::new(360.0, 360.0), epsilon = 1e-9);
}

#[test]
fn test_euler_orientation_moves_projection() {
    let mut camera = reference_camera();
    let point = [Vector3::new(0.0, 0.0, 5.0)];
    // Turn the camera about the world Y axis: the point drifts left.
    camera.set_orientation_from_euler(Vector3::new(0.0, 2.0, 0.0));
    let pixels = camera.project_points(&point).expect("Projection failed");
    assert!(pixels[0].x < 360.0);
    assert_relative_eq!(pixels[0].y, 360.0, epsilon = 1e-9);
}

#[test]
fn test_projection_unprojection_consistency() {
    let params = DVector::from_vec(vec![500.0, 500.0, 320.0, 240.0]);
    let mut model = PinholeModel::new(&params).expect("Failed to create model");
    model.resolution.width = 640;
    model.resolution.height = 480;

    let test_points = vec![
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.2, 0.1, 1.5),
        Vector3::new(-0.1, -0.2, 2.0),
    ];

    for point in test_points {
        let point_2d = model.project(&point).expect("Projection failed");
        let ray = model.unproject(&point_2d).expect("Unprojection failed");
        let dot_product = point.normalize().dot(&ray);
        assert!(
            (dot_product - 1.0).abs() < 1e-9,
            "Projection-unprojection should preserve direction"
        );
    }
}

#[test]
fn test_field_of_view_construction() {
    let camera = SceneCamera::from_field_of_view(
        Resolution {
            width: 720,
            height: 720,
        },
        39.6,
        &[0.0; 5],
        CameraPose::default(),
        &SimConfig::default(),
    )
    .expect("Failed to create camera");

    let (hfov, vfov) = camera.effective_field_of_view(false);
    assert_relative_eq!(hfov, 39.6, epsilon = 1e-9);
    assert_relative_eq!(vfov, 39.6, epsilon = 1e-9);
    assert_relative_eq!(camera.intrinsics().cx, 360.0);

    let (hfov_padded, _) = camera.effective_field_of_view(true);
    assert!(hfov_padded > hfov);
}
