//! Integration tests for YAML serialization and deserialization

use camera_sim::camera::{CameraModel, CameraModelError, PinholeModel, RadTanModel};
use camera_sim::config::{ConfigError, SimConfig};
use camera_sim::render::BitDepth;
use std::fs;

#[test]
fn test_rad_tan_yaml_round_trip() {
    fs::create_dir_all("output").ok();

    let input_path = "samples/rad_tan.yaml";
    let output_path = "output/test_rad_tan.yaml";

    let model = RadTanModel::load_from_yaml(input_path).expect("Failed to load model");

    model.save_to_yaml(output_path).expect("Failed to save model");

    let reloaded = RadTanModel::load_from_yaml(output_path).expect("Failed to reload model");

    assert_eq!(model.intrinsics, reloaded.intrinsics);
    assert_eq!(model.resolution, reloaded.resolution);
    assert_eq!(model.distortion, reloaded.distortion);
    assert_eq!(model.get_distortion().len(), 5);

    fs::remove_file(output_path).ok();
}

#[test]
fn test_pinhole_yaml_round_trip() {
    fs::create_dir_all("output").ok();

    let input_path = "samples/pinhole.yaml";
    let output_path = "output/test_pinhole.yaml";

    let model = PinholeModel::load_from_yaml(input_path).expect("Failed to load model");
    assert_eq!(model.intrinsics.fx, 1000.0);
    assert_eq!(model.resolution.width, 720);

    model.save_to_yaml(output_path).expect("Failed to save model");

    let reloaded = PinholeModel::load_from_yaml(output_path).expect("Failed to reload model");
    assert_eq!(model.intrinsics, reloaded.intrinsics);
    assert_eq!(model.resolution, reloaded.resolution);

    fs::remove_file(output_path).ok();
}

#[test]
fn test_pinhole_rejects_distortion_parameters() {
    let result = PinholeModel::load_from_yaml("samples/rad_tan.yaml");
    assert!(matches!(result, Err(CameraModelError::InvalidParams(_))));
}

#[test]
fn test_missing_camera_file() {
    let result = RadTanModel::load_from_yaml("samples/does_not_exist.yaml");
    assert!(matches!(result, Err(CameraModelError::IOError(_))));
}

#[test]
fn test_sim_config_load() {
    let config = SimConfig::load_from_yaml("samples/sim_config.yaml").expect("Failed to load config");

    assert_eq!(config.safe_zone_ratio, 0.1);
    assert_eq!(config.inverse_map.iterations, 10);
    assert_eq!(config.inverse_map.damping, 0.5);
    assert_eq!(config.esf.bin_width, 0.25);
    assert_eq!(config.routine.high_sample_count, 400);
    assert_eq!(config.routine.bit_depth, BitDepth::Float);
    // Omitted fields fall back to their defaults.
    assert_eq!(config.inverse_map.tolerance, None);
    assert_eq!(config.routine.camera_index, 0);
}

#[test]
fn test_sim_config_round_trip() {
    fs::create_dir_all("output").ok();
    let output_path = "output/test_sim_config.yaml";

    let mut config = SimConfig::default();
    config.safe_zone_ratio = 0.2;
    config.inverse_map.tolerance = Some(1e-3);
    config.routine.bit_depth = BitDepth::Eight;
    config.routine.apply_distortion = false;

    config.save_to_yaml(output_path).expect("Failed to save config");
    let reloaded = SimConfig::load_from_yaml(output_path).expect("Failed to reload config");
    assert_eq!(config, reloaded);

    fs::remove_file(output_path).ok();
}

#[test]
fn test_sim_config_rejects_invalid_values() {
    fs::create_dir_all("output").ok();
    let output_path = "output/test_sim_config_invalid.yaml";
    fs::write(output_path, "inverse_map:\n  damping: 1.5\n").expect("Failed to write file");

    let result = SimConfig::load_from_yaml(output_path);
    assert!(matches!(result, Err(ConfigError::InvalidParams(_))));

    fs::remove_file(output_path).ok();
}
