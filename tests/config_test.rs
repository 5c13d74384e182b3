//! Configuration file loading and saving

use foot_pose_estimation::config::{Config, EXAMPLE_CONFIG};
use foot_pose_estimation::Error;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_file_round_trip() {
    let mut config = Config::default();
    config.segmentation.min_contour_area = 250.0;
    config.projection.depth_plane = 0.8;
    config.pipeline.debug = true;
    config.detection.anchors = vec![(1.0, 2.0)];

    let file = NamedTempFile::new().unwrap();
    config.to_file(file.path()).unwrap();
    let loaded = Config::from_file(file.path()).unwrap();

    assert!((loaded.segmentation.min_contour_area - 250.0).abs() < f64::EPSILON);
    assert_eq!(loaded.projection, config.projection);
    assert!(loaded.pipeline.debug);
    assert_eq!(loaded.detection.anchors, vec![(1.0, 2.0)]);
}

#[test]
fn test_example_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(EXAMPLE_CONFIG.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.detection.input_size, 416);
    assert_eq!(config.segmentation.upper_hsv, [179.0, 255.0, 255.0]);
}

#[test]
fn test_malformed_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"segmentation: [not, a, map\n").unwrap();

    assert!(matches!(Config::from_file(file.path()), Err(Error::ConfigError(_))));
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(Config::from_file("does/not/exist.yaml"), Err(Error::Io(_))));
}
