//! Configuration management for the foot pose pipeline

use crate::constants::{
    DEFAULT_ANCHORS, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CROP_MARGIN, DEFAULT_DEPTH_PLANE,
    DEFAULT_FAR_DISTANCE, DEFAULT_INPUT_SIZE, DEFAULT_LOWER_HSV, DEFAULT_MIN_CONTOUR_AREA,
    DEFAULT_NMS_THRESHOLD, DEFAULT_NUM_CLASSES, DEFAULT_UPPER_HSV, DEFAULT_VERTICAL_FOV_DEGREES,
    DETECTION_CROP_MARGIN, YOLO_CELL_SIZE,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub model: ModelConfig,

    /// Neural detection configuration
    pub detection: DetectionConfig,

    /// Color segmentation configuration
    pub segmentation: SegmentationConfig,

    /// Screen-to-world projection configuration
    pub projection: ProjectionConfig,

    /// Orchestration flags
    pub pipeline: PipelineConfig,
}

/// Model file configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the foot detection ONNX model; `None` disables neural detection
    pub detector: Option<PathBuf>,
}

/// Neural detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Square network input resolution
    pub input_size: i32,

    /// Confidence threshold for kept boxes (0.0-1.0)
    pub confidence_threshold: f32,

    /// IoU threshold for non-maximum suppression (0.0-1.0)
    pub nms_threshold: f32,

    /// Number of classes in the region output
    pub num_classes: usize,

    /// Anchor sizes (width, height) in grid cells
    pub anchors: Vec<(f32, f32)>,

    /// Margin around the crop region when the network is not used
    pub crop_margin: i32,

    /// Margin around a detected box when the network is used
    pub detection_crop_margin: i32,
}

/// HSV threshold and contour filtering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Inclusive lower bound per HSV channel
    pub lower_hsv: [f64; 3],

    /// Inclusive upper bound per HSV channel
    pub upper_hsv: [f64; 3],

    /// Minimum enclosed contour area in px²
    pub min_contour_area: f64,
}

/// Camera model used for screen-to-world projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Vertical field of view in degrees
    pub vertical_fov_degrees: f64,

    /// Reference far distance for the visible world plane
    pub far_distance: f64,

    /// Depth of the placement plane
    pub depth_plane: f64,
}

/// Orchestrator flags resolved once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep copies of the last capture, mask and overlay for inspection
    pub debug: bool,

    /// Reflect and rotate captured frames before processing
    pub needs_orientation_correction: bool,

    /// Run the principal-axis estimation on a blocking worker
    pub offload_estimation: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            num_classes: DEFAULT_NUM_CLASSES,
            anchors: DEFAULT_ANCHORS.to_vec(),
            crop_margin: DEFAULT_CROP_MARGIN,
            detection_crop_margin: DETECTION_CROP_MARGIN,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            lower_hsv: DEFAULT_LOWER_HSV,
            upper_hsv: DEFAULT_UPPER_HSV,
            min_contour_area: DEFAULT_MIN_CONTOUR_AREA,
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            vertical_fov_degrees: DEFAULT_VERTICAL_FOV_DEGREES,
            far_distance: DEFAULT_FAR_DISTANCE,
            depth_plane: DEFAULT_DEPTH_PLANE,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        if detection.input_size <= 0 || detection.input_size % YOLO_CELL_SIZE != 0 {
            return Err(Error::ConfigError(format!(
                "Input size must be a positive multiple of {YOLO_CELL_SIZE}, got {}",
                detection.input_size
            )));
        }
        if !(0.0..=1.0).contains(&detection.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&detection.nms_threshold) {
            return Err(Error::ConfigError("NMS threshold must be between 0.0 and 1.0".to_string()));
        }
        if detection.num_classes == 0 {
            return Err(Error::ConfigError("Number of classes must be greater than 0".to_string()));
        }
        if detection.anchors.is_empty() {
            return Err(Error::ConfigError("At least one anchor is required".to_string()));
        }
        if detection.crop_margin < 0 || detection.detection_crop_margin < 0 {
            return Err(Error::ConfigError("Crop margins must not be negative".to_string()));
        }

        let segmentation = &self.segmentation;
        for (channel, (lower, upper)) in ["hue", "saturation", "value"]
            .iter()
            .zip(segmentation.lower_hsv.iter().zip(segmentation.upper_hsv.iter()))
        {
            if !(0.0..=255.0).contains(lower) || !(0.0..=255.0).contains(upper) {
                return Err(Error::ConfigError(format!("HSV {channel} bounds must lie in 0..=255")));
            }
            if lower > upper {
                return Err(Error::ConfigError(format!(
                    "HSV {channel} lower bound {lower} exceeds upper bound {upper}"
                )));
            }
        }
        if segmentation.min_contour_area < 0.0 {
            return Err(Error::ConfigError("Minimum contour area must not be negative".to_string()));
        }

        let projection = &self.projection;
        if !(projection.vertical_fov_degrees > 0.0 && projection.vertical_fov_degrees < 90.0) {
            return Err(Error::ConfigError(
                "Vertical field of view must be between 0 and 90 degrees".to_string(),
            ));
        }
        if projection.far_distance <= 0.0 || projection.depth_plane <= 0.0 {
            return Err(Error::ConfigError(
                "Far distance and depth plane must be greater than 0".to_string(),
            ));
        }

        if let Some(detector) = &self.model.detector {
            if !detector.exists() {
                return Err(Error::ConfigError(format!(
                    "Foot detector model not found: {}",
                    detector.display()
                )));
            }
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Foot Pose Estimation Configuration

# Model paths (omit detector to run without neural detection)
model:
  detector: null

# Neural detection parameters
detection:
  input_size: 416
  confidence_threshold: 0.3
  nms_threshold: 0.45
  num_classes: 1
  anchors:
    - [1.08, 1.19]
    - [3.42, 4.41]
    - [6.63, 11.38]
    - [9.42, 5.11]
    - [16.62, 10.52]
  crop_margin: 0
  detection_crop_margin: 50

# Color segmentation (hue on the 0-255 range)
segmentation:
  lower_hsv: [0.0, 40.0, 125.0]
  upper_hsv: [179.0, 255.0, 255.0]
  min_contour_area: 100.0

# Screen-to-world projection
projection:
  vertical_fov_degrees: 30.0
  far_distance: 200.0
  depth_plane: 0.55

# Orchestration
pipeline:
  debug: false
  needs_orientation_correction: false
  offload_estimation: false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.input_size, 416);
        assert_eq!(config.detection.crop_margin, 0);
        assert_eq!(config.detection.detection_crop_margin, 50);
        assert_eq!(config.segmentation.lower_hsv, [0.0, 40.0, 125.0]);
        assert_eq!(config.segmentation.upper_hsv, [179.0, 255.0, 255.0]);
        assert!((config.segmentation.min_contour_area - 100.0).abs() < f64::EPSILON);
        assert!((config.projection.depth_plane - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn test_example_config_parses_to_defaults() {
        let parsed: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        let defaults = Config::default();

        assert!(parsed.model.detector.is_none());
        assert_eq!(parsed.detection.anchors, defaults.detection.anchors);
        assert_eq!(parsed.segmentation.lower_hsv, defaults.segmentation.lower_hsv);
        assert_eq!(parsed.projection, defaults.projection);
        assert!(!parsed.pipeline.debug);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = serde_yaml::from_str("projection:\n  depth_plane: 1.0\n").unwrap();
        assert!((parsed.projection.depth_plane - 1.0).abs() < f64::EPSILON);
        assert!((parsed.projection.far_distance - 200.0).abs() < f64::EPSILON);
        assert_eq!(parsed.detection.input_size, 416);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.detection.input_size = 400;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.segmentation.lower_hsv = [200.0, 40.0, 125.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.projection.vertical_fov_degrees = 90.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.detector = Some(PathBuf::from("does/not/exist.onnx"));
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }
}
