//! Constants used throughout the library

/// Square input resolution of the foot detection network
pub const DEFAULT_INPUT_SIZE: i32 = 416;

/// Stride between YOLO grid cells in network input pixels
pub const YOLO_CELL_SIZE: i32 = 32;

/// Anchor box sizes (width, height) in grid cells for the tiny-YOLO region layer
pub const DEFAULT_ANCHORS: [(f32, f32); 5] = [
    (1.08, 1.19),
    (3.42, 4.41),
    (6.63, 11.38),
    (9.42, 5.11),
    (16.62, 10.52),
];

/// Number of object classes the foot model predicts
pub const DEFAULT_NUM_CLASSES: usize = 1;

/// Minimum detection confidence kept after decoding
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// IoU above which a lower-scored box is suppressed
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;

/// Pixels added around a box on each side when cropping without the network
pub const DEFAULT_CROP_MARGIN: i32 = 0;

/// Pixels added around a detected box on each side when the network is used
pub const DETECTION_CROP_MARGIN: i32 = 50;

/// Inclusive lower HSV threshold (hue on the 0-255 full range)
pub const DEFAULT_LOWER_HSV: [f64; 3] = [0.0, 40.0, 125.0];

/// Inclusive upper HSV threshold
pub const DEFAULT_UPPER_HSV: [f64; 3] = [179.0, 255.0, 255.0];

/// Contours enclosing less area than this (px²) are treated as noise
pub const DEFAULT_MIN_CONTOUR_AREA: f64 = 100.0;

/// Vertical camera field of view in degrees
pub const DEFAULT_VERTICAL_FOV_DEGREES: f64 = 30.0;

/// Reference far distance used to size the visible world plane
pub const DEFAULT_FAR_DISTANCE: f64 = 200.0;

/// Depth of the plane the placement point is projected onto
pub const DEFAULT_DEPTH_PLANE: f64 = 0.55;

/// Radius of the centroid marker drawn on the diagnostics overlay
pub const OVERLAY_MARKER_RADIUS: i32 = 5;

/// Orientation reported before any successful run
pub const DEFAULT_ORIENTATION_DEGREES: f64 = 90.0;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
