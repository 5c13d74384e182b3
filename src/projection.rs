//! Screen-to-world projection onto a fixed depth plane.
//!
//! The visible world plane is sized at a reference far distance from the
//! vertical field of view and the captured aspect ratio, then scaled onto the
//! nearer placement plane by similar triangles.

use crate::config::ProjectionConfig;
use serde::{Deserialize, Serialize};

/// Dimensions of the captured camera frame, fixed after the first capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraFrameContext {
    /// Captured frame width in pixels
    pub captured_width: i32,
    /// Captured frame height in pixels
    pub captured_height: i32,
}

impl CameraFrameContext {
    /// Create a new context
    #[must_use]
    pub const fn new(captured_width: i32, captured_height: i32) -> Self {
        Self {
            captured_width,
            captured_height,
        }
    }

    fn is_usable(&self) -> bool {
        self.captured_width > 0 && self.captured_height > 0
    }
}

/// Point on the placement plane in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPosition {
    /// Lateral origin on the placement plane
    #[must_use]
    pub const fn origin(depth: f64) -> Self {
        Self { x: 0.0, y: 0.0, z: depth }
    }
}

/// Visible world-plane height at the reference far distance.
///
/// Uses `tan(fov)` over the full vertical field of view, not the half angle.
#[must_use]
pub fn world_height(config: &ProjectionConfig) -> f64 {
    config.vertical_fov_degrees.to_radians().tan() * config.far_distance * 2.0
}

/// Project a bottom-left origin screen position onto the placement plane.
///
/// Returns the lateral origin `(0, 0, depth)` while no frame has been captured
/// (or the captured size is degenerate).
#[must_use]
pub fn project(
    screen_x: f64,
    screen_y: f64,
    frame: Option<&CameraFrameContext>,
    config: &ProjectionConfig,
) -> WorldPosition {
    let Some(frame) = frame.filter(|f| f.is_usable()) else {
        log::debug!("Projection requested before any frame was captured, using origin");
        return WorldPosition::origin(config.depth_plane);
    };

    let width = f64::from(frame.captured_width);
    let height = f64::from(frame.captured_height);

    let centered_x = screen_x - width / 2.0;
    let centered_y = screen_y - height / 2.0;

    let world_h = world_height(config);
    let world_w = world_h * (width / height);

    let depth_scale = config.depth_plane / config.far_distance;

    WorldPosition {
        x: centered_x * (world_w / width) * depth_scale,
        y: centered_y * (world_h / height) * depth_scale,
        z: config.depth_plane,
    }
}
