//! Current foot placement and the consumer it is forwarded to.

use crate::principal_axis::PoseEstimate;
use crate::projection::WorldPosition;
use serde::{Deserialize, Serialize};

/// Latest successful estimate together with its world position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub estimate: PoseEstimate,
    pub position: WorldPosition,
}

/// External placement or render consumer
pub trait PlacementSink: Send {
    /// Move the placed object to `position`, rotated by `orientation_degrees`
    fn apply_pose(&mut self, position: WorldPosition, orientation_degrees: f64);
}

/// Sink that only logs each placement
#[derive(Debug, Default)]
pub struct LoggingPlacementSink {
    applied: usize,
}

impl LoggingPlacementSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of placements received so far
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.applied
    }
}

impl PlacementSink for LoggingPlacementSink {
    fn apply_pose(&mut self, position: WorldPosition, orientation_degrees: f64) {
        self.applied += 1;
        log::info!(
            "Placement #{}: ({:.4}, {:.4}, {:.2}) at {:.1}°",
            self.applied,
            position.x,
            position.y,
            position.z,
            orientation_degrees
        );
    }
}
