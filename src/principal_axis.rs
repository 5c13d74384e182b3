//! Centroid and dominant orientation of a contour via principal component analysis.

use crate::constants::EPSILON;
use crate::segmentation::Contour;
use crate::utils::flip_vertical;
use crate::{Error, Result};
use nalgebra::{Matrix2, SymmetricEigen, Vector2};
use opencv::core::Point;
use serde::{Deserialize, Serialize};

/// Principal axis of a point set, in the coordinates of the image it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisEstimate {
    /// Mean x in pixels
    pub centroid_x: f64,
    /// Mean y in pixels, bottom-left origin
    pub centroid_y: f64,
    /// Axis angle in degrees, folded into `[0, 180)`
    pub orientation_degrees: f64,
}

/// Foot position and planar orientation in captured-frame coordinates (bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Horizontal centroid in pixels
    pub centroid_x: f64,
    /// Vertical centroid in pixels, measured up from the bottom edge
    pub centroid_y: f64,
    /// Orientation in `[0, 180)` degrees
    pub orientation_degrees: f64,
}

impl PoseEstimate {
    /// Translate a crop-space axis estimate back into the captured frame
    #[must_use]
    pub fn from_axis(axis: &AxisEstimate, offset_x: f64, offset_y: f64) -> Self {
        Self {
            centroid_x: axis.centroid_x + offset_x,
            centroid_y: axis.centroid_y + offset_y,
            orientation_degrees: axis.orientation_degrees,
        }
    }
}

/// Fold an angle into `[0, 180)`.
///
/// Principal axes are undirected, so angles 180° apart describe the same axis.
#[must_use]
pub fn normalize_orientation(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(180.0);
    // rem_euclid can round tiny negative inputs up to exactly 180
    if folded >= 180.0 {
        0.0
    } else {
        folded
    }
}

/// Estimate the principal axis of a contour found in an image `image_height` rows tall
///
/// # Errors
///
/// Returns an error if the contour is degenerate
pub fn estimate_contour(contour: &Contour, image_height: i32) -> Result<AxisEstimate> {
    estimate(&contour.points, image_height)
}

/// Estimate centroid and dominant axis of `points` (top-left pixel coordinates).
///
/// The axis is the eigenvector of the largest eigenvalue of the 2×2 covariance
/// matrix; its angle is `atan2(axis_y, axis_x)` folded into `[0, 180)`. The
/// returned centroid y is flipped to a bottom-left origin.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for fewer than two points or a point set with
/// no spatial extent
#[allow(clippy::cast_precision_loss)] // Point counts and pixel coordinates fit in f64 exactly
pub fn estimate(points: &[Point], image_height: i32) -> Result<AxisEstimate> {
    if points.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "Principal axis needs at least 2 points, got {}",
            points.len()
        )));
    }

    let n = points.len() as f64;
    let mean = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + Vector2::new(f64::from(p.x), f64::from(p.y)))
        / n;

    let covariance = points.iter().fold(Matrix2::zeros(), |acc: Matrix2<f64>, p| {
        let d = Vector2::new(f64::from(p.x), f64::from(p.y)) - mean;
        acc + d * d.transpose()
    }) / n;

    if covariance.trace() < EPSILON {
        return Err(Error::InvalidInput("Contour points have no spatial extent".to_string()));
    }

    let eigen = SymmetricEigen::new(covariance);
    let principal = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] { 0 } else { 1 };
    let axis: Vector2<f64> = eigen.eigenvectors.column(principal).into_owned();

    let orientation_degrees = normalize_orientation(axis.y.atan2(axis.x).to_degrees());

    log::debug!(
        "PCA mean: ({:.2}, {:.2}), eigenvalues: ({:.3}, {:.3}), eigenvector: ({:.4}, {:.4})",
        mean.x,
        mean.y,
        eigen.eigenvalues[0],
        eigen.eigenvalues[1],
        axis.x,
        axis.y
    );

    Ok(AxisEstimate {
        centroid_x: mean.x,
        centroid_y: flip_vertical(mean.y, f64::from(image_height)),
        orientation_degrees,
    })
}
