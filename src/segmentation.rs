//! HSV color segmentation and largest-contour extraction.

use crate::config::SegmentationConfig;
use crate::{Error, Result};
use opencv::core::{self, Mat, Point, Rect, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;

/// Inclusive per-channel HSV bounds.
///
/// Hue uses the full 0-255 range produced by `COLOR_RGB2HSV_FULL`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvRange {
    /// Lower bound (hue, saturation, value)
    pub lower: [f64; 3],
    /// Upper bound (hue, saturation, value)
    pub upper: [f64; 3],
}

impl HsvRange {
    /// Create a new range
    #[must_use]
    pub const fn new(lower: [f64; 3], upper: [f64; 3]) -> Self {
        Self { lower, upper }
    }

    fn lower_scalar(&self) -> Scalar {
        Scalar::new(self.lower[0], self.lower[1], self.lower[2], 0.0)
    }

    fn upper_scalar(&self) -> Scalar {
        Scalar::new(self.upper[0], self.upper[1], self.upper[2], 0.0)
    }
}

impl From<&SegmentationConfig> for HsvRange {
    fn from(config: &SegmentationConfig) -> Self {
        Self::new(config.lower_hsv, config.upper_hsv)
    }
}

/// Closed outer boundary of one connected mask region
#[derive(Debug, Clone)]
pub struct Contour {
    /// Boundary pixels in traversal order, top-left image coordinates
    pub points: Vec<Point>,
    /// Enclosed area in px²
    pub area: f64,
}

impl Contour {
    /// Axis-aligned bounding rectangle of the boundary
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        if self.points.is_empty() {
            return Rect::default();
        }

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for point in &self.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

/// Threshold an RGB or RGBA image in HSV space into a binary mask.
///
/// Pixels whose H, S and V all lie inside `range` (inclusive) become 255.
/// An empty image produces an empty mask.
///
/// # Errors
///
/// Returns an error for unsupported channel counts or failed `OpenCV` calls
pub fn segment(image: &Mat, range: &HsvRange) -> Result<Mat> {
    if image.empty() {
        return Ok(Mat::default());
    }

    let rgb = match image.channels() {
        3 => image.try_clone()?,
        4 => {
            let mut rgb = Mat::default();
            imgproc::cvt_color_def(image, &mut rgb, imgproc::COLOR_RGBA2RGB)?;
            rgb
        }
        channels => {
            return Err(Error::InvalidInput(format!(
                "Segmentation needs an RGB or RGBA image, got {channels} channels"
            )));
        }
    };

    let mut hsv = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut hsv, imgproc::COLOR_RGB2HSV_FULL)?;
    drop(rgb);

    let mut mask = Mat::default();
    core::in_range(&hsv, &range.lower_scalar(), &range.upper_scalar(), &mut mask)?;

    Ok(mask)
}

/// Find the external contour with the largest enclosed area.
///
/// Holes inside regions are ignored. Contours enclosing less than `min_area`
/// are dropped as noise; `Ok(None)` means no region qualified.
///
/// # Errors
///
/// Returns an error if contour tracing fails
pub fn extract_largest_contour(mask: &Mat, min_area: f64) -> Result<Option<Contour>> {
    if mask.empty() {
        return Ok(None);
    }

    let mut contours = Vector::<Vector<Point>>::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_NONE,
        Point::new(0, 0),
    )?;

    let mut largest: Option<Contour> = None;
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)?;
        if area < min_area {
            continue;
        }

        if largest.as_ref().map_or(true, |best| area > best.area) {
            largest = Some(Contour {
                points: contour.to_vec(),
                area,
            });
        }
    }

    log::debug!(
        "Traced {} external contours, largest qualifying area: {:?}",
        contours.len(),
        largest.as_ref().map(|c| c.area)
    );

    Ok(largest)
}
