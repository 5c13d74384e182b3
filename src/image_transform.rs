//! Stateless image transforms: crop, resize, rotate and reflect.
//!
//! Every function returns a new `Mat` and leaves its input untouched.

use crate::utils::bottom_span_to_top_row;
use crate::{Error, Result};
use opencv::core::{self, Mat, Point2f, Rect, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;

/// Which image corner a crop region is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectOrigin {
    /// `y` counts rows downwards from the top edge (`OpenCV` convention)
    TopLeft,
    /// `y` counts rows upwards from the bottom edge (screen convention)
    BottomLeft,
}

/// Axis-aligned pixel region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left edge
    pub x: i32,
    /// Near edge along the vertical axis of the chosen origin
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl CropRegion {
    /// Create a new region
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Region covering a whole image
    #[must_use]
    pub const fn full(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Convert to an `OpenCV` top-left rectangle inside an image of `image_height` rows
    #[must_use]
    pub fn to_mat_rect(self, origin: RectOrigin, image_height: i32) -> Rect {
        let top = match origin {
            RectOrigin::TopLeft => self.y,
            RectOrigin::BottomLeft => bottom_span_to_top_row(self.y, self.height, image_height),
        };
        Rect::new(self.x, top, self.width, self.height)
    }
}

/// Grow `region` by the padding on each side, then clamp it to the image bounds.
///
/// Clamping works the same for either origin since both axes are bounded by
/// `[0, size]`. Returns `None` when nothing of the region lies inside the image.
#[must_use]
pub fn clamp_region(
    image_width: i32,
    image_height: i32,
    region: CropRegion,
    padding_x: i32,
    padding_y: i32,
) -> Option<CropRegion> {
    let x0 = region.x.saturating_sub(padding_x).clamp(0, image_width.max(0));
    let y0 = region.y.saturating_sub(padding_y).clamp(0, image_height.max(0));
    let x1 = region
        .x
        .saturating_add(region.width)
        .saturating_add(padding_x)
        .clamp(0, image_width.max(0));
    let y1 = region
        .y
        .saturating_add(region.height)
        .saturating_add(padding_y)
        .clamp(0, image_height.max(0));

    (x1 > x0 && y1 > y0).then(|| CropRegion::new(x0, y0, x1 - x0, y1 - y0))
}

/// Copy the clamped, padded `region` out of `image`.
///
/// A region entirely outside the image yields an empty `Mat` rather than an error.
///
/// # Errors
///
/// Returns an error if the `OpenCV` copy fails
pub fn crop(image: &Mat, region: CropRegion, origin: RectOrigin, padding_x: i32, padding_y: i32) -> Result<Mat> {
    let Some(clamped) = clamp_region(image.cols(), image.rows(), region, padding_x, padding_y) else {
        log::debug!("Crop region {region:?} lies outside {}x{} image", image.cols(), image.rows());
        return Ok(Mat::default());
    };

    let rect = clamped.to_mat_rect(origin, image.rows());
    let view = Mat::roi(image, rect)?;
    Ok(view.try_clone()?)
}

/// Resize with bilinear sampling.
///
/// Destination pixel `(px, py)` samples the source at normalized coordinate
/// `((px + 0.5) / width, (py + 0.5) / height)`, which is `OpenCV`'s
/// pixel-center aligned `INTER_LINEAR`. Resizing to the source size is the identity.
///
/// # Errors
///
/// Returns an error for an empty image or non-positive target size
pub fn resize(image: &Mat, width: i32, height: i32) -> Result<Mat> {
    if image.empty() {
        return Err(Error::InvalidInput("Cannot resize an empty image".to_string()));
    }
    if width <= 0 || height <= 0 {
        return Err(Error::InvalidInput(format!("Invalid resize target {width}x{height}")));
    }

    let mut resized = Mat::default();
    imgproc::resize(image, &mut resized, Size::new(width, height), 0.0, 0.0, imgproc::INTER_LINEAR)?;
    Ok(resized)
}

/// Rotate counter-clockwise by `degrees` around the image center.
///
/// Multiples of 90° are exact and swap dimensions as needed; other angles keep
/// the input size and fill uncovered pixels with zero.
///
/// # Errors
///
/// Returns an error if the `OpenCV` operation fails
pub fn rotate(image: &Mat, degrees: f64) -> Result<Mat> {
    if !degrees.is_finite() {
        return Err(Error::InvalidInput(format!("Invalid rotation angle {degrees}")));
    }

    let normalized = degrees.rem_euclid(360.0);
    let quarter_turns = (normalized / 90.0).round();
    let mut rotated = Mat::default();

    if (normalized - quarter_turns * 90.0).abs() < 1e-9 {
        match quarter_turns as i32 % 4 {
            0 => return Ok(image.try_clone()?),
            1 => core::rotate(image, &mut rotated, core::ROTATE_90_COUNTERCLOCKWISE)?,
            2 => core::rotate(image, &mut rotated, core::ROTATE_180)?,
            _ => core::rotate(image, &mut rotated, core::ROTATE_90_CLOCKWISE)?,
        }
        return Ok(rotated);
    }

    #[allow(clippy::cast_precision_loss)] // Image dimensions are far below f32 precision limits
    let center = Point2f::new(image.cols() as f32 / 2.0, image.rows() as f32 / 2.0);
    let matrix = imgproc::get_rotation_matrix_2d(center, normalized, 1.0)?;
    imgproc::warp_affine(
        image,
        &mut rotated,
        &matrix,
        image.size()?,
        imgproc::INTER_LINEAR,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;
    Ok(rotated)
}

/// Mirror the image horizontally
///
/// # Errors
///
/// Returns an error if the `OpenCV` operation fails
pub fn reflect(image: &Mat) -> Result<Mat> {
    let mut reflected = Mat::default();
    core::flip(image, &mut reflected, 1)?;
    Ok(reflected)
}

/// Undo the mirrored, sideways frames some capture backends deliver.
///
/// When `enabled`, reflects and then rotates by -90°; otherwise returns a copy.
///
/// # Errors
///
/// Returns an error if the `OpenCV` operations fail
pub fn correct_orientation(image: &Mat, enabled: bool) -> Result<Mat> {
    if !enabled {
        return Ok(image.try_clone()?);
    }
    rotate(&reflect(image)?, -90.0)
}
