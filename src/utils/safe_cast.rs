//! Checked numeric conversions between image dimensions and pixel coordinates

use crate::{Error, Result};

/// Convert an `OpenCV` dimension (always `i32`) to `u32`
///
/// # Errors
///
/// Returns an error if the value is negative
pub fn i32_to_u32(value: i32) -> Result<u32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Dimension {value} must not be negative")))
}

/// Convert an `image` crate dimension to an `OpenCV` dimension
///
/// # Errors
///
/// Returns an error if the value exceeds `i32::MAX`
pub fn u32_to_i32(value: u32) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Dimension {value} too large to fit in i32")))
}

/// Round and clamp a floating pixel coordinate into `[min, max]`.
///
/// `+inf` maps to `max`; `-inf` and NaN map to `min`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping bounds the value first
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if value.is_nan() {
        return min;
    }

    (value.round().clamp(f64::from(min), f64::from(max)) as i32).clamp(min, max)
}

/// Round a floating box edge to the nearest pixel without clamping to the frame.
#[must_use]
pub fn f32_to_pixel(value: f32) -> i32 {
    f64_to_i32_clamp(f64::from(value), i32::MIN / 2, i32::MAX / 2)
}
