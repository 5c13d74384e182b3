//! Utility functions for image conversion and coordinate conventions.

pub mod image_conversion;
pub mod safe_cast;

/// Convert a vertical coordinate between top-left and bottom-left origins.
///
/// The mapping is its own inverse, so it serves both directions.
#[must_use]
pub fn flip_vertical(y: f64, image_height: f64) -> f64 {
    image_height - y
}

/// Convert a bottom-left origin span `[bottom, bottom + height)` to the index
/// of its first row in a top-down image.
#[must_use]
pub fn bottom_span_to_top_row(bottom: i32, height: i32, image_height: i32) -> i32 {
    image_height - (bottom + height)
}
