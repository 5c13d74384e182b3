//! Conversions between `OpenCV` `Mat`, `image` crate buffers and `ndarray` tensors.

use crate::utils::safe_cast::{i32_to_u32, u32_to_i32};
use crate::{Error, Result};
use image::{GrayImage, RgbaImage};
use ndarray::Array4;
use opencv::core::{Mat, Scalar, CV_8U, CV_8UC1, CV_8UC3, CV_8UC4};
use opencv::imgproc;
use opencv::prelude::*;

/// Memory layout of a network input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// Batch, channels, height, width
    Nchw,
    /// Batch, height, width, channels
    Nhwc,
}

/// Copy an RGBA buffer into a `CV_8UC4` `Mat` keeping RGBA channel order
///
/// # Errors
///
/// Returns an error if the dimensions do not fit `OpenCV` or allocation fails
pub fn rgba_image_to_mat(image: &RgbaImage) -> Result<Mat> {
    let rows = u32_to_i32(image.height())?;
    let cols = u32_to_i32(image.width())?;

    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC4, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());

    Ok(mat)
}

/// Copy an RGBA (or RGB / single-channel) `Mat` into an `RgbaImage`
///
/// Three-channel input is treated as RGB and single-channel input as gray.
///
/// # Errors
///
/// Returns an error if the `Mat` is not 8-bit or has an unsupported channel count
pub fn mat_to_rgba_image(mat: &Mat) -> Result<RgbaImage> {
    if mat.depth() != CV_8U {
        return Err(Error::InvalidInput(format!("Expected 8-bit image, got depth {}", mat.depth())));
    }

    let rgba = match mat.channels() {
        4 => mat.try_clone()?,
        3 => {
            let mut converted = Mat::default();
            imgproc::cvt_color_def(mat, &mut converted, imgproc::COLOR_RGB2RGBA)?;
            converted
        }
        1 => {
            let mut converted = Mat::default();
            imgproc::cvt_color_def(mat, &mut converted, imgproc::COLOR_GRAY2RGBA)?;
            converted
        }
        channels => {
            return Err(Error::InvalidInput(format!("Unsupported channel count: {channels}")));
        }
    };

    let width = i32_to_u32(rgba.cols())?;
    let height = i32_to_u32(rgba.rows())?;
    RgbaImage::from_raw(width, height, rgba.data_bytes()?.to_vec())
        .ok_or_else(|| Error::InvalidInput("RGBA buffer size does not match dimensions".to_string()))
}

/// Copy a binary mask into a `GrayImage`
///
/// # Errors
///
/// Returns an error if the mask is not `CV_8UC1`
pub fn mask_to_gray_image(mask: &Mat) -> Result<GrayImage> {
    if mask.typ() != CV_8UC1 {
        return Err(Error::InvalidInput(format!("Expected CV_8UC1 mask, got type {}", mask.typ())));
    }

    // ROI views are not continuous; a deep copy is always packed
    let packed = mask.try_clone()?;
    let width = i32_to_u32(packed.cols())?;
    let height = i32_to_u32(packed.rows())?;
    GrayImage::from_raw(width, height, packed.data_bytes()?.to_vec())
        .ok_or_else(|| Error::InvalidInput("Mask buffer size does not match dimensions".to_string()))
}

/// Build a normalized `[0, 1]` float tensor with batch size 1 from an RGB or RGBA `Mat`.
///
/// The alpha channel, when present, is dropped.
///
/// # Errors
///
/// Returns an error if the image is empty, not 8-bit, or not 3/4 channels
pub fn mat_to_input_tensor(image: &Mat, layout: TensorLayout) -> Result<Array4<f32>> {
    let channels = image.channels();
    if image.empty() || (image.typ() != CV_8UC3 && image.typ() != CV_8UC4) {
        return Err(Error::ModelInputError(format!(
            "Expected non-empty 8-bit RGB/RGBA image, got type {} ({} channels)",
            image.typ(),
            channels
        )));
    }

    let height = i32_to_u32(image.rows())? as usize;
    let width = i32_to_u32(image.cols())? as usize;
    let stride = i32_to_u32(channels)? as usize;

    let packed = image.try_clone()?;
    let bytes = packed.data_bytes()?;

    let shape = match layout {
        TensorLayout::Nchw => (1, 3, height, width),
        TensorLayout::Nhwc => (1, height, width, 3),
    };
    let mut tensor = Array4::<f32>::zeros(shape);

    for row in 0..height {
        for col in 0..width {
            let base = (row * width + col) * stride;
            for ch in 0..3 {
                let value = f32::from(bytes[base + ch]) / 255.0;
                match layout {
                    TensorLayout::Nchw => tensor[[0, ch, row, col]] = value,
                    TensorLayout::Nhwc => tensor[[0, row, col, ch]] = value,
                }
            }
        }
    }

    Ok(tensor)
}
