//! Frame sources feeding the pipeline.

use crate::utils::image_conversion::rgba_image_to_mat;
use crate::Result;
use image::RgbaImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use std::path::{Path, PathBuf};

/// External camera or screenshot provider.
///
/// Frames are `CV_8UC4` in RGBA order. `None` means no frame is available right now.
pub trait FrameSource: Send {
    fn capture_frame(&mut self) -> Option<Mat>;
}

/// Reads a still image from disk on every capture
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    /// Create a source for `path`; the file is read lazily on each capture
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<Mat> {
        let path = self.path.to_string_lossy();
        let bgr = imgcodecs::imread(&path, imgcodecs::IMREAD_COLOR)?;
        if bgr.empty() {
            return Ok(bgr);
        }

        let mut rgba = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgba, imgproc::COLOR_BGR2RGBA)?;
        Ok(rgba)
    }
}

impl FrameSource for ImageFileSource {
    fn capture_frame(&mut self) -> Option<Mat> {
        match self.read() {
            Ok(frame) if !frame.empty() => Some(frame),
            Ok(_) => {
                log::warn!("Could not decode image {}", self.path.display());
                None
            }
            Err(e) => {
                log::warn!("Failed to read image {}: {e}", self.path.display());
                None
            }
        }
    }
}

/// Serves copies of one fixed frame
pub struct StillFrameSource {
    frame: Mat,
}

impl StillFrameSource {
    /// Serve `frame`, which must already be RGBA
    #[must_use]
    pub const fn new(frame: Mat) -> Self {
        Self { frame }
    }

    /// Serve a screenshot handed over as an RGBA buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot be converted
    pub fn from_rgba_image(image: &RgbaImage) -> Result<Self> {
        Ok(Self::new(rgba_image_to_mat(image)?))
    }
}

impl FrameSource for StillFrameSource {
    fn capture_frame(&mut self) -> Option<Mat> {
        if self.frame.empty() {
            return None;
        }
        self.frame
            .try_clone()
            .map_err(|e| log::warn!("Failed to copy still frame: {e}"))
            .ok()
    }
}
