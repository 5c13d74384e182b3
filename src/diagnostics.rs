//! Debug side-channel holding copies of the last capture, mask and overlay.
//!
//! Everything stored here is a deep copy, so inspecting or exporting it never
//! touches the buffers a pipeline run is working on.

use crate::constants::OVERLAY_MARKER_RADIUS;
use crate::utils::image_conversion::{mask_to_gray_image, mat_to_rgba_image};
use crate::utils::safe_cast::f64_to_i32_clamp;
use crate::Result;
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Last diagnostic images of the pipeline
#[derive(Default)]
pub struct Diagnostics {
    capture: Mutex<Option<Mat>>,
    mask: Mutex<Option<Mat>>,
    overlay: Mutex<Option<Mat>>,
}

fn store(slot: &Mutex<Option<Mat>>, image: Mat) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(image);
}

fn load(slot: &Mutex<Option<Mat>>) -> Result<Option<Mat>> {
    let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match guard.as_ref() {
        Some(image) => Ok(Some(image.try_clone()?)),
        None => Ok(None),
    }
}

impl Diagnostics {
    /// Create an empty side-channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a copy of the captured frame
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails
    pub fn record_capture(&self, capture: &Mat) -> Result<()> {
        store(&self.capture, capture.try_clone()?);
        Ok(())
    }

    /// Keep a copy of the segmentation mask
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails
    pub fn record_mask(&self, mask: &Mat) -> Result<()> {
        store(&self.mask, mask.try_clone()?);
        Ok(())
    }

    /// Draw the centroid (bottom-left origin) as a red dot on a copy of `capture`
    ///
    /// # Errors
    ///
    /// Returns an error if the copy or drawing fails
    pub fn record_overlay(&self, capture: &Mat, centroid_x: f64, centroid_y: f64) -> Result<()> {
        let mut overlay = capture.try_clone()?;
        let rows = overlay.rows();
        let center = Point::new(
            f64_to_i32_clamp(centroid_x, 0, overlay.cols().saturating_sub(1)),
            f64_to_i32_clamp(f64::from(rows) - centroid_y, 0, rows.saturating_sub(1)),
        );

        imgproc::circle(
            &mut overlay,
            center,
            OVERLAY_MARKER_RADIUS,
            Scalar::new(255.0, 0.0, 0.0, 255.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        store(&self.overlay, overlay);
        Ok(())
    }

    /// Copy of the last captured frame
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails
    pub fn last_capture(&self) -> Result<Option<Mat>> {
        load(&self.capture)
    }

    /// Copy of the last segmentation mask
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails
    pub fn last_mask(&self) -> Result<Option<Mat>> {
        load(&self.mask)
    }

    /// Copy of the last centroid overlay
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails
    pub fn last_overlay(&self) -> Result<Option<Mat>> {
        load(&self.overlay)
    }

    /// Write whatever is available as PNG files into `dir`, returning the written paths
    ///
    /// # Errors
    ///
    /// Returns an error if a conversion or write fails
    pub fn save_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        if let Some(capture) = self.last_capture()? {
            let path = dir.join("capture.png");
            mat_to_rgba_image(&capture)?.save(&path)?;
            written.push(path);
        }
        if let Some(mask) = self.last_mask()? {
            let path = dir.join("mask.png");
            mask_to_gray_image(&mask)?.save(&path)?;
            written.push(path);
        }
        if let Some(overlay) = self.last_overlay()? {
            let path = dir.join("overlay.png");
            mat_to_rgba_image(&overlay)?.save(&path)?;
            written.push(path);
        }

        log::info!("Wrote {} diagnostic images to {}", written.len(), dir.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Vec4b, CV_8UC1, CV_8UC4};

    #[test]
    fn test_empty_diagnostics() {
        let diagnostics = Diagnostics::new();
        assert!(diagnostics.last_capture().unwrap().is_none());
        assert!(diagnostics.last_mask().unwrap().is_none());
        assert!(diagnostics.last_overlay().unwrap().is_none());
    }

    #[test]
    fn test_overlay_does_not_touch_capture() {
        let capture = Mat::new_rows_cols_with_default(100, 100, CV_8UC4, Scalar::all(0.0)).unwrap();
        let diagnostics = Diagnostics::new();
        diagnostics.record_capture(&capture).unwrap();
        diagnostics.record_overlay(&capture, 20.0, 30.0).unwrap();

        let overlay = diagnostics.last_overlay().unwrap().unwrap();
        // Bottom-left (20, 30) is row 70
        assert_eq!(*overlay.at_2d::<Vec4b>(70, 20).unwrap(), Vec4b::from([255, 0, 0, 255]));
        assert_eq!(*capture.at_2d::<Vec4b>(70, 20).unwrap(), Vec4b::from([0, 0, 0, 0]));

        let stored = diagnostics.last_capture().unwrap().unwrap();
        assert_eq!(*stored.at_2d::<Vec4b>(70, 20).unwrap(), Vec4b::from([0, 0, 0, 0]));
    }

    #[test]
    fn test_save_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let diagnostics = Diagnostics::new();
        let mask = Mat::new_rows_cols_with_default(8, 8, CV_8UC1, Scalar::all(255.0)).unwrap();
        diagnostics.record_mask(&mask).unwrap();

        let written = diagnostics.save_to_dir(dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("mask.png")]);
        assert!(written[0].exists());
    }
}
