//! Foot pose estimation library for placing a virtual object on a detected foot.
//!
//! This library provides:
//! - ONNX Runtime foot detection with a YOLOv2-style region network
//! - `OpenCV` color segmentation and contour extraction
//! - Principal component analysis for foot orientation
//! - Screen-to-world projection onto a fixed depth plane
//!
//! The estimation pipeline consists of:
//! 1. Capture a frame from a [`frame_source::FrameSource`]
//! 2. Optionally detect a foot bounding box and crop around it
//! 3. Segment the crop in HSV space and keep the largest external contour
//! 4. Estimate centroid and principal axis of that contour
//! 5. Project the centroid into the world and hand it to a [`placement::PlacementSink`]
//!
//! # Examples
//!
//! ## Running the pipeline
//!
//! ```no_run
//! use foot_pose_estimation::{
//!     app::FootPoseApp, config::Config, frame_source::ImageFileSource,
//!     placement::LoggingPlacementSink,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let app = FootPoseApp::from_config(
//!     Config::default(),
//!     ImageFileSource::new("foot.png"),
//!     LoggingPlacementSink::new(),
//! );
//!
//! let report = app.run_pipeline(false).await;
//! if let Some(estimate) = report.estimate() {
//!     println!(
//!         "Foot at ({:.1}, {:.1}), orientation {:.1}°",
//!         estimate.centroid_x, estimate.centroid_y, estimate.orientation_degrees
//!     );
//! }
//! # }
//! ```
//!
//! ## Using the stages directly
//!
//! ```no_run
//! use foot_pose_estimation::{
//!     config::Config, principal_axis, projection, segmentation::{self, HsvRange},
//! };
//! use opencv::{imgcodecs, imgproc, core::Mat, prelude::*};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let bgr = imgcodecs::imread("foot.png", imgcodecs::IMREAD_COLOR)?;
//! let mut rgba = Mat::default();
//! imgproc::cvt_color_def(&bgr, &mut rgba, imgproc::COLOR_BGR2RGBA)?;
//!
//! let mask = segmentation::segment(&rgba, &HsvRange::from(&config.segmentation))?;
//! if let Some(contour) = segmentation::extract_largest_contour(&mask, 100.0)? {
//!     let axis = principal_axis::estimate_contour(&contour, rgba.rows())?;
//!     let frame = projection::CameraFrameContext::new(rgba.cols(), rgba.rows());
//!     let world = projection::project(axis.centroid_x, axis.centroid_y, Some(&frame), &config.projection);
//!     println!("World position: ({:.3}, {:.3}, {:.2})", world.x, world.y, world.z);
//! }
//! # Ok(())
//! # }
//! ```

/// Foot bounding-box detection on ONNX Runtime
pub mod foot_detection;

/// Crop, resize, rotate and reflect
pub mod image_transform;

/// HSV segmentation and contour extraction
pub mod segmentation;

/// Principal-axis orientation estimation
pub mod principal_axis;

/// Screen-to-world projection
pub mod projection;

/// Run-versioned result registers
pub mod slot;

/// Frame sources
pub mod frame_source;

/// Placement state and sinks
pub mod placement;

/// Debug image side-channel
pub mod diagnostics;

/// Utility functions for image conversion and coordinate conventions
pub mod utils;

/// Error types and result handling
pub mod error;

/// Pipeline orchestration
pub mod app;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

/// Command-line arguments for the runner binary
pub mod cli;

pub use error::{Error, Result};
