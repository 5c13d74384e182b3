//! Pipeline orchestration for foot pose estimation.
//!
//! One run walks `Idle → Capturing → (Detecting) → Cropping → Segmenting →
//! Estimating → Projecting → Idle`. Runs may overlap; shared results go through
//! [`LatestSlot`] registers tagged with the run id.

use crate::config::Config;
use crate::constants::DEFAULT_ORIENTATION_DEGREES;
use crate::diagnostics::Diagnostics;
use crate::foot_detection::{BoundingBox, BoxDetector, FootDetector};
use crate::frame_source::FrameSource;
use crate::image_transform::{self, clamp_region, CropRegion, RectOrigin};
use crate::placement::{Placement, PlacementSink};
use crate::principal_axis::{self, PoseEstimate};
use crate::projection::{self, CameraFrameContext, WorldPosition};
use crate::segmentation::{self, HsvRange};
use crate::slot::LatestSlot;
use crate::{Error, Result};
use log::{debug, error, info, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Capturing,
    Detecting,
    Cropping,
    Segmenting,
    Estimating,
    Projecting,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Detecting => "detecting",
            Self::Cropping => "cropping",
            Self::Segmenting => "segmenting",
            Self::Estimating => "estimating",
            Self::Projecting => "projecting",
        };
        f.write_str(name)
    }
}

/// What happened during one pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    /// Sequence number of the run
    pub run_id: u64,
    /// States visited in order, ending in `Idle`
    pub stages: Vec<PipelineStage>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// The new estimate, or why the run aborted
    pub outcome: Result<PoseEstimate>,
}

impl PipelineReport {
    /// Whether the run produced a new estimate
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The new estimate, if any
    #[must_use]
    pub fn estimate(&self) -> Option<&PoseEstimate> {
        self.outcome.as_ref().ok()
    }

    /// Whether the run passed through `stage`
    #[must_use]
    pub fn visited(&self, stage: PipelineStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Background detection started by [`FootPoseApp::spawn_detection`]
pub struct DetectionTask {
    run_id: u64,
    handle: JoinHandle<Result<Vec<BoundingBox>>>,
}

impl DetectionTask {
    /// Run id the detection result is published under
    #[must_use]
    pub const fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Wait for the detection to finish
    ///
    /// # Errors
    ///
    /// Returns the detector's error, or `Error::TaskJoin` if the worker died
    pub async fn wait(self) -> Result<Vec<BoundingBox>> {
        self.handle.await?
    }
}

/// Foot pose pipeline orchestrator
pub struct FootPoseApp {
    config: Config,
    hsv_range: RwLock<HsvRange>,
    source: Mutex<Box<dyn FrameSource>>,
    sink: Mutex<Box<dyn PlacementSink>>,
    detector: Option<Arc<dyn BoxDetector>>,
    camera: OnceLock<CameraFrameContext>,
    next_run: AtomicU64,
    detections: Arc<LatestSlot<Vec<BoundingBox>>>,
    placement: LatestSlot<Placement>,
    diagnostics: Diagnostics,
}

impl FootPoseApp {
    /// Create an orchestrator around the given collaborators
    pub fn new(
        config: Config,
        source: impl FrameSource + 'static,
        sink: impl PlacementSink + 'static,
        detector: Option<Arc<dyn BoxDetector>>,
    ) -> Self {
        info!(
            "Initializing foot pose pipeline (neural detection {})",
            if detector.is_some() { "available" } else { "unavailable" }
        );

        Self {
            hsv_range: RwLock::new(HsvRange::from(&config.segmentation)),
            config,
            source: Mutex::new(Box::new(source)),
            sink: Mutex::new(Box::new(sink)),
            detector,
            camera: OnceLock::new(),
            next_run: AtomicU64::new(0),
            detections: Arc::new(LatestSlot::new()),
            placement: LatestSlot::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Create an orchestrator, loading the detector named in the configuration
    pub fn from_config(config: Config, source: impl FrameSource + 'static, sink: impl PlacementSink + 'static) -> Self {
        let detector = Self::load_detector(&config);
        Self::new(config, source, sink, detector)
    }

    /// Load the configured foot detector.
    ///
    /// A model the runtime rejects is logged as an error and yields `None`, so
    /// the pipeline keeps running without neural detection.
    #[must_use]
    pub fn load_detector(config: &Config) -> Option<Arc<dyn BoxDetector>> {
        let path = config.model.detector.as_ref()?;
        match FootDetector::from_file(path, &config.detection) {
            Ok(detector) => Some(Arc::new(detector)),
            Err(e) => {
                error!("Foot detector unavailable, falling back to color segmentation only: {e}");
                None
            }
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Whether neural detection can be used
    #[must_use]
    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Color range used by subsequent segmentation stages
    #[must_use]
    pub fn hsv_range(&self) -> HsvRange {
        *self.hsv_range.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the segmentation color range; runs already in progress keep the old one
    pub fn set_hsv_range(&self, range: HsvRange) {
        info!("HSV range set to {:?} - {:?}", range.lower, range.upper);
        *self.hsv_range.write().unwrap_or_else(PoisonError::into_inner) = range;
    }

    /// Captured frame size, known after the first successful capture
    #[must_use]
    pub fn camera_context(&self) -> Option<CameraFrameContext> {
        self.camera.get().copied()
    }

    /// Latest placement published by any run
    #[must_use]
    pub fn current_placement(&self) -> Option<Placement> {
        self.placement.latest()
    }

    /// Latest successful estimate
    #[must_use]
    pub fn current_estimate(&self) -> Option<PoseEstimate> {
        self.placement.latest().map(|p| p.estimate)
    }

    /// Latest detection result from a run or a background detection
    #[must_use]
    pub fn latest_detections(&self) -> Option<Vec<BoundingBox>> {
        self.detections.latest()
    }

    /// Debug images; only filled while `pipeline.debug` is set
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Project a screen position using the session's camera frame
    #[must_use]
    pub fn project(&self, screen_x: f64, screen_y: f64) -> WorldPosition {
        projection::project(screen_x, screen_y, self.camera.get(), &self.config.projection)
    }

    /// Send the current placement to the sink again.
    ///
    /// Before any successful run this places the object at the lateral origin
    /// with the default orientation.
    pub fn reapply_placement(&self) {
        let (position, orientation) = match self.placement.latest() {
            Some(placement) => (placement.position, placement.estimate.orientation_degrees),
            None => (
                WorldPosition::origin(self.config.projection.depth_plane),
                DEFAULT_ORIENTATION_DEGREES,
            ),
        };
        self.apply(position, orientation);
    }

    /// Capture a frame and detect feet on a background worker.
    ///
    /// The result is published to [`Self::latest_detections`] when it lands,
    /// unless a newer run published first.
    ///
    /// # Errors
    ///
    /// Returns `Error::ModelError` without a detector and
    /// `Error::CaptureUnavailable` when no frame could be captured
    pub fn spawn_detection(&self) -> Result<DetectionTask> {
        let detector = self
            .detector
            .clone()
            .ok_or_else(|| Error::ModelError("No foot detector loaded".to_string()))?;

        let run_id = self.next_run_id();
        let frame = self.capture()?;
        let slot = Arc::clone(&self.detections);

        debug!("Run {run_id}: background detection started");
        let handle = tokio::task::spawn_blocking(move || -> Result<Vec<BoundingBox>> {
            let started = Instant::now();
            let boxes = detector.detect(&frame)?;
            drop(frame);
            debug!(
                "Run {run_id}: background detection found {} boxes in {:.3}s",
                boxes.len(),
                started.elapsed().as_secs_f64()
            );
            slot.publish(run_id, boxes.clone());
            Ok(boxes)
        });

        Ok(DetectionTask { run_id, handle })
    }

    /// Run the pipeline once.
    ///
    /// Never fails outright: aborted runs are logged and leave the previous
    /// estimate current; the report tells what happened.
    pub async fn run_pipeline(&self, use_neural_detection: bool) -> PipelineReport {
        let run_id = self.next_run_id();
        let started = Instant::now();
        let mut stages = Vec::new();

        let outcome = self.execute(run_id, use_neural_detection, &mut stages).await;

        stages.push(PipelineStage::Idle);
        let elapsed = started.elapsed();

        match &outcome {
            Ok(estimate) => info!(
                "Run {run_id} finished in {:.3}s: centroid ({:.1}, {:.1}), orientation {:.1}°",
                elapsed.as_secs_f64(),
                estimate.centroid_x,
                estimate.centroid_y,
                estimate.orientation_degrees
            ),
            Err(e) if e.is_recoverable() => warn!(
                "Run {run_id} aborted after {:.3}s, keeping previous estimate: {e}",
                elapsed.as_secs_f64()
            ),
            Err(e) => warn!(
                "Run {run_id} failed after {:.3}s in {} stage, keeping previous estimate: {e}",
                elapsed.as_secs_f64(),
                stages.iter().rev().nth(1).copied().unwrap_or(PipelineStage::Idle)
            ),
        }

        PipelineReport {
            run_id,
            stages,
            elapsed,
            outcome,
        }
    }

    async fn execute(
        &self,
        run_id: u64,
        use_neural_detection: bool,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<PoseEstimate> {
        let debug_enabled = self.config.pipeline.debug;
        let hsv_range = self.hsv_range();

        stages.push(PipelineStage::Capturing);
        let frame = self.capture()?;
        let camera = *self.camera.get_or_init(|| {
            info!("Camera frame size fixed at {}x{}", frame.cols(), frame.rows());
            CameraFrameContext::new(frame.cols(), frame.rows())
        });
        if debug_enabled {
            self.diagnostics.record_capture(&frame)?;
        }

        let detector = match (&self.detector, use_neural_detection) {
            (Some(detector), true) => Some(Arc::clone(detector)),
            (None, true) => {
                warn!("Run {run_id}: neural detection requested but no detector is loaded");
                None
            }
            (_, false) => None,
        };

        let (region, margin) = match detector {
            Some(detector) => {
                stages.push(PipelineStage::Detecting);
                let best = self.detect(run_id, detector, &frame).await?;
                (best.expanded(self.config.detection.detection_crop_margin).to_crop_region(), 0)
            }
            None => (
                CropRegion::full(frame.cols(), frame.rows()),
                self.config.detection.crop_margin,
            ),
        };

        stages.push(PipelineStage::Cropping);
        let clamped = clamp_region(frame.cols(), frame.rows(), region, margin, margin).ok_or(Error::NoDetection)?;
        let cropped = image_transform::crop(&frame, clamped, RectOrigin::BottomLeft, 0, 0)?;
        debug!("Run {run_id}: cropped {clamped:?}");

        stages.push(PipelineStage::Segmenting);
        let min_area = self.config.segmentation.min_contour_area;
        let mask = segmentation::segment(&cropped, &hsv_range)?;
        if debug_enabled {
            self.diagnostics.record_mask(&mask)?;
        }
        let contour = segmentation::extract_largest_contour(&mask, min_area)?.ok_or(Error::NoTargetFound { min_area })?;
        let crop_rows = cropped.rows();
        drop(mask);
        drop(cropped);
        debug!(
            "Run {run_id}: largest contour has {} points, area {:.1}",
            contour.points.len(),
            contour.area
        );

        stages.push(PipelineStage::Estimating);
        let axis = if self.config.pipeline.offload_estimation {
            tokio::task::spawn_blocking(move || principal_axis::estimate_contour(&contour, crop_rows)).await??
        } else {
            principal_axis::estimate_contour(&contour, crop_rows)?
        };
        let estimate = PoseEstimate::from_axis(&axis, f64::from(clamped.x), f64::from(clamped.y));
        if debug_enabled {
            self.diagnostics
                .record_overlay(&frame, estimate.centroid_x, estimate.centroid_y)?;
        }
        drop(frame);

        stages.push(PipelineStage::Projecting);
        let position = projection::project(
            estimate.centroid_x,
            estimate.centroid_y,
            Some(&camera),
            &self.config.projection,
        );
        let placement = Placement { estimate, position };
        if self.placement.publish(run_id, placement) {
            self.apply(position, estimate.orientation_degrees);
        } else if let Some(newer) = self.placement.version() {
            debug!("Run {run_id}: placement superseded by run {newer}, not applied");
        }

        Ok(estimate)
    }

    async fn detect(&self, run_id: u64, detector: Arc<dyn BoxDetector>, frame: &Mat) -> Result<BoundingBox> {
        let input = frame.try_clone()?;
        let boxes = tokio::task::spawn_blocking(move || detector.detect(&input)).await??;
        debug!("Run {run_id}: detector returned {} boxes", boxes.len());

        self.detections.publish(run_id, boxes.clone());
        boxes.into_iter().next().ok_or(Error::NoDetection)
    }

    fn capture(&self) -> Result<Mat> {
        let frame = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture_frame();
        frame.filter(|f| !f.empty()).ok_or(Error::CaptureUnavailable).and_then(|f| {
            image_transform::correct_orientation(&f, self.config.pipeline.needs_orientation_correction)
        })
    }

    fn apply(&self, position: WorldPosition, orientation_degrees: f64) {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_pose(position, orientation_degrees);
    }

    fn next_run_id(&self) -> u64 {
        self.next_run.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::StillFrameSource;
    use crate::placement::LoggingPlacementSink;
    use opencv::core::{Rect, Scalar, CV_8UC4};
    use opencv::imgproc;

    struct FixedDetector(Vec<BoundingBox>);

    impl BoxDetector for FixedDetector {
        fn detect(&self, _image: &Mat) -> Result<Vec<BoundingBox>> {
            Ok(self.0.clone())
        }
    }

    fn frame_with_rect(rows: i32, cols: i32, rect: Rect) -> Mat {
        let mut frame = Mat::new_rows_cols_with_default(rows, cols, CV_8UC4, Scalar::new(0.0, 0.0, 0.0, 255.0)).unwrap();
        imgproc::rectangle(&mut frame, rect, Scalar::new(0.0, 0.0, 255.0, 255.0), imgproc::FILLED, imgproc::LINE_8, 0)
            .unwrap();
        frame
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Segmenting.to_string(), "segmenting");
    }

    #[tokio::test]
    async fn test_detected_box_crop_offsets_centroid() {
        // Rectangle spans columns 200..260 and top-down rows 100..120
        let frame = frame_with_rect(400, 400, Rect::new(200, 100, 60, 20));
        let detector = FixedDetector(vec![BoundingBox {
            left: 190,
            right: 270,
            top: 310,
            bottom: 270,
            confidence: 0.9,
        }]);
        let app = FootPoseApp::new(
            Config::default(),
            StillFrameSource::new(frame),
            LoggingPlacementSink::new(),
            Some(Arc::new(detector)),
        );

        let report = app.run_pipeline(true).await;
        let estimate = report.estimate().unwrap();
        assert!(report.visited(PipelineStage::Detecting));
        assert!((estimate.centroid_x - 229.5).abs() < 1.0);
        assert!((estimate.centroid_y - (400.0 - 109.5)).abs() < 1.0);
        assert_eq!(app.latest_detections().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_detector_falls_back_to_full_frame() {
        let frame = frame_with_rect(200, 300, Rect::new(50, 50, 40, 20));
        let app = FootPoseApp::new(Config::default(), StillFrameSource::new(frame), LoggingPlacementSink::new(), None);

        let report = app.run_pipeline(true).await;
        assert!(report.is_success());
        assert!(!report.visited(PipelineStage::Detecting));
        assert_eq!(report.stages.last(), Some(&PipelineStage::Idle));
    }

    #[tokio::test]
    async fn test_spawn_detection_requires_detector() {
        let app = FootPoseApp::new(
            Config::default(),
            StillFrameSource::new(Mat::default()),
            LoggingPlacementSink::new(),
            None,
        );
        assert!(matches!(app.spawn_detection(), Err(Error::ModelError(_))));
    }
}
