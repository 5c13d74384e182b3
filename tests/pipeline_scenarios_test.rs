//! End-to-end pipeline scenarios


use approx::assert_relative_eq;
use foot_pose_estimation::app::{FootPoseApp, PipelineStage};
use foot_pose_estimation::config::Config;
use foot_pose_estimation::foot_detection::{BoundingBox, BoxDetector};
use foot_pose_estimation::frame_source::StillFrameSource;
use foot_pose_estimation::projection::WorldPosition;
use foot_pose_estimation::segmentation::HsvRange;
use foot_pose_estimation::{Error, Result};
use opencv::core::{Mat, Rect, Vec4b};
use opencv::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{
    box_around, create_frame, draw_blue_rect, horizontal_foot_frame, FixedDetector, RecordingSink, ScriptedSource,
};

fn orientation_near_horizontal(degrees: f64) -> bool {
    degrees < 1.0 || degrees > 179.0
}

#[tokio::test]
async fn test_horizontal_rectangle_without_detection() -> Result<()> {
    let sink = RecordingSink::default();
    let app = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(horizontal_foot_frame()?),
        sink.clone(),
        None,
    );

    let report = app.run_pipeline(false).await;
    assert_eq!(
        report.stages,
        vec![
            PipelineStage::Capturing,
            PipelineStage::Cropping,
            PipelineStage::Segmenting,
            PipelineStage::Estimating,
            PipelineStage::Projecting,
            PipelineStage::Idle,
        ]
    );

    let estimate = *report.estimate().expect("run should succeed");
    assert!((estimate.centroid_x - 500.0).abs() < 1.0);
    assert!((estimate.centroid_y - 600.0).abs() < 1.0);
    assert!(orientation_near_horizontal(estimate.orientation_degrees));

    assert_eq!(app.current_estimate(), Some(estimate));
    assert_eq!(sink.count(), 1);

    let (position, orientation) = sink.last().unwrap();
    assert_eq!(position, app.project(estimate.centroid_x, estimate.centroid_y));
    assert_relative_eq!(orientation, estimate.orientation_degrees);
    // Centroid sits 100 px above the frame center
    assert!(position.y > 0.0);
    assert_relative_eq!(position.z, 0.55);

    Ok(())
}

#[tokio::test]
async fn test_empty_detection_keeps_previous_estimate() -> Result<()> {
    let frame = horizontal_foot_frame()?;
    let sink = RecordingSink::default();
    let detector = Arc::new(FixedDetector::new(Vec::new()));
    let app = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(frame),
        sink.clone(),
        Some(detector.clone()),
    );

    let first = app.run_pipeline(false).await;
    assert!(first.is_success());
    let previous = app.current_estimate();

    let report = app.run_pipeline(true).await;
    assert!(matches!(report.outcome, Err(Error::NoDetection)));
    assert_eq!(
        report.stages,
        vec![PipelineStage::Capturing, PipelineStage::Detecting, PipelineStage::Idle]
    );
    assert!(!report.visited(PipelineStage::Segmenting));
    assert_eq!(detector.calls(), 1);

    assert_eq!(app.current_estimate(), previous);
    assert_eq!(sink.count(), 1);
    assert_eq!(app.latest_detections(), Some(Vec::new()));

    Ok(())
}

#[tokio::test]
async fn test_capture_unavailable_aborts() {
    let app = FootPoseApp::new(
        Config::default(),
        ScriptedSource::new(vec![None]),
        RecordingSink::default(),
        None,
    );

    let report = app.run_pipeline(false).await;
    assert!(matches!(report.outcome, Err(Error::CaptureUnavailable)));
    assert_eq!(report.stages, vec![PipelineStage::Capturing, PipelineStage::Idle]);
    assert!(app.current_estimate().is_none());
    assert!(app.camera_context().is_none());
}

#[tokio::test]
async fn test_projection_before_capture_is_origin() {
    let app = FootPoseApp::new(
        Config::default(),
        ScriptedSource::new(Vec::new()),
        RecordingSink::default(),
        None,
    );

    assert_eq!(app.project(0.0, 0.0), WorldPosition::origin(0.55));
    assert_eq!(app.project(812.0, -33.0), WorldPosition::origin(0.55));
}

#[tokio::test]
async fn test_no_target_keeps_previous_estimate() -> Result<()> {
    let sink = RecordingSink::default();
    let app = FootPoseApp::new(
        Config::default(),
        ScriptedSource::new(vec![Some(horizontal_foot_frame()?), Some(create_frame(1000, 1000)?)]),
        sink.clone(),
        None,
    );

    assert!(app.run_pipeline(false).await.is_success());
    let previous = app.current_estimate();

    let report = app.run_pipeline(false).await;
    assert!(matches!(report.outcome, Err(Error::NoTargetFound { .. })));
    assert!(report.visited(PipelineStage::Segmenting));
    assert!(!report.visited(PipelineStage::Estimating));
    assert_eq!(app.current_estimate(), previous);
    assert_eq!(sink.count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_narrowed_hsv_range_excludes_target() -> Result<()> {
    let sink = RecordingSink::default();
    let app = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(horizontal_foot_frame()?),
        sink.clone(),
        None,
    );
    let default_range = app.hsv_range();
    assert!(app.run_pipeline(false).await.is_success());
    let previous = app.current_estimate();

    // Reds and oranges only; the blue target falls outside
    let reds = HsvRange::new([0.0, 40.0, 125.0], [30.0, 255.0, 255.0]);
    app.set_hsv_range(reds);
    assert_eq!(app.hsv_range(), reds);

    let report = app.run_pipeline(false).await;
    assert!(matches!(report.outcome, Err(Error::NoTargetFound { .. })));
    assert_eq!(app.current_estimate(), previous);
    assert_eq!(sink.count(), 1);

    app.set_hsv_range(default_range);
    assert!(app.run_pipeline(false).await.is_success());
    assert_eq!(sink.count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_detected_box_near_edge_is_clamped() -> Result<()> {
    let mut frame = create_frame(480, 640)?;
    let target = Rect::new(0, 420, 80, 40);
    draw_blue_rect(&mut frame, target)?;
    // A far-away distractor that a full-frame run would pick instead
    draw_blue_rect(&mut frame, Rect::new(400, 50, 200, 100))?;

    let detector = Arc::new(FixedDetector::new(vec![box_around(target, 480, 0.8)]));
    let app = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(frame),
        RecordingSink::default(),
        Some(detector),
    );

    let report = app.run_pipeline(true).await;
    let estimate = report.estimate().expect("run should succeed");
    assert!((estimate.centroid_x - 39.5).abs() < 1.0);
    assert!((estimate.centroid_y - (480.0 - 439.5)).abs() < 1.0);
    assert!(orientation_near_horizontal(estimate.orientation_degrees));

    Ok(())
}

#[tokio::test]
async fn test_debug_diagnostics_are_copies() -> Result<()> {
    let mut config = Config::default();
    config.pipeline.debug = true;
    let app = FootPoseApp::new(
        config,
        StillFrameSource::new(horizontal_foot_frame()?),
        RecordingSink::default(),
        None,
    );

    assert!(app.run_pipeline(false).await.is_success());

    let mask = app.diagnostics().last_mask()?.expect("mask recorded");
    assert_eq!((mask.rows(), mask.cols()), (1000, 1000));
    assert_eq!(*mask.at_2d::<u8>(400, 500)?, 255);

    let capture = app.diagnostics().last_capture()?.expect("capture recorded");
    let overlay = app.diagnostics().last_overlay()?.expect("overlay recorded");
    // Marker sits at the centroid, which lies inside the blue rectangle
    assert_eq!(*overlay.at_2d::<Vec4b>(400, 500)?, Vec4b::from([255, 0, 0, 255]));
    assert_eq!(*capture.at_2d::<Vec4b>(400, 500)?, Vec4b::from([0, 0, 255, 255]));

    Ok(())
}

#[tokio::test]
async fn test_diagnostics_empty_without_debug() -> Result<()> {
    let app = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(horizontal_foot_frame()?),
        RecordingSink::default(),
        None,
    );
    assert!(app.run_pipeline(false).await.is_success());
    assert!(app.diagnostics().last_mask()?.is_none());
    assert!(app.diagnostics().last_capture()?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_offloaded_estimation_matches_inline() -> Result<()> {
    let inline = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(horizontal_foot_frame()?),
        RecordingSink::default(),
        None,
    );
    let mut config = Config::default();
    config.pipeline.offload_estimation = true;
    let offloaded = FootPoseApp::new(
        config,
        StillFrameSource::new(horizontal_foot_frame()?),
        RecordingSink::default(),
        None,
    );

    let a = inline.run_pipeline(false).await.outcome?;
    let b = offloaded.run_pipeline(false).await.outcome?;
    assert_eq!(a, b);
    Ok(())
}

#[tokio::test]
async fn test_orientation_correction_swaps_frame_size() -> Result<()> {
    let mut frame = create_frame(300, 500)?;
    draw_blue_rect(&mut frame, Rect::new(100, 100, 120, 30))?;

    let mut config = Config::default();
    config.pipeline.needs_orientation_correction = true;
    let app = FootPoseApp::new(config, StillFrameSource::new(frame), RecordingSink::default(), None);

    let report = app.run_pipeline(false).await;
    let estimate = report.estimate().expect("run should succeed");
    let camera = app.camera_context().unwrap();
    assert_eq!((camera.captured_width, camera.captured_height), (300, 500));
    // A horizontal bar becomes vertical after the quarter turn
    assert!((estimate.orientation_degrees - 90.0).abs() < 1.0);

    Ok(())
}

#[tokio::test]
async fn test_camera_context_is_fixed_by_first_capture() -> Result<()> {
    let mut small = create_frame(200, 300)?;
    draw_blue_rect(&mut small, Rect::new(10, 10, 50, 20))?;
    let app = FootPoseApp::new(
        Config::default(),
        ScriptedSource::new(vec![Some(small), Some(horizontal_foot_frame()?)]),
        RecordingSink::default(),
        None,
    );

    app.run_pipeline(false).await;
    app.run_pipeline(false).await;

    let camera = app.camera_context().unwrap();
    assert_eq!((camera.captured_width, camera.captured_height), (300, 200));
    Ok(())
}

#[tokio::test]
async fn test_reapply_placement_defaults_to_origin() -> Result<()> {
    let sink = RecordingSink::default();
    let app = FootPoseApp::new(
        Config::default(),
        StillFrameSource::new(horizontal_foot_frame()?),
        sink.clone(),
        None,
    );

    app.reapply_placement();
    assert_eq!(sink.last(), Some((WorldPosition::origin(0.55), 90.0)));

    let estimate = app.run_pipeline(false).await.outcome?;
    app.reapply_placement();
    let (_, orientation) = sink.last().unwrap();
    assert_relative_eq!(orientation, estimate.orientation_degrees);
    assert_eq!(sink.count(), 3);
    Ok(())
}

/// Slow on frames tagged with a red value of 1 in the top-left pixel
struct TaggedDetector;

impl BoxDetector for TaggedDetector {
    fn detect(&self, image: &Mat) -> Result<Vec<BoundingBox>> {
        let slow = image.at_2d::<Vec4b>(0, 0)?[0] == 1;
        if slow {
            std::thread::sleep(Duration::from_millis(300));
        }
        Ok(vec![BoundingBox {
            left: 0,
            right: 10,
            top: if slow { 10 } else { 20 },
            bottom: 0,
            confidence: if slow { 0.1 } else { 0.9 },
        }])
    }
}

#[tokio::test]
async fn test_stale_background_detection_is_discarded() -> Result<()> {
    let mut slow_frame = create_frame(100, 100)?;
    *slow_frame.at_2d_mut::<Vec4b>(0, 0)? = Vec4b::from([1, 0, 0, 255]);
    let fast_frame = create_frame(100, 100)?;

    let app = FootPoseApp::new(
        Config::default(),
        ScriptedSource::new(vec![Some(slow_frame), Some(fast_frame)]),
        RecordingSink::default(),
        Some(Arc::new(TaggedDetector)),
    );

    let task = app.spawn_detection()?;
    assert_eq!(task.run_id(), 1);

    // Newer run publishes its boxes while the background detection is still busy
    let report = app.run_pipeline(true).await;
    assert_eq!(report.run_id, 2);
    assert!(report.visited(PipelineStage::Detecting));

    let stale = task.wait().await?;
    assert_eq!(stale[0].top, 10);

    let latest = app.latest_detections().unwrap();
    assert_eq!(latest[0].top, 20);
    Ok(())
}
