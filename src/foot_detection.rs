//! Foot bounding-box detection with a YOLOv2-style region network on ONNX Runtime.

use crate::config::DetectionConfig;
use crate::image_transform::{self, CropRegion};
use crate::utils::image_conversion::{mat_to_input_tensor, TensorLayout};
use crate::utils::safe_cast::f32_to_pixel;
use crate::{Error, Result};
use ndarray::CowArray;
use opencv::core::Mat;
use opencv::prelude::*;
use ort::{Environment, Session, SessionBuilder, Value};
use std::path::Path;
use std::sync::Arc;

/// Detected box in frame pixels with a bottom-left origin.
///
/// `left < right` and `bottom < top`. Boxes may extend past the frame edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
    /// Objectness times best class probability
    pub confidence: f32,
}

impl BoundingBox {
    /// Horizontal extent in pixels
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    /// Vertical extent in pixels
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.top - self.bottom
    }

    /// Grow the box by `margin` pixels on each side
    #[must_use]
    pub const fn expanded(&self, margin: i32) -> Self {
        Self {
            left: self.left.saturating_sub(margin),
            right: self.right.saturating_add(margin),
            top: self.top.saturating_add(margin),
            bottom: self.bottom.saturating_sub(margin),
            confidence: self.confidence,
        }
    }

    /// Region suitable for `image_transform::crop` with `RectOrigin::BottomLeft`
    #[must_use]
    pub const fn to_crop_region(&self) -> CropRegion {
        CropRegion::new(self.left, self.bottom, self.width(), self.height())
    }
}

/// Anything that can locate feet in a captured RGBA frame
pub trait BoxDetector: Send + Sync {
    /// Return candidate boxes sorted by descending confidence; may be empty
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails
    fn detect(&self, image: &Mat) -> Result<Vec<BoundingBox>>;
}

/// Candidate box in network input pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
struct RegionBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl RegionBox {
    fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2, self.score].iter().all(|v| v.is_finite())
    }

    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Decodes the raw region-layer tensor into boxes
#[derive(Debug, Clone)]
struct RegionDecoder {
    input_size: i32,
    anchors: Vec<(f32, f32)>,
    num_classes: usize,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl RegionDecoder {
    fn new(config: &DetectionConfig) -> Self {
        Self {
            input_size: config.input_size,
            anchors: config.anchors.clone(),
            num_classes: config.num_classes,
            confidence_threshold: config.confidence_threshold,
            nms_threshold: config.nms_threshold,
        }
    }

    const fn fields(&self) -> usize {
        5 + self.num_classes
    }

    /// Decode an output of shape `[1, A*(5+C), G, G]` or `[1, G, G, A*(5+C)]`
    #[allow(clippy::cast_precision_loss)] // Grid indices are tiny
    fn decode(&self, data: &[f32], shape: &[usize]) -> Result<Vec<RegionBox>> {
        let depth = self.anchors.len() * self.fields();
        let (channels_first, grid_h, grid_w) = match shape {
            [1, c, h, w] if *c == depth => (true, *h, *w),
            [1, h, w, c] if *c == depth => (false, *h, *w),
            _ => {
                return Err(Error::ModelDataFormatError(format!(
                    "Region output shape {shape:?} does not match {} anchors x {} fields",
                    self.anchors.len(),
                    self.fields()
                )));
            }
        };
        if data.len() != depth * grid_h * grid_w || grid_w == 0 || grid_h == 0 {
            return Err(Error::ModelDataFormatError(format!(
                "Region output holds {} values, expected {}",
                data.len(),
                depth * grid_h * grid_w
            )));
        }

        let cell_w = self.input_size as f32 / grid_w as f32;
        let cell_h = self.input_size as f32 / grid_h as f32;
        let at = |anchor: usize, field: usize, cy: usize, cx: usize| -> f32 {
            let channel = anchor * self.fields() + field;
            if channels_first {
                data[(channel * grid_h + cy) * grid_w + cx]
            } else {
                data[(cy * grid_w + cx) * depth + channel]
            }
        };

        let mut boxes = Vec::new();
        let mut class_scores = vec![0.0f32; self.num_classes];

        for cy in 0..grid_h {
            for cx in 0..grid_w {
                for (anchor, &(anchor_w, anchor_h)) in self.anchors.iter().enumerate() {
                    let objectness = sigmoid(at(anchor, 4, cy, cx));
                    if objectness < self.confidence_threshold {
                        continue;
                    }

                    for (class, score) in class_scores.iter_mut().enumerate() {
                        *score = at(anchor, 5 + class, cy, cx);
                    }
                    let best_class_prob = softmax_max(&class_scores);
                    let score = objectness * best_class_prob;
                    if score < self.confidence_threshold {
                        continue;
                    }

                    let center_x = (cx as f32 + sigmoid(at(anchor, 0, cy, cx))) * cell_w;
                    let center_y = (cy as f32 + sigmoid(at(anchor, 1, cy, cx))) * cell_h;
                    let width = at(anchor, 2, cy, cx).exp() * anchor_w * cell_w;
                    let height = at(anchor, 3, cy, cx).exp() * anchor_h * cell_h;

                    let region = RegionBox {
                        x1: center_x - width / 2.0,
                        y1: center_y - height / 2.0,
                        x2: center_x + width / 2.0,
                        y2: center_y + height / 2.0,
                        score,
                    };
                    if !region.is_finite() {
                        log::debug!("Dropping non-finite region at cell ({cy}, {cx}), anchor {anchor}");
                        continue;
                    }
                    boxes.push(region);
                }
            }
        }

        Ok(self.nms(boxes))
    }

    /// Greedy non-maximum suppression; output is sorted by descending score
    fn nms(&self, mut boxes: Vec<RegionBox>) -> Vec<RegionBox> {
        boxes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut keep: Vec<RegionBox> = Vec::new();
        for candidate in boxes {
            if keep.iter().all(|kept| kept.iou(&candidate) <= self.nms_threshold) {
                keep.push(candidate);
            }
        }
        keep
    }
}

/// Largest softmax probability over `logits`
fn softmax_max(logits: &[f32]) -> f32 {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return 0.0;
    }
    let sum: f32 = logits.iter().map(|&l| (l - max).exp()).sum();
    1.0 / sum
}

/// Map a network-space box onto a `frame_width` x `frame_height` frame with a bottom-left origin
#[allow(clippy::cast_precision_loss)]
fn to_frame_box(region: &RegionBox, input_size: i32, frame_width: i32, frame_height: i32) -> BoundingBox {
    let scale_x = frame_width as f32 / input_size as f32;
    let scale_y = frame_height as f32 / input_size as f32;

    BoundingBox {
        left: f32_to_pixel(region.x1 * scale_x),
        right: f32_to_pixel(region.x2 * scale_x),
        top: frame_height - f32_to_pixel(region.y1 * scale_y),
        bottom: frame_height - f32_to_pixel(region.y2 * scale_y),
        confidence: region.score,
    }
}

/// Map decoded regions onto the frame, dropping boxes that round to zero extent
fn frame_boxes(regions: &[RegionBox], input_size: i32, frame_width: i32, frame_height: i32) -> Vec<BoundingBox> {
    regions
        .iter()
        .map(|region| to_frame_box(region, input_size, frame_width, frame_height))
        .filter(|bbox| bbox.width() > 0 && bbox.height() > 0)
        .collect()
}

/// Foot detector backed by an ONNX Runtime session
pub struct FootDetector {
    session: Session,
    layout: TensorLayout,
    decoder: RegionDecoder,
}

impl FootDetector {
    /// Load the network from an ONNX file
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the runtime rejects the model
    pub fn from_file<P: AsRef<Path>>(model_path: P, config: &DetectionConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        log::info!("Loading foot detector from {}", model_path.display());

        let session = Self::builder()
            .and_then(|builder| builder.with_model_from_file(model_path))
            .map_err(|e| Error::ConfigError(format!("Failed to load foot detector {}: {e}", model_path.display())))?;

        Self::from_session(session, config)
    }

    /// Load the network from a weights blob held in memory
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the blob is not a model the runtime accepts
    pub fn from_bytes(model_bytes: &[u8], config: &DetectionConfig) -> Result<Self> {
        log::info!("Loading foot detector from {} byte blob", model_bytes.len());

        let session = Self::builder()
            .and_then(|builder| builder.with_model_from_memory(model_bytes))
            .map_err(|e| Error::ConfigError(format!("Failed to load foot detector weights: {e}")))?;

        Self::from_session(session, config)
    }

    fn builder() -> std::result::Result<SessionBuilder, ort::OrtError> {
        let environment = Arc::new(
            Environment::builder()
                .with_name("foot_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        SessionBuilder::new(&environment)?.with_optimization_level(ort::GraphOptimizationLevel::Level3)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_session(session: Session, config: &DetectionConfig) -> Result<Self> {
        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| Error::ConfigError("Foot detector has no inputs".to_string()))?;

        let dims: Vec<Option<usize>> = input_meta.dimensions.iter().map(|d| d.map(|v| v as usize)).collect();
        let layout = match dims.as_slice() {
            [_, Some(3), _, _] => TensorLayout::Nchw,
            [_, _, _, Some(3)] => TensorLayout::Nhwc,
            _ => {
                log::warn!("Cannot infer tensor layout from input dims {dims:?}, assuming NCHW");
                TensorLayout::Nchw
            }
        };

        if session.outputs.is_empty() {
            return Err(Error::ConfigError("Foot detector has no outputs".to_string()));
        }

        log::info!(
            "Foot detector ready: input '{}' {:?} ({layout:?}), {} anchors, {} classes",
            input_meta.name,
            dims,
            config.anchors.len(),
            config.num_classes
        );

        Ok(Self {
            session,
            layout,
            decoder: RegionDecoder::new(config),
        })
    }

    fn forward(&self, image: &Mat) -> Result<(Vec<f32>, Vec<usize>)> {
        let input_size = self.decoder.input_size;
        let resized = image_transform::resize(image, input_size, input_size)?;
        let inputs = mat_to_input_tensor(&resized, self.layout)?;
        drop(resized);

        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let output = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("Foot detector produced no output".to_string()))?;

        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        Ok((view.iter().copied().collect(), view.shape().to_vec()))
    }
}

impl BoxDetector for FootDetector {
    fn detect(&self, image: &Mat) -> Result<Vec<BoundingBox>> {
        if image.empty() {
            return Err(Error::InvalidInput("Cannot detect on an empty image".to_string()));
        }

        let (data, shape) = self.forward(image)?;
        let regions = self.decoder.decode(&data, &shape)?;

        let boxes = frame_boxes(&regions, self.decoder.input_size, image.cols(), image.rows());

        log::debug!("Detected {} foot boxes ({} regions decoded)", boxes.len(), regions.len());
        Ok(boxes)
    }
}
