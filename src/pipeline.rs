//! Glue between a detector, the tracker registry and a result sink.
//!
//! The crate never touches pixels: a [`Detector`] turns whatever image type
//! the caller uses into [`Detection`]s, and a [`DetectionSink`] receives the
//! tracked result. Transport and decoding live outside.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::{is_traffic_class, TrafficAnalysis};
use crate::bbox::{BoxFormat, ImageSize};
use crate::registry::TrackerRegistry;
use crate::tracker::TrackerStatistics;
use crate::{Detection, Result, TrackedDetection};

/// Produces raw detections for one image.
pub trait Detector {
    type Image;

    fn detect(&mut self, image: &Self::Image) -> Result<Vec<Detection>>;
}

/// Consumes per-frame tracking results.
pub trait DetectionSink {
    fn publish(&mut self, report: &FrameReport) -> Result<()>;
}

/// Collects reports in memory.
impl DetectionSink for Vec<FrameReport> {
    fn publish(&mut self, report: &FrameReport) -> Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

/// One frame as handed over by a frame source.
#[derive(Debug, Clone)]
pub struct Frame<I> {
    pub camera_key: String,
    pub frame_id: u64,
    pub image: I,
    pub image_size: ImageSize,
}

/// Everything published for one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub camera_key: String,
    pub frame_id: u64,
    /// Confirmed, id-annotated detections.
    pub detections: Vec<TrackedDetection>,
    pub analysis: TrafficAnalysis,
    pub statistics: TrackerStatistics,
}

/// Runs detector → filter → tracker → sink for each frame.
pub struct FramePipeline<D> {
    detector: D,

    /// Drop detections below this confidence before tracking.
    pub min_confidence: f64,

    /// Keep only [`TRAFFIC_CLASSES`](crate::analysis::TRAFFIC_CLASSES).
    pub traffic_only: bool,

    /// Coordinate convention of the detector's boxes.
    pub box_format: BoxFormat,
}

impl<D: Detector> FramePipeline<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            min_confidence: 0.25,
            traffic_only: false,
            box_format: BoxFormat::Auto,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_traffic_only(mut self, traffic_only: bool) -> Self {
        self.traffic_only = traffic_only;
        self
    }

    pub fn with_box_format(mut self, box_format: BoxFormat) -> Self {
        self.box_format = box_format;
        self
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Process one frame and publish the result.
    ///
    /// Detector, tracker and sink errors are returned to the caller; they
    /// only affect this frame of this camera.
    pub fn process(
        &mut self,
        registry: &TrackerRegistry,
        frame: &Frame<D::Image>,
        sink: &mut impl DetectionSink,
    ) -> Result<FrameReport> {
        let raw = match self.detector.detect(&frame.image) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(camera = %frame.camera_key, frame_id = frame.frame_id, error = %e, "detector failed");
                return Err(e);
            }
        };
        let raw_count = raw.len();

        let detections: Vec<Detection> = raw
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .filter(|d| !self.traffic_only || is_traffic_class(&d.class_label))
            .collect();

        let tracked = registry.update_with_format(
            &frame.camera_key,
            detections,
            frame.frame_id,
            frame.image_size,
            self.box_format,
        )?;

        let statistics = registry.statistics(&frame.camera_key).unwrap_or_default();
        let report = FrameReport {
            camera_key: frame.camera_key.clone(),
            frame_id: frame.frame_id,
            analysis: TrafficAnalysis::from_detections(&tracked),
            detections: tracked,
            statistics,
        };

        debug!(
            camera = %frame.camera_key,
            frame_id = frame.frame_id,
            raw = raw_count,
            confirmed = report.detections.len(),
            "frame processed"
        );

        sink.publish(&report)?;
        Ok(report)
    }
}
