//! # objtrack - per-camera object tracking and counting
//!
//! Turns a noisy per-frame detection stream into stable object identities.
//!
//! ## Features
//!
//! - Greedy IoU association, partitioned by class label
//! - De-bounced confirmation (`min_hits`) before a track is reported
//! - At-most-once counting of confirmed objects, surviving track expiry
//! - Frame-age eviction of stale tracks
//! - A registry holding one tracker per camera, and a background reaper
//!   that sweeps it
//! - Traffic density analysis over the reported detections
//!
//! ## Example
//!
//! ```rust,ignore
//! use objtrack::{Detection, ImageSize, TrackerConfig, TrackerRegistry};
//!
//! let registry = TrackerRegistry::new(TrackerConfig::default()).unwrap();
//! let size = ImageSize::new(720, 1280);
//!
//! for frame_id in 1..=3 {
//!     let dets = vec![Detection::new("car", 0.9, [100.0, 100.0, 200.0, 200.0])];
//!     let confirmed = registry.update("cam-1", dets, frame_id, size).unwrap();
//!     println!("frame {}: {:?}", frame_id, confirmed);
//! }
//!
//! let stats = registry.statistics("cam-1").unwrap();
//! assert_eq!(stats.total_confirmed_objects, 1);
//! ```

// Public modules
pub mod analysis;
pub mod bbox;
pub mod detection;
pub mod matching;
pub mod pipeline;
pub mod reaper;
pub mod registry;
pub mod track;
pub mod tracker;

// Re-exports for convenience
pub use analysis::{TrafficAnalysis, TrafficDensity};
pub use bbox::{iou, BBox, BoxFormat, ImageSize};
pub use detection::{Detection, TrackedDetection};
pub use pipeline::{DetectionSink, Detector, Frame, FramePipeline, FrameReport};
pub use reaper::{Reaper, ReaperConfig, ReaperHandle};
pub use registry::{ReapReport, TrackerRegistry};
pub use track::{CountedTrack, Track};
pub use tracker::{Tracker, TrackerConfig, TrackerStatistics};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the tracking library
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid detection: {0}")]
        InvalidDetection(String),

        #[error("Out-of-order frame: last frame was {last}, got {got}")]
        OutOfOrderFrame { last: u64, got: u64 },

        #[error("Detector error: {0}")]
        Detector(String),

        #[error("Sink error: {0}")]
        Sink(String),
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
