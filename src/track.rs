//! Track state maintained by the tracker.

use std::time::SystemTime;

use serde::Serialize;

use crate::bbox::BBox;

/// A persistent identity for one physical object.
///
/// Owned by its [`Tracker`](crate::Tracker). The class label never changes
/// after creation, so a track only ever matches detections of its own class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    /// Unique within the owning tracker, never reused.
    pub id: u64,

    pub class_label: String,

    /// Most recently matched box, absolute pixels.
    pub bbox: BBox,

    /// Confidence of the most recently matched detection.
    pub confidence: f64,

    /// Frame on which the track was created.
    pub first_frame: u64,

    /// Frame on which the track was last matched.
    pub last_frame: u64,

    /// Number of frames in which the track was matched, starting at 1.
    pub hit_count: u32,
}

impl Track {
    pub(crate) fn new(id: u64, class_label: String, bbox: BBox, confidence: f64, frame_id: u64) -> Self {
        Self {
            id,
            class_label,
            bbox,
            confidence,
            first_frame: frame_id,
            last_frame: frame_id,
            hit_count: 1,
        }
    }

    /// Record a match on `frame_id`.
    pub(crate) fn hit(&mut self, bbox: BBox, confidence: f64, frame_id: u64) {
        self.bbox = bbox;
        self.confidence = confidence;
        self.last_frame = frame_id;
        self.hit_count = self.hit_count.saturating_add(1);
    }

    /// Whether the track has been matched often enough to be reported.
    pub fn is_confirmed(&self, min_hits: u32) -> bool {
        self.hit_count >= min_hits
    }

    /// Frames elapsed since the last match, as seen from `current_frame`.
    pub fn frames_since_update(&self, current_frame: u64) -> u64 {
        current_frame.saturating_sub(self.last_frame)
    }

    /// Frames spanned from creation to the last match.
    pub fn age(&self) -> u64 {
        self.last_frame - self.first_frame
    }
}

/// Ledger entry for a track that reached confirmation.
///
/// Entries outlive the track itself so cumulative counts never double count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountedTrack {
    pub track_id: u64,
    pub class_label: String,
    /// Frame on which the track first passed the confirmation filter.
    pub confirmed_frame: u64,
    /// Wall-clock time of confirmation.
    pub confirmed_at: SystemTime,
}
