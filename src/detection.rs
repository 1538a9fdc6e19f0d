//! Detection structs for input to and output from the tracker.

use serde::{Deserialize, Serialize};

use crate::bbox::{BBox, BoxFormat, ImageSize};
use crate::Result;

/// A raw detection produced by a detector for one frame.
///
/// The bounding box may be normalized to `[0, 1]` or in pixels; the tracker
/// resolves it with a [`BoxFormat`] before any comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label, e.g. `"car"`.
    #[serde(alias = "class_name")]
    pub class_label: String,

    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,

    /// `[x1, y1, x2, y2]`.
    pub bbox: BBox,
}

impl Detection {
    /// Create a new detection.
    pub fn new(class_label: impl Into<String>, confidence: f64, bbox: impl Into<BBox>) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bbox: bbox.into(),
        }
    }

    /// Resolve the box to pixel coordinates and validate it.
    pub fn to_absolute(&self, format: BoxFormat, size: ImageSize) -> Result<BBox> {
        let bbox = self.bbox.to_absolute(format, size);
        bbox.validate()?;
        Ok(bbox)
    }
}

/// A detection that passed confirmation, annotated with its track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedDetection {
    /// Stable identifier of the track this detection was associated with.
    pub track_id: u64,

    pub class_label: String,

    pub confidence: f64,

    /// Absolute pixel coordinates.
    pub bbox: BBox,

    /// Frames in which the track has been matched so far.
    pub hit_count: u32,
}
