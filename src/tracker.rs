//! Main tracker implementation.

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::bbox::{BBox, BoxFormat, ImageSize};
use crate::matching::{get_unmatched, iou_matrix, match_detections_in_order};
use crate::track::{CountedTrack, Track};
use crate::{Detection, Error, Result, TrackedDetection};

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// A detection matches a track only if their IoU is strictly above this.
    pub iou_threshold: f64,

    /// Frames a track may go unmatched before a sweep evicts it.
    pub max_age: u64,

    /// Matched frames required before a track is reported and counted.
    pub min_hits: u32,

    /// Wall-clock seconds between opportunistic sweeps during `update`.
    pub cleanup_interval_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_age: 30,
            min_hits: 3,
            cleanup_interval_secs: 60,
        }
    }
}

impl TrackerConfig {
    pub fn with_iou_threshold(mut self, iou_threshold: f64) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    pub fn with_max_age(mut self, max_age: u64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_min_hits(mut self, min_hits: u32) -> Self {
        self.min_hits = min_hits;
        self
    }

    pub fn with_cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Reject configurations under which the tracker cannot work.
    pub fn validate(&self) -> Result<()> {
        if !self.iou_threshold.is_finite() || !(0.0..1.0).contains(&self.iou_threshold) {
            return Err(Error::InvalidConfig(format!(
                "iou_threshold must be in [0, 1), got {}",
                self.iou_threshold
            )));
        }
        if self.min_hits == 0 {
            return Err(Error::InvalidConfig("min_hits must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Aggregate counts for one tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStatistics {
    /// Tracks that ever reached confirmation, including expired ones.
    pub total_confirmed_objects: usize,

    /// `total_confirmed_objects` grouped by class label.
    pub counts_by_class: BTreeMap<String, usize>,

    /// Live tracks, confirmed or not.
    pub active_track_count: usize,
}

/// Object tracker for a single video source.
///
/// Associates each frame's detections with existing tracks by IoU, reports
/// only tracks matched in at least `min_hits` frames, and counts every
/// confirmed track exactly once.
#[derive(Debug)]
pub struct Tracker {
    /// Tracker configuration.
    pub config: TrackerConfig,

    /// Live tracks, ordered by id.
    tracks: BTreeMap<u64, Track>,

    /// Next id to hand out; ids start at 1.
    next_id: u64,

    /// Every track that ever passed confirmation.
    counted: BTreeMap<u64, CountedTrack>,

    /// Highest frame id passed to `update`.
    last_frame_id: Option<u64>,

    last_cleanup: Instant,
}

impl Tracker {
    /// Create a new tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
            counted: BTreeMap::new(),
            last_frame_id: None,
            last_cleanup: Instant::now(),
        })
    }

    /// Update the tracker with one frame of detections.
    ///
    /// Box coordinates are interpreted with [`BoxFormat::Auto`].
    ///
    /// # Arguments
    /// * `detections` - Raw detections for this frame
    /// * `frame_id` - Frame clock; must not decrease between calls
    /// * `image_size` - Used to denormalize normalized boxes
    ///
    /// # Returns
    /// The confirmed detections, annotated with track ids, in input order
    pub fn update(
        &mut self,
        detections: Vec<Detection>,
        frame_id: u64,
        image_size: ImageSize,
    ) -> Result<Vec<TrackedDetection>> {
        self.update_with_format(detections, frame_id, image_size, BoxFormat::Auto)
    }

    /// Like [`update`](Self::update), with an explicit coordinate convention.
    pub fn update_with_format(
        &mut self,
        detections: Vec<Detection>,
        frame_id: u64,
        image_size: ImageSize,
        format: BoxFormat,
    ) -> Result<Vec<TrackedDetection>> {
        if let Some(last) = self.last_frame_id {
            if frame_id < last {
                warn!(last, got = frame_id, "rejecting out-of-order frame");
                return Err(Error::OutOfOrderFrame { last, got: frame_id });
            }
        }
        self.last_frame_id = Some(frame_id);

        // Malformed boxes are dropped one by one; the rest of the frame proceeds
        let mut accepted: Vec<(Detection, BBox)> = Vec::with_capacity(detections.len());
        for det in detections {
            match det.to_absolute(format, image_size) {
                Ok(bbox) => accepted.push((det, bbox)),
                Err(e) => warn!(frame_id, class = %det.class_label, error = %e, "dropping detection"),
            }
        }

        // Only tracks that existed before this frame are candidates
        let matches: Vec<Option<u64>> = {
            let candidates: Vec<&Track> = self.tracks.values().collect();
            let keys: Vec<(&str, BBox)> = accepted
                .iter()
                .map(|(det, bbox)| (det.class_label.as_str(), *bbox))
                .collect();
            let similarity = iou_matrix(&keys, &candidates);
            match_detections_in_order(&similarity, self.config.iou_threshold)
                .into_iter()
                .map(|m| m.map(|j| candidates[j].id))
                .collect()
        };
        trace!(
            frame_id,
            detections = matches.len(),
            unmatched = get_unmatched(&matches).len(),
            "associated detections"
        );

        let mut annotated = Vec::with_capacity(accepted.len());
        for ((det, bbox), matched) in accepted.into_iter().zip(matches) {
            let track_id = match matched {
                Some(id) => {
                    if let Some(track) = self.tracks.get_mut(&id) {
                        track.hit(bbox, det.confidence, frame_id);
                    }
                    id
                }
                None => self.create_track(&det, bbox, frame_id),
            };
            annotated.push((track_id, det, bbox));
        }

        let mut confirmed = Vec::new();
        for (track_id, det, bbox) in annotated {
            let Some(track) = self.tracks.get(&track_id) else {
                continue;
            };
            if !track.is_confirmed(self.config.min_hits) {
                continue;
            }
            let hit_count = track.hit_count;

            if !self.counted.contains_key(&track_id) {
                debug!(track_id, class = %det.class_label, frame_id, "track confirmed");
                self.counted.insert(
                    track_id,
                    CountedTrack {
                        track_id,
                        class_label: track.class_label.clone(),
                        confirmed_frame: frame_id,
                        confirmed_at: SystemTime::now(),
                    },
                );
            }

            confirmed.push(TrackedDetection {
                track_id,
                class_label: det.class_label,
                confidence: det.confidence,
                bbox,
                hit_count,
            });
        }

        self.cleanup(false);

        Ok(confirmed)
    }

    /// Evict tracks unmatched for more than `max_age` frames.
    ///
    /// Unless `force` is set, this is a no-op until `cleanup_interval` has
    /// elapsed since the previous sweep.
    ///
    /// # Returns
    /// Number of evicted tracks
    pub fn cleanup(&mut self, force: bool) -> usize {
        if !force && self.last_cleanup.elapsed() < self.config.cleanup_interval() {
            return 0;
        }
        self.last_cleanup = Instant::now();

        let current_frame = self.current_frame();
        let max_age = self.config.max_age;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, track| track.frames_since_update(current_frame) <= max_age);

        let evicted = before - self.tracks.len();
        if evicted > 0 {
            debug!(evicted, current_frame, remaining = self.tracks.len(), "evicted stale tracks");
        }
        evicted
    }

    /// Snapshot of the counters. Does not mutate the tracker.
    pub fn statistics(&self) -> TrackerStatistics {
        let mut counts_by_class = BTreeMap::new();
        for entry in self.counted.values() {
            *counts_by_class.entry(entry.class_label.clone()).or_insert(0) += 1;
        }

        TrackerStatistics {
            total_confirmed_objects: self.counted.len(),
            counts_by_class,
            active_track_count: self.tracks.len(),
        }
    }

    /// Logical current frame: the newest frame id seen, or the newest
    /// `last_frame` among live tracks if that is higher. 0 before any update.
    pub fn current_frame(&self) -> u64 {
        let newest_track = self.tracks.values().map(|t| t.last_frame).max();
        self.last_frame_id.into_iter().chain(newest_track).max().unwrap_or(0)
    }

    /// Live tracks, ordered by id.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn get_track(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Ledger of confirmed tracks, ordered by id.
    pub fn counted(&self) -> impl Iterator<Item = &CountedTrack> {
        self.counted.values()
    }

    pub fn is_counted(&self, id: u64) -> bool {
        self.counted.contains_key(&id)
    }

    /// Number of tracks ever confirmed.
    pub fn total_object_count(&self) -> usize {
        self.counted.len()
    }

    /// Number of live tracks.
    pub fn current_object_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // Internal: create new track
    fn create_track(&mut self, detection: &Detection, bbox: BBox, frame_id: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        trace!(track_id = id, class = %detection.class_label, frame_id, "new track");
        self.tracks.insert(
            id,
            Track::new(id, detection.class_label.clone(), bbox, detection.confidence, frame_id),
        );
        id
    }
}
