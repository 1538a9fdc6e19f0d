//! Per-camera tracker registry.
//!
//! One [`Tracker`] per camera key, created on the first update for that key.
//! A single coarse lock guards the map; each tracker has its own lock so
//! updates for different cameras run concurrently while updates for one
//! camera are applied one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::bbox::{BoxFormat, ImageSize};
use crate::tracker::{Tracker, TrackerConfig, TrackerStatistics};
use crate::{Detection, Result, TrackedDetection};

/// Outcome of a registry-wide sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Trackers that were force-cleaned.
    pub swept: usize,
    /// Tracks evicted across all trackers.
    pub evicted_tracks: usize,
    /// Trackers removed from the registry because they held no tracks.
    pub removed_trackers: usize,
}

/// Registry mapping camera keys to trackers.
///
/// Shared between request handlers and the [`Reaper`](crate::Reaper) via `Arc`.
pub struct TrackerRegistry {
    config: TrackerConfig,
    trackers: Mutex<HashMap<String, Arc<Mutex<Tracker>>>>,
}

impl TrackerRegistry {
    /// Create an empty registry. Every tracker it creates uses `config`.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            trackers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Feed one frame for `camera_key`, creating its tracker if needed.
    pub fn update(
        &self,
        camera_key: &str,
        detections: Vec<Detection>,
        frame_id: u64,
        image_size: ImageSize,
    ) -> Result<Vec<TrackedDetection>> {
        self.update_with_format(camera_key, detections, frame_id, image_size, BoxFormat::Auto)
    }

    /// Like [`update`](Self::update), with an explicit coordinate convention.
    pub fn update_with_format(
        &self,
        camera_key: &str,
        detections: Vec<Detection>,
        frame_id: u64,
        image_size: ImageSize,
        format: BoxFormat,
    ) -> Result<Vec<TrackedDetection>> {
        let tracker = self.get_or_create(camera_key)?;
        let mut tracker = tracker.lock();
        tracker.update_with_format(detections, frame_id, image_size, format)
    }

    /// Statistics for `camera_key`, or `None` if the camera is unknown.
    pub fn statistics(&self, camera_key: &str) -> Option<TrackerStatistics> {
        let tracker = self.get(camera_key)?;
        let stats = tracker.lock().statistics();
        Some(stats)
    }

    /// Run a cleanup sweep on one camera's tracker.
    ///
    /// # Returns
    /// Evicted track count, or `None` if the camera is unknown
    pub fn cleanup(&self, camera_key: &str, force: bool) -> Option<usize> {
        let tracker = self.get(camera_key)?;
        let evicted = tracker.lock().cleanup(force);
        Some(evicted)
    }

    /// Force-clean every tracker and drop the ones left without tracks.
    ///
    /// A tracker currently referenced by an in-flight update is kept even
    /// if empty; it is reconsidered on the next sweep.
    pub fn reap(&self) -> ReapReport {
        let mut report = ReapReport::default();
        let mut trackers = self.trackers.lock();

        trackers.retain(|camera_key, tracker| {
            let mut guard = tracker.lock();
            report.swept += 1;
            report.evicted_tracks += guard.cleanup(true);

            // References are only handed out under the registry lock we hold,
            // so a count of one means no handler can be using this tracker.
            let idle = guard.is_empty() && Arc::strong_count(tracker) == 1;
            drop(guard);
            if idle {
                debug!(camera = %camera_key, "removing idle tracker");
                report.removed_trackers += 1;
            }
            !idle
        });

        if report.evicted_tracks > 0 || report.removed_trackers > 0 {
            info!(
                swept = report.swept,
                evicted_tracks = report.evicted_tracks,
                removed_trackers = report.removed_trackers,
                remaining = trackers.len(),
                "reaped trackers"
            );
        }
        report
    }

    /// Number of registered cameras.
    pub fn len(&self) -> usize {
        self.trackers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.lock().is_empty()
    }

    pub fn contains(&self, camera_key: &str) -> bool {
        self.trackers.lock().contains_key(camera_key)
    }

    /// Registered camera keys, sorted.
    pub fn camera_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.trackers.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn get(&self, camera_key: &str) -> Option<Arc<Mutex<Tracker>>> {
        self.trackers.lock().get(camera_key).cloned()
    }

    fn get_or_create(&self, camera_key: &str) -> Result<Arc<Mutex<Tracker>>> {
        let mut trackers = self.trackers.lock();
        if let Some(tracker) = trackers.get(camera_key) {
            return Ok(Arc::clone(tracker));
        }

        debug!(camera = %camera_key, "creating tracker");
        let tracker = Arc::new(Mutex::new(Tracker::new(self.config.clone())?));
        trackers.insert(camera_key.to_string(), Arc::clone(&tracker));
        Ok(tracker)
    }
}
