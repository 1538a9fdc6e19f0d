//! Background sweep of the tracker registry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::registry::TrackerRegistry;
use crate::{Error, Result};

/// Reaper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Seconds between registry sweeps.
    pub period_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { period_secs: 300 }
    }
}

impl ReaperConfig {
    pub fn with_period_secs(mut self, period_secs: u64) -> Self {
        self.period_secs = period_secs;
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Periodically force-cleans every tracker and drops idle ones.
#[derive(Debug, Clone)]
pub struct Reaper {
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(config: ReaperConfig) -> Result<Self> {
        if config.period_secs == 0 {
            return Err(Error::InvalidConfig("reaper period must be non-zero".to_string()));
        }
        Ok(Self { config })
    }

    /// Start sweeping `registry` on the current tokio runtime.
    ///
    /// The first sweep runs one full period after spawning. The task runs
    /// until the returned handle is shut down or dropped.
    pub fn spawn(self, registry: Arc<TrackerRegistry>) -> ReaperHandle {
        let period = self.config.period();
        info!(period_secs = self.config.period_secs, "starting tracker reaper");

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let report = registry.reap();
                debug!(
                    swept = report.swept,
                    removed_trackers = report.removed_trackers,
                    "reaper tick"
                );
            }
        });

        ReaperHandle { handle }
    }
}

/// Owns the running reaper task; aborts it when dropped.
#[derive(Debug)]
pub struct ReaperHandle {
    handle: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        // The task never returns on its own, so this only observes the cancellation
        let _ = (&mut self.handle).await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Detection, ImageSize, TrackerConfig};

    const SIZE: ImageSize = ImageSize { height: 720, width: 1280 };

    fn registry_with_idle_and_busy() -> Arc<TrackerRegistry> {
        let registry = Arc::new(TrackerRegistry::new(TrackerConfig::default()).unwrap());
        registry.update("idle", vec![], 1, SIZE).unwrap();
        registry
            .update("busy", vec![Detection::new("car", 0.9, [0.0, 0.0, 50.0, 50.0])], 1, SIZE)
            .unwrap();
        registry
    }

    #[test]
    fn test_reaper_rejects_zero_period() {
        assert!(Reaper::new(ReaperConfig::default().with_period_secs(0)).is_err());
        assert_eq!(ReaperConfig::default().period(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_sweeps_after_period() {
        let registry = registry_with_idle_and_busy();
        let reaper = Reaper::new(ReaperConfig::default()).unwrap();
        let handle = reaper.spawn(Arc::clone(&registry));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(registry.contains("idle"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!registry.contains("idle"));
        assert!(registry.contains("busy"));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops_on_shutdown() {
        let registry = registry_with_idle_and_busy();
        let handle = Reaper::new(ReaperConfig::default().with_period_secs(10))
            .unwrap()
            .spawn(Arc::clone(&registry));

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(registry.contains("idle"));
    }
}
