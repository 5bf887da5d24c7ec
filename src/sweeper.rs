// src/sweeper.rs
//! Periodic cleanup task for the verdict cache and idle rate-limit windows.
//!
//! The first sweep happens one full period after spawn. Shutdown is
//! observed between ticks; a sweep in progress always completes. Dropping
//! the handle also stops the task.

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Sweep;

/// Longest sweep period a [`CacheSweeper`] accepts.
pub const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub struct CacheSweeper {
    period: Duration,
    targets: Vec<Arc<dyn Sweep>>,
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    sweeps: Arc<AtomicU64>,
    period: Duration,
    task: JoinHandle<()>,
}

impl CacheSweeper {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.clamp(Duration::from_millis(1), MAX_SWEEP_PERIOD),
            targets: Vec::new(),
        }
    }

    pub fn target(mut self, t: Arc<dyn Sweep>) -> Self {
        self.targets.push(t);
        self
    }

    pub fn spawn(self) -> SweeperHandle {
        let (tx, mut rx) = watch::channel(false);
        let sweeps = Arc::new(AtomicU64::new(0));
        let counter_ref = Arc::clone(&sweeps);
        let period = self.period;
        let targets = self.targets;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for t in &targets {
                            let dropped = t.sweep();
                            debug!(target: "sweeper", target_name = t.label(), dropped, "swept");
                        }
                        counter_ref.fetch_add(1, Ordering::Relaxed);
                        counter!("verdict_cache_sweeps_total").increment(1);
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(target: "sweeper", "sweeper stopped");
        });

        SweeperHandle {
            shutdown: tx,
            sweeps,
            period,
            task,
        }
    }
}

impl SweeperHandle {
    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Ask the task to stop after any in-flight sweep.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait for the task to exit.
    pub async fn shutdown_and_wait(self) {
        self.shutdown();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ResultCache, VerdictStore};
    use crate::verdict::BatchReport;

    #[tokio::test(start_paused = true)]
    async fn oversized_period_is_clamped() {
        let handle = CacheSweeper::new(Duration::from_secs(u64::MAX)).spawn();
        assert_eq!(handle.period(), MAX_SWEEP_PERIOD);
        assert!(handle.is_running());
        handle.shutdown_and_wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_sweep_before_first_period() {
        let cache = Arc::new(ResultCache::new());
        cache.put("k", Arc::new(BatchReport::new(vec![]))).unwrap();
        let handle = CacheSweeper::new(Duration::from_secs(3600))
            .target(cache.clone())
            .spawn();

        tokio::time::sleep(Duration::from_secs(3599)).await;
        assert_eq!(handle.sweeps_completed(), 0);
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.sweeps_completed(), 1);
        assert!(cache.is_empty());

        handle.shutdown_and_wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_further_sweeps() {
        let cache = Arc::new(ResultCache::new());
        let handle = CacheSweeper::new(Duration::from_secs(10))
            .target(cache.clone())
            .spawn();
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(handle.sweeps_completed(), 2);
        let sweeps = Arc::clone(&handle.sweeps);
        handle.shutdown_and_wait().await;

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(sweeps.load(Ordering::Relaxed), 2);
    }
}
