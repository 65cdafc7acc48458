//! Background expiry sweeper
//!
//! A single tokio task sleeps for the configured interval and then runs one
//! cleanup pass. The stop signal only interrupts the sleep, so a pass that has
//! started always runs to completion.

use crate::Result;
use crate::database::Database;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Something the sweeper can purge expired rows from
#[async_trait]
pub trait Sweepable: Send + Sync {
    /// Remove expired rows, returning how many were deleted
    async fn sweep(&self) -> Result<u64>;
}

#[async_trait]
impl Sweepable for Database {
    async fn sweep(&self) -> Result<u64> {
        Ok(self.cleanup_expired().await?.total())
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic cleanup task with an explicit start/stop lifecycle
pub struct ExpirySweeper {
    target: Arc<dyn Sweepable>,
    interval: Duration,
    grace: Duration,
    state: Mutex<Option<Running>>,
}

impl ExpirySweeper {
    pub fn new(target: Arc<dyn Sweepable>, interval: Duration, grace: Duration) -> Self {
        Self {
            target,
            interval,
            grace,
            state: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the sweep loop; returns `false` if it was already running
    pub async fn start(&self) -> bool {
        let mut state = self.state.lock().await;
        if let Some(running) = state.as_ref()
            && !running.handle.is_finished()
        {
            log::warn!("Expiry sweeper already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sweep_loop(self.target.clone(), self.interval, stop_rx));
        *state = Some(Running { stop_tx, handle });

        log::info!(
            "Expiry sweeper started (interval {}s)",
            self.interval.as_secs()
        );
        true
    }

    /// Signal the loop and wait up to the grace period for it to exit
    ///
    /// Returns `false` if the sweeper was not running. The task is left to
    /// finish on its own when it outlives the grace period.
    pub async fn stop(&self) -> bool {
        // Held until the join finishes so a concurrent start waits for it
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            return false;
        };

        let _ = running.stop_tx.send(true);
        match tokio::time::timeout(self.grace, running.handle).await {
            Ok(Ok(())) => log::info!("Expiry sweeper stopped"),
            Ok(Err(e)) => log::error!("Expiry sweeper task failed: {e}"),
            Err(_) => log::warn!(
                "Expiry sweeper did not stop within {:?}; detaching",
                self.grace
            ),
        }
        true
    }

    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

async fn sweep_loop(
    target: Arc<dyn Sweepable>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                // A dropped sender also means stop
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match target.sweep().await {
            Ok(0) => log::debug!("Expiry sweep found nothing to remove"),
            Ok(removed) => log::debug!("Expiry sweep removed {removed} entries"),
            Err(e) => log::error!("Expiry sweep failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingTarget {
        calls: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl Sweepable for CountingTarget {
        async fn sweep(&self) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::query("cleanup_expired", "disk I/O error").into());
            }
            Ok(0)
        }
    }

    struct SlowTarget {
        finished: AtomicU64,
    }

    #[async_trait]
    impl Sweepable for SlowTarget {
        async fn sweep(&self) -> Result<u64> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    fn sweeper(target: Arc<dyn Sweepable>, interval_ms: u64) -> ExpirySweeper {
        ExpirySweeper::new(
            target,
            Duration::from_millis(interval_ms),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_double_start_keeps_one_task() {
        let target = Arc::new(CountingTarget::default());
        let sweeper = sweeper(target.clone(), 20);

        assert!(sweeper.start().await);
        assert!(!sweeper.start().await);
        assert!(sweeper.is_running().await);

        assert!(sweeper.stop().await);
        assert!(!sweeper.is_running().await);
        assert!(!sweeper.stop().await);
    }

    #[tokio::test]
    async fn test_restart_after_stop_resumes_sweeping() {
        let target = Arc::new(CountingTarget::default());
        let sweeper = sweeper(target.clone(), 10);

        sweeper.start().await;
        sweeper.stop().await;
        let before = target.calls.load(Ordering::SeqCst);

        assert!(sweeper.start().await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        sweeper.stop().await;

        assert!(target.calls.load(Ordering::SeqCst) > before);
    }

    #[tokio::test]
    async fn test_failing_cycles_do_not_end_the_loop() {
        let target = Arc::new(CountingTarget {
            fail: true,
            ..Default::default()
        });
        let sweeper = sweeper(target.clone(), 10);

        sweeper.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(target.calls.load(Ordering::SeqCst) >= 2);
        assert!(sweeper.is_running().await);
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_sweep() {
        let target = Arc::new(SlowTarget {
            finished: AtomicU64::new(0),
        });
        let sweeper = sweeper(target.clone(), 10);

        sweeper.start().await;
        // Let the first pass begin, then stop in the middle of it
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.stop().await;

        assert_eq!(target.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_returns_within_grace() {
        let target = Arc::new(SlowTarget {
            finished: AtomicU64::new(0),
        });
        let sweeper = ExpirySweeper::new(
            target,
            Duration::from_millis(1),
            Duration::from_millis(20),
        );

        sweeper.start().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = std::time::Instant::now();
        sweeper.stop().await;
        assert!(started.elapsed() < Duration::from_millis(140));
    }
}
