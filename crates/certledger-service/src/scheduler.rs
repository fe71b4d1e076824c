//! Recovery sweep execution: one sweep at a time, on demand or on a timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use certledger_mirror::MirrorQuery;
use certledger_sync::{RecoverySweep, SweepReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A finished sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepRun {
    /// Records the sweep was allowed to touch.
    pub limit: usize,
    /// Counts.
    #[serde(flatten)]
    pub report: SweepReport,
    /// When the sweep started.
    pub started_at: DateTime<Utc>,
    /// When the sweep finished.
    pub finished_at: DateTime<Utc>,
}

/// Snapshot returned by [`SweepRunner::status`].
#[derive(Debug, Clone, Serialize)]
pub struct SweepStatus {
    /// A sweep is in flight.
    pub running: bool,
    /// The most recent finished sweep.
    pub last_run: Option<SweepRun>,
}

/// Clears the running flag when the sweep ends or is dropped.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs recovery sweeps one at a time and keeps the last result.
///
/// On-demand sweeps run detached from the request that started them, so a
/// batch that polls the mirror for minutes is not cut off by the request timeout.
#[derive(Clone)]
pub struct SweepRunner {
    sweep: RecoverySweep,
    running: Arc<AtomicBool>,
    last_run: Arc<Mutex<Option<SweepRun>>>,
    background: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SweepRunner {
    /// Create a runner around `sweep`.
    #[must_use]
    pub fn new(sweep: RecoverySweep) -> Self {
        Self {
            sweep,
            running: Arc::new(AtomicBool::new(false)),
            last_run: Arc::new(Mutex::new(None)),
            background: Arc::new(Mutex::new(None)),
        }
    }

    fn claim(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(Arc::clone(&self.running)))
    }

    async fn run_claimed(&self, _guard: RunningGuard, limit: usize) -> SweepReport {
        let started_at = Utc::now();
        let report = self.sweep.retry_failed_transactions(limit).await;

        *lock(&self.last_run) = Some(SweepRun {
            limit,
            report,
            started_at,
            finished_at: Utc::now(),
        });
        report
    }

    /// Sweep inline. Returns `None` if another sweep is already running.
    pub async fn run(&self, limit: usize) -> Option<SweepReport> {
        let guard = self.claim()?;
        Some(self.run_claimed(guard, limit).await)
    }

    /// Start a sweep in the background.
    ///
    /// Returns `false` without starting anything if a sweep is already running.
    pub fn start(&self, limit: usize) -> bool {
        let Some(guard) = self.claim() else {
            return false;
        };

        let runner = self.clone();
        let handle = tokio::spawn(async move {
            runner.run_claimed(guard, limit).await;
        });
        *lock(&self.background) = Some(handle);
        true
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> SweepStatus {
        SweepStatus {
            running: self.running.load(Ordering::SeqCst),
            last_run: *lock(&self.last_run),
        }
    }

    /// Abort a background sweep still in flight. Returns whether one was aborted.
    ///
    /// Records it had not reached stay as they were; the next sweep picks them up.
    pub async fn shutdown(&self) -> bool {
        let Some(handle) = lock(&self.background).take() else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }

        handle.abort();
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Background sweep failed");
            }
        }
        true
    }
}

/// Resolve once `shutdown` is `true` or its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Runs the recovery sweep on a fixed interval while the mirror is reachable.
#[derive(Clone)]
pub struct SweepScheduler {
    runner: SweepRunner,
    mirror: Arc<dyn MirrorQuery>,
    interval: Duration,
    limit: usize,
}

impl SweepScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(
        runner: SweepRunner,
        mirror: Arc<dyn MirrorQuery>,
        interval: Duration,
        limit: usize,
    ) -> Self {
        Self {
            runner,
            mirror,
            interval,
            limit,
        }
    }

    /// One tick: probe the mirror, then sweep.
    ///
    /// Returns `None` when the tick was skipped because the mirror is down or
    /// another sweep is still running.
    pub async fn run_once(&self) -> Option<SweepReport> {
        let health = self.mirror.check_health().await;
        if !health.mirror_node_available {
            tracing::warn!("Mirror unavailable, skipping scheduled sweep");
            return None;
        }

        let report = self.runner.run(self.limit).await;
        if report.is_none() {
            tracing::debug!("Sweep already running, skipping scheduled sweep");
        }
        report
    }

    /// Spawn the loop. It exits once `shutdown` turns `true` or its sender drops,
    /// abandoning a sweep in progress.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; give the service time to settle.
            ticker.tick().await;

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                limit = self.limit,
                "Sweep scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            report = self.run_once() => {
                                if let Some(report) = report {
                                    tracing::debug!(
                                        synced = report.synced,
                                        failed = report.failed,
                                        skipped = report.skipped,
                                        "Scheduled sweep finished"
                                    );
                                }
                            }
                            () = shutdown_requested(&mut shutdown) => break,
                        }
                    }
                    () = shutdown_requested(&mut shutdown) => break,
                }
            }

            tracing::info!("Sweep scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_request_resolves_on_flag_or_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        tx.send_replace(true);
        shutdown_requested(&mut rx).await;

        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        shutdown_requested(&mut rx).await;
    }

    #[test]
    fn guard_clears_running_flag() {
        let running = Arc::new(AtomicBool::new(true));
        drop(RunningGuard(Arc::clone(&running)));
        assert!(!running.load(Ordering::SeqCst));
    }
}
