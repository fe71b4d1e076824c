//! Detached post-submission confirmation tasks.
//!
//! Confirmations never block the request that scheduled them. They are owned by a
//! [`ConfirmationTasks`] set so shutdown can bound them instead of leaking timers.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

/// Tracks detached confirmation tasks.
pub struct ConfirmationTasks {
    tasks: Mutex<JoinSet<()>>,
    shutdown: watch::Sender<bool>,
}

impl Default for ConfirmationTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationTasks {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tasks: Mutex::new(JoinSet::new()),
            shutdown,
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `task` after `delay` on the current runtime.
    ///
    /// Returns `false` without spawning once [`shutdown`](Self::shutdown) has begun.
    /// A task still waiting out its delay when shutdown begins is dropped.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if *self.shutdown.borrow() {
            tracing::debug!("Confirmation not scheduled, shutting down");
            return false;
        }

        let mut stop = self.shutdown.subscribe();
        let mut tasks = self.tasks();

        // Reap finished tasks
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => task.await,
                () = stopped(&mut stop) => {
                    tracing::debug!("Pending confirmation dropped by shutdown");
                }
            }
        });
        true
    }

    /// Number of tasks not yet reaped.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Whether no tasks are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting work, wait up to `grace` for outstanding tasks, then abort
    /// the rest. Returns the number of aborted tasks.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.shutdown.send_replace(true);
        let mut tasks = std::mem::take(&mut *self.tasks());

        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_ok() {
            tracing::debug!("Confirmation tasks drained");
            return 0;
        }

        let remaining = tasks.len();
        tasks.shutdown().await;
        tracing::warn!(aborted = remaining, "Aborted unfinished confirmation tasks");
        remaining
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        let signalled = *stop.borrow_and_update();
        if signalled || stop.changed().await.is_err() {
            return;
        }
    }
}
