//! Cancellable repeating background tasks.
//!
//! Used for the key set refresher and the conversation sweeper. The task is
//! stopped by [`PeriodicTask::shutdown`], or cancelled when the handle is
//! dropped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to a task that runs a callback on a fixed interval.
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`. The first run happens one period from now.
    ///
    /// A tick that is still running when the next one is due delays the
    /// schedule instead of bursting.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        debug!(task = name, "periodic_task_tick");
                        tick().await;
                    }
                }
            }
        });

        info!(
            task = name,
            period_seconds = period.as_secs_f64(),
            "periodic_task_started"
        );

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel the task and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(task = self.name, error = %e, "periodic_task_join_failed");
            }
        }

        info!(task = self.name, "periodic_task_stopped");
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
