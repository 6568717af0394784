// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{runtime::Handle, sync::Notify, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::WorkerConfig,
    context::WorkerContext,
    err::WorkResult,
    metrics::{
        WORKER_ACTIVE, WORKER_EXECUTION_ERRORS, WORKER_EXECUTIONS, WORKER_STARTED,
        WORKER_STOPPED,
    },
    worker::{Trigger, Worker, WorkerHandle},
};

/// Manages lifecycle of background workers.
///
/// Dropping the manager aborts every worker it still owns; call
/// [`Manager::shutdown`] for a graceful stop.
pub struct Manager {
    cancel_token:     CancellationToken,
    runtime:          Handle,
    shutdown_timeout: std::time::Duration,
    joins:            JoinSet<WorkResult>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("workers", &self.joins.len())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for Manager {
    fn default() -> Self { Self::new(WorkerConfig::default()) }
}

impl Manager {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            cancel_token:     CancellationToken::new(),
            runtime:          config.runtime(),
            shutdown_timeout: config.shutdown_timeout(),
            joins:            JoinSet::new(),
        }
    }

    /// Spawn `worker` and return its handle. The worker starts immediately.
    pub fn register<W>(&mut self, mut worker: W) -> WorkerHandle
    where
        W: Worker,
    {
        let name = worker.name();
        let trigger = worker.trigger();
        let notify = Arc::new(Notify::new());
        let paused = Arc::new(AtomicBool::new(false));
        let token = self.cancel_token.child_token();
        let ctx = WorkerContext::new(name, token.clone(), notify.clone());
        let handle = WorkerHandle::new(name, notify, paused.clone(), token);

        let task = async move {
            debug!(worker = name, trigger = ?trigger, "Worker starting");
            WORKER_STARTED.with_label_values(&[name]).inc();
            WORKER_ACTIVE.with_label_values(&[name]).inc();

            let result = match worker.on_start(&ctx).await {
                Ok(()) => Self::run_loop(&mut worker, &ctx, &paused, trigger).await,
                Err(e) => {
                    error!(worker = name, error = %e, "Worker failed during on_start");
                    Err(e)
                }
            };

            if let Err(e) = worker.on_shutdown(&ctx).await {
                error!(worker = name, error = %e, "Worker failed during on_shutdown");
            }

            match &result {
                Ok(()) => debug!(worker = name, "Worker stopped"),
                Err(e) => error!(worker = name, error = %e, "Worker stopped with error"),
            }
            WORKER_STOPPED.with_label_values(&[name]).inc();
            WORKER_ACTIVE.with_label_values(&[name]).dec();
            result
        };

        self.joins.spawn_on(task, &self.runtime);
        handle
    }

    /// Number of worker tasks not yet reaped.
    #[must_use]
    pub fn len(&self) -> usize { self.joins.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.joins.is_empty() }

    async fn run_loop<W>(
        worker: &mut W,
        ctx: &WorkerContext,
        paused: &AtomicBool,
        trigger: Trigger,
    ) -> WorkResult
    where
        W: Worker,
    {
        match trigger {
            Trigger::Once => {
                tokio::select! {
                    result = Self::execute(worker, ctx) => result,
                    () = ctx.cancelled() => Ok(()),
                }
            }
            Trigger::Notify => loop {
                tokio::select! {
                    () = ctx.notified() => {
                        if paused.load(Ordering::Acquire) {
                            continue;
                        }
                        Self::execute(worker, ctx).await?;
                    }
                    () = ctx.cancelled() => return Ok(()),
                }
            },
            Trigger::Interval(period) => {
                let start = tokio::time::Instant::now() + period;
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        // Cancellation wins over a tick that is ready at the same time.
                        biased;
                        () = ctx.cancelled() => return Ok(()),
                        _ = interval.tick() => {
                            if paused.load(Ordering::Acquire) {
                                continue;
                            }
                            Self::execute(worker, ctx).await?;
                        }
                    }
                }
            }
        }
    }

    /// Run `work()` once. Transient errors are swallowed, fatal ones returned.
    async fn execute<W>(worker: &mut W, ctx: &WorkerContext) -> WorkResult
    where
        W: Worker,
    {
        let name = ctx.name();
        match worker.work(ctx).await {
            Ok(()) => {
                WORKER_EXECUTIONS.with_label_values(&[name]).inc();
                Ok(())
            }
            Err(e) => {
                WORKER_EXECUTION_ERRORS.with_label_values(&[name]).inc();
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(worker = name, error = %e, "Worker execution failed, will retry");
                Ok(())
            }
        }
    }

    /// Cancel every worker and wait for them within the configured timeout.
    /// Workers not responding in time are aborted.
    pub async fn shutdown(mut self) {
        info!(workers = self.joins.len(), "Shutting down worker manager");
        self.cancel_token.cancel();

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let mut stopped = 0_usize;
        let mut aborted = 0_usize;

        loop {
            tokio::select! {
                result = self.joins.join_next() => {
                    match result {
                        Some(Ok(result)) => {
                            stopped += 1;
                            if let Err(e) = result {
                                error!(error = %e, "Worker error during shutdown");
                            }
                        }
                        Some(Err(e)) => {
                            stopped += 1;
                            if !e.is_cancelled() {
                                error!(error = %e, "Join error during shutdown");
                            }
                        }
                        None => break,
                    }
                }
                () = tokio::time::sleep_until(deadline) => {
                    error!(
                        timeout = ?self.shutdown_timeout,
                        "Shutdown timeout reached, aborting remaining workers"
                    );
                    self.joins.abort_all();
                    while let Some(result) = self.joins.join_next().await {
                        if let Err(e) = result
                            && e.is_cancelled()
                        {
                            aborted += 1;
                        }
                    }
                    break;
                }
            }
        }

        if aborted > 0 {
            warn!(stopped, aborted, "Worker manager shutdown complete");
        } else {
            info!(stopped, "Worker manager shutdown complete");
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) { self.cancel_token.cancel(); }
}
