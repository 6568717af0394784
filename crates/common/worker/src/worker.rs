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

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{
    config::SharedNotify,
    context::WorkerContext,
    err::WorkResult,
    id::WorkerId,
    metrics::WORKER_CANCELLED,
};

/// When a worker's `work()` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Execute once immediately on startup, then never again.
    Once,
    /// Execute on every [`WorkerHandle::notify`].
    Notify,
    /// Execute periodically. The first execution happens one full period
    /// after the worker is spawned, missed ticks are skipped.
    Interval(Duration),
}

/// Core worker trait for background tasks.
///
/// Implementors only define single-shot execution logic in `work()`; the
/// manager handles looping, triggering and lifecycle.
#[async_trait::async_trait]
pub trait Worker: Send + 'static {
    /// Worker name for logging and metrics.
    fn name(&self) -> &'static str;

    fn trigger(&self) -> Trigger;

    /// Called once before the first `work()` execution.
    async fn on_start(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }

    /// Single execution unit, called each time the trigger fires.
    /// A fatal error stops the worker, a transient one is logged.
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult;

    /// Called once after the last `work()` execution, including after
    /// cancellation.
    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
}

/// Handle to control a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    id:     WorkerId,
    name:   &'static str,
    notify: SharedNotify,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    // Claimed by the first `cancel()` call.
    cancel_claimed: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub(crate) fn new(
        name: &'static str,
        notify: SharedNotify,
        paused: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: WorkerId::new(),
            name,
            notify,
            paused,
            cancel,
            cancel_claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub const fn id(&self) -> WorkerId { self.id }

    pub const fn name(&self) -> &'static str { self.name }

    /// Wake a `Notify` worker.
    pub fn notify(&self) { self.notify.notify_one(); }

    /// Skip executions until resumed. The trigger keeps advancing.
    pub fn pause(&self) { self.paused.store(true, Ordering::Release); }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_paused(&self) -> bool { self.paused.load(Ordering::Acquire) }

    /// Stop this worker only. Returns `true` for the call that actually
    /// cancelled it, `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        if self.cancel_claimed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        WORKER_CANCELLED.with_label_values(&[self.name]).inc();
        true
    }

    pub fn is_cancelled(&self) -> bool { self.cancel.is_cancelled() }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("paused", &self.is_paused())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
