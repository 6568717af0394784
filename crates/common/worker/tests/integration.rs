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
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use themelink_common_worker::{
    Manager, Trigger, WorkError, WorkResult, Worker, WorkerConfig, WorkerContext,
};
use tokio::time::{Instant, sleep};

struct CounterWorker {
    counter: Arc<AtomicU32>,
    trigger: Trigger,
}

#[async_trait::async_trait]
impl Worker for CounterWorker {
    fn name(&self) -> &'static str { "CounterWorker" }

    fn trigger(&self) -> Trigger { self.trigger }

    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn counter_worker(trigger: Trigger) -> (CounterWorker, Arc<AtomicU32>) {
    let counter = Arc::new(AtomicU32::new(0));
    (
        CounterWorker {
            counter: counter.clone(),
            trigger,
        },
        counter,
    )
}

#[tokio::test(start_paused = true)]
async fn test_interval_worker_waits_one_period_before_first_tick() {
    let mut manager = Manager::default();
    let (worker, counter) = counter_worker(Trigger::Interval(Duration::from_millis(100)));
    let _handle = manager.register(worker);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 5);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_notify_worker() {
    let mut manager = Manager::default();
    let (worker, counter) = counter_worker(Trigger::Notify);
    let handle = manager.register(worker);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(
        counter.load(Ordering::SeqCst),
        0,
        "Should not execute without notification"
    );

    for _ in 0..3 {
        handle.notify();
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 3);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_once_worker() {
    let mut manager = Manager::default();
    let (worker, counter) = counter_worker(Trigger::Once);
    let _handle = manager.register(worker);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1, "Should still be 1");

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_only_that_worker() {
    let mut manager = Manager::default();
    let (first, first_count) = counter_worker(Trigger::Interval(Duration::from_millis(100)));
    let (second, second_count) = counter_worker(Trigger::Interval(Duration::from_millis(100)));
    let first = manager.register(first);
    let _second = manager.register(second);

    sleep(Duration::from_millis(250)).await;
    assert!(first.cancel());
    assert!(!first.cancel(), "second cancel must report already cancelled");
    assert!(first.is_cancelled());

    sleep(Duration::from_millis(500)).await;
    assert_eq!(first_count.load(Ordering::SeqCst), 2);
    assert_eq!(second_count.load(Ordering::SeqCst), 7);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume() {
    let mut manager = Manager::default();
    let (worker, counter) = counter_worker(Trigger::Interval(Duration::from_millis(100)));
    let handle = manager.register(worker);

    sleep(Duration::from_millis(250)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    handle.pause();
    assert!(handle.is_paused());
    sleep(Duration::from_millis(300)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2, "no work while paused");

    handle.resume();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 4);

    manager.shutdown().await;
}

struct FailingWorker {
    attempts: Arc<AtomicU32>,
    fatal_on: u32,
}

#[async_trait::async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &'static str { "FailingWorker" }

    fn trigger(&self) -> Trigger { Trigger::Interval(Duration::from_millis(100)) }

    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.fatal_on {
            Err(WorkError::fatal("giving up"))
        } else {
            Err(WorkError::transient("try again"))
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_retry_and_fatal_errors_stop() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut manager = Manager::default();
    let _handle = manager.register(FailingWorker {
        attempts: attempts.clone(),
        fatal_on: 3,
    });

    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    manager.shutdown().await;
}

struct LifecycleWorker {
    started:    Arc<AtomicU32>,
    shutdown:   Arc<AtomicU32>,
    work_count: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl Worker for LifecycleWorker {
    fn name(&self) -> &'static str { "LifecycleWorker" }

    fn trigger(&self) -> Trigger { Trigger::Interval(Duration::from_millis(100)) }

    async fn on_start(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.work_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.shutdown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_hooks() {
    let started = Arc::new(AtomicU32::new(0));
    let shutdown = Arc::new(AtomicU32::new(0));
    let work_count = Arc::new(AtomicU32::new(0));

    let mut manager = Manager::default();
    let _handle = manager.register(LifecycleWorker {
        started:    started.clone(),
        shutdown:   shutdown.clone(),
        work_count: work_count.clone(),
    });

    sleep(Duration::from_millis(350)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(work_count.load(Ordering::SeqCst), 3);
    assert_eq!(shutdown.load(Ordering::SeqCst), 0);

    manager.shutdown().await;
    assert_eq!(shutdown.load(Ordering::SeqCst), 1);
}

struct HangingWorker;

#[async_trait::async_trait]
impl Worker for HangingWorker {
    fn name(&self) -> &'static str { "HangingWorker" }

    fn trigger(&self) -> Trigger { Trigger::Once }

    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult {
        // Ignores cancellation on the way out.
        sleep(Duration::from_secs(10)).await;
        Ok(())
    }

    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_timeout_aborts_hanging_worker() {
    let config = WorkerConfig::builder()
        .shutdown_timeout(Duration::from_millis(200))
        .build();
    let mut manager = Manager::new(config);
    let _handle = manager.register(HangingWorker);

    sleep(Duration::from_millis(50)).await;

    let start = Instant::now();
    manager.shutdown().await;
    let elapsed = start.elapsed();
    assert!(
        elapsed < Duration::from_secs(1),
        "Shutdown took {elapsed:?}, expected the 200ms timeout to win"
    );
}
