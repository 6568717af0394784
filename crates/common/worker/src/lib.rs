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

//! Background workers for timers and deferred jobs.
//!
//! - [`Worker`]: trait with `on_start` / `work` / `on_shutdown` hooks
//! - [`Trigger`]: `Once`, `Notify` or `Interval`
//! - [`Manager`]: spawns workers on a Tokio runtime and shuts them down
//! - [`WorkerHandle`]: pause, resume, notify or cancel one worker
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use themelink_common_worker::{Manager, Trigger, WorkResult, Worker, WorkerContext};
//!
//! struct Heartbeat;
//!
//! #[async_trait::async_trait]
//! impl Worker for Heartbeat {
//!     fn name(&self) -> &'static str { "heartbeat" }
//!
//!     fn trigger(&self) -> Trigger { Trigger::Interval(Duration::from_secs(5)) }
//!
//!     async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
//!         tracing::info!(worker = ctx.name(), "tick");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut manager = Manager::default();
//!     let handle = manager.register(Heartbeat);
//!     handle.cancel();
//!     manager.shutdown().await;
//! }
//! ```

mod config;
mod context;
mod err;
mod id;
mod manager;
mod metrics;
mod worker;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use err::{ErrorSeverity, WorkError, WorkResult};
pub use id::WorkerId;
pub use manager::Manager;
pub use worker::{Trigger, Worker, WorkerHandle};
