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

use std::{sync::Arc, time::Duration};

use tokio::runtime::Handle;

#[derive(Debug, Clone, bon::Builder)]
pub struct WorkerConfig {
    /// Runtime the workers are spawned on. Defaults to the caller's runtime,
    /// or the shared background runtime outside of one.
    runtime: Option<Handle>,

    /// Timeout for graceful shutdown. Workers not responding within this
    /// duration are aborted. Default: 5 seconds.
    #[builder(default = Duration::from_secs(5), into)]
    shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self { Self::builder().build() }
}

impl WorkerConfig {
    pub(crate) fn runtime(&self) -> Handle {
        self.runtime
            .clone()
            .unwrap_or_else(themelink_common_runtime::current_or_background)
    }

    pub(crate) const fn shutdown_timeout(&self) -> Duration { self.shutdown_timeout }
}

pub(crate) type SharedNotify = Arc<tokio::sync::Notify>;
