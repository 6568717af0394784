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

use std::{future::Future, sync::Arc};

use once_cell::sync::OnceCell;
use tokio::{
    runtime::{Handle, Runtime},
    task::JoinHandle,
};

use crate::{
    error::{AlreadyInitializedSnafu, Result},
    options::{GlobalRuntimeOptions, RuntimeOptions},
};

static BACKGROUND_RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

fn build_background_runtime(options: &GlobalRuntimeOptions) -> Arc<Runtime> {
    Arc::new(
        RuntimeOptions::builder()
            .thread_name("rt-bg".to_string())
            .worker_threads(options.background_threads)
            .enable_io(false)
            .enable_time(true)
            .build()
            .create()
            .expect("Failed to create background runtime"),
    )
}

/// Configure the background runtime explicitly. Must run before anything
/// touches [`background_runtime`].
pub fn init_global_runtimes(options: &GlobalRuntimeOptions) -> Result<()> {
    let runtime = build_background_runtime(options);
    BACKGROUND_RUNTIME
        .set(runtime)
        .map_err(|_| AlreadyInitializedSnafu.build())
}

#[must_use]
pub fn background_runtime() -> Arc<Runtime> {
    Arc::clone(
        BACKGROUND_RUNTIME
            .get_or_init(|| build_background_runtime(&GlobalRuntimeOptions::default())),
    )
}

/// Handle of the runtime the caller is running on, or of the background
/// runtime when called from plain synchronous code.
#[must_use]
pub fn current_or_background() -> Handle {
    Handle::try_current().unwrap_or_else(|_| background_runtime().handle().clone())
}

pub fn spawn_background<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    background_runtime().handle().spawn(future)
}

pub fn block_on_background<F>(future: F) -> F::Output
where
    F: Future,
{
    background_runtime().block_on(future)
}
