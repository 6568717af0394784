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

use std::sync::LazyLock;

use prometheus::{IntCounterVec, IntGaugeVec, register_int_counter_vec, register_int_gauge_vec};

pub const WORKER_LABEL: &str = "worker";

pub static WORKER_STARTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_worker_started_total",
        "Total number of workers started",
        &[WORKER_LABEL]
    )
    .expect("worker_started metric registers once")
});

pub static WORKER_STOPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_worker_stopped_total",
        "Total number of workers stopped, for any reason",
        &[WORKER_LABEL]
    )
    .expect("worker_stopped metric registers once")
});

pub static WORKER_CANCELLED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_worker_cancelled_total",
        "Total number of workers cancelled through their handle",
        &[WORKER_LABEL]
    )
    .expect("worker_cancelled metric registers once")
});

pub static WORKER_EXECUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_worker_executions_total",
        "Total number of worker executions",
        &[WORKER_LABEL]
    )
    .expect("worker_executions metric registers once")
});

pub static WORKER_EXECUTION_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_worker_execution_errors_total",
        "Total number of worker executions that returned an error",
        &[WORKER_LABEL]
    )
    .expect("worker_execution_errors metric registers once")
});

pub static WORKER_ACTIVE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "themelink_worker_active",
        "Number of live workers with this name",
        &[WORKER_LABEL]
    )
    .expect("worker_active metric registers once")
});
