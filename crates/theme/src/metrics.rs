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

use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

pub static MESSAGES_SENT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_theme_messages_sent_total",
        "Theme protocol messages sent, by topic",
        &["topic"]
    )
    .expect("messages_sent metric registers once")
});

pub static MESSAGES_DISCARDED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "themelink_theme_messages_discarded_total",
        "Inbound theme messages dropped because they failed to decode",
        &["topic"]
    )
    .expect("messages_discarded metric registers once")
});

pub static CALLBACK_PANICS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "themelink_theme_callback_panics_total",
        "Theme change callbacks that panicked"
    )
    .expect("callback_panics metric registers once")
});
