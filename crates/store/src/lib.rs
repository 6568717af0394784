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

//! Persisted theme selection.
//!
//! Every module keeps its last `(theme, mode)` pair under its own namespace,
//! `/PlugIns/<module>`. The provider reads it when it starts and writes it
//! after every successful theme change.

mod err;
mod file;
mod memory;

use serde::{Deserialize, Serialize};

pub use crate::{
    err::{Error, Result},
    file::JsonFileThemeStore,
    memory::MemoryThemeStore,
};

/// Namespace a module's selection is stored under.
#[must_use]
pub fn namespace(module: &str) -> String { format!("/PlugIns/{module}") }

/// A persisted theme name and mode string.
///
/// The mode is kept as the raw string (`"day"` / `"night"`); callers decide how
/// to treat values they do not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct ThemeSelection {
    #[builder(into)]
    pub theme: String,
    #[builder(into)]
    pub mode:  String,
}

/// Storage for theme selections keyed by namespace.
pub trait ThemeStore: Send + Sync {
    /// Returns `None` when nothing was ever saved for `namespace`.
    fn load(&self, namespace: &str) -> Result<Option<ThemeSelection>>;

    fn save(&self, namespace: &str, selection: &ThemeSelection) -> Result<()>;
}
