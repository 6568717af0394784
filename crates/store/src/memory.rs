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

use std::{collections::HashMap, sync::RwLock};

use crate::{
    ThemeSelection, ThemeStore,
    err::{PoisonedSnafu, Result},
};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryThemeStore {
    entries: RwLock<HashMap<String, ThemeSelection>>,
}

impl MemoryThemeStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

impl ThemeStore for MemoryThemeStore {
    fn load(&self, namespace: &str) -> Result<Option<ThemeSelection>> {
        let entries = self.entries.read().map_err(|_| PoisonedSnafu.build())?;
        Ok(entries.get(namespace).cloned())
    }

    fn save(&self, namespace: &str, selection: &ThemeSelection) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| PoisonedSnafu.build())?;
        entries.insert(namespace.to_string(), selection.clone());
        Ok(())
    }
}
