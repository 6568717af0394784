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
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use snafu::ResultExt;
use tracing::debug;

use crate::{
    ThemeSelection, ThemeStore,
    err::{CodecSnafu, IoSnafu, PoisonedSnafu, Result},
};

type Document = BTreeMap<String, ThemeSelection>;

/// Store backed by one JSON document mapping namespace to selection:
///
/// ```json
/// { "/PlugIns/Mixer": { "theme": "Ocean", "mode": "day" } }
/// ```
///
/// Writes go to a sibling temp file which is then renamed over the original,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileThemeStore {
    path:  PathBuf,
    // Serializes read-modify-write cycles within this process.
    write: Mutex<()>,
}

impl JsonFileThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:  path.into(),
            write: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    fn read_document(&self) -> Result<Document> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e).context(IoSnafu { path: &self.path }),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        serde_json::from_slice(&raw).context(CodecSnafu)
    }

    fn write_document(&self, doc: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
        }
        let encoded = serde_json::to_vec_pretty(doc).context(CodecSnafu)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded).context(IoSnafu { path: &tmp })?;
        fs::rename(&tmp, &self.path).context(IoSnafu { path: &self.path })
    }
}

impl ThemeStore for JsonFileThemeStore {
    fn load(&self, namespace: &str) -> Result<Option<ThemeSelection>> {
        Ok(self.read_document()?.remove(namespace))
    }

    fn save(&self, namespace: &str, selection: &ThemeSelection) -> Result<()> {
        let _guard = self.write.lock().map_err(|_| PoisonedSnafu.build())?;
        let mut doc = self.read_document()?;
        doc.insert(namespace.to_string(), selection.clone());
        self.write_document(&doc)?;
        debug!(path = %self.path.display(), namespace, theme = %selection.theme, mode = %selection.mode, "theme selection saved");
        Ok(())
    }
}
