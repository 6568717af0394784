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

use std::{path::PathBuf, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use themelink_common_telemetry::LoggingOptions;

/// Prefix of environment overrides, e.g. `THEMELINK_RETRY_INTERVAL_MS=500`
/// or `THEMELINK_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "THEMELINK";

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("Failed to load configuration"))]
    Load {
        source: config::ConfigError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

/// Configuration for a themelink session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct AppConfig {
    #[builder(default)]
    pub logging:           LoggingOptions,
    /// JSON file holding the persisted theme selection. In-memory when unset.
    pub state_file:        Option<PathBuf>,
    /// Module that owns the theme.
    #[default = "Gui"]
    #[builder(default = "Gui".to_string(), into)]
    pub provider_module:   String,
    /// Modules that follow it, one bridge each.
    #[default(_code = r#"vec!["Mixer".to_string(), "Sampler".to_string()]"#)]
    #[builder(default = vec!["Mixer".to_string(), "Sampler".to_string()])]
    pub consumer_modules:  Vec<String>,
    #[default = 2000]
    #[builder(default = 2000)]
    pub retry_interval_ms: u64,
}

impl AppConfig {
    /// Layer, lowest first: built-in defaults, the TOML file at `path` (which
    /// must exist when given), then `THEMELINK_*` environment variables.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Self::default()).context(LoadSnafu)?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("consumer_modules"),
            )
            .build()
            .context(LoadSnafu)?
            .try_deserialize()
            .context(LoadSnafu)
    }

    #[must_use]
    pub const fn retry_interval(&self) -> Duration { Duration::from_millis(self.retry_interval_ms) }
}
