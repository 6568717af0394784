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

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use snafu::{ResultExt, Whatever, whatever};
use strum::IntoEnumIterator;
use themelink_app::{AppConfig, DemoRequest};
use themelink_common_runtime::{GlobalRuntimeOptions, RuntimeOptions};
use themelink_common_telemetry as telemetry;
use themelink_theme::{BuiltinCatalog, ColorRole, ThemeCatalog, ThemeMode};

#[derive(Debug, Parser)]
#[clap(
name = "themelink",
about = "Theme discovery and sync between modules",
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Themes(ThemesArgs),
    Palette(PaletteArgs),
    Demo(DemoArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

List the built-in themes.
Examples:

themelink themes

")]
struct ThemesArgs {}

impl ThemesArgs {
    fn run(&self) -> Result<(), Whatever> {
        for name in BuiltinCatalog.names() {
            println!("{name}");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Print every color role of a theme.
Examples:

themelink palette Ocean
themelink palette 'Dark capsule' --mode night

")]
struct PaletteArgs {
    /// Theme name, case-sensitive
    name: String,
    #[arg(long, default_value = "day", value_parser = parse_mode)]
    mode: ThemeMode,
}

impl PaletteArgs {
    fn run(&self) -> Result<(), Whatever> {
        if !BuiltinCatalog.exists(&self.name) {
            whatever!(
                "unknown theme {:?}, expected one of: {}",
                self.name,
                BuiltinCatalog.names().join(", ")
            );
        }
        let palette = BuiltinCatalog.theme(&self.name).palette(self.mode);
        println!("{} ({})", self.name, self.mode);
        for role in ColorRole::iter() {
            println!("  {:<22} {}", role.as_ref(), palette.get(role));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Run a provider and the configured consumer modules in one process,
switch the theme and show what every consumer sees.
Examples:

themelink demo
themelink demo --theme Storm --mode night
THEMELINK_CONSUMER_MODULES=Mixer,Eq themelink demo --config themelink.toml

")]
struct DemoArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    theme:  Option<String>,
    #[arg(long, value_parser = parse_mode)]
    mode:   Option<ThemeMode>,
}

impl DemoArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = AppConfig::load(self.config.as_deref())
            .whatever_context("Failed to load configuration")?;
        let _guards = telemetry::init_global_logging("themelink", &config.logging);
        telemetry::set_panic_hook();

        let request = DemoRequest {
            theme: self.theme.clone(),
            mode:  self.mode,
        };
        let report = config.open().run_demo(request).await?;
        print!("{report}");
        Ok(())
    }
}

fn parse_mode(raw: &str) -> Result<ThemeMode, String> {
    raw.parse()
        .map_err(|_| format!("invalid mode {raw:?}, expected day or night"))
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Themes(ta) => ta.run(),
        Commands::Palette(pa) => pa.run(),
        Commands::Demo(da) => {
            themelink_common_runtime::init_global_runtimes(&GlobalRuntimeOptions::default())
                .whatever_context("Failed to initialize runtimes")?;
            let runtime = RuntimeOptions::builder()
                .thread_name("themelink-main".to_string())
                .build()
                .create()
                .whatever_context("Failed to build main runtime")?;
            runtime.block_on(da.run())
        }
    }
}
