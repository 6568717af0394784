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

//! Composition root: builds the bus, service registry and store, then one
//! provider and a bridge per consumer module.

mod config;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use snafu::{ResultExt, Whatever, whatever};
use themelink_store::{JsonFileThemeStore, MemoryThemeStore, ThemeStore};
use themelink_theme::{
    BridgeConfig, ColorRole, LocalBus, Rgb, ServiceRegistry, ThemeApi, ThemeBridge, ThemeMode,
    ThemeProvider,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use crate::config::{AppConfig, ConfigError, ENV_PREFIX};

impl AppConfig {
    #[must_use]
    pub fn open(self) -> App {
        let store: Arc<dyn ThemeStore> = match &self.state_file {
            Some(path) => Arc::new(JsonFileThemeStore::new(path)),
            None => Arc::new(MemoryThemeStore::new()),
        };
        App {
            config: self,
            bus: Arc::new(LocalBus::new()),
            services: Arc::new(ServiceRegistry::new()),
            store,
            cancellation_token: CancellationToken::new(),
        }
    }
}

/// Shared plumbing of one session. Everything is injected from here; there
/// are no process-wide theme singletons.
pub struct App {
    pub config:             AppConfig,
    bus:                    Arc<LocalBus>,
    services:               Arc<ServiceRegistry>,
    store:                  Arc<dyn ThemeStore>,
    /// Cancelled when the session should stop waiting for consumers.
    pub cancellation_token: CancellationToken,
}

/// A consumer module in the demo: its bridge and how often it was told
/// about a change.
pub struct Consumer {
    pub bridge:        Arc<ThemeBridge>,
    notifications:     Arc<AtomicUsize>,
}

impl Consumer {
    #[must_use]
    pub fn notifications(&self) -> usize { self.notifications.load(Ordering::SeqCst) }
}

/// What the demo asks the provider to switch to. `None` keeps the current
/// value; with neither set the mode is toggled.
#[derive(Debug, Clone, Default, bon::Builder)]
pub struct DemoRequest {
    #[builder(into)]
    pub theme: Option<String>,
    pub mode:  Option<ThemeMode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    pub module:        String,
    pub connected:     bool,
    pub theme:         String,
    pub mode:          ThemeMode,
    pub background:    Rgb,
    pub highlight:     Rgb,
    pub notifications: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub provider_module: String,
    pub theme:           String,
    pub mode:            ThemeMode,
    pub changed:         bool,
    pub consumers:       Vec<ConsumerReport>,
}

impl fmt::Display for DemoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "provider {}: {} ({}){}",
            self.provider_module,
            self.theme,
            self.mode,
            if self.changed { "" } else { ", unchanged" }
        )?;
        for c in &self.consumers {
            writeln!(
                f,
                "  {:<12} {:<9} {} ({}) background {} highlight {} notified {}x",
                c.module,
                if c.connected { "connected" } else { "waiting" },
                c.theme,
                c.mode,
                c.background,
                c.highlight,
                c.notifications,
            )?;
        }
        Ok(())
    }
}

impl App {
    #[must_use]
    pub fn store(&self) -> Arc<dyn ThemeStore> { Arc::clone(&self.store) }

    /// One bridge per configured consumer module, each counting the change
    /// notifications it receives.
    #[must_use]
    pub fn start_consumers(&self) -> Vec<Consumer> {
        self.config
            .consumer_modules
            .iter()
            .map(|module| {
                let bridge = ThemeBridge::builder()
                    .config(
                        BridgeConfig::builder()
                            .module_name(module.as_str())
                            .retry_interval(self.config.retry_interval())
                            .build(),
                    )
                    .bus(self.bus.clone())
                    .services(self.services.clone())
                    .store(self.store())
                    .start();
                let notifications = Arc::new(AtomicUsize::new(0));
                let counter = Arc::clone(&notifications);
                bridge.add_change_callback(Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
                Consumer {
                    bridge,
                    notifications,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn start_provider(&self) -> Arc<ThemeProvider> {
        ThemeProvider::builder()
            .module_name(self.config.provider_module.as_str())
            .bus(self.bus.clone())
            .services(self.services.clone())
            .store(self.store())
            .start()
    }

    /// Wait until every consumer is connected, giving up after three retry
    /// periods or when the session is cancelled.
    pub async fn wait_connected(&self, consumers: &[Consumer]) -> Result<(), Whatever> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for consumer in consumers {
            let tx = tx.clone();
            let module = consumer.bridge.module_name().to_string();
            consumer.bridge.on_connected(move || {
                let _ = tx.send(module);
            });
        }
        drop(tx);

        let deadline = self.config.retry_interval() * 3;
        let mut pending = consumers.len();
        let wait_all = async {
            while pending > 0 {
                match rx.recv().await {
                    Some(module) => {
                        pending -= 1;
                        info!(module = %module, pending, "consumer connected");
                    }
                    None => break,
                }
            }
        };
        tokio::select! {
            () = self.cancellation_token.cancelled() => whatever!("cancelled while waiting for consumers"),
            res = tokio::time::timeout(deadline, wait_all) => {
                res.whatever_context(format!("consumers not connected after {deadline:?}"))?;
            }
        }
        Ok(())
    }

    /// Build consumers first, then the provider, wait for every consumer to
    /// connect, apply `request` and report what each consumer sees.
    pub async fn run_demo(self, request: DemoRequest) -> Result<DemoReport, Whatever> {
        info!(
            provider = %self.config.provider_module,
            consumers = ?self.config.consumer_modules,
            "starting theme session"
        );
        let consumers = self.start_consumers();
        let provider = self.start_provider();
        self.wait_connected(&consumers).await?;

        let named = request.theme.is_some();
        let theme = request.theme.unwrap_or_else(|| provider.theme_name());
        let mode = match (request.mode, named) {
            (Some(mode), _) => mode,
            (None, true) => provider.mode(),
            (None, false) => provider.mode().toggled(),
        };
        let changed = provider.apply_theme(&theme, mode);
        if !changed && theme != provider.theme_name() {
            whatever!("unknown theme {theme:?}");
        }

        let report = DemoReport {
            provider_module: self.config.provider_module.clone(),
            theme:           provider.theme_name(),
            mode:            provider.mode(),
            changed,
            consumers:       consumers
                .iter()
                .map(|c| ConsumerReport {
                    module:        c.bridge.module_name().to_string(),
                    connected:     c.bridge.is_connected(),
                    theme:         c.bridge.theme_name(),
                    mode:          c.bridge.mode(),
                    background:    c.bridge.color(ColorRole::Background1),
                    highlight:     c.bridge.color(ColorRole::HighlightPrimary),
                    notifications: c.notifications(),
                })
                .collect(),
        };
        info!(theme = %report.theme, mode = %report.mode, "theme session finished");
        Ok(report)
    }
}
