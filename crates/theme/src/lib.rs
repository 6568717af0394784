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

//! Theme discovery and synchronization between independently loaded modules
//! of one process.
//!
//! One module runs a [`ThemeProvider`] which owns the active theme and mode.
//! Every other module runs a [`ThemeBridge`]. Bridges find the provider over a
//! [`MessageBus`], then read colors from it directly through a typed handle
//! resolved from the shared [`ServiceRegistry`]. Until then they paint with a
//! built-in fallback palette.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use themelink_theme::{
//!     BridgeConfig, ColorRole, LocalBus, ServiceRegistry, ThemeApi, ThemeBridge, ThemeMode,
//!     ThemeProvider,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = Arc::new(LocalBus::new());
//! let services = Arc::new(ServiceRegistry::new());
//!
//! let bridge = ThemeBridge::builder()
//!     .config(BridgeConfig::builder().module_name("Mixer").build())
//!     .bus(bus.clone())
//!     .services(services.clone())
//!     .start();
//! let provider = ThemeProvider::builder()
//!     .module_name("Gui")
//!     .bus(bus)
//!     .services(services)
//!     .start();
//!
//! assert!(bridge.is_connected());
//! provider.apply_theme("Storm", ThemeMode::Night);
//! println!("{}", bridge.color(ColorRole::Background1));
//! # }
//! ```

mod api;
mod bridge;
mod bus;
mod catalog;
mod color;
mod err;
pub mod message;
mod metrics;
mod palette;
mod provider;
mod registry;
mod service;

pub use crate::{
    api::ThemeApi,
    bridge::{BridgeConfig, ConnectionState, DEFAULT_RETRY_INTERVAL, ThemeBridge},
    bus::{LocalBus, MessageBus, MessageListener},
    catalog::{BuiltinCatalog, DEFAULT_THEME, ThemeCatalog},
    color::{ColorRole, NEUTRAL_GRAY, Rgb, ThemeMode},
    err::{Error, Result},
    message::{MessageError, ThemeMessage},
    palette::{Palette, ThemeProfile},
    provider::{PROVIDER_KEY_PREFIX, ThemeProvider},
    registry::{CallbackId, CallbackRegistry, ThemeCallback},
    service::{ResolveError, ServiceKey, ServiceRegistry},
};
