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

use std::sync::{
    Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError, Weak,
};

use bon::bon;
use themelink_store::{MemoryThemeStore, ThemeSelection, ThemeStore, namespace};
use tracing::{debug, info, trace, warn};

use crate::{
    api::ThemeApi,
    bus::{MessageBus, MessageListener},
    catalog::{BuiltinCatalog, DEFAULT_THEME, ThemeCatalog},
    color::{ColorRole, Rgb, ThemeMode},
    message::{self, TOPIC_API_REQUEST, ThemeMessage},
    palette::Palette,
    registry::{CallbackId, CallbackRegistry, ThemeCallback},
    service::{ServiceKey, ServiceRegistry},
};

/// Prefix of the service keys providers register under.
pub const PROVIDER_KEY_PREFIX: &str = "theme-provider";

struct ActiveTheme {
    name:       String,
    mode:       ThemeMode,
    // Always the catalog palette for (name, mode), recomputed as a whole.
    palette:    Palette,
    // Bumped on every change; compared against `ThemeProvider::published`.
    generation: u64,
}

/// Owner of the canonical theme state for a process.
///
/// Announces itself on the bus when it starts and again whenever a consumer
/// asks, answers color and mode queries directly through [`ThemeApi`], and
/// on every change persists the selection, runs its callbacks and
/// broadcasts [`ThemeMessage::ThemeChanged`].
pub struct ThemeProvider {
    module_name: String,
    key:         ServiceKey,
    catalog:     Arc<dyn ThemeCatalog>,
    store:       Arc<dyn ThemeStore>,
    bus:         Arc<dyn MessageBus>,
    services:    Arc<ServiceRegistry>,
    active:      RwLock<ActiveTheme>,
    /// Generation last persisted and broadcast. Whoever holds it publishes
    /// for everyone.
    published:   Mutex<u64>,
    callbacks:   CallbackRegistry,
}

#[bon]
impl ThemeProvider {
    /// Restore the persisted selection (or `Ocean` / day), register with
    /// `services`, subscribe to discovery requests and announce.
    #[builder(finish_fn = start)]
    pub fn new(
        #[builder(into)] module_name: String,
        bus: Arc<dyn MessageBus>,
        services: Arc<ServiceRegistry>,
        #[builder(default = Arc::new(BuiltinCatalog) as Arc<dyn ThemeCatalog>)]
        catalog: Arc<dyn ThemeCatalog>,
        #[builder(default = Arc::new(MemoryThemeStore::new()) as Arc<dyn ThemeStore>)]
        store: Arc<dyn ThemeStore>,
    ) -> Arc<Self> {
        let (name, mode) = restore(&module_name, catalog.as_ref(), store.as_ref());
        let palette = catalog.theme(&name).palette(mode).clone();

        let provider = Arc::new(Self {
            key: ServiceKey::unique(PROVIDER_KEY_PREFIX),
            module_name,
            catalog,
            store,
            bus,
            services,
            active: RwLock::new(ActiveTheme {
                name,
                mode,
                palette,
                generation: 0,
            }),
            published: Mutex::new(0),
            callbacks: CallbackRegistry::new(),
        });

        let api: Weak<dyn ThemeApi> = Arc::downgrade(&provider) as Weak<dyn ThemeApi>;
        provider.services.register(provider.key.clone(), api);
        let listener: Weak<dyn MessageListener> =
            Arc::downgrade(&provider) as Weak<dyn MessageListener>;
        provider.bus.subscribe(TOPIC_API_REQUEST, listener);

        {
            let active = provider.read();
            info!(
                module = %provider.module_name,
                key = %provider.key,
                theme = %active.name,
                mode = %active.mode,
                "theme provider started"
            );
        }
        provider.announce();
        provider
    }
}

fn restore(module: &str, catalog: &dyn ThemeCatalog, store: &dyn ThemeStore) -> (String, ThemeMode) {
    let selection = match store.load(&namespace(module)) {
        Ok(selection) => selection,
        Err(error) => {
            warn!(module, %error, "failed to load theme selection, using defaults");
            None
        }
    };
    let Some(selection) = selection else {
        return (DEFAULT_THEME.to_string(), ThemeMode::Day);
    };
    let mode = ThemeMode::from_stored(&selection.mode);
    if catalog.exists(&selection.theme) {
        (selection.theme, mode)
    } else {
        warn!(module, theme = %selection.theme, "persisted theme is unknown, using {DEFAULT_THEME}");
        (DEFAULT_THEME.to_string(), mode)
    }
}

impl ThemeProvider {
    fn read(&self) -> RwLockReadGuard<'_, ActiveTheme> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ActiveTheme> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn key(&self) -> &ServiceKey { &self.key }

    #[must_use]
    pub fn module_name(&self) -> &str { &self.module_name }

    /// Switch to theme `name` in `mode`.
    ///
    /// Unknown names are ignored and re-applying the active pair does
    /// nothing. Returns whether the state changed.
    ///
    /// Concurrent applies may be coalesced: the store and the last
    /// `theme_changed` on the bus always end up on the selection that won
    /// the state lock last, though a superseded one may never be written.
    pub fn apply_theme(&self, name: &str, mode: ThemeMode) -> bool {
        if !self.catalog.exists(name) {
            debug!(theme = name, "unknown theme, keeping the active one");
            return false;
        }
        {
            let mut active = self.write();
            if active.name == name && active.mode == mode {
                trace!(theme = name, %mode, "theme already active");
                return false;
            }
            active.name = name.to_string();
            active.mode = mode;
            active.palette = self.catalog.theme(name).palette(mode).clone();
            active.generation += 1;
        }
        info!(module = %self.module_name, theme = name, %mode, "theme applied");

        self.callbacks.notify_all();
        self.publish();
        true
    }

    /// Persist and broadcast the active selection until the published
    /// generation catches up with the state.
    ///
    /// Only one thread publishes at a time. Others, including a callback
    /// applying a theme from inside a broadcast, leave their change to the
    /// publisher, which re-reads the state after every round.
    fn publish(&self) {
        loop {
            let mut published = match self.published.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let (name, mode, generation) = {
                    let active = self.read();
                    (active.name.clone(), active.mode, active.generation)
                };
                if generation == *published {
                    break;
                }
                self.persist(&name, mode);
                message::send(self.bus.as_ref(), &ThemeMessage::ThemeChanged { theme: name, mode });
                *published = generation;
            }
            let done = *published;
            drop(published);
            // A change that lost the race for the publisher after our last
            // read is ours to publish.
            if self.read().generation == done {
                return;
            }
        }
    }

    pub fn set_mode(&self, mode: ThemeMode) -> bool {
        let name = self.read().name.clone();
        self.apply_theme(&name, mode)
    }

    /// Flip between day and night, returning the new mode.
    pub fn toggle_mode(&self) -> ThemeMode {
        let (name, mode) = {
            let active = self.read();
            (active.name.clone(), active.mode.toggled())
        };
        self.apply_theme(&name, mode);
        mode
    }

    /// Registrations on the provider, including ones mirrored by bridges.
    #[must_use]
    pub fn callback_count(&self) -> usize { self.callbacks.len() }

    /// Copy of the active palette.
    #[must_use]
    pub fn palette(&self) -> Palette { self.read().palette.clone() }

    /// Broadcast the handle and current theme to every consumer.
    pub fn announce(&self) {
        let (theme, mode) = {
            let active = self.read();
            (active.name.clone(), active.mode)
        };
        message::send(
            self.bus.as_ref(),
            &ThemeMessage::ThemeApiAvailable {
                handle: self.key.clone(),
                theme,
                mode,
            },
        );
    }

    fn persist(&self, name: &str, mode: ThemeMode) {
        let selection = ThemeSelection::builder()
            .theme(name)
            .mode(mode.to_string())
            .build();
        if let Err(error) = self.store.save(&namespace(&self.module_name), &selection) {
            warn!(module = %self.module_name, %error, "failed to persist theme selection");
        }
    }
}

impl ThemeApi for ThemeProvider {
    fn color(&self, role: ColorRole) -> Rgb { self.read().palette.get(role) }

    fn mode(&self) -> ThemeMode { self.read().mode }

    fn theme_name(&self) -> String { self.read().name.clone() }

    fn add_change_callback(&self, callback: ThemeCallback) -> CallbackId {
        self.callbacks.add(callback)
    }

    fn remove_change_callback(&self, id: CallbackId) { self.callbacks.remove(id); }
}

impl MessageListener for ThemeProvider {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        match ThemeMessage::decode(topic, payload) {
            Ok(ThemeMessage::RequestThemeApi { sender_id }) => {
                debug!(sender = %sender_id, "theme api requested");
                self.announce();
            }
            Ok(other) => trace!(kind = other.kind(), "not for the provider"),
            Err(error) => message::discard(topic, &error),
        }
    }
}

impl Drop for ThemeProvider {
    fn drop(&mut self) {
        self.services.unregister(&self.key);
        debug!(module = %self.module_name, key = %self.key, "theme provider dropped");
    }
}

impl std::fmt::Debug for ThemeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.read();
        f.debug_struct("ThemeProvider")
            .field("module_name", &self.module_name)
            .field("key", &self.key)
            .field("theme", &active.name)
            .field("mode", &active.mode)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}
