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
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use async_trait::async_trait;
use bon::bon;
use strum_macros::{AsRefStr, Display};
use themelink_common_worker::{
    Manager, Trigger, WorkError, WorkResult, Worker, WorkerConfig, WorkerContext, WorkerHandle,
};
use themelink_store::{ThemeSelection, ThemeStore, namespace};
use tracing::{debug, error, info, trace, warn};

use crate::{
    api::ThemeApi,
    bus::{MessageBus, MessageListener},
    color::{ColorRole, Rgb, ThemeMode},
    message::{self, TOPIC_API_AVAILABLE, TOPIC_THEME_CHANGED, ThemeMessage},
    palette::Palette,
    registry::{CallbackId, CallbackRegistry, ThemeCallback, panic_message},
    service::{ServiceKey, ServiceRegistry},
};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, bon::Builder)]
pub struct BridgeConfig {
    /// Sent as `sender_id` in discovery requests; also the store namespace
    /// the cached theme name and mode are seeded from and saved to.
    #[builder(into)]
    pub module_name:    String,
    /// Period between discovery retries while not connected.
    #[builder(default = DEFAULT_RETRY_INTERVAL)]
    pub retry_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    /// A discovery request is outstanding. Looks like `Disconnected` to callers.
    Requesting,
    Connected,
}

type ConnectedHook = Box<dyn FnOnce() + Send>;

struct Link {
    state:        ConnectionState,
    provider:     Option<Arc<dyn ThemeApi>>,
    theme_name:   String,
    mode:         ThemeMode,
    // local id -> id of the mirrored registration on the provider
    remote_ids:   HashMap<CallbackId, CallbackId>,
    on_connected: Vec<ConnectedHook>,
    retry:        Option<WorkerHandle>,
    workers:      Option<Manager>,
}

/// A module's view of the theme when it does not own it.
///
/// Until a provider is found, colors come from [`Palette::fallback`] and the
/// mode from the local cache. The bridge asks for the provider when it
/// starts and then on every retry tick. The first announcement it can
/// resolve connects it for good. From then on colors and mode are read live
/// from the provider, callbacks registered before the connection are
/// mirrored onto the provider, and the retry timer is stopped.
pub struct ThemeBridge {
    config:   BridgeConfig,
    bus:      Arc<dyn MessageBus>,
    services: Arc<ServiceRegistry>,
    store:    Option<Arc<dyn ThemeStore>>,
    fallback: Palette,
    local:    CallbackRegistry,
    link:     Mutex<Link>,
}

#[bon]
impl ThemeBridge {
    /// Subscribe, send the first discovery request and arm the retry timer.
    ///
    /// The timer runs on the caller's Tokio runtime if there is one, else on
    /// the shared background runtime, unless `worker_config` names one.
    #[builder(finish_fn = start)]
    pub fn new(
        config: BridgeConfig,
        bus: Arc<dyn MessageBus>,
        services: Arc<ServiceRegistry>,
        store: Option<Arc<dyn ThemeStore>>,
        worker_config: Option<WorkerConfig>,
    ) -> Arc<Self> {
        let (theme_name, mode) = store
            .as_ref()
            .and_then(|store| match store.load(&namespace(&config.module_name)) {
                Ok(selection) => selection,
                Err(error) => {
                    warn!(module = %config.module_name, %error, "failed to load cached theme");
                    None
                }
            })
            .map_or_else(
                || (String::new(), ThemeMode::Day),
                |s| (s.theme, ThemeMode::from_stored(&s.mode)),
            );

        let bridge = Arc::new(Self {
            config,
            bus,
            services,
            store,
            fallback: Palette::fallback(),
            local: CallbackRegistry::new(),
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                provider: None,
                theme_name,
                mode,
                remote_ids: HashMap::new(),
                on_connected: Vec::new(),
                retry: None,
                workers: None,
            }),
        });

        for topic in [TOPIC_API_AVAILABLE, TOPIC_THEME_CHANGED] {
            let listener: Weak<dyn MessageListener> =
                Arc::downgrade(&bridge) as Weak<dyn MessageListener>;
            bridge.bus.subscribe(topic, listener);
        }
        info!(module = %bridge.config.module_name, "theme bridge started");

        bridge.request_theme_api();
        bridge.arm_retry(worker_config.unwrap_or_default());
        bridge
    }
}

impl ThemeBridge {
    fn lock(&self) -> MutexGuard<'_, Link> { self.link.lock().unwrap_or_else(PoisonError::into_inner) }

    fn arm_retry(self: &Arc<Self>, worker_config: WorkerConfig) {
        let mut link = self.lock();
        if link.state == ConnectionState::Connected {
            debug!(module = %self.config.module_name, "connected on first request, no retry timer");
            return;
        }
        let mut workers = Manager::new(worker_config);
        let handle = workers.register(DiscoveryWorker {
            bridge: Arc::downgrade(self),
            period: self.config.retry_interval,
        });
        link.retry = Some(handle);
        link.workers = Some(workers);
    }

    #[must_use]
    pub fn module_name(&self) -> &str { &self.config.module_name }

    #[must_use]
    pub fn state(&self) -> ConnectionState { self.lock().state }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.state() == ConnectionState::Connected }

    /// Callbacks registered on this bridge.
    #[must_use]
    pub fn callback_count(&self) -> usize { self.local.len() }

    /// Registrations currently mirrored onto the provider.
    #[must_use]
    pub fn mirrored_count(&self) -> usize { self.lock().remote_ids.len() }

    /// Ask any provider to announce itself. Does nothing once connected.
    /// Returns whether a request was sent.
    ///
    /// A connection committed on another thread between the final check and
    /// the send can still let one request out. The provider's answer to it
    /// is ignored.
    pub fn request_theme_api(&self) -> bool {
        {
            let mut link = self.lock();
            if link.state == ConnectionState::Connected {
                return false;
            }
            link.state = ConnectionState::Requesting;
        }
        // Sent without the lock: a provider on a synchronous bus answers
        // before `send` returns. Re-checked since a retry tick may race an
        // announcement handled on another thread.
        if self.is_connected() {
            trace!(module = %self.config.module_name, "connected meanwhile, request dropped");
            return false;
        }
        message::send(
            self.bus.as_ref(),
            &ThemeMessage::RequestThemeApi {
                sender_id: self.config.module_name.clone(),
            },
        );
        true
    }

    /// Run `hook` once a provider is connected: now if it already is,
    /// otherwise exactly once on connection.
    pub fn on_connected(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut link = self.lock();
            if link.state != ConnectionState::Connected {
                link.on_connected.push(Box::new(hook));
                return;
            }
        }
        self.run_hook(Box::new(hook));
    }

    fn run_hook(&self, hook: ConnectedHook) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(hook)) {
            error!(
                module = %self.config.module_name,
                panic = panic_message(panic.as_ref()),
                "on-connected hook panicked"
            );
        }
    }

    fn connect(&self, handle: &ServiceKey, theme: String, mode: ThemeMode) {
        if self.is_connected() {
            trace!(module = %self.config.module_name, %handle, "already connected, announcement ignored");
            return;
        }
        let provider = match self.services.resolve::<dyn ThemeApi>(handle) {
            Ok(provider) => provider,
            Err(error) => {
                warn!(module = %self.config.module_name, %handle, %error, "cannot resolve announced theme api");
                return;
            }
        };

        let hooks = {
            let mut guard = self.lock();
            let link = &mut *guard;
            if link.state == ConnectionState::Connected {
                return;
            }
            // Registrations are made under the same lock `add_change_callback`
            // takes, so none is mirrored twice or missed.
            for (id, callback) in self.local.snapshot() {
                let remote = provider.add_change_callback(callback);
                link.remote_ids.insert(id, remote);
            }
            info!(
                module = %self.config.module_name,
                %handle,
                theme = %theme,
                %mode,
                mirrored = link.remote_ids.len(),
                "connected to theme provider"
            );
            link.provider = Some(provider);
            link.state = ConnectionState::Connected;
            link.theme_name = theme;
            link.mode = mode;
            self.persist(link);
            if let Some(retry) = link.retry.take() {
                retry.cancel();
            }
            std::mem::take(&mut link.on_connected)
        };

        for hook in hooks {
            self.run_hook(hook);
        }
        // Repaint anything drawn with fallback colors.
        self.local.notify_all();
    }

    fn theme_changed(&self, theme: String, mode: ThemeMode) {
        {
            let mut link = self.lock();
            if link.state != ConnectionState::Connected {
                debug!(module = %self.config.module_name, theme = %theme, "theme change before connection ignored");
                return;
            }
            debug!(module = %self.config.module_name, theme = %theme, %mode, "theme changed");
            link.theme_name = theme;
            link.mode = mode;
            self.persist(&link);
        }
        self.local.notify_all();
    }

    fn provider(&self) -> Option<Arc<dyn ThemeApi>> { self.lock().provider.clone() }

    // Called with the link locked so saves land in the order the cache
    // changed.
    fn persist(&self, link: &Link) {
        let Some(store) = &self.store else {
            return;
        };
        let selection = ThemeSelection::builder()
            .theme(link.theme_name.as_str())
            .mode(link.mode.to_string())
            .build();
        if let Err(error) = store.save(&namespace(&self.config.module_name), &selection) {
            warn!(module = %self.config.module_name, %error, "failed to persist cached theme");
        }
    }
}

impl ThemeApi for ThemeBridge {
    fn color(&self, role: ColorRole) -> Rgb {
        self.provider()
            .map_or_else(|| self.fallback.get(role), |p| p.color(role))
    }

    fn mode(&self) -> ThemeMode {
        let (provider, cached) = {
            let link = self.lock();
            (link.provider.clone(), link.mode)
        };
        provider.map_or(cached, |p| p.mode())
    }

    fn theme_name(&self) -> String {
        let (provider, cached) = {
            let link = self.lock();
            (link.provider.clone(), link.theme_name.clone())
        };
        provider.map_or(cached, |p| p.theme_name())
    }

    /// Always registered locally. Once connected the registration is also
    /// mirrored onto the provider, so a change reaches the callback twice:
    /// once from the provider and once from the bridge's own fan-out.
    fn add_change_callback(&self, callback: ThemeCallback) -> CallbackId {
        let mut guard = self.lock();
        let link = &mut *guard;
        let id = self.local.add(Arc::clone(&callback));
        if let Some(provider) = &link.provider {
            let remote = provider.add_change_callback(callback);
            link.remote_ids.insert(id, remote);
        }
        id
    }

    fn remove_change_callback(&self, id: CallbackId) {
        let mut guard = self.lock();
        let link = &mut *guard;
        self.local.remove(id);
        if let (Some(remote), Some(provider)) = (link.remote_ids.remove(&id), &link.provider) {
            provider.remove_change_callback(remote);
        }
    }
}

impl MessageListener for ThemeBridge {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        match ThemeMessage::decode(topic, payload) {
            Ok(ThemeMessage::ThemeApiAvailable {
                handle,
                theme,
                mode,
            }) => self.connect(&handle, theme, mode),
            Ok(ThemeMessage::ThemeChanged { theme, mode }) => self.theme_changed(theme, mode),
            Ok(other) => trace!(kind = other.kind(), "not for the bridge"),
            Err(error) => message::discard(topic, &error),
        }
    }
}

impl Drop for ThemeBridge {
    fn drop(&mut self) {
        let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(retry) = link.retry.take() {
            retry.cancel();
        }
        // The provider outlives us; stop it calling into this module.
        if let Some(provider) = &link.provider {
            for remote in link.remote_ids.values() {
                provider.remove_change_callback(*remote);
            }
        }
        debug!(module = %self.config.module_name, "theme bridge dropped");
    }
}

impl std::fmt::Debug for ThemeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = self.lock();
        f.debug_struct("ThemeBridge")
            .field("module_name", &self.config.module_name)
            .field("state", &link.state)
            .field("theme_name", &link.theme_name)
            .field("mode", &link.mode)
            .field("callbacks", &self.local.len())
            .field("timer_workers", &link.workers.as_ref().map(Manager::len))
            .finish_non_exhaustive()
    }
}

/// Re-sends the discovery request every period until the bridge connects
/// or goes away.
struct DiscoveryWorker {
    bridge: Weak<ThemeBridge>,
    period: Duration,
}

#[async_trait]
impl Worker for DiscoveryWorker {
    fn name(&self) -> &'static str { "theme-discovery" }

    fn trigger(&self) -> Trigger { Trigger::Interval(self.period) }

    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        let Some(bridge) = self.bridge.upgrade() else {
            return Err(WorkError::fatal("theme bridge dropped"));
        };
        // The tick may have been queued before the connection cancelled us.
        if ctx.is_cancelled() || bridge.is_connected() {
            return Ok(());
        }
        debug!(module = %bridge.config.module_name, "retrying theme api discovery");
        bridge.request_theme_api();
        Ok(())
    }
}
