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

//! End-to-end discovery tests: one provider and any number of bridges on a
//! shared bus, with Tokio's clock paused so the retry timer is deterministic.

use std::{
    collections::HashMap,
    sync::{
        Arc, Barrier, Mutex, Weak,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use themelink_store::{MemoryThemeStore, ThemeSelection, ThemeStore};
use themelink_theme::{
    BridgeConfig, ColorRole, ConnectionState, DEFAULT_RETRY_INTERVAL, LocalBus, MessageBus,
    MessageListener, NEUTRAL_GRAY, Rgb, ServiceKey, ServiceRegistry, ThemeApi, ThemeBridge,
    ThemeCallback, ThemeMessage, ThemeMode, ThemeProvider,
    message::{TOPIC_API_AVAILABLE, TOPIC_API_REQUEST, TOPIC_THEME_CHANGED},
};

const RETRY: Duration = DEFAULT_RETRY_INTERVAL;
const TICK: Duration = Duration::from_millis(1);

/// Local bus that counts sends per topic and can drop the next few
/// discovery requests.
#[derive(Default)]
struct TestBus {
    inner:         LocalBus,
    sent:          Mutex<HashMap<String, usize>>,
    drop_requests: AtomicUsize,
}

impl TestBus {
    fn dropping_requests(n: usize) -> Arc<Self> {
        let bus = Self::default();
        bus.drop_requests.store(n, Ordering::SeqCst);
        Arc::new(bus)
    }

    fn sent(&self, topic: &str) -> usize { self.sent.lock().unwrap().get(topic).copied().unwrap_or(0) }

    fn requests(&self) -> usize { self.sent(TOPIC_API_REQUEST) }
}

impl MessageBus for TestBus {
    fn send(&self, topic: &str, payload: Bytes) {
        *self.sent.lock().unwrap().entry(topic.to_string()).or_default() += 1;
        if topic == TOPIC_API_REQUEST
            && self
                .drop_requests
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return;
        }
        self.inner.send(topic, payload);
    }

    fn subscribe(&self, topic: &str, listener: Weak<dyn MessageListener>) {
        self.inner.subscribe(topic, listener);
    }
}

struct Session {
    bus:      Arc<TestBus>,
    services: Arc<ServiceRegistry>,
}

impl Session {
    fn new() -> Self { Self::with_bus(Arc::new(TestBus::default())) }

    fn with_bus(bus: Arc<TestBus>) -> Self {
        themelink_common_telemetry::init_default_ut_logging();
        Self {
            bus,
            services: Arc::new(ServiceRegistry::new()),
        }
    }

    fn provider(&self) -> Arc<ThemeProvider> {
        ThemeProvider::builder()
            .module_name("Gui")
            .bus(self.bus.clone())
            .services(self.services.clone())
            .start()
    }

    fn bridge(&self, module: &str) -> Arc<ThemeBridge> {
        ThemeBridge::builder()
            .config(BridgeConfig::builder().module_name(module).build())
            .bus(self.bus.clone())
            .services(self.services.clone())
            .start()
    }

    fn send(&self, message: &ThemeMessage) { self.bus.send(message.topic(), message.encode().unwrap()); }
}

fn counter() -> (Arc<AtomicUsize>, ThemeCallback) {
    let hits = Arc::new(AtomicUsize::new(0));
    let cb_hits = Arc::clone(&hits);
    let cb: ThemeCallback = Arc::new(move || {
        cb_hits.fetch_add(1, Ordering::SeqCst);
    });
    (hits, cb)
}

async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn disconnected_bridge_uses_fallback() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");

    assert_eq!(bridge.state(), ConnectionState::Requesting);
    assert!(!bridge.is_connected());
    assert_eq!(bridge.color(ColorRole::TextPrimary), Rgb::new(255, 255, 255));
    assert_eq!(bridge.color(ColorRole::Background1), Rgb::new(24, 24, 24));
    assert_eq!(bridge.color(ColorRole::HighlightPrimary), NEUTRAL_GRAY);
    assert_eq!(bridge.mode(), ThemeMode::Day);
    assert_eq!(bridge.theme_name(), "");
}

#[tokio::test(start_paused = true)]
async fn bridge_built_after_provider_connects_on_first_request() {
    let session = Session::new();
    let provider = session.provider();
    provider.apply_theme("Arctic", ThemeMode::Night);

    let bridge = session.bridge("Mixer");

    assert!(bridge.is_connected());
    assert_eq!(bridge.theme_name(), "Arctic");
    assert_eq!(bridge.mode(), ThemeMode::Night);
    assert_eq!(bridge.color(ColorRole::Background1), provider.color(ColorRole::Background1));
    assert_eq!(session.bus.requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn bridges_built_first_connect_on_announcement() {
    let session = Session::new();
    let bridges: Vec<_> = ["Mixer", "Sampler", "Sequencer"]
        .into_iter()
        .map(|m| session.bridge(m))
        .collect();
    assert!(bridges.iter().all(|b| !b.is_connected()));

    let _provider = session.provider();

    assert!(bridges.iter().all(|b| b.is_connected()));
    assert_eq!(session.bus.requests(), 3);
    for bridge in &bridges {
        assert_eq!(bridge.color(ColorRole::Background1), Rgb::new(21, 37, 55));
    }
}

#[tokio::test(start_paused = true)]
async fn missed_announcement_recovers_within_one_retry_period() {
    // The provider announces before the bridge exists, and the bridge's
    // first request is lost: only the retry timer can connect it.
    let session = Session::with_bus(TestBus::dropping_requests(1));
    let _provider = session.provider();
    let bridge = session.bridge("Mixer");
    assert!(!bridge.is_connected());

    advance(RETRY - TICK).await;
    assert!(!bridge.is_connected());

    advance(TICK * 2).await;
    assert!(bridge.is_connected());
    assert_eq!(session.bus.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_timer_stops_once_connected() {
    let session = Session::with_bus(TestBus::dropping_requests(3));
    let _provider = session.provider();
    let bridge = session.bridge("Mixer");

    advance(RETRY * 3 + TICK).await;
    assert!(bridge.is_connected());
    assert_eq!(session.bus.requests(), 4);

    advance(RETRY * 10).await;
    assert_eq!(session.bus.requests(), 4);
    assert!(!bridge.request_theme_api());
    assert_eq!(session.bus.requests(), 4);
}

#[tokio::test(start_paused = true)]
async fn retries_forever_without_provider() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");

    advance(RETRY * 5 + TICK).await;
    assert_eq!(session.bus.requests(), 6);
    assert_eq!(bridge.state(), ConnectionState::Requesting);
}

#[tokio::test(start_paused = true)]
async fn dropped_bridge_stops_retrying() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");
    advance(RETRY + TICK).await;
    assert_eq!(session.bus.requests(), 2);

    drop(bridge);
    advance(RETRY * 5).await;
    assert_eq!(session.bus.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn callbacks_registered_before_connection_are_mirrored_once() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");
    let (hits, cb) = counter();
    let id = bridge.add_change_callback(cb);

    let provider = session.provider();
    assert!(bridge.is_connected());
    // Connection repaints once through the bridge.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(provider.callback_count(), 1);

    // Both paths fire: the provider's registry and the bridge's fan-out on
    // the changed broadcast.
    provider.apply_theme("Storm", ThemeMode::Day);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    bridge.remove_change_callback(id);
    assert_eq!(provider.callback_count(), 0);
    provider.apply_theme("Storm", ThemeMode::Night);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn callbacks_registered_after_connection_notify_twice() {
    let session = Session::new();
    let provider = session.provider();
    let bridge = session.bridge("Mixer");
    let (hits, cb) = counter();
    bridge.add_change_callback(cb);
    assert_eq!(provider.callback_count(), 1);

    provider.apply_theme("Sunset", ThemeMode::Day);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // No-op apply: nobody hears anything.
    provider.apply_theme("Sunset", ThemeMode::Day);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn same_callback_twice_gets_distinct_ids() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");
    let (hits, cb) = counter();
    let first = bridge.add_change_callback(Arc::clone(&cb));
    let second = bridge.add_change_callback(cb);
    assert!(first < second);

    bridge.remove_change_callback(first);
    let provider = session.provider();
    assert_eq!(provider.callback_count(), 1);
    // one from the connection fan-out
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn on_connected_hooks_run_exactly_once() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");
    let runs = Arc::new(AtomicUsize::new(0));

    let r = Arc::clone(&runs);
    bridge.on_connected(move || {
        r.fetch_add(1, Ordering::SeqCst);
    });
    bridge.on_connected(|| panic!("hook failure"));
    let r = Arc::clone(&runs);
    bridge.on_connected(move || {
        r.fetch_add(10, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let provider = session.provider();
    assert_eq!(runs.load(Ordering::SeqCst), 11);

    // A repeated announcement does not replay hooks.
    provider.announce();
    assert_eq!(runs.load(Ordering::SeqCst), 11);

    // Once connected, hooks run immediately.
    let r = Arc::clone(&runs);
    bridge.on_connected(move || {
        r.fetch_add(100, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 111);
}

#[tokio::test(start_paused = true)]
async fn first_provider_wins() {
    let session = Session::new();
    let first = session.provider();
    let bridge = session.bridge("Mixer");

    let second = session.provider();
    second.apply_theme("Dark", ThemeMode::Night);

    // The second provider's broadcast refreshes the cache, but reads stay on
    // the provider the bridge connected to.
    assert_eq!(bridge.theme_name(), first.theme_name());
    assert_eq!(bridge.mode(), ThemeMode::Day);
    assert_eq!(bridge.color(ColorRole::HighlightPrimary), Rgb::new(11, 197, 209));
}

#[tokio::test(start_paused = true)]
async fn theme_change_is_visible_through_bridge() {
    let session = Session::new();
    let provider = session.provider();
    let bridge = session.bridge("Mixer");

    provider.apply_theme("Ocean", ThemeMode::Night);
    assert_eq!(bridge.mode(), ThemeMode::Night);
    assert_eq!(bridge.color(ColorRole::HighlightPrimary), Rgb::new(3, 49, 52));
    assert_eq!(session.bus.sent(TOPIC_THEME_CHANGED), 1);

    provider.apply_theme("DoesNotExist", ThemeMode::Day);
    assert_eq!(bridge.theme_name(), "Ocean");
    assert_eq!(session.bus.sent(TOPIC_THEME_CHANGED), 1);
}

#[tokio::test(start_paused = true)]
async fn unresolvable_announcement_is_ignored() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");

    session.send(&ThemeMessage::ThemeApiAvailable {
        handle: ServiceKey::new("theme-provider/forged"),
        theme:  "Dark".to_string(),
        mode:   ThemeMode::Night,
    });
    assert!(!bridge.is_connected());
    assert_eq!(bridge.mode(), ThemeMode::Day);

    // Retrying continues and a real provider still gets through.
    advance(RETRY + TICK).await;
    assert_eq!(session.bus.requests(), 2);
    let _provider = session.provider();
    assert!(bridge.is_connected());
}

#[tokio::test(start_paused = true)]
async fn malformed_and_early_messages_are_discarded() {
    let session = Session::new();
    let bridge = session.bridge("Mixer");
    let (hits, cb) = counter();
    bridge.add_change_callback(cb);

    session.bus.send(TOPIC_API_AVAILABLE, Bytes::from_static(b"\x00\x01garbage"));
    session
        .bus
        .send(TOPIC_API_AVAILABLE, Bytes::from_static(br#"{"type":"api_pointer","api":140737488355328}"#));
    session.send(&ThemeMessage::ThemeChanged {
        theme: "Storm".to_string(),
        mode:  ThemeMode::Night,
    });

    assert!(!bridge.is_connected());
    assert_eq!(bridge.mode(), ThemeMode::Day);
    assert_eq!(bridge.theme_name(), "");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_bridge_unregisters_mirrored_callbacks() {
    let session = Session::new();
    let provider = session.provider();
    let bridge = session.bridge("Mixer");
    let (hits, cb) = counter();
    bridge.add_change_callback(cb);
    assert_eq!(provider.callback_count(), 1);

    drop(bridge);
    assert_eq!(provider.callback_count(), 0);
    provider.apply_theme("Dark", ThemeMode::Day);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

fn stored_bridge(session: &Session, store: &Arc<MemoryThemeStore>) -> Arc<ThemeBridge> {
    ThemeBridge::builder()
        .config(
            BridgeConfig::builder()
                .module_name("Mixer")
                .retry_interval(Duration::from_millis(500))
                .build(),
        )
        .bus(session.bus.clone())
        .services(session.services.clone())
        .store(store.clone())
        .start()
}

fn selection(theme: &str, mode: &str) -> Option<ThemeSelection> {
    Some(ThemeSelection::builder().theme(theme).mode(mode).build())
}

#[tokio::test(start_paused = true)]
async fn bridge_seeds_cache_from_store() {
    let session = Session::new();
    let store = Arc::new(MemoryThemeStore::new());
    store
        .save("/PlugIns/Mixer", &ThemeSelection::builder().theme("Storm").mode("night").build())
        .unwrap();

    let bridge = stored_bridge(&session, &store);

    assert_eq!(bridge.theme_name(), "Storm");
    assert_eq!(bridge.mode(), ThemeMode::Night);
    // colors stay on the fallback palette until connected
    assert_eq!(bridge.color(ColorRole::TextPrimary), Rgb::new(255, 255, 255));

    advance(Duration::from_millis(501)).await;
    assert_eq!(session.bus.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn bridge_saves_what_it_learns_and_restores_it() {
    let session = Session::new();
    let store = Arc::new(MemoryThemeStore::new());
    let bridge = stored_bridge(&session, &store);
    assert_eq!(store.load("/PlugIns/Mixer").unwrap(), None);

    // Connecting saves the provider's selection.
    let provider = session.provider();
    assert!(bridge.is_connected());
    assert_eq!(store.load("/PlugIns/Mixer").unwrap(), selection("Ocean", "day"));

    // So does every change broadcast afterwards.
    provider.apply_theme("Sunset", ThemeMode::Night);
    assert_eq!(store.load("/PlugIns/Mixer").unwrap(), selection("Sunset", "night"));

    // Without a provider, a restarted module shows what it saw last.
    drop(bridge);
    drop(provider);
    let restarted = stored_bridge(&session, &store);
    assert!(!restarted.is_connected());
    assert_eq!(restarted.theme_name(), "Sunset");
    assert_eq!(restarted.mode(), ThemeMode::Night);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registrations_racing_the_connection_are_mirrored_exactly_once() {
    const CALLBACKS: usize = 100;
    for _ in 0..20 {
        let session = Session::new();
        let bridge = session.bridge("Mixer");
        let start = Barrier::new(2);

        let provider = thread::scope(|scope| {
            scope.spawn(|| {
                start.wait();
                for _ in 0..CALLBACKS {
                    let (_, cb) = counter();
                    bridge.add_change_callback(cb);
                }
            });
            start.wait();
            session.provider()
        });

        assert!(bridge.is_connected());
        assert_eq!(bridge.callback_count(), CALLBACKS);
        assert_eq!(bridge.mirrored_count(), CALLBACKS);
        assert_eq!(provider.callback_count(), CALLBACKS);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_applies_leave_every_namespace_on_the_final_theme() {
    let session = Session::new();
    let store = Arc::new(MemoryThemeStore::new());
    let provider = ThemeProvider::builder()
        .module_name("Gui")
        .bus(session.bus.clone())
        .services(session.services.clone())
        .store(store.clone())
        .start();
    let bridge = stored_bridge(&session, &store);
    assert!(bridge.is_connected());

    thread::scope(|scope| {
        for theme in ["Arctic", "Storm", "Sunset"] {
            let provider = &provider;
            scope.spawn(move || {
                for i in 0..100 {
                    let mode = if i % 2 == 0 { ThemeMode::Night } else { ThemeMode::Day };
                    provider.apply_theme(theme, mode);
                }
            });
        }
    });

    let expected = selection(&provider.theme_name(), &provider.mode().to_string());
    assert_eq!(store.load("/PlugIns/Gui").unwrap(), expected);
    assert_eq!(store.load("/PlugIns/Mixer").unwrap(), expected);
}
