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

//! Host message channel contract and the in-process implementation.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, Weak},
};

use bytes::Bytes;
use tracing::trace;

/// Receives messages for the topics it subscribed to.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, topic: &str, payload: &[u8]);
}

/// Best-effort broadcast keyed by topic.
///
/// Sending is fire-and-forget: no acknowledgement, no ordering across topics
/// or senders, and a listener that subscribes after a send never sees it.
pub trait MessageBus: Send + Sync {
    fn send(&self, topic: &str, payload: Bytes);

    /// Listeners are held weakly and dropped from the bus once they die.
    fn subscribe(&self, topic: &str, listener: Weak<dyn MessageListener>);
}

/// Synchronous in-process bus.
///
/// Delivery happens on the sending thread, to a snapshot of the topic's
/// listeners taken before the first one runs. Listeners may therefore send
/// or subscribe from inside `on_message`.
#[derive(Default)]
pub struct LocalBus {
    topics: RwLock<HashMap<String, Vec<Weak<dyn MessageListener>>>>,
}

impl LocalBus {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Live listeners on `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, |ls| ls.iter().filter(|l| l.strong_count() > 0).count())
    }
}

impl MessageBus for LocalBus {
    fn send(&self, topic: &str, payload: Bytes) {
        let listeners: Vec<_> = {
            let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
            let Some(listeners) = topics.get_mut(topic) else {
                trace!(topic, "no listeners");
                return;
            };
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        trace!(topic, listeners = listeners.len(), bytes = payload.len(), "delivering");
        for listener in listeners {
            listener.on_message(topic, &payload);
        }
    }

    fn subscribe(&self, topic: &str, listener: Weak<dyn MessageListener>) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(listener);
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map()
            .entries(topics.iter().map(|(t, ls)| (t, ls.len())))
            .finish()
    }
}
