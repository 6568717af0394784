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
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::error;

use crate::metrics::CALLBACK_PANICS;

/// Change-notification closure.
pub type ThemeCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registration within one [`CallbackRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("cb-{_0}")]
pub struct CallbackId(u64);

impl CallbackId {
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

#[derive(Default)]
struct Slots {
    next_id: u64,
    // Ids are handed out in increasing order, so key order is insertion order.
    entries: BTreeMap<CallbackId, ThemeCallback>,
}

/// Multi-subscriber change notification list.
///
/// Ids start at 1, increase strictly and are never reused, even after
/// removal. Notification runs on a snapshot taken without holding the lock,
/// so handlers may add or remove registrations while being notified.
#[derive(Default)]
pub struct CallbackRegistry {
    slots: Mutex<Slots>,
}

impl CallbackRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, callback: ThemeCallback) -> CallbackId {
        let mut slots = self.lock();
        slots.next_id += 1;
        let id = CallbackId(slots.next_id);
        slots.entries.insert(id, callback);
        id
    }

    /// Returns whether `id` was registered. Removing an unknown id is a no-op.
    pub fn remove(&self, id: CallbackId) -> bool { self.lock().entries.remove(&id).is_some() }

    #[must_use]
    pub fn len(&self) -> usize { self.lock().entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().entries.is_empty() }

    /// Live registrations in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(CallbackId, ThemeCallback)> {
        self.lock()
            .entries
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect()
    }

    /// Invoke every handler registered at the time of the call. A panicking
    /// handler is logged and skipped. Returns how many handlers completed.
    pub fn notify_all(&self) -> usize {
        let snapshot = self.snapshot();
        let mut completed = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    CALLBACK_PANICS.inc();
                    error!(callback = %id, panic = panic_message(panic.as_ref()), "theme change callback panicked");
                }
            }
        }
        completed
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_struct("CallbackRegistry")
            .field("next_id", &slots.next_id)
            .field("len", &slots.entries.len())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
