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

//! Typed, process-local service lookup.
//!
//! A provider registers a weak reference to itself under a [`ServiceKey`] and
//! announces only the key. A consumer resolves the key back into a typed
//! `Arc`. A key that is unknown, whose service has been dropped, or that was
//! registered under a different type resolves to an error, never to a
//! dangling reference.

use std::{
    any::{Any, type_name},
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, Weak},
};

use serde::{Deserialize, Serialize};
use snafu::Snafu;
use tracing::debug;

/// Stable string identifier of a registered service.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display, derive_more::From,
)]
#[serde(transparent)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

    /// `<prefix>/<uuid>`, unique per call.
    #[must_use]
    pub fn unique(prefix: &str) -> Self { Self(format!("{prefix}/{}", uuid::Uuid::new_v4())) }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ResolveError {
    #[snafu(display("no service registered under {key}"))]
    Unknown { key: ServiceKey },

    #[snafu(display("service {key} has been dropped"))]
    Dropped { key: ServiceKey },

    #[snafu(display("service {key} is not a {expected}"))]
    TypeMismatch { key: ServiceKey, expected: &'static str },
}

struct Entry {
    // Always a `Weak<T>` for the `T` it was registered with.
    service:   Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Shared by the provider and every consumer in a process. Built by the
/// composition root and passed in explicitly.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<HashMap<ServiceKey, Entry>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `service` under `key`, replacing any previous entry. Only a
    /// weak reference is kept: the registry never extends a service's life.
    pub fn register<T>(&self, key: ServiceKey, service: Weak<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        debug!(%key, service = type_name::<T>(), "service registered");
        let entry = Entry {
            service:   Box::new(service),
            type_name: type_name::<T>(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    pub fn unregister(&self, key: &ServiceKey) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if removed {
            debug!(%key, "service unregistered");
        }
        removed
    }

    pub fn resolve<T>(&self, key: &ServiceKey) -> Result<Arc<T>, ResolveError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(key)
            .ok_or_else(|| UnknownSnafu { key: key.clone() }.build())?;
        let weak = entry.service.downcast_ref::<Weak<T>>().ok_or_else(|| {
            TypeMismatchSnafu {
                key:      key.clone(),
                expected: type_name::<T>(),
            }
            .build()
        })?;
        weak.upgrade()
            .ok_or_else(|| DroppedSnafu { key: key.clone() }.build())
    }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.read().unwrap_or_else(PoisonError::into_inner).len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map()
            .entries(entries.iter().map(|(k, e)| (k.as_str(), e.type_name)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String { "hello".to_string() }
    }

    #[test]
    fn resolves_trait_object() {
        let registry = ServiceRegistry::new();
        let service: Arc<dyn Greeter> = Arc::new(English);
        let key = ServiceKey::unique("greeter");
        registry.register(key.clone(), Arc::downgrade(&service));

        let resolved = registry.resolve::<dyn Greeter>(&key).unwrap();
        assert_eq!(resolved.greet(), "hello");
        assert!(Arc::ptr_eq(&resolved, &service));
    }

    #[test]
    fn unknown_key_fails_closed() {
        let registry = ServiceRegistry::new();
        let key = ServiceKey::new("theme-provider/0");
        assert_eq!(
            registry.resolve::<dyn Greeter>(&key).err(),
            Some(ResolveError::Unknown { key })
        );
    }

    #[test]
    fn dropped_service_fails_closed() {
        let registry = ServiceRegistry::new();
        let key = ServiceKey::unique("greeter");
        {
            let service: Arc<dyn Greeter> = Arc::new(English);
            registry.register(key.clone(), Arc::downgrade(&service));
        }
        assert!(matches!(
            registry.resolve::<dyn Greeter>(&key),
            Err(ResolveError::Dropped { .. })
        ));
    }

    #[test]
    fn wrong_type_fails_closed() {
        let registry = ServiceRegistry::new();
        let key = ServiceKey::unique("greeter");
        let service = Arc::new(English);
        // Registered as the concrete type, looked up as the trait object.
        registry.register(key.clone(), Arc::downgrade(&service));
        assert!(matches!(
            registry.resolve::<dyn Greeter>(&key),
            Err(ResolveError::TypeMismatch { .. })
        ));
        assert!(registry.resolve::<English>(&key).is_ok());
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = ServiceRegistry::new();
        let service: Arc<dyn Greeter> = Arc::new(English);
        let key = ServiceKey::unique("greeter");
        registry.register(key.clone(), Arc::downgrade(&service));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&key));
        assert!(!registry.unregister(&key));
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_unique_and_transparent() {
        let a = ServiceKey::unique("theme-provider");
        let b = ServiceKey::unique("theme-provider");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("theme-provider/"));
        assert_eq!(serde_json::to_string(&a).unwrap(), format!("\"{a}\""));
    }
}
