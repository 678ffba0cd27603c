//! Temporary object references for uploaded blobs
//!
//! A blob is registered under a `blob:` URL so it can be handed to anything
//! that loads images by reference. References must be released explicitly;
//! [`ObjectUrlGuard`] does so on drop, which covers every exit path of a
//! submission including errors and cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// URL scheme used for registered blobs
pub const OBJECT_URL_SCHEME: &str = "blob:";

#[derive(Default)]
struct RegistryState {
    blobs: HashMap<String, Arc<Vec<u8>>>,
    created: u64,
    revoked: u64,
}

/// Registry of live object URLs. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl std::fmt::Debug for ObjectUrlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ObjectUrlRegistry")
            .field("live", &state.blobs.len())
            .field("created", &state.created)
            .field("revoked", &state.revoked)
            .finish()
    }
}

impl ObjectUrlRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a blob and return its URL
    pub fn create(&self, bytes: Vec<u8>) -> String {
        let url = format!("{}{}", OBJECT_URL_SCHEME, Uuid::new_v4());
        let mut state = self.lock();
        state.blobs.insert(url.clone(), Arc::new(bytes));
        state.created += 1;
        tracing::trace!(url = %url, live = state.blobs.len(), "Created object URL");
        url
    }

    /// Register a blob and tie its lifetime to the returned guard
    pub fn create_scoped(&self, bytes: Vec<u8>) -> ObjectUrlGuard {
        let url = self.create(bytes);
        ObjectUrlGuard {
            registry: self.clone(),
            url,
        }
    }

    /// Look up the blob behind a URL
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.lock().blobs.get(url).cloned()
    }

    /// Release a URL. Returns `false` if it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        let mut state = self.lock();
        let removed = state.blobs.remove(url).is_some();
        if removed {
            state.revoked += 1;
            tracing::trace!(url = %url, live = state.blobs.len(), "Revoked object URL");
        }
        removed
    }

    /// Number of URLs currently registered
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().blobs.len()
    }

    /// Total URLs ever created
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.lock().created
    }

    /// Total URLs released
    #[must_use]
    pub fn revoked_count(&self) -> u64 {
        self.lock().revoked
    }
}

/// Owns an object URL and revokes it on drop
#[derive(Debug)]
pub struct ObjectUrlGuard {
    registry: ObjectUrlRegistry,
    url: String,
}

impl ObjectUrlGuard {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrlGuard {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}
