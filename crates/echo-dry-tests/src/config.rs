// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory engine settings store for tests.

use echo_naming::{ConfigError, ConfigStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory [`ConfigStore`] keyed by geometry name.
///
/// Clones share their contents. Loads can be told to fail, and saves are
/// counted.
///
/// # Example
///
/// ```
/// use echo_dry_tests::InMemoryConfigStore;
/// use echo_naming::{ConfigService, EngineConfig};
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
///
/// service.save("Pad", &EngineConfig { tag: 3, ..EngineConfig::default() }).unwrap();
/// assert_eq!(service.load("Pad").unwrap().tag, 3);
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    settings: HashMap<String, String>,
    save_count: usize,
    fail_on_load: bool,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `json` for `geometry`.
    pub fn with_json(geometry: &str, json: &str) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .settings
            .insert(geometry.to_owned(), json.to_owned());
        store
    }

    /// Make every load fail with [`ConfigError::Store`].
    pub fn set_fail_on_load(&self, fail: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).fail_on_load = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .save_count
    }

    /// Stored JSON for `geometry`.
    pub fn raw(&self, geometry: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .settings
            .get(geometry)
            .cloned()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, geometry: &str) -> Result<Option<String>, ConfigError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.fail_on_load {
            return Err(ConfigError::Store {
                geometry: geometry.to_owned(),
                message: "simulated load failure".into(),
            });
        }
        Ok(inner.settings.get(geometry).cloned())
    }

    fn save_raw(&self, geometry: &str, json: &str) -> Result<(), ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.save_count += 1;
        inner.settings.insert(geometry.to_owned(), json.to_owned());
        Ok(())
    }
}
