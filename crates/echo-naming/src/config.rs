// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-geometry engine settings and where they are kept.
//!
//! Each geometry in a document owns one [`NamingEngine`]. Its settings are
//! stored as JSON under the geometry's name through a [`ConfigStore`], and
//! [`ConfigService`] turns them back into typed [`EngineConfig`] values or
//! ready-to-use engines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_ELEMENT_TYPES;
use crate::engine::NamingEngine;

/// Per-geometry settings of a [`NamingEngine`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Indexed name prefixes the geometry declares.
    pub element_types: Vec<String>,
    /// Tag of the owning geometry; `0` when untagged.
    pub tag: i64,
    /// Companion file element maps are saved to instead of inline.
    pub persistence_file: Option<String>,
    /// Texts longer than this are stored as digests by
    /// [`MemoryHasher`](crate::MemoryHasher).
    pub digest_threshold: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            element_types: DEFAULT_ELEMENT_TYPES.iter().map(|&t| t.to_owned()).collect(),
            tag: 0,
            persistence_file: None,
            digest_threshold: None,
        }
    }
}

impl EngineConfig {
    /// First declared element type that cannot prefix an indexed name.
    ///
    /// Indexed names split into a type prefix and a decimal index, so a type
    /// must be a non-empty run of ASCII letters.
    pub fn invalid_element_type(&self) -> Option<&str> {
        self.element_types
            .iter()
            .map(String::as_str)
            .find(|ty| ty.is_empty() || !ty.bytes().all(|b| b.is_ascii_alphabetic()))
    }
}

/// Errors raised while loading or saving engine settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing store failed.
    #[error("config store failed for geometry {geometry:?}: {message}")]
    Store {
        /// Geometry whose settings were being accessed.
        geometry: String,
        /// What the store reported.
        message: String,
    },
    /// The stored settings are not valid engine config JSON.
    #[error("engine config for geometry {geometry:?} is not valid JSON: {source}")]
    Json {
        /// Geometry whose settings were being decoded.
        geometry: String,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// An element type cannot prefix indexed names.
    #[error("engine config for geometry {geometry:?} declares invalid element type {element_type:?}")]
    InvalidElementType {
        /// Geometry the settings belong to.
        geometry: String,
        /// The offending type prefix.
        element_type: String,
    },
}

/// Storage port for per-geometry engine settings, as JSON text.
pub trait ConfigStore {
    /// Stored JSON for `geometry`, or `None` when nothing was saved.
    fn load_raw(&self, geometry: &str) -> Result<Option<String>, ConfigError>;
    /// Replace the stored JSON for `geometry`.
    fn save_raw(&self, geometry: &str, json: &str) -> Result<(), ConfigError>;
}

/// Typed access to engine settings kept in a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

fn check(geometry: &str, config: &EngineConfig) -> Result<(), ConfigError> {
    match config.invalid_element_type() {
        Some(ty) => Err(ConfigError::InvalidElementType {
            geometry: geometry.to_owned(),
            element_type: ty.to_owned(),
        }),
        None => Ok(()),
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Settings of `geometry`. Missing or blank entries yield the defaults;
    /// missing fields take their default values.
    pub fn load(&self, geometry: &str) -> Result<EngineConfig, ConfigError> {
        let config = match self.store.load_raw(geometry)? {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str(&json).map_err(|source| ConfigError::Json {
                    geometry: geometry.to_owned(),
                    source,
                })?
            }
            _ => EngineConfig::default(),
        };
        check(geometry, &config)?;
        Ok(config)
    }

    /// Validate and store the settings of `geometry`.
    pub fn save(&self, geometry: &str, config: &EngineConfig) -> Result<(), ConfigError> {
        check(geometry, config)?;
        let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
            geometry: geometry.to_owned(),
            source,
        })?;
        self.store.save_raw(geometry, &json)
    }

    /// A fresh engine for `geometry`, set up from its stored settings.
    pub fn engine_for(&self, geometry: &str) -> Result<NamingEngine, ConfigError> {
        Ok(NamingEngine::from_config(&self.load(geometry)?))
    }
}
