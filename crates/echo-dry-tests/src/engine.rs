// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Naming engine builder utilities for tests.

use std::sync::Arc;

use echo_naming::{
    AllocationSink, DisambiguationPolicy, EngineConfig, EngineError, HasherRef, MemoryHasher,
    NamingEngine,
};

/// Builder for creating test engines with common configurations.
///
/// # Example
///
/// ```
/// use echo_dry_tests::EngineTestBuilder;
///
/// let engine = EngineTestBuilder::new()
///     .with_tag(7)
///     .with_hashing()
///     .with_entry("Face1", "XTRUDE")
///     .build()
///     .unwrap();
/// assert_eq!(engine.map_size(), 1);
/// ```
pub struct EngineTestBuilder {
    config: EngineConfig,
    hashing: bool,
    hasher: Option<HasherRef>,
    policy: Option<Box<dyn DisambiguationPolicy>>,
    sink: Option<Arc<dyn AllocationSink>>,
    entries: Vec<(String, String)>,
}

impl Default for EngineTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineTestBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            hashing: false,
            hasher: None,
            policy: None,
            sink: None,
            entries: Vec::new(),
        }
    }

    /// Start from an explicit configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the owner tag.
    pub fn with_tag(mut self, tag: i64) -> Self {
        self.config.tag = tag;
        self
    }

    /// Attach a fresh [`MemoryHasher`] built from the configuration.
    pub fn with_hashing(mut self) -> Self {
        self.hashing = true;
        self
    }

    /// Attach an existing hasher, e.g. one shared with another engine.
    pub fn with_hasher(mut self, hasher: HasherRef) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Save element maps to the named companion file.
    pub fn with_persistence_file(mut self, name: &str) -> Self {
        self.config.persistence_file = Some(name.to_owned());
        self
    }

    /// Use `policy` for disambiguation.
    pub fn with_policy(mut self, policy: impl DisambiguationPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Report map allocations to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn AllocationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Assign `name` to `indexed` once the engine is built.
    pub fn with_entry(mut self, indexed: &str, name: &str) -> Self {
        self.entries.push((indexed.to_owned(), name.to_owned()));
        self
    }

    /// Build the engine and apply the seed entries in order.
    pub fn build(self) -> Result<NamingEngine, EngineError> {
        let mut engine = NamingEngine::from_config(&self.config);
        let hasher = self.hasher.or_else(|| {
            self.hashing
                .then(|| Arc::new(MemoryHasher::from_config(&self.config)) as HasherRef)
        });
        engine.set_hasher(hasher);
        if let Some(policy) = self.policy {
            engine.set_policy(policy);
        }
        if let Some(sink) = self.sink {
            engine = engine.with_sink(sink);
        }
        for (indexed, name) in &self.entries {
            engine.assign(indexed, name)?;
        }
        Ok(engine)
    }
}
