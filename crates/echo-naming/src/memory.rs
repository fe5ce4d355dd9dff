// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory string hasher.
//!
//! [`MemoryHasher`] is the reference [`StringHasher`]: a document-lifetime
//! table of texts. Texts above an optional digest threshold are stored as a
//! BLAKE3 digest instead of verbatim, which keeps the table small for very long
//! generated names at the cost of making those ids one-way.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::ident::{StringHasher, StringId, StringIdRef};

/// In-memory, thread-safe [`StringHasher`].
///
/// # Invariants
///
/// - Ids are dense and start at 1; `0` is the null id.
/// - The same text always maps to the same id.
/// - Digested texts compare by digest, so two long texts only share an id
///   when their BLAKE3 digests collide.
pub struct MemoryHasher {
    inner: Mutex<Inner>,
    digest_threshold: Option<usize>,
    null: StringIdRef,
}

#[derive(Default)]
struct Inner {
    by_key: FxHashMap<String, StringIdRef>,
    by_value: Vec<StringIdRef>,
}

impl MemoryHasher {
    /// Create a hasher that stores every text verbatim.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            digest_threshold: None,
            null: StringIdRef::new(StringId::new(0, "", false)),
        }
    }

    /// Create a hasher that digests texts longer than `threshold` bytes.
    pub fn with_digest_threshold(threshold: usize) -> Self {
        Self {
            digest_threshold: Some(threshold),
            ..Self::new()
        }
    }

    /// Create a hasher using the digest threshold from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            digest_threshold: config.digest_threshold,
            ..Self::new()
        }
    }

    /// Convenience for the shared form engines hold.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of ids minted so far (the null id excluded).
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_value
            .len()
    }

    /// Returns `true` if no ids were minted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_for(&self, text: &str) -> (String, bool) {
        match self.digest_threshold {
            Some(limit) if text.len() > limit => (blake3::hash(text.as_bytes()).to_hex().to_string(), true),
            _ => (text.to_owned(), false),
        }
    }
}

impl Default for MemoryHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StringHasher for MemoryHasher {
    fn id_for_text(&self, text: &str) -> StringIdRef {
        let (key, hashed) = self.key_for(text);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = inner.by_key.get(&key) {
            return existing.clone();
        }
        let value = i64::try_from(inner.by_value.len()).unwrap_or(i64::MAX - 1) + 1;
        let id = StringIdRef::new(StringId::new(value, key.clone(), hashed));
        inner.by_value.push(id.clone());
        inner.by_key.insert(key, id.clone());
        id
    }

    fn id_for_value(&self, value: i64) -> Option<StringIdRef> {
        if value == 0 {
            return Some(self.null.clone());
        }
        let index = usize::try_from(value.checked_sub(1)?).ok()?;
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_value
            .get(index)
            .cloned()
    }

    fn null_id(&self) -> StringIdRef {
        self.null.clone()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_id() {
        let hasher = MemoryHasher::new();
        let a = hasher.id_for_text("Face");
        let b = hasher.id_for_text("Face");
        assert_eq!(a, b);
        assert_eq!(a.value(), 1);
        assert_eq!(hasher.len(), 1);
    }

    #[test]
    fn values_resolve_back() {
        let hasher = MemoryHasher::new();
        let id = hasher.id_for_text("Edge");
        let resolved = hasher.id_for_value(id.value()).unwrap();
        assert_eq!(resolved.text(), "Edge");
        assert!(hasher.id_for_value(99).is_none());
        assert!(hasher.id_for_value(-3).is_none());
        assert!(hasher.id_for_value(0).unwrap().is_null());
    }

    #[test]
    fn long_text_is_digested() {
        let hasher = MemoryHasher::with_digest_threshold(8);
        let short = hasher.id_for_text("short");
        let long = hasher.id_for_text("a-much-longer-generated-name");
        assert!(!short.is_hashed());
        assert!(long.is_hashed());
        assert_eq!(long.text().len(), 64);
        assert_eq!(hasher.id_for_text("a-much-longer-generated-name"), long);
    }
}
