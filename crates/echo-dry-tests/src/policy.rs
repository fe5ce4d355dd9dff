// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Disambiguation policy doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use echo_naming::{DisambiguationPolicy, NameCodec, StringIdRef};

/// Policy that never renames, so the earlier mapping always wins.
///
/// Clones share one call counter.
#[derive(Clone, Default)]
pub struct RefusingPolicy {
    calls: Arc<AtomicUsize>,
}

impl RefusingPolicy {
    /// Create a policy with a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many collisions were offered to this policy.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl DisambiguationPolicy for RefusingPolicy {
    fn disambiguate(
        &self,
        _codec: &NameCodec<'_>,
        _retry: u32,
        _new_indexed: &str,
        _conflicting_indexed: &str,
        _candidate: &str,
        _ids: &mut Vec<StringIdRef>,
    ) -> Option<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        None
    }
}
