// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Allocation sink that keeps a running balance.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use echo_naming::AllocationSink;

/// Counts allocation events reported by element maps.
#[derive(Default)]
pub struct CountingSink {
    live: AtomicI64,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
}

impl CountingSink {
    /// Create a sink with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes allocated and not yet released. Negative means over-release.
    pub fn live_bytes(&self) -> i64 {
        self.live.load(Ordering::Relaxed)
    }

    /// Number of allocation events.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of deallocation events.
    pub fn deallocations(&self) -> usize {
        self.deallocations.load(Ordering::Relaxed)
    }
}

fn signed(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

impl AllocationSink for CountingSink {
    fn on_allocate(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(signed(bytes), Ordering::Relaxed);
    }

    fn on_deallocate(&self, bytes: usize) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_sub(signed(bytes), Ordering::Relaxed);
    }
}
