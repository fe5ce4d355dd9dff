// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bidirectional element map.
//!
//! The left view orders mapped names (`BTreeMap`), which is what prefix scans
//! and deterministic persistence need. The right view indexes indexed names
//! (`FxHashMap`) and may hold several mapped names per indexed name, kept in
//! insertion order.
//!
//! # Invariants
//!
//! - A mapped name resolves to exactly one indexed name.
//! - Every mapped name listed in the right view has a left entry pointing back
//!   at the same indexed name, and vice versa.
//! - With an [`AllocationSink`] attached, every byte reported allocated is
//!   reported deallocated by the time the map is dropped.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::mem::size_of;
use std::ops::Bound;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ident::StringIdRef;

/// Receives memory accounting events from an [`ElementMap`].
pub trait AllocationSink: Send + Sync {
    /// `bytes` were allocated for a new entry.
    fn on_allocate(&self, bytes: usize);
    /// `bytes` were released with a removed entry.
    fn on_deallocate(&self, bytes: usize);
}

/// Payload of one left-view entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MapEntry {
    /// Indexed name the mapped name resolves to.
    pub indexed: String,
    /// String ids the mapped name was built from.
    pub ids: Vec<StringIdRef>,
}

/// Borrowed view of one mapping.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EntryRef<'a> {
    /// Mapped (stable) name, stored without the mapped marker.
    pub mapped: &'a str,
    /// Indexed name it resolves to.
    pub indexed: &'a str,
    /// String ids attached to the mapping.
    pub ids: &'a [StringIdRef],
}

/// Mapped name ⇄ indexed name container.
#[derive(Default)]
pub struct ElementMap {
    left: BTreeMap<String, MapEntry>,
    right: FxHashMap<String, Vec<String>>,
    sink: Option<Arc<dyn AllocationSink>>,
}

fn entry_bytes(mapped: &str, entry: &MapEntry) -> usize {
    // Both views own a copy of each name.
    2 * (mapped.len() + entry.indexed.len()) + entry.ids.len() * size_of::<StringIdRef>()
}

impl ElementMap {
    /// Create an empty map without accounting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map that reports entry allocations to `sink`.
    pub fn with_sink(sink: Arc<dyn AllocationSink>) -> Self {
        Self {
            left: BTreeMap::new(),
            right: FxHashMap::default(),
            sink: Some(sink),
        }
    }

    /// Number of mapped names.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Inserts `mapped -> indexed` unless `mapped` is already present.
    ///
    /// Returns the entry now stored under `mapped` and whether it was newly
    /// inserted. A `false` flag with a different indexed name is a collision
    /// for the caller to resolve; the map is left unchanged.
    pub fn insert<'a>(
        &'a mut self,
        mapped: &'a str,
        indexed: &str,
        ids: Vec<StringIdRef>,
    ) -> (EntryRef<'a>, bool) {
        match self.left.entry(mapped.to_owned()) {
            Entry::Occupied(occupied) => (make_ref(mapped, occupied.into_mut()), false),
            Entry::Vacant(vacant) => {
                let entry = MapEntry {
                    indexed: indexed.to_owned(),
                    ids,
                };
                if let Some(sink) = &self.sink {
                    sink.on_allocate(entry_bytes(mapped, &entry));
                }
                self.right
                    .entry(indexed.to_owned())
                    .or_default()
                    .push(mapped.to_owned());
                (make_ref(mapped, vacant.insert(entry)), true)
            }
        }
    }

    /// Looks up a mapped name (without marker).
    pub fn get(&self, mapped: &str) -> Option<EntryRef<'_>> {
        self.left
            .get_key_value(mapped)
            .map(|(key, entry)| make_ref(key, entry))
    }

    /// All mappings for an indexed name, oldest first.
    pub fn equal_range<'a>(&'a self, indexed: &str) -> impl Iterator<Item = EntryRef<'a>> + 'a {
        self.right
            .get(indexed)
            .into_iter()
            .flatten()
            .filter_map(move |mapped| self.get(mapped))
    }

    /// Removes every mapping that resolves to `indexed`. Returns how many.
    pub fn erase_by_indexed(&mut self, indexed: &str) -> usize {
        let Some(mapped_names) = self.right.remove(indexed) else {
            return 0;
        };
        let count = mapped_names.len();
        for mapped in mapped_names {
            if let Some(entry) = self.left.remove(&mapped) {
                self.release(&mapped, &entry);
            }
        }
        count
    }

    /// Removes one mapped name. Returns `true` if it was present.
    pub fn erase_by_mapped(&mut self, mapped: &str) -> bool {
        let Some(entry) = self.left.remove(mapped) else {
            return false;
        };
        if let Some(list) = self.right.get_mut(&entry.indexed) {
            list.retain(|m| m != mapped);
            if list.is_empty() {
                self.right.remove(&entry.indexed);
            }
        }
        self.release(mapped, &entry);
        true
    }

    /// Ordered scan of the left view starting at the first key `>= from`.
    pub fn range_from<'a>(&'a self, from: &'a str) -> impl Iterator<Item = EntryRef<'a>> + 'a {
        self.left
            .range::<str, _>((Bound::Included(from), Bound::Unbounded))
            .map(|(key, entry)| make_ref(key, entry))
    }

    /// All entries in mapped-name order.
    pub fn iter(&self) -> impl Iterator<Item = EntryRef<'_>> + '_ {
        self.left.iter().map(|(key, entry)| make_ref(key, entry))
    }

    fn release(&self, mapped: &str, entry: &MapEntry) {
        if let Some(sink) = &self.sink {
            sink.on_deallocate(entry_bytes(mapped, entry));
        }
    }
}

fn make_ref<'a>(mapped: &'a str, entry: &'a MapEntry) -> EntryRef<'a> {
    EntryRef {
        mapped,
        indexed: &entry.indexed,
        ids: &entry.ids,
    }
}

impl Clone for ElementMap {
    fn clone(&self) -> Self {
        if let Some(sink) = &self.sink {
            for (mapped, entry) in &self.left {
                sink.on_allocate(entry_bytes(mapped, entry));
            }
        }
        Self {
            left: self.left.clone(),
            right: self.right.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl Drop for ElementMap {
    fn drop(&mut self) {
        for (mapped, entry) in &self.left {
            self.release(mapped, entry);
        }
    }
}

impl std::fmt::Debug for ElementMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementMap")
            .field("len", &self.left.len())
            .field("accounted", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        live: AtomicUsize,
    }

    impl AllocationSink for Counter {
        fn on_allocate(&self, bytes: usize) {
            self.live.fetch_add(bytes, Ordering::Relaxed);
        }
        fn on_deallocate(&self, bytes: usize) {
            self.live.fetch_sub(bytes, Ordering::Relaxed);
        }
    }

    #[test]
    fn collision_returns_existing_entry() {
        let mut map = ElementMap::new();
        let (entry, inserted) = map.insert("X", "Face1", Vec::new());
        assert!(inserted);
        assert_eq!(entry.indexed, "Face1");
        let (entry, inserted) = map.insert("X", "Face2", Vec::new());
        assert!(!inserted);
        assert_eq!(entry.indexed, "Face1");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn right_view_is_a_multimap() {
        let mut map = ElementMap::new();
        map.insert("b", "Face1", Vec::new());
        map.insert("a", "Face1", Vec::new());
        map.insert("c", "Face2", Vec::new());
        let names: Vec<_> = map.equal_range("Face1").map(|e| e.mapped).collect();
        assert_eq!(names, ["b", "a"]);

        assert_eq!(map.erase_by_indexed("Face1"), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.equal_range("Face1").count(), 0);
        assert!(map.erase_by_mapped("c"));
        assert!(map.is_empty());
        assert!(!map.erase_by_mapped("c"));
    }

    #[test]
    fn range_from_is_ordered() {
        let mut map = ElementMap::new();
        for name in ["ab2", "aa", "ab1", "b"] {
            map.insert(name, "Edge1", Vec::new());
        }
        let names: Vec<_> = map.range_from("ab").map(|e| e.mapped).collect();
        assert_eq!(names, ["ab1", "ab2", "b"]);
    }

    #[test]
    fn sink_balances_over_lifetime() {
        let counter = Arc::new(Counter::default());
        {
            let mut map = ElementMap::with_sink(counter.clone());
            map.insert("X", "Face1", Vec::new());
            map.insert("Y", "Face2", Vec::new());
            assert!(counter.live.load(Ordering::Relaxed) > 0);
            let copy = map.clone();
            map.erase_by_mapped("X");
            drop(copy);
        }
        assert_eq!(counter.live.load(Ordering::Relaxed), 0);
    }
}
