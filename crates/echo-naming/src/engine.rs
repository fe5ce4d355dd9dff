// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The naming engine: assignment, lookup and collision handling on top of an
//! [`ElementMap`].
//!
//! One engine belongs to one piece of geometry. It is not synchronized; all
//! calls on an engine must be serialized by the owner. The hasher it writes
//! through is shared with the rest of the document and is synchronized on its
//! own.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::codec::{find_tag, NameCodec};
use crate::config::EngineConfig;
use crate::constants::{DEFAULT_ELEMENT_TYPES, MAPPED_MARKER};
use crate::element_map::{AllocationSink, ElementMap, EntryRef};
use crate::ident::{HasherRef, StringIdRef};
use crate::subname::{find_element_name, is_mapped_element, split_indexed};

/// Why a name was rejected.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NameViolation {
    /// The name is empty.
    Empty,
    /// The name contains `.`, the subname path separator.
    Dot,
    /// The name contains whitespace, the persistence field separator.
    Whitespace,
}

impl fmt::Display for NameViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty name",
            Self::Dot => "contains '.'",
            Self::Whitespace => "contains whitespace",
        })
    }
}

/// Errors raised by naming operations.
///
/// Raised before anything is mutated; the map is unchanged on error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An indexed or mapped name failed validation.
    #[error("invalid element name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// What is wrong with it.
        reason: NameViolation,
    },
}

/// Direction of a [`NamingEngine::lookup`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MapDirection {
    /// Indexed name to its first mapped name.
    ToMapped,
    /// Mapped name (with marker) to indexed name. Names without the marker
    /// are assumed to be indexed already and are echoed.
    ToIndexed,
    /// Like [`ToIndexed`](Self::ToIndexed) but also for names without marker.
    ToIndexedForced,
}

/// Flags for [`NamingEngine::assign_with`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct AssignOptions {
    /// Replace an existing mapping of the same name to another element
    /// instead of disambiguating. Consumed by the first collision.
    pub overwrite: bool,
    /// Keep the name literal even with a hasher configured.
    pub no_hash: bool,
}

/// One owned mapping, as exchanged by [`NamingEngine::get_element_map`] and
/// [`NamingEngine::set_element_map`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MappedElement {
    /// Indexed name.
    pub indexed: String,
    /// Mapped name, without marker.
    pub mapped: String,
    /// String ids attached to the mapping.
    pub ids: Vec<StringIdRef>,
}

impl From<EntryRef<'_>> for MappedElement {
    fn from(entry: EntryRef<'_>) -> Self {
        Self {
            indexed: entry.indexed.to_owned(),
            mapped: entry.mapped.to_owned(),
            ids: entry.ids.to_vec(),
        }
    }
}

/// Produces a replacement candidate when a mapped name is already taken by
/// another element.
pub trait DisambiguationPolicy: Send + Sync {
    /// Called with a 1-based `retry` counter. `ids` starts out with the ids
    /// the assignment carries, including the hasher's null id for names kept
    /// literal; ids the new candidate is built from are appended to it. For
    /// literal names `codec` has no hasher. Returning `None` keeps the earlier
    /// mapping and drops the new assignment.
    fn disambiguate(
        &self,
        codec: &NameCodec<'_>,
        retry: u32,
        new_indexed: &str,
        conflicting_indexed: &str,
        candidate: &str,
        ids: &mut Vec<StringIdRef>,
    ) -> Option<String>;
}

/// Default policy: `<encoded candidate>;D<retry>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryMangling;

impl DisambiguationPolicy for RetryMangling {
    fn disambiguate(
        &self,
        codec: &NameCodec<'_>,
        retry: u32,
        new_indexed: &str,
        _conflicting_indexed: &str,
        candidate: &str,
        ids: &mut Vec<StringIdRef>,
    ) -> Option<String> {
        let mut renamed = candidate.to_owned();
        let mut out = format!("{MAPPED_MARKER}D{retry}");
        let type_char = new_indexed.chars().next().unwrap_or('?');
        codec.encode(type_char, &mut renamed, &mut out, ids, None, 0);
        renamed.push_str(&out);
        Some(renamed)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HashPolicy {
    Hash,
    NoHash,
    Verbatim,
}

/// Stable element naming for one piece of geometry.
pub struct NamingEngine {
    pub(crate) map: Option<Arc<ElementMap>>,
    pub(crate) hasher: Option<HasherRef>,
    tag: i64,
    element_types: Vec<String>,
    persistence_file: Option<String>,
    policy: Box<dyn DisambiguationPolicy>,
    sink: Option<Arc<dyn AllocationSink>>,
}

impl Default for NamingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NamingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingEngine")
            .field("tag", &self.tag)
            .field("map_size", &self.map_size())
            .field("hasher", &self.hasher.is_some())
            .field("element_types", &self.element_types)
            .field("persistence_file", &self.persistence_file)
            .finish_non_exhaustive()
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), EngineError> {
    let reason = if name.is_empty() {
        NameViolation::Empty
    } else if name.contains('.') {
        NameViolation::Dot
    } else if name.chars().any(char::is_whitespace) {
        NameViolation::Whitespace
    } else {
        return Ok(());
    };
    Err(EngineError::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

fn ensure_map<'m>(
    slot: &'m mut Option<Arc<ElementMap>>,
    sink: Option<&Arc<dyn AllocationSink>>,
) -> &'m mut ElementMap {
    let shared = slot.get_or_insert_with(|| {
        Arc::new(match sink {
            Some(sink) => ElementMap::with_sink(Arc::clone(sink)),
            None => ElementMap::new(),
        })
    });
    Arc::make_mut(shared)
}

fn same_hasher(a: &HasherRef, b: &HasherRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

impl NamingEngine {
    /// Create an engine with no map, no hasher and the default element types.
    pub fn new() -> Self {
        Self {
            map: None,
            hasher: None,
            tag: 0,
            element_types: DEFAULT_ELEMENT_TYPES.iter().map(|&t| t.to_owned()).collect(),
            persistence_file: None,
            policy: Box::new(RetryMangling),
            sink: None,
        }
    }

    /// Create an engine from configuration. The hasher is document-scoped and
    /// is attached separately.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tag: config.tag,
            element_types: config.element_types.clone(),
            persistence_file: config.persistence_file.clone(),
            ..Self::new()
        }
    }

    /// Attach a hasher.
    pub fn with_hasher(mut self, hasher: HasherRef) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Replace the disambiguation policy.
    pub fn with_policy(mut self, policy: impl DisambiguationPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Replace the disambiguation policy in place.
    pub fn set_policy(&mut self, policy: Box<dyn DisambiguationPolicy>) {
        self.policy = policy;
    }

    /// Report element map allocations to `sink`. Applies to maps created
    /// after this call.
    pub fn with_sink(mut self, sink: Arc<dyn AllocationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The attached hasher, if any.
    pub fn hasher(&self) -> Option<&HasherRef> {
        self.hasher.as_ref()
    }

    /// Attach or detach the hasher.
    pub fn set_hasher(&mut self, hasher: Option<HasherRef>) {
        self.hasher = hasher;
    }

    /// Tag of the geometry that owns this engine.
    pub fn tag(&self) -> i64 {
        self.tag
    }

    /// Set the owner tag.
    pub fn set_tag(&mut self, tag: i64) {
        self.tag = tag;
    }

    /// Declared element type prefixes (`Vertex`, `Edge`, `Face`, ...).
    pub fn element_types(&self) -> &[String] {
        &self.element_types
    }

    /// Replace the declared element type prefixes.
    pub fn set_element_types(&mut self, types: Vec<String>) {
        self.element_types = types;
    }

    /// Name of the companion file element maps are saved to, if any.
    pub fn persistence_file(&self) -> Option<&str> {
        self.persistence_file.as_deref()
    }

    /// Save element maps to a companion file instead of inline.
    pub fn set_persistence_file(&mut self, name: Option<String>) {
        self.persistence_file = name;
    }

    /// Codec bound to this engine's hasher and tag.
    pub fn codec(&self) -> NameCodec<'_> {
        NameCodec::new(self.hasher.as_deref(), self.tag)
    }

    /// Number of mapped names.
    pub fn map_size(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    /// The current map, shared.
    pub fn element_map(&self) -> Option<&Arc<ElementMap>> {
        self.map.as_ref()
    }

    /// Swap in `map` (or nothing) and hand back the previous map.
    pub fn reset_element_map(&mut self, map: Option<Arc<ElementMap>>) -> Option<Arc<ElementMap>> {
        std::mem::replace(&mut self.map, map)
    }

    /// All mappings in mapped-name order.
    pub fn get_element_map(&self) -> Vec<MappedElement> {
        self.map
            .as_ref()
            .map(|m| m.iter().map(MappedElement::from).collect())
            .unwrap_or_default()
    }

    /// Replace the map with `elements`, stored verbatim (ids kept, nothing
    /// re-hashed). All names are validated before the old map is dropped.
    pub fn set_element_map(&mut self, elements: &[MappedElement]) -> Result<(), EngineError> {
        for element in elements {
            validate_name(&element.indexed)?;
            validate_name(is_mapped_element(&element.mapped).unwrap_or(&element.mapped))?;
        }
        self.reset_element_map(None);
        for element in elements {
            self.insert_verbatim(&element.indexed, &element.mapped, element.ids.clone())?;
        }
        Ok(())
    }

    /// Map `name` to `indexed`, hashing it if a hasher is attached.
    pub fn assign(&mut self, indexed: &str, name: &str) -> Result<String, EngineError> {
        self.assign_with(indexed, name, &[], AssignOptions::default())
    }

    /// Map `name` to `indexed` and return the name actually stored.
    ///
    /// - A name that is empty after stripping the mapped marker deletes every
    ///   mapping of `indexed` and returns `indexed`.
    /// - Without `ids` and with a hasher, the name is hashed and the id used is
    ///   recorded; with [`no_hash`](AssignOptions::no_hash) the hasher's null
    ///   id is recorded instead.
    /// - Assigning the same name to the same element again is a no-op.
    /// - When the name is taken by another element, the entry is replaced if
    ///   [`overwrite`](AssignOptions::overwrite) is set, otherwise the
    ///   disambiguation policy is asked for a new candidate. If the policy
    ///   declines, the existing name is returned and nothing changes.
    pub fn assign_with(
        &mut self,
        indexed: &str,
        name: &str,
        ids: &[StringIdRef],
        options: AssignOptions,
    ) -> Result<String, EngineError> {
        let policy = if options.no_hash {
            HashPolicy::NoHash
        } else {
            HashPolicy::Hash
        };
        self.assign_inner(indexed, name, ids.to_vec(), options.overwrite, policy)
    }

    /// Map `name` plus a literal `postfix` to `indexed`.
    ///
    /// Only `name` is hashed; the postfix is appended after a mapped marker.
    /// A pure postfix (empty `name`) is stored unhashed.
    pub fn assign_postfixed(
        &mut self,
        indexed: &str,
        name: &str,
        postfix: &str,
        ids: &[StringIdRef],
        overwrite: bool,
    ) -> Result<String, EngineError> {
        let literal = is_mapped_element(name).unwrap_or(name);
        if !literal.is_empty() {
            validate_name(literal)?;
        }
        let mut ids = ids.to_vec();
        let mut full = if !literal.is_empty() && ids.is_empty() && self.hasher.is_some() {
            self.codec().hash_name(literal, &mut ids)
        } else {
            literal.to_owned()
        };
        if !postfix.is_empty() {
            if !full.is_empty() && !postfix.starts_with(MAPPED_MARKER) {
                full.push_str(MAPPED_MARKER);
            }
            full.push_str(postfix);
        }
        let options = AssignOptions {
            overwrite,
            no_hash: literal.is_empty(),
        };
        self.assign_with(indexed, &full, &ids, options)
    }

    /// Store an already-mapped name as is. Used when restoring.
    pub(crate) fn insert_verbatim(
        &mut self,
        indexed: &str,
        mapped: &str,
        ids: Vec<StringIdRef>,
    ) -> Result<String, EngineError> {
        self.assign_inner(indexed, mapped, ids, false, HashPolicy::Verbatim)
    }

    fn assign_inner(
        &mut self,
        indexed: &str,
        name: &str,
        caller_ids: Vec<StringIdRef>,
        mut overwrite: bool,
        hash_policy: HashPolicy,
    ) -> Result<String, EngineError> {
        validate_name(indexed)?;
        if name.is_empty() {
            validate_name(name)?;
        }
        let literal = is_mapped_element(name).unwrap_or(name);
        if literal.is_empty() {
            if let Some(map) = self.map.as_mut() {
                Arc::make_mut(map).erase_by_indexed(indexed);
            }
            return Ok(indexed.to_owned());
        }
        validate_name(literal)?;

        let hasher = self.hasher.clone();
        let codec = NameCodec::new(hasher.as_deref(), self.tag);
        let mut base_ids = caller_ids;
        let mut ids = base_ids.clone();
        let mut candidate = literal.to_owned();
        if base_ids.is_empty() {
            match (&hasher, hash_policy) {
                (Some(_), HashPolicy::Hash) => candidate = codec.hash_name(literal, &mut ids),
                (Some(hasher), HashPolicy::NoHash) => {
                    base_ids.push(hasher.null_id());
                    ids.clone_from(&base_ids);
                }
                _ => {}
            }
        }
        // Names kept literal stay literal through disambiguation.
        let retry_codec = match hash_policy {
            HashPolicy::Hash => codec,
            HashPolicy::NoHash | HashPolicy::Verbatim => NameCodec::new(None, self.tag),
        };

        let map = ensure_map(&mut self.map, self.sink.as_ref());
        let mut retry = 0u32;
        loop {
            let (entry, inserted) = map.insert(&candidate, indexed, ids.clone());
            let accepted = inserted || entry.indexed == indexed;
            let conflicting = entry.indexed.to_owned();
            if accepted {
                return Ok(candidate);
            }
            if overwrite {
                overwrite = false;
                map.erase_by_mapped(&candidate);
                continue;
            }
            retry += 1;
            let mut retry_ids = base_ids.clone();
            let Some(next) = self.policy.disambiguate(
                &retry_codec,
                retry,
                indexed,
                &conflicting,
                literal,
                &mut retry_ids,
            ) else {
                warn!(
                    indexed,
                    conflicting = %conflicting,
                    name = %candidate,
                    "duplicate element mapping refused; keeping earlier mapping"
                );
                return Ok(candidate);
            };
            warn!(
                indexed,
                conflicting = %conflicting,
                from = %candidate,
                to = %next,
                "duplicate element mapping"
            );
            candidate = next;
            ids = retry_ids;
        }
    }

    /// Resolve `name` in `direction`. Misses echo the input.
    ///
    /// A trailing `.<selector>` on a mapped name is not part of the key and is
    /// ignored. When `out_ids` is given it receives the matched entry's ids.
    pub fn lookup(
        &self,
        name: &str,
        direction: MapDirection,
        out_ids: Option<&mut Vec<StringIdRef>>,
    ) -> String {
        let Some(map) = self.map.as_deref() else {
            return name.to_owned();
        };
        let found = match direction {
            MapDirection::ToMapped => map.equal_range(name).next().map(|e| (e.mapped, e.ids)),
            MapDirection::ToIndexed | MapDirection::ToIndexedForced => {
                let key = match is_mapped_element(name) {
                    Some(key) => key,
                    None if direction == MapDirection::ToIndexedForced => name,
                    None => return name.to_owned(),
                };
                let key = key.split_once('.').map_or(key, |(key, _)| key);
                map.get(key).map(|e| (e.indexed, e.ids))
            }
        };
        match found {
            Some((resolved, ids)) => {
                if let Some(out) = out_ids {
                    out.clear();
                    out.extend_from_slice(ids);
                }
                resolved.to_owned()
            }
            None => name.to_owned(),
        }
    }

    /// Every mapped name of `indexed` with its ids, oldest first. With
    /// `need_unmapped`, an element without mappings yields `(indexed, [])`.
    pub fn mapped_names_for(
        &self,
        indexed: &str,
        need_unmapped: bool,
    ) -> Vec<(String, Vec<StringIdRef>)> {
        let mut names: Vec<_> = self
            .map
            .as_ref()
            .map(|m| {
                m.equal_range(indexed)
                    .map(|e| (e.mapped.to_owned(), e.ids.to_vec()))
                    .collect()
            })
            .unwrap_or_default();
        if names.is_empty() && need_unmapped {
            names.push((indexed.to_owned(), Vec::new()));
        }
        names
    }

    /// Mappings whose mapped name starts with `prefix`, in order.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<MappedElement> {
        let prefix = is_mapped_element(prefix).unwrap_or(prefix);
        let Some(map) = self.map.as_deref() else {
            return Vec::new();
        };
        map.range_from(prefix)
            .take_while(|e| e.mapped.starts_with(prefix))
            .map(MappedElement::from)
            .collect()
    }

    /// Element type character of the element named at the end of `name`.
    ///
    /// Indexed names are matched against the declared type prefixes. Mapped
    /// names report the type recorded in their outermost tag layer, or the
    /// type of the indexed name they resolve to.
    pub fn element_type(&self, name: &str) -> Option<char> {
        let element = &name[find_element_name(name)..];
        let Some(mapped) = is_mapped_element(element) else {
            return self.indexed_type(element);
        };
        let mapped = mapped.split_once('.').map_or(mapped, |(m, _)| m);
        if let Some(info) = find_tag(mapped, false) {
            return Some(info.type_char);
        }
        let indexed = self.lookup(mapped, MapDirection::ToIndexedForced, None);
        if indexed == mapped {
            return None;
        }
        self.indexed_type(&indexed)
    }

    fn indexed_type(&self, name: &str) -> Option<char> {
        split_indexed(name, &self.element_types).and_then(|(ty, _)| ty.chars().next())
    }

    /// Replace this map with a copy of `other`'s, appending `postfix` to each
    /// mapped name.
    ///
    /// Hashers are harmonized: an engine without a hasher adopts `other`'s;
    /// with the same hasher ids are kept; with different hashers names are
    /// de-hashed through `other` and hashed again here.
    pub fn copy_element_map(
        &mut self,
        other: &NamingEngine,
        postfix: Option<&str>,
    ) -> Result<(), EngineError> {
        self.reset_element_map(None);
        let Some(source) = other.map.as_deref() else {
            return Ok(());
        };
        let rehash = match (&self.hasher, &other.hasher) {
            (None, Some(theirs)) => {
                self.hasher = Some(Arc::clone(theirs));
                false
            }
            (Some(ours), Some(theirs)) => !same_hasher(ours, theirs),
            _ => false,
        };
        let source_codec = other.codec();
        let postfix = postfix.unwrap_or("");
        for entry in source.iter() {
            if rehash {
                let literal = match entry.mapped.find(MAPPED_MARKER) {
                    Some(split) if split > 0 => {
                        let (head, tail) = entry.mapped.split_at(split);
                        format!("{}{tail}", source_codec.dehash(head))
                    }
                    _ => source_codec.dehash(entry.mapped),
                };
                self.assign_postfixed(entry.indexed, &literal, postfix, &[], false)?;
            } else {
                self.assign_postfixed(entry.indexed, entry.mapped, postfix, entry.ids, false)?;
            }
        }
        Ok(())
    }
}
