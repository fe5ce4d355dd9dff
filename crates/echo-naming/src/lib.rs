// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! echo-naming: stable names for the sub-elements of a piece of geometry.
//!
//! Geometry kernels name faces, edges and vertices by position (`Face3`,
//! `Edge12`). Those indexed names shift whenever the shape is rebuilt, so
//! anything that needs to hold on to an element (selections, references,
//! scripts) talks to this crate instead. A [`NamingEngine`] keeps an
//! [`ElementMap`] from stable *mapped* names to the kernel's *indexed* names,
//! resolves collisions, folds long names into compact [`StringIdRef`] handles
//! through an injected [`StringHasher`], and decodes the tag layers that record
//! which modeling step produced a name.
//!
//! # Name grammar
//!
//! - `;` prefixes a mapped name inside a subname path (`Body.;#1f;:T3:3:F`).
//! - `;:T<tag>:<len>:<type>` is one history layer; `len` counts the bytes of
//!   the name that precede the layer.
//! - `#<hex>` is a hashed name, resolved back to text through the hasher.
//! - `;D<n>` marks the `n`-th disambiguation of a colliding name.
//!
//! # Persistence
//!
//! Element maps persist inside an XML container, either as one `Element`
//! record per mapping (format version 1) or as a compact character stream
//! (version 2 and later). See [`persist`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod codec;
mod compare;
mod config;
mod constants;
mod element_map;
mod engine;
mod history;
mod ident;
mod memory;
/// XML container persistence for element maps.
pub mod persist;
mod subname;

pub use codec::{find_tag, NameCodec, TagInfo};
pub use compare::ElementNameComp;
pub use config::{ConfigError, ConfigService, ConfigStore, EngineConfig};
pub use constants::{
    DEFAULT_ELEMENT_TYPES, INDEX_POSTFIX_MARKER, MAPPED_MARKER, MAX_HISTORY_DEPTH,
    MISSING_MARKER, TAG_MARKER,
};
pub use element_map::{AllocationSink, ElementMap, EntryRef, MapEntry};
pub use engine::{
    AssignOptions, DisambiguationPolicy, EngineError, MapDirection, MappedElement,
    NameViolation, NamingEngine, RetryMangling,
};
pub use history::ElementHistory;
pub use ident::{HasherRef, StringHasher, StringId, StringIdRef};
pub use memory::MemoryHasher;
pub use subname::{
    find_element_name, has_element_name, has_mapped_element_name, index_postfix,
    is_element_name, is_mapped_element, is_missing_element, missing_element_name,
    new_element_name, no_element_name, old_element_name, split_indexed, strip_index_postfix,
};
