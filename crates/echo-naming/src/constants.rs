// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Name grammar constants shared by the codec, the engine and persistence.
//!
//! These strings are part of the on-disk format. Changing any of them breaks
//! every document that already stores mapped names.

/// Prefix that marks a mapped (stable) element name inside a subname path.
pub const MAPPED_MARKER: &str = ";";

/// Marker that opens one tag (history) layer: `;:T<tag>:<len>:<type>`.
pub const TAG_MARKER: &str = ";:T";

/// Marker for a child index postfix: `;:I<index>`.
pub const INDEX_POSTFIX_MARKER: &str = ";:I";

/// Prefix for an element that no longer exists after a recompute.
pub const MISSING_MARKER: &str = "?";

/// Element type prefixes declared by plain boundary-representation geometry.
pub const DEFAULT_ELEMENT_TYPES: [&str; 3] = ["Vertex", "Edge", "Face"];

/// Upper bound on tag layers decoded by history traversal.
pub const MAX_HISTORY_DEPTH: usize = 1024;
