// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decoding the modeling history recorded in a mapped name.
//!
//! Each tag layer says "the element named by the first `len` bytes was
//! transformed by operation `tag`". Walking a name peels one layer at a time:
//! cut the name to `len`, de-hash the cut, and look for the next layer in the
//! result. The walk follows one operation chain and stops at the first layer
//! that belongs to a different operation.

use tracing::warn;

use crate::codec::find_tag;
use crate::constants::MAX_HISTORY_DEPTH;
use crate::engine::NamingEngine;
use crate::subname::is_mapped_element;

/// Result of [`NamingEngine::history`].
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ElementHistory {
    /// Tag of the outermost layer, `0` when the name has no history.
    pub tag: i64,
    /// The name the chain started from, de-hashed where possible.
    pub original: String,
    /// Intermediate names between the input and `original`, newest first.
    pub layers: Vec<String>,
}

impl NamingEngine {
    /// Reconstructs the chain of names that led to `name`.
    ///
    /// A leading mapped marker and a trailing `.<selector>` are ignored.
    pub fn history(&self, name: &str) -> ElementHistory {
        let mut layers = Vec::new();
        let mut outermost = true;
        let (tag, original) = self.walk(name, |layer, _, _| {
            if outermost {
                outermost = false;
            } else {
                layers.push(layer.to_owned());
            }
            false
        });
        ElementHistory {
            tag,
            original,
            layers,
        }
    }

    /// Walks the same chain as [`history`](Self::history), calling
    /// `visit(layer, len, tag)` for every layer from the outermost inwards.
    ///
    /// `tag` keeps its sign. The walk ends early when `visit` returns `true`.
    /// Returns the absolute tag of the outermost layer, or `0`.
    pub fn trace(&self, name: &str, visit: impl FnMut(&str, usize, i64) -> bool) -> i64 {
        self.walk(name, visit).0
    }

    fn walk(&self, name: &str, mut visit: impl FnMut(&str, usize, i64) -> bool) -> (i64, String) {
        let name = is_mapped_element(name).unwrap_or(name);
        let name = name.split_once('.').map_or(name, |(head, _)| head);
        let Some(outer) = find_tag(name, true) else {
            return (0, name.to_owned());
        };
        let outer_tag = outer.tag.abs();
        let owner = self.tag().unsigned_abs();
        let codec = self.codec();

        let mut current = name.to_owned();
        let (mut tag, mut len) = (outer.tag, outer.len);
        if visit(&current, len, tag) {
            return (outer_tag, current);
        }
        for _ in 0..MAX_HISTORY_DEPTH {
            let Some(prefix) = current.get(..len) else {
                return (outer_tag, current);
            };
            let previous = codec.dehash(prefix);
            let next = find_tag(&previous, true)
                .filter(|next| {
                    next.tag.unsigned_abs() == tag.unsigned_abs()
                        || (owner != 0 && tag.unsigned_abs() == owner)
                })
                .map(|next| (next.tag, next.len));
            let Some((next_tag, next_len)) = next else {
                return (outer_tag, previous);
            };
            (tag, len) = (next_tag, next_len);
            current = previous;
            if visit(&current, len, tag) {
                return (outer_tag, current);
            }
        }
        warn!(name, depth = MAX_HISTORY_DEPTH, "element history too deep; walk stopped");
        (outer_tag, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::StringHasher;
    use crate::memory::MemoryHasher;
    use std::sync::Arc;

    fn layer(engine: &NamingEngine, name: &str, type_char: char, tag: i64) -> String {
        let mut name = name.to_owned();
        let mut out = String::new();
        let mut ids = Vec::new();
        engine
            .codec()
            .encode(type_char, &mut name, &mut out, &mut ids, None, tag);
        name.push_str(&out);
        name
    }

    #[test]
    fn untagged_name_has_no_history() {
        let engine = NamingEngine::new();
        let history = engine.history(";plain.Face1");
        assert_eq!(history.tag, 0);
        assert_eq!(history.original, "plain");
        assert!(history.layers.is_empty());
    }

    #[test]
    fn same_operation_chain_is_unrolled() {
        let engine = NamingEngine::new().with_hasher(Arc::new(MemoryHasher::new()));
        let first = layer(&engine, "abc", 'F', 5);
        assert_eq!(first, "#1;:T5:2:F");
        let second = layer(&engine, &first, 'F', 5);
        assert_eq!(second, "#2;:T5:2:F");

        let history = engine.history(&format!(";{second}"));
        assert_eq!(history.tag, 5);
        assert_eq!(history.original, "abc");
        assert_eq!(history.layers, [first.clone()]);

        let third = layer(&engine, &second, 'E', 7);
        let history = engine.history(&third);
        assert_eq!(history.tag, 7);
        assert_eq!(history.original, second);
        assert!(history.layers.is_empty());
    }

    #[test]
    fn trace_visits_outermost_first_and_can_stop() {
        let engine = NamingEngine::new().with_hasher(Arc::new(MemoryHasher::new()));
        let first = layer(&engine, "abc", 'F', -5);
        let second = layer(&engine, &first, 'F', 5);

        let mut seen = Vec::new();
        let tag = engine.trace(&second, |name, len, tag| {
            seen.push((name.to_owned(), len, tag));
            false
        });
        assert_eq!(tag, 5);
        assert_eq!(seen, [(second.clone(), 2, 5), (first, 2, -5)]);

        let mut visits = 0;
        engine.trace(&second, |_, _, _| {
            visits += 1;
            true
        });
        assert_eq!(visits, 1);
    }

    #[test]
    fn unrepresentable_tags_end_the_walk() {
        let engine = NamingEngine::new();
        let history = engine.history(";abc;:T-9223372036854775808:3:F.Face1");
        assert_eq!(history.tag, 0);
        assert_eq!(history.original, "abc;:T-9223372036854775808:3:F");

        let mut owned = NamingEngine::new();
        owned.set_tag(i64::MIN);
        let name = "abc;:T-7:3:F;:T7:12:F";
        let mut seen = Vec::new();
        let tag = owned.trace(name, |_, _, tag| {
            seen.push(tag);
            false
        });
        assert_eq!(tag, 7);
        assert_eq!(seen, [7, -7]);
    }

    #[test]
    fn cyclic_hasher_table_hits_depth_guard() {
        let hasher = Arc::new(MemoryHasher::new());
        let looped = "#1;:T5:2:F";
        assert_eq!(hasher.id_for_text(looped).value(), 1);
        let engine = NamingEngine::new().with_hasher(hasher);
        let mut visits = 0usize;
        let tag = engine.trace(looped, |_, _, _| {
            visits += 1;
            false
        });
        assert_eq!(tag, 5);
        assert_eq!(visits, MAX_HISTORY_DEPTH + 1);
    }
}
