// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tag layers and name hashing.
//!
//! A mapped name records its history as nested tag layers. Encoding `abc` for
//! a face produced by the operation tagged `42` yields
//!
//! ```text
//! abc;:T42:3:F
//! ^^^          element name of the previous step (3 bytes)
//!    ^^^^^^^^^ tag layer: marker, tag, prefix length, element type
//! ```
//!
//! With a hasher configured, the previous step's name is replaced by its
//! `#<hex>` handle before the layer is appended, so names stay short no matter
//! how many steps they went through.

use std::fmt::Write as _;

use tracing::{debug, trace};

use crate::constants::{MAPPED_MARKER, TAG_MARKER};
use crate::ident::{parse_hashed_name, StringHasher, StringIdRef};

/// One decoded tag layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TagInfo<'a> {
    /// Byte offset of the tag marker.
    pub pos: usize,
    /// Tag of the operation that produced this layer.
    ///
    /// Negative tags mark disambiguation-only layers; they are folded to their
    /// absolute value unless the caller asked for the raw sign.
    pub tag: i64,
    /// Length of the element name that precedes this layer.
    pub len: usize,
    /// The layer text, from the marker to the end of the name.
    pub postfix: &'a str,
    /// Element type character (`F`, `E`, `V`, ...).
    pub type_char: char,
}

/// Locates and parses the rightmost tag layer of `name`.
///
/// The payload after the marker must be `<tag>:<len>:<type>`, where `tag` is a
/// non-zero decimal integer whose absolute value fits an `i64`, `len` a decimal length no larger than the marker
/// offset and `type` one ASCII letter, followed by the end of the name or a
/// further mapped-marker postfix. Anything else is treated as "no tag".
pub fn find_tag(name: &str, negative: bool) -> Option<TagInfo<'_>> {
    let pos = name.rfind(TAG_MARKER)?;
    let payload = &name[pos + TAG_MARKER.len()..];

    let (tag, rest) = payload.split_once(':')?;
    let tag: i64 = parse_decimal(tag)?;
    let (len, rest) = rest.split_once(':')?;
    let len: i64 = parse_decimal(len)?;
    let mut chars = rest.chars();
    let type_char = chars.next().filter(char::is_ascii_alphabetic)?;
    let tail = chars.as_str();

    let tail_ok = tail.is_empty() || tail.starts_with(MAPPED_MARKER);
    if tag == 0 || tag == i64::MIN || len < 0 || !tail_ok {
        return None;
    }
    let len = usize::try_from(len).ok().filter(|&l| l <= pos)?;
    Some(TagInfo {
        pos,
        tag: if negative { tag } else { tag.abs() },
        len,
        postfix: &name[pos..],
        type_char,
    })
}

fn parse_decimal(field: &str) -> Option<i64> {
    let digits = field.strip_prefix('-').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Name encoding bound to an optional hasher and the owner's own tag.
#[derive(Clone, Copy)]
pub struct NameCodec<'h> {
    hasher: Option<&'h dyn StringHasher>,
    owner_tag: i64,
}

impl<'h> NameCodec<'h> {
    /// Create a codec. `owner_tag` is the tag of the geometry that owns the
    /// element map; it drives same-owner layer folding in [`encode`](Self::encode).
    pub fn new(hasher: Option<&'h dyn StringHasher>, owner_tag: i64) -> Self {
        Self { hasher, owner_tag }
    }

    /// The hasher this codec writes through, if any.
    pub fn hasher(&self) -> Option<&'h dyn StringHasher> {
        self.hasher
    }

    /// Replaces the literal head of `name` with its hashed handle.
    ///
    /// The head is the text before the first mapped marker; anything after it
    /// stays literal. The id used is appended to `ids`. Without a hasher the
    /// name is returned unchanged (minus a leading mapped marker).
    pub fn hash_name(&self, name: &str, ids: &mut Vec<StringIdRef>) -> String {
        let name = name.strip_prefix(MAPPED_MARKER).unwrap_or(name);
        let Some(hasher) = self.hasher else {
            return name.to_owned();
        };
        let (head, tail) = match name.find(MAPPED_MARKER) {
            Some(0) | None => (name, ""),
            Some(split) => name.split_at(split),
        };
        if head.is_empty() {
            return name.to_owned();
        }
        let id = hasher.id_for_text(head);
        let hashed = format!("{id}{tail}");
        ids.push(id);
        hashed
    }

    /// Appends one history layer for `name` to `out`.
    ///
    /// `postfix` (prefixed with the mapped marker unless it already carries
    /// one) is written first. With no tag and nothing written, `name` is left
    /// untouched and the caller uses it verbatim. Otherwise the whole of `name`
    /// is replaced by its hashed handle and, for a non-zero `tag`, the tag layer
    /// is appended.
    ///
    /// When `tag` is the owner's own tag (either sign) and the rightmost layer
    /// of `name` carries the same tag, that layer is dropped first so chained
    /// edits by one owner do not grow the name. Only one level is folded.
    pub fn encode(
        &self,
        type_char: char,
        name: &mut String,
        out: &mut String,
        ids: &mut Vec<StringIdRef>,
        postfix: Option<&str>,
        tag: i64,
    ) {
        if let Some(postfix) = postfix.filter(|p| !p.is_empty()) {
            if !postfix.starts_with(MAPPED_MARKER) {
                out.push_str(MAPPED_MARKER);
            }
            out.push_str(postfix);
        }
        if tag == 0 && out.is_empty() {
            return;
        }

        let same_owner = tag.unsigned_abs() == self.owner_tag.unsigned_abs();
        if tag != 0 && self.owner_tag != 0 && same_owner {
            let fold = find_tag(name, true)
                .filter(|found| found.tag.unsigned_abs() == tag.unsigned_abs())
                .map(|found| found.pos);
            if let Some(pos) = fold {
                name.truncate(pos);
            }
        }

        if let Some(hasher) = self.hasher {
            let text = name.strip_prefix(MAPPED_MARKER).unwrap_or(name);
            if !text.is_empty() {
                let id = hasher.id_for_text(text);
                *name = id.to_string();
                ids.push(id);
            }
        }
        if tag != 0 {
            let _ = write!(out, "{TAG_MARKER}{tag}:{}:{type_char}", name.len());
        }
    }

    /// Resolves a hashed name back to its text.
    ///
    /// Unknown ids and digested (one-way) ids are logged and the input is
    /// returned as is; this never fails.
    pub fn dehash(&self, name: &str) -> String {
        let name = name.strip_prefix(MAPPED_MARKER).unwrap_or(name);
        let Some(hasher) = self.hasher else {
            return name.to_owned();
        };
        let Some(value) = parse_hashed_name(name) else {
            return name.to_owned();
        };
        match hasher.id_for_value(value) {
            None => {
                debug!(name, value, "failed to find hash id");
                name.to_owned()
            }
            Some(id) if id.is_hashed() => {
                debug!(name, value, "cannot de-hash digested id");
                name.to_owned()
            }
            Some(id) => {
                trace!(name, text = id.text(), "de-hash");
                id.text().to_owned()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryHasher;

    #[test]
    fn encode_then_find_tag_without_hasher() {
        let codec = NameCodec::new(None, 0);
        let mut name = String::from("abc");
        let mut out = String::new();
        let mut ids = Vec::new();
        codec.encode('F', &mut name, &mut out, &mut ids, None, 42);
        name.push_str(&out);
        assert_eq!(name, "abc;:T42:3:F");

        let info = find_tag(&name, false).unwrap();
        assert_eq!(info.tag, 42);
        assert_eq!(info.type_char, 'F');
        assert_eq!(info.len, 3);
        assert_eq!(info.pos, 3);
        assert_eq!(info.postfix, ";:T42:3:F");
        assert!(ids.is_empty());
    }

    #[test]
    fn untagged_encode_leaves_name_alone() {
        let hasher = MemoryHasher::new();
        let codec = NameCodec::new(Some(&hasher), 0);
        let mut name = String::from("abc");
        let mut out = String::new();
        let mut ids = Vec::new();
        codec.encode('F', &mut name, &mut out, &mut ids, None, 0);
        assert_eq!(name, "abc");
        assert!(out.is_empty());
        assert!(ids.is_empty());
    }

    #[test]
    fn postfix_gets_marker_and_forces_hash() {
        let hasher = MemoryHasher::new();
        let codec = NameCodec::new(Some(&hasher), 0);
        let mut name = String::from("abc");
        let mut out = String::new();
        let mut ids = Vec::new();
        codec.encode('E', &mut name, &mut out, &mut ids, Some("XTR"), 0);
        assert_eq!(name, "#1");
        assert_eq!(out, ";XTR");
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn negative_tags_fold_unless_asked() {
        let name = "abc;:T-7:3:F";
        assert_eq!(find_tag(name, false).unwrap().tag, 7);
        assert_eq!(find_tag(name, true).unwrap().tag, -7);
    }

    #[test]
    fn malformed_payloads_are_not_tags() {
        for bad in [
            "abc;:T0:3:F",
            "abc;:T4:-1:F",
            "abc;:T4;3:F",
            "abc;:Tx:3:F",
            "abc;:T4:3:",
            "abc;:T4:3:FF",
            "abc;:T4:9:F",
            "abc;:T4:3:1",
            "abc",
        ] {
            assert!(find_tag(bad, false).is_none(), "{bad}");
        }
        assert!(find_tag("abc;:T4:3:F;D1", false).is_some());
    }

    #[test]
    fn tag_without_absolute_value_is_not_a_tag() {
        let name = "abc;:T-9223372036854775808:3:F";
        assert!(find_tag(name, false).is_none());
        assert!(find_tag(name, true).is_none());

        let max = "abc;:T-9223372036854775807:3:F";
        assert_eq!(find_tag(max, false).unwrap().tag, i64::MAX);
    }

    #[test]
    fn extreme_owner_tag_still_encodes() {
        let codec = NameCodec::new(None, i64::MIN);
        let mut name = String::from("abc;:T9:3:F");
        let mut out = String::new();
        let mut ids = Vec::new();
        codec.encode('F', &mut name, &mut out, &mut ids, None, i64::MIN);
        assert_eq!(name, "abc;:T9:3:F");
        assert_eq!(out, ";:T-9223372036854775808:11:F");

        let codec = NameCodec::new(None, i64::MAX);
        let mut name = String::from("abc;:T-9223372036854775807:3:F");
        let mut out = String::new();
        codec.encode('F', &mut name, &mut out, &mut ids, None, i64::MAX);
        assert_eq!(name, "abc");
    }

    #[test]
    fn same_owner_layer_is_folded_once() {
        let codec = NameCodec::new(None, 5);
        let mut name = String::from("abc;:T5:3:F");
        let mut out = String::new();
        let mut ids = Vec::new();
        codec.encode('F', &mut name, &mut out, &mut ids, None, 5);
        name.push_str(&out);
        assert_eq!(name, "abc;:T5:3:F");

        let mut other = String::from("abc;:T9:3:F");
        let mut out = String::new();
        codec.encode('F', &mut other, &mut out, &mut ids, None, 5);
        other.push_str(&out);
        assert_eq!(other, "abc;:T9:3:F;:T5:11:F");
    }

    #[test]
    fn dehash_round_trips_and_degrades() {
        let hasher = MemoryHasher::with_digest_threshold(16);
        let codec = NameCodec::new(Some(&hasher), 0);
        let mut ids = Vec::new();
        let hashed = codec.hash_name("Face;XTR", &mut ids);
        assert_eq!(hashed, "#1;XTR");
        assert_eq!(codec.dehash("#1"), "Face");
        assert_eq!(codec.dehash(";#1"), "Face");
        assert_eq!(codec.dehash("#1;XTR"), "#1;XTR");
        assert_eq!(codec.dehash("#ff"), "#ff");

        let long = codec.hash_name("a-name-well-past-the-digest-limit", &mut ids);
        assert_eq!(codec.dehash(&long), long);
        assert_eq!(NameCodec::new(None, 0).dehash("#1"), "#1");
    }
}
