// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pure classifiers over subname paths.
//!
//! A subname is a dot separated path through nested containers that ends in an
//! optional element name: `Body.Pad.Face3`. The element may be a mapped name
//! (`Body.;#1f;:T3:3:F`), and a mapped name may carry the indexed name it
//! resolved to at save time as a trailing segment (`Body.;#1f;:T3:3:F.Face3`).
//! None of these functions touch an element map.

use crate::constants::{INDEX_POSTFIX_MARKER, MAPPED_MARKER, MISSING_MARKER};

/// Returns the mapped name without its marker if `name` is a mapped name.
pub fn is_mapped_element(name: &str) -> Option<&str> {
    name.strip_prefix(MAPPED_MARKER)
}

/// Byte offset of the element segment within `subname`.
///
/// The element is the last segment unless a mapped segment appears earlier,
/// in which case the element starts at that mapped segment (the segments after
/// it are its sub-index selector). Returns `0` when the whole input is the
/// element and `subname.len()` when the path ends in a dot.
pub fn find_element_name(subname: &str) -> usize {
    if subname.is_empty() || is_mapped_element(subname).is_some() {
        return 0;
    }
    let Some(dot) = subname.rfind('.') else {
        return 0;
    };
    let element = dot + 1;
    if dot == 0 || subname[element..].starts_with(MAPPED_MARKER) {
        return element;
    }
    let bytes = subname.as_bytes();
    let mut i = dot;
    while i > 0 {
        i -= 1;
        if bytes[i] == b'.' && subname[i + 1..].starts_with(MAPPED_MARKER) {
            return i + 1;
        }
    }
    element
}

/// Whether `subname` ends in a non-empty element name.
pub fn has_element_name(subname: &str) -> bool {
    !subname[find_element_name(subname)..].is_empty()
}

/// Whether the whole of `name` is an element name (no container path).
pub fn is_element_name(name: &str) -> bool {
    !name.is_empty() && find_element_name(name) == 0
}

/// The mapped element of `subname` without its marker, if it has one.
pub fn has_mapped_element_name(subname: &str) -> Option<&str> {
    is_mapped_element(&subname[find_element_name(subname)..])
}

/// The container path of `subname` with the element name removed.
pub fn no_element_name(subname: &str) -> &str {
    &subname[..find_element_name(subname)]
}

fn combined_split(name: &str) -> Option<(usize, usize)> {
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    let start = name[..dot].rfind('.').map_or(0, |p| p + 1);
    name[start..]
        .starts_with(MAPPED_MARKER)
        .then_some((start, dot))
}

/// For a combined `path.;mapped.Indexed` subname, keeps the mapped form.
pub fn new_element_name(name: &str) -> &str {
    match combined_split(name) {
        Some((_, dot)) => &name[..dot],
        None => name,
    }
}

/// For a combined `path.;mapped.Indexed` subname, keeps the indexed form.
pub fn old_element_name(name: &str) -> String {
    match combined_split(name) {
        Some((start, dot)) => format!("{}{}", &name[..start], &name[dot + 1..]),
        None => name.to_owned(),
    }
}

/// Whether `name` refers to an element that vanished in a recompute.
pub fn is_missing_element(name: &str) -> bool {
    name.starts_with(MISSING_MARKER)
}

/// Marks `name` as missing. Already missing names are returned unchanged.
pub fn missing_element_name(name: &str) -> String {
    if is_missing_element(name) {
        name.to_owned()
    } else {
        format!("{MISSING_MARKER}{name}")
    }
}

/// The `;:I<index>` postfix that tags an element with its child index.
pub fn index_postfix(index: usize) -> String {
    format!("{INDEX_POSTFIX_MARKER}{index}")
}

/// Splits a trailing `;:I<index>` postfix off `name`.
pub fn strip_index_postfix(name: &str) -> Option<(&str, usize)> {
    let pos = name.rfind(INDEX_POSTFIX_MARKER)?;
    let index = name[pos + INDEX_POSTFIX_MARKER.len()..].parse().ok()?;
    Some((&name[..pos], index))
}

/// Matches an indexed name such as `Face12` against declared type prefixes.
///
/// Returns the matched type and the index. The index must be a non-empty run
/// of decimal digits that makes up the rest of the name.
pub fn split_indexed<'n, S: AsRef<str>>(name: &'n str, types: &[S]) -> Option<(&'n str, usize)> {
    types.iter().find_map(|ty| {
        let ty = ty.as_ref();
        let digits = name.strip_prefix(ty)?;
        if ty.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((&name[..ty.len()], digits.parse().ok()?))
    })
}
