// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! History-aware ordering of element names.

use std::cmp::Ordering;

/// Total order over element names in which numeric runs compare by value.
///
/// Plain names compare their leading non-digit text lexically and then the
/// following digit run numerically, so `Face9 < Face10`. Hashed names
/// (`#<hex>...`) sort after all plain names and compare their hex run
/// numerically. Remaining ties fall back to the tail and finally to the whole
/// string byte-wise, so distinct names never compare equal.
#[derive(Clone, Copy, Debug, Default)]
pub struct ElementNameComp;

impl ElementNameComp {
    /// Compares `a` and `b`.
    pub fn compare(a: &str, b: &str) -> Ordering {
        let ordering = match (a.strip_prefix('#'), b.strip_prefix('#')) {
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => {
                let (a_run, a_tail) = split_run(a, |c| c.is_ascii_hexdigit());
                let (b_run, b_tail) = split_run(b, |c| c.is_ascii_hexdigit());
                numeric(a_run, b_run).then_with(|| a_tail.cmp(b_tail))
            }
            (None, None) => {
                let (a_head, a_rest) = split_run(a, |c| !c.is_ascii_digit());
                let (b_head, b_rest) = split_run(b, |c| !c.is_ascii_digit());
                let (a_run, a_tail) = split_run(a_rest, |c| c.is_ascii_digit());
                let (b_run, b_tail) = split_run(b_rest, |c| c.is_ascii_digit());
                a_head
                    .cmp(b_head)
                    .then_with(|| numeric(a_run, b_run))
                    .then_with(|| a_tail.cmp(b_tail))
            }
        };
        ordering.then_with(|| a.cmp(b))
    }

    /// `compare(a, b) == Ordering::Less`.
    pub fn less(a: &str, b: &str) -> bool {
        Self::compare(a, b) == Ordering::Less
    }
}

fn split_run(s: &str, keep: impl Fn(u8) -> bool) -> (&str, &str) {
    let end = s.bytes().position(|c| !keep(c)).unwrap_or(s.len());
    s.split_at(end)
}

// Digit runs of any length; no integer parsing, so no overflow.
fn numeric(a: &str, b: &str) -> Ordering {
    let a_value = a.trim_start_matches('0');
    let b_value = b.trim_start_matches('0');
    a_value
        .len()
        .cmp(&b_value.len())
        .then_with(|| {
            a_value
                .bytes()
                .map(|c| c.to_ascii_lowercase())
                .cmp(b_value.bytes().map(|c| c.to_ascii_lowercase()))
        })
        .then_with(|| a.len().cmp(&b.len()))
}
