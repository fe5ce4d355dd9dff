// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]
use std::cmp::Ordering;

use echo_dry_tests::EngineTestBuilder;
use echo_naming::{ElementNameComp, MapDirection};
use proptest::prelude::*;

fn indexed_name() -> impl Strategy<Value = String> {
    ("(Vertex|Edge|Face)", 1u32..5000).prop_map(|(ty, i)| format!("{ty}{i}"))
}

fn literal_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,11}"
}

proptest! {
    #[test]
    fn assign_then_lookup_round_trips(
        indexed in indexed_name(),
        name in literal_name(),
        hashing in any::<bool>(),
    ) {
        let builder = EngineTestBuilder::new();
        let builder = if hashing { builder.with_hashing() } else { builder };
        let mut engine = builder.build().unwrap();

        let stored = engine.assign(&indexed, &name).unwrap();
        prop_assert_eq!(engine.lookup(&indexed, MapDirection::ToMapped, None), stored.clone());
        let back = engine.lookup(&format!(";{stored}"), MapDirection::ToIndexed, None);
        prop_assert_eq!(back, indexed);
    }

    #[test]
    fn assign_is_idempotent(
        entries in prop::collection::vec((indexed_name(), literal_name()), 1..24),
    ) {
        let mut engine = EngineTestBuilder::new().with_hashing().build().unwrap();
        for (indexed, name) in &entries {
            let first = engine.assign(indexed, name).unwrap();
            let size = engine.map_size();
            let second = engine.assign(indexed, name).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(engine.map_size(), size);
            let back = engine.lookup(&format!(";{first}"), MapDirection::ToIndexed, None);
            prop_assert_eq!(&back, indexed);
        }
    }

    #[test]
    fn numeric_suffixes_order_by_value(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let ordering = ElementNameComp::compare(&format!("Face{a}"), &format!("Face{b}"));
        prop_assert_eq!(ordering, a.cmp(&b));
        let ordering = ElementNameComp::compare(&format!("#{a:x}"), &format!("#{b:x}"));
        prop_assert_eq!(ordering, a.cmp(&b));
    }

    #[test]
    fn comparator_is_a_total_order(x in "[#A-Fa-f0-9;:]{0,8}", y in "[#A-Fa-f0-9;:]{0,8}") {
        let forward = ElementNameComp::compare(&x, &y);
        prop_assert_eq!(forward, ElementNameComp::compare(&y, &x).reverse());
        prop_assert_eq!(forward == Ordering::Equal, x == y);
    }
}

#[test]
fn comparator_sorts_documented_examples() {
    let mut faces = vec!["Face9", "Face10", "Face2"];
    faces.sort_by(|a, b| ElementNameComp::compare(a, b));
    assert_eq!(faces, ["Face2", "Face9", "Face10"]);
    let mut hashed = vec!["#2a", "#1f"];
    hashed.sort_by(|a, b| ElementNameComp::compare(a, b));
    assert_eq!(hashed, ["#1f", "#2a"]);
}
