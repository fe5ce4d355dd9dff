// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]
use std::sync::Arc;

use echo_dry_tests::{CountingSink, EngineTestBuilder, InMemoryConfigStore, RefusingPolicy};
use echo_naming::{
    ConfigError, ConfigService, EngineConfig, EngineError, HasherRef, MapDirection, MemoryHasher,
    NameViolation, NamingEngine, StringHasher,
};

#[test]
fn duplicate_names_resolve_to_distinct_elements() {
    let mut engine = EngineTestBuilder::new().build().unwrap();
    assert_eq!(engine.assign("Face1", "X").unwrap(), "X");
    let second = engine.assign("Face2", "X").unwrap();
    assert_ne!(second, "X");

    assert_eq!(engine.lookup("Face2", MapDirection::ToMapped, None), second);
    assert_eq!(
        engine.lookup(&format!(";{second}"), MapDirection::ToIndexed, None),
        "Face2"
    );
    assert_eq!(engine.lookup("Face1", MapDirection::ToMapped, None), "X");
    assert_eq!(engine.lookup(";X", MapDirection::ToIndexed, None), "Face1");
}

#[test]
fn hashed_duplicates_keep_their_ids() {
    let mut engine = EngineTestBuilder::new().with_hashing().build().unwrap();
    let first = engine.assign("Face1", "XTRUDE").unwrap();
    let second = engine.assign("Face2", "XTRUDE").unwrap();
    assert_eq!(first, "#1");
    assert_eq!(second, "#1;D1");
    let mut ids = Vec::new();
    engine.lookup(";#1;D1", MapDirection::ToIndexed, Some(&mut ids));
    assert_eq!(ids.len(), 1);
    assert_eq!(engine.codec().dehash(&first), "XTRUDE");
}

#[test]
fn refusing_policy_keeps_earlier_mapping() {
    let policy = RefusingPolicy::new();
    let mut engine = EngineTestBuilder::new()
        .with_policy(policy.clone())
        .with_entry("Face1", "X")
        .build()
        .unwrap();
    assert_eq!(engine.assign("Face2", "X").unwrap(), "X");
    assert_eq!(policy.calls(), 1);
    assert_eq!(engine.map_size(), 1);
    assert_eq!(engine.lookup(";X", MapDirection::ToIndexed, None), "Face1");
    assert_eq!(engine.lookup("Face2", MapDirection::ToMapped, None), "Face2");
}

#[test]
fn illegal_names_are_rejected_without_mutation() {
    let mut engine = EngineTestBuilder::new()
        .with_hashing()
        .with_entry("Face1", "good")
        .build()
        .unwrap();
    let before = engine.get_element_map();

    let err = engine.assign("Face1", "bad.name").unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidName {
            name: "bad.name".into(),
            reason: NameViolation::Dot,
        }
    );
    assert!(engine.assign("Face1", "bad\tname").is_err());
    assert!(engine
        .assign_postfixed("Face1", "ok", "post fix", &[], false)
        .is_err());
    assert_eq!(engine.get_element_map(), before);
}

#[test]
fn prefix_scan_and_multi_mapping() {
    let engine = EngineTestBuilder::new()
        .with_entry("Face1", "Pad1")
        .with_entry("Face1", "Pad2")
        .with_entry("Face2", "Pocket1")
        .build()
        .unwrap();
    let names: Vec<_> = engine
        .mapped_names_for("Face1", false)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, ["Pad1", "Pad2"]);
    let pads: Vec<_> = engine
        .names_with_prefix("Pa")
        .into_iter()
        .map(|e| e.indexed)
        .collect();
    assert_eq!(pads, ["Face1", "Face1"]);
}

#[test]
fn copy_between_hashers_rehashes() {
    let source_hasher: HasherRef = Arc::new(MemoryHasher::new());
    let source = EngineTestBuilder::new()
        .with_hasher(source_hasher.clone())
        .with_entry("Face1", "XTRUDE")
        .with_entry("Edge2", "FILLET")
        .build()
        .unwrap();

    let mut shared = EngineTestBuilder::new()
        .with_hasher(source_hasher)
        .build()
        .unwrap();
    shared.copy_element_map(&source, None).unwrap();
    assert_eq!(shared.get_element_map(), source.get_element_map());

    let mut foreign = EngineTestBuilder::new().with_hashing().build().unwrap();
    foreign.assign("Vertex9", "SEED").unwrap();
    foreign.copy_element_map(&source, Some("copy")).unwrap();
    assert_eq!(foreign.map_size(), 2);
    for entry in foreign.get_element_map() {
        let (head, tail) = entry.mapped.split_once(';').unwrap();
        assert_eq!(tail, "copy");
        let literal = foreign.codec().dehash(head);
        assert!(literal == "XTRUDE" || literal == "FILLET", "{literal}");
    }

    let mut unhashed = NamingEngine::new();
    unhashed.copy_element_map(&source, None).unwrap();
    assert!(unhashed.hasher().is_some());
    assert_eq!(unhashed.get_element_map(), source.get_element_map());
}

#[test]
fn sink_balances_through_engine_lifetime() {
    let sink = Arc::new(CountingSink::new());
    {
        let mut engine = EngineTestBuilder::new()
            .with_sink(sink.clone())
            .with_entry("Face1", "A")
            .with_entry("Face2", "B")
            .build()
            .unwrap();
        let snapshot = engine.element_map().cloned();
        engine.assign("Face3", "C").unwrap();
        engine.assign("Face1", ";").unwrap();
        assert!(sink.live_bytes() > 0);
        drop(snapshot);
        engine.reset_element_map(None);
        assert_eq!(sink.live_bytes(), 0);
    }
    assert_eq!(sink.live_bytes(), 0);
    assert_eq!(sink.allocations(), sink.deallocations());
}

#[test]
fn engine_config_round_trips_through_store() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    assert_eq!(service.load("Body").unwrap(), EngineConfig::default());

    let config = EngineConfig {
        element_types: vec!["Wire".into(), "Face".into()],
        tag: 11,
        persistence_file: Some("Body.map".into()),
        digest_threshold: Some(32),
    };
    service.save("Body", &config).unwrap();
    assert_eq!(store.save_count(), 1);
    assert!(store.raw("Body").unwrap().contains("Body.map"));
    let loaded = service.load("Body").unwrap();
    assert_eq!(loaded, config);

    let engine = service.engine_for("Body").unwrap();
    assert_eq!(engine.tag(), 11);
    assert_eq!(engine.persistence_file(), Some("Body.map"));
    assert_eq!(engine.element_type("Wire3"), Some('W'));
    assert_eq!(engine.element_type("Edge3"), None);

    store.set_fail_on_load(true);
    assert!(matches!(service.load("Body"), Err(ConfigError::Store { .. })));
}

#[test]
fn partial_config_fills_defaults() {
    let store = InMemoryConfigStore::with_json("Body", r#"{"digest_threshold": 8}"#);
    let config = ConfigService::new(store).load("Body").unwrap();
    assert_eq!(config.digest_threshold, Some(8));
    assert_eq!(config.element_types, ["Vertex", "Edge", "Face"]);
    assert_eq!(MemoryHasher::from_config(&config).id_for_text("short").to_string(), "#1");
}
