// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bulk element maps and persistence helpers.

use std::io;

use echo_naming::persist::XmlWriter;
use echo_naming::{MappedElement, NamingEngine, StringHasher};

/// Deterministic literal name for fixture entry `i`.
pub fn fixture_name(i: usize) -> String {
    let digest = blake3::hash(&(i as u64).to_le_bytes());
    let hex = digest.to_hex();
    format!("n{}", &hex.as_str()[..12])
}

/// `n` entries mapping `Face1..=Face<n>`. Even entries carry one string id
/// and a tag layer; odd entries are plain literals without ids.
pub fn bulk_elements(hasher: &dyn StringHasher, n: usize) -> Vec<MappedElement> {
    (0..n)
        .map(|i| {
            let indexed = format!("Face{}", i + 1);
            if i % 2 == 0 {
                let id = hasher.id_for_text(&fixture_name(i));
                let handle = id.to_string();
                MappedElement {
                    indexed,
                    mapped: format!("{handle};:T3:{}:F", handle.len()),
                    ids: vec![id],
                }
            } else {
                MappedElement {
                    indexed,
                    mapped: fixture_name(i),
                    ids: Vec::new(),
                }
            }
        })
        .collect()
}

/// Saves `engine` into a string using file format `version`.
pub fn save_to_string(engine: &NamingEngine, version: u32) -> io::Result<String> {
    let mut writer = XmlWriter::new(Vec::new(), version);
    engine.save(&mut writer)?;
    String::from_utf8(writer.into_inner()?).map_err(io::Error::other)
}

/// Writes `engine`'s companion file into a string.
pub fn doc_file_to_string(engine: &NamingEngine) -> io::Result<String> {
    let mut out = Vec::new();
    engine.save_doc_file(&mut out)?;
    String::from_utf8(out).map_err(io::Error::other)
}
