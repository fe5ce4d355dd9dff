// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Element map container formats.
//!
//! Every map is saved as one `ElementMap` element carrying the entry count.
//! The body depends on the file format version of the writer:
//!
//! ```text
//! version 1 (records)
//! <ElementMap count="2">
//!   <Element key="#1;:T3:2:F" value="Face1" sid="1"/>
//!   <Element key="plain" value="Edge4"/>
//! </ElementMap>
//!
//! version 2+ (compact stream, one line per entry)
//! <ElementMap count="2">
//!   <![CDATA[Face1<TAB>#1;:T3:2:F 1 1
//! Edge4<TAB>plain 0
//! ]]>
//! </ElementMap>
//! ```
//!
//! `key` is the mapped name, `value` the indexed name, `sid` the dot joined
//! string id values. A compact line is `<indexed>\t<mapped> <n> <id>...`.
//!
//! With a companion file configured the container only records
//! `count` and `file` and the entries go to the companion file, one
//! `<indexed>\t<mapped>\t<n> <id>...` line each (see
//! [`NamingEngine::save_doc_file`]).
//!
//! Restoring detects the body format, so any version restores either. String
//! ids that cannot be resolved are dropped from their entry and reported once
//! per restore; framing errors abort the restore.

mod read;
mod write;

use std::fmt::Write as _;
use std::io::{self, Write};

use tracing::{error, trace, warn};

use crate::engine::NamingEngine;
use crate::ident::StringIdRef;

pub use read::{RestoreError, StartTag, XmlReader};
pub use write::XmlWriter;

/// Container element name.
pub const CONTAINER_TAG: &str = "ElementMap";
/// Per-entry element name of the version 1 body.
pub const RECORD_TAG: &str = "Element";
/// First file format version that writes the compact stream.
pub const COMPACT_VERSION: u32 = 2;

fn push_ids(line: &mut String, ids: &[StringIdRef]) {
    let _ = write!(line, "{}", ids.len());
    for id in ids {
        let _ = write!(line, " {}", id.value());
    }
}

impl NamingEngine {
    /// Writes the element map container.
    pub fn save<W: Write>(&self, writer: &mut XmlWriter<W>) -> io::Result<()> {
        let count = self.map_size().to_string();
        let Some(map) = self.element_map().filter(|m| !m.is_empty()) else {
            return writer.write_start(CONTAINER_TAG, &[("count", count.as_str())], true);
        };
        if let Some(file) = self.persistence_file() {
            writer.write_start(CONTAINER_TAG, &[("count", count.as_str()), ("file", file)], true)?;
            writer.add_file(file);
            return Ok(());
        }

        writer.write_start(CONTAINER_TAG, &[("count", count.as_str())], false)?;
        if writer.file_version() >= COMPACT_VERSION {
            writer.char_stream(|body| {
                for entry in map.iter() {
                    let _ = write!(body, "{}\t{} ", entry.indexed, entry.mapped);
                    push_ids(body, entry.ids);
                    body.push('\n');
                }
            })?;
        } else {
            for entry in map.iter() {
                let sid = entry
                    .ids
                    .iter()
                    .map(|id| id.value().to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                let mut attrs = vec![("key", entry.mapped), ("value", entry.indexed)];
                if !sid.is_empty() {
                    attrs.push(("sid", sid.as_str()));
                }
                writer.write_start(RECORD_TAG, &attrs, true)?;
            }
        }
        writer.write_end(CONTAINER_TAG)
    }

    /// Replaces the map with the one stored in the next container of `reader`.
    pub fn restore(&mut self, reader: &mut XmlReader<'_>) -> Result<(), RestoreError> {
        self.reset_element_map(None);
        let start = reader.read_start(CONTAINER_TAG)?;
        let count: usize = start.parse("count")?;
        if let Some(file) = start.attr("file") {
            let contents = reader
                .companion(file)
                .ok_or_else(|| RestoreError::MissingCompanion(file.to_owned()))?;
            return self.restore_stream(contents);
        }
        if start.self_closing {
            return Ok(());
        }

        let mut lost = 0;
        if reader.at_char_stream()? {
            let body = reader.read_char_stream()?;
            for (index, line) in body.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let line_no = index + 1;
                let (indexed, rest) = line
                    .split_once('\t')
                    .ok_or(RestoreError::TruncatedRecord { line: line_no })?;
                let mut fields = rest.split_whitespace();
                let mapped = fields.next();
                self.restore_entry(line_no, indexed, mapped, fields, &mut lost)?;
            }
        } else {
            while reader.peek_start(RECORD_TAG)? {
                let record = reader.read_start(RECORD_TAG)?;
                if !record.self_closing {
                    reader.read_end(RECORD_TAG)?;
                }
                let mapped = record.required("key")?;
                let indexed = record.required("value")?;
                let ids = record
                    .attr("sid")
                    .unwrap_or("")
                    .split('.')
                    .filter(|token| !token.is_empty())
                    .filter_map(|token| self.resolve_id(token, &mut lost))
                    .collect();
                trace!(indexed, mapped, "restore element");
                self.insert_verbatim(indexed, mapped, ids)?;
            }
        }
        reader.read_end(CONTAINER_TAG)?;
        self.finish_restore(count, lost);
        Ok(())
    }

    /// Writes every entry as one `<indexed>\t<mapped>\t<n> <id>...` line.
    pub fn save_doc_file<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let Some(map) = self.element_map() else {
            return Ok(());
        };
        let mut line = String::new();
        for entry in map.iter() {
            line.clear();
            let _ = write!(line, "{}\t{}\t", entry.indexed, entry.mapped);
            push_ids(&mut line, entry.ids);
            line.push('\n');
            out.write_all(line.as_bytes())?;
        }
        out.flush()
    }

    /// Replaces the map with the entries of a companion file.
    pub fn restore_stream(&mut self, input: &str) -> Result<(), RestoreError> {
        self.reset_element_map(None);
        let mut lost = 0;
        let mut count = 0;
        for (index, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 1;
            let mut columns = line.splitn(3, '\t');
            let indexed = columns.next().unwrap_or("");
            let mapped = columns.next();
            let ids = columns
                .next()
                .ok_or(RestoreError::TruncatedRecord { line: line_no })?;
            self.restore_entry(line_no, indexed, mapped, ids.split_whitespace(), &mut lost)?;
            count += 1;
        }
        self.finish_restore(count, lost);
        Ok(())
    }

    fn restore_entry<'s>(
        &mut self,
        line: usize,
        indexed: &str,
        mapped: Option<&str>,
        mut fields: impl Iterator<Item = &'s str>,
        lost: &mut usize,
    ) -> Result<(), RestoreError> {
        let mapped = mapped
            .filter(|m| !m.is_empty())
            .ok_or(RestoreError::TruncatedRecord { line })?;
        let raw_count = fields.next().ok_or(RestoreError::TruncatedRecord { line })?;
        let count: usize = raw_count.parse().map_err(|_| RestoreError::InvalidIdCount {
            line,
            value: raw_count.to_owned(),
        })?;
        let mut ids = Vec::new();
        for _ in 0..count {
            let token = fields.next().ok_or(RestoreError::TruncatedRecord { line })?;
            if let Some(id) = self.resolve_id(token, lost) {
                ids.push(id);
            }
        }
        if fields.next().is_some() {
            return Err(RestoreError::Malformed(format!(
                "trailing fields on line {line}"
            )));
        }
        trace!(indexed, mapped, ids = ids.len(), "restore element");
        self.insert_verbatim(indexed, mapped, ids)?;
        Ok(())
    }

    fn resolve_id(&self, token: &str, lost: &mut usize) -> Option<StringIdRef> {
        let id = self
            .hasher()
            .zip(token.parse::<i64>().ok())
            .and_then(|(hasher, value)| hasher.id_for_value(value));
        if id.is_none() {
            *lost += 1;
        }
        id
    }

    fn finish_restore(&self, expected: usize, lost: usize) {
        if lost > 0 {
            error!(lost, "failed to restore string ids of element map");
        }
        if self.map_size() != expected {
            warn!(expected, restored = self.map_size(), "element map count mismatch");
        }
    }
}
