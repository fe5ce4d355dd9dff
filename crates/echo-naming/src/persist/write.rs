// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container writer.

use std::io::{self, Write};

/// Minimal indenting XML writer for element map containers.
///
/// Companion files requested with [`add_file`](Self::add_file) are not
/// written here; the document collects them from
/// [`deferred_files`](Self::deferred_files) and writes them after the main
/// stream.
pub struct XmlWriter<W: Write> {
    out: W,
    version: u32,
    depth: usize,
    files: Vec<String>,
}

impl<W: Write> XmlWriter<W> {
    /// Create a writer targeting file format `version`.
    pub fn new(out: W, version: u32) -> Self {
        Self {
            out,
            version,
            depth: 0,
            files: Vec::new(),
        }
    }

    /// File format version being written.
    pub fn file_version(&self) -> u32 {
        self.version
    }

    /// Writes a start tag, or a self-closing element when `self_closing`.
    pub fn write_start(
        &mut self,
        tag: &str,
        attrs: &[(&str, &str)],
        self_closing: bool,
    ) -> io::Result<()> {
        let mut line = indent(self.depth);
        line.push('<');
        line.push_str(tag);
        for (name, value) in attrs {
            line.push(' ');
            line.push_str(name);
            line.push_str("=\"");
            escape_into(&mut line, value);
            line.push('"');
        }
        line.push_str(if self_closing { "/>\n" } else { ">\n" });
        if !self_closing {
            self.depth += 1;
        }
        self.out.write_all(line.as_bytes())
    }

    /// Closes the innermost open element.
    pub fn write_end(&mut self, tag: &str) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        let line = format!("{}</{tag}>\n", indent(self.depth));
        self.out.write_all(line.as_bytes())
    }

    /// Writes the text built by `body` as one character-data block.
    pub fn char_stream(&mut self, body: impl FnOnce(&mut String)) -> io::Result<()> {
        let mut text = String::new();
        body(&mut text);
        let block = format!(
            "{}<![CDATA[{}]]>\n",
            indent(self.depth),
            text.replace("]]>", "]]]]><![CDATA[>")
        );
        self.out.write_all(block.as_bytes())
    }

    /// Requests a companion file to be written after the main stream.
    pub fn add_file(&mut self, name: &str) {
        if !self.files.iter().any(|f| f == name) {
            self.files.push(name.to_owned());
        }
    }

    /// Companion files requested so far.
    pub fn deferred_files(&self) -> &[String] {
        &self.files
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}
