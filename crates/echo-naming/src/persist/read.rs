// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container reader.

use std::str::FromStr;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::engine::EngineError;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Errors that abort a restore.
///
/// The map may be left partially populated; discard it and rebuild.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The input ended inside the container.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A different element than the one required was found.
    #[error("expected <{expected}> at byte {offset}")]
    UnexpectedElement {
        /// Element the reader was looking for.
        expected: String,
        /// Byte offset of the mismatch.
        offset: usize,
    },
    /// Input that is not well-formed container markup.
    #[error("malformed input: {0}")]
    Malformed(String),
    /// A required attribute is absent.
    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        /// Element carrying the attribute.
        element: String,
        /// Attribute name.
        attribute: String,
    },
    /// An attribute value could not be parsed.
    #[error("invalid value {value:?} for attribute '{attribute}'")]
    InvalidAttribute {
        /// Attribute name.
        attribute: String,
        /// Raw value.
        value: String,
    },
    /// A record line ended before all required fields were read.
    #[error("truncated record on line {line}")]
    TruncatedRecord {
        /// 1-based line within the record block.
        line: usize,
    },
    /// A record's id count is not a number.
    #[error("invalid id count {value:?} on line {line}")]
    InvalidIdCount {
        /// 1-based line within the record block.
        line: usize,
        /// Raw field.
        value: String,
    },
    /// The container points at a companion file the reader does not have.
    #[error("companion file '{0}' not available")]
    MissingCompanion(String),
    /// A restored name failed validation.
    #[error(transparent)]
    Naming(#[from] EngineError),
}

/// A parsed start tag.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StartTag {
    /// Element name.
    pub name: String,
    /// Attributes in document order, unescaped.
    pub attrs: Vec<(String, String)>,
    /// `<tag .../>` rather than `<tag ...>`.
    pub self_closing: bool,
}

impl StartTag {
    /// Value of attribute `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value of attribute `name`, which must be present.
    pub fn required(&self, name: &str) -> Result<&str, RestoreError> {
        self.attr(name).ok_or_else(|| RestoreError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_owned(),
        })
    }

    /// Parses required attribute `name`.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, RestoreError> {
        let value = self.required(name)?;
        value.parse().map_err(|_| RestoreError::InvalidAttribute {
            attribute: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Pull reader over an element map container held in memory.
pub struct XmlReader<'a> {
    src: &'a str,
    pos: usize,
    companions: FxHashMap<String, String>,
}

impl<'a> XmlReader<'a> {
    /// Create a reader over `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            companions: FxHashMap::default(),
        }
    }

    /// Registers the contents of a companion file.
    pub fn with_companion(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.companions.insert(name.into(), contents.into());
        self
    }

    /// Contents of a registered companion file.
    pub fn companion(&self, name: &str) -> Option<&str> {
        self.companions.get(name).map(String::as_str)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    // Whitespace, declarations and comments between elements.
    fn skip_misc(&mut self) -> Result<(), RestoreError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            let close = if trimmed.starts_with("<?") {
                "?>"
            } else if trimmed.starts_with("<!--") {
                "-->"
            } else {
                return Ok(());
            };
            let end = trimmed.find(close).ok_or(RestoreError::UnexpectedEof)?;
            self.pos += end + close.len();
        }
    }

    fn opens(&self, tag: &str) -> bool {
        self.rest()
            .strip_prefix('<')
            .and_then(|r| r.strip_prefix(tag))
            .and_then(|r| r.chars().next())
            .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
    }

    /// Whether the next element is a `<tag>` start tag.
    pub fn peek_start(&mut self, tag: &str) -> Result<bool, RestoreError> {
        self.skip_misc()?;
        Ok(self.opens(tag))
    }

    /// Reads a `<tag ...>` or `<tag .../>` start tag.
    pub fn read_start(&mut self, tag: &str) -> Result<StartTag, RestoreError> {
        self.skip_misc()?;
        if self.rest().is_empty() {
            return Err(RestoreError::UnexpectedEof);
        }
        if !self.opens(tag) {
            return Err(self.unexpected(tag));
        }
        self.pos += 1 + tag.len();
        let mut attrs = Vec::new();
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if let Some(after) = trimmed.strip_prefix("/>") {
                self.pos = self.src.len() - after.len();
                return Ok(self.start_tag(tag, attrs, true));
            }
            if let Some(after) = trimmed.strip_prefix('>') {
                self.pos = self.src.len() - after.len();
                return Ok(self.start_tag(tag, attrs, false));
            }
            if trimmed.is_empty() {
                return Err(RestoreError::UnexpectedEof);
            }
            attrs.push(self.read_attr(tag)?);
        }
    }

    fn start_tag(&self, tag: &str, attrs: Vec<(String, String)>, self_closing: bool) -> StartTag {
        StartTag {
            name: tag.to_owned(),
            attrs,
            self_closing,
        }
    }

    fn read_attr(&mut self, tag: &str) -> Result<(String, String), RestoreError> {
        let rest = self.rest();
        let (name, after) = rest
            .split_once('=')
            .filter(|(name, _)| {
                !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == '>' || c == '/')
            })
            .ok_or_else(|| RestoreError::Malformed(format!("bad attribute in <{tag}>")))?;
        let mut chars = after.chars();
        let quote = chars
            .next()
            .filter(|&q| q == '"' || q == '\'')
            .ok_or_else(|| RestoreError::Malformed(format!("unquoted attribute '{name}'")))?;
        let body = chars.as_str();
        let end = body.find(quote).ok_or(RestoreError::UnexpectedEof)?;
        let value = unescape(&body[..end])?;
        self.pos = self.src.len() - body.len() + end + 1;
        Ok((name.to_owned(), value))
    }

    /// Reads `</tag>`.
    pub fn read_end(&mut self, tag: &str) -> Result<(), RestoreError> {
        self.skip_misc()?;
        let closing = format!("</{tag}>");
        if self.rest().is_empty() {
            return Err(RestoreError::UnexpectedEof);
        }
        if !self.rest().starts_with(&closing) {
            return Err(self.unexpected(&closing));
        }
        self.pos += closing.len();
        Ok(())
    }

    /// Whether a character-data block comes next.
    pub fn at_char_stream(&mut self) -> Result<bool, RestoreError> {
        self.skip_misc()?;
        Ok(self.rest().starts_with(CDATA_OPEN))
    }

    /// Reads a character-data block. Adjacent sections are joined, which is
    /// how writers encode a `]]>` inside the text.
    pub fn read_char_stream(&mut self) -> Result<String, RestoreError> {
        self.skip_misc()?;
        let mut text = String::new();
        while let Some(body) = self.rest().strip_prefix(CDATA_OPEN) {
            let end = body.find(CDATA_CLOSE).ok_or(RestoreError::UnexpectedEof)?;
            text.push_str(&body[..end]);
            self.pos = self.src.len() - body.len() + end + CDATA_CLOSE.len();
        }
        Ok(text)
    }

    fn unexpected(&self, expected: &str) -> RestoreError {
        RestoreError::UnexpectedElement {
            expected: expected.trim_start_matches("</").trim_end_matches('>').to_owned(),
            offset: self.pos,
        }
    }
}

fn unescape(raw: &str) -> Result<String, RestoreError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let entity_end = rest[amp..]
            .find(';')
            .ok_or_else(|| RestoreError::Malformed(format!("unterminated entity in {raw:?}")))?;
        let entity = &rest[amp + 1..amp + entity_end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        let c = decoded.ok_or_else(|| RestoreError::Malformed(format!("unknown entity &{entity};")))?;
        out.push(c);
        rest = &rest[amp + entity_end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reads_attributes_and_self_closing_tags() {
        let src = "<?xml version=\"1.0\"?>\n<ElementMap count=\"2\">\n  <Element key='a&lt;b' value=\"Face1\"/>\n</ElementMap>\n";
        let mut reader = XmlReader::new(src);
        let start = reader.read_start("ElementMap").unwrap();
        assert!(!start.self_closing);
        assert_eq!(start.parse::<usize>("count").unwrap(), 2);
        assert!(reader.peek_start("Element").unwrap());
        let record = reader.read_start("Element").unwrap();
        assert!(record.self_closing);
        assert_eq!(record.attr("key"), Some("a<b"));
        assert_eq!(record.required("value").unwrap(), "Face1");
        assert!(!reader.peek_start("Element").unwrap());
        reader.read_end("ElementMap").unwrap();
    }

    #[test]
    fn joins_adjacent_cdata_sections() {
        let mut reader = XmlReader::new("  <![CDATA[x]]]]><![CDATA[>y]]>\n");
        assert!(reader.at_char_stream().unwrap());
        assert_eq!(reader.read_char_stream().unwrap(), "x]]>y");
    }

    #[test]
    fn framing_errors_are_reported() {
        let mut reader = XmlReader::new("<Other/>");
        assert!(matches!(
            reader.read_start("ElementMap"),
            Err(RestoreError::UnexpectedElement { .. })
        ));
        let mut reader = XmlReader::new("<ElementMap count=\"1\"");
        assert!(matches!(
            reader.read_start("ElementMap"),
            Err(RestoreError::UnexpectedEof)
        ));
        let mut reader = XmlReader::new("<ElementMap count=1/>");
        assert!(matches!(
            reader.read_start("ElementMap"),
            Err(RestoreError::Malformed(_))
        ));
        let start = XmlReader::new("<ElementMap count=\"x\"/>")
            .read_start("ElementMap")
            .unwrap();
        assert!(matches!(
            start.parse::<usize>("count"),
            Err(RestoreError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            start.required("file"),
            Err(RestoreError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn numeric_entities_decode() {
        assert_eq!(unescape("&#59;&#x3b;&amp;").unwrap(), ";;&");
        assert!(unescape("&bogus;").is_err());
    }
}
