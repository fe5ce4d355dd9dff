// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! String identifiers and the hasher seam.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A persistent integer handle for a piece of text.
///
/// `StringId`s are minted by a [`StringHasher`]. The text is either kept
/// verbatim (reversible) or, for long inputs, replaced by a digest, in which
/// case [`is_hashed`](Self::is_hashed) is `true` and the original text cannot
/// be recovered.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StringId {
    value: i64,
    text: String,
    hashed: bool,
}

impl StringId {
    /// Creates an id. `value == 0` is reserved for the null id.
    pub fn new(value: i64, text: impl Into<String>, hashed: bool) -> Self {
        Self {
            value,
            text: text.into(),
            hashed,
        }
    }

    /// Integer value persisted in element maps.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Stored text (the digest when [`is_hashed`](Self::is_hashed)).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the stored text is an opaque digest.
    pub fn is_hashed(&self) -> bool {
        self.hashed
    }

    /// Whether this is the null id handed out for deliberately unhashed names.
    pub fn is_null(&self) -> bool {
        self.value == 0
    }
}

/// Shared, reference-counted handle to a [`StringId`].
///
/// Several element map entries may hold the same handle. Equality and hashing
/// go by the integer value, so handles from a restored map compare equal to
/// the ones they were saved from.
#[derive(Clone)]
pub struct StringIdRef(Arc<StringId>);

impl StringIdRef {
    /// Wraps an id in a shared handle.
    pub fn new(id: StringId) -> Self {
        Self(Arc::new(id))
    }

    /// Integer value of the referenced id.
    pub fn value(&self) -> i64 {
        self.0.value
    }

    /// Borrow the referenced id.
    pub fn id(&self) -> &StringId {
        &self.0
    }

    /// Text of the referenced id.
    pub fn text(&self) -> &str {
        &self.0.text
    }

    /// See [`StringId::is_hashed`].
    pub fn is_hashed(&self) -> bool {
        self.0.hashed
    }

    /// See [`StringId::is_null`].
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl PartialEq for StringIdRef {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for StringIdRef {}

impl Hash for StringIdRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value().hash(state);
    }
}

impl fmt::Debug for StringIdRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StringIdRef").field(&self.value()).finish()
    }
}

/// Renders the hashed textual form of a name: `#` followed by lowercase hex.
impl fmt::Display for StringIdRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.value())
    }
}

/// Document-scoped text hasher.
///
/// Implementations are shared between every naming engine of a document and
/// must be internally synchronized.
pub trait StringHasher: Send + Sync {
    /// Returns the id for `text`, minting one if needed. Same text, same id.
    fn id_for_text(&self, text: &str) -> StringIdRef;

    /// Resolves a persisted integer value. `None` when the value is unknown.
    fn id_for_value(&self, value: i64) -> Option<StringIdRef>;

    /// The null id, attached to names that were deliberately left unhashed.
    fn null_id(&self) -> StringIdRef;
}

/// Shared hasher handle as held by a [`NamingEngine`](crate::NamingEngine).
pub type HasherRef = Arc<dyn StringHasher>;

/// Parses the hashed textual form `#<hex>` into its integer value.
///
/// Returns `None` if the text has anything after the hex digits.
pub(crate) fn parse_hashed_name(name: &str) -> Option<i64> {
    let digits = name.strip_prefix('#')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    i64::from_str_radix(digits, 16).ok()
}
