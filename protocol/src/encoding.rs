//! # Canonical Field Encoding
//!
//! Everything the gateway signs is a flat mapping of field names to
//! scalar values. Before hashing, both sides reduce that mapping to the
//! same byte string:
//!
//! 1. drop entries whose value is null or renders as an empty string,
//! 2. order the rest by key, byte-wise ascending,
//! 3. join them as `key=value` pairs separated by `&`, values verbatim.
//!
//! Step 3 looks like URL encoding and is not: nothing is escaped. The
//! counterparty hashes exactly these bytes, so a single stray escape
//! produces a signature that fails remotely with no local symptom.
//!
//! Transport encoding ([`form_body`]) and payload parsing ([`parse_form`])
//! live here too, because they are the other two places a mapping crosses
//! a byte boundary. Neither feeds the hash.

use std::borrow::Cow;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single scalar in a [`FieldMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// UTF-8 text. Almost every gateway field is text.
    Text(String),
    /// Integer, rendered in decimal.
    Int(i64),
    /// Opaque bytes (raw file content), appended to the encoding as-is.
    Bytes(Vec<u8>),
    /// Explicitly absent. Never encoded.
    Null,
}

impl FieldValue {
    /// The bytes this value contributes to the canonical encoding.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_bytes()),
            Self::Int(n) => Cow::Owned(n.to_string().into_bytes()),
            Self::Bytes(b) => Cow::Borrowed(b.as_slice()),
            Self::Null => Cow::Borrowed(&[]),
        }
    }

    /// `true` for null and for values whose rendering has zero length.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Int(_) => false,
            Self::Bytes(b) => b.is_empty(),
            Self::Null => true,
        }
    }

    /// Borrow the value as text if it is a `Text` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as text. Byte values are decoded lossily.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Null => String::new(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

// ---------------------------------------------------------------------------
// FieldMap
// ---------------------------------------------------------------------------

/// Key-ordered mapping of field names to values.
///
/// Backed by a `BTreeMap<String, _>`, whose ordering is the byte-wise
/// ordering of the keys. Iteration order is therefore already the
/// canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.get(key)
    }

    /// Text value of `key`, if present and textual.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(FieldValue::as_str)
    }

    /// Text value of `key` when it is present and non-empty.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get_str(key).filter(|s| !s.is_empty())
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in canonical (byte-wise key) order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.entries.iter()
    }

    /// Mutable access to a value.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut FieldValue> {
        self.entries.get_mut(key)
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMap
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldMap {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Remove null and empty entries.
pub fn filter_empty(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// The canonical `key=value&...` byte string that gets hashed.
///
/// # Example
///
/// ```
/// use upacp_protocol::encoding::{canonical_bytes, FieldMap, FieldValue};
///
/// let fields = FieldMap::new()
///     .with("b", "2")
///     .with("a", "")
///     .with("c", FieldValue::Null);
/// assert_eq!(canonical_bytes(&fields), b"b=2");
/// ```
pub fn canonical_bytes(fields: &FieldMap) -> Vec<u8> {
    let mut out = Vec::with_capacity(512);
    for (key, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        if !out.is_empty() {
            out.push(b'&');
        }
        out.extend_from_slice(key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(&value.as_bytes());
    }
    out
}

/// [`canonical_bytes`] as a `String`, for logging and the front-end form.
pub fn canonical_string(fields: &FieldMap) -> String {
    String::from_utf8_lossy(&canonical_bytes(fields)).into_owned()
}

/// Parse a form-encoded payload (gateway response or webhook body).
///
/// `+` decodes to a space and percent escapes are decoded. When a key
/// repeats, the last non-blank value wins. Blank values are dropped, which
/// is harmless: they would be filtered out of the encoding anyway.
pub fn parse_form(raw: &str) -> FieldMap {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let mut fields = FieldMap::new();
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        fields.insert(key.into_owned(), value.into_owned());
    }
    fields
}

/// `application/x-www-form-urlencoded` body for a signed mapping.
///
/// Applied after signing. The percent escapes it introduces are undone by
/// the receiver before it rebuilds the canonical encoding.
pub fn form_body(fields: &FieldMap) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        serializer.append_pair(key, &value.to_text());
    }
    serializer.finish()
}
