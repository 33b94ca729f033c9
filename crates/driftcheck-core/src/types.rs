//! Expected and observed object state.
//!
//! Expected state is a literal fixture, built once per scenario. Observed
//! state is fetched fresh on every verification pass and frozen into a
//! [`Snapshot`] before it is compared.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ObjectKey
// ---------------------------------------------------------------------------

/// A string path uniquely identifying an object within a bucket.
///
/// Keys are the join between expected and observed state. Ordering is
/// lexicographic and only used to make diffs deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a new key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ObjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// MetadataField
// ---------------------------------------------------------------------------

/// The closed set of object metadata headers the harness recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    /// `Content-Type`
    ContentType,
    /// `Cache-Control`
    CacheControl,
    /// `Content-Disposition`
    ContentDisposition,
    /// `Content-Encoding`
    ContentEncoding,
    /// `Content-Language`
    ContentLanguage,
}

impl MetadataField {
    /// Every recognized field, in comparison order.
    pub const ALL: [Self; 5] = [
        Self::ContentType,
        Self::CacheControl,
        Self::ContentDisposition,
        Self::ContentEncoding,
        Self::ContentLanguage,
    ];

    /// The exact HTTP header name used as the key in expected metadata.
    #[must_use]
    pub fn header_name(self) -> &'static str {
        match self {
            Self::ContentType => "Content-Type",
            Self::CacheControl => "Cache-Control",
            Self::ContentDisposition => "Content-Disposition",
            Self::ContentEncoding => "Content-Encoding",
            Self::ContentLanguage => "Content-Language",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// Error returned when a header name is not a recognized [`MetadataField`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized metadata header: {0}")]
pub struct ParseMetadataFieldError(String);

impl FromStr for MetadataField {
    type Err = ParseMetadataFieldError;

    /// Header names are case-sensitive, exactly as listed in [`MetadataField::header_name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.header_name() == s)
            .ok_or_else(|| ParseMetadataFieldError(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// ExpectedObject / ExpectedState
// ---------------------------------------------------------------------------

/// The expected state of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedObject {
    /// Header name to expected value. Header names are case-sensitive.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Exact expected body. `None` or empty means the body is not checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ExpectedObject {
    /// Create an expectation with no metadata and no content check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an expected header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// Set the exact expected body.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Expected value for a recognized field, if declared.
    #[must_use]
    pub fn field(&self, field: MetadataField) -> Option<&str> {
        self.metadata.get(field.header_name()).map(String::as_str)
    }

    /// The body to verify, if any. Empty content means "do not check".
    #[must_use]
    pub fn content_to_check(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}

/// Expected state for a whole bucket.
pub type ExpectedState = BTreeMap<ObjectKey, ExpectedObject>;

// ---------------------------------------------------------------------------
// ObservedMetadata / ObservedObject
// ---------------------------------------------------------------------------

/// The recognized headers the store reported for an object.
///
/// Each field is individually optional: a missing value means the store did
/// not report that header at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedMetadata {
    /// `Content-Type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// `Cache-Control`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `Content-Disposition`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// `Content-Encoding`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// `Content-Language`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
}

impl ObservedMetadata {
    /// The reported value for `field`, if present.
    #[must_use]
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::ContentType => self.content_type.as_deref(),
            MetadataField::CacheControl => self.cache_control.as_deref(),
            MetadataField::ContentDisposition => self.content_disposition.as_deref(),
            MetadataField::ContentEncoding => self.content_encoding.as_deref(),
            MetadataField::ContentLanguage => self.content_language.as_deref(),
        }
    }

    /// Set or clear the value for `field`.
    pub fn set(&mut self, field: MetadataField, value: Option<String>) {
        let slot = match field {
            MetadataField::ContentType => &mut self.content_type,
            MetadataField::CacheControl => &mut self.cache_control,
            MetadataField::ContentDisposition => &mut self.content_disposition,
            MetadataField::ContentEncoding => &mut self.content_encoding,
            MetadataField::ContentLanguage => &mut self.content_language,
        };
        *slot = value;
    }

    /// Build from `header name -> value` pairs, ignoring unrecognized headers.
    #[must_use]
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut metadata = Self::default();
        for (name, value) in headers {
            if let Ok(field) = name.parse::<MetadataField>() {
                metadata.set(field, Some(value.to_owned()));
            }
        }
        metadata
    }

    /// Iterate over the fields the store reported as present.
    pub fn present(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        MetadataField::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|value| (field, value)))
    }
}

/// One object as observed in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedObject {
    /// Reported metadata headers.
    pub metadata: ObservedMetadata,
    /// The body, only present when fetched with `get`.
    pub body: Option<Bytes>,
    /// Opaque content fingerprint.
    pub etag: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The complete observed state of a bucket for one verification pass.
///
/// A snapshot is immutable once built; the fetcher hands it to the
/// comparator read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    objects: BTreeMap<ObjectKey, ObservedObject>,
}

impl Snapshot {
    /// Freeze an aggregated mapping into a snapshot.
    #[must_use]
    pub fn new(objects: BTreeMap<ObjectKey, ObservedObject>) -> Self {
        Self { objects }
    }

    /// Observed object for `key`.
    #[must_use]
    pub fn get(&self, key: &ObjectKey) -> Option<&ObservedObject> {
        self.objects.get(key)
    }

    /// Observed keys in lexicographic order.
    #[must_use]
    pub fn sorted_keys(&self) -> Vec<ObjectKey> {
        self.objects.keys().cloned().collect()
    }

    /// Iterate over `(key, object)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &ObservedObject)> {
        self.objects.iter()
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
