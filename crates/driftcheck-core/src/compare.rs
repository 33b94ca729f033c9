//! Expected-vs-observed comparison.
//!
//! The comparator never stops at the first mismatch. It walks every key and
//! every recognized field, collecting [`Discrepancy`] values into a
//! [`VerificationVerdict`] so one pass reports everything that is wrong.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::fetch::FetchMode;
use crate::types::{
    ExpectedObject, ExpectedState, MetadataField, ObjectKey, ObservedObject, Snapshot,
};

/// Comparison options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CompareOptions {
    /// Compare `Content-Type` values. When off, a reported `Content-Type`
    /// still counts towards the completeness check but its value is not
    /// compared (MIME detection differs across platforms).
    #[builder(default = true)]
    pub check_content_type: bool,

    /// Fetch bodies and compare them against expected content.
    #[builder(default = false)]
    pub check_content: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            check_content_type: true,
            check_content: false,
        }
    }
}

impl CompareOptions {
    /// The fetch mode these options require.
    #[must_use]
    pub fn fetch_mode(&self) -> FetchMode {
        if self.check_content {
            FetchMode::Get
        } else {
            FetchMode::Head
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The observed key set differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySetMismatch {
    /// All expected keys, sorted.
    pub expected: Vec<ObjectKey>,
    /// All observed keys, sorted.
    pub observed: Vec<ObjectKey>,
}

impl KeySetMismatch {
    /// Expected keys the store does not have.
    #[must_use]
    pub fn missing(&self) -> Vec<&ObjectKey> {
        let observed: BTreeSet<_> = self.observed.iter().collect();
        self.expected.iter().filter(|k| !observed.contains(k)).collect()
    }

    /// Keys the store has that were not expected.
    #[must_use]
    pub fn unexpected(&self) -> Vec<&ObjectKey> {
        let expected: BTreeSet<_> = self.expected.iter().collect();
        self.observed.iter().filter(|k| !expected.contains(k)).collect()
    }
}

impl fmt::Display for KeySetMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "object keys differ")?;
        writeln!(f, "  expected: {}", join_keys(self.expected.iter()))?;
        writeln!(f, "  observed: {}", join_keys(self.observed.iter()))?;
        writeln!(f, "  missing:  {}", join_keys(self.missing().into_iter()))?;
        write!(f, "  extra:    {}", join_keys(self.unexpected().into_iter()))
    }
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a ObjectKey>) -> String {
    let quoted: Vec<String> = keys.map(|k| format!("{:?}", k.as_str())).collect();
    format!("[{}]", quoted.join(", "))
}

/// One field- or key-level difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// A reported header value differs from the expected value. `expected`
    /// is `None` when the fixture does not declare the header at all.
    Field {
        /// Object key.
        key: ObjectKey,
        /// Header.
        field: MetadataField,
        /// Expected value.
        expected: Option<String>,
        /// Reported value.
        actual: String,
    },
    /// The number of reported fields differs from the number declared.
    FieldCount {
        /// Object key.
        key: ObjectKey,
        /// Number of headers declared in the fixture.
        expected: usize,
        /// Number of recognized headers the store reported.
        matched: usize,
    },
    /// The body differs from the expected content.
    Content {
        /// Object key.
        key: ObjectKey,
        /// Expected body.
        expected: String,
        /// Observed body, lossily decoded.
        actual: String,
    },
    /// Content was expected to be checked but no body was fetched.
    MissingBody {
        /// Object key.
        key: ObjectKey,
    },
}

impl Discrepancy {
    /// The key this discrepancy belongs to.
    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        match self {
            Self::Field { key, .. }
            | Self::FieldCount { key, .. }
            | Self::Content { key, .. }
            | Self::MissingBody { key } => key,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field {
                key,
                field,
                expected,
                actual,
            } => write!(
                f,
                "{key}: {field}\n  expected: {}\n  actual:   {actual:?}",
                expected
                    .as_deref()
                    .map_or_else(|| "<not declared>".to_owned(), |v| format!("{v:?}")),
            ),
            Self::FieldCount {
                key,
                expected,
                matched,
            } => write!(
                f,
                "{key}: metadata field count\n  expected: {expected}\n  actual:   {matched}"
            ),
            Self::Content {
                key,
                expected,
                actual,
            } => write!(f, "{key}: content\n  expected: {expected:?}\n  actual:   {actual:?}"),
            Self::MissingBody { key } => write!(f, "{key}: content\n  body was not fetched"),
        }
    }
}

/// Outcome of comparing a snapshot against expected state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationVerdict {
    /// Set when the key sets differ.
    pub key_set: Option<KeySetMismatch>,
    /// Every per-key difference found.
    pub discrepancies: Vec<Discrepancy>,
    /// Number of keys whose metadata and content were compared.
    pub compared: usize,
}

impl VerificationVerdict {
    /// Whether observed state matches expected state.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.key_set.is_none() && self.discrepancies.is_empty()
    }

    /// Discrepancies for one key.
    pub fn for_key<'a>(&'a self, key: &'a ObjectKey) -> impl Iterator<Item = &'a Discrepancy> {
        self.discrepancies.iter().filter(move |d| d.key() == key)
    }
}

impl fmt::Display for VerificationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            return write!(f, "PASS ({} objects)", self.compared);
        }
        let count = self.discrepancies.len() + usize::from(self.key_set.is_some());
        writeln!(f, "FAIL ({count} problems)")?;
        if let Some(mismatch) = &self.key_set {
            writeln!(f, "{mismatch}")?;
        }
        for d in &self.discrepancies {
            writeln!(f, "{d}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

/// Compares expected state against a [`Snapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    options: CompareOptions,
}

impl Comparator {
    /// Create a comparator.
    #[must_use]
    pub fn new(options: CompareOptions) -> Self {
        Self { options }
    }

    /// The comparison options.
    #[must_use]
    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Compare sorted key lists. Returns `None` when they are equal.
    #[must_use]
    pub fn compare_keys(
        expected: &[ObjectKey],
        observed: &[ObjectKey],
    ) -> Option<KeySetMismatch> {
        (expected != observed).then(|| KeySetMismatch {
            expected: expected.to_vec(),
            observed: observed.to_vec(),
        })
    }

    /// Compare `snapshot` against `expected`.
    ///
    /// A key-set mismatch fails the verdict; keys present on both sides are
    /// still compared field by field so every problem is reported.
    #[must_use]
    pub fn compare(&self, expected: &ExpectedState, snapshot: &Snapshot) -> VerificationVerdict {
        let expected_keys: Vec<ObjectKey> = expected.keys().cloned().collect();
        let mut verdict = VerificationVerdict {
            key_set: Self::compare_keys(&expected_keys, &snapshot.sorted_keys()),
            ..VerificationVerdict::default()
        };

        for (key, observed) in snapshot.iter() {
            let Some(want) = expected.get(key) else {
                continue;
            };
            self.compare_object(key, want, observed, &mut verdict.discrepancies);
            verdict.compared += 1;
        }
        verdict
    }

    /// Compare one object, appending discrepancies to `out`.
    ///
    /// Returns the number of fields that were reported present.
    pub fn compare_object(
        &self,
        key: &ObjectKey,
        expected: &ExpectedObject,
        observed: &ObservedObject,
        out: &mut Vec<Discrepancy>,
    ) -> usize {
        let mut matched = 0;
        for (field, actual) in observed.metadata.present() {
            matched += 1;
            if field == MetadataField::ContentType && !self.options.check_content_type {
                continue;
            }
            let want = expected.field(field);
            if want != Some(actual) {
                out.push(Discrepancy::Field {
                    key: key.clone(),
                    field,
                    expected: want.map(ToOwned::to_owned),
                    actual: actual.to_owned(),
                });
            }
        }

        if matched != expected.metadata.len() {
            out.push(Discrepancy::FieldCount {
                key: key.clone(),
                expected: expected.metadata.len(),
                matched,
            });
        }

        if self.options.check_content {
            if let Some(want) = expected.content_to_check() {
                match &observed.body {
                    Some(body) if body.as_ref() == want.as_bytes() => {}
                    Some(body) => out.push(Discrepancy::Content {
                        key: key.clone(),
                        expected: want.to_owned(),
                        actual: String::from_utf8_lossy(body).into_owned(),
                    }),
                    None => out.push(Discrepancy::MissingBody { key: key.clone() }),
                }
            }
        }
        matched
    }
}
