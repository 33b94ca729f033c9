//! Expected-state fixture loading.
//!
//! Fixtures are JSON documents in one of two shapes:
//!
//! - **Objects**: `key -> { "Content-Type": "..", .. }` or
//!   `key -> { "metadata": { .. }, "content": ".." }`, compared directly
//!   against the object store.
//! - **Outputs**: `key -> <any JSON object>`, mirroring the provisioning
//!   tool's declared output and compared with deep equality.
//!
//! [`load_fixture`] detects the shape; [`load_expected`] and
//! [`load_outputs`] force one.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::types::{ExpectedObject, ExpectedState, MetadataField, ObjectKey};

/// A loaded fixture.
#[derive(Debug, Clone, PartialEq)]
pub enum Fixture {
    /// Expected object-store state.
    Objects(ExpectedState),
    /// Expected provisioning-tool output.
    Outputs(Map<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NestedEntry {
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    content: Option<String>,
}

/// One entry of an objects fixture, in either accepted shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ObjectEntry {
    Nested(NestedEntry),
    Flat(BTreeMap<String, String>),
}

impl From<ObjectEntry> for ExpectedObject {
    fn from(entry: ObjectEntry) -> Self {
        match entry {
            ObjectEntry::Nested(NestedEntry { metadata, content }) => Self { metadata, content },
            ObjectEntry::Flat(metadata) => Self {
                metadata,
                content: None,
            },
        }
    }
}

fn fixture_error(path: &Path, message: impl ToString) -> HarnessError {
    HarnessError::Fixture {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn read_document(path: &Path) -> HarnessResult<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).map_err(|e| fixture_error(path, e))?;
    match serde_json::from_str::<Value>(&raw).map_err(|e| fixture_error(path, e))? {
        Value::Object(map) => Ok(map),
        other => Err(fixture_error(
            path,
            format!("expected a JSON object at the top level, found {}", kind(&other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether `value` looks like an objects-fixture entry.
fn is_object_entry(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    let nested = !map.is_empty()
        && map.keys().all(|k| k == "metadata" || k == "content")
        && map
            .get("metadata")
            .is_none_or(|m| m.as_object().is_some_and(|m| m.values().all(Value::is_string)))
        && map.get("content").is_none_or(Value::is_string);
    let flat = map
        .iter()
        .all(|(k, v)| v.is_string() && k.parse::<MetadataField>().is_ok());
    nested || flat
}

fn into_expected(path: &Path, document: Map<String, Value>) -> HarnessResult<ExpectedState> {
    document
        .into_iter()
        .map(|(key, value)| {
            let entry: ObjectEntry = serde_json::from_value(value)
                .map_err(|e| fixture_error(path, format!("{key}: {e}")))?;
            Ok((ObjectKey::new(key), entry.into()))
        })
        .collect()
}

/// Load a fixture, detecting its shape.
///
/// The document is an objects fixture when every entry is either a
/// `{metadata, content}` object or a flat map of recognized header names to
/// strings. Anything else is treated as an outputs fixture.
pub fn load_fixture(path: impl AsRef<Path>) -> HarnessResult<Fixture> {
    let path = path.as_ref();
    let document = read_document(path)?;
    let fixture = if document.values().all(is_object_entry) {
        Fixture::Objects(into_expected(path, document)?)
    } else {
        Fixture::Outputs(document)
    };
    debug!(
        path = %path.display(),
        objects = matches!(fixture, Fixture::Objects(_)),
        "fixture loaded"
    );
    Ok(fixture)
}

/// Load an objects fixture.
pub fn load_expected(path: impl AsRef<Path>) -> HarnessResult<ExpectedState> {
    let path = path.as_ref();
    into_expected(path, read_document(path)?)
}

/// Load an outputs fixture.
pub fn load_outputs(path: impl AsRef<Path>) -> HarnessResult<Map<String, Value>> {
    read_document(path.as_ref())
}

/// Deep equality between expected and actual tool outputs.
#[must_use]
pub fn outputs_match(expected: &Map<String, Value>, actual: &Value) -> bool {
    actual.as_object().is_some_and(|actual| actual == expected)
}
