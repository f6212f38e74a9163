//! Document model shared by the store and the resource layer.
//!
//! A document is a plain JSON object. Stored documents carry server-stamped
//! metadata fields (`_id`, `_created`, `_updated`) alongside whatever fields
//! the caller supplied.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A JSON document as stored in a collection.
pub type Document = Map<String, Value>;

/// A flat equality filter: a document matches when every entry equals the
/// document's value for that field.
pub type Filter = Map<String, Value>;

/// Server-stamped document id field.
pub const ID_FIELD: &str = "_id";

/// Server-stamped creation timestamp field.
pub const CREATED_FIELD: &str = "_created";

/// Server-stamped last-update timestamp field.
pub const UPDATED_FIELD: &str = "_updated";

/// Generate a fresh document id.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp in RFC 3339 with millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Check whether `document` matches every entry of `filter`.
///
/// The empty filter matches every document.
pub fn matches_filter(document: &Document, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

/// Merge store metadata into a document body for presentation.
pub(crate) fn with_metadata(mut body: Document, id: &str, created: &str, updated: &str) -> Document {
    body.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    body.insert(CREATED_FIELD.to_string(), Value::String(created.to_string()));
    body.insert(UPDATED_FIELD.to_string(), Value::String(updated.to_string()));
    body
}

/// Strip server-stamped metadata from an incoming document body.
///
/// Callers may echo back documents they previously read; the stamps are
/// always reissued by the store, never trusted from input.
pub(crate) fn strip_metadata(mut body: Document) -> Document {
    body.remove(ID_FIELD);
    body.remove(CREATED_FIELD);
    body.remove(UPDATED_FIELD);
    body
}
