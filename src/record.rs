//! Log record construction and JSON formatting.

use crate::error::Result;
use crate::level::Level;
use crate::sanitize::sanitize;
use crate::scrub::Scrubber;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Caller-supplied fields for one log call.
///
/// All fields default to empty; metadata defaults to an empty object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFields {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub event: String,

    #[serde(default)]
    pub actor: String,

    #[serde(default)]
    pub object: String,

    #[serde(default = "empty_object")]
    pub metadata: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for LogFields {
    fn default() -> Self {
        Self {
            message: String::new(),
            event: String::new(),
            actor: String::new(),
            object: String::new(),
            metadata: empty_object(),
        }
    }
}

impl LogFields {
    /// Fields carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// A fully-formed structured log record, ready for serialization.
///
/// Text fields are sanitized and metadata is scrubbed at construction time,
/// so a record can be handed to any transport as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// UTC timestamp, ISO-8601 with millisecond precision
    pub timestamp: String,
    pub level: Level,
    pub message: String,
    pub event: String,
    pub actor: String,
    pub object: String,
    pub metadata: Value,
}

impl LogRecord {
    /// Build a record from caller fields.
    ///
    /// Metadata passes through the scrubber and its string leaves through the
    /// sanitizer. Construction never fails; see [`metadata_value`] for the
    /// unserializable-metadata fallback.
    pub fn build(level: Level, fields: LogFields, scrubber: &Scrubber, now: DateTime<Utc>) -> Self {
        let metadata = sanitize_value(&scrubber.scrub(&fields.metadata));
        Self {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message: sanitize(&fields.message),
            event: sanitize(&fields.event),
            actor: sanitize(&fields.actor),
            object: sanitize(&fields.object),
            metadata,
        }
    }

    /// Serialize to a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| crate::error::LogwardError::Serialize(e.to_string()))
    }
}

/// Convert arbitrary serializable metadata into a JSON value.
///
/// Metadata that cannot be represented as JSON (e.g. a map with non-string
/// keys) is replaced with the `{"invalid_metadata": true}` marker rather than
/// failing the log call.
pub fn metadata_value<T: Serialize>(metadata: &T) -> Value {
    match serde_json::to_value(metadata) {
        Ok(value) => value,
        Err(_) => json!({ "invalid_metadata": true }),
    }
}

/// Sanitize every string leaf of a JSON value
fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
