//! Boundary normalization for raw telemetry attributes.
//!
//! Telemetry sources hand back loosely shaped JSON: keys may be missing,
//! nested under vendor-specific envelopes, or hold non-string values. A
//! [`RawLog`] wraps one such attribute map and resolves it into a fully
//! populated [`LogRecord`] here, at the boundary, so nothing downstream
//! ever has to handle an absent field.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::models::LogRecord;

/// Keys consumed by the normalizer; everything else that is a scalar lands
/// in `additional_context`.
const CLAIMED_KEYS: &[&str] = &[
    "trace_id",
    "message",
    "timestamp",
    "service",
    "error_code",
    "error_type",
    "stack_trace",
    "host",
    "hostname",
    "environment",
    "env",
    "resolution",
    "error",
    "attributes",
];

/// A possibly-partial attribute map from a telemetry source.
#[derive(Debug, Clone, Default)]
pub struct RawLog(pub Map<String, Value>);

impl RawLog {
    pub fn new(attrs: Map<String, Value>) -> Self {
        Self(attrs)
    }

    /// Coerce a JSON scalar to a string. Objects and arrays don't coerce.
    fn coerce(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Look up a dotted path (`"error.code"`) through nested objects,
    /// checking a top-level `attributes` envelope as a fallback.
    fn lookup(&self, path: &str) -> Option<String> {
        fn walk<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
            let mut current: &Value = map.get(path.split('.').next()?)?;
            for part in path.split('.').skip(1) {
                current = current.as_object()?.get(part)?;
            }
            Some(current)
        }

        if let Some(v) = walk(&self.0, path).and_then(Self::coerce) {
            return Some(v);
        }
        self.0
            .get("attributes")
            .and_then(Value::as_object)
            .and_then(|attrs| walk(attrs, path))
            .and_then(Self::coerce)
    }

    /// First non-empty value among several candidate paths.
    fn first_of(&self, paths: &[&str]) -> Option<String> {
        paths
            .iter()
            .filter_map(|p| self.lookup(p))
            .find(|v| !v.is_empty())
    }

    /// Resolve this raw attribute map into a canonical record.
    ///
    /// Pure transform: absent or malformed values yield the field's
    /// default, never an error.
    pub fn normalize(&self) -> LogRecord {
        let defaults = LogRecord::default();

        let mut additional_context = BTreeMap::new();
        for (key, value) in &self.0 {
            if CLAIMED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(v) = Self::coerce(value) {
                additional_context.insert(key.clone(), v);
            }
        }

        LogRecord {
            trace_id: self
                .first_of(&["trace_id"])
                .unwrap_or(defaults.trace_id),
            message: self.first_of(&["message"]).unwrap_or(defaults.message),
            timestamp: self
                .first_of(&["timestamp"])
                .unwrap_or(defaults.timestamp),
            service: self.first_of(&["service"]).unwrap_or(defaults.service),
            error_code: self
                .first_of(&["error_code", "error.code"])
                .unwrap_or(defaults.error_code),
            error_type: self
                .first_of(&["error_type", "error.type"])
                .unwrap_or(defaults.error_type),
            stack_trace: self
                .first_of(&["stack_trace", "error.stack"])
                .unwrap_or(defaults.stack_trace),
            host: self
                .first_of(&["host", "hostname"])
                .unwrap_or(defaults.host),
            environment: self
                .first_of(&["environment", "env"])
                .unwrap_or(defaults.environment),
            additional_context,
            resolution: self.first_of(&["resolution"]),
        }
    }
}

impl From<Value> for RawLog {
    /// Non-object values normalize to an all-defaults record.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }
}
