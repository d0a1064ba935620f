//! Event record type
//!
//! An event is an opaque JSON object received from the messaging service.
//! The archiver only looks at a handful of fields:
//! - `type` / `subtype`: a diagnostic label
//! - `ts`: Unix seconds (number or numeric string), drives partitioning
//! - `_history_id`: optional logical identity key used for dedup

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the caller-assigned logical identity key
pub const IDENTITY_FIELD: &str = "_history_id";

/// A single archived event, one JSON object per log line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Create an empty event
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// The `type` discriminator
    pub fn kind(&self) -> Option<&str> {
        self.get_str("type")
    }

    /// The optional `subtype` discriminator
    pub fn subtype(&self) -> Option<&str> {
        self.get_str("subtype")
    }

    pub fn set_subtype(&mut self, subtype: impl Into<String>) {
        self.0
            .insert("subtype".to_string(), Value::String(subtype.into()));
    }

    /// Human-readable `type[.subtype]` label, for diagnostics only
    pub fn friendly_type(&self) -> String {
        let mut label = self.kind().unwrap_or("unknown").to_string();
        if let Some(subtype) = self.subtype().filter(|s| !s.is_empty()) {
            label.push('.');
            label.push_str(subtype);
        }
        label
    }

    /// Whole Unix seconds of the `ts` field, floored
    ///
    /// Accepts JSON numbers and numeric strings such as `"1700000000.000200"`.
    /// Returns `None` when the field is absent or not a usable number.
    pub fn timestamp_secs(&self) -> Option<i64> {
        match self.0.get("ts")? {
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    Some(secs)
                } else {
                    let secs = n.as_f64()?.floor();
                    (secs.is_finite() && secs.abs() < i64::MAX as f64).then_some(secs as i64)
                }
            }
            Value::String(s) => parse_ts_str(s),
            _ => None,
        }
    }

    /// The logical identity key, if the caller assigned one
    pub fn identity_key(&self) -> Option<&str> {
        self.get_str(IDENTITY_FIELD)
    }

    pub fn set_identity_key(&mut self, key: impl Into<String>) {
        self.0
            .insert(IDENTITY_FIELD.to_string(), Value::String(key.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field lookup; non-string values yield `None`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Serialize event to JSON string (for JSONL)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from JSON string; the line must hold an object
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Deserialize event from raw line bytes; invalid UTF-8 is a decode error
    pub fn from_json_slice(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}

impl From<Map<String, Value>> for Event {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Parse `"<int>[.<digits>]"` into floored whole seconds without going
/// through `f64`, so values just below an hour boundary stay in that hour.
fn parse_ts_str(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, frac) = match raw.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (raw, ""),
    };
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = match whole {
        "" | "-" | "+" if frac.is_empty() => return None,
        "" | "-" | "+" => 0,
        _ => whole.parse().ok()?,
    };
    let has_fraction = frac.chars().any(|c| c != '0');
    if whole.starts_with('-') && has_fraction {
        secs.checked_sub(1)
    } else {
        Some(secs)
    }
}
