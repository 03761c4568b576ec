//! The event envelope published on a topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single event published to a topic.
///
/// `name` matches the audit event taxonomy (`skill_start`, `policy_decision`,
/// `skill_input_transformed`, `skill_end`, ...) so an interactive NDJSON
/// consumer and the audit log can share payload shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// The event name, e.g. `"skill_start"`.
    pub name: String,
    /// The event body.
    pub payload: Value,
}

impl Event {
    /// Build an event.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Serialize as a single NDJSON line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the payload contains non-JSON-
    /// serializable content (never happens for values built from `json!`).
    pub fn to_ndjson_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
