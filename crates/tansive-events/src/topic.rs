//! Topics the event bus multiplexes on.
//!
//! Every session owns two topics: its full audit-equivalent log stream, and
//! the subset an interactive NDJSON response streams back to the caller
//! (§4.11, §4.13).

use std::fmt;

use tansive_core::SessionId;

/// A topic name. Opaque beyond prefix matching, used by
/// [`crate::bus::EventBus::close_all_for_pattern`] on session teardown.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Build an arbitrary topic from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `session-log/<session_id>` — every audited event for a session.
    #[must_use]
    pub fn session_log(session_id: SessionId) -> Self {
        Self(format!("session-log/{session_id}"))
    }

    /// `interactive-log/<session_id>` — the subset an interactive NDJSON
    /// response streams to its caller.
    #[must_use]
    pub fn interactive_log(session_id: SessionId) -> Self {
        Self(format!("interactive-log/{session_id}"))
    }

    /// The topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this topic's name starts with `prefix`.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_topics_are_distinct() {
        let id = SessionId::new();
        assert_ne!(Topic::session_log(id), Topic::interactive_log(id));
    }

    #[test]
    fn prefix_match_is_exact_string_prefix() {
        let id = SessionId::new();
        let topic = Topic::session_log(id);
        assert!(topic.matches_prefix("session-log/"));
        assert!(!topic.matches_prefix("interactive-log/"));
    }
}
