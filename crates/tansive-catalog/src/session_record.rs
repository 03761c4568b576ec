//! The persisted session record the catalog tracks (§3 "Session" /
//! "Lifecycle"): what the Server sees via `GET`/`PATCH /sessions/...`,
//! distinct from the live `tansive_session::Session` the Runtime holds.

use serde::{Deserialize, Serialize};
use tansive_core::{SessionId, Timestamp, ViewId};

/// Coarse-grained session status, per the state machine in §4.6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SessionSummary {
    /// Created, not yet started.
    Pending,
    /// Actively executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped by explicit request.
    Stopped,
}

impl SessionSummary {
    /// Whether this is one of the three terminal states that trigger
    /// `Finalize` (§4.6).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

/// Structured status detail recorded alongside the coarse summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStatusDetail {
    /// The error message, if the session failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the finalized audit log was uploaded (a catalog resource URI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log_uri: Option<String>,
    /// The session's Ed25519 public verification key, base64url-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_key: Option<String>,
}

/// A session as tracked by the catalog store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session's id.
    pub session_id: SessionId,
    /// Owning tenant.
    pub tenant_id: String,
    /// The user who created the session.
    pub user_id: String,
    /// Catalog this session runs in.
    pub catalog: String,
    /// Variant within the catalog, if any.
    pub variant: Option<String>,
    /// Namespace within the variant, if any.
    pub namespace: Option<String>,
    /// The view this session was created under.
    pub view_id: ViewId,
    /// Coarse status.
    pub summary: SessionSummary,
    /// Structured status detail.
    #[serde(default)]
    pub status: SessionStatusDetail,
    /// Creation time.
    pub created_at: Timestamp,
    /// Start time, once the session transitions to `Running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl SessionRecord {
    /// Build a freshly created, `Pending` session record.
    #[must_use]
    pub fn new(session_id: SessionId, tenant_id: impl Into<String>, user_id: impl Into<String>, catalog: impl Into<String>, view_id: ViewId) -> Self {
        let now = Timestamp::now();
        Self {
            session_id,
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            catalog: catalog.into(),
            variant: None,
            namespace: None,
            view_id,
            summary: SessionSummary::Pending,
            status: SessionStatusDetail::default(),
            created_at: now,
            started_at: None,
            updated_at: now,
        }
    }

    /// Transition to `Running`, stamping `started_at` on first entry.
    pub fn mark_running(&mut self) {
        self.summary = SessionSummary::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Timestamp::now());
        }
        self.updated_at = Timestamp::now();
    }

    /// Transition to a terminal state, recording the final status detail.
    pub fn finalize(&mut self, summary: SessionSummary, status: SessionStatusDetail) {
        self.summary = summary;
        self.status = status;
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_pending() {
        let record = SessionRecord::new(SessionId::new(), "tenant-1", "user-1", "default", ViewId::new());
        assert_eq!(record.summary, SessionSummary::Pending);
        assert!(record.started_at.is_none());
    }

    #[test]
    fn mark_running_stamps_started_at_once() {
        let mut record = SessionRecord::new(SessionId::new(), "tenant-1", "user-1", "default", ViewId::new());
        record.mark_running();
        let first = record.started_at;
        assert!(first.is_some());
        record.mark_running();
        assert_eq!(record.started_at, first);
    }

    #[test]
    fn terminal_states_are_recognized() {
        assert!(SessionSummary::Completed.is_terminal());
        assert!(SessionSummary::Failed.is_terminal());
        assert!(SessionSummary::Stopped.is_terminal());
        assert!(!SessionSummary::Running.is_terminal());
        assert!(!SessionSummary::Pending.is_terminal());
    }
}
