//! [`CatalogStore`]: the trait boundary standing in for the out-of-scope
//! SQL-backed catalog object store, plus [`InMemoryCatalog`], a fake
//! implementation good enough to drive the execution core end to end.
//!
//! Grounded in the teacher's `CapabilityStore` (`astrid-capabilities::store`):
//! a `RwLock<HashMap<_, _>>` per concern, cloned behind an `Arc` so every
//! session-owning task shares one store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tansive_core::{SessionId, ViewId};
use tansive_policy::View;

use crate::error::{CatalogError, CatalogResult};
use crate::session_record::{SessionRecord, SessionStatusDetail, SessionSummary};
use crate::skillset::SkillSet;

/// The catalog object store boundary: views, skillsets, session records,
/// and finalized audit log blobs.
///
/// Every method is async to mirror a real SQL-backed implementation, even
/// though [`InMemoryCatalog`] never actually awaits.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch a view by id.
    async fn get_view(&self, view_id: ViewId) -> CatalogResult<View>;

    /// Fetch a view by its catalog-scoped label (used for adoption and for
    /// `POST /auth/view-adoptions/{catalog}/{viewLabel}`).
    async fn get_view_by_label(&self, catalog: &str, label: &str) -> CatalogResult<View>;

    /// Fetch a skillset by catalog-unique name.
    async fn get_skillset(&self, name: &str) -> CatalogResult<SkillSet>;

    /// Create a new session record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::SessionAlreadyExists`] if a record with this
    /// id is already present.
    async fn create_session(&self, record: SessionRecord) -> CatalogResult<()>;

    /// Fetch a session record by id.
    async fn get_session(&self, session_id: SessionId) -> CatalogResult<SessionRecord>;

    /// List every session record currently tracked.
    async fn list_sessions(&self) -> CatalogResult<Vec<SessionRecord>>;

    /// Update a session's coarse summary and status detail.
    async fn update_session_status(&self, session_id: SessionId, summary: SessionSummary, status: SessionStatusDetail) -> CatalogResult<()>;

    /// Persist a finalized, base64-encoded audit log blob for a session.
    async fn store_audit_blob(&self, session_id: SessionId, b64: String) -> CatalogResult<()>;

    /// Load a previously stored audit log blob.
    async fn load_audit_blob(&self, session_id: SessionId) -> CatalogResult<String>;
}

/// An in-memory [`CatalogStore`] fake: no persistence across process
/// restarts, no multi-tenancy enforcement beyond what's asked for — good
/// enough to exercise the execution core in tests and local development.
#[derive(Default)]
pub struct InMemoryCatalog {
    views_by_id: RwLock<HashMap<ViewId, View>>,
    views_by_label: RwLock<HashMap<(String, String), ViewId>>,
    skillsets: RwLock<HashMap<String, SkillSet>>,
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    audit_blobs: RwLock<HashMap<SessionId, String>>,
}

impl InMemoryCatalog {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a view, indexed both by id and by `(catalog, label)`.
    pub fn insert_view(&self, view: View) {
        let key = (view.scope.catalog.clone(), view.label.clone());
        self.views_by_label.write().unwrap_or_else(|e| e.into_inner()).insert(key, view.id);
        self.views_by_id.write().unwrap_or_else(|e| e.into_inner()).insert(view.id, view);
    }

    /// Seed a skillset, indexed by name.
    pub fn insert_skillset(&self, skillset: SkillSet) {
        self.skillsets.write().unwrap_or_else(|e| e.into_inner()).insert(skillset.name.clone(), skillset);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_view(&self, view_id: ViewId) -> CatalogResult<View> {
        self.views_by_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&view_id)
            .cloned()
            .ok_or_else(|| CatalogError::ViewNotFound(view_id.to_string()))
    }

    async fn get_view_by_label(&self, catalog: &str, label: &str) -> CatalogResult<View> {
        let id = *self
            .views_by_label
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(catalog.to_string(), label.to_string()))
            .ok_or_else(|| CatalogError::ViewNotFound(format!("{catalog}/{label}")))?;
        self.get_view(id).await
    }

    async fn get_skillset(&self, name: &str) -> CatalogResult<SkillSet> {
        self.skillsets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::SkillSetNotFound(name.to_string()))
    }

    async fn create_session(&self, record: SessionRecord) -> CatalogResult<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(&record.session_id) {
            return Err(CatalogError::SessionAlreadyExists(record.session_id.to_string()));
        }
        sessions.insert(record.session_id, record);
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> CatalogResult<SessionRecord> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&session_id)
            .cloned()
            .ok_or_else(|| CatalogError::SessionNotFound(session_id.to_string()))
    }

    async fn list_sessions(&self) -> CatalogResult<Vec<SessionRecord>> {
        Ok(self.sessions.read().unwrap_or_else(|e| e.into_inner()).values().cloned().collect())
    }

    async fn update_session_status(&self, session_id: SessionId, summary: SessionSummary, status: SessionStatusDetail) -> CatalogResult<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let record = sessions
            .get_mut(&session_id)
            .ok_or_else(|| CatalogError::SessionNotFound(session_id.to_string()))?;
        record.finalize(summary, status);
        Ok(())
    }

    async fn store_audit_blob(&self, session_id: SessionId, b64: String) -> CatalogResult<()> {
        self.audit_blobs.write().unwrap_or_else(|e| e.into_inner()).insert(session_id, b64);
        Ok(())
    }

    async fn load_audit_blob(&self, session_id: SessionId) -> CatalogResult<String> {
        self.audit_blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&session_id)
            .cloned()
            .ok_or_else(|| CatalogError::AuditBlobNotFound(session_id.to_string()))
    }
}
