//! View: the atomic unit of authorization (§3).

use serde::{Deserialize, Serialize};
use tansive_core::ViewId;

use crate::rule::Rule;

/// Upper bound on what a view's rules may target: `{catalog, variant?, namespace?}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scope {
    /// The catalog this view is scoped to.
    pub catalog: String,
    /// An optional variant within the catalog.
    pub variant: Option<String>,
    /// An optional namespace within the variant.
    pub namespace: Option<String>,
}

/// A named, scoped policy: a list of rules evaluated in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct View {
    /// The view's id.
    pub id: ViewId,
    /// The view's label, unique within its catalog (used in adoption URIs:
    /// `res://views/<label>`).
    pub label: String,
    /// The tenant this view belongs to.
    pub tenant_id: String,
    /// The scope bounding what this view's rules may target.
    pub scope: Scope,
    /// Rules, evaluated in order (§4.3).
    pub rules: Vec<Rule>,
}

impl View {
    /// Construct a view.
    #[must_use]
    pub fn new(id: ViewId, label: impl Into<String>, tenant_id: impl Into<String>, scope: Scope, rules: Vec<Rule>) -> Self {
        Self {
            id,
            label: label.into(),
            tenant_id: tenant_id.into(),
            scope,
            rules,
        }
    }
}
