//! Rules: the unit a [`crate::view::View`] is built from.

use serde::{Deserialize, Serialize};
use tansive_core::{Action, ResourceUri};

/// Whether a rule grants or removes authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Grants the listed actions on the listed targets.
    Allow,
    /// Removes the listed actions on the listed targets. Deny always wins
    /// over any matching `Allow` (§8 invariant 3).
    Deny,
}

/// `{intent, actions, targets}` — a single policy rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    /// Allow or deny.
    pub intent: Intent,
    /// The actions this rule covers.
    pub actions: Vec<Action>,
    /// The resource URI patterns this rule covers.
    pub targets: Vec<ResourceUri>,
}

impl Rule {
    /// Build an `Allow` rule.
    #[must_use]
    pub fn allow(actions: Vec<Action>, targets: Vec<ResourceUri>) -> Self {
        Self {
            intent: Intent::Allow,
            actions,
            targets,
        }
    }

    /// Build a `Deny` rule.
    #[must_use]
    pub fn deny(actions: Vec<Action>, targets: Vec<ResourceUri>) -> Self {
        Self {
            intent: Intent::Deny,
            actions,
            targets,
        }
    }

    /// Whether any of this rule's targets match `target`.
    #[must_use]
    pub fn matches_target(&self, target: &ResourceUri) -> bool {
        self.targets.iter().any(|t| t.matches(target))
    }

    /// The subset of `required` this rule's `actions` cover.
    #[must_use]
    pub fn intersect_actions<'a>(&'a self, required: &'a [Action]) -> Vec<&'a Action> {
        required.iter().filter(|a| self.actions.contains(a)).collect()
    }
}
