//! Actions: dotted identifiers a view's rules grant or deny.
//!
//! `system.*` actions are a closed enumeration (§3); everything else is a
//! free-form, user-defined dotted identifier such as `kubernetes.pods.list`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of `system.*` actions.
///
/// Enforced at view-validation time (§9: "Closed vs. open action sets").
pub const SYSTEM_ACTIONS: &[&str] = &[
    "system.catalog.create",
    "system.catalog.read",
    "system.catalog.update",
    "system.catalog.delete",
    "system.variant.create",
    "system.variant.read",
    "system.variant.update",
    "system.variant.delete",
    "system.namespace.create",
    "system.namespace.read",
    "system.namespace.update",
    "system.namespace.delete",
    "system.view.create",
    "system.view.read",
    "system.view.update",
    "system.view.delete",
    "system.resource.create",
    "system.resource.read",
    "system.resource.update",
    "system.resource.delete",
    "system.skillset.create",
    "system.skillset.read",
    "system.skillset.update",
    "system.skillset.delete",
    "system.skillset.use",
    "system.catalog.adoptView",
];

/// Errors constructing an [`Action`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The action was empty.
    #[error("action must not be empty")]
    Empty,

    /// A `system.`-prefixed action that is not in [`SYSTEM_ACTIONS`].
    #[error("unknown system action: {0}")]
    UnknownSystemAction(String),
}

/// A dotted action identifier, e.g. `system.skillset.use` or
/// `kubernetes.pods.list`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    /// Validate and wrap an action string.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Empty`] for an empty string, or
    /// [`ActionError::UnknownSystemAction`] for a `system.`-prefixed action
    /// outside the closed enumeration.
    pub fn new(value: impl Into<String>) -> Result<Self, ActionError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ActionError::Empty);
        }
        if value.starts_with("system.") && !SYSTEM_ACTIONS.contains(&value.as_str()) {
            return Err(ActionError::UnknownSystemAction(value));
        }
        Ok(Self(value))
    }

    /// The action as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a `system.*` action.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.0.starts_with("system.")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.0)
    }
}

impl TryFrom<String> for Action {
    type Error = ActionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.0
    }
}

impl std::str::FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_system_action() {
        assert!(Action::new("system.skillset.use").is_ok());
    }

    #[test]
    fn rejects_unknown_system_action() {
        assert_eq!(
            Action::new("system.wizard.summon"),
            Err(ActionError::UnknownSystemAction("system.wizard.summon".into()))
        );
    }

    #[test]
    fn accepts_free_form_action() {
        assert!(Action::new("kubernetes.pods.list").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Action::new(""), Err(ActionError::Empty));
    }

    #[test]
    fn serde_roundtrips() {
        let action = Action::new("kubernetes.pods.list").unwrap();
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, "\"kubernetes.pods.list\"");
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }
}
