//! Tansive Policy — the view-based, rule-ordered policy evaluator (C3).
//!
//! A [`View`] is a named, scoped list of [`Rule`]s. [`evaluate`] decides
//! whether a required action set is authorized against a target resource
//! URI, with deny-wins semantics (§4.3, §8 invariant 3). [`can_adopt_view`]
//! implements the subset-adoption check a child view must pass before a
//! parent view may derive it (§8 invariant 4).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod evaluator;
pub mod rule;
pub mod view;

pub use evaluator::{can_adopt_view, evaluate, Decision, RuleMatch};
pub use rule::{Intent, Rule};
pub use view::{Scope, View};
