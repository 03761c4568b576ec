//! The rule-ordered, deny-wins policy evaluator (C3, §4.3).

use serde::{Deserialize, Serialize};
use tansive_core::{Action, ResourceUri};

use crate::rule::{Intent, Rule};
use crate::view::View;

/// One rule that matched the evaluated `(action, target)` pair, kept so the
/// decision's `basis` can be surfaced to the caller and to the audit log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Index of the matching rule within the view's rule list.
    pub rule_index: usize,
    /// The rule's intent.
    pub intent: Intent,
    /// The actions (from `required`) this rule actually covers.
    pub actions: Vec<Action>,
}

/// The result of evaluating a view against a required action set and target.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// At least one matching rule allowed (and none denied).
    Allowed {
        /// The allow rules that matched, in rule order.
        basis: Vec<RuleMatch>,
        /// The subset of the required actions actually authorized.
        authorized: Vec<Action>,
    },
    /// A matching `Deny` rule was found, or no rule matched at all
    /// (deny-by-default).
    Denied {
        /// The deny rules that matched, in rule order. Empty when denied by
        /// default (no rule matched).
        basis: Vec<RuleMatch>,
    },
}

impl Decision {
    /// Whether this decision grants access.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Evaluate `view` against a required action set and a concrete target URI.
///
/// Implements §4.3: collect every rule whose targets match `target` and
/// whose actions intersect `required`; if any matched rule denies, the
/// result denies regardless of allow-rule order (§8 invariant 3); otherwise
/// if any matched rule allows, the result allows; otherwise deny-by-default.
#[must_use]
pub fn evaluate(view: &View, required: &[Action], target: &ResourceUri) -> Decision {
    let mut deny_basis = Vec::new();
    let mut allow_basis = Vec::new();
    let mut authorized = Vec::new();

    for (rule_index, rule) in view.rules.iter().enumerate() {
        if !rule.matches_target(target) {
            continue;
        }
        let hit: Vec<Action> = rule.intersect_actions(required).into_iter().cloned().collect();
        if hit.is_empty() {
            continue;
        }
        let rule_match = RuleMatch {
            rule_index,
            intent: rule.intent,
            actions: hit.clone(),
        };
        match rule.intent {
            Intent::Deny => deny_basis.push(rule_match),
            Intent::Allow => {
                for action in &hit {
                    if !authorized.contains(action) {
                        authorized.push(action.clone());
                    }
                }
                allow_basis.push(rule_match);
            }
        }
    }

    if !deny_basis.is_empty() {
        tracing::debug!(view = %view.label, matches = deny_basis.len(), "policy denied");
        return Decision::Denied { basis: deny_basis };
    }
    if !allow_basis.is_empty() {
        return Decision::Allowed {
            basis: allow_basis,
            authorized,
        };
    }
    Decision::Denied { basis: Vec::new() }
}

/// Whether `view` may adopt `child` as a derived view (§4.3, §8 invariant 4).
///
/// Requires both:
/// 1. `view` allows `system.catalog.adoptView` on `res://views/<child.label>`.
/// 2. Every `Allow` rule of `child` is entailed by `view` — i.e. for each
///    `(action, target)` pair the child allows, `view` also allows that
///    exact action on that exact target. `Deny` rules only ever narrow
///    authority further, so they need no parent counterpart.
#[must_use]
pub fn can_adopt_view(view: &View, child: &View) -> bool {
    let adopt_action = match Action::new("system.catalog.adoptView") {
        Ok(a) => a,
        Err(_) => return false,
    };
    let child_uri = match ResourceUri::parse(format!("res://views/{}", child.label)) {
        Ok(u) => u,
        Err(_) => return false,
    };
    if !evaluate(view, std::slice::from_ref(&adopt_action), &child_uri).is_allowed() {
        return false;
    }

    for rule in &child.rules {
        if rule.intent != Intent::Allow {
            continue;
        }
        for target in &rule.targets {
            let decision = evaluate(view, &rule.actions, target);
            let Decision::Allowed { authorized, .. } = decision else {
                return false;
            };
            if !rule.actions.iter().all(|a| authorized.contains(a)) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;
    use crate::view::Scope;
    use tansive_core::ViewId;

    fn action(s: &str) -> Action {
        Action::new(s).unwrap()
    }

    fn uri(s: &str) -> ResourceUri {
        ResourceUri::parse(s).unwrap()
    }

    fn scope() -> Scope {
        Scope {
            catalog: "default".into(),
            variant: None,
            namespace: None,
        }
    }

    fn view_with(rules: Vec<Rule>) -> View {
        View::new(ViewId::new(), "test-view", "tenant-1", scope(), rules)
    }

    #[test]
    fn deny_wins_regardless_of_rule_order() {
        let view = view_with(vec![
            Rule::allow(vec![action("kubernetes.pods.list")], vec![uri("res://resources/pods/*")]),
            Rule::deny(vec![action("kubernetes.pods.list")], vec![uri("res://resources/pods/*")]),
        ]);
        let decision = evaluate(&view, &[action("kubernetes.pods.list")], &uri("res://resources/pods/foo"));
        assert!(!decision.is_allowed());
    }

    #[test]
    fn allow_without_matching_deny_is_allowed() {
        let view = view_with(vec![Rule::allow(
            vec![action("kubernetes.pods.list")],
            vec![uri("res://resources/pods/*")],
        )]);
        let decision = evaluate(&view, &[action("kubernetes.pods.list")], &uri("res://resources/pods/foo"));
        assert!(decision.is_allowed());
    }

    #[test]
    fn no_matching_rule_denies_by_default() {
        let view = view_with(vec![]);
        let decision = evaluate(&view, &[action("kubernetes.pods.list")], &uri("res://resources/pods/foo"));
        match decision {
            Decision::Denied { basis } => assert!(basis.is_empty()),
            Decision::Allowed { .. } => panic!("expected deny by default"),
        }
    }

    #[test]
    fn prefix_wildcard_matches_descendants_only() {
        let view = view_with(vec![Rule::allow(
            vec![action("system.skillset.use")],
            vec![uri("res://skillsets/a/b/*")],
        )]);
        assert!(evaluate(&view, &[action("system.skillset.use")], &uri("res://skillsets/a/b/anything")).is_allowed());
        assert!(!evaluate(&view, &[action("system.skillset.use")], &uri("res://skillsets/a/bc")).is_allowed());
    }

    #[test]
    fn subset_adoption_requires_parent_entailment() {
        let parent = view_with(vec![
            Rule::allow(vec![action("system.catalog.adoptView")], vec![uri("res://views/child")]),
            Rule::allow(vec![action("kubernetes.pods.list")], vec![uri("res://resources/pods/*")]),
        ]);
        let child_ok = View::new(
            ViewId::new(),
            "child",
            "tenant-1",
            scope(),
            vec![Rule::allow(
                vec![action("kubernetes.pods.list")],
                vec![uri("res://resources/pods/a")],
            )],
        );
        assert!(can_adopt_view(&parent, &child_ok));

        let child_too_broad = View::new(
            ViewId::new(),
            "child",
            "tenant-1",
            scope(),
            vec![Rule::allow(
                vec![action("kubernetes.secrets.read")],
                vec![uri("res://resources/secrets/*")],
            )],
        );
        assert!(!can_adopt_view(&parent, &child_too_broad));
    }

    #[test]
    fn adoption_requires_adopt_view_grant() {
        let parent = view_with(vec![Rule::allow(
            vec![action("kubernetes.pods.list")],
            vec![uri("res://resources/pods/*")],
        )]);
        let child = View::new(ViewId::new(), "child", "tenant-1", scope(), vec![]);
        assert!(!can_adopt_view(&parent, &child));
    }
}
