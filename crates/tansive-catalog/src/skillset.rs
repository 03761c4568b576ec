//! SkillSet: a versioned bundle of sources, context slots, skills, and
//! declared dependencies (§3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tansive_core::Action;

/// The closed set of runner ids a source may name (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerKind {
    /// A sandboxed stdio child process (C8).
    Stdio,
    /// A long-lived stdio MCP server (C9).
    McpStdio,
}

/// `{name, runner, config}` — one source a skillset's skills may bind to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Source {
    /// Unique name within the skillset.
    pub name: String,
    /// Which runner executes this source.
    pub runner: RunnerKind,
    /// Runner-specific configuration (stdio runtime/script/env, or MCP
    /// server command/args/env), opaque to the catalog.
    pub config: Value,
}

/// A named, typed context slot skills may read via loopback (`GET /context`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextSlot {
    /// The slot's name, as referenced by `GET /context?name=`.
    pub name: String,
    /// JSON Schema describing the slot's value shape.
    pub schema: Value,
    /// The slot's current value.
    pub value: Value,
}

/// `{name, source, inputSchema, outputSchema, exportedActions, annotations,
/// transform?}` — a callable unit within a skillset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkillDef {
    /// Skill name, unique within the skillset.
    pub name: String,
    /// The source (by name) this skill's invocations dispatch to.
    pub source: String,
    /// JSON Schema for the skill's input arguments.
    pub input_schema: Value,
    /// JSON Schema for the skill's output.
    pub output_schema: Value,
    /// Actions the invoking view must allow to run this skill.
    pub exported_actions: Vec<Action>,
    /// Free-form annotations (e.g. `mcp:tools` for MCP proxy filtering, §4.9).
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,
    /// Name of a registered transform (§4.7), run over input args before
    /// dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl SkillDef {
    /// The `mcp:tools` annotation, if present (§4.9, §8 scenario S6).
    #[must_use]
    pub fn mcp_tools_annotation(&self) -> Option<&str> {
        self.annotations.get("mcp:tools").map(String::as_str)
    }
}

/// A declared reference to another catalog resource this skillset depends on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dependency {
    /// The referenced resource's URI (`res://...`).
    pub resource_uri: String,
}

/// A versioned container of sources, context, skills, and dependencies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkillSet {
    /// Catalog-unique name.
    pub name: String,
    /// Version string (semver-like, opaque to this crate).
    pub version: String,
    /// Declared sources.
    pub sources: Vec<Source>,
    /// Declared context slots.
    #[serde(default)]
    pub context: Vec<ContextSlot>,
    /// Declared skills.
    pub skills: Vec<SkillDef>,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl SkillSet {
    /// Find a skill by name.
    #[must_use]
    pub fn skill(&self, name: &str) -> Option<&SkillDef> {
        self.skills.iter().find(|s| s.name == name)
    }

    /// Find a source by name.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Find a context slot by name.
    #[must_use]
    pub fn context_slot(&self, name: &str) -> Option<&ContextSlot> {
        self.context.iter().find(|c| c.name == name)
    }

    /// Every skill whose `source` is `source_name` (used by the MCP proxy's
    /// tool filter, §4.9).
    #[must_use]
    pub fn skills_on_source<'a>(&'a self, source_name: &'a str) -> impl Iterator<Item = &'a SkillDef> {
        self.skills.iter().filter(move |s| s.source == source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SkillSet {
        SkillSet {
            name: "kubernetes-demo".into(),
            version: "1.0.0".into(),
            sources: vec![Source {
                name: "k8s".into(),
                runner: RunnerKind::Stdio,
                config: json!({}),
            }],
            context: vec![],
            skills: vec![SkillDef {
                name: "restart_deployment".into(),
                source: "k8s".into(),
                input_schema: json!({"type": "object"}),
                output_schema: json!({"type": "object"}),
                exported_actions: vec![Action::new("kubernetes.deployments.restart").unwrap()],
                annotations: std::collections::BTreeMap::new(),
                transform: None,
            }],
            dependencies: vec![],
        }
    }

    #[test]
    fn finds_skill_and_source_by_name() {
        let set = sample();
        assert!(set.skill("restart_deployment").is_some());
        assert!(set.skill("missing").is_none());
        assert!(set.source("k8s").is_some());
    }

    #[test]
    fn skills_on_source_filters_correctly() {
        let set = sample();
        let names: Vec<_> = set.skills_on_source("k8s").map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["restart_deployment"]);
        assert_eq!(set.skills_on_source("other").count(), 0);
    }
}
