//! Session object (C6, §4.6): the execution state machine driving one
//! skill invocation tree from `fetchObjects` through `Finalize`.
//!
//! `ActiveSessionManager` is a `RwLock<HashMap<SessionId, Arc<Session>>>`
//! (no `dashmap`), matching §5's "read-mostly, guarded by mutex"
//! requirement and the teacher's `CapabilityStore` fake-store idiom.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tansive_catalog::{CatalogStore, SessionStatusDetail, SessionSummary, SkillSet};
use tansive_core::{Action, InvocationId, ResourceUri, SessionId};
use tansive_crypto::KeyPair;
use tansive_events::{Event, EventBus, Topic};
use tansive_policy::{evaluate, Decision, Scope, View};

use crate::callgraph::CallGraph;
use crate::error::{SessionError, SessionResult};
use crate::transform::{self, SkillInvoker, TransformInput};

/// Default call-graph depth limit for a new session (§4.6: "MaxDepth = 3").
pub const DEFAULT_MAX_CALL_DEPTH: usize = 3;

/// What the Runtime fetched from the Server after redeeming a PKCE code
/// (§4.5 step 6): everything a [`Session`] needs to begin execution.
#[derive(Clone, Debug)]
pub struct ExecutionState {
    /// The skillset this session runs against.
    pub skillset_name: String,
    /// The session's entry skill.
    pub skill_name: String,
    /// The view definition the session's root invocations are bound to.
    pub view: View,
    /// Session-scoped variables, visible to transforms.
    pub session_variables: Value,
    /// The entry skill's input arguments.
    pub input_args: Value,
    /// The scope (catalog/variant/namespace) this session runs within.
    pub scope: Scope,
    /// The owning tenant.
    pub tenant_id: String,
}

/// Dispatches one skill invocation to its runner (stdio or MCP, C8/C9),
/// streaming output through the session's event bus.
///
/// Kept as a trait so `tansive-session` has no dependency on process
/// spawning or MCP wire details — `tansive-runner` provides the concrete
/// implementation.
#[async_trait]
pub trait SkillRunner: Send + Sync {
    /// Run `skill` (sourced from `source`) with `args`, publishing any
    /// streamed output onto `ctx.events` under `ctx.events_topic` as it is
    /// produced.
    async fn run(&self, ctx: RunnerContext<'_>) -> Result<Value, String>;

    /// Cancel every child process this runner owns for `session_id`
    /// (§4.6 `Stop`). Runners with nothing to cancel may leave this a no-op.
    async fn cancel_session(&self, _session_id: SessionId) {}
}

/// Everything a [`SkillRunner`] needs for one invocation.
pub struct RunnerContext<'a> {
    /// The source (runner binding) the skill dispatches to.
    pub source: &'a tansive_catalog::Source,
    /// The skill definition being invoked.
    pub skill: &'a tansive_catalog::SkillDef,
    /// The (already-transformed) input arguments.
    pub args: Value,
    /// The owning session.
    pub session_id: SessionId,
    /// This call's invocation id.
    pub invocation_id: InvocationId,
    /// The event bus to stream stdout/stderr lines onto.
    pub events: Arc<EventBus>,
    /// The topic to publish streamed lines onto.
    pub events_topic: Topic,
}

/// Registers a long-lived MCP proxy session for an invoker and returns the
/// URL the Runtime should hand back to the caller (§4.9 `NewMCPSession`).
/// A separate trait from [`SkillRunner`] because `RunMCPProxy` does not
/// stream and is not tied to one particular skill invocation.
#[async_trait]
pub trait McpProxyRegistrar: Send + Sync {
    /// Register a new MCP proxy session bound to `invoker_view`, returning
    /// its `/session/<rand>/mcp` URL.
    ///
    /// `invoker_id` is carried through so a proxied `tools/call` can later
    /// re-enter [`Session::run`] as that same invoker — preserving call-graph
    /// depth and policy resolution exactly as a direct invocation would.
    async fn register(&self, session_id: SessionId, invoker_view: View, invoker_id: Option<InvocationId>) -> Result<String, String>;
}

/// Parameters to create a new [`Session`] (§4.6 `CreateSession`).
pub struct CreateSessionParams {
    /// The session id, already minted and persisted by the catalog/Server
    /// side before the Runtime ever sees it.
    pub session_id: SessionId,
    /// The execution state fetched from the Server.
    pub execution_state: ExecutionState,
    /// Where to write this session's audit log.
    pub audit_log_path: PathBuf,
    /// The in-memory Ed25519 keypair used to sign this session's log.
    pub signing_key: KeyPair,
    /// Entries buffered before an automatic flush (§4.1).
    pub flush_interval: usize,
    /// Raw-log byte threshold above which `Finalize` compresses (§4.12).
    pub compress_threshold: usize,
    /// Call-graph depth limit (0 = unbounded).
    pub max_call_depth: usize,
    /// The skill runner dispatch target.
    pub runner: Arc<dyn SkillRunner>,
    /// The MCP proxy registrar.
    pub mcp_registrar: Arc<dyn McpProxyRegistrar>,
    /// The out-of-scope catalog object store.
    pub catalog: Arc<dyn CatalogStore>,
    /// The shared event bus.
    pub events: Arc<EventBus>,
}

/// One session's execution state machine (§4.6).
pub struct Session {
    /// The session's id.
    pub session_id: SessionId,
    tenant_id: String,
    scope: Scope,
    root_view: View,
    session_variables: Value,
    call_graph: CallGraph,
    max_call_depth: usize,
    invocation_views: RwLock<HashMap<InvocationId, View>>,
    skillset_name: String,
    entry_skill_name: String,
    skillset: RwLock<Option<SkillSet>>,
    audit: tansive_audit::AuditLogWriter,
    audit_log_path: PathBuf,
    compress_threshold: usize,
    events: Arc<EventBus>,
    runner: Arc<dyn SkillRunner>,
    mcp_registrar: Arc<dyn McpProxyRegistrar>,
    catalog: Arc<dyn CatalogStore>,
    finalized: AtomicBool,
}

/// The `SkillService` binding handed to a running transform (§4.7): lets the
/// script invoke a sibling skill through the same call graph and policy
/// path as any other `Run`, rather than bypassing them.
struct LoopbackSkillInvoker {
    session: Arc<Session>,
    invoker_id: InvocationId,
}

impl SkillInvoker for LoopbackSkillInvoker {
    fn invoke(&self, skill_name: &str, args: Value) -> Result<Value, String> {
        let session = Arc::clone(&self.session);
        let invoker_id = self.invoker_id;
        let skill_name = skill_name.to_string();
        tokio::runtime::Handle::current()
            .block_on(async move { session.run(Some(invoker_id), &skill_name, args, InvocationId::new()).await })
            .map_err(|e| e.to_string())
    }
}

impl Session {
    fn session_log_topic(&self) -> Topic {
        Topic::session_log(self.session_id)
    }

    fn interactive_log_topic(&self) -> Topic {
        Topic::interactive_log(self.session_id)
    }

    fn audit(&self, name: &str, payload: Value) {
        if let Err(err) = self.audit.add_entry(json!({"event": name, "data": payload})) {
            tracing::warn!(session = %self.session_id, event = name, error = %err, "failed to append audit entry");
        }
    }

    fn publish(&self, name: &str, payload: Value) {
        self.events.publish(&self.session_log_topic(), Event::new(name, payload.clone()));
        self.events.publish(&self.interactive_log_topic(), Event::new(name, payload));
    }

    /// Pull skillset JSON, parse, and validate the entry skill exists
    /// (§4.6 `fetchObjects`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SkillNotFound`] if the entry skill is absent,
    /// or a [`SessionError::Catalog`] error if the skillset cannot be loaded.
    pub async fn fetch_objects(&self) -> SessionResult<()> {
        let skillset = self.catalog.get_skillset(&self.skillset_name).await?;
        if skillset.skill(&self.entry_skill_name).is_none() {
            return Err(SessionError::SkillNotFound(self.entry_skill_name.clone()));
        }
        *self.skillset.write().unwrap_or_else(|e| e.into_inner()) = Some(skillset);
        Ok(())
    }

    fn skillset_snapshot(&self) -> SessionResult<SkillSet> {
        self.skillset
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| SessionError::SkillNotFound("skillset not fetched yet".into()))
    }

    /// Every skill descriptor in this session's skillset, for the
    /// loopback's `GET /skills` (§4.10).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SkillNotFound`] if `fetch_objects` has not
    /// run yet.
    pub fn list_skills(&self) -> SessionResult<Vec<tansive_catalog::SkillDef>> {
        Ok(self.skillset_snapshot()?.skills)
    }

    /// A named context slot's current value, for the loopback's
    /// `GET /context` (§4.10).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SkillNotFound`] if the skillset is not
    /// fetched yet or no slot named `name` exists.
    pub fn context_slot(&self, name: &str) -> SessionResult<Value> {
        let skillset = self.skillset_snapshot()?;
        skillset
            .context_slot(name)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| SessionError::SkillNotFound(format!("context slot {name}")))
    }

    /// The skill name that registered `invoker_id` in the call graph, or
    /// `None` for a root call — used by the MCP proxy to scope a `tools/list`
    /// to skills declared on the invoker's own source (§4.9, §8 S6).
    #[must_use]
    pub fn invoker_skill_name(&self, invoker_id: Option<InvocationId>) -> Option<String> {
        invoker_id.and_then(|id| self.call_graph.node(id)).map(|node| node.tool_name)
    }

    /// The view currently bound to `invoker_id`, or the session's root view
    /// for a root call (`invoker_id == None`).
    fn resolve_invoker_view(&self, invoker_id: Option<InvocationId>) -> SessionResult<View> {
        match invoker_id {
            None => Ok(self.root_view.clone()),
            Some(id) => self
                .invocation_views
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&id)
                .cloned()
                .ok_or_else(|| SessionError::UnknownInvoker(id.to_string())),
        }
    }

    /// Evaluate policy for `skill_name` as invoked by `invoker_id`
    /// (§4.6 `ValidateRunPolicy`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SkillNotFound`]/[`SessionError::UnknownInvoker`]
    /// if the skill or invoker cannot be resolved.
    pub fn validate_run_policy(&self, invoker_id: Option<InvocationId>, skill_name: &str) -> SessionResult<Decision> {
        let skillset = self.skillset_snapshot()?;
        let skill = skillset
            .skill(skill_name)
            .ok_or_else(|| SessionError::SkillNotFound(skill_name.to_string()))?;
        let view = self.resolve_invoker_view(invoker_id)?;
        let target = ResourceUri::parse(format!("res://skillsets/{}", skillset.name))
            .map_err(|e| SessionError::BlockedByPolicy(e.to_string()))?;
        Ok(evaluate(&view, &skill.exported_actions, &target))
    }

    /// Run the skill's declared transform (if any) over `input_args`
    /// (§4.6 `TransformInputForSkill`, §4.7).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransformUndefined`] if the named transform
    /// is missing from the skillset, or if the script throws.
    pub async fn transform_input_for_skill(
        self: &Arc<Self>,
        skill_name: &str,
        input_args: Value,
        invocation_id: InvocationId,
    ) -> SessionResult<(Value, Vec<String>)> {
        let skillset = self.skillset_snapshot()?;
        let skill = skillset
            .skill(skill_name)
            .ok_or_else(|| SessionError::SkillNotFound(skill_name.to_string()))?;

        let Some(_transform_name) = skill.transform.clone() else {
            return Ok((input_args, Vec::new()));
        };
        // The catalog stores transform scripts keyed by name alongside the
        // skillset; this fake resolves the script from the skill's own
        // `transform` field, treating it as inline source rather than a
        // separate lookup, since the catalog's script storage is
        // out of scope (§1).
        let script = skill.transform.clone().unwrap_or_default();
        let session_variables = self.session_variables.clone();
        let skill_service: Arc<dyn SkillInvoker> = Arc::new(LoopbackSkillInvoker {
            session: Arc::clone(self),
            invoker_id: invocation_id,
        });

        let output = tokio::task::spawn_blocking(move || {
            transform::run_transform(TransformInput {
                script: &script,
                input_args,
                session_variables,
                skill_service: Some(skill_service),
            })
        })
        .await
        .map_err(|e| SessionError::TransformUndefined(format!("transform task panicked: {e}")))??;

        Ok((output.args, output.console_lines))
    }

    /// Run `skill_name` on behalf of `invoker_id` (§4.6 `Run`).
    ///
    /// Registers the call in the graph, evaluates policy, runs the
    /// transform, dispatches to the runner, and audits `skill_start`,
    /// `policy_decision`, `skill_input_transformed`, and `skill_end`.
    ///
    /// # Errors
    ///
    /// See [`SessionError`] — callers should treat every variant as a
    /// rejected invocation, not a process crash (§4.6 "Invocation-ID
    /// contract").
    pub async fn run(
        self: &Arc<Self>,
        invoker_id: Option<InvocationId>,
        skill_name: &str,
        input_args: Value,
        invocation_id: InvocationId,
    ) -> SessionResult<Value> {
        if self.finalized.load(Ordering::SeqCst) {
            return Err(SessionError::AlreadyFinalized);
        }
        if self.call_graph.contains(invocation_id) {
            return Err(SessionError::InvocationIdReused(invocation_id.to_string()));
        }
        self.call_graph.register_call(invoker_id, skill_name, invocation_id, self.max_call_depth)?;

        let decision = self.validate_run_policy(invoker_id, skill_name)?;
        let Decision::Allowed { basis, authorized } = decision else {
            self.audit(
                "policy_decision",
                json!({"invocation_id": invocation_id.to_string(), "skill": skill_name, "allowed": false}),
            );
            return Err(SessionError::BlockedByPolicy(format!("{skill_name} denied for this view")));
        };
        self.audit(
            "policy_decision",
            json!({
                "invocation_id": invocation_id.to_string(),
                "skill": skill_name,
                "allowed": true,
                "authorized_actions": authorized.iter().map(Action::as_str).collect::<Vec<_>>(),
                "rule_count": basis.len(),
            }),
        );

        let invoker_view = self.resolve_invoker_view(invoker_id)?;
        self.invocation_views
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(invocation_id, invoker_view);

        let transformed_args = match self.transform_input_for_skill(skill_name, input_args, invocation_id).await {
            Ok((args, console_lines)) => {
                self.audit(
                    "skill_input_transformed",
                    json!({"invocation_id": invocation_id.to_string(), "status": "success", "console": console_lines}),
                );
                args
            }
            Err(err) => {
                self.audit(
                    "skill_input_transformed",
                    json!({"invocation_id": invocation_id.to_string(), "status": "failed", "error": err.to_string()}),
                );
                return Err(err);
            }
        };

        let skillset = self.skillset_snapshot()?;
        let skill = skillset
            .skill(skill_name)
            .ok_or_else(|| SessionError::SkillNotFound(skill_name.to_string()))?
            .clone();
        let source = skillset
            .source(&skill.source)
            .ok_or_else(|| SessionError::SourceNotFound(skill.source.clone()))?
            .clone();

        self.audit("skill_start", json!({"invocation_id": invocation_id.to_string(), "skill": skill_name}));
        self.publish("skill_start", json!({"invocation_id": invocation_id.to_string(), "skill": skill_name}));

        let result = self
            .runner
            .run(RunnerContext {
                source: &source,
                skill: &skill,
                args: transformed_args,
                session_id: self.session_id,
                invocation_id,
                events: Arc::clone(&self.events),
                events_topic: self.session_log_topic(),
            })
            .await;

        match result {
            Ok(value) => {
                self.audit(
                    "skill_end",
                    json!({"invocation_id": invocation_id.to_string(), "skill": skill_name, "ok": true}),
                );
                self.publish("skill_end", json!({"invocation_id": invocation_id.to_string(), "ok": true}));
                Ok(value)
            }
            Err(message) => {
                self.audit(
                    "skill_end",
                    json!({"invocation_id": invocation_id.to_string(), "skill": skill_name, "ok": false, "error": message}),
                );
                self.publish("skill_end", json!({"invocation_id": invocation_id.to_string(), "ok": false}));
                Err(SessionError::ExecutionFailed(message))
            }
        }
    }

    /// Register a new MCP proxy session for `invoker_id` (§4.6 `RunMCPProxy`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ExecutionFailed`] if registration fails, or
    /// [`SessionError::UnknownInvoker`] if `invoker_id` does not resolve.
    pub async fn run_mcp_proxy(&self, invoker_id: Option<InvocationId>) -> SessionResult<String> {
        if self.finalized.load(Ordering::SeqCst) {
            return Err(SessionError::AlreadyFinalized);
        }
        let view = self.resolve_invoker_view(invoker_id)?;
        self.mcp_registrar
            .register(self.session_id, view, invoker_id)
            .await
            .map_err(SessionError::ExecutionFailed)
    }

    /// Flush and close the audit log, package it, upload it, update the
    /// catalog's session status, and release the event bus topics
    /// (§4.6 `Finalize`). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Audit`]/[`SessionError::Catalog`] if
    /// closing, packaging, or uploading fails.
    pub async fn finalize(&self, summary: SessionSummary, error: Option<String>) -> SessionResult<()> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.audit.close()?;

        let raw = std::fs::read(&self.audit_log_path).map_err(|e| tansive_audit::AuditError::Io(e.to_string()))?;
        let packaged = tansive_audit::package_for_finalize(&raw, self.compress_threshold);
        let b64 = {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(&packaged.bytes)
        };
        self.catalog.store_audit_blob(self.session_id, b64).await?;

        let audit_log_uri = format!("res://resources/audit-logs/{}.{}", self.session_id.as_uuid(), packaged.extension);
        let status = SessionStatusDetail {
            error,
            audit_log_uri: Some(audit_log_uri),
            verification_key: Some(self.audit.public_key().to_base64url()),
        };
        self.catalog.update_session_status(self.session_id, summary, status).await?;

        self.events.close_all_for_pattern(&format!("session-log/{}", self.session_id));
        self.events.close_all_for_pattern(&format!("interactive-log/{}", self.session_id));
        Ok(())
    }

    /// Cancel all child processes and finalize as `Stopped` (§4.6 `Stop`).
    ///
    /// # Errors
    ///
    /// See [`Self::finalize`].
    pub async fn stop(&self, reason: &str) -> SessionResult<()> {
        self.runner.cancel_session(self.session_id).await;
        self.finalize(SessionSummary::Stopped, Some(reason.to_string())).await
    }
}

/// Owns every currently-active [`Session`] in this Runtime process.
///
/// A plain `RwLock<HashMap<_, _>>` — the teacher avoids `dashmap` in the
/// crates this core is grounded on (`CapabilityStore`), and sessions are
/// created/removed far less often than they're read.
#[derive(Default)]
pub struct ActiveSessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl ActiveSessionManager {
    /// Build an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a new session (§4.6 `CreateSession`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyExists`] if `params.session_id` is
    /// already active, or [`SessionError::Audit`] if the audit log cannot
    /// be opened.
    pub fn create_session(&self, params: CreateSessionParams) -> SessionResult<Arc<Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(&params.session_id) {
            return Err(SessionError::AlreadyExists(params.session_id.to_string()));
        }

        let audit = tansive_audit::AuditLogWriter::open(&params.audit_log_path, params.signing_key, params.flush_interval)?;

        let session = Arc::new(Session {
            session_id: params.session_id,
            tenant_id: params.execution_state.tenant_id,
            scope: params.execution_state.scope,
            root_view: params.execution_state.view,
            session_variables: params.execution_state.session_variables,
            call_graph: CallGraph::new(),
            max_call_depth: params.max_call_depth,
            invocation_views: RwLock::new(HashMap::new()),
            skillset_name: params.execution_state.skillset_name,
            entry_skill_name: params.execution_state.skill_name,
            skillset: RwLock::new(None),
            audit,
            audit_log_path: params.audit_log_path,
            compress_threshold: params.compress_threshold,
            events: params.events,
            runner: params.runner,
            mcp_registrar: params.mcp_registrar,
            catalog: params.catalog,
            finalized: AtomicBool::new(false),
        });

        sessions.insert(params.session_id, Arc::clone(&session));
        Ok(session)
    }

    /// Fetch an active session by id.
    #[must_use]
    pub fn get(&self, session_id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).get(&session_id).cloned()
    }

    /// Remove a session from the active set, e.g. after `Finalize`.
    pub fn remove(&self, session_id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner()).remove(&session_id)
    }

    /// Number of currently active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no sessions are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansive_catalog::{ContextSlot, Dependency, InMemoryCatalog, RunnerKind, SkillDef, Source};
    use tansive_core::ViewId;

    struct EchoRunner;

    #[async_trait]
    impl SkillRunner for EchoRunner {
        async fn run(&self, ctx: RunnerContext<'_>) -> Result<Value, String> {
            Ok(json!({"ran": ctx.skill.name, "args": ctx.args}))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl SkillRunner for FailingRunner {
        async fn run(&self, _ctx: RunnerContext<'_>) -> Result<Value, String> {
            Err("boom".to_string())
        }
    }

    struct StubMcpRegistrar;

    #[async_trait]
    impl McpProxyRegistrar for StubMcpRegistrar {
        async fn register(&self, session_id: SessionId, _invoker_view: View, _invoker_id: Option<InvocationId>) -> Result<String, String> {
            Ok(format!("/session/{session_id}/mcp"))
        }
    }

    fn allow_all_view() -> View {
        View::new(
            ViewId::new(),
            "root",
            "tenant-1",
            Scope { catalog: "default".into(), variant: None, namespace: None },
            vec![tansive_policy::Rule::allow(
                vec![Action::new("system.skillset.use").unwrap()],
                vec![ResourceUri::parse("res://skillsets/*").unwrap()],
            )],
        )
    }

    fn deny_all_view() -> View {
        View::new(
            ViewId::new(),
            "empty",
            "tenant-1",
            Scope { catalog: "default".into(), variant: None, namespace: None },
            vec![],
        )
    }

    fn sample_skillset() -> SkillSet {
        SkillSet {
            name: "demo".into(),
            version: "1.0.0".into(),
            sources: vec![Source { name: "k8s".into(), runner: RunnerKind::Stdio, config: json!({}) }],
            context: vec![ContextSlot { name: "region".into(), schema: json!({}), value: json!("us-east-1") }],
            skills: vec![SkillDef {
                name: "restart".into(),
                source: "k8s".into(),
                input_schema: json!({}),
                output_schema: json!({}),
                exported_actions: vec![Action::new("system.skillset.use").unwrap()],
                annotations: Default::default(),
                transform: None,
            }],
            dependencies: vec![Dependency { resource_uri: "res://resources/x".into() }],
        }
    }

    async fn build_session(view: View, dir: &tempfile::TempDir, runner: Arc<dyn SkillRunner>) -> Arc<Session> {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_skillset(sample_skillset());
        let manager = ActiveSessionManager::new();
        let session_id = SessionId::new();
        catalog
            .create_session(tansive_catalog::SessionRecord::new(session_id, "tenant-1", "user-1", "default", view.id))
            .await
            .unwrap();

        let session = manager
            .create_session(CreateSessionParams {
                session_id,
                execution_state: ExecutionState {
                    skillset_name: "demo".into(),
                    skill_name: "restart".into(),
                    view,
                    session_variables: json!({}),
                    input_args: json!({}),
                    scope: Scope { catalog: "default".into(), variant: None, namespace: None },
                    tenant_id: "tenant-1".into(),
                },
                audit_log_path: dir.path().join("session.tlog"),
                signing_key: KeyPair::generate(),
                flush_interval: 16,
                compress_threshold: 64 * 1024,
                max_call_depth: DEFAULT_MAX_CALL_DEPTH,
                runner,
                mcp_registrar: Arc::new(StubMcpRegistrar),
                catalog,
                events: Arc::new(EventBus::new()),
            })
            .unwrap();
        session.fetch_objects().await.unwrap();
        session
    }

    #[tokio::test]
    async fn duplicate_session_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let manager = ActiveSessionManager::new();
        let session_id = SessionId::new();
        let execution_state = ExecutionState {
            skillset_name: "demo".into(),
            skill_name: "restart".into(),
            view: allow_all_view(),
            session_variables: json!({}),
            input_args: json!({}),
            scope: Scope { catalog: "default".into(), variant: None, namespace: None },
            tenant_id: "tenant-1".into(),
        };
        let params = |path: PathBuf| CreateSessionParams {
            session_id,
            execution_state: execution_state.clone(),
            audit_log_path: path,
            signing_key: KeyPair::generate(),
            flush_interval: 16,
            compress_threshold: 64 * 1024,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            runner: Arc::new(EchoRunner),
            mcp_registrar: Arc::new(StubMcpRegistrar),
            catalog: Arc::clone(&catalog) as Arc<dyn CatalogStore>,
            events: Arc::new(EventBus::new()),
        };
        manager.create_session(params(dir.path().join("a.tlog"))).unwrap();
        let err = manager.create_session(params(dir.path().join("b.tlog"))).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn run_dispatches_and_audits_on_allow() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(allow_all_view(), &dir, Arc::new(EchoRunner)).await;
        let result = session.run(None, "restart", json!({"replicas": 1}), InvocationId::new()).await.unwrap();
        assert_eq!(result, json!({"ran": "restart", "args": {"replicas": 1}}));
    }

    #[tokio::test]
    async fn run_is_blocked_by_policy_when_denied() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(deny_all_view(), &dir, Arc::new(EchoRunner)).await;
        let err = session.run(None, "restart", json!({}), InvocationId::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::BlockedByPolicy(_)));
    }

    #[tokio::test]
    async fn reused_invocation_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(allow_all_view(), &dir, Arc::new(EchoRunner)).await;
        let id = InvocationId::new();
        session.run(None, "restart", json!({}), id).await.unwrap();
        let err = session.run(None, "restart", json!({}), id).await.unwrap_err();
        assert!(matches!(err, SessionError::InvocationIdReused(_)));
    }

    #[tokio::test]
    async fn runner_failure_surfaces_as_execution_failed_and_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(allow_all_view(), &dir, Arc::new(FailingRunner)).await;
        let err = session.run(None, "restart", json!({}), InvocationId::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn finalize_is_idempotent_and_uploads_audit_blob() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(allow_all_view(), &dir, Arc::new(EchoRunner)).await;
        session.run(None, "restart", json!({}), InvocationId::new()).await.unwrap();
        session.finalize(SessionSummary::Completed, None).await.unwrap();
        session.finalize(SessionSummary::Completed, None).await.unwrap();

        let record = session.catalog.get_session(session.session_id).await.unwrap();
        assert_eq!(record.summary, SessionSummary::Completed);
        assert!(session.catalog.load_audit_blob(session.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn finalized_session_rejects_further_runs() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(allow_all_view(), &dir, Arc::new(EchoRunner)).await;
        session.finalize(SessionSummary::Completed, None).await.unwrap();
        let err = session.run(None, "restart", json!({}), InvocationId::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyFinalized));
    }

    /// §8 S2: a transform pinning input args to session variables rejects a
    /// mismatched call before the runner (here `FailingRunner`, which would
    /// surface as `ExecutionFailed` if ever reached) is invoked at all.
    #[tokio::test]
    async fn transform_mismatch_rejects_before_runner_is_invoked() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut skillset = sample_skillset();
        skillset.skills[0].name = "patient-bloodwork".into();
        skillset.skills[0].transform = Some(
            "if (input_args.patient_id !== session_variables.patient_id) { throw new Error('patient mismatch'); } (input_args)".into(),
        );
        catalog.insert_skillset(skillset);

        let view = allow_all_view();
        let manager = ActiveSessionManager::new();
        let session_id = SessionId::new();
        catalog
            .create_session(tansive_catalog::SessionRecord::new(session_id, "tenant-1", "user-1", "default", view.id))
            .await
            .unwrap();

        let session = manager
            .create_session(CreateSessionParams {
                session_id,
                execution_state: ExecutionState {
                    skillset_name: "demo".into(),
                    skill_name: "patient-bloodwork".into(),
                    view,
                    session_variables: json!({"patient_id": "H12345"}),
                    input_args: json!({}),
                    scope: Scope { catalog: "default".into(), variant: None, namespace: None },
                    tenant_id: "tenant-1".into(),
                },
                audit_log_path: dir.path().join("session.tlog"),
                signing_key: KeyPair::generate(),
                flush_interval: 16,
                compress_threshold: 64 * 1024,
                max_call_depth: DEFAULT_MAX_CALL_DEPTH,
                runner: Arc::new(FailingRunner),
                mcp_registrar: Arc::new(StubMcpRegistrar),
                catalog,
                events: Arc::new(EventBus::new()),
            })
            .unwrap();
        session.fetch_objects().await.unwrap();

        let err = session
            .run(None, "patient-bloodwork", json!({"patient_id": "H23456"}), InvocationId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::TransformUndefined(_)));
    }

    /// §8 S2: a failed transform still produces a `skill_input_transformed`
    /// audit entry, with `status: "failed"` — not just a returned error.
    #[tokio::test]
    async fn failed_transform_is_audited_with_failed_status() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut skillset = sample_skillset();
        skillset.skills[0].name = "patient-bloodwork".into();
        skillset.skills[0].transform = Some(
            "if (input_args.patient_id !== session_variables.patient_id) { throw new Error('patient mismatch'); } (input_args)".into(),
        );
        catalog.insert_skillset(skillset);

        let view = allow_all_view();
        let manager = ActiveSessionManager::new();
        let session_id = SessionId::new();
        catalog
            .create_session(tansive_catalog::SessionRecord::new(session_id, "tenant-1", "user-1", "default", view.id))
            .await
            .unwrap();

        let log_path = dir.path().join("session.tlog");
        let session = manager
            .create_session(CreateSessionParams {
                session_id,
                execution_state: ExecutionState {
                    skillset_name: "demo".into(),
                    skill_name: "patient-bloodwork".into(),
                    view,
                    session_variables: json!({"patient_id": "H12345"}),
                    input_args: json!({}),
                    scope: Scope { catalog: "default".into(), variant: None, namespace: None },
                    tenant_id: "tenant-1".into(),
                },
                audit_log_path: log_path.clone(),
                signing_key: KeyPair::generate(),
                flush_interval: 1,
                compress_threshold: 64 * 1024,
                max_call_depth: DEFAULT_MAX_CALL_DEPTH,
                runner: Arc::new(FailingRunner),
                mcp_registrar: Arc::new(StubMcpRegistrar),
                catalog,
                events: Arc::new(EventBus::new()),
            })
            .unwrap();
        session.fetch_objects().await.unwrap();

        let err = session
            .run(None, "patient-bloodwork", json!({"patient_id": "H23456"}), InvocationId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::TransformUndefined(_)));

        let raw = std::fs::read_to_string(&log_path).unwrap();
        let entry = raw
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .find(|entry| entry["payload"]["event"] == "skill_input_transformed")
            .expect("skill_input_transformed entry was not audited");
        assert_eq!(entry["payload"]["data"]["status"], "failed");
    }

    /// §4.7: a transform's `SkillService.invoke` binding re-enters
    /// `Session::run` for real, going through the same call graph and
    /// policy path as any other invocation.
    #[tokio::test]
    async fn transform_skill_service_invokes_sibling_via_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let mut skillset = sample_skillset();
        skillset.skills[0].name = "caller".into();
        skillset.skills[0].transform =
            Some("(SkillService.invoke('callee', {via: 'loopback'}))".into());
        skillset.skills.push(SkillDef {
            name: "callee".into(),
            source: "k8s".into(),
            input_schema: json!({}),
            output_schema: json!({}),
            exported_actions: vec![Action::new("system.skillset.use").unwrap()],
            annotations: Default::default(),
            transform: None,
        });
        catalog.insert_skillset(skillset);

        let view = allow_all_view();
        let manager = ActiveSessionManager::new();
        let session_id = SessionId::new();
        catalog
            .create_session(tansive_catalog::SessionRecord::new(session_id, "tenant-1", "user-1", "default", view.id))
            .await
            .unwrap();

        let session = manager
            .create_session(CreateSessionParams {
                session_id,
                execution_state: ExecutionState {
                    skillset_name: "demo".into(),
                    skill_name: "caller".into(),
                    view,
                    session_variables: json!({}),
                    input_args: json!({}),
                    scope: Scope { catalog: "default".into(), variant: None, namespace: None },
                    tenant_id: "tenant-1".into(),
                },
                audit_log_path: dir.path().join("session.tlog"),
                signing_key: KeyPair::generate(),
                flush_interval: 16,
                compress_threshold: 64 * 1024,
                max_call_depth: DEFAULT_MAX_CALL_DEPTH,
                runner: Arc::new(EchoRunner),
                mcp_registrar: Arc::new(StubMcpRegistrar),
                catalog,
                events: Arc::new(EventBus::new()),
            })
            .unwrap();
        session.fetch_objects().await.unwrap();

        let result = session.run(None, "caller", json!({}), InvocationId::new()).await.unwrap();
        assert_eq!(result["ran"], "caller");
        assert_eq!(result["args"], json!({"ran": "callee", "args": {"via": "loopback"}}));
    }

    #[tokio::test]
    async fn run_mcp_proxy_resolves_invoker_view() {
        let dir = tempfile::tempdir().unwrap();
        let session = build_session(allow_all_view(), &dir, Arc::new(EchoRunner)).await;
        let url = session.run_mcp_proxy(None).await.unwrap();
        assert_eq!(url, format!("/session/{}/mcp", session.session_id));
    }
}
