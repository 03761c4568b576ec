//! Call graph (C2, §4.2): tracks the invocation tree of one session,
//! rejecting loops and depth overruns.
//!
//! Grounded in [`tansive_audit::writer::AuditLogWriter`]'s own-lock
//! discipline: the graph's `RwLock` is independent of the audit log's
//! `Mutex` so a caller never needs to hold both at once (§5).

use std::collections::HashMap;
use std::sync::RwLock;

use tansive_core::InvocationId;

use crate::error::{SessionError, SessionResult};

/// One node in the call graph: the tool it invoked, and its parent (`None`
/// for a root call).
#[derive(Clone, Debug)]
pub struct CallNode {
    /// The skill/tool name this call invoked.
    pub tool_name: String,
    /// The parent invocation, or `None` for a root call.
    pub parent_id: Option<InvocationId>,
}

/// The call graph for one session: `call_id -> {tool_name, parent_id}`.
///
/// Root calls (`parent_id == None`) may be registered repeatedly — a
/// session may have multiple entry points (§4.2).
#[derive(Default)]
pub struct CallGraph {
    nodes: RwLock<HashMap<InvocationId, CallNode>>,
}

impl CallGraph {
    /// Build an empty call graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call, enforcing the loop and depth invariants of §4.2.
    ///
    /// # Errors
    ///
    /// - [`SessionError::ParentNotFound`] if `parent_id` is `Some` and unknown.
    /// - [`SessionError::LoopDetected`] if `tool_name` already appears on the
    ///   path from root to `parent_id`.
    /// - [`SessionError::DepthLimitExceeded`] if `max_depth > 0` and the new
    ///   path would exceed it.
    pub fn register_call(
        &self,
        parent_id: Option<InvocationId>,
        tool_name: impl Into<String>,
        call_id: InvocationId,
        max_depth: usize,
    ) -> SessionResult<()> {
        let tool_name = tool_name.into();
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());

        let mut path_depth = 1usize;
        if let Some(parent) = parent_id {
            let mut cursor = Some(parent);
            let mut visited_tool_match = false;
            let mut depth = 1usize;
            while let Some(id) = cursor {
                let Some(node) = nodes.get(&id) else {
                    return Err(SessionError::ParentNotFound(parent.to_string()));
                };
                if node.tool_name == tool_name {
                    visited_tool_match = true;
                }
                depth = depth.saturating_add(1);
                cursor = node.parent_id;
            }
            if visited_tool_match {
                return Err(SessionError::LoopDetected(tool_name));
            }
            path_depth = depth;
        }

        if max_depth > 0 && path_depth > max_depth {
            return Err(SessionError::DepthLimitExceeded);
        }

        nodes.insert(call_id, CallNode { tool_name, parent_id });
        Ok(())
    }

    /// Whether `call_id` is already registered (used to validate the
    /// invocation-id contract in §4.6: a reused id is rejected as an error
    /// payload, not a crash).
    #[must_use]
    pub fn contains(&self, call_id: InvocationId) -> bool {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).contains_key(&call_id)
    }

    /// The view a given invocation was registered under inherits from its
    /// caller; fetch the node so the session can walk up to find the bound
    /// invoker.
    #[must_use]
    pub fn node(&self, call_id: InvocationId) -> Option<CallNode> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).get(&call_id).cloned()
    }

    /// Render the lineage root→node as `"id (tool)"` entries joined by
    /// `" -> "` (§4.2).
    #[must_use]
    pub fn debug_graph(&self, call_id: InvocationId) -> String {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        let mut chain = Vec::new();
        let mut cursor = Some(call_id);
        while let Some(id) = cursor {
            let Some(node) = nodes.get(&id) else { break };
            chain.push(format!("{id} ({})", node.tool_name));
            cursor = node.parent_id;
        }
        chain.reverse();
        chain.join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_calls_may_repeat() {
        let graph = CallGraph::new();
        graph.register_call(None, "list_pods", InvocationId::new(), 3).unwrap();
        graph.register_call(None, "list_pods", InvocationId::new(), 3).unwrap();
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let graph = CallGraph::new();
        let err = graph
            .register_call(Some(InvocationId::new()), "x", InvocationId::new(), 3)
            .unwrap_err();
        assert!(matches!(err, SessionError::ParentNotFound(_)));
    }

    #[test]
    fn loop_on_path_is_rejected() {
        let graph = CallGraph::new();
        let root = InvocationId::new();
        graph.register_call(None, "a", root, 10).unwrap();
        let child = InvocationId::new();
        graph.register_call(Some(root), "b", child, 10).unwrap();

        let err = graph
            .register_call(Some(child), "a", InvocationId::new(), 10)
            .unwrap_err();
        assert!(matches!(err, SessionError::LoopDetected(_)));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let graph = CallGraph::new();
        let root = InvocationId::new();
        graph.register_call(None, "a", root, 2).unwrap();
        let child = InvocationId::new();
        graph.register_call(Some(root), "b", child, 2).unwrap();

        let err = graph
            .register_call(Some(child), "c", InvocationId::new(), 2)
            .unwrap_err();
        assert!(matches!(err, SessionError::DepthLimitExceeded));
    }

    #[test]
    fn zero_depth_limit_means_unbounded() {
        let graph = CallGraph::new();
        let root = InvocationId::new();
        graph.register_call(None, "a", root, 0).unwrap();
        let child = InvocationId::new();
        graph.register_call(Some(root), "b", child, 0).unwrap();
        graph.register_call(Some(child), "c", InvocationId::new(), 0).unwrap();
    }

    #[test]
    fn debug_graph_renders_root_to_node_lineage() {
        let graph = CallGraph::new();
        let root = InvocationId::new();
        graph.register_call(None, "a", root, 10).unwrap();
        let child = InvocationId::new();
        graph.register_call(Some(root), "b", child, 10).unwrap();

        let rendered = graph.debug_graph(child);
        assert_eq!(rendered, format!("{root} (a) -> {child} (b)"));
    }
}
