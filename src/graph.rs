//! Workflow graph reported by the support agents.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

pub const ROUTER: &str = "ROUTER";
pub const PRODUCT: &str = "PRODUCT";
pub const TECHNICAL: &str = "TECHNICAL";
pub const CUSTOMER_SERVICE: &str = "CUSTOMER_SERVICE";
pub const HUMAN: &str = "HUMAN";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowGraphState {
    pub current_node: String,
    /// Empty when no transition is predicted.
    #[serde(default)]
    pub next_node: String,
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
    #[serde(default)]
    pub requires_action: bool,
}

impl WorkflowGraphState {
    /// The customer support workflow: a router in front of the specialist agents,
    /// with a human handoff that returns to the router.
    pub fn support_workflow() -> Self {
        let edges = [
            (ROUTER, PRODUCT),
            (ROUTER, TECHNICAL),
            (ROUTER, CUSTOMER_SERVICE),
            (ROUTER, HUMAN),
            (PRODUCT, CUSTOMER_SERVICE),
            (PRODUCT, TECHNICAL),
            (TECHNICAL, PRODUCT),
            (TECHNICAL, HUMAN),
            (CUSTOMER_SERVICE, HUMAN),
            (CUSTOMER_SERVICE, PRODUCT),
            (HUMAN, ROUTER),
        ];
        Self {
            current_node: ROUTER.to_string(),
            next_node: String::new(),
            nodes: [ROUTER, PRODUCT, TECHNICAL, CUSTOMER_SERVICE, HUMAN]
                .iter()
                .map(|n| n.to_string())
                .collect(),
            edges: edges
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect(),
            requires_action: false,
        }
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges.iter().any(|(s, t)| s == source && t == target)
    }

    /// The `(current_node, next_node)` edge, when a next node is predicted and the
    /// edge is part of the graph.
    pub fn active_transition(&self) -> Option<(&str, &str)> {
        if self.next_node.is_empty() || !self.has_edge(&self.current_node, &self.next_node) {
            return None;
        }
        Some((self.current_node.as_str(), self.next_node.as_str()))
    }

    /// Checks that the current node, the next node (when set) and every edge
    /// endpoint are declared in `nodes`.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.contains_node(&self.current_node) {
            return Err(GraphError::UnknownCurrentNode(self.current_node.clone()));
        }
        if !self.next_node.is_empty() && !self.contains_node(&self.next_node) {
            return Err(GraphError::UnknownNextNode(self.next_node.clone()));
        }
        for (source, target) in &self.edges {
            if !self.contains_node(source) || !self.contains_node(target) {
                return Err(GraphError::UnknownEdgeEndpoint {
                    from: source.clone(),
                    to: target.clone(),
                });
            }
        }
        Ok(())
    }
}
