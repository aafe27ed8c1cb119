//! Read-only view of a session, ready to be drawn.
//!
//! Nothing here mutates state or talks to the network; every function is a
//! pure mapping from [`SessionState`] to plain data.

use std::collections::{HashMap, VecDeque};

use chrono::Local;

use super::state::SessionState;
use crate::graph::{self, WorkflowGraphState};
use crate::message::{Message, MessageRole};

const LAYER_SPACING: i32 = 220;
const ROW_SPACING: i32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bubble {
    pub side: Side,
    pub role: MessageRole,
    pub content: String,
    /// Local `HH:MM`.
    pub time: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputView {
    pub enabled: bool,
    pub button_label: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeView {
    pub id: String,
    pub icon: &'static str,
    pub active: bool,
    pub next: bool,
    pub layer: usize,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeView {
    pub id: String,
    pub source: String,
    pub target: String,
    /// The `current_node -> next_node` transition.
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub requires_action: bool,
}

impl GraphView {
    pub fn node(&self, id: &str) -> Option<&NodeView> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn active_edge(&self) -> Option<&EdgeView> {
        self.edges.iter().find(|e| e.active)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub bubbles: Vec<Bubble>,
    pub input: InputView,
    pub error: Option<String>,
    pub graph: Option<GraphView>,
}

pub fn project(state: &SessionState) -> View {
    View {
        bubbles: state.messages().iter().map(bubble).collect(),
        input: input(state.is_pending()),
        error: state.error().map(str::to_string),
        graph: state.graph().map(project_graph),
    }
}

pub fn bubble(message: &Message) -> Bubble {
    let side = match message.role {
        MessageRole::User => Side::Right,
        MessageRole::Assistant | MessageRole::System => Side::Left,
    };
    Bubble {
        side,
        role: message.role,
        content: message.content.clone(),
        time: message.timestamp.with_timezone(&Local).format("%H:%M").to_string(),
    }
}

fn input(pending: bool) -> InputView {
    InputView {
        enabled: !pending,
        button_label: if pending { "Sending..." } else { "Send" },
    }
}

pub fn project_graph(graph: &WorkflowGraphState) -> GraphView {
    let layers = layer_nodes(graph);
    let mut rows: HashMap<usize, i32> = HashMap::new();

    let nodes = graph
        .nodes
        .iter()
        .map(|id| {
            let layer = layers.get(id.as_str()).copied().unwrap_or(0);
            let row = rows.entry(layer).or_insert(0);
            let position = Position { x: layer as i32 * LAYER_SPACING, y: *row * ROW_SPACING };
            *row += 1;
            NodeView {
                id: id.clone(),
                icon: node_icon(id),
                active: *id == graph.current_node,
                next: !graph.next_node.is_empty() && *id == graph.next_node,
                layer,
                position,
            }
        })
        .collect();

    let active = graph.active_transition();
    let edges = graph
        .edges
        .iter()
        .map(|(source, target)| EdgeView {
            id: format!("{source}-{target}"),
            source: source.clone(),
            target: target.clone(),
            active: active == Some((source.as_str(), target.as_str())),
        })
        .collect();

    GraphView { nodes, edges, requires_action: graph.requires_action }
}

pub fn node_icon(id: &str) -> &'static str {
    match id {
        graph::ROUTER => "🔄",
        graph::PRODUCT => "📦",
        graph::TECHNICAL => "🔧",
        graph::CUSTOMER_SERVICE => "👥",
        graph::HUMAN => "🤝",
        _ => "🤖",
    }
}

// Breadth-first layering from the entry node (the first declared node).
// Nodes the entry cannot reach share one trailing layer.
fn layer_nodes(graph: &WorkflowGraphState) -> HashMap<&str, usize> {
    let mut layers: HashMap<&str, usize> = HashMap::new();
    let Some(entry) = graph.nodes.first() else {
        return layers;
    };

    layers.insert(entry.as_str(), 0);
    let mut queue = VecDeque::from([entry.as_str()]);
    while let Some(node) = queue.pop_front() {
        let depth = layers[node];
        for (source, target) in &graph.edges {
            if source == node && !layers.contains_key(target.as_str()) {
                layers.insert(target.as_str(), depth + 1);
                queue.push_back(target.as_str());
            }
        }
    }

    let trailing = layers.values().max().map_or(0, |deepest| deepest + 1);
    for node in &graph.nodes {
        layers.entry(node.as_str()).or_insert(trailing);
    }
    layers
}

/// Plain-text rendering for terminals.
pub fn render_text(view: &View) -> String {
    let mut lines = Vec::new();

    if let Some(graph) = &view.graph {
        lines.push("Workflow".to_string());
        for node in &graph.nodes {
            let marker = if node.active {
                "  <- Active Agent"
            } else if node.next {
                "  <- next"
            } else {
                ""
            };
            lines.push(format!("  {} {}{}", node.icon, node.id, marker));
        }
        if let Some(edge) = graph.active_edge() {
            lines.push(format!("  {} -> {} (active transition)", edge.source, edge.target));
        }
        if graph.requires_action {
            lines.push("  Action required".to_string());
        }
        lines.push(String::new());
    }

    for bubble in &view.bubbles {
        match bubble.side {
            Side::Right => {
                let text = format!("{} ({} • You)", bubble.content, bubble.time);
                lines.push(format!("{text:>72}"));
            }
            Side::Left => {
                lines.push(format!("{} {} ({})", node_icon(""), bubble.content, bubble.time))
            }
        }
    }

    if let Some(error) = &view.error {
        lines.push(format!("! {error}"));
    }
    if !view.input.enabled {
        lines.push(format!("[{}]", view.input.button_label));
    }

    lines.join("\n")
}
