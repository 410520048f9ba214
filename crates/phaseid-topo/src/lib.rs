//! Transformer → feeder → phase → customer tree for the network view.
//!
//! The tree is assembled as a `petgraph` directed graph and flattened into
//! serializable node and edge lists. Coordinates are a fixed tiered layout
//! in a unit-wide band; the renderer is free to ignore them.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use phaseid_core::{CustomerAssignment, FeederId, Phase};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Transformer,
    Feeder,
    Phase,
    Customer,
}

impl NodeKind {
    pub fn level(self) -> u8 {
        match self {
            NodeKind::Transformer => 0,
            NodeKind::Feeder => 1,
            NodeKind::Phase => 2,
            NodeKind::Customer => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub level: u8,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl TopologyNode {
    fn new(id: String, label: String, kind: NodeKind, color: &str) -> Self {
        Self {
            id,
            label,
            kind,
            level: kind.level(),
            color: color.to_string(),
            x: None,
            y: None,
            correlation: None,
            score: None,
        }
    }

    fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub transformer: String,
    pub total_feeders: usize,
    pub total_customers: usize,
}

impl Topology {
    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ids of the direct children of `id`, in insertion order.
    pub fn children(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target.as_str())
            .collect()
    }
}

const TRANSFORMER_COLOR: &str = "#2C3E50";
const FEEDER_COLOR: &str = "#7F8C8D";
const CUSTOMER_COLOR: &str = "#BDC3C7";

pub fn phase_color(phase: Phase) -> &'static str {
    match phase {
        Phase::A => "#E74C3C",
        Phase::B => "#F39C12",
        Phase::C => "#3498DB",
    }
}

/// One customer's placement under a phase node.
struct Leaf<'a> {
    customer: &'a CustomerAssignment,
    correlation: f64,
    score: f64,
}

/// Build the hierarchy as a directed graph rooted at the transformer node.
///
/// Feeders appear in first-seen order. A customer is attached under every
/// phase it is assigned to (Phase A when it has no phase detail); repeated
/// references reuse the first node created for that customer.
pub fn build_graph(assignments: &[CustomerAssignment], transformer: &str) -> DiGraph<TopologyNode, ()> {
    let mut feeders: Vec<(&FeederId, [Vec<Leaf<'_>>; 3])> = Vec::new();
    for assignment in assignments {
        let pos = match feeders.iter().position(|(id, _)| *id == &assignment.assigned_feeder_id) {
            Some(pos) => pos,
            None => {
                feeders.push((&assignment.assigned_feeder_id, Default::default()));
                feeders.len() - 1
            }
        };
        let phases = &mut feeders[pos].1;
        if assignment.phase_assignments.is_empty() {
            phases[Phase::A.index()].push(Leaf {
                customer: assignment,
                correlation: assignment.metrics.correlation,
                score: assignment.metrics.score,
            });
        }
        for pa in &assignment.phase_assignments {
            phases[pa.assigned_feeder_phase.index()].push(Leaf {
                customer: assignment,
                correlation: pa.metrics.correlation,
                score: pa.metrics.score,
            });
        }
    }

    let mut graph = DiGraph::new();
    let root = graph.add_node(TopologyNode::new(
        "transformer".to_string(),
        transformer.to_string(),
        NodeKind::Transformer,
        TRANSFORMER_COLOR,
    ));
    let spacing = 1.0 / (feeders.len() as f64 + 1.0);
    let mut customer_nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for (i, (feeder_id, phases)) in feeders.iter().enumerate() {
        let feeder_pos = (i + 1) as f64;
        let feeder_node_id = format!("feeder_{feeder_id}");
        let feeder_idx = graph.add_node(
            TopologyNode::new(
                feeder_node_id,
                feeder_id.to_string(),
                NodeKind::Feeder,
                FEEDER_COLOR,
            )
            .at(feeder_pos * spacing, 1.0),
        );
        graph.add_edge(root, feeder_idx, ());

        let populated = Phase::ALL.iter().filter(|p| !phases[p.index()].is_empty());
        for (k, &phase) in populated.enumerate() {
            let x = (feeder_pos - 0.5 + k as f64 * 0.33) * spacing;
            let phase_idx = graph.add_node(
                TopologyNode::new(
                    format!("phase_{}_{}", feeder_id, phase.as_str().replace(' ', "_")),
                    phase.to_string(),
                    NodeKind::Phase,
                    phase_color(phase),
                )
                .at(x, 2.0),
            );
            graph.add_edge(feeder_idx, phase_idx, ());

            for (j, leaf) in phases[phase.index()].iter().enumerate() {
                let customer_id = leaf.customer.customer_id.as_str();
                let customer_idx = *customer_nodes.entry(customer_id).or_insert_with(|| {
                    let mut node = TopologyNode::new(
                        format!("customer_{customer_id}"),
                        customer_id.to_string(),
                        NodeKind::Customer,
                        CUSTOMER_COLOR,
                    )
                    .at(x, 3.0 + (j + 1) as f64 * 0.15);
                    node.correlation = Some(leaf.correlation);
                    node.score = Some(leaf.score);
                    graph.add_node(node)
                });
                graph.update_edge(phase_idx, customer_idx, ());
            }
        }
    }
    graph
}

/// Flattened form of [`build_graph`].
pub fn build_topology(assignments: &[CustomerAssignment], transformer: &str) -> Topology {
    let graph = build_graph(assignments, transformer);
    let nodes: Vec<TopologyNode> = graph.node_weights().cloned().collect();
    let edges = graph
        .edge_references()
        .map(|e| TopologyEdge {
            source: graph[e.source()].id.clone(),
            target: graph[e.target()].id.clone(),
        })
        .collect();
    let total_feeders = nodes.iter().filter(|n| n.kind == NodeKind::Feeder).count();
    Topology {
        nodes,
        edges,
        transformer: transformer.to_string(),
        total_feeders,
        total_customers: assignments.len(),
    }
}
