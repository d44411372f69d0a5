//! Shared result assembly: display labels, node/edge construction from graph
//! values, and the response invariants (unique node ids, no duplicate or
//! dangling edges).

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::graph::{GraphNode, GraphRel};
use crate::retrieve::{Edge, Node, PropertyValue};

/// Accumulates nodes and edges for one response, enforcing the dedup rules.
///
/// Node insertion is first-seen-wins; a later node with an id already present
/// is dropped, never overwritten. Edges are de-duplicated on
/// (source, target, relationship) and pruned on [`finish`](Self::finish) if
/// either endpoint is missing from the node set.
pub struct Assembler {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    seen_nodes: HashSet<String>,
    seen_edges: HashSet<(String, String, String)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            seen_nodes: HashSet::new(),
            seen_edges: HashSet::new(),
        }
    }

    /// Insert a node unless its id was already seen. Returns whether it was added.
    pub fn push_node(&mut self, node: Node) -> bool {
        if self.seen_nodes.contains(&node.id) {
            return false;
        }
        self.seen_nodes.insert(node.id.clone());
        self.nodes.push(node);
        true
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.seen_nodes.contains(id)
    }

    /// Insert an edge unless an identical one was already seen.
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        let key = (
            edge.source.clone(),
            edge.target.clone(),
            edge.relationship.clone(),
        );
        if self.seen_edges.contains(&key) {
            return false;
        }
        self.seen_edges.insert(key);
        self.edges.push(edge);
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Finalize the response, pruning edges whose endpoints are not both present.
    pub fn finish(self) -> (Vec<Node>, Vec<Edge>) {
        let (nodes, mut edges, seen) = (self.nodes, self.edges, self.seen_nodes);
        edges.retain(|e| seen.contains(&e.source) && seen.contains(&e.target));
        (nodes, edges)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Take the first `max` characters of a string (not bytes; labels are Korean).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Display label fallback chain: name, title, first 50 chars of text, id.
pub fn display_label(properties: &serde_json::Map<String, Value>, id: &str) -> String {
    for key in ["name", "title"] {
        if let Some(value) = properties.get(key).and_then(Value::as_str) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    if let Some(text) = properties.get("text").and_then(Value::as_str) {
        if !text.is_empty() {
            return truncate_chars(text, 50);
        }
    }
    id.to_string()
}

/// Convert store-native properties into the typed property map.
pub fn property_map(properties: &serde_json::Map<String, Value>) -> BTreeMap<String, PropertyValue> {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), PropertyValue::from(v)))
        .collect()
}

/// Build a response node from a graph node: stringified id, label chain,
/// type from the first store label (Unknown when unlabeled).
pub fn node_from_graph(graph_node: &GraphNode) -> Node {
    let id = graph_node.id.to_string();
    Node {
        label: display_label(&graph_node.properties, &id),
        node_type: graph_node
            .labels
            .first()
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()),
        properties: property_map(&graph_node.properties),
        id,
    }
}

/// Build a response edge from a graph relationship.
pub fn edge_from_rel(rel: &GraphRel) -> Edge {
    Edge {
        source: rel.start_id.to_string(),
        target: rel.end_id.to_string(),
        relationship: rel.rel_type.clone(),
        properties: if rel.properties.is_empty() {
            None
        } else {
            Some(property_map(&rel.properties))
        },
    }
}

/// Drop edges whose endpoints are not both in `nodes`. Caller-side variant of
/// the pruning [`Assembler::finish`] performs.
pub fn prune_dangling_edges(nodes: &[Node], edges: &mut Vec<Edge>) {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    edges.retain(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()));
}
