//! Test helper factories
//!
//! Convenience functions for creating events and small graph topologies with
//! sensible defaults.
#![allow(dead_code)]

use crate::graph::models::{Actor, Event, GraphScope, RelationKind, SocialGraph};
use chrono::{DateTime, Utc};

/// Fixed base instant plus `offset` seconds.
pub fn ts(offset: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + offset, 0).expect("valid timestamp")
}

/// Event with weight 1 at the base instant.
pub fn event(source: &str, target: &str, kind: RelationKind) -> Event {
    Event::new(Actor::new(source), Actor::new(target), kind, ts(0))
}

/// Build a graph from explicit nodes and weighted edges.
///
/// Nodes are inserted in ascending id order, like the builders do.
pub fn graph_from_edges(nodes: &[&str], edges: &[(&str, &str, f64)]) -> SocialGraph {
    let mut ids: Vec<&str> = nodes.to_vec();
    for (s, t, _) in edges {
        ids.push(s);
        ids.push(t);
    }
    ids.sort_unstable();
    ids.dedup();

    let mut g = SocialGraph::new(GraphScope::Integrated);
    for id in ids {
        g.add_actor(Actor::new(id));
    }
    for (s, t, w) in edges {
        g.add_interaction(s, t, *w);
    }
    g
}

/// Two directed cliques `a_*` and `b_*` of `size` nodes, no edges between them.
pub fn make_two_cliques(size: usize) -> SocialGraph {
    let mut edges: Vec<(String, String)> = Vec::new();
    for prefix in ["a", "b"] {
        for i in 0..size {
            for j in 0..size {
                if i != j {
                    edges.push((format!("{}_{}", prefix, i), format!("{}_{}", prefix, j)));
                }
            }
        }
    }
    let weighted: Vec<(&str, &str, f64)> = edges
        .iter()
        .map(|(s, t)| (s.as_str(), t.as_str(), 1.0))
        .collect();
    graph_from_edges(&[], &weighted)
}

/// Linear chain `node_0 → node_1 → … → node_{n-1}` with unit weights.
pub fn make_chain(n: usize) -> SocialGraph {
    let names: Vec<String> = (0..n).map(|i| format!("node_{}", i)).collect();
    let nodes: Vec<&str> = names.iter().map(String::as_str).collect();
    let edges: Vec<(&str, &str, f64)> = names
        .windows(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str(), 1.0))
        .collect();
    graph_from_edges(&nodes, &edges)
}

/// Star with every leaf pointing at `center`.
pub fn make_reverse_star(n_leaves: usize) -> SocialGraph {
    let leaves: Vec<String> = (0..n_leaves).map(|i| format!("leaf_{}", i)).collect();
    let edges: Vec<(&str, &str, f64)> = leaves
        .iter()
        .map(|leaf| (leaf.as_str(), "center", 1.0))
        .collect();
    graph_from_edges(&["center"], &edges)
}

/// Directed triangle A → B → C → A.
pub fn make_triangle() -> SocialGraph {
    graph_from_edges(&[], &[("A", "B", 1.0), ("B", "C", 1.0), ("C", "A", 1.0)])
}
