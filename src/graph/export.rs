//! Exporter-facing view of a graph.
//!
//! A [`GraphExport`] is a plain, serializable snapshot: sorted node records
//! carrying named numeric attributes and an optional community label, plus
//! sorted weighted edges. File writers (see `crate::gephi`) only consume this
//! type, never the petgraph structure.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::engine::GraphAnalytics;
use super::models::{CommunityAssignment, GraphScope, MetricResult, SocialGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    /// Display name, or the id when none is known
    pub label: String,
    /// Metric name → score
    pub attributes: BTreeMap<String, f64>,
    pub community: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub scope: GraphScope,
    /// Sorted by id
    pub nodes: Vec<NodeRecord>,
    /// Sorted by (source, target)
    pub edges: Vec<EdgeRecord>,
}

impl GraphExport {
    /// Nodes and edges only, no attributes.
    pub fn from_graph(graph: &SocialGraph) -> Self {
        let nodes = graph
            .actors()
            .into_iter()
            .map(|actor| NodeRecord {
                id: actor.id.clone(),
                label: actor.label().to_string(),
                attributes: BTreeMap::new(),
                community: None,
            })
            .collect();
        let edges = graph
            .edges()
            .into_iter()
            .map(|(source, target, weight)| EdgeRecord {
                source,
                target,
                weight,
            })
            .collect();
        Self {
            scope: graph.scope,
            nodes,
            edges,
        }
    }

    /// Attach a metric as an attribute named after it.
    pub fn with_metric(mut self, metric: &MetricResult) -> Self {
        for node in &mut self.nodes {
            if let Some(score) = metric.get(&node.id) {
                node.attributes.insert(metric.name.clone(), score);
            }
        }
        self
    }

    pub fn with_communities(mut self, assignment: &CommunityAssignment) -> Self {
        for node in &mut self.nodes {
            node.community = assignment.get(&node.id);
        }
        self
    }

    /// Snapshot with every per-node metric of `analytics` attached.
    pub fn from_analytics(graph: &SocialGraph, analytics: &GraphAnalytics) -> Self {
        let mut export = Self::from_graph(graph).with_communities(&analytics.community_assignment);
        for node in &mut export.nodes {
            let Some(m) = analytics.metrics.get(&node.id) else {
                continue;
            };
            let attrs = &mut node.attributes;
            attrs.insert("degree_centrality".to_string(), m.degree_centrality);
            attrs.insert("in_degree".to_string(), m.in_degree as f64);
            attrs.insert("out_degree".to_string(), m.out_degree as f64);
            attrs.insert("closeness_centrality".to_string(), m.closeness);
            attrs.insert("betweenness_centrality".to_string(), m.betweenness);
            if let Some(pr) = m.pagerank {
                attrs.insert("pagerank".to_string(), pr);
            }
            attrs.insert("local_clustering".to_string(), m.clustering_coefficient);
        }
        export
    }

    /// Union of attribute names across nodes, sorted.
    pub fn attribute_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .nodes
            .iter()
            .flat_map(|node| node.attributes.keys())
            .collect();
        names.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::algorithms::degree_centrality;
    use crate::graph::community::label_propagation;
    use crate::graph::engine::compute_all;
    use crate::graph::models::{Actor, AnalyticsConfig};
    use crate::test_helpers::graph_from_edges;

    #[test]
    fn test_from_graph_is_sorted() {
        let g = graph_from_edges(&[], &[("b", "a", 1.0), ("a", "c", 2.0), ("a", "b", 0.5)]);
        let export = GraphExport::from_graph(&g);
        let ids: Vec<&str> = export.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(export.edges[0].source, "a");
        assert_eq!(export.edges[0].target, "b");
        assert_eq!(export.edges[2].source, "b");
        assert!(export.nodes.iter().all(|n| n.community.is_none()));
    }

    #[test]
    fn test_labels_fall_back_to_id() {
        let mut g = SocialGraph::new(GraphScope::Integrated);
        g.add_actor(Actor::new("u1").with_display_name("Una"));
        g.add_actor(Actor::new("u2"));
        let export = GraphExport::from_graph(&g);
        assert_eq!(export.nodes[0].label, "Una");
        assert_eq!(export.nodes[1].label, "u2");
    }

    #[test]
    fn test_with_metric_and_communities() {
        let g = graph_from_edges(&[], &[("A", "B", 1.0), ("B", "C", 1.0)]);
        let export = GraphExport::from_graph(&g)
            .with_metric(&degree_centrality(&g))
            .with_communities(&label_propagation(&g, 100));
        assert_eq!(export.attribute_names(), vec!["degree_centrality".to_string()]);
        assert!((export.nodes[1].attributes["degree_centrality"] - 1.0).abs() < 1e-9);
        assert!(export.nodes.iter().all(|n| n.community.is_some()));
    }

    #[test]
    fn test_from_analytics_attaches_every_metric() {
        let g = graph_from_edges(&[], &[("A", "B", 1.0), ("B", "C", 1.0), ("C", "A", 1.0)]);
        let analytics = compute_all(&g, &AnalyticsConfig::default());
        let export = GraphExport::from_analytics(&g, &analytics);
        let names = export.attribute_names();
        for expected in ["betweenness_centrality", "closeness_centrality", "pagerank"] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
        assert_eq!(export.edges.len(), 3);
    }
}
