//! Analytics engine: orchestrates the full pipeline.
//!
//! The `AnalyticsEngine` trait is the single entry point for analytics
//! consumers (CLI, exporters, tests). It encapsulates:
//!
//! 1. **Building**: events → one relation graph per kind (builders)
//! 2. **Integration**: relation graphs → weighted integrated graph
//! 3. **Computation**: every metric plus communities on each graph
//!
//! [`compute_all`] never aborts on a single metric: each metric reports a
//! [`MetricStatus`], and a failure leaves only that metric's field empty.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::algorithms::{
    assortativity, average_clustering, average_degree, betweenness_centrality,
    closeness_centrality, connected_components, degree_centrality, density,
    global_clustering_coefficient, in_degree, local_clustering, out_degree, pagerank,
};
use super::builder::build_relation_graphs;
use super::community::{bridging_ties, communities, label_propagation, modularity};
use super::error::GraphError;
use super::integrator::{integrate, RelationCoefficients};
use super::models::{
    AnalyticsConfig, BridgeTie, CommunityAssignment, CommunityInfo, ComponentInfo, Convergence,
    Event, GraphScope, MetricResult, RelationKind, SocialGraph, TimeWindow,
};

// ============================================================================
// Output types
// ============================================================================

/// Computed metrics for a single actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// (in + out) / (n − 1)
    pub degree_centrality: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    /// Wasserman–Faust closeness over outgoing paths
    pub closeness: f64,
    /// Normalized betweenness (0.0 – 1.0)
    pub betweenness: f64,
    /// PageRank score, `None` when PageRank failed
    pub pagerank: Option<f64>,
    /// Local clustering coefficient on the undirected projection
    pub clustering_coefficient: f64,
    /// Community label from label propagation
    pub community_id: u32,
    /// Weakly connected component id
    pub component_id: u32,
}

/// How one metric's computation ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MetricOutcome {
    Ok,
    /// Best-effort result after hitting an iteration cap
    NotConverged { iterations: usize },
    /// No result; the error message says why
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatus {
    pub metric: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

impl MetricStatus {
    fn ok(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            outcome: MetricOutcome::Ok,
        }
    }

    fn from_convergence(metric: &str, status: Convergence) -> Self {
        let outcome = match status {
            Convergence::NotConverged { iterations } => MetricOutcome::NotConverged { iterations },
            Convergence::Exact | Convergence::Converged { .. } => MetricOutcome::Ok,
        };
        Self {
            metric: metric.to_string(),
            outcome,
        }
    }

    fn failed(metric: &str, err: &GraphError) -> Self {
        Self {
            metric: metric.to_string(),
            outcome: MetricOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == MetricOutcome::Ok
    }
}

/// Complete analytics for one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAnalytics {
    /// Which graph was analyzed
    pub scope: GraphScope,
    pub node_count: usize,
    pub edge_count: usize,
    /// Per-actor metrics, keyed by actor id
    pub metrics: BTreeMap<String, NodeMetrics>,
    /// Directed density
    pub density: f64,
    /// Mean of in + out degree
    pub average_degree: f64,
    /// Global clustering coefficient (transitivity)
    pub clustering_coefficient: f64,
    /// Mean local clustering coefficient
    pub average_clustering: f64,
    /// Degree assortativity, `None` when undefined for this graph
    pub assortativity: Option<f64>,
    /// Raw label propagation result
    pub community_assignment: CommunityAssignment,
    /// Communities, largest first
    pub communities: Vec<CommunityInfo>,
    /// Modularity of the detected communities
    pub modularity: f64,
    /// Actors with the most ties into other communities
    pub bridges: Vec<BridgeTie>,
    /// Weakly connected components, largest first
    pub components: Vec<ComponentInfo>,
    /// Outcome of every metric, in computation order
    pub statuses: Vec<MetricStatus>,
    /// Conventions used, keyed `<metric>.<key>`
    pub metadata: BTreeMap<String, String>,
    /// Time taken to compute all metrics (milliseconds)
    pub computation_ms: u64,
}

impl GraphAnalytics {
    pub fn status(&self, metric: &str) -> Option<&MetricStatus> {
        self.statuses.iter().find(|s| s.metric == metric)
    }

    /// Per-node scores of a named metric, rebuilt from [`NodeMetrics`].
    ///
    /// Known names: `degree_centrality`, `closeness_centrality`,
    /// `betweenness_centrality`, `pagerank`, `local_clustering`.
    pub fn metric(&self, name: &str) -> Option<MetricResult> {
        let pick: fn(&NodeMetrics) -> Option<f64> = match name {
            "degree_centrality" => |m: &NodeMetrics| Some(m.degree_centrality),
            "closeness_centrality" => |m: &NodeMetrics| Some(m.closeness),
            "betweenness_centrality" => |m: &NodeMetrics| Some(m.betweenness),
            "pagerank" => |m: &NodeMetrics| m.pagerank,
            "local_clustering" => |m: &NodeMetrics| Some(m.clustering_coefficient),
            _ => return None,
        };
        let scores: BTreeMap<String, f64> = self
            .metrics
            .iter()
            .filter_map(|(id, m)| pick(m).map(|score| (id.clone(), score)))
            .collect();
        if name == "pagerank" && scores.len() != self.metrics.len() {
            return None;
        }
        Some(MetricResult::new(name, scores))
    }
}

fn record(
    statuses: &mut Vec<MetricStatus>,
    metadata: &mut BTreeMap<String, String>,
    result: &MetricResult,
) {
    statuses.push(MetricStatus::from_convergence(&result.name, result.status));
    for (key, value) in &result.metadata {
        metadata.insert(format!("{}.{}", result.name, key), value.clone());
    }
}

// ============================================================================
// Compute all
// ============================================================================

/// Run every metric and community detection on one graph.
///
/// Never fails as a whole: a metric that errors is recorded as
/// [`MetricOutcome::Failed`] and the remaining metrics are still computed.
pub fn compute_all(graph: &SocialGraph, config: &AnalyticsConfig) -> GraphAnalytics {
    let start = Instant::now();
    let g = &graph.graph;
    let mut statuses = Vec::new();
    let mut metadata = BTreeMap::new();

    // Centralities
    let degree = degree_centrality(graph);
    record(&mut statuses, &mut metadata, &degree);
    let closeness = closeness_centrality(graph, config.distance);
    record(&mut statuses, &mut metadata, &closeness);
    let betweenness = betweenness_centrality(graph, config.distance);
    record(&mut statuses, &mut metadata, &betweenness);
    let pr = match pagerank(graph, config) {
        Ok(result) => {
            record(&mut statuses, &mut metadata, &result);
            Some(result)
        }
        Err(e) => {
            tracing::warn!(scope = %graph.scope, error = %e, "PageRank failed");
            statuses.push(MetricStatus::failed("pagerank", &e));
            None
        }
    };

    // Structure
    let graph_density = density(graph);
    statuses.push(MetricStatus::ok("density"));
    let local = local_clustering(graph);
    record(&mut statuses, &mut metadata, &local);
    let clustering_coefficient = global_clustering_coefficient(graph);
    let avg_clustering = average_clustering(graph);
    statuses.push(MetricStatus::ok("clustering"));
    let assortativity = match assortativity(graph) {
        Ok(value) => {
            statuses.push(MetricStatus::ok("assortativity"));
            Some(value)
        }
        Err(e) => {
            tracing::debug!(scope = %graph.scope, error = %e, "Assortativity undefined");
            statuses.push(MetricStatus::failed("assortativity", &e));
            None
        }
    };

    // Communities
    let assignment = label_propagation(graph, config.label_propagation_max_rounds);
    statuses.push(MetricStatus::from_convergence(
        "label_propagation",
        assignment.status,
    ));
    let community_list = communities(&assignment);
    let q = modularity(graph, &assignment);
    let bridges = bridging_ties(graph, &assignment, config.top_n);

    let (component_map, components) = connected_components(graph);

    let mut metrics = BTreeMap::new();
    for idx in g.node_indices() {
        let id = &g[idx].id;
        metrics.insert(
            id.clone(),
            NodeMetrics {
                degree_centrality: degree.get(id).unwrap_or(0.0),
                in_degree: in_degree(graph, idx),
                out_degree: out_degree(graph, idx),
                closeness: closeness.get(id).unwrap_or(0.0),
                betweenness: betweenness.get(id).unwrap_or(0.0),
                pagerank: pr.as_ref().and_then(|r| r.get(id)),
                clustering_coefficient: local.get(id).unwrap_or(0.0),
                community_id: assignment.get(id).unwrap_or(0),
                component_id: component_map.get(id).copied().unwrap_or(0),
            },
        );
    }

    let computation_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        scope = %graph.scope,
        nodes = g.node_count(),
        edges = g.edge_count(),
        communities = community_list.len(),
        computation_ms,
        "Computed graph analytics"
    );

    GraphAnalytics {
        scope: graph.scope,
        node_count: g.node_count(),
        edge_count: g.edge_count(),
        metrics,
        density: graph_density,
        average_degree: average_degree(graph),
        clustering_coefficient,
        average_clustering: avg_clustering,
        assortativity,
        community_assignment: assignment,
        communities: community_list,
        modularity: q,
        bridges,
        components,
        statuses,
        metadata,
        computation_ms,
    }
}

// ============================================================================
// Graph set and network-level output
// ============================================================================

/// The three relation graphs plus the integrated graph.
#[derive(Debug, Clone)]
pub struct GraphSet {
    pub relations: BTreeMap<RelationKind, SocialGraph>,
    pub integrated: SocialGraph,
}

impl GraphSet {
    pub fn get(&self, scope: GraphScope) -> Option<&SocialGraph> {
        match scope {
            GraphScope::Relation(kind) => self.relations.get(&kind),
            GraphScope::Integrated => Some(&self.integrated),
        }
    }

    /// Relation graphs in canonical order, then the integrated graph.
    pub fn iter(&self) -> impl Iterator<Item = &SocialGraph> {
        self.relations.values().chain(std::iter::once(&self.integrated))
    }
}

/// Analytics for every graph of a [`GraphSet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAnalytics {
    pub relations: BTreeMap<RelationKind, GraphAnalytics>,
    pub integrated: GraphAnalytics,
    /// When the analytics were computed
    pub computed_at: DateTime<Utc>,
}

impl NetworkAnalytics {
    pub fn get(&self, scope: GraphScope) -> Option<&GraphAnalytics> {
        match scope {
            GraphScope::Relation(kind) => self.relations.get(&kind),
            GraphScope::Integrated => Some(&self.integrated),
        }
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Analytics engine trait: single entry point for graph analytics.
pub trait AnalyticsEngine: Send + Sync {
    /// Build every relation graph and the integrated graph from raw events.
    fn build_graphs(&self, events: &[Event]) -> Result<GraphSet, GraphError>;

    /// Compute analytics for every graph of the set.
    fn analyze_graphs(&self, graphs: &GraphSet) -> NetworkAnalytics;

    /// Full analysis: build, integrate, compute.
    fn analyze(&self, events: &[Event]) -> Result<NetworkAnalytics, GraphError> {
        let graphs = self.build_graphs(events)?;
        Ok(self.analyze_graphs(&graphs))
    }
}

// ============================================================================
// Concrete implementation
// ============================================================================

/// Real analytics engine: builders, integrator and metrics in one pipeline.
///
/// Graphs are analyzed in parallel with rayon; each analysis is independent
/// and deterministic, so the result does not depend on scheduling.
#[derive(Debug, Clone, Default)]
pub struct SocialGraphEngine {
    coefficients: RelationCoefficients,
    config: AnalyticsConfig,
    window: TimeWindow,
}

impl SocialGraphEngine {
    pub fn new(coefficients: RelationCoefficients, config: AnalyticsConfig) -> Self {
        Self {
            coefficients,
            config,
            window: TimeWindow::default(),
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn coefficients(&self) -> &RelationCoefficients {
        &self.coefficients
    }
}

impl AnalyticsEngine for SocialGraphEngine {
    fn build_graphs(&self, events: &[Event]) -> Result<GraphSet, GraphError> {
        let relations = build_relation_graphs(events, self.window)?;
        let integrated = integrate(&relations, &self.coefficients)?;
        tracing::info!(
            events = events.len(),
            actors = integrated.node_count(),
            edges = integrated.edge_count(),
            "Built social graphs"
        );
        Ok(GraphSet {
            relations,
            integrated,
        })
    }

    fn analyze_graphs(&self, graphs: &GraphSet) -> NetworkAnalytics {
        let all: Vec<&SocialGraph> = graphs.iter().collect();
        let mut results: Vec<GraphAnalytics> = all
            .par_iter()
            .map(|graph| compute_all(graph, &self.config))
            .collect();

        // iter() yields the integrated graph last
        let integrated = match results.pop() {
            Some(analytics) => analytics,
            None => compute_all(&graphs.integrated, &self.config),
        };
        let relations = results
            .into_iter()
            .filter_map(|analytics| match analytics.scope {
                GraphScope::Relation(kind) => Some((kind, analytics)),
                GraphScope::Integrated => None,
            })
            .collect();

        NetworkAnalytics {
            relations,
            integrated,
            computed_at: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::Actor;
    use crate::test_helpers::{event, graph_from_edges, make_chain, make_two_cliques};

    fn scenario_events() -> Vec<Event> {
        vec![
            event("A", "B", RelationKind::Comment),
            event("A", "B", RelationKind::Comment),
            event("B", "C", RelationKind::Closure),
        ]
    }

    fn scenario_engine() -> SocialGraphEngine {
        let coefficients = RelationCoefficients::empty()
            .with(RelationKind::Comment, 1.0)
            .with(RelationKind::Closure, 2.0)
            .with(RelationKind::ReviewMerge, 1.0);
        SocialGraphEngine::new(coefficients, AnalyticsConfig::default())
    }

    #[test]
    fn test_compute_all_two_cliques() {
        let mut g = make_two_cliques(5);
        // One bridge edge between clusters
        g.add_interaction("a_0", "b_0", 1.0);
        let analytics = compute_all(&g, &AnalyticsConfig::default());

        assert_eq!(analytics.node_count, 10);
        assert_eq!(analytics.metrics.len(), 10);
        assert_eq!(analytics.edge_count, 41);
        assert!(
            analytics.communities.len() >= 2,
            "Expected at least 2 communities, got {}",
            analytics.communities.len()
        );
        assert!(
            analytics.modularity > 0.0,
            "Expected positive modularity, got {}",
            analytics.modularity
        );
        assert_eq!(analytics.components.len(), 1);
        assert_eq!(analytics.bridges[0].actor, "a_0");
        assert!(analytics.metrics["a_0"].pagerank.unwrap() > 0.0);
    }

    #[test]
    fn test_bridges_follow_top_n() {
        let mut g = make_two_cliques(4);
        for i in 0..4 {
            g.add_interaction(&format!("a_{}", i), &format!("b_{}", i), 1.0);
        }
        let two = AnalyticsConfig {
            top_n: 2,
            ..AnalyticsConfig::default()
        };
        let ten = AnalyticsConfig {
            top_n: 10,
            ..AnalyticsConfig::default()
        };

        let short = compute_all(&g, &two).bridges;
        assert_eq!(short.len(), 2);
        assert_eq!(short[0].actor, "a_0");
        assert_eq!(short[1].actor, "a_1");

        let long = compute_all(&g, &ten).bridges;
        let actors: Vec<&str> = long.iter().map(|t| t.actor.as_str()).collect();
        assert_eq!(actors, vec!["a_0", "a_1", "a_2", "a_3"]);
    }

    #[test]
    fn test_compute_all_empty_graph() {
        let g = SocialGraph::new(GraphScope::Integrated);
        let analytics = compute_all(&g, &AnalyticsConfig::default());
        assert_eq!(analytics.node_count, 0);
        assert!(analytics.metrics.is_empty());
        assert!(analytics.communities.is_empty());
        assert!(analytics.components.is_empty());
        assert_eq!(analytics.density, 0.0);
        assert!(analytics.assortativity.is_none());
    }

    #[test]
    fn test_compute_all_single_isolated_actor() {
        let mut g = SocialGraph::new(GraphScope::Integrated);
        g.add_actor(Actor::new("lonely"));
        let analytics = compute_all(&g, &AnalyticsConfig::default());

        assert_eq!(analytics.node_count, 1);
        assert_eq!(analytics.communities.len(), 1);
        assert_eq!(analytics.communities[0].size, 1);
        assert_eq!(analytics.components.len(), 1);
        assert!(analytics.components[0].is_main);
        let m = &analytics.metrics["lonely"];
        assert_eq!(m.degree_centrality, 0.0);
        assert_eq!(m.closeness, 0.0);
        assert_eq!(m.betweenness, 0.0);
    }

    #[test]
    fn test_failed_metric_does_not_abort_the_others() {
        let config = AnalyticsConfig {
            pagerank_max_iterations: 1,
            pagerank_tolerance: 0.0,
            fail_on_non_convergence: true,
            ..AnalyticsConfig::default()
        };
        let analytics = compute_all(&make_chain(4), &config);

        let status = analytics.status("pagerank").unwrap();
        assert!(matches!(status.outcome, MetricOutcome::Failed { .. }));
        assert!(analytics.metrics.values().all(|m| m.pagerank.is_none()));
        assert!(analytics.metric("pagerank").is_none());

        assert!(analytics.status("degree_centrality").unwrap().is_ok());
        assert!(analytics.status("betweenness_centrality").unwrap().is_ok());
        assert!(analytics.metrics["node_1"].betweenness > 0.0);
        assert_eq!(analytics.communities.len(), analytics.community_assignment.community_count());
    }

    #[test]
    fn test_not_converged_is_reported() {
        let config = AnalyticsConfig {
            label_propagation_max_rounds: 1,
            ..AnalyticsConfig::default()
        };
        let analytics = compute_all(&make_chain(6), &config);
        assert_eq!(
            analytics.status("label_propagation").unwrap().outcome,
            MetricOutcome::NotConverged { iterations: 1 }
        );
    }

    #[test]
    fn test_assortativity_failure_is_recorded() {
        let g = graph_from_edges(&[], &[("a", "b", 1.0)]);
        let analytics = compute_all(&g, &AnalyticsConfig::default());
        assert!(analytics.assortativity.is_none());
        assert!(matches!(
            analytics.status("assortativity").unwrap().outcome,
            MetricOutcome::Failed { .. }
        ));
        assert!(analytics.status("pagerank").unwrap().is_ok());
    }

    #[test]
    fn test_metadata_records_conventions() {
        let analytics = compute_all(&make_chain(3), &AnalyticsConfig::default());
        assert_eq!(
            analytics.metadata["closeness_centrality.convention"],
            "wasserman_faust_partial"
        );
        assert_eq!(
            analytics.metadata["betweenness_centrality.distance"],
            "inverse_weight"
        );
    }

    #[test]
    fn test_engine_scenario() {
        let engine = scenario_engine();
        let graphs = engine.build_graphs(&scenario_events()).unwrap();

        assert!((graphs.integrated.weight("A", "B") - 2.0).abs() < f64::EPSILON);
        assert!((graphs.integrated.weight("B", "C") - 2.0).abs() < f64::EPSILON);

        let analytics = engine.analyze_graphs(&graphs);
        assert_eq!(analytics.relations.len(), 3);
        assert_eq!(analytics.integrated.scope, GraphScope::Integrated);

        let integrated = analytics.get(GraphScope::Integrated).unwrap();
        assert!((integrated.metrics["B"].degree_centrality - 1.0).abs() < 1e-9);
        assert!(integrated.metrics["B"].betweenness > 0.0);
        assert!(integrated.metrics["A"].betweenness == 0.0);

        let comments = analytics
            .get(GraphScope::Relation(RelationKind::Comment))
            .unwrap();
        assert_eq!(comments.node_count, 2);
        assert_eq!(comments.scope, GraphScope::Relation(RelationKind::Comment));
    }

    #[test]
    fn test_engine_exposes_its_settings() {
        let config = AnalyticsConfig {
            top_n: 3,
            ..AnalyticsConfig::default()
        };
        let engine = SocialGraphEngine::new(RelationCoefficients::default(), config.clone());
        assert_eq!(engine.config(), &config);
        assert_eq!(engine.coefficients().get(RelationKind::ReviewMerge), Some(4.0));
    }

    #[test]
    fn test_engine_missing_coefficient_fails_build() {
        let engine = SocialGraphEngine::new(
            RelationCoefficients::empty().with(RelationKind::Comment, 1.0),
            AnalyticsConfig::default(),
        );
        let err = engine.analyze(&scenario_events()).unwrap_err();
        assert!(matches!(err, GraphError::UnknownRelationKind(_)));
    }

    #[test]
    fn test_engine_is_deterministic() {
        let engine = scenario_engine();
        let first = engine.analyze(&scenario_events()).unwrap();
        let mut reversed = scenario_events();
        reversed.reverse();
        let second = engine.analyze(&reversed).unwrap();

        assert_eq!(first.integrated.metrics, second.integrated.metrics);
        assert_eq!(first.integrated.communities, second.integrated.communities);
        assert_eq!(first.relations.len(), second.relations.len());
    }

    #[test]
    fn test_network_analytics_serializes() {
        let analytics = scenario_engine().analyze(&scenario_events()).unwrap();
        let json = serde_json::to_value(&analytics).unwrap();
        assert!(json["relations"]["comment"].is_object());
        assert_eq!(json["integrated"]["scope"]["scope"], "integrated");
        assert_eq!(json["integrated"]["statuses"][0]["outcome"], "ok");
    }
}
