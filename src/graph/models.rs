//! Social graph data models.
//!
//! Defines the complete type system for the collaboration graph engine:
//!
//! ## Input types (mining collaborator → builders)
//! - [`Actor`] — a contributor identity
//! - [`RelationKind`] — comment / closure / review-merge
//! - [`Event`] — one timestamped interaction between two actors
//! - [`TimeWindow`] — optional half-open time filter over events
//!
//! ## Graph types
//! - [`Interaction`] — edge payload (accumulated weight)
//! - [`GraphScope`] — which relation a graph holds, or the integrated view
//! - [`SocialGraph`] — petgraph wrapper with ID ↔ NodeIndex mapping, shared by
//!   relation graphs and the integrated graph
//!
//! ## Output types (metrics and communities)
//! - [`MetricResult`] / [`Convergence`] — per-node scores with status and metadata
//! - [`CommunityAssignment`] — node → community label
//! - [`CommunityInfo`] / [`ComponentInfo`] / [`BridgeTie`] — summaries
//!
//! ## Configuration
//! - [`AnalyticsConfig`] / [`DistanceMode`] — tuning parameters for the metrics

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

// ============================================================================
// Input types — events
// ============================================================================

/// Kind of collaboration that produced an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Someone commented on an issue or pull request opened by someone else
    Comment,
    /// Someone closed an issue opened by someone else
    Closure,
    /// Someone reviewed or merged a pull request opened by someone else
    ReviewMerge,
}

impl RelationKind {
    /// Every relation kind, in canonical order.
    pub const ALL: [RelationKind; 3] = [Self::Comment, Self::Closure, Self::ReviewMerge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Closure => "closure",
            Self::ReviewMerge => "review_merge",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comment" | "comments" => Ok(Self::Comment),
            "closure" | "close" | "closed" => Ok(Self::Closure),
            "review_merge" | "review-merge" | "review" | "merge" => Ok(Self::ReviewMerge),
            other => Err(format!("unknown relation kind: {}", other)),
        }
    }
}

/// A contributor identity. Identity is the `id`; the display name is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier (e.g. the hosting service login)
    pub id: String,
    /// Optional human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Label used by exports: the display name when known, the id otherwise.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

fn default_weight() -> f64 {
    1.0
}

/// One interaction record produced by the mining collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Actor who performed the interaction
    pub source: Actor,
    /// Actor the interaction was directed at (author of the issue / PR)
    pub target: Actor,
    /// Relation this interaction contributes to
    pub kind: RelationKind,
    /// When the interaction happened
    pub timestamp: DateTime<Utc>,
    /// Weight contribution (default: 1.0)
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Event {
    /// Create an event with the default weight contribution of 1.
    pub fn new(
        source: Actor,
        target: Actor,
        kind: RelationKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            target,
            kind,
            timestamp,
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// True when source and target are the same actor.
    pub fn is_self_loop(&self) -> bool {
        self.source.id == self.target.id
    }
}

/// Half-open time window `[since, until)`. Missing bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| *ts >= since) && self.until.map_or(true, |until| *ts < until)
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

// ============================================================================
// SocialGraph — petgraph wrapper with ID mapping
// ============================================================================

/// Edge payload: accumulated interaction weight between two actors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub weight: f64,
}

/// What a [`SocialGraph`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "relation")]
pub enum GraphScope {
    /// Graph of a single relation kind
    Relation(RelationKind),
    /// Weighted combination of all relation graphs
    Integrated,
}

impl std::fmt::Display for GraphScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relation(kind) => write!(f, "{}", kind),
            Self::Integrated => write!(f, "integrated"),
        }
    }
}

impl FromStr for GraphScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("integrated") {
            return Ok(Self::Integrated);
        }
        s.parse::<RelationKind>().map(Self::Relation)
    }
}

/// Weighted directed graph of actors, with bidirectional ID ↔ NodeIndex mapping.
///
/// Used for both relation graphs and the integrated graph; [`GraphScope`]
/// tells them apart. Builders insert actors in ascending id order so node
/// indices are canonical for a given node set.
#[derive(Debug, Clone)]
pub struct SocialGraph {
    /// What this graph represents
    pub scope: GraphScope,
    /// The underlying directed graph
    pub graph: DiGraph<Actor, Interaction>,
    /// Mapping from actor id to petgraph NodeIndex
    pub id_to_index: HashMap<String, NodeIndex>,
}

impl SocialGraph {
    /// Create a new empty graph for the given scope.
    pub fn new(scope: GraphScope) -> Self {
        Self {
            scope,
            graph: DiGraph::new(),
            id_to_index: HashMap::new(),
        }
    }

    /// Create a graph with pre-allocated capacity.
    pub fn with_capacity(scope: GraphScope, nodes: usize, edges: usize) -> Self {
        Self {
            scope,
            graph: DiGraph::with_capacity(nodes, edges),
            id_to_index: HashMap::with_capacity(nodes),
        }
    }

    /// Add an actor. If an actor with the same id exists, returns its index.
    pub fn add_actor(&mut self, actor: Actor) -> NodeIndex {
        if let Some(&idx) = self.id_to_index.get(&actor.id) {
            return idx;
        }
        let id = actor.id.clone();
        let idx = self.graph.add_node(actor);
        self.id_to_index.insert(id, idx);
        idx
    }

    /// Add `weight` to the edge `from → to`, creating it if needed.
    ///
    /// Returns `None` if either actor is missing, or for self-loops.
    pub fn add_interaction(&mut self, from_id: &str, to_id: &str, weight: f64) -> Option<EdgeIndex> {
        let from_idx = *self.id_to_index.get(from_id)?;
        let to_idx = *self.id_to_index.get(to_id)?;
        if from_idx == to_idx {
            return None;
        }
        match self.graph.find_edge(from_idx, to_idx) {
            Some(edge) => {
                self.graph[edge].weight += weight;
                Some(edge)
            }
            None => Some(self.graph.add_edge(from_idx, to_idx, Interaction { weight })),
        }
    }

    /// Weight of `from → to`, 0.0 when the edge (or either actor) is absent.
    pub fn weight(&self, from_id: &str, to_id: &str) -> f64 {
        let (Some(&u), Some(&v)) = (self.id_to_index.get(from_id), self.id_to_index.get(to_id)) else {
            return 0.0;
        };
        self.graph
            .find_edge(u, v)
            .map(|e| self.graph[e].weight)
            .unwrap_or(0.0)
    }

    pub fn get_actor(&self, id: &str) -> Option<&Actor> {
        let idx = self.id_to_index.get(id)?;
        self.graph.node_weight(*idx)
    }

    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    pub fn contains_actor(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Actors sorted by id.
    pub fn actors(&self) -> Vec<&Actor> {
        let mut actors: Vec<&Actor> = self.graph.node_weights().collect();
        actors.sort_by(|a, b| a.id.cmp(&b.id));
        actors
    }

    /// All edges as `(source, target, weight)`, sorted by (source, target).
    pub fn edges(&self) -> Vec<(String, String, f64)> {
        let g = &self.graph;
        let mut edges: Vec<(String, String, f64)> = g
            .edge_references()
            .map(|e| {
                (
                    g[e.source()].id.clone(),
                    g[e.target()].id.clone(),
                    e.weight().weight,
                )
            })
            .collect();
        edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        edges
    }
}

// ============================================================================
// Output types — metrics and communities
// ============================================================================

/// Termination status of an iterative algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Convergence {
    /// Not iterative (closed-form metric)
    Exact,
    /// Stabilized after the given number of iterations
    Converged { iterations: usize },
    /// Hit the iteration cap; the result is the best available estimate
    NotConverged { iterations: usize },
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        !matches!(self, Self::NotConverged { .. })
    }
}

/// Per-node scores of one metric, tagged with the metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric name (e.g. "pagerank")
    pub name: String,
    /// Score per actor id
    pub scores: BTreeMap<String, f64>,
    /// How the computation terminated
    pub status: Convergence,
    /// Conventions used (distance interpretation, normalization, ...)
    pub metadata: BTreeMap<String, String>,
}

impl MetricResult {
    pub fn new(name: impl Into<String>, scores: BTreeMap<String, f64>) -> Self {
        Self {
            name: name.into(),
            scores,
            status: Convergence::Exact,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: Convergence) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    /// The `n` highest scores, ties broken by ascending id.
    pub fn top(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .scores
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Community label per actor. Labels only group nodes; they carry no order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityAssignment {
    /// Community label per actor id
    pub labels: BTreeMap<String, u32>,
    /// Number of propagation rounds executed
    pub rounds: usize,
    /// Whether propagation stabilized before the round cap
    pub status: Convergence,
}

impl CommunityAssignment {
    pub fn get(&self, id: &str) -> Option<u32> {
        self.labels.get(id).copied()
    }

    /// Number of distinct communities.
    pub fn community_count(&self) -> usize {
        let mut seen: Vec<u32> = self.labels.values().copied().collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Members per community label, each list sorted by id.
    pub fn members(&self) -> BTreeMap<u32, Vec<String>> {
        let mut groups: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for (id, label) in &self.labels {
            groups.entry(*label).or_default().push(id.clone());
        }
        groups
    }
}

/// Metadata about a detected community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityInfo {
    /// Community label
    pub id: u32,
    /// Number of members
    pub size: usize,
    /// Member ids, sorted
    pub members: Vec<String>,
}

/// Metadata about a weakly connected component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Component identifier
    pub id: u32,
    /// Number of nodes in this component
    pub size: usize,
    /// Member ids, sorted
    pub members: Vec<String>,
    /// Whether this is the main component: the largest, the first discovered
    /// (lowest id) when sizes tie. Exactly one per non-empty graph.
    pub is_main: bool,
}

/// An actor whose outgoing interactions reach other communities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTie {
    pub actor: String,
    /// Number of distinct outgoing neighbours in a different community
    pub external_links: usize,
}

// ============================================================================
// Configuration
// ============================================================================

/// How edge weights become path lengths for closeness and betweenness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    /// distance = 1 / weight: more interaction means closer
    #[default]
    InverseWeight,
    /// Every edge has length 1 regardless of weight
    Hops,
}

impl DistanceMode {
    /// Length of an edge with the given weight.
    pub fn length(&self, weight: f64) -> f64 {
        match self {
            Self::InverseWeight => 1.0 / weight,
            Self::Hops => 1.0,
        }
    }
}

impl std::fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InverseWeight => write!(f, "inverse_weight"),
            Self::Hops => write!(f, "hops"),
        }
    }
}

/// Tuning parameters for the metrics engine and community detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// PageRank damping factor (default: 0.85)
    pub pagerank_damping: f64,
    /// PageRank convergence tolerance on the L1 change (default: 1e-6)
    pub pagerank_tolerance: f64,
    /// PageRank maximum iterations (default: 100)
    pub pagerank_max_iterations: usize,
    /// Label propagation maximum rounds (default: 100)
    pub label_propagation_max_rounds: usize,
    /// Edge weight → path length convention (default: inverse weight)
    pub distance: DistanceMode,
    /// Turn PageRank non-convergence into an error instead of a status flag
    pub fail_on_non_convergence: bool,
    /// Number of bridging ties to report (default: 5)
    pub top_n: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: 0.85,
            pagerank_tolerance: 1e-6,
            pagerank_max_iterations: 100,
            label_propagation_max_rounds: 100,
            distance: DistanceMode::InverseWeight,
            fail_on_non_convergence: false,
            top_n: 5,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
