//! Contributor social graph engine.
//!
//! Turns interaction events mined from a repository (comments, issue
//! closures, reviews and merges) into weighted directed graphs of actors and
//! computes social-network metrics on them, using petgraph and rustworkx-core.
//!
//! ## Architecture
//!
//! ```text
//! events ──► builder ──► relation graphs (comment, closure, review_merge)
//!                              │
//!                         integrator (Σ coefficient × weight)
//!                              │
//!                        integrated graph
//!                              │
//!              algorithms + community (per graph)
//!                              │
//!                 GraphAnalytics ──► export ──► Gephi CSV
//!                              │
//!              AnalyticsEngine (orchestrator)
//! ```
//!
//! ## Modules
//!
//! - [`models`] — Data structures (Event, SocialGraph, MetricResult, AnalyticsConfig)
//! - [`error`] — `GraphError`
//! - [`builder`] — Events → relation graphs
//! - [`integrator`] — Relation graphs → integrated graph
//! - [`algorithms`] — Centralities, PageRank, density, clustering, assortativity, WCC
//! - [`community`] — Label propagation, modularity, bridging ties
//! - [`engine`] — `compute_all`, `AnalyticsEngine` trait and `SocialGraphEngine`
//! - [`export`] — Exporter-facing snapshot of nodes, attributes and edges

pub mod algorithms;
pub mod builder;
pub mod community;
pub mod engine;
pub mod error;
pub mod export;
pub mod integrator;
pub mod models;

// Re-export primary types for convenience
pub use builder::{build_relation_graphs, RelationGraphBuilder};
pub use community::{label_propagation, LabelPropagation};
pub use engine::{
    compute_all, AnalyticsEngine, GraphAnalytics, GraphSet, MetricOutcome, MetricStatus,
    NetworkAnalytics, NodeMetrics, SocialGraphEngine,
};
pub use error::GraphError;
pub use export::{EdgeRecord, GraphExport, NodeRecord};
pub use integrator::{integrate, RelationCoefficients};
pub use models::{
    Actor, AnalyticsConfig, BridgeTie, CommunityAssignment, CommunityInfo, ComponentInfo,
    Convergence, DistanceMode, Event, GraphScope, Interaction, MetricResult, RelationKind,
    SocialGraph, TimeWindow,
};
