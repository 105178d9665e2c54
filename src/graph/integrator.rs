//! Relation graphs → integrated graph.
//!
//! Edge weight at (u, v) in the integrated graph is
//! `Σ coefficient[kind] × relation_graph[kind].weight(u, v)`, with absent edges
//! counting as 0. The node set is the union of all relation node sets, so an
//! actor stays visible even when every one of its integrated edges vanishes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::GraphError;
use super::models::{Actor, GraphScope, RelationKind, SocialGraph};

/// Per-relation coefficients for the weighted sum.
///
/// Defaults mirror the interaction weights of the mining tool: comment 2,
/// closure 3, review/merge 4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationCoefficients(BTreeMap<RelationKind, f64>);

impl RelationCoefficients {
    /// No coefficients at all; integrating anything with it fails.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, kind: RelationKind, coefficient: f64) -> Self {
        self.0.insert(kind, coefficient);
        self
    }

    pub fn set(&mut self, kind: RelationKind, coefficient: f64) {
        self.0.insert(kind, coefficient);
    }

    pub fn get(&self, kind: RelationKind) -> Option<f64> {
        self.0.get(&kind).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RelationKind, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Coefficient for `kind`, checked to be finite and non-negative.
    pub fn coefficient(&self, kind: RelationKind) -> Result<f64, GraphError> {
        let value = self.get(kind).ok_or(GraphError::UnknownRelationKind(kind))?;
        if !value.is_finite() || value < 0.0 {
            return Err(GraphError::InvalidCoefficient { kind, value });
        }
        Ok(value)
    }
}

impl Default for RelationCoefficients {
    fn default() -> Self {
        Self::empty()
            .with(RelationKind::Comment, 2.0)
            .with(RelationKind::Closure, 3.0)
            .with(RelationKind::ReviewMerge, 4.0)
    }
}

impl FromIterator<(RelationKind, f64)> for RelationCoefficients {
    fn from_iter<T: IntoIterator<Item = (RelationKind, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Merge relation graphs into one integrated graph.
///
/// Fails with [`GraphError::UnknownRelationKind`] if a present relation has no
/// coefficient, and with [`GraphError::MismatchedRelationKind`] if a map entry
/// holds a graph of another scope. Edges whose integrated weight is 0 are
/// omitted; their endpoints remain as nodes.
pub fn integrate(
    graphs: &BTreeMap<RelationKind, SocialGraph>,
    coefficients: &RelationCoefficients,
) -> Result<SocialGraph, GraphError> {
    let mut actors: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut weights: BTreeMap<(String, String), f64> = BTreeMap::new();

    for (&kind, graph) in graphs {
        if graph.scope != GraphScope::Relation(kind) {
            return Err(GraphError::MismatchedRelationKind {
                expected: kind,
                found: graph.scope,
            });
        }
        let coefficient = coefficients.coefficient(kind)?;

        for actor in graph.actors() {
            let slot = actors.entry(actor.id.clone()).or_insert(None);
            if let Some(name) = &actor.display_name {
                if slot.as_deref().map_or(true, |current| name.as_str() < current) {
                    *slot = Some(name.clone());
                }
            }
        }

        for (source, target, weight) in graph.edges() {
            *weights.entry((source, target)).or_insert(0.0) += coefficient * weight;
        }
    }

    let mut integrated = SocialGraph::with_capacity(GraphScope::Integrated, actors.len(), weights.len());
    for (id, display_name) in actors {
        integrated.add_actor(Actor { id, display_name });
    }
    for ((source, target), weight) in weights {
        if weight > 0.0 {
            integrated.add_interaction(&source, &target, weight);
        }
    }

    tracing::debug!(
        relations = graphs.len(),
        nodes = integrated.node_count(),
        edges = integrated.edge_count(),
        "Integrated relation graphs"
    );

    Ok(integrated)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::build_relation_graphs;
    use crate::graph::models::TimeWindow;
    use crate::test_helpers::event;

    fn scenario_graphs() -> BTreeMap<RelationKind, SocialGraph> {
        let events = vec![
            event("A", "B", RelationKind::Comment),
            event("A", "B", RelationKind::Comment),
            event("B", "C", RelationKind::Closure),
        ];
        build_relation_graphs(&events, TimeWindow::default()).unwrap()
    }

    #[test]
    fn test_integrate_scenario() {
        let coefficients = RelationCoefficients::empty()
            .with(RelationKind::Comment, 1.0)
            .with(RelationKind::Closure, 2.0)
            .with(RelationKind::ReviewMerge, 1.0);
        let g = integrate(&scenario_graphs(), &coefficients).unwrap();

        assert_eq!(g.scope, GraphScope::Integrated);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!((g.weight("A", "B") - 2.0).abs() < f64::EPSILON);
        assert!((g.weight("B", "C") - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_integrate_sums_overlapping_relations() {
        let events = vec![
            event("x", "y", RelationKind::Comment),
            event("x", "y", RelationKind::ReviewMerge),
            event("x", "y", RelationKind::ReviewMerge),
        ];
        let graphs = build_relation_graphs(&events, TimeWindow::default()).unwrap();
        let g = integrate(&graphs, &RelationCoefficients::default()).unwrap();
        // 2 × 1 + 4 × 2
        assert!((g.weight("x", "y") - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_coefficient_is_unknown_relation() {
        let coefficients = RelationCoefficients::empty()
            .with(RelationKind::Comment, 1.0)
            .with(RelationKind::Closure, 2.0);
        let err = integrate(&scenario_graphs(), &coefficients).unwrap_err();
        assert_eq!(err, GraphError::UnknownRelationKind(RelationKind::ReviewMerge));
    }

    #[test]
    fn test_negative_coefficient_is_rejected() {
        let coefficients = RelationCoefficients::default().with(RelationKind::Closure, -1.0);
        let err = integrate(&scenario_graphs(), &coefficients).unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidCoefficient {
                kind: RelationKind::Closure,
                ..
            }
        ));
    }

    #[test]
    fn test_mismatched_scope_is_rejected() {
        let mut graphs = scenario_graphs();
        let closure = graphs.remove(&RelationKind::Closure).unwrap();
        graphs.insert(RelationKind::Comment, closure);
        let err = integrate(&graphs, &RelationCoefficients::default()).unwrap_err();
        assert!(matches!(err, GraphError::MismatchedRelationKind { .. }));
    }

    #[test]
    fn test_zero_coefficient_keeps_nodes_but_drops_edges() {
        let coefficients = RelationCoefficients::default().with(RelationKind::Closure, 0.0);
        let g = integrate(&scenario_graphs(), &coefficients).unwrap();
        assert!(g.contains_actor("C"));
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.weight("B", "C"), 0.0);
    }

    #[test]
    fn test_integrate_is_deterministic() {
        let graphs = scenario_graphs();
        let coefficients = RelationCoefficients::default();
        let first = integrate(&graphs, &coefficients).unwrap();
        let second = integrate(&graphs, &coefficients).unwrap();
        assert_eq!(first.edges(), second.edges());
        for actor in first.actors() {
            assert_eq!(first.get_index(&actor.id), second.get_index(&actor.id));
        }
    }

    #[test]
    fn test_coefficients_deserialize_from_yaml_map() {
        let coefficients: RelationCoefficients =
            serde_yaml::from_str("comment: 1.5\nreview_merge: 5\n").unwrap();
        assert_eq!(coefficients.get(RelationKind::Comment), Some(1.5));
        assert_eq!(coefficients.get(RelationKind::ReviewMerge), Some(5.0));
        assert_eq!(coefficients.get(RelationKind::Closure), None);
    }
}
