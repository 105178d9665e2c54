//! Events → relation graphs.
//!
//! A single [`RelationGraphBuilder`] serves all three relation kinds. It has two
//! entry points with one contract each:
//!
//! - [`RelationGraphBuilder::build`] expects **pre-filtered** input: every event
//!   must carry the builder's relation kind, otherwise the build fails with
//!   [`GraphError::MismatchedRelationKind`].
//! - [`RelationGraphBuilder::build_filtered`] accepts a **raw, mixed** stream and
//!   silently skips events of other kinds.
//!
//! Both reject negative or non-finite weights, drop self-loops from the edge
//! set (the actor still becomes a node), and honour an optional [`TimeWindow`].
//!
//! Aggregation is order-independent: contributions per (source, target) are
//! sorted before summing, and nodes/edges are inserted in ascending id order,
//! so any permutation of the same events yields an identical graph.

use std::collections::BTreeMap;

use super::error::GraphError;
use super::models::{Actor, Event, GraphScope, RelationKind, SocialGraph, TimeWindow};

/// Builds the [`SocialGraph`] of one relation kind.
#[derive(Debug, Clone)]
pub struct RelationGraphBuilder {
    kind: RelationKind,
    window: TimeWindow,
}

impl RelationGraphBuilder {
    pub fn new(kind: RelationKind) -> Self {
        Self {
            kind,
            window: TimeWindow::default(),
        }
    }

    /// Only consume events whose timestamp falls inside `window`.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Build from pre-filtered events.
    ///
    /// Fails on the first event whose kind differs from the builder's.
    pub fn build<'a, I>(&self, events: I) -> Result<SocialGraph, GraphError>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut acc = Accumulator::default();
        for (position, event) in events.into_iter().enumerate() {
            if event.kind != self.kind {
                tracing::warn!(
                    position,
                    expected = %self.kind,
                    found = %event.kind,
                    "Relation builder received a foreign event"
                );
                return Err(GraphError::MismatchedRelationKind {
                    expected: self.kind,
                    found: GraphScope::Relation(event.kind),
                });
            }
            if self.window.contains(&event.timestamp) {
                acc.push(event)?;
            }
        }
        Ok(acc.finish(GraphScope::Relation(self.kind)))
    }

    /// Build from a mixed stream, skipping events of other kinds.
    pub fn build_filtered<'a, I>(&self, events: I) -> Result<SocialGraph, GraphError>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut acc = Accumulator::default();
        for event in events {
            if event.kind == self.kind && self.window.contains(&event.timestamp) {
                acc.push(event)?;
            }
        }
        Ok(acc.finish(GraphScope::Relation(self.kind)))
    }
}

/// Build one graph per relation kind from a mixed stream.
///
/// Every kind gets an entry, possibly an empty graph.
pub fn build_relation_graphs(
    events: &[Event],
    window: TimeWindow,
) -> Result<BTreeMap<RelationKind, SocialGraph>, GraphError> {
    let mut graphs = BTreeMap::new();
    for kind in RelationKind::ALL {
        let graph = RelationGraphBuilder::new(kind)
            .with_window(window)
            .build_filtered(events)?;
        tracing::debug!(
            relation = %kind,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built relation graph"
        );
        graphs.insert(kind, graph);
    }
    Ok(graphs)
}

/// Order-independent fold of events into actors and weighted pairs.
#[derive(Default)]
struct Accumulator {
    /// Actor id → smallest non-empty display name seen
    actors: BTreeMap<String, Option<String>>,
    /// (source, target) → every weight contribution
    contributions: BTreeMap<(String, String), Vec<f64>>,
}

impl Accumulator {
    fn push(&mut self, event: &Event) -> Result<(), GraphError> {
        if !event.weight.is_finite() || event.weight < 0.0 {
            return Err(GraphError::InvalidWeight {
                value: event.weight,
            });
        }
        self.note_actor(&event.source);
        self.note_actor(&event.target);
        if !event.is_self_loop() {
            self.contributions
                .entry((event.source.id.clone(), event.target.id.clone()))
                .or_default()
                .push(event.weight);
        }
        Ok(())
    }

    fn note_actor(&mut self, actor: &Actor) {
        let name = actor
            .display_name
            .as_ref()
            .filter(|name| !name.trim().is_empty());
        let slot = self.actors.entry(actor.id.clone()).or_insert(None);
        if let Some(name) = name {
            let replace = match slot.as_deref() {
                Some(current) => name.as_str() < current,
                None => true,
            };
            if replace {
                *slot = Some(name.clone());
            }
        }
    }

    fn finish(self, scope: GraphScope) -> SocialGraph {
        let mut graph =
            SocialGraph::with_capacity(scope, self.actors.len(), self.contributions.len());

        for (id, display_name) in self.actors {
            graph.add_actor(Actor { id, display_name });
        }

        for ((source, target), mut weights) in self.contributions {
            weights.sort_by(f64::total_cmp);
            let total: f64 = weights.iter().sum();
            if total > 0.0 {
                graph.add_interaction(&source, &target, total);
            }
        }

        graph
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{event, ts};

    fn scenario_events() -> Vec<Event> {
        vec![
            event("A", "B", RelationKind::Comment),
            event("A", "B", RelationKind::Comment),
            event("B", "C", RelationKind::Closure),
        ]
    }

    #[test]
    fn test_build_filtered_scenario() {
        let events = scenario_events();

        let comments = RelationGraphBuilder::new(RelationKind::Comment)
            .build_filtered(&events)
            .unwrap();
        assert_eq!(comments.scope, GraphScope::Relation(RelationKind::Comment));
        assert_eq!(comments.node_count(), 2);
        assert_eq!(comments.edge_count(), 1);
        assert!((comments.weight("A", "B") - 2.0).abs() < f64::EPSILON);

        let closures = RelationGraphBuilder::new(RelationKind::Closure)
            .build_filtered(&events)
            .unwrap();
        assert_eq!(closures.node_count(), 2);
        assert!((closures.weight("B", "C") - 1.0).abs() < f64::EPSILON);
        assert!(!closures.contains_actor("A"));
    }

    #[test]
    fn test_build_rejects_foreign_kind() {
        let events = scenario_events();
        let err = RelationGraphBuilder::new(RelationKind::Comment)
            .build(&events)
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::MismatchedRelationKind {
                expected: RelationKind::Comment,
                found: GraphScope::Relation(RelationKind::Closure),
            }
        );
    }

    #[test]
    fn test_build_accepts_prefiltered_input() {
        let events: Vec<Event> = scenario_events()
            .into_iter()
            .filter(|e| e.kind == RelationKind::Comment)
            .collect();
        let graph = RelationGraphBuilder::new(RelationKind::Comment)
            .build(&events)
            .unwrap();
        assert!((graph.weight("A", "B") - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_self_loops_become_isolated_nodes() {
        let events = vec![
            event("alice", "alice", RelationKind::ReviewMerge),
            event("bob", "carol", RelationKind::ReviewMerge),
        ];
        let graph = RelationGraphBuilder::new(RelationKind::ReviewMerge)
            .build(&events)
            .unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.weight("alice", "alice"), 0.0);
    }

    #[test]
    fn test_weights_are_summed() {
        let events = vec![
            event("a", "b", RelationKind::Comment).with_weight(0.5),
            event("a", "b", RelationKind::Comment).with_weight(2.25),
            event("b", "a", RelationKind::Comment),
        ];
        let graph = RelationGraphBuilder::new(RelationKind::Comment)
            .build(&events)
            .unwrap();
        assert!((graph.weight("a", "b") - 2.75).abs() < 1e-12);
        assert!((graph.weight("b", "a") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weight_pairs_have_no_edge() {
        let events = vec![event("a", "b", RelationKind::Comment).with_weight(0.0)];
        let graph = RelationGraphBuilder::new(RelationKind::Comment)
            .build(&events)
            .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_invalid_weight_is_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let events = vec![event("a", "b", RelationKind::Comment).with_weight(bad)];
            let err = RelationGraphBuilder::new(RelationKind::Comment)
                .build_filtered(&events)
                .unwrap_err();
            assert!(matches!(err, GraphError::InvalidWeight { .. }));
        }
    }

    #[test]
    fn test_time_window_filters_events() {
        let mut early = event("a", "b", RelationKind::Comment);
        early.timestamp = ts(-100);
        let mut late = event("c", "d", RelationKind::Comment);
        late.timestamp = ts(100);

        let window = TimeWindow {
            since: Some(ts(0)),
            until: None,
        };
        let graph = RelationGraphBuilder::new(RelationKind::Comment)
            .with_window(window)
            .build(&[early, late])
            .unwrap();
        assert!(!graph.contains_actor("a"));
        assert!((graph.weight("c", "d") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_name_resolution_is_order_independent() {
        let mut first = event("u1", "u2", RelationKind::Comment);
        first.source.display_name = Some("Zed".to_string());
        let mut second = event("u1", "u2", RelationKind::Comment);
        second.source.display_name = Some("Ann".to_string());
        let mut third = event("u1", "u2", RelationKind::Comment);
        third.source.display_name = Some("  ".to_string());

        let builder = RelationGraphBuilder::new(RelationKind::Comment);
        let forward = builder
            .build(&[first.clone(), second.clone(), third.clone()])
            .unwrap();
        let backward = builder.build(&[third, second, first]).unwrap();

        assert_eq!(forward.get_actor("u1").unwrap().label(), "Ann");
        assert_eq!(backward.get_actor("u1").unwrap().label(), "Ann");
        assert_eq!(forward.get_actor("u2").unwrap().label(), "u2");
    }

    #[test]
    fn test_node_indices_are_canonical() {
        let events = vec![
            event("zoe", "adam", RelationKind::Comment),
            event("mike", "zoe", RelationKind::Comment),
        ];
        let graph = RelationGraphBuilder::new(RelationKind::Comment)
            .build(&events)
            .unwrap();
        assert_eq!(graph.get_index("adam").unwrap().index(), 0);
        assert_eq!(graph.get_index("mike").unwrap().index(), 1);
        assert_eq!(graph.get_index("zoe").unwrap().index(), 2);
    }

    #[test]
    fn test_build_relation_graphs_covers_every_kind() {
        let graphs = build_relation_graphs(&scenario_events(), TimeWindow::default()).unwrap();
        assert_eq!(graphs.len(), 3);
        assert_eq!(graphs[&RelationKind::Comment].edge_count(), 1);
        assert_eq!(graphs[&RelationKind::Closure].edge_count(), 1);
        assert_eq!(graphs[&RelationKind::ReviewMerge].node_count(), 0);
    }
}
