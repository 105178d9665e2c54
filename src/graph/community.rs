//! Community detection by weighted label propagation.
//!
//! Runs on the undirected projection of a [`SocialGraph`]: the weight between
//! two actors is the sum of both directed edge weights. Every node starts in
//! its own community; each round visits nodes in index order (ascending id)
//! and moves each one to the label carrying the largest total weight among
//! its neighbours. A node keeps its current label when that label is among the
//! best; otherwise the lowest best label wins. Updates apply in place, so later
//! nodes in a round already see earlier moves.
//!
//! Once a pass is stable, adjacent communities are merged greedily while some
//! merge raises modularity (best gain first, lowest label pair on ties), and
//! propagation resumes from the merged labels. This rejoins a dense weighted
//! cluster that plurality voting alone can leave split in two. Communities in
//! different components are never adjacent, so they never merge.
//!
//! Propagation stops after a round with no change and no merge to make, or at
//! the round cap with a best-effort assignment flagged
//! [`Convergence::NotConverged`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::visit::EdgeRef;

use super::algorithms::approx_eq;
use super::models::{BridgeTie, CommunityAssignment, CommunityInfo, Convergence, SocialGraph};

/// Merges gaining less modularity than this are treated as rounding noise.
const MERGE_MIN_GAIN: f64 = 1e-12;

/// Undirected weighted adjacency, each list sorted by neighbour index.
fn undirected_adjacency(graph: &SocialGraph) -> Vec<Vec<(usize, f64)>> {
    let g = &graph.graph;
    let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); g.node_count()];
    for edge in g.edge_references() {
        let (s, t) = (edge.source().index(), edge.target().index());
        if s == t {
            continue;
        }
        let w = edge.weight().weight;
        *merged[s].entry(t).or_insert(0.0) += w;
        *merged[t].entry(s).or_insert(0.0) += w;
    }
    merged
        .into_iter()
        .map(|neighbours| neighbours.into_iter().collect())
        .collect()
}

/// Label propagation state over one graph.
pub struct LabelPropagation<'g> {
    graph: &'g SocialGraph,
    adjacency: Vec<Vec<(usize, f64)>>,
    labels: Vec<u32>,
}

impl<'g> LabelPropagation<'g> {
    /// Every node in its own community.
    pub fn new(graph: &'g SocialGraph) -> Self {
        let labels = (0..graph.node_count() as u32).collect();
        Self {
            graph,
            adjacency: undirected_adjacency(graph),
            labels,
        }
    }

    /// Resume from an existing assignment. Actors it does not cover get
    /// fresh singleton labels.
    pub fn from_assignment(graph: &'g SocialGraph, assignment: &CommunityAssignment) -> Self {
        let g = &graph.graph;
        let mut next = assignment.labels.values().max().map_or(0, |max| max + 1);
        let labels = g
            .node_indices()
            .map(|idx| {
                assignment.get(&g[idx].id).unwrap_or_else(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        Self {
            graph,
            adjacency: undirected_adjacency(graph),
            labels,
        }
    }

    /// One propagation round. Returns how many nodes changed label.
    pub fn step(&mut self) -> usize {
        let mut changed = 0;
        for node in 0..self.labels.len() {
            let neighbours = &self.adjacency[node];
            if neighbours.is_empty() {
                continue;
            }

            let mut tally: BTreeMap<u32, f64> = BTreeMap::new();
            for &(other, weight) in neighbours {
                *tally.entry(self.labels[other]).or_insert(0.0) += weight;
            }
            let best = tally.values().copied().fold(f64::NEG_INFINITY, f64::max);

            let current = self.labels[node];
            if tally.get(&current).is_some_and(|&w| approx_eq(w, best)) {
                continue;
            }
            // BTreeMap iterates labels ascending: first hit is the lowest best label
            if let Some((&label, _)) = tally.iter().find(|(_, &w)| approx_eq(w, best)) {
                self.labels[node] = label;
                changed += 1;
            }
        }
        changed
    }

    /// Merge adjacent communities while the best merge raises modularity.
    /// Returns the number of merges made.
    pub fn merge_communities(&mut self) -> usize {
        let two_w: f64 = self
            .adjacency
            .iter()
            .flat_map(|neighbours| neighbours.iter().map(|(_, w)| w))
            .sum();
        if two_w <= 0.0 {
            return 0;
        }

        let mut merges = 0;
        loop {
            let mut strength: BTreeMap<u32, f64> = BTreeMap::new();
            let mut between: BTreeMap<(u32, u32), f64> = BTreeMap::new();
            for (node, neighbours) in self.adjacency.iter().enumerate() {
                let own = self.labels[node];
                for &(other, w) in neighbours {
                    *strength.entry(own).or_insert(0.0) += w;
                    let theirs = self.labels[other];
                    // Each undirected pair is seen from both ends; count it once
                    if own < theirs {
                        *between.entry((own, theirs)).or_insert(0.0) += w;
                    }
                }
            }

            let mut best: Option<((u32, u32), f64)> = None;
            for (&(a, b), &links) in &between {
                let k_a = strength.get(&a).copied().unwrap_or(0.0);
                let k_b = strength.get(&b).copied().unwrap_or(0.0);
                let gain = 2.0 * links / two_w - 2.0 * k_a * k_b / (two_w * two_w);
                if best.map_or(true, |(_, top)| gain > top) {
                    best = Some(((a, b), gain));
                }
            }

            match best {
                Some(((keep, absorb), gain)) if gain > MERGE_MIN_GAIN => {
                    for label in self.labels.iter_mut().filter(|l| **l == absorb) {
                        *label = keep;
                    }
                    merges += 1;
                }
                _ => return merges,
            }
        }
    }

    /// Propagate and merge until stable, or until `max_rounds` propagation
    /// rounds have run.
    pub fn run(mut self, max_rounds: usize) -> CommunityAssignment {
        let mut rounds = 0;
        let mut stable;
        loop {
            stable = false;
            while rounds < max_rounds {
                rounds += 1;
                if self.step() == 0 {
                    stable = true;
                    break;
                }
            }
            if !stable || self.merge_communities() == 0 {
                break;
            }
        }
        let status = if stable {
            Convergence::Converged { iterations: rounds }
        } else {
            Convergence::NotConverged {
                iterations: max_rounds,
            }
        };

        if !status.is_converged() {
            tracing::warn!(
                scope = %self.graph.scope,
                rounds,
                "Label propagation hit its round cap; returning best-effort communities"
            );
        }

        self.assignment(rounds, status)
    }

    /// Current labels, renumbered contiguously by first appearance in index order.
    pub fn assignment(&self, rounds: usize, status: Convergence) -> CommunityAssignment {
        let g = &self.graph.graph;
        let mut renumber: HashMap<u32, u32> = HashMap::new();
        let mut labels = BTreeMap::new();
        for idx in g.node_indices() {
            let next = renumber.len() as u32;
            let label = *renumber.entry(self.labels[idx.index()]).or_insert(next);
            labels.insert(g[idx].id.clone(), label);
        }
        CommunityAssignment {
            labels,
            rounds,
            status,
        }
    }
}

/// Detect communities with the default propagation rules.
pub fn label_propagation(graph: &SocialGraph, max_rounds: usize) -> CommunityAssignment {
    LabelPropagation::new(graph).run(max_rounds)
}

/// Community summaries, largest first (ties by label).
pub fn communities(assignment: &CommunityAssignment) -> Vec<CommunityInfo> {
    let mut infos: Vec<CommunityInfo> = assignment
        .members()
        .into_iter()
        .map(|(id, members)| CommunityInfo {
            id,
            size: members.len(),
            members,
        })
        .collect();
    infos.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.id.cmp(&b.id)));
    infos
}

/// Newman modularity of an assignment on the undirected weighted projection.
///
/// `Q = Σ_c [ L_c / W − (K_c / 2W)² ]` where `L_c` is the intra-community
/// weight, `K_c` the total strength of community `c` and `W` the total weight.
/// Returns 0 for graphs without edges.
pub fn modularity(graph: &SocialGraph, assignment: &CommunityAssignment) -> f64 {
    let g = &graph.graph;
    let adjacency = undirected_adjacency(graph);
    let community: Vec<Option<u32>> = g
        .node_indices()
        .map(|idx| assignment.get(&g[idx].id))
        .collect();

    let strength: Vec<f64> = adjacency
        .iter()
        .map(|neighbours| neighbours.iter().map(|(_, w)| w).sum())
        .collect();
    let two_w: f64 = strength.iter().sum();
    if two_w <= 0.0 {
        return 0.0;
    }

    let mut intra = 0.0;
    let mut community_strength: BTreeMap<u32, f64> = BTreeMap::new();
    for (node, neighbours) in adjacency.iter().enumerate() {
        let Some(c) = community[node] else {
            continue;
        };
        *community_strength.entry(c).or_insert(0.0) += strength[node];
        for &(other, w) in neighbours {
            if community[other] == Some(c) {
                intra += w;
            }
        }
    }

    let expected: f64 = community_strength
        .values()
        .map(|k| (k / two_w) * (k / two_w))
        .sum();
    intra / two_w - expected
}

/// Actors with the most outgoing ties into other communities.
///
/// Counts distinct outgoing neighbours whose community differs from the
/// actor's own. Actors with no such tie are omitted. Sorted by count
/// descending, then id; at most `top_n` entries.
pub fn bridging_ties(
    graph: &SocialGraph,
    assignment: &CommunityAssignment,
    top_n: usize,
) -> Vec<BridgeTie> {
    let g = &graph.graph;
    let mut ties: Vec<BridgeTie> = g
        .node_indices()
        .filter_map(|idx| {
            let own = assignment.get(&g[idx].id)?;
            let external: BTreeSet<usize> = g
                .neighbors(idx)
                .filter(|n| assignment.get(&g[*n].id).is_some_and(|c| c != own))
                .map(|n| n.index())
                .collect();
            (!external.is_empty()).then(|| BridgeTie {
                actor: g[idx].id.clone(),
                external_links: external.len(),
            })
        })
        .collect();
    ties.sort_by(|a, b| {
        b.external_links
            .cmp(&a.external_links)
            .then_with(|| a.actor.cmp(&b.actor))
    });
    ties.truncate(top_n);
    ties
}
