//! Graph metrics.
//!
//! Implements the structural metrics on petgraph-backed [`SocialGraph`]s:
//! - **Degree centrality** — `(in + out) / (n − 1)` over distinct neighbours
//! - **Closeness centrality** — Dijkstra (`petgraph::algo::dijkstra`), Wasserman–Faust
//!   partial closeness over the reachable set
//! - **Betweenness centrality** — Brandes accumulation over weighted shortest paths,
//!   or `rustworkx_core::centrality::betweenness_centrality` in hop mode
//! - **PageRank** — weighted power iteration with an iteration cap
//! - **Density**, **clustering** (undirected projection), **degree assortativity**
//! - **Weakly connected components** — BFS on the undirected view
//!
//! All functions are pure and deterministic: nodes are visited in index order
//! (ascending id for builder-made graphs) and floating sums are taken in that
//! order. Per-node results are `BTreeMap`s keyed by actor id.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};

use super::error::GraphError;
use super::models::{
    AnalyticsConfig, ComponentInfo, Convergence, DistanceMode, MetricResult, SocialGraph,
};

/// Relative tolerance under which two path lengths (or label weights) tie.
const TIE_EPSILON: f64 = 1e-9;

pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_EPSILON * a.abs().max(b.abs()).max(1.0)
}

fn scores_by_id(graph: &SocialGraph, values: &[f64]) -> BTreeMap<String, f64> {
    let g = &graph.graph;
    g.node_indices()
        .map(|idx| (g[idx].id.clone(), values[idx.index()]))
        .collect()
}

/// Outgoing `(target, value)` lists per node, sorted by target index.
fn outgoing<F>(graph: &SocialGraph, value: F) -> Vec<Vec<(usize, f64)>>
where
    F: Fn(f64) -> f64,
{
    let g = &graph.graph;
    let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); g.node_count()];
    for edge in g.edge_references() {
        adj[edge.source().index()].push((edge.target().index(), value(edge.weight().weight)));
    }
    for list in adj.iter_mut() {
        list.sort_by_key(|(target, _)| *target);
    }
    adj
}

/// Distinct neighbours per node in the undirected projection (no self).
fn undirected_neighbors(graph: &SocialGraph) -> Vec<BTreeSet<usize>> {
    let g = &graph.graph;
    let mut neighbors = vec![BTreeSet::new(); g.node_count()];
    for edge in g.edge_references() {
        let (s, t) = (edge.source().index(), edge.target().index());
        if s != t {
            neighbors[s].insert(t);
            neighbors[t].insert(s);
        }
    }
    neighbors
}

// ============================================================================
// Degree
// ============================================================================

pub fn in_degree(graph: &SocialGraph, idx: NodeIndex) -> usize {
    graph.graph.neighbors_directed(idx, Direction::Incoming).count()
}

pub fn out_degree(graph: &SocialGraph, idx: NodeIndex) -> usize {
    graph.graph.neighbors_directed(idx, Direction::Outgoing).count()
}

/// Degree centrality: `(in_degree + out_degree) / (n − 1)`.
///
/// Unweighted; isolated nodes and graphs with fewer than two nodes score 0.
pub fn degree_centrality(graph: &SocialGraph) -> MetricResult {
    let g = &graph.graph;
    let n = g.node_count();
    let scale = if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };

    let values: Vec<f64> = g
        .node_indices()
        .map(|idx| (in_degree(graph, idx) + out_degree(graph, idx)) as f64 * scale)
        .collect();

    MetricResult::new("degree_centrality", scores_by_id(graph, &values))
        .with_metadata("normalization", "(in_degree + out_degree) / (n - 1)")
}

/// Mean of in + out degree.
pub fn average_degree(graph: &SocialGraph) -> f64 {
    let n = graph.node_count();
    if n == 0 {
        return 0.0;
    }
    2.0 * graph.edge_count() as f64 / n as f64
}

// ============================================================================
// Closeness
// ============================================================================

/// Closeness centrality over outgoing shortest paths.
///
/// Uses the Wasserman–Faust partial convention so disconnected graphs are
/// scored over the reachable subset only: with `r` nodes reachable from `u` at
/// total distance `d`, `C(u) = (r / (n − 1)) · (r / d)`. Nodes reaching nothing
/// score 0.
pub fn closeness_centrality(graph: &SocialGraph, distance: DistanceMode) -> MetricResult {
    let g = &graph.graph;
    let n = g.node_count();
    let mut values = vec![0.0; n];

    if n > 1 {
        for source in g.node_indices() {
            let lengths =
                petgraph::algo::dijkstra(g, source, None, |e| distance.length(e.weight().weight));

            let mut reached: Vec<(usize, f64)> = lengths
                .into_iter()
                .filter(|(node, _)| *node != source)
                .map(|(node, d)| (node.index(), d))
                .collect();
            reached.sort_by_key(|(node, _)| *node);

            let r = reached.len() as f64;
            let total: f64 = reached.iter().map(|(_, d)| d).sum();
            if r > 0.0 && total > 0.0 {
                values[source.index()] = (r / (n - 1) as f64) * (r / total);
            }
        }
    }

    MetricResult::new("closeness_centrality", scores_by_id(graph, &values))
        .with_metadata("convention", "wasserman_faust_partial")
        .with_metadata("direction", "outgoing")
        .with_metadata("distance", distance.to_string())
}

// ============================================================================
// Betweenness
// ============================================================================

/// Betweenness centrality, normalized by `(n − 1)(n − 2)` for directed graphs.
///
/// Equal-length shortest paths split the credit proportionally to their count.
pub fn betweenness_centrality(graph: &SocialGraph, distance: DistanceMode) -> MetricResult {
    let values = match distance {
        DistanceMode::Hops => hop_betweenness(graph),
        DistanceMode::InverseWeight => weighted_betweenness(graph, distance),
    };

    MetricResult::new("betweenness_centrality", scores_by_id(graph, &values))
        .with_metadata("normalization", "1 / ((n - 1)(n - 2))")
        .with_metadata("distance", distance.to_string())
}

fn hop_betweenness(graph: &SocialGraph) -> Vec<f64> {
    let g = &graph.graph;
    if g.node_count() == 0 {
        return Vec::new();
    }
    let scores = rustworkx_core::centrality::betweenness_centrality(
        g, false, // include_endpoints
        true,  // normalized
        200,   // parallel_threshold (sequential for small graphs)
    );
    g.node_indices()
        .map(|idx| scores[idx.index()].unwrap_or(0.0))
        .collect()
}

/// Min-heap entry for Dijkstra; ties on distance resolve by node index.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    dist: f64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Brandes' algorithm with Dijkstra single-source phases.
fn weighted_betweenness(graph: &SocialGraph, distance: DistanceMode) -> Vec<f64> {
    let n = graph.node_count();
    let adj = outgoing(graph, |w| distance.length(w));
    let mut centrality = vec![0.0; n];

    for source in 0..n {
        let mut order: Vec<usize> = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist = vec![f64::INFINITY; n];
        let mut settled = vec![false; n];

        sigma[source] = 1.0;
        dist[source] = 0.0;
        let mut heap = BinaryHeap::new();
        heap.push(Frontier {
            dist: 0.0,
            node: source,
        });

        while let Some(Frontier { dist: d, node: v }) = heap.pop() {
            if settled[v] || d > dist[v] {
                continue;
            }
            settled[v] = true;
            order.push(v);

            for &(w, length) in &adj[v] {
                if settled[w] {
                    continue;
                }
                let candidate = dist[v] + length;
                if dist[w].is_infinite() || (candidate < dist[w] && !approx_eq(candidate, dist[w]))
                {
                    dist[w] = candidate;
                    sigma[w] = sigma[v];
                    preds[w].clear();
                    preds[w].push(v);
                    heap.push(Frontier {
                        dist: candidate,
                        node: w,
                    });
                } else if approx_eq(candidate, dist[w]) {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = order.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for c in centrality.iter_mut() {
            *c *= scale;
        }
    }
    centrality
}

// ============================================================================
// PageRank (power iteration)
// ============================================================================

/// Compute PageRank scores for all nodes in the graph.
///
/// Transition probabilities are proportional to edge weight over the source's
/// out-strength; dangling nodes spread their mass evenly. Iterates until the
/// L1 change drops below the tolerance or the iteration cap is hit. Scores are
/// normalized to sum to 1.
///
/// Hitting the cap yields [`Convergence::NotConverged`] with the best estimate,
/// or [`GraphError::NonConvergence`] when `fail_on_non_convergence` is set.
pub fn pagerank(graph: &SocialGraph, config: &AnalyticsConfig) -> Result<MetricResult, GraphError> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(MetricResult::new("pagerank", BTreeMap::new())
            .with_status(Convergence::Converged { iterations: 0 }));
    }

    let damping = config.pagerank_damping;
    let tolerance = config.pagerank_tolerance;
    let max_iter = config.pagerank_max_iterations;

    let out = outgoing(graph, |w| w);
    let out_strength: Vec<f64> = out
        .iter()
        .map(|edges| edges.iter().map(|(_, w)| w).sum())
        .collect();

    let mut scores: Vec<f64> = vec![1.0 / n as f64; n];
    let mut new_scores: Vec<f64> = vec![0.0; n];
    let mut status = Convergence::NotConverged {
        iterations: max_iter,
    };

    for iteration in 1..=max_iter {
        // Teleportation plus evenly spread dangling mass
        let dangling: f64 = (0..n)
            .filter(|&i| out_strength[i] <= 0.0)
            .map(|i| scores[i])
            .sum();
        let base = (1.0 - damping) / n as f64 + damping * dangling / n as f64;
        for s in new_scores.iter_mut() {
            *s = base;
        }

        for (i, edges) in out.iter().enumerate() {
            if out_strength[i] > 0.0 {
                let share = damping * scores[i] / out_strength[i];
                for &(j, w) in edges {
                    new_scores[j] += share * w;
                }
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(new_scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        std::mem::swap(&mut scores, &mut new_scores);

        if diff < tolerance {
            status = Convergence::Converged {
                iterations: iteration,
            };
            break;
        }
    }

    if !status.is_converged() {
        if config.fail_on_non_convergence {
            return Err(GraphError::NonConvergence {
                algorithm: "pagerank",
                iterations: max_iter,
            });
        }
        tracing::warn!(
            scope = %graph.scope,
            iterations = max_iter,
            "PageRank hit its iteration cap; returning best estimate"
        );
    }

    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    }

    Ok(MetricResult::new("pagerank", scores_by_id(graph, &scores))
        .with_status(status)
        .with_metadata("damping", damping.to_string())
        .with_metadata("tolerance", tolerance.to_string())
        .with_metadata("transition", "edge weight / source out-strength"))
}

// ============================================================================
// Density
// ============================================================================

/// Directed density: `edges / (n (n − 1))`, 0 for fewer than two nodes.
pub fn density(graph: &SocialGraph) -> f64 {
    let n = graph.node_count();
    if n < 2 {
        return 0.0;
    }
    graph.edge_count() as f64 / (n * (n - 1)) as f64
}

// ============================================================================
// Clustering Coefficient (undirected projection)
// ============================================================================

/// `(linked neighbour pairs, neighbour pairs)` per node on the undirected view.
fn neighbour_pair_counts(graph: &SocialGraph) -> Vec<(usize, usize)> {
    let neighbors = undirected_neighbors(graph);
    neighbors
        .iter()
        .map(|around| {
            let k = around.len();
            if k < 2 {
                return (0, 0);
            }
            let list: Vec<usize> = around.iter().copied().collect();
            let mut links = 0usize;
            for i in 0..list.len() {
                for j in (i + 1)..list.len() {
                    if neighbors[list[i]].contains(&list[j]) {
                        links += 1;
                    }
                }
            }
            (links, k * (k - 1) / 2)
        })
        .collect()
}

/// Local clustering coefficient per node, on the undirected projection.
///
/// Nodes with fewer than two neighbours score 0.
pub fn local_clustering(graph: &SocialGraph) -> MetricResult {
    let values: Vec<f64> = neighbour_pair_counts(graph)
        .into_iter()
        .map(|(links, pairs)| {
            if pairs > 0 {
                links as f64 / pairs as f64
            } else {
                0.0
            }
        })
        .collect();

    MetricResult::new("local_clustering", scores_by_id(graph, &values))
        .with_metadata("projection", "undirected")
}

/// Mean of the local coefficients over all nodes (zeros included).
pub fn average_clustering(graph: &SocialGraph) -> f64 {
    let local = local_clustering(graph);
    if local.scores.is_empty() {
        return 0.0;
    }
    local.scores.values().sum::<f64>() / local.scores.len() as f64
}

/// Global clustering coefficient (transitivity) on the undirected projection:
/// closed neighbour pairs over all neighbour pairs, i.e. 3 × triangles over
/// connected triples. 0 when the graph has no connected triple.
pub fn global_clustering_coefficient(graph: &SocialGraph) -> f64 {
    let (links, pairs) = neighbour_pair_counts(graph)
        .into_iter()
        .fold((0usize, 0usize), |(l, p), (links, pairs)| (l + links, p + pairs));
    if pairs == 0 {
        return 0.0;
    }
    links as f64 / pairs as f64
}

// ============================================================================
// Assortativity
// ============================================================================

/// Degree assortativity: Pearson correlation over directed edges between the
/// out-degree of the source and the in-degree of the target.
///
/// Fails with [`GraphError::InsufficientData`] on an edgeless graph, or when
/// either degree sequence is constant (the correlation is undefined, e.g. a
/// single edge).
pub fn assortativity(graph: &SocialGraph) -> Result<f64, GraphError> {
    let g = &graph.graph;
    if g.edge_count() == 0 {
        return Err(GraphError::InsufficientData {
            metric: "assortativity",
            requirement: "at least one edge",
        });
    }

    let outs: Vec<f64> = g
        .node_indices()
        .map(|idx| out_degree(graph, idx) as f64)
        .collect();
    let ins: Vec<f64> = g
        .node_indices()
        .map(|idx| in_degree(graph, idx) as f64)
        .collect();

    let (mut sx, mut sy, mut sx2, mut sy2, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for edge in g.edge_references() {
        let x = outs[edge.source().index()];
        let y = ins[edge.target().index()];
        sx += x;
        sy += y;
        sx2 += x * x;
        sy2 += y * y;
        sxy += x * y;
    }

    let m = g.edge_count() as f64;
    let numerator = m * sxy - sx * sy;
    let denominator = ((m * sx2 - sx * sx) * (m * sy2 - sy * sy)).sqrt();
    if denominator <= f64::EPSILON {
        return Err(GraphError::InsufficientData {
            metric: "assortativity",
            requirement: "variation in endpoint degrees",
        });
    }
    Ok(numerator / denominator)
}

// ============================================================================
// Weakly Connected Components
// ============================================================================

/// Identify weakly connected components (treating edges as undirected).
///
/// Component ids follow discovery order over node indices. Returns
/// `(node_to_component, components)` with components sorted largest first.
pub fn connected_components(graph: &SocialGraph) -> (BTreeMap<String, u32>, Vec<ComponentInfo>) {
    let g = &graph.graph;
    let n = g.node_count();
    if n == 0 {
        return (BTreeMap::new(), vec![]);
    }

    let mut component_of: Vec<Option<u32>> = vec![None; n];
    let mut component_id = 0u32;

    for start in g.node_indices() {
        if component_of[start.index()].is_some() {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        component_of[start.index()] = Some(component_id);

        while let Some(current) = queue.pop_front() {
            for neighbor in g.neighbors_undirected(current) {
                if component_of[neighbor.index()].is_none() {
                    component_of[neighbor.index()] = Some(component_id);
                    queue.push_back(neighbor);
                }
            }
        }
        component_id += 1;
    }

    let mut node_map = BTreeMap::new();
    let mut comp_members: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for idx in g.node_indices() {
        let id = g[idx].id.clone();
        let comp = component_of[idx.index()].unwrap_or(0);
        node_map.insert(id.clone(), comp);
        comp_members.entry(comp).or_default().push(id);
    }

    let mut components: Vec<ComponentInfo> = comp_members
        .into_iter()
        .map(|(id, mut members)| {
            members.sort();
            ComponentInfo {
                id,
                size: members.len(),
                is_main: false,
                members,
            }
        })
        .collect();
    components.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.id.cmp(&b.id)));
    // Ties on size go to the component discovered first
    if let Some(main) = components.first_mut() {
        main.is_main = true;
    }

    (node_map, components)
}

// ============================================================================
// Tests
// ============================================================================
