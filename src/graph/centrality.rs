//! Centrality measures.
//!
//! - **Degree**: neighbour count normalised by `n − 1`
//! - **Betweenness**: hop-count betweenness from `rustworkx-core`, plus a
//!   weighted variant over Dijkstra distances
//! - **Closeness / Harmonic**: from per-node BFS distances, safe on
//!   disconnected graphs
//! - **Eigenvector**: power iteration with a convergence test
//! - **Katz**: attenuated power iteration with bias and a tolerance early exit
//!
//! Every measure reads the model's adjacency as stored: undirected models see
//! symmetric neighbourhoods, directed models follow edge direction (degree,
//! BFS distances and betweenness use outgoing edges, eigenvector and Katz
//! accumulate over incoming edges).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::models::{rank_scores, scores_by_id, AnalyticsConfig, GraphModel, NodeId, RankedNode};
use super::shortest_path::distances_from;
use crate::error::{GraphError, Result};

/// Per-node scores plus the ranking derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityScores {
    pub scores: BTreeMap<NodeId, f64>,
    /// Sorted by score descending, ties by node id
    pub ranking: Vec<RankedNode>,
}

impl CentralityScores {
    fn from_dense(graph: &GraphModel, values: &[f64]) -> Self {
        let scores = scores_by_id(graph, values);
        let ranking = rank_scores(&scores);
        Self { scores, ranking }
    }
}

/// Scores from a power-iteration method, flagged with convergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterativeCentrality {
    pub scores: BTreeMap<NodeId, f64>,
    pub ranking: Vec<RankedNode>,
    pub iterations: usize,
    /// `false` when `max_iterations` was hit before the tolerance was met
    pub converged: bool,
}

impl IterativeCentrality {
    fn from_dense(graph: &GraphModel, values: &[f64], iterations: usize, converged: bool) -> Self {
        let CentralityScores { scores, ranking } = CentralityScores::from_dense(graph, values);
        Self {
            scores,
            ranking,
            iterations,
            converged,
        }
    }
}

/// `n − 1`, defined as 0 when `n ≤ 1`.
fn others(graph: &GraphModel) -> f64 {
    graph.node_count().saturating_sub(1) as f64
}

// ============================================================================
// Degree
// ============================================================================

/// Degree centrality: `|neighbors(v) \ {v}| / (n − 1)`, 0 when `n ≤ 1`.
pub fn degree_centrality(graph: &GraphModel) -> CentralityScores {
    let denom = others(graph);
    let values: Vec<f64> = (0..graph.node_count())
        .map(|i| {
            if denom == 0.0 {
                return 0.0;
            }
            let degree = graph.out_edges(i).iter().filter(|&&(j, _)| j != i).count();
            degree as f64 / denom
        })
        .collect();
    CentralityScores::from_dense(graph, &values)
}

// ============================================================================
// Betweenness
// ============================================================================

/// Run rustworkx-core sequentially so the summation order (and therefore
/// tie-breaking on the scores) does not depend on thread scheduling.
pub(crate) const SEQUENTIAL: usize = usize::MAX;

/// Betweenness centrality over hop-count shortest paths.
///
/// Uses `rustworkx_core::centrality::betweenness_centrality`, normalised by
/// `(n−1)(n−2)` on undirected graphs with `n > 2` and raw on directed graphs.
pub fn betweenness_centrality(graph: &GraphModel) -> CentralityScores {
    let scores = if graph.is_directed() {
        rustworkx_core::centrality::betweenness_centrality(&graph.to_petgraph(), false, false, SEQUENTIAL)
    } else {
        rustworkx_core::centrality::betweenness_centrality(
            &graph.to_undirected_petgraph(),
            false,
            true,
            SEQUENTIAL,
        )
    };
    let values: Vec<f64> = scores.into_iter().map(|s| s.unwrap_or(0.0)).collect();
    CentralityScores::from_dense(graph, &values)
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

/// Shortest-path search state: a node plus the nodes already visited at the
/// same distance (sorted). Zero-weight edges keep a path at one distance, so
/// the visited set is what keeps such detours simple.
type Step = (usize, Vec<usize>);

/// Add one source's pair dependencies to `scores`.
///
/// Shortest paths are counted as simple paths through a DAG of [`Step`]s.
/// With strictly positive weights every node has exactly one step and this is
/// Brandes' accumulation; zero-weight edges between equally distant nodes
/// add one step per simple detour, so the cost grows with the size of such
/// zero-weight groups.
fn weighted_dependencies(graph: &GraphModel, source: usize, scores: &mut [f64]) -> Result<()> {
    let dist = distances_from(graph, source)?;

    let mut steps: Vec<Step> = vec![(source, vec![source])];
    let mut index: HashMap<Step, usize> = HashMap::from([((source, vec![source]), 0)]);
    let mut children: Vec<Vec<usize>> = vec![Vec::new()];
    let mut next = 0;
    while next < steps.len() {
        let (v, level) = steps[next].clone();
        for &(w, weight) in graph.out_edges(v) {
            if w == v || !approx_eq(dist[v] + weight, dist[w]) {
                continue;
            }
            let step = if approx_eq(dist[v], dist[w]) {
                let Err(at) = level.binary_search(&w) else {
                    continue;
                };
                let mut visited = level.clone();
                visited.insert(at, w);
                (w, visited)
            } else {
                (w, vec![w])
            };
            let id = match index.get(&step) {
                Some(&id) => id,
                None => {
                    let id = steps.len();
                    index.insert(step.clone(), id);
                    steps.push(step);
                    children.push(Vec::new());
                    id
                }
            };
            children[next].push(id);
        }
        next += 1;
    }

    // Topological order of the step DAG (Kahn)
    let mut indegree = vec![0usize; steps.len()];
    for &c in children.iter().flatten() {
        indegree[c] += 1;
    }
    let mut order = Vec::with_capacity(steps.len());
    let mut ready = VecDeque::from([0]);
    while let Some(x) = ready.pop_front() {
        order.push(x);
        for &c in &children[x] {
            indegree[c] -= 1;
            if indegree[c] == 0 {
                ready.push_back(c);
            }
        }
    }

    let mut sigma = vec![0.0; steps.len()];
    sigma[0] = 1.0;
    for &x in &order {
        for &c in &children[x] {
            sigma[c] += sigma[x];
        }
    }
    let mut paths_to = vec![0.0; graph.node_count()];
    for (x, (v, _)) in steps.iter().enumerate() {
        paths_to[*v] += sigma[x];
    }

    // onward[x] = Σ over later steps y of (paths x -> y) / paths_to[node(y)]
    let mut onward = vec![0.0; steps.len()];
    for &x in order.iter().rev() {
        onward[x] = children[x]
            .iter()
            .map(|&c| 1.0 / paths_to[steps[c].0] + onward[c])
            .sum();
        let v = steps[x].0;
        if v != source {
            scores[v] += sigma[x] * onward[x];
        }
    }
    Ok(())
}

/// Betweenness centrality over weighted shortest paths.
///
/// Counts shortest simple paths, so equal-cost routes through zero-weight
/// edges share the dependency regardless of node order. Same normalisation
/// as [`betweenness_centrality`]. Fails with `InvalidWeight` on negative
/// weights.
pub fn weighted_betweenness_centrality(graph: &GraphModel) -> Result<CentralityScores> {
    let n = graph.node_count();
    let mut scores = vec![0.0; n];
    for s in 0..n {
        weighted_dependencies(graph, s, &mut scores)?;
    }
    if !graph.is_directed() && n > 2 {
        let scale = ((n - 1) * (n - 2)) as f64;
        for s in scores.iter_mut() {
            *s /= scale;
        }
    }
    Ok(CentralityScores::from_dense(graph, &scores))
}

// ============================================================================
// Closeness / Harmonic
// ============================================================================

/// Hop distances from `source`; `None` when unreachable.
pub(crate) fn bfs_distances(graph: &GraphModel, source: usize) -> Vec<Option<usize>> {
    let mut dist = vec![None; graph.node_count()];
    dist[source] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let dv = dist[v].unwrap_or(0);
        for &(w, _) in graph.out_edges(v) {
            if dist[w].is_none() {
                dist[w] = Some(dv + 1);
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Closeness centrality: `1 / mean(finite positive distances)`.
///
/// Nodes that reach nothing score 0.
pub fn closeness_centrality(graph: &GraphModel) -> CentralityScores {
    let values: Vec<f64> = (0..graph.node_count())
        .map(|v| {
            let (count, total) = bfs_distances(graph, v)
                .into_iter()
                .flatten()
                .filter(|&d| d > 0)
                .fold((0usize, 0usize), |(c, t), d| (c + 1, t + d));
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        })
        .collect();
    CentralityScores::from_dense(graph, &values)
}

/// Harmonic centrality: `Σ 1/d(v, u) / (n − 1)`; unreachable nodes add 0.
pub fn harmonic_centrality(graph: &GraphModel) -> CentralityScores {
    let denom = others(graph);
    let values: Vec<f64> = (0..graph.node_count())
        .map(|v| {
            if denom == 0.0 {
                return 0.0;
            }
            let sum: f64 = bfs_distances(graph, v)
                .into_iter()
                .flatten()
                .filter(|&d| d > 0)
                .map(|d| 1.0 / d as f64)
                .sum();
            sum / denom
        })
        .collect();
    CentralityScores::from_dense(graph, &values)
}

// ============================================================================
// Eigenvector
// ============================================================================

/// Power-iteration parameters for eigenvector centrality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenvectorOptions {
    /// Stop when the max per-node change falls below this (default: 1e-6)
    pub tolerance: f64,
    /// Default: 100
    pub max_iterations: usize,
}

impl Default for EigenvectorOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl From<&AnalyticsConfig> for EigenvectorOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            tolerance: config.eigenvector_tolerance,
            max_iterations: config.eigenvector_max_iterations,
        }
    }
}

pub(crate) fn l2_normalize(values: &mut [f64]) -> bool {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for v in values.iter_mut() {
        *v /= norm;
    }
    true
}

pub(crate) fn max_change(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Eigenvector centrality by power iteration over the weighted adjacency.
///
/// Each round computes `y = (A + I)·x` and L2-normalises it. The identity
/// shift keeps the dominant eigenvector while preventing the sign
/// oscillation plain iteration shows on bipartite graphs.
pub fn eigenvector_centrality(graph: &GraphModel, options: &EigenvectorOptions) -> IterativeCentrality {
    let n = graph.node_count();
    let mut x = vec![1.0 / (n as f64).sqrt(); n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;
        let mut y: Vec<f64> = (0..n)
            .map(|v| {
                x[v] + graph
                    .in_edges(v)
                    .iter()
                    .map(|&(u, w)| w * x[u])
                    .sum::<f64>()
            })
            .collect();
        if !l2_normalize(&mut y) {
            break;
        }
        let change = max_change(&x, &y);
        x = y;
        if change < options.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        tracing::debug!("eigenvector centrality converged after {} iterations", iterations);
    } else {
        tracing::warn!(
            "eigenvector centrality did not converge within {} iterations",
            options.max_iterations
        );
    }
    IterativeCentrality::from_dense(graph, &x, iterations, converged)
}

// ============================================================================
// Katz
// ============================================================================

/// Parameters for Katz centrality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KatzOptions {
    /// Attenuation factor (default: 0.1); must stay below `1/λ_max` to converge
    pub alpha: f64,
    /// Bias added to every node each round (default: 1.0)
    pub beta: f64,
    /// Default: 100
    pub max_iterations: usize,
    /// Early exit on max per-node change; 0.0 runs every iteration (default: 1e-6)
    pub tolerance: f64,
    /// L2-normalise the final scores (default: true)
    pub normalized: bool,
}

impl Default for KatzOptions {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 1.0,
            max_iterations: 100,
            tolerance: 1e-6,
            normalized: true,
        }
    }
}

impl From<&AnalyticsConfig> for KatzOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            alpha: config.katz_alpha,
            beta: config.katz_beta,
            max_iterations: config.katz_max_iterations,
            tolerance: config.katz_tolerance,
            normalized: true,
        }
    }
}

/// Katz centrality: iterate `x ← α·Σ_{u→v} w(u,v)·x(u) + β`.
///
/// Stops early once the max per-node change drops below `tolerance`. If the
/// iteration diverges the last finite iterate is returned with
/// `converged = false`.
pub fn katz_centrality(graph: &GraphModel, options: &KatzOptions) -> Result<IterativeCentrality> {
    if !options.alpha.is_finite() || options.alpha < 0.0 {
        return Err(GraphError::invalid_parameter("alpha", "must be a non-negative number"));
    }

    let n = graph.node_count();
    let mut x = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        let y: Vec<f64> = (0..n)
            .map(|v| {
                options.alpha
                    * graph
                        .in_edges(v)
                        .iter()
                        .map(|&(u, w)| w * x[u])
                        .sum::<f64>()
                    + options.beta
            })
            .collect();
        if y.iter().any(|v| !v.is_finite()) {
            tracing::warn!("katz centrality diverged after {} iterations (alpha = {})", iterations, options.alpha);
            break;
        }
        iterations += 1;
        let change = max_change(&x, &y);
        x = y;
        if change < options.tolerance {
            converged = true;
            break;
        }
    }

    if options.normalized {
        l2_normalize(&mut x);
    }
    if !converged && options.tolerance > 0.0 {
        tracing::warn!("katz centrality did not converge within {} iterations", iterations);
    }
    Ok(IterativeCentrality::from_dense(graph, &x, iterations, converged))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::Edge;

    fn star() -> GraphModel {
        GraphModel::build(
            &[Edge::new("X", "A"), Edge::new("X", "B"), Edge::new("X", "C")],
            false,
        )
        .unwrap()
    }

    fn chain(n: usize) -> GraphModel {
        let edges: Vec<Edge> = (0..n - 1)
            .map(|i| Edge::new(format!("n{}", i), format!("n{}", i + 1)))
            .collect();
        GraphModel::build(&edges, false).unwrap()
    }

    #[test]
    fn test_degree_star() {
        let dc = degree_centrality(&star());
        assert!((dc.scores["X"] - 1.0).abs() < 1e-12);
        for leaf in ["A", "B", "C"] {
            assert!((dc.scores[leaf] - 1.0 / 3.0).abs() < 1e-12);
        }
        assert_eq!(dc.ranking[0].node, "X");
    }

    #[test]
    fn test_degree_single_node_is_zero() {
        let g = GraphModel::build_with_nodes(&[], &["solo".to_string()], false).unwrap();
        assert_eq!(degree_centrality(&g).scores["solo"], 0.0);
        assert_eq!(harmonic_centrality(&g).scores["solo"], 0.0);
    }

    #[test]
    fn test_betweenness_three_chain() {
        let bc = betweenness_centrality(&chain(3));
        assert!(bc.scores["n1"] > 0.0);
        assert_eq!(bc.scores["n0"], 0.0);
        assert_eq!(bc.scores["n2"], 0.0);
        assert!((bc.scores["n1"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_betweenness_five_chain_middle_highest() {
        let bc = betweenness_centrality(&chain(5));
        assert!((bc.scores["n2"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((bc.scores["n1"] - 0.5).abs() < 1e-12);
        assert_eq!(bc.ranking[0].node, "n2");
    }

    #[test]
    fn test_betweenness_directed_is_raw() {
        let g = GraphModel::build(&[Edge::new("a", "b"), Edge::new("b", "c")], true).unwrap();
        let bc = betweenness_centrality(&g);
        assert!((bc.scores["b"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_betweenness_splits_over_equal_paths() {
        // Square a-b-d, a-c-d: b and c share the a<->d pair
        let g = GraphModel::build(
            &[
                Edge::new("a", "b"),
                Edge::new("b", "d"),
                Edge::new("a", "c"),
                Edge::new("c", "d"),
            ],
            false,
        )
        .unwrap();
        let bc = betweenness_centrality(&g);
        assert!((bc.scores["b"] - bc.scores["c"]).abs() < 1e-12);
        assert!(bc.scores["b"] > 0.0);
    }

    #[test]
    fn test_weighted_betweenness_follows_cheap_route() {
        // a-d direct is expensive, a-b-c-d is cheap
        let g = GraphModel::build(
            &[
                Edge::weighted("a", "d", 10.0),
                Edge::weighted("a", "b", 1.0),
                Edge::weighted("b", "c", 1.0),
                Edge::weighted("c", "d", 1.0),
            ],
            false,
        )
        .unwrap();
        let hop = betweenness_centrality(&g);
        let weighted = weighted_betweenness_centrality(&g).unwrap();
        assert!(weighted.scores["b"] > hop.scores["b"]);
    }

    #[test]
    fn test_weighted_betweenness_rejects_negative() {
        let g = GraphModel::build(&[Edge::weighted("a", "b", -1.0)], false).unwrap();
        assert!(weighted_betweenness_centrality(&g).is_err());
    }

    #[test]
    fn test_weighted_betweenness_zero_weight_edge_is_symmetric() {
        // a and b are interchangeable: each lies on one of the two cheapest
        // routes between the other and c
        let g = GraphModel::build(
            &[
                Edge::weighted("a", "b", 0.0),
                Edge::weighted("a", "c", 1.0),
                Edge::weighted("b", "c", 1.0),
            ],
            false,
        )
        .unwrap();
        let bc = weighted_betweenness_centrality(&g).unwrap();
        assert!((bc.scores["a"] - 0.5).abs() < 1e-12);
        assert!((bc.scores["b"] - 0.5).abs() < 1e-12);
        assert_eq!(bc.scores["c"], 0.0);
    }

    #[test]
    fn test_weighted_betweenness_zero_weight_directed() {
        // s -> t directly or through a at the same cost
        let g = GraphModel::build(
            &[
                Edge::weighted("s", "a", 0.0),
                Edge::weighted("a", "t", 1.0),
                Edge::weighted("s", "t", 1.0),
            ],
            true,
        )
        .unwrap();
        let bc = weighted_betweenness_centrality(&g).unwrap();
        assert!((bc.scores["a"] - 0.5).abs() < 1e-12);
        assert_eq!(bc.scores["s"], 0.0);
        assert_eq!(bc.scores["t"], 0.0);
    }

    #[test]
    fn test_weighted_betweenness_unit_weights_match_hop_counts() {
        let g = GraphModel::build(
            &[
                Edge::new("a", "b"),
                Edge::new("b", "d"),
                Edge::new("a", "c"),
                Edge::new("c", "d"),
                Edge::new("d", "e"),
            ],
            false,
        )
        .unwrap();
        let hop = betweenness_centrality(&g);
        let weighted = weighted_betweenness_centrality(&g).unwrap();
        for (id, score) in &hop.scores {
            assert!((weighted.scores[id] - score).abs() < 1e-12, "node {}", id);
        }
    }

    #[test]
    fn test_closeness_disconnected_has_no_infinities() {
        let g = GraphModel::build_with_nodes(
            &[Edge::new("a", "b"), Edge::new("b", "c")],
            &["island".to_string()],
            false,
        )
        .unwrap();
        let cc = closeness_centrality(&g);
        assert_eq!(cc.scores["island"], 0.0);
        assert!((cc.scores["b"] - 1.0).abs() < 1e-12);
        assert!((cc.scores["a"] - 2.0 / 3.0).abs() < 1e-12);
        assert!(cc.scores.values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_harmonic_disconnected() {
        let g = GraphModel::build_with_nodes(
            &[Edge::new("a", "b")],
            &["island".to_string()],
            false,
        )
        .unwrap();
        let hc = harmonic_centrality(&g);
        assert!((hc.scores["a"] - 0.5).abs() < 1e-12);
        assert_eq!(hc.scores["island"], 0.0);
    }

    #[test]
    fn test_eigenvector_star_converges_center_highest() {
        let ec = eigenvector_centrality(&star(), &EigenvectorOptions::default());
        assert!(ec.converged);
        assert_eq!(ec.ranking[0].node, "X");
        let norm: f64 = ec.scores.values().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        // Leaves are symmetric
        assert!((ec.scores["A"] - ec.scores["B"]).abs() < 1e-9);
    }

    #[test]
    fn test_eigenvector_reports_non_convergence() {
        let options = EigenvectorOptions {
            tolerance: 1e-15,
            max_iterations: 2,
        };
        let ec = eigenvector_centrality(&chain(6), &options);
        assert!(!ec.converged);
        assert_eq!(ec.iterations, 2);
    }

    #[test]
    fn test_katz_converges_with_small_alpha() {
        let kc = katz_centrality(&star(), &KatzOptions::default()).unwrap();
        assert!(kc.converged);
        assert!(kc.iterations < 100);
        assert_eq!(kc.ranking[0].node, "X");
    }

    #[test]
    fn test_katz_zero_tolerance_runs_fixed_iterations() {
        let options = KatzOptions {
            tolerance: 0.0,
            max_iterations: 25,
            ..KatzOptions::default()
        };
        let kc = katz_centrality(&star(), &options).unwrap();
        assert_eq!(kc.iterations, 25);
        assert!(!kc.converged);
    }

    #[test]
    fn test_katz_divergent_alpha_not_converged() {
        // λ_max of K4 is 3; alpha = 2 diverges quickly
        let mut edges = Vec::new();
        for a in 0..4 {
            for b in (a + 1)..4 {
                edges.push(Edge::new(format!("k{}", a), format!("k{}", b)));
            }
        }
        let g = GraphModel::build(&edges, false).unwrap();
        let options = KatzOptions {
            alpha: 2.0,
            max_iterations: 10_000,
            ..KatzOptions::default()
        };
        let kc = katz_centrality(&g, &options).unwrap();
        assert!(!kc.converged);
        assert!(kc.scores.values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_katz_rejects_negative_alpha() {
        let options = KatzOptions {
            alpha: -0.5,
            ..KatzOptions::default()
        };
        assert!(katz_centrality(&star(), &options).is_err());
    }
}
