//! Community detection.
//!
//! - **Louvain**: greedy modularity optimisation with community aggregation
//! - **Label propagation**: weighted majority labels, seeded visiting order
//! - **Girvan–Newman**: divisive removal of the highest-betweenness edge
//! - **Agglomerative clustering**: hop-distance merging with a [`Linkage`]
//! - **Weakly connected components**
//!
//! Every method works on the undirected view of the model (directed edges are
//! symmetrised, antiparallel weights summed, self loops ignored) and returns
//! communities numbered densely from 0 in order of their smallest member.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use super::centrality::SEQUENTIAL;
use super::models::{
    AnalyticsConfig, Community, CommunityResult, ComponentInfo, GraphModel, NodeId,
};
use crate::error::{GraphError, Result};

// ============================================================================
// Undirected view + shared helpers
// ============================================================================

/// Symmetric adjacency with node strengths and `2m`.
struct UndirectedView {
    adj: Vec<Vec<(usize, f64)>>,
    strength: Vec<f64>,
    m2: f64,
}

impl UndirectedView {
    fn new(graph: &GraphModel) -> Self {
        let adj = graph.undirected_adjacency();
        let strength: Vec<f64> = adj
            .iter()
            .map(|list| list.iter().map(|&(_, w)| w).sum())
            .collect();
        let m2 = strength.iter().sum();
        Self { adj, strength, m2 }
    }

    /// Newman modularity of a dense assignment.
    fn modularity(&self, assignment: &[usize]) -> f64 {
        if self.m2 == 0.0 {
            return 0.0;
        }
        let groups = assignment.iter().copied().max().map_or(0, |m| m + 1);
        let mut internal = vec![0.0; groups];
        let mut total = vec![0.0; groups];
        for (i, list) in self.adj.iter().enumerate() {
            total[assignment[i]] += self.strength[i];
            for &(j, w) in list {
                if assignment[i] == assignment[j] {
                    internal[assignment[i]] += w;
                }
            }
        }
        internal
            .iter()
            .zip(&total)
            .map(|(inside, tot)| inside - tot * tot / self.m2)
            .sum::<f64>()
            / self.m2
    }
}

/// Renumber labels densely in order of first appearance by node index.
fn dense_labels(labels: &[usize]) -> Vec<usize> {
    let mut remap: BTreeMap<usize, usize> = BTreeMap::new();
    labels
        .iter()
        .map(|&label| {
            let next = remap.len();
            *remap.entry(label).or_insert(next)
        })
        .collect()
}

fn partition_result(
    graph: &GraphModel,
    view: &UndirectedView,
    labels: &[usize],
    iterations: usize,
) -> CommunityResult {
    let assignment = dense_labels(labels);
    let groups = assignment.iter().copied().max().map_or(0, |m| m + 1);

    let mut members: Vec<Vec<NodeId>> = vec![Vec::new(); groups];
    let mut node_to_community = BTreeMap::new();
    for (i, &c) in assignment.iter().enumerate() {
        members[c].push(graph.id(i).to_string());
        node_to_community.insert(graph.id(i).to_string(), c as u32);
    }
    let communities = members
        .into_iter()
        .enumerate()
        .map(|(id, nodes)| Community {
            id: id as u32,
            size: nodes.len(),
            nodes,
        })
        .collect();

    CommunityResult {
        communities,
        node_to_community,
        modularity: view.modularity(&assignment),
        iterations,
    }
}

/// Newman modularity `Q` of a community assignment on the undirected view.
///
/// Every node must be assigned; community ids need not be dense.
pub fn modularity(graph: &GraphModel, node_to_community: &BTreeMap<NodeId, u32>) -> Result<f64> {
    let labels = graph
        .ids()
        .iter()
        .map(|id| {
            node_to_community
                .get(id)
                .map(|&c| c as usize)
                .ok_or_else(|| {
                    GraphError::invalid_parameter("node_to_community", format!("node {} has no community", id))
                })
        })
        .collect::<Result<Vec<usize>>>()?;
    let view = UndirectedView::new(graph);
    Ok(view.modularity(&dense_labels(&labels)))
}

// ============================================================================
// Louvain
// ============================================================================

/// Parameters for Louvain community detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LouvainOptions {
    /// Resolution (default: 1.0, higher = smaller communities)
    pub resolution: f64,
    /// Maximum local-moving passes over all levels (default: 100)
    pub max_iterations: usize,
    /// Maximum aggregation levels (default: 32)
    pub max_levels: usize,
}

impl Default for LouvainOptions {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_iterations: 100,
            max_levels: 32,
        }
    }
}

impl From<&AnalyticsConfig> for LouvainOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            resolution: config.louvain_resolution,
            max_iterations: config.louvain_max_iterations,
            ..Self::default()
        }
    }
}

/// One Louvain level: neighbour lists without self loops plus the weight of
/// each node's internal (self-loop) edges.
struct Level {
    adj: Vec<Vec<(usize, f64)>>,
    loops: Vec<f64>,
}

impl Level {
    fn strengths(&self) -> Vec<f64> {
        self.adj
            .iter()
            .zip(&self.loops)
            .map(|(list, l)| list.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * l)
            .collect()
    }

    /// Collapse every community into a single node.
    fn aggregate(&self, community: &[usize], groups: usize) -> Level {
        let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); groups];
        let mut loops = vec![0.0; groups];
        for (i, list) in self.adj.iter().enumerate() {
            let ci = community[i];
            loops[ci] += self.loops[i];
            for &(j, w) in list {
                let cj = community[j];
                if ci == cj {
                    // each internal edge is seen from both endpoints
                    loops[ci] += w / 2.0;
                } else {
                    *merged[ci].entry(cj).or_insert(0.0) += w;
                }
            }
        }
        Level {
            adj: merged.into_iter().map(|m| m.into_iter().collect()).collect(),
            loops,
        }
    }
}

/// Greedy local moving on one level, at most `budget` passes. Returns the
/// (dense) community of every node and the number of passes made.
fn local_moving(level: &Level, m2: f64, resolution: f64, budget: usize) -> (Vec<usize>, usize) {
    let n = level.adj.len();
    let strengths = level.strengths();
    let mut community: Vec<usize> = (0..n).collect();
    let mut comm_total: Vec<f64> = strengths.clone();

    let mut improved = true;
    let mut passes = 0;

    while improved && passes < budget {
        improved = false;
        passes += 1;

        for node in 0..n {
            let current = community[node];

            // Weight from this node to each neighbouring community, in id order
            let mut comm_weights: BTreeMap<usize, f64> = BTreeMap::new();
            for &(neighbor, w) in &level.adj[node] {
                *comm_weights.entry(community[neighbor]).or_insert(0.0) += w;
            }

            let ki = strengths[node];
            let w_in_current = comm_weights.get(&current).copied().unwrap_or(0.0);
            let remove_cost = w_in_current / m2
                - resolution * ki * (comm_total[current] - ki) / (m2 * m2);

            let mut best = current;
            let mut best_gain = 0.0;
            for (&target, &w_to_target) in &comm_weights {
                if target == current {
                    continue;
                }
                let insert_cost =
                    w_to_target / m2 - resolution * ki * comm_total[target] / (m2 * m2);
                let gain = insert_cost - remove_cost;
                if gain > best_gain {
                    best_gain = gain;
                    best = target;
                }
            }

            if best != current {
                comm_total[current] -= ki;
                comm_total[best] += ki;
                community[node] = best;
                improved = true;
            }
        }
    }

    (dense_labels(&community), passes)
}

/// Detect communities with the Louvain method.
///
/// Each level moves nodes greedily to the neighbouring community with the best
/// strictly positive modularity gain until a pass moves nothing, then
/// collapses communities into super-nodes and repeats until a level merges
/// nothing. `max_iterations` bounds the local-moving passes summed over all
/// levels, and `iterations` in the result reports that sum.
pub fn louvain(graph: &GraphModel, options: &LouvainOptions) -> CommunityResult {
    let view = UndirectedView::new(graph);
    let n = graph.node_count();

    if view.m2 == 0.0 {
        let labels: Vec<usize> = (0..n).collect();
        return partition_result(graph, &view, &labels, 0);
    }

    let mut level = Level {
        adj: view.adj.clone(),
        loops: vec![0.0; n],
    };
    let mut membership: Vec<usize> = (0..n).collect();
    let mut iterations = 0;

    for depth in 0..options.max_levels {
        let budget = options.max_iterations.saturating_sub(iterations);
        if budget == 0 {
            break;
        }
        let (community, passes) = local_moving(&level, view.m2, options.resolution, budget);
        iterations += passes;

        let groups = community.iter().copied().max().map_or(0, |m| m + 1);
        for m in membership.iter_mut() {
            *m = community[*m];
        }
        tracing::debug!(
            "louvain level {}: {} nodes -> {} communities in {} passes",
            depth,
            level.adj.len(),
            groups,
            passes
        );
        if groups == level.adj.len() {
            break;
        }
        level = level.aggregate(&community, groups);
    }

    partition_result(graph, &view, &membership, iterations)
}

// ============================================================================
// Label propagation
// ============================================================================

/// Parameters for label propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPropagationOptions {
    /// Default: 100
    pub max_iterations: usize,
    /// Seed for the per-pass visiting order (default: 42)
    pub seed: u64,
}

impl Default for LabelPropagationOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            seed: 42,
        }
    }
}

impl From<&AnalyticsConfig> for LabelPropagationOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            max_iterations: config.label_propagation_max_iterations,
            seed: config.label_propagation_seed,
        }
    }
}

/// Label propagation: every node adopts the label with the largest summed
/// edge weight among its neighbours.
///
/// Nodes are visited in a seeded pseudo-random order each pass. Ties keep the
/// node's current label when it is among the best, otherwise the smallest
/// label wins. Stops after a pass with no change or `max_iterations` passes.
pub fn label_propagation(graph: &GraphModel, options: &LabelPropagationOptions) -> CommunityResult {
    let view = UndirectedView::new(graph);
    let n = graph.node_count();
    let mut labels: Vec<usize> = (0..n).collect();
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        order.shuffle(&mut rng);
        let mut changed = false;

        for &v in &order {
            if view.adj[v].is_empty() {
                continue;
            }
            let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
            for &(u, w) in &view.adj[v] {
                *weights.entry(labels[u]).or_insert(0.0) += w;
            }
            let best_weight = weights.values().copied().fold(f64::NEG_INFINITY, f64::max);
            let is_best = |w: f64| (best_weight - w).abs() <= 1e-12 * best_weight.abs().max(1.0);

            let keep = weights.get(&labels[v]).is_some_and(|&w| is_best(w));
            if keep {
                continue;
            }
            if let Some((&label, _)) = weights.iter().find(|(_, w)| is_best(**w)) {
                labels[v] = label;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    tracing::debug!("label propagation finished after {} passes", iterations);
    partition_result(graph, &view, &labels, iterations)
}

// ============================================================================
// Connected components
// ============================================================================

fn component_labels_of(adj: &[Vec<(usize, f64)>]) -> Vec<usize> {
    let mut uf = UnionFind::new(adj.len());
    for (i, list) in adj.iter().enumerate() {
        for &(j, _) in list {
            uf.union(i, j);
        }
    }
    dense_labels(&uf.into_labeling())
}

/// Dense weakly-connected component id per node index.
pub(crate) fn component_labels(graph: &GraphModel) -> Vec<usize> {
    component_labels_of(&graph.undirected_adjacency())
}

/// Weakly connected components, largest first (ties by smallest member).
pub fn connected_components(graph: &GraphModel) -> Vec<ComponentInfo> {
    let labels = component_labels(graph);
    let groups = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut members: Vec<Vec<NodeId>> = vec![Vec::new(); groups];
    for (i, &c) in labels.iter().enumerate() {
        members[c].push(graph.id(i).to_string());
    }

    let mut components: Vec<ComponentInfo> = members
        .into_iter()
        .enumerate()
        .map(|(id, members)| ComponentInfo {
            id: id as u32,
            size: members.len(),
            is_main: false,
            members,
        })
        .collect();
    // stable: equal sizes stay in smallest-member order
    components.sort_by_key(|c| std::cmp::Reverse(c.size));
    if let Some(main) = components.first_mut() {
        main.is_main = true;
    }
    components
}

// ============================================================================
// Girvan–Newman
// ============================================================================

/// Parameters for Girvan–Newman clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GirvanNewmanOptions {
    /// Stop once this many components exist (default: 2)
    pub target_communities: usize,
    /// Optional cap on removed edges
    pub max_removals: Option<usize>,
}

impl Default for GirvanNewmanOptions {
    fn default() -> Self {
        Self {
            target_communities: 2,
            max_removals: None,
        }
    }
}

/// Girvan–Newman partition plus the edges removed to reach it, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GirvanNewmanResult {
    pub communities: CommunityResult,
    pub removed_edges: Vec<(NodeId, NodeId)>,
}

/// Hop-count edge betweenness of the remaining edges, keyed by `(u, v)` with
/// `u < v`.
fn edge_betweenness(adj: &[BTreeMap<usize, f64>]) -> BTreeMap<(usize, usize), f64> {
    let mut g = UnGraph::<(), ()>::with_capacity(adj.len(), 0);
    for _ in 0..adj.len() {
        g.add_node(());
    }
    let mut pairs = Vec::new();
    for (u, neighbours) in adj.iter().enumerate() {
        for &v in neighbours.keys().filter(|&&v| v > u) {
            g.add_edge(NodeIndex::new(u), NodeIndex::new(v), ());
            pairs.push((u, v));
        }
    }
    // scores are indexed by edge insertion order
    let scores = rustworkx_core::centrality::edge_betweenness_centrality(&g, false, SEQUENTIAL);
    pairs
        .into_iter()
        .zip(scores)
        .map(|(pair, score)| (pair, score.unwrap_or(0.0)))
        .collect()
}

/// Divisive clustering: repeatedly remove the edge with the highest
/// betweenness (ties: smallest endpoint pair) until `target_communities`
/// components exist or no edges remain.
///
/// Edge betweenness is recomputed from scratch after every removal, O(V·E)
/// each time; intended for small to medium graphs.
pub fn girvan_newman(graph: &GraphModel, options: &GirvanNewmanOptions) -> Result<GirvanNewmanResult> {
    if options.target_communities == 0 {
        return Err(GraphError::invalid_parameter("target_communities", "must be at least 1"));
    }

    let view = UndirectedView::new(graph);
    let mut work: Vec<BTreeMap<usize, f64>> = view
        .adj
        .iter()
        .map(|list| list.iter().copied().collect())
        .collect();
    let as_lists = |work: &[BTreeMap<usize, f64>]| -> Vec<Vec<(usize, f64)>> {
        work.iter()
            .map(|m| m.iter().map(|(&j, &w)| (j, w)).collect())
            .collect()
    };

    let mut labels = component_labels_of(&view.adj);
    let mut removed: Vec<(NodeId, NodeId)> = Vec::new();
    let cap = options.max_removals.unwrap_or(usize::MAX);

    loop {
        let count = labels.iter().copied().max().map_or(0, |m| m + 1);
        if count >= options.target_communities || removed.len() >= cap {
            break;
        }
        let scores = edge_betweenness(&work);
        let mut best: Option<((usize, usize), f64)> = None;
        for (&edge, &score) in &scores {
            match best {
                Some((_, top)) if score <= top + 1e-9 * top.abs().max(1.0) => {}
                _ => best = Some((edge, score)),
            }
        }
        let Some(((u, v), _)) = best else {
            break;
        };

        work[u].remove(&v);
        work[v].remove(&u);
        removed.push((graph.id(u).to_string(), graph.id(v).to_string()));
        labels = component_labels_of(&as_lists(&work));
    }

    tracing::debug!("girvan-newman removed {} edges", removed.len());
    Ok(GirvanNewmanResult {
        communities: partition_result(graph, &view, &labels, removed.len()),
        removed_edges: removed,
    })
}

// ============================================================================
// Agglomerative clustering
// ============================================================================

/// Inter-cluster distance rule for agglomerative clustering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Closest pair of members
    Single,
    /// Farthest pair of members
    Complete,
    /// Mean over all member pairs
    #[default]
    Average,
}

impl std::str::FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            _ => Err(format!("unknown linkage: {}", s)),
        }
    }
}

fn hop_distances(adj: &[Vec<(usize, f64)>], source: usize) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; adj.len()];
    dist[source] = 0.0;
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        for &(w, _) in &adj[v] {
            if dist[w].is_infinite() {
                dist[w] = dist[v] + 1.0;
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Agglomerative clustering on hop distance.
///
/// Starts from singletons and merges the closest pair of clusters under
/// `linkage` until `target_clusters` remain or every remaining pair is
/// disconnected.
pub fn hierarchical_clustering(
    graph: &GraphModel,
    target_clusters: usize,
    linkage: Linkage,
) -> Result<CommunityResult> {
    if target_clusters == 0 {
        return Err(GraphError::invalid_parameter("target_clusters", "must be at least 1"));
    }

    let view = UndirectedView::new(graph);
    let n = graph.node_count();
    let mut distance: Vec<Vec<f64>> = (0..n).map(|s| hop_distances(&view.adj, s)).collect();
    let mut sizes = vec![1usize; n];
    let mut alive: Vec<bool> = vec![true; n];
    let mut labels: Vec<usize> = (0..n).collect();
    let mut remaining = n;
    let mut merges = 0;

    while remaining > target_clusters {
        let mut best: Option<(usize, usize, f64)> = None;
        for a in (0..n).filter(|&a| alive[a]) {
            for b in ((a + 1)..n).filter(|&b| alive[b]) {
                let d = distance[a][b];
                if d.is_finite() && best.map_or(true, |(_, _, top)| d < top) {
                    best = Some((a, b, d));
                }
            }
        }
        let Some((a, b, _)) = best else {
            break;
        };

        // Lance–Williams update of the merged cluster's distances
        for c in (0..n).filter(|&c| alive[c] && c != a && c != b) {
            let (da, db) = (distance[a][c], distance[b][c]);
            let merged = match linkage {
                Linkage::Single => da.min(db),
                Linkage::Complete => da.max(db),
                Linkage::Average => {
                    (da * sizes[a] as f64 + db * sizes[b] as f64) / (sizes[a] + sizes[b]) as f64
                }
            };
            distance[a][c] = merged;
            distance[c][a] = merged;
        }
        sizes[a] += sizes[b];
        alive[b] = false;
        for label in labels.iter_mut() {
            if *label == b {
                *label = a;
            }
        }
        remaining -= 1;
        merges += 1;
    }

    tracing::debug!("agglomerative clustering ({:?}) made {} merges", linkage, merges);
    Ok(partition_result(graph, &view, &labels, merges))
}

// ============================================================================
// Tests
// ============================================================================
