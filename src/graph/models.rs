//! Graph analytics data models.
//!
//! Defines the type system shared by every analytics component:
//!
//! ## Input types
//! - [`Edge`]: a weighted relationship supplied by the caller
//! - [`GraphBuilder`]: incremental construction with explicit nodes and metadata
//! - [`GraphModel`]: immutable, index-based weighted adjacency built once per call
//!
//! ## Output types
//! - [`RankedNode`]: one entry of a score ranking
//! - [`Community`] / [`CommunityResult`]: a partition of the node set
//! - [`ComponentInfo`]: metadata about a weakly connected component
//! - [`NodeMetrics`] / [`GraphAnalytics`]: aggregated result of a summary run
//!
//! ## Configuration
//! - [`AnalyticsConfig`]: default parameters for every algorithm

use petgraph::graph::{DiGraph, UnGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::{GraphError, Result};

/// Opaque node identifier.
pub type NodeId = String;

fn default_weight() -> f64 {
    1.0
}

// ============================================================================
// Input types
// ============================================================================

/// A relationship between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Edge weight (default: 1.0)
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Caller data threaded through to path results unmodified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Edge {
    /// Unit-weight edge.
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::weighted(from, to, 1.0)
    }

    pub fn weighted(from: impl Into<NodeId>, to: impl Into<NodeId>, weight: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            weight,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Incremental builder for a [`GraphModel`].
///
/// Nodes and edges may be added in any order; the built model sorts nodes by
/// id so that every algorithm iterates deterministically.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    directed: bool,
    nodes: BTreeMap<NodeId, Option<Value>>,
    weights: BTreeMap<(NodeId, NodeId), f64>,
    edge_metadata: BTreeMap<(NodeId, NodeId), Value>,
}

impl GraphBuilder {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            nodes: BTreeMap::new(),
            weights: BTreeMap::new(),
            edge_metadata: BTreeMap::new(),
        }
    }

    /// Add a node without metadata. Adding an existing node is a no-op.
    pub fn add_node(&mut self, id: impl Into<NodeId>) -> &mut Self {
        self.nodes.entry(id.into()).or_insert(None);
        self
    }

    /// Add a node carrying opaque metadata (replaces earlier metadata).
    pub fn add_node_with_metadata(&mut self, id: impl Into<NodeId>, metadata: Value) -> &mut Self {
        self.nodes.insert(id.into(), Some(metadata));
        self
    }

    /// Add an edge; both endpoints become nodes. Duplicate edges between the
    /// same pair sum their weights.
    pub fn add_edge(&mut self, edge: Edge) -> Result<&mut Self> {
        if !edge.weight.is_finite() {
            return Err(GraphError::InvalidWeight {
                from: edge.from,
                to: edge.to,
                weight: edge.weight,
            });
        }
        self.nodes.entry(edge.from.clone()).or_insert(None);
        self.nodes.entry(edge.to.clone()).or_insert(None);

        let key = if !self.directed && edge.to < edge.from {
            (edge.to, edge.from)
        } else {
            (edge.from, edge.to)
        };
        if let Some(metadata) = edge.metadata {
            self.edge_metadata.insert(key.clone(), metadata);
        }
        *self.weights.entry(key).or_insert(0.0) += edge.weight;
        Ok(self)
    }

    /// Freeze the builder into an immutable model.
    pub fn build(&self) -> Result<GraphModel> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let n = self.nodes.len();
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        let index: HashMap<NodeId, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let node_metadata: Vec<Option<Value>> = self.nodes.values().cloned().collect();

        let mut out_adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut in_adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut total_weight = 0.0;

        for ((from, to), &w) in &self.weights {
            let (a, b) = (index[from], index[to]);
            out_adj[a].push((b, w));
            in_adj[b].push((a, w));
            if self.directed {
                total_weight += w;
            } else {
                if a != b {
                    out_adj[b].push((a, w));
                    in_adj[a].push((b, w));
                }
                total_weight += 2.0 * w;
            }
        }
        for list in out_adj.iter_mut().chain(in_adj.iter_mut()) {
            list.sort_by_key(|&(j, _)| j);
        }

        let edge_metadata = self
            .edge_metadata
            .iter()
            .map(|((from, to), v)| ((index[from], index[to]), v.clone()))
            .collect();

        Ok(GraphModel {
            directed: self.directed,
            ids,
            index,
            node_metadata,
            out_adj,
            in_adj,
            edge_metadata,
            total_weight,
            edge_count: self.weights.len(),
        })
    }
}

// ============================================================================
// GraphModel: immutable weighted adjacency
// ============================================================================

/// Immutable weighted adjacency shared by every analytics component.
///
/// Nodes are stored sorted by id and addressed internally by dense index;
/// neighbour lists are sorted by neighbour index. Undirected models store
/// each edge in both directions.
#[derive(Debug, Clone)]
pub struct GraphModel {
    directed: bool,
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    node_metadata: Vec<Option<Value>>,
    out_adj: Vec<Vec<(usize, f64)>>,
    in_adj: Vec<Vec<(usize, f64)>>,
    edge_metadata: HashMap<(usize, usize), Value>,
    total_weight: f64,
    edge_count: usize,
}

impl GraphModel {
    /// Build a model from an edge list.
    pub fn build(edges: &[Edge], directed: bool) -> Result<Self> {
        Self::build_with_nodes(edges, &[], directed)
    }

    /// Build a model from an edge list plus explicit (possibly isolated) nodes.
    pub fn build_with_nodes(edges: &[Edge], nodes: &[NodeId], directed: bool) -> Result<Self> {
        let mut builder = GraphBuilder::new(directed);
        for id in nodes {
            builder.add_node(id.clone());
        }
        for edge in edges {
            builder.add_edge(edge.clone())?;
        }
        builder.build()
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of distinct relationships (unordered pairs when undirected).
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Twice the summed edge weight when undirected, the summed weight when directed.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Outgoing neighbours of `id` with edge weights, sorted by id.
    /// Unknown ids have no neighbours.
    pub fn neighbors(&self, id: &str) -> Vec<(&str, f64)> {
        match self.index.get(id) {
            Some(&i) => self.out_adj[i]
                .iter()
                .map(|&(j, w)| (self.ids[j].as_str(), w))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Weight of the edge `from -> to`, if present.
    pub fn weight(&self, from: &str, to: &str) -> Option<f64> {
        let a = *self.index.get(from)?;
        let b = *self.index.get(to)?;
        self.edge_weight(a, b)
    }

    pub fn node_metadata(&self, id: &str) -> Option<&Value> {
        let i = *self.index.get(id)?;
        self.node_metadata[i].as_ref()
    }

    pub fn edge_metadata(&self, from: &str, to: &str) -> Option<&Value> {
        let a = *self.index.get(from)?;
        let b = *self.index.get(to)?;
        self.edge_metadata_at(a, b)
    }

    /// Export as a petgraph `DiGraph`; `NodeIndex(i)` is model node `i`.
    /// Undirected models export both directions of every edge.
    pub fn to_petgraph(&self) -> DiGraph<NodeId, f64> {
        let mut g = DiGraph::with_capacity(self.node_count(), self.out_adj.iter().map(Vec::len).sum());
        let indices: Vec<_> = self.ids.iter().map(|id| g.add_node(id.clone())).collect();
        for (i, neighbors) in self.out_adj.iter().enumerate() {
            for &(j, w) in neighbors {
                g.add_edge(indices[i], indices[j], w);
            }
        }
        g
    }

    /// Export as a petgraph `UnGraph` with one edge per relationship.
    pub fn to_undirected_petgraph(&self) -> UnGraph<NodeId, f64> {
        let mut g = UnGraph::with_capacity(self.node_count(), self.edge_count);
        let indices: Vec<_> = self.ids.iter().map(|id| g.add_node(id.clone())).collect();
        for (i, neighbors) in self.out_adj.iter().enumerate() {
            for &(j, w) in neighbors {
                if self.directed || j >= i {
                    g.add_edge(indices[i], indices[j], w);
                }
            }
        }
        g
    }

    // --- index-based access for the algorithms ---

    pub(crate) fn id(&self, i: usize) -> &str {
        &self.ids[i]
    }

    pub(crate) fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Index of `id`, or `NodeNotFound`.
    pub(crate) fn require(&self, id: &str) -> Result<usize> {
        self.index_of(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn out_edges(&self, i: usize) -> &[(usize, f64)] {
        &self.out_adj[i]
    }

    pub(crate) fn in_edges(&self, i: usize) -> &[(usize, f64)] {
        &self.in_adj[i]
    }

    pub(crate) fn edge_weight(&self, a: usize, b: usize) -> Option<f64> {
        let list = &self.out_adj[a];
        list.binary_search_by_key(&b, |&(j, _)| j)
            .ok()
            .map(|pos| list[pos].1)
    }

    pub(crate) fn node_metadata_at(&self, i: usize) -> Option<&Value> {
        self.node_metadata[i].as_ref()
    }

    pub(crate) fn edge_metadata_at(&self, a: usize, b: usize) -> Option<&Value> {
        let key = if !self.directed && b < a { (b, a) } else { (a, b) };
        self.edge_metadata.get(&key)
    }

    /// Undirected neighbour lists (union of both directions, no self loops),
    /// with the weights of antiparallel directed edges summed.
    pub(crate) fn undirected_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        if !self.directed {
            return self
                .out_adj
                .iter()
                .enumerate()
                .map(|(i, list)| list.iter().copied().filter(|&(j, _)| j != i).collect())
                .collect();
        }
        let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); self.node_count()];
        for (i, list) in self.out_adj.iter().enumerate() {
            for &(j, w) in list {
                if i != j {
                    *merged[i].entry(j).or_insert(0.0) += w;
                    *merged[j].entry(i).or_insert(0.0) += w;
                }
            }
        }
        merged.into_iter().map(|m| m.into_iter().collect()).collect()
    }
}

// ============================================================================
// Output types
// ============================================================================

/// One entry of a score ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNode {
    pub node: NodeId,
    pub score: f64,
}

/// Sort scores descending, ties by ascending node id.
pub(crate) fn rank_scores(scores: &BTreeMap<NodeId, f64>) -> Vec<RankedNode> {
    let mut ranking: Vec<RankedNode> = scores
        .iter()
        .map(|(node, &score)| RankedNode {
            node: node.clone(),
            score,
        })
        .collect();
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.node.cmp(&b.node)));
    ranking
}

/// Map a dense score vector back to node ids.
pub(crate) fn scores_by_id(graph: &GraphModel, values: &[f64]) -> BTreeMap<NodeId, f64> {
    graph
        .ids()
        .iter()
        .cloned()
        .zip(values.iter().copied())
        .collect()
}

/// A detected community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    /// Dense identifier starting at 0
    pub id: u32,
    /// Member node ids, sorted
    pub nodes: Vec<NodeId>,
    pub size: usize,
}

/// A partition of the node set with its modularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityResult {
    pub communities: Vec<Community>,
    pub node_to_community: BTreeMap<NodeId, u32>,
    pub modularity: f64,
    /// Passes performed by the algorithm
    pub iterations: usize,
}

/// Metadata about a weakly connected component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Component identifier
    pub id: u32,
    /// Number of nodes in this component
    pub size: usize,
    /// Node IDs belonging to this component
    pub members: Vec<NodeId>,
    /// Whether this is the largest (main) component; exactly one per graph,
    /// the one holding the smallest node id on size ties
    pub is_main: bool,
}

/// Per-node metrics assembled by a summary run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// Normalised degree centrality
    pub degree: f64,
    /// Betweenness centrality (normalised on undirected graphs)
    pub betweenness: f64,
    /// Closeness centrality
    pub closeness: f64,
    /// PageRank score (sums to 1 over the graph)
    pub pagerank: f64,
    /// Louvain community
    pub community_id: u32,
    /// Weakly connected component
    pub component_id: u32,
    pub in_degree: usize,
    pub out_degree: usize,
}

/// Complete result of a summary analytics run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAnalytics {
    /// Per-node metrics keyed by node ID
    pub metrics: BTreeMap<NodeId, NodeMetrics>,
    /// Louvain communities
    pub communities: Vec<Community>,
    /// Weakly connected components, largest first
    pub components: Vec<ComponentInfo>,
    /// Louvain modularity
    pub modularity: f64,
    pub node_count: usize,
    pub edge_count: usize,
    /// Computation time in milliseconds
    pub computation_ms: u64,
}

// ============================================================================
// Configuration
// ============================================================================

/// Default parameters for the analytics algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// PageRank damping factor (default: 0.85)
    pub pagerank_damping: f64,
    /// PageRank convergence threshold on total absolute change (default: 1e-6)
    pub pagerank_tolerance: f64,
    /// PageRank maximum iterations (default: 100)
    pub pagerank_max_iterations: usize,
    /// Number of entries in ranking summaries (default: 10)
    pub top_n: usize,
    /// Eigenvector centrality tolerance on max per-node change (default: 1e-6)
    pub eigenvector_tolerance: f64,
    /// Eigenvector centrality maximum iterations (default: 100)
    pub eigenvector_max_iterations: usize,
    /// Katz attenuation factor (default: 0.1)
    pub katz_alpha: f64,
    /// Katz bias (default: 1.0)
    pub katz_beta: f64,
    /// Katz maximum iterations (default: 100)
    pub katz_max_iterations: usize,
    /// Katz tolerance; 0.0 runs all iterations (default: 1e-6)
    pub katz_tolerance: f64,
    /// HITS maximum iterations (default: 100)
    pub hits_max_iterations: usize,
    /// HITS tolerance; 0.0 runs all iterations (default: 1e-6)
    pub hits_tolerance: f64,
    /// Louvain resolution parameter (default: 1.0, higher = smaller communities)
    pub louvain_resolution: f64,
    /// Louvain maximum local-moving passes (default: 100)
    pub louvain_max_iterations: usize,
    /// Label propagation maximum passes (default: 100)
    pub label_propagation_max_iterations: usize,
    /// Label propagation RNG seed (default: 42)
    pub label_propagation_seed: u64,
    /// Path enumeration depth cap in edges (default: 10)
    pub max_path_depth: usize,
    /// Path enumeration result cap (default: 1000)
    pub max_paths: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: 0.85,
            pagerank_tolerance: 1e-6,
            pagerank_max_iterations: 100,
            top_n: 10,
            eigenvector_tolerance: 1e-6,
            eigenvector_max_iterations: 100,
            katz_alpha: 0.1,
            katz_beta: 1.0,
            katz_max_iterations: 100,
            katz_tolerance: 1e-6,
            hits_max_iterations: 100,
            hits_tolerance: 1e-6,
            louvain_resolution: 1.0,
            louvain_max_iterations: 100,
            label_propagation_max_iterations: 100,
            label_propagation_seed: 42,
            max_path_depth: 10,
            max_paths: 1000,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
