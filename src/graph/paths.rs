//! Constrained path enumeration.
//!
//! Every operation here is a bounded depth-first search over simple paths.
//! The search keeps its own stack (no recursion) and is capped by
//! [`PathConstraints::max_depth`] (in edges) and
//! [`PathConstraints::max_paths`]; general simple-path enumeration is
//! exponential, so callers should keep both caps tight on dense graphs.
//!
//! Neighbours are explored in node-id order, so results are deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use super::models::{AnalyticsConfig, GraphModel, NodeId};
use crate::error::{GraphError, Result};

/// Predicate over a node id and its metadata.
pub type NodeFilter = Arc<dyn Fn(&str, Option<&Value>) -> bool + Send + Sync>;

/// Predicate over an edge `(from, to, weight, metadata)`.
pub type EdgeFilter = Arc<dyn Fn(&str, &str, f64, Option<&Value>) -> bool + Send + Sync>;

/// Limits and filters for path enumeration.
///
/// Weight bounds apply to each traversed edge. Unknown ids in
/// `forbidden_nodes` are ignored; an unknown id in `required_nodes` can never
/// be satisfied, so the search returns nothing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConstraints {
    /// Maximum path length in edges (default: 10)
    pub max_depth: usize,
    /// Maximum number of returned paths (default: 1000)
    pub max_paths: usize,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    /// Every returned path contains all of these
    pub required_nodes: Vec<NodeId>,
    /// Never traversed, including as source or target
    pub forbidden_nodes: Vec<NodeId>,
    #[serde(skip)]
    pub node_filter: Option<NodeFilter>,
    #[serde(skip)]
    pub edge_filter: Option<EdgeFilter>,
}

impl Default for PathConstraints {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_paths: 1000,
            min_weight: None,
            max_weight: None,
            required_nodes: Vec::new(),
            forbidden_nodes: Vec::new(),
            node_filter: None,
            edge_filter: None,
        }
    }
}

impl fmt::Debug for PathConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathConstraints")
            .field("max_depth", &self.max_depth)
            .field("max_paths", &self.max_paths)
            .field("min_weight", &self.min_weight)
            .field("max_weight", &self.max_weight)
            .field("required_nodes", &self.required_nodes)
            .field("forbidden_nodes", &self.forbidden_nodes)
            .field("node_filter", &self.node_filter.is_some())
            .field("edge_filter", &self.edge_filter.is_some())
            .finish()
    }
}

impl From<&AnalyticsConfig> for PathConstraints {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            max_depth: config.max_path_depth,
            max_paths: config.max_paths,
            ..Self::default()
        }
    }
}

impl PathConstraints {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths;
        self
    }

    pub fn with_node_filter(
        mut self,
        filter: impl Fn(&str, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.node_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_edge_filter(
        mut self,
        filter: impl Fn(&str, &str, f64, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.edge_filter = Some(Arc::new(filter));
        self
    }
}

/// A node on an enumerated path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// An edge on an enumerated path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One path produced by enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumeratedPath {
    pub path: Vec<NodeId>,
    /// Number of edges
    pub length: usize,
    pub total_weight: f64,
    pub nodes: Vec<PathNode>,
    pub edges: Vec<PathEdge>,
}

impl EnumeratedPath {
    fn from_indices(graph: &GraphModel, indices: &[usize]) -> Self {
        let nodes = indices
            .iter()
            .map(|&i| PathNode {
                id: graph.id(i).to_string(),
                metadata: graph.node_metadata_at(i).cloned(),
            })
            .collect();
        let edges: Vec<PathEdge> = indices
            .windows(2)
            .map(|pair| PathEdge {
                from: graph.id(pair[0]).to_string(),
                to: graph.id(pair[1]).to_string(),
                weight: graph.edge_weight(pair[0], pair[1]).unwrap_or(0.0),
                metadata: graph.edge_metadata_at(pair[0], pair[1]).cloned(),
            })
            .collect();
        Self {
            path: indices.iter().map(|&i| graph.id(i).to_string()).collect(),
            length: edges.len(),
            total_weight: edges.iter().map(|e| e.weight).sum(),
            nodes,
            edges,
        }
    }
}

/// What a search is looking for.
#[derive(Debug, Clone, Copy)]
enum Goal {
    /// Simple paths ending at the target.
    Reach(usize),
    /// Simple paths of exactly `edges` edges, optionally ending at a target.
    Length { edges: usize, target: Option<usize> },
    /// Simple cycles returning to the source with at least `min_edges` edges.
    Cycle { min_edges: usize },
}

/// Constraints resolved against one graph.
struct Search<'a> {
    graph: &'a GraphModel,
    constraints: &'a PathConstraints,
    forbidden: Vec<bool>,
    required: Vec<usize>,
    unsatisfiable: bool,
}

impl<'a> Search<'a> {
    fn new(graph: &'a GraphModel, constraints: &'a PathConstraints) -> Self {
        let mut forbidden = vec![false; graph.node_count()];
        for id in &constraints.forbidden_nodes {
            if let Some(i) = graph.index_of(id) {
                forbidden[i] = true;
            }
        }
        let mut required = Vec::with_capacity(constraints.required_nodes.len());
        let mut unsatisfiable = false;
        for id in &constraints.required_nodes {
            match graph.index_of(id) {
                Some(i) => required.push(i),
                None => unsatisfiable = true,
            }
        }
        Self {
            graph,
            constraints,
            forbidden,
            required,
            unsatisfiable,
        }
    }

    fn node_allowed(&self, v: usize) -> bool {
        if self.forbidden[v] {
            return false;
        }
        match &self.constraints.node_filter {
            Some(filter) => filter(self.graph.id(v), self.graph.node_metadata_at(v)),
            None => true,
        }
    }

    fn edge_allowed(&self, from: usize, to: usize, weight: f64) -> bool {
        if self.constraints.min_weight.is_some_and(|min| weight < min)
            || self.constraints.max_weight.is_some_and(|max| weight > max)
        {
            return false;
        }
        match &self.constraints.edge_filter {
            Some(filter) => filter(
                self.graph.id(from),
                self.graph.id(to),
                weight,
                self.graph.edge_metadata_at(from, to),
            ),
            None => true,
        }
    }

    fn has_required(&self, path: &[usize]) -> bool {
        self.required.iter().all(|r| path.contains(r))
    }

    /// Run the depth-first search and return the accepted paths as index
    /// sequences. `accept` is an extra predicate applied to each candidate.
    fn run(&self, source: usize, goal: Goal, accept: &dyn Fn(&[usize]) -> bool) -> Vec<Vec<usize>> {
        let mut found: Vec<Vec<usize>> = Vec::new();
        let max_paths = self.constraints.max_paths;
        if self.unsatisfiable || max_paths == 0 || !self.node_allowed(source) {
            return found;
        }
        let max_edges = match goal {
            Goal::Length { edges, .. } => edges,
            _ => self.constraints.max_depth,
        };

        let emit = |candidate: Vec<usize>, found: &mut Vec<Vec<usize>>| {
            if self.has_required(&candidate) && accept(&candidate) {
                found.push(candidate);
            }
        };

        let mut on_path = vec![false; self.graph.node_count()];
        on_path[source] = true;
        let mut path: Vec<usize> = vec![source];
        // next neighbour position for every node on the path
        let mut cursor: Vec<usize> = vec![0];

        while let Some(pos) = cursor.last_mut() {
            if found.len() >= max_paths {
                break;
            }
            let v = path[path.len() - 1];
            let edges = self.graph.out_edges(v);
            if *pos >= edges.len() || path.len() > max_edges {
                cursor.pop();
                if let Some(done) = path.pop() {
                    on_path[done] = false;
                }
                continue;
            }
            let (next, weight) = edges[*pos];
            *pos += 1;

            if !self.edge_allowed(v, next, weight) {
                continue;
            }

            if let Goal::Cycle { min_edges } = goal {
                if next == source {
                    if path.len() >= min_edges {
                        let mut cycle = path.clone();
                        cycle.push(source);
                        emit(cycle, &mut found);
                    }
                    continue;
                }
            }

            if on_path[next] || !self.node_allowed(next) {
                continue;
            }

            let depth = path.len();
            match goal {
                Goal::Reach(target) if next == target => {
                    let mut candidate = path.clone();
                    candidate.push(next);
                    emit(candidate, &mut found);
                    continue;
                }
                Goal::Length { edges, target } => {
                    if depth == edges {
                        if target.is_none_or(|t| t == next) {
                            let mut candidate = path.clone();
                            candidate.push(next);
                            emit(candidate, &mut found);
                        }
                        continue;
                    }
                    if target == Some(next) {
                        // the target cannot be revisited later
                        continue;
                    }
                }
                _ => {}
            }

            on_path[next] = true;
            path.push(next);
            cursor.push(0);
        }

        found
    }
}

fn to_paths(graph: &GraphModel, found: Vec<Vec<usize>>) -> Vec<EnumeratedPath> {
    found
        .iter()
        .map(|indices| EnumeratedPath::from_indices(graph, indices))
        .collect()
}

fn accept_all(_: &[usize]) -> bool {
    true
}

/// Every simple path from `source` to `target` within the constraints.
///
/// `source == target` yields no paths (use [`find_cycles`] for closed walks).
pub fn find_all_simple_paths(
    graph: &GraphModel,
    source: &str,
    target: &str,
    constraints: &PathConstraints,
) -> Result<Vec<EnumeratedPath>> {
    let s = graph.require(source)?;
    let t = graph.require(target)?;
    let search = Search::new(graph, constraints);
    if s == t || !search.node_allowed(t) {
        return Ok(Vec::new());
    }
    let found = search.run(s, Goal::Reach(t), &accept_all);
    tracing::debug!("{} simple paths {} -> {}", found.len(), source, target);
    Ok(to_paths(graph, found))
}

/// Simple paths of exactly `length` edges from `source`, ending at `target`
/// when one is given. `length` overrides `max_depth`.
pub fn find_paths_of_length(
    graph: &GraphModel,
    source: &str,
    target: Option<&str>,
    length: usize,
    constraints: &PathConstraints,
) -> Result<Vec<EnumeratedPath>> {
    if length == 0 {
        return Err(GraphError::invalid_parameter("length", "must be at least 1"));
    }
    let s = graph.require(source)?;
    let t = target.map(|id| graph.require(id)).transpose()?;
    if t == Some(s) {
        return Ok(Vec::new());
    }
    let goal = Goal::Length { edges: length, target: t };
    let found = Search::new(graph, constraints).run(s, goal, &accept_all);
    Ok(to_paths(graph, found))
}

/// Simple cycles through `start`, each returned as `[start, .., start]`.
///
/// On undirected graphs a cycle needs at least three edges and is reported
/// once, not once per orientation.
pub fn find_cycles(
    graph: &GraphModel,
    start: &str,
    constraints: &PathConstraints,
) -> Result<Vec<EnumeratedPath>> {
    let s = graph.require(start)?;
    let directed = graph.is_directed();
    let min_edges = if directed { 1 } else { 3 };
    // keep one orientation of each undirected cycle
    let one_orientation = move |cycle: &[usize]| {
        directed || cycle.len() < 3 || cycle[1] < cycle[cycle.len() - 2]
    };
    let found = Search::new(graph, constraints).run(s, Goal::Cycle { min_edges }, &one_orientation);
    tracing::debug!("{} cycles through {}", found.len(), start);
    Ok(to_paths(graph, found))
}

fn require_all(graph: &GraphModel, ids: &[NodeId]) -> Result<Vec<usize>> {
    ids.iter().map(|id| graph.require(id)).collect()
}

/// Paths from `source` to `target` that pass through every node in `required`.
pub fn find_attack_chains(
    graph: &GraphModel,
    source: &str,
    target: &str,
    required: &[NodeId],
    constraints: &PathConstraints,
) -> Result<Vec<EnumeratedPath>> {
    require_all(graph, required)?;
    let mut merged = constraints.clone();
    for id in required {
        if !merged.required_nodes.contains(id) {
            merged.required_nodes.push(id.clone());
        }
    }
    find_all_simple_paths(graph, source, target, &merged)
}

/// Paths from `source` to `target` that pass through at least one node of
/// `critical`.
pub fn find_bottleneck_paths(
    graph: &GraphModel,
    source: &str,
    target: &str,
    critical: &[NodeId],
    constraints: &PathConstraints,
) -> Result<Vec<EnumeratedPath>> {
    let s = graph.require(source)?;
    let t = graph.require(target)?;
    let critical: HashSet<usize> = require_all(graph, critical)?.into_iter().collect();
    let search = Search::new(graph, constraints);
    if s == t || critical.is_empty() || !search.node_allowed(t) {
        return Ok(Vec::new());
    }
    let through_critical = |path: &[usize]| path.iter().any(|v| critical.contains(v));
    let found = search.run(s, Goal::Reach(t), &through_critical);
    Ok(to_paths(graph, found))
}

/// Mean pairwise Jaccard distance between the node sets of `paths`;
/// 0 with fewer than two paths.
pub fn path_diversity(paths: &[EnumeratedPath]) -> f64 {
    if paths.len() < 2 {
        return 0.0;
    }
    let sets: Vec<HashSet<&str>> = paths
        .iter()
        .map(|p| p.path.iter().map(String::as_str).collect())
        .collect();

    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let union = sets[i].union(&sets[j]).count();
            let shared = sets[i].intersection(&sets[j]).count();
            if union > 0 {
                total += 1.0 - shared as f64 / union as f64;
            }
            pairs += 1;
        }
    }
    total / pairs as f64
}

/// Intermediate nodes that lie on every enumerated `source -> target` path,
/// sorted by id. Removing any one of them disconnects every such path.
/// Empty when no path exists.
///
/// Only the enumerated paths are considered: when `max_paths` cuts the
/// search short the result can include nodes that unlisted paths avoid, and a
/// warning is logged.
pub fn find_critical_nodes(
    graph: &GraphModel,
    source: &str,
    target: &str,
    constraints: &PathConstraints,
) -> Result<Vec<NodeId>> {
    let paths = find_all_simple_paths(graph, source, target, constraints)?;
    if paths.len() >= constraints.max_paths && constraints.max_paths > 0 {
        tracing::warn!(
            "critical nodes {} -> {} computed from the first {} paths only",
            source,
            target,
            constraints.max_paths
        );
    }
    let mut iter = paths.iter();
    let Some(first) = iter.next() else {
        return Ok(Vec::new());
    };
    let inner = |p: &EnumeratedPath| -> BTreeSet<NodeId> {
        p.path[1..p.path.len() - 1].iter().cloned().collect()
    };
    let mut common = inner(first);
    for p in iter {
        let nodes = inner(p);
        common.retain(|id| nodes.contains(id));
        if common.is_empty() {
            break;
        }
    }
    Ok(common.into_iter().collect())
}

// ============================================================================
// Tests
// ============================================================================
