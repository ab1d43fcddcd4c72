//! Shortest paths: Dijkstra and Yen's k-shortest simple paths.
//!
//! Both searches fail fast with `InvalidWeight` on the first negative edge
//! they consult. An unreachable target is not an error.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use super::models::{GraphModel, NodeId};
use crate::error::{GraphError, Result};

/// A path and its total weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<NodeId>,
    pub distance: f64,
}

// ============================================================================
// Dijkstra
// ============================================================================

/// Heap entry ordered as a min-heap on cost, ties by insertion sequence.
#[derive(Debug)]
struct HeapEntry {
    cost: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Nodes and directed edges a search must not use.
#[derive(Debug, Default)]
struct Exclusions {
    nodes: HashSet<usize>,
    edges: HashSet<(usize, usize)>,
}

/// Distances and predecessors from one source.
struct Search {
    dist: Vec<f64>,
    prev: Vec<Option<usize>>,
}

impl Search {
    fn path_to(&self, target: usize) -> Option<Vec<usize>> {
        if !self.dist[target].is_finite() {
            return None;
        }
        let mut path = vec![target];
        let mut current = target;
        while let Some(p) = self.prev[current] {
            path.push(p);
            current = p;
        }
        path.reverse();
        Some(path)
    }
}

/// Dijkstra from `source`, stopping early once `target` is settled.
fn dijkstra(
    graph: &GraphModel,
    source: usize,
    target: Option<usize>,
    excluded: &Exclusions,
) -> Result<Search> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist[source] = 0.0;
    heap.push(HeapEntry {
        cost: 0.0,
        seq,
        node: source,
    });

    while let Some(HeapEntry { cost, node, .. }) = heap.pop() {
        if settled[node] {
            continue;
        }
        settled[node] = true;
        if Some(node) == target {
            break;
        }

        for &(next, w) in graph.out_edges(node) {
            if w < 0.0 {
                return Err(GraphError::InvalidWeight {
                    from: graph.id(node).to_string(),
                    to: graph.id(next).to_string(),
                    weight: w,
                });
            }
            if settled[next] || excluded.nodes.contains(&next) || excluded.edges.contains(&(node, next)) {
                continue;
            }
            let candidate = cost + w;
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(node);
                seq += 1;
                heap.push(HeapEntry {
                    cost: candidate,
                    seq,
                    node: next,
                });
            }
        }
    }

    Ok(Search { dist, prev })
}

fn to_result(graph: &GraphModel, path: &[usize], distance: f64) -> PathResult {
    PathResult {
        path: path.iter().map(|&i| graph.id(i).to_string()).collect(),
        distance,
    }
}

/// Sum of edge weights along an index path.
fn path_cost(graph: &GraphModel, path: &[usize]) -> f64 {
    path.windows(2)
        .map(|pair| graph.edge_weight(pair[0], pair[1]).unwrap_or(f64::INFINITY))
        .sum()
}

/// Cheapest path from `source` to `target`, or `None` if unreachable.
pub fn find_shortest_path(
    graph: &GraphModel,
    source: &str,
    target: &str,
) -> Result<Option<PathResult>> {
    let s = graph.require(source)?;
    let t = graph.require(target)?;

    let search = dijkstra(graph, s, Some(t), &Exclusions::default())?;
    let result = search
        .path_to(t)
        .map(|path| to_result(graph, &path, search.dist[t]));

    tracing::debug!(
        "shortest path {} -> {}: {}",
        source,
        target,
        result
            .as_ref()
            .map(|r| format!("{} hops, distance {}", r.path.len() - 1, r.distance))
            .unwrap_or_else(|| "unreachable".to_string())
    );
    Ok(result)
}

/// Weighted distance from `source` to every node by index; `INFINITY` when
/// unreachable.
pub(crate) fn distances_from(graph: &GraphModel, source: usize) -> Result<Vec<f64>> {
    Ok(dijkstra(graph, source, None, &Exclusions::default())?.dist)
}

/// Distance from `source` to every reachable node (including itself).
pub fn shortest_distances(graph: &GraphModel, source: &str) -> Result<BTreeMap<NodeId, f64>> {
    let s = graph.require(source)?;
    Ok(distances_from(graph, s)?
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_finite())
        .map(|(i, &d)| (graph.id(i).to_string(), d))
        .collect())
}

// ============================================================================
// Yen's k-shortest simple paths
// ============================================================================

/// A spliced candidate waiting in Yen's pool.
struct Candidate {
    path: Vec<usize>,
    cost: f64,
    seq: u64,
}

/// Up to `k` loopless paths from `source` to `target` in non-decreasing cost.
pub fn find_k_shortest_paths(
    graph: &GraphModel,
    source: &str,
    target: &str,
    k: usize,
) -> Result<Vec<PathResult>> {
    let s = graph.require(source)?;
    let t = graph.require(target)?;
    if k == 0 {
        return Ok(Vec::new());
    }

    let first = dijkstra(graph, s, Some(t), &Exclusions::default())?;
    let Some(first_path) = first.path_to(t) else {
        return Ok(Vec::new());
    };

    let mut found: Vec<(Vec<usize>, f64)> = vec![(first_path.clone(), first.dist[t])];
    let mut seen: HashSet<Vec<usize>> = HashSet::from([first_path]);
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut seq = 0u64;

    while found.len() < k {
        let previous = found[found.len() - 1].0.clone();

        for i in 0..previous.len().saturating_sub(1) {
            let spur = previous[i];
            let root = &previous[..=i];

            let mut excluded = Exclusions::default();
            for (path, _) in &found {
                if path.len() > i + 1 && &path[..=i] == root {
                    excluded.edges.insert((path[i], path[i + 1]));
                }
            }
            excluded.nodes.extend(root[..i].iter().copied());

            let search = dijkstra(graph, spur, Some(t), &excluded)?;
            let Some(spur_path) = search.path_to(t) else {
                continue;
            };

            let mut total: Vec<usize> = root[..i].to_vec();
            total.extend(spur_path);
            if seen.insert(total.clone()) {
                let cost = path_cost(graph, &root[..=i]) + search.dist[t];
                seq += 1;
                candidates.push(Candidate {
                    path: total,
                    cost,
                    seq,
                });
            }
        }

        let best = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cost.total_cmp(&b.cost).then_with(|| a.seq.cmp(&b.seq)))
            .map(|(pos, _)| pos);
        match best {
            Some(pos) => {
                let next = candidates.swap_remove(pos);
                found.push((next.path, next.cost));
            }
            None => break,
        }
    }

    tracing::debug!(
        "k-shortest {} -> {}: {} of {} requested paths",
        source,
        target,
        found.len(),
        k
    );

    Ok(found
        .iter()
        .map(|(path, cost)| to_result(graph, path, *cost))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::Edge;

    fn chain() -> GraphModel {
        GraphModel::build(
            &[Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "D")],
            false,
        )
        .unwrap()
    }

    /// Classic Yen example (directed, C..H).
    fn yen_graph() -> GraphModel {
        GraphModel::build(
            &[
                Edge::weighted("C", "D", 3.0),
                Edge::weighted("C", "E", 2.0),
                Edge::weighted("D", "F", 4.0),
                Edge::weighted("E", "D", 1.0),
                Edge::weighted("E", "F", 2.0),
                Edge::weighted("E", "G", 3.0),
                Edge::weighted("F", "G", 2.0),
                Edge::weighted("F", "H", 1.0),
                Edge::weighted("G", "H", 2.0),
            ],
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_chain_shortest_path() {
        let result = find_shortest_path(&chain(), "A", "D").unwrap().unwrap();
        assert_eq!(result.path, vec!["A", "B", "C", "D"]);
        assert!((result.distance - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_detour_is_cheaper() {
        let g = GraphModel::build(
            &[
                Edge::weighted("a", "b", 10.0),
                Edge::weighted("a", "c", 1.0),
                Edge::weighted("c", "b", 2.0),
            ],
            true,
        )
        .unwrap();
        let result = find_shortest_path(&g, "a", "b").unwrap().unwrap();
        assert_eq!(result.path, vec!["a", "c", "b"]);
        assert!((result.distance - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unreachable_is_none() {
        let g = GraphModel::build(&[Edge::new("a", "b"), Edge::new("c", "d")], true).unwrap();
        assert!(find_shortest_path(&g, "a", "d").unwrap().is_none());
        // Directed: no way back
        assert!(find_shortest_path(&g, "b", "a").unwrap().is_none());
    }

    #[test]
    fn test_source_equals_target() {
        let result = find_shortest_path(&chain(), "B", "B").unwrap().unwrap();
        assert_eq!(result.path, vec!["B"]);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_unknown_node_is_error() {
        let err = find_shortest_path(&chain(), "A", "Z").unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound("Z".to_string()));
    }

    #[test]
    fn test_negative_weight_fails_fast() {
        let g = GraphModel::build(&[Edge::weighted("a", "b", -1.0)], true).unwrap();
        let err = find_shortest_path(&g, "a", "b").unwrap_err();
        assert!(matches!(err, GraphError::InvalidWeight { weight, .. } if weight == -1.0));
    }

    #[test]
    fn test_shortest_distances() {
        let distances = shortest_distances(&chain(), "A").unwrap();
        assert_eq!(distances.len(), 4);
        assert!((distances["D"] - 3.0).abs() < f64::EPSILON);
        assert_eq!(distances["A"], 0.0);
    }

    #[test]
    fn test_yen_classic_example() {
        let paths = find_k_shortest_paths(&yen_graph(), "C", "H", 3).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].path, vec!["C", "E", "F", "H"]);
        assert!((paths[0].distance - 5.0).abs() < 1e-9);
        assert!((paths[1].distance - 7.0).abs() < 1e-9);
        assert!((paths[2].distance - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_yen_costs_non_decreasing_and_simple() {
        let paths = find_k_shortest_paths(&yen_graph(), "C", "H", 10).unwrap();
        assert!(!paths.is_empty());
        for pair in paths.windows(2) {
            assert!(pair[0].distance <= pair[1].distance + 1e-12);
        }
        for p in &paths {
            let unique: HashSet<&String> = p.path.iter().collect();
            assert_eq!(unique.len(), p.path.len(), "path {:?} repeats a node", p.path);
        }
        let distinct: HashSet<&Vec<String>> = paths.iter().map(|p| &p.path).collect();
        assert_eq!(distinct.len(), paths.len());
    }

    #[test]
    fn test_yen_exhausts_graph() {
        // Chain has exactly one simple path A..D
        let paths = find_k_shortest_paths(&chain(), "A", "D", 5).unwrap();
        assert_eq!(paths.len(), 1);
    }

    /// s -> t costs the same directly or through a zero-weight hop to a.
    fn zero_weight_tie() -> GraphModel {
        GraphModel::build(
            &[
                Edge::weighted("s", "a", 0.0),
                Edge::weighted("a", "t", 1.0),
                Edge::weighted("s", "t", 1.0),
            ],
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_weight_edges_are_free() {
        let g = GraphModel::build(
            &[
                Edge::weighted("a", "b", 0.0),
                Edge::weighted("b", "c", 0.0),
                Edge::weighted("a", "c", 0.5),
            ],
            false,
        )
        .unwrap();
        let result = find_shortest_path(&g, "a", "c").unwrap().unwrap();
        assert_eq!(result.path, vec!["a", "b", "c"]);
        assert_eq!(result.distance, 0.0);
        assert_eq!(shortest_distances(&g, "a").unwrap()["c"], 0.0);
    }

    #[test]
    fn test_zero_weight_tie_prefers_first_discovered() {
        let result = find_shortest_path(&zero_weight_tie(), "s", "t").unwrap().unwrap();
        assert_eq!(result.path, vec!["s", "t"]);
        assert_eq!(result.distance, 1.0);
    }

    #[test]
    fn test_yen_zero_weight_tie_returns_both_routes() {
        let paths = find_k_shortest_paths(&zero_weight_tie(), "s", "t", 3).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].path, vec!["s", "t"]);
        assert_eq!(paths[1].path, vec!["s", "a", "t"]);
        assert!(paths.iter().all(|p| p.distance == 1.0));
    }

    #[test]
    fn test_yen_k_zero_and_unreachable() {
        assert!(find_k_shortest_paths(&chain(), "A", "D", 0).unwrap().is_empty());
        let g = GraphModel::build(&[Edge::new("a", "b"), Edge::new("c", "d")], true).unwrap();
        assert!(find_k_shortest_paths(&g, "a", "d", 3).unwrap().is_empty());
    }
}
