//! Integration tests for graph-intel
//!
//! Exercise the public API end to end on small hand-built graphs.
//! Run with: cargo test --test integration_tests

use graph_intel::graph::centrality::{betweenness_centrality, degree_centrality};
use graph_intel::graph::community::{louvain, LouvainOptions};
use graph_intel::graph::paths::find_all_simple_paths;
use graph_intel::graph::ranking::{pagerank, PageRankOptions};
use graph_intel::graph::shortest_path::{find_k_shortest_paths, find_shortest_path};
use graph_intel::graph::{
    AnalysisOutcome, AnalysisQuery, AnalysisRequest, AnalyticsConfig, AnalyticsEngine, Edge,
    EngineConfig, GraphAnalyticsEngine, GraphModel, PathConstraints,
};
use std::collections::HashSet;

fn undirected(edges: &[(&str, &str)]) -> GraphModel {
    let edges: Vec<Edge> = edges.iter().map(|(a, b)| Edge::new(*a, *b)).collect();
    GraphModel::build(&edges, false).unwrap()
}

fn chain_abcd() -> GraphModel {
    undirected(&[("A", "B"), ("B", "C"), ("C", "D")])
}

#[test]
fn test_chain_shortest_path() {
    let result = find_shortest_path(&chain_abcd(), "A", "D").unwrap().unwrap();
    assert_eq!(result.path, vec!["A", "B", "C", "D"]);
    assert!((result.distance - 3.0).abs() < 1e-12);
}

#[test]
fn test_dijkstra_matches_enumeration_on_fixed_graph() {
    let g = GraphModel::build(
        &[
            Edge::weighted("gw", "web", 2.0),
            Edge::weighted("gw", "vpn", 1.0),
            Edge::weighted("vpn", "db", 5.0),
            Edge::weighted("web", "app", 1.0),
            Edge::weighted("app", "db", 1.0),
            Edge::weighted("web", "db", 6.0),
        ],
        true,
    )
    .unwrap();
    let brute = find_all_simple_paths(&g, "gw", "db", &PathConstraints::default())
        .unwrap()
        .iter()
        .map(|p| p.total_weight)
        .fold(f64::INFINITY, f64::min);
    let dijkstra = find_shortest_path(&g, "gw", "db").unwrap().unwrap();
    assert!((dijkstra.distance - brute).abs() < 1e-12);
    assert_eq!(dijkstra.path, vec!["gw", "web", "app", "db"]);
}

#[test]
fn test_star_degree_centrality() {
    let g = undirected(&[("X", "A"), ("X", "B"), ("X", "C")]);
    let degree = degree_centrality(&g);
    assert!((degree.scores["X"] - 1.0).abs() < 1e-12);
    for leaf in ["A", "B", "C"] {
        assert!((degree.scores[leaf] - 1.0 / 3.0).abs() < 1e-12);
    }
    assert_eq!(degree.ranking[0].node, "X");
}

#[test]
fn test_k_shortest_paths_non_decreasing_and_simple() {
    let g = GraphModel::build(
        &[
            Edge::weighted("s", "a", 1.0),
            Edge::weighted("s", "b", 2.0),
            Edge::weighted("a", "b", 1.0),
            Edge::weighted("a", "c", 3.0),
            Edge::weighted("b", "c", 1.0),
            Edge::weighted("b", "t", 5.0),
            Edge::weighted("c", "t", 1.0),
            Edge::weighted("a", "t", 6.0),
        ],
        false,
    )
    .unwrap();
    let paths = find_k_shortest_paths(&g, "s", "t", 6).unwrap();
    assert!(paths.len() >= 4);
    for pair in paths.windows(2) {
        assert!(pair[0].distance <= pair[1].distance + 1e-12);
    }
    let mut seen = HashSet::new();
    for p in &paths {
        let unique: HashSet<&String> = p.path.iter().collect();
        assert_eq!(unique.len(), p.path.len(), "repeated node in {:?}", p.path);
        assert!(seen.insert(p.path.clone()), "duplicate path {:?}", p.path);
        assert_eq!(p.path.first().map(String::as_str), Some("s"));
        assert_eq!(p.path.last().map(String::as_str), Some("t"));
    }
}

#[test]
fn test_simple_paths_respect_max_depth() {
    let c = PathConstraints {
        max_depth: 2,
        ..PathConstraints::default()
    };
    assert!(find_all_simple_paths(&chain_abcd(), "A", "D", &c).unwrap().is_empty());
}

#[test]
fn test_louvain_two_disjoint_triangles() {
    let g = undirected(&[
        ("t1a", "t1b"),
        ("t1b", "t1c"),
        ("t1c", "t1a"),
        ("t2a", "t2b"),
        ("t2b", "t2c"),
        ("t2c", "t2a"),
    ]);
    let result = louvain(&g, &LouvainOptions::default());
    assert_eq!(result.communities.len(), 2);
    let groups: Vec<HashSet<&str>> = result
        .communities
        .iter()
        .map(|c| c.nodes.iter().map(String::as_str).collect())
        .collect();
    assert!(groups.contains(&["t1a", "t1b", "t1c"].into_iter().collect()));
    assert!(groups.contains(&["t2a", "t2b", "t2c"].into_iter().collect()));
}

#[test]
fn test_pagerank_directed_cycle() {
    let g = GraphModel::build(&[Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "A")], true).unwrap();
    let result = pagerank(&g, &PageRankOptions::default()).unwrap();
    assert!(result.converged);
    for rank in result.ranks.values() {
        assert!((rank - 1.0 / 3.0).abs() < 1e-6);
    }
    let total: f64 = result.ranks.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn test_three_chain_betweenness() {
    let g = undirected(&[("A", "B"), ("B", "C")]);
    let scores = betweenness_centrality(&g).scores;
    assert!(scores["B"] > 0.0);
    assert_eq!(scores["A"], 0.0);
    assert_eq!(scores["C"], 0.0);
}

#[test]
fn test_removing_bridge_disconnects_paths() {
    let left = [("l1", "l2"), ("l2", "l3"), ("l3", "l1")];
    let right = [("r1", "r2"), ("r2", "r3"), ("r3", "r1")];
    let mut with_bridge: Vec<(&str, &str)> = left.iter().chain(right.iter()).copied().collect();
    with_bridge.push(("l1", "r1"));

    let connected = undirected(&with_bridge);
    let c = PathConstraints::default();
    assert!(!find_all_simple_paths(&connected, "l2", "r3", &c).unwrap().is_empty());

    with_bridge.pop();
    let split = undirected(&with_bridge);
    assert!(find_all_simple_paths(&split, "l2", "r3", &c).unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_json_roundtrip() {
    let request: AnalysisRequest = serde_json::from_str(
        r#"{
            "edges": [
                {"from": "apt28", "to": "campaign-1", "weight": 2.0},
                {"from": "campaign-1", "to": "host-7"},
                {"from": "apt28", "to": "host-7", "weight": 5.0}
            ],
            "directed": true,
            "query": {"type": "shortest_path", "source": "apt28", "target": "host-7"}
        }"#,
    )
    .unwrap();
    let engine = GraphAnalyticsEngine::new(AnalyticsConfig::default(), EngineConfig::default());
    let report = engine.analyze(request).await.unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["type"], "shortest_path");
    assert_eq!(json["outcome"]["result"]["distance"], 3.0);
    match report.outcome {
        AnalysisOutcome::ShortestPath(Some(path)) => {
            assert_eq!(path.path, vec!["apt28", "campaign-1", "host-7"]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_engine_summary_query() {
    let engine = GraphAnalyticsEngine::new(AnalyticsConfig::default(), EngineConfig::default());
    let report = engine
        .analyze(AnalysisRequest {
            edges: vec![Edge::new("a", "b"), Edge::new("b", "c")],
            nodes: vec!["isolated".to_string()],
            directed: false,
            query: AnalysisQuery::Summary,
        })
        .await
        .unwrap();
    assert_eq!(report.node_count, 4);
    match report.outcome {
        AnalysisOutcome::Summary(analytics) => {
            assert_eq!(analytics.components.len(), 2);
            assert_eq!(analytics.components[0].size, 3);
            assert!(analytics.metrics["b"].betweenness > 0.0);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}
