//! Analytics engine: runs analysis requests end to end.
//!
//! The `AnalyticsEngine` trait is the single entry point for consumers that
//! hold an edge list rather than a built graph (the CLI, service handlers).
//! Each request goes through:
//!
//! 1. **Admission**: a semaphore permit bounds concurrent jobs
//! 2. **Construction**: edges → `GraphModel`, rejected above the size limits
//! 3. **Computation**: the requested algorithm on Tokio's blocking pool
//!
//! The trait also enables mocking in downstream consumer tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::centrality::{
    betweenness_centrality, closeness_centrality, degree_centrality, eigenvector_centrality,
    harmonic_centrality, katz_centrality, weighted_betweenness_centrality, CentralityScores,
    EigenvectorOptions, IterativeCentrality, KatzOptions,
};
use super::community::{
    component_labels, connected_components, girvan_newman, hierarchical_clustering,
    label_propagation, louvain, GirvanNewmanOptions, GirvanNewmanResult, LabelPropagationOptions,
    Linkage, LouvainOptions,
};
use super::models::{
    AnalyticsConfig, CommunityResult, Edge, GraphAnalytics, GraphModel, NodeId, NodeMetrics,
};
use super::paths::{
    find_all_simple_paths, find_critical_nodes, find_cycles, path_diversity, EnumeratedPath,
    PathConstraints,
};
use super::ranking::{hits, pagerank, HitsResult, PageRankOptions, PageRankResult};
use super::shortest_path::{find_k_shortest_paths, find_shortest_path, PathResult};
use crate::error::{GraphError, Result};

// ============================================================================
// Summary analytics
// ============================================================================

/// Compute the full per-node summary of a graph.
///
/// Runs degree, betweenness and closeness centrality, PageRank, Louvain and
/// weakly connected components, then assembles one `NodeMetrics` per node.
pub fn compute_all(graph: &GraphModel, config: &AnalyticsConfig) -> Result<GraphAnalytics> {
    let start = Instant::now();

    // 1. Centrality
    let degree = degree_centrality(graph);
    let betweenness = betweenness_centrality(graph);
    let closeness = closeness_centrality(graph);

    // 2. PageRank
    let pr = pagerank(graph, &PageRankOptions::from(config))?;

    // 3. Louvain communities
    let communities = louvain(graph, &LouvainOptions::from(config));

    // 4. Connected components
    let components = connected_components(graph);
    let labels = component_labels(graph);
    // component ids in `components` are the dense labels
    let component_of: Vec<u32> = labels.iter().map(|&c| c as u32).collect();

    // 5. Assemble NodeMetrics per node
    let metrics: BTreeMap<NodeId, NodeMetrics> = graph
        .ids()
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let metrics = NodeMetrics {
                degree: degree.scores[id],
                betweenness: betweenness.scores[id],
                closeness: closeness.scores[id],
                pagerank: pr.ranks[id],
                community_id: communities.node_to_community[id],
                component_id: component_of[i],
                in_degree: graph.in_edges(i).len(),
                out_degree: graph.out_edges(i).len(),
            };
            (id.clone(), metrics)
        })
        .collect();

    let computation_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        "summary analytics: {} nodes, {} communities, {} components in {}ms",
        graph.node_count(),
        communities.communities.len(),
        components.len(),
        computation_ms
    );

    Ok(GraphAnalytics {
        metrics,
        modularity: communities.modularity,
        communities: communities.communities,
        components,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        computation_ms,
    })
}

// ============================================================================
// Request / response model
// ============================================================================

/// Centrality measure selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentralityMeasure {
    #[default]
    Degree,
    Betweenness,
    WeightedBetweenness,
    Closeness,
    Harmonic,
    Eigenvector,
    Katz,
}

impl CentralityMeasure {
    const ALL: [(&'static str, CentralityMeasure); 7] = [
        ("degree", Self::Degree),
        ("betweenness", Self::Betweenness),
        ("weighted_betweenness", Self::WeightedBetweenness),
        ("closeness", Self::Closeness),
        ("harmonic", Self::Harmonic),
        ("eigenvector", Self::Eigenvector),
        ("katz", Self::Katz),
    ];
}

impl fmt::Display for CentralityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::ALL
            .iter()
            .find(|(_, m)| m == self)
            .map_or("degree", |(name, _)| name);
        f.write_str(name)
    }
}

impl FromStr for CentralityMeasure {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, m)| *m)
            .ok_or_else(|| format!("unknown centrality measure: {}", s))
    }
}

/// Community detection method selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityMethod {
    #[default]
    Louvain,
    LabelPropagation,
    GirvanNewman,
    Hierarchical,
}

impl fmt::Display for CommunityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Louvain => "louvain",
            Self::LabelPropagation => "label_propagation",
            Self::GirvanNewman => "girvan_newman",
            Self::Hierarchical => "hierarchical",
        };
        f.write_str(name)
    }
}

impl FromStr for CommunityMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "louvain" => Ok(Self::Louvain),
            "label_propagation" | "lpa" => Ok(Self::LabelPropagation),
            "girvan_newman" => Ok(Self::GirvanNewman),
            "hierarchical" | "agglomerative" => Ok(Self::Hierarchical),
            _ => Err(format!("unknown community method: {}", s)),
        }
    }
}

/// The analysis to run on a request's graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisQuery {
    ShortestPath {
        source: NodeId,
        target: NodeId,
    },
    KShortestPaths {
        source: NodeId,
        target: NodeId,
        k: usize,
    },
    Centrality {
        #[serde(default)]
        measure: CentralityMeasure,
    },
    Communities {
        #[serde(default)]
        method: CommunityMethod,
        /// Girvan–Newman / hierarchical stopping point (default: 2)
        #[serde(default)]
        target_communities: Option<usize>,
        #[serde(default)]
        linkage: Linkage,
    },
    PageRank {
        #[serde(default)]
        personalization: Option<BTreeMap<NodeId, f64>>,
    },
    Hits,
    SimplePaths {
        source: NodeId,
        target: NodeId,
        #[serde(default)]
        constraints: Option<PathConstraints>,
    },
    Cycles {
        start: NodeId,
        #[serde(default)]
        constraints: Option<PathConstraints>,
    },
    CriticalNodes {
        source: NodeId,
        target: NodeId,
        #[serde(default)]
        constraints: Option<PathConstraints>,
    },
    Summary,
}

impl AnalysisQuery {
    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShortestPath { .. } => "shortest_path",
            Self::KShortestPaths { .. } => "k_shortest_paths",
            Self::Centrality { .. } => "centrality",
            Self::Communities { .. } => "communities",
            Self::PageRank { .. } => "page_rank",
            Self::Hits => "hits",
            Self::SimplePaths { .. } => "simple_paths",
            Self::Cycles { .. } => "cycles",
            Self::CriticalNodes { .. } => "critical_nodes",
            Self::Summary => "summary",
        }
    }
}

/// An edge list plus the analysis to run on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub edges: Vec<Edge>,
    /// Extra (possibly isolated) nodes
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub directed: bool,
    pub query: AnalysisQuery,
}

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    ShortestPath(Option<PathResult>),
    KShortestPaths(Vec<PathResult>),
    Centrality(CentralityScores),
    IterativeCentrality(IterativeCentrality),
    Communities(CommunityResult),
    GirvanNewman(GirvanNewmanResult),
    PageRank(PageRankResult),
    Hits(HitsResult),
    Paths {
        paths: Vec<EnumeratedPath>,
        diversity: f64,
    },
    CriticalNodes(Vec<NodeId>),
    Summary(GraphAnalytics),
}

/// Outcome plus graph size and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub outcome: AnalysisOutcome,
    pub node_count: usize,
    pub edge_count: usize,
    pub computation_ms: u64,
    pub computed_at: DateTime<Utc>,
}

/// Run one query against a built graph.
pub fn run_query(
    graph: &GraphModel,
    query: &AnalysisQuery,
    config: &AnalyticsConfig,
) -> Result<AnalysisOutcome> {
    let constraints_or_default =
        |c: &Option<PathConstraints>| c.clone().unwrap_or_else(|| PathConstraints::from(config));

    let outcome = match query {
        AnalysisQuery::ShortestPath { source, target } => {
            AnalysisOutcome::ShortestPath(find_shortest_path(graph, source, target)?)
        }
        AnalysisQuery::KShortestPaths { source, target, k } => {
            AnalysisOutcome::KShortestPaths(find_k_shortest_paths(graph, source, target, *k)?)
        }
        AnalysisQuery::Centrality { measure } => match measure {
            CentralityMeasure::Degree => AnalysisOutcome::Centrality(degree_centrality(graph)),
            CentralityMeasure::Betweenness => {
                AnalysisOutcome::Centrality(betweenness_centrality(graph))
            }
            CentralityMeasure::WeightedBetweenness => {
                AnalysisOutcome::Centrality(weighted_betweenness_centrality(graph)?)
            }
            CentralityMeasure::Closeness => AnalysisOutcome::Centrality(closeness_centrality(graph)),
            CentralityMeasure::Harmonic => AnalysisOutcome::Centrality(harmonic_centrality(graph)),
            CentralityMeasure::Eigenvector => AnalysisOutcome::IterativeCentrality(
                eigenvector_centrality(graph, &EigenvectorOptions::from(config)),
            ),
            CentralityMeasure::Katz => AnalysisOutcome::IterativeCentrality(katz_centrality(
                graph,
                &KatzOptions::from(config),
            )?),
        },
        AnalysisQuery::Communities {
            method,
            target_communities,
            linkage,
        } => {
            let target = target_communities.unwrap_or(2);
            match method {
                CommunityMethod::Louvain => {
                    AnalysisOutcome::Communities(louvain(graph, &LouvainOptions::from(config)))
                }
                CommunityMethod::LabelPropagation => AnalysisOutcome::Communities(
                    label_propagation(graph, &LabelPropagationOptions::from(config)),
                ),
                CommunityMethod::GirvanNewman => {
                    let options = GirvanNewmanOptions {
                        target_communities: target,
                        max_removals: None,
                    };
                    AnalysisOutcome::GirvanNewman(girvan_newman(graph, &options)?)
                }
                CommunityMethod::Hierarchical => AnalysisOutcome::Communities(
                    hierarchical_clustering(graph, target, *linkage)?,
                ),
            }
        }
        AnalysisQuery::PageRank { personalization } => {
            let options = PageRankOptions {
                personalization: personalization.clone(),
                ..PageRankOptions::from(config)
            };
            AnalysisOutcome::PageRank(pagerank(graph, &options)?)
        }
        AnalysisQuery::Hits => AnalysisOutcome::Hits(hits(graph, &config.into())),
        AnalysisQuery::SimplePaths {
            source,
            target,
            constraints,
        } => {
            let paths =
                find_all_simple_paths(graph, source, target, &constraints_or_default(constraints))?;
            AnalysisOutcome::Paths {
                diversity: path_diversity(&paths),
                paths,
            }
        }
        AnalysisQuery::Cycles { start, constraints } => {
            let paths = find_cycles(graph, start, &constraints_or_default(constraints))?;
            AnalysisOutcome::Paths {
                diversity: path_diversity(&paths),
                paths,
            }
        }
        AnalysisQuery::CriticalNodes {
            source,
            target,
            constraints,
        } => AnalysisOutcome::CriticalNodes(find_critical_nodes(
            graph,
            source,
            target,
            &constraints_or_default(constraints),
        )?),
        AnalysisQuery::Summary => AnalysisOutcome::Summary(compute_all(graph, config)?),
    };
    Ok(outcome)
}

// ============================================================================
// Engine configuration
// ============================================================================

/// Admission limits for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent analyses (default: 4)
    pub max_concurrent_jobs: usize,
    /// Largest accepted graph, in nodes (default: 100_000)
    pub max_nodes: usize,
    /// Largest accepted graph, in edges (default: 1_000_000)
    pub max_edges: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            max_nodes: 100_000,
            max_edges: 1_000_000,
        }
    }
}

impl EngineConfig {
    /// Reject a built graph above the node or edge limit.
    fn check(&self, graph: &GraphModel) -> Result<()> {
        if graph.node_count() > self.max_nodes || graph.edge_count() > self.max_edges {
            return Err(GraphError::GraphTooLarge {
                nodes: graph.node_count(),
                edges: graph.edge_count(),
                max_nodes: self.max_nodes,
                max_edges: self.max_edges,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Analytics engine trait: single entry point for request-driven analytics.
///
/// Consumers use `Arc<dyn AnalyticsEngine>` for dependency injection.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    /// Build the request's graph and run its query.
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisReport>;

    /// Summary analytics for an edge list.
    async fn summarize(&self, edges: Vec<Edge>, directed: bool) -> Result<GraphAnalytics>;
}

// ============================================================================
// Concrete implementation
// ============================================================================

/// Engine that runs each request on Tokio's blocking pool, at most
/// `max_concurrent_jobs` at a time.
pub struct GraphAnalyticsEngine {
    config: Arc<AnalyticsConfig>,
    limits: EngineConfig,
    permits: Arc<Semaphore>,
}

impl GraphAnalyticsEngine {
    pub fn new(config: AnalyticsConfig, limits: EngineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(limits.max_concurrent_jobs.max(1)));
        Self {
            config: Arc::new(config),
            limits,
            permits,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Acquire a permit, then run `job` on the blocking pool.
    async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GraphError::TaskFailed(e.to_string()))?;
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| GraphError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl AnalyticsEngine for GraphAnalyticsEngine {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisReport> {
        if request.edges.len() > self.limits.max_edges {
            return Err(GraphError::GraphTooLarge {
                nodes: request.nodes.len(),
                edges: request.edges.len(),
                max_nodes: self.limits.max_nodes,
                max_edges: self.limits.max_edges,
            });
        }
        tracing::info!(
            "analysis request: {} over {} edges (directed: {})",
            request.query.name(),
            request.edges.len(),
            request.directed
        );

        let config = Arc::clone(&self.config);
        let limits = self.limits.clone();
        let report = self
            .run_blocking(move || {
                // 1. Build (on the blocking pool, under the permit)
                let graph =
                    GraphModel::build_with_nodes(&request.edges, &request.nodes, request.directed)?;
                limits.check(&graph)?;

                // 2. Compute
                let start = Instant::now();
                let outcome = run_query(&graph, &request.query, &config)?;
                Ok(AnalysisReport {
                    outcome,
                    node_count: graph.node_count(),
                    edge_count: graph.edge_count(),
                    computation_ms: start.elapsed().as_millis() as u64,
                    computed_at: Utc::now(),
                })
            })
            .await?;

        tracing::info!(
            "analysis finished: {} nodes, {} edges in {}ms",
            report.node_count,
            report.edge_count,
            report.computation_ms
        );
        Ok(report)
    }

    async fn summarize(&self, edges: Vec<Edge>, directed: bool) -> Result<GraphAnalytics> {
        let report = self
            .analyze(AnalysisRequest {
                edges,
                nodes: Vec::new(),
                directed,
                query: AnalysisQuery::Summary,
            })
            .await?;
        match report.outcome {
            AnalysisOutcome::Summary(analytics) => Ok(analytics),
            other => Err(GraphError::TaskFailed(format!(
                "unexpected outcome for summary: {:?}",
                other
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Two fully connected clusters of five nodes joined by one bridge edge.
    fn two_cluster_edges() -> Vec<Edge> {
        let cluster_a: Vec<String> = (0..5).map(|i| format!("actor_a{}", i)).collect();
        let cluster_b: Vec<String> = (0..5).map(|i| format!("asset_b{}", i)).collect();
        let mut edges = Vec::new();
        for cluster in [&cluster_a, &cluster_b] {
            for i in 0..cluster.len() {
                for j in (i + 1)..cluster.len() {
                    edges.push(Edge::new(cluster[i].clone(), cluster[j].clone()));
                }
            }
        }
        edges.push(Edge::new(cluster_a[0].clone(), cluster_b[0].clone()));
        edges
    }

    fn engine() -> GraphAnalyticsEngine {
        GraphAnalyticsEngine::new(AnalyticsConfig::default(), EngineConfig::default())
    }

    #[test]
    fn test_compute_all_two_clusters() {
        let graph = GraphModel::build(&two_cluster_edges(), false).unwrap();
        let analytics = compute_all(&graph, &AnalyticsConfig::default()).unwrap();

        assert_eq!(analytics.node_count, 10);
        assert_eq!(analytics.edge_count, 21);
        assert_eq!(analytics.metrics.len(), 10);
        assert_eq!(analytics.communities.len(), 2);
        assert!(analytics.modularity > 0.0);
        assert_eq!(analytics.components.len(), 1);

        let bridge = &analytics.metrics["actor_a0"];
        let inner = &analytics.metrics["actor_a1"];
        assert!(bridge.betweenness > inner.betweenness);
        assert_eq!(bridge.in_degree, 5);
        assert_ne!(
            analytics.metrics["actor_a1"].community_id,
            analytics.metrics["asset_b1"].community_id
        );
        let total_rank: f64 = analytics.metrics.values().map(|m| m.pagerank).sum();
        assert!((total_rank - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_all_isolated_node() {
        let graph = GraphModel::build_with_nodes(&[], &["lonely".to_string()], true).unwrap();
        let analytics = compute_all(&graph, &AnalyticsConfig::default()).unwrap();
        assert_eq!(analytics.node_count, 1);
        assert_eq!(analytics.edge_count, 0);
        assert_eq!(analytics.communities.len(), 1);
        assert_eq!(analytics.components.len(), 1);
        assert!(analytics.components[0].is_main);
        assert!((analytics.metrics["lonely"].pagerank - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_request_deserializes_tagged_query() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "edges": [{"from": "a", "to": "b"}, {"from": "b", "to": "c", "weight": 2.0}],
            "query": {"type": "k_shortest_paths", "source": "a", "target": "c", "k": 2}
        }))
        .unwrap();
        assert!(!request.directed);
        assert_eq!(request.query.name(), "k_shortest_paths");

        let query: AnalysisQuery = serde_json::from_value(json!({"type": "page_rank"})).unwrap();
        assert!(matches!(query, AnalysisQuery::PageRank { personalization: None }));
        let query: AnalysisQuery = serde_json::from_value(json!({"type": "hits"})).unwrap();
        assert_eq!(query.name(), "hits");
    }

    #[test]
    fn test_selectors_parse() {
        assert_eq!("weighted-betweenness".parse::<CentralityMeasure>().unwrap(), CentralityMeasure::WeightedBetweenness);
        assert_eq!(CentralityMeasure::Katz.to_string(), "katz");
        assert_eq!("LPA".parse::<CommunityMethod>().unwrap(), CommunityMethod::LabelPropagation);
        assert!("spectral".parse::<CommunityMethod>().is_err());
    }

    #[test]
    fn test_run_query_paths_include_diversity() {
        let graph = GraphModel::build(
            &[Edge::new("s", "a"), Edge::new("a", "t"), Edge::new("s", "b"), Edge::new("b", "t")],
            true,
        )
        .unwrap();
        let query = AnalysisQuery::SimplePaths {
            source: "s".to_string(),
            target: "t".to_string(),
            constraints: None,
        };
        match run_query(&graph, &query, &AnalyticsConfig::default()).unwrap() {
            AnalysisOutcome::Paths { paths, diversity } => {
                assert_eq!(paths.len(), 2);
                assert!((diversity - 0.5).abs() < 1e-12);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_shortest_path() {
        let request = AnalysisRequest {
            edges: vec![Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "D")],
            nodes: vec![],
            directed: false,
            query: AnalysisQuery::ShortestPath {
                source: "A".to_string(),
                target: "D".to_string(),
            },
        };
        let report = engine().analyze(request).await.unwrap();
        assert_eq!(report.node_count, 4);
        assert_eq!(report.edge_count, 3);
        match report.outcome {
            AnalysisOutcome::ShortestPath(Some(path)) => {
                assert_eq!(path.path, vec!["A", "B", "C", "D"]);
                assert!((path.distance - 3.0).abs() < 1e-12);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let age = Utc::now() - report.computed_at;
        assert!(age.num_seconds() < 5);
    }

    #[tokio::test]
    async fn test_analyze_propagates_errors() {
        let request = AnalysisRequest {
            edges: vec![Edge::new("A", "B")],
            nodes: vec![],
            directed: true,
            query: AnalysisQuery::ShortestPath {
                source: "A".to_string(),
                target: "Z".to_string(),
            },
        };
        let err = engine().analyze(request).await.unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound("Z".to_string()));

        let empty = AnalysisRequest {
            edges: vec![],
            nodes: vec![],
            directed: true,
            query: AnalysisQuery::Summary,
        };
        assert_eq!(engine().analyze(empty).await.unwrap_err(), GraphError::EmptyGraph);
    }

    #[tokio::test]
    async fn test_analyze_rejects_large_graphs() {
        let limits = EngineConfig {
            max_concurrent_jobs: 1,
            max_nodes: 3,
            max_edges: 10,
        };
        let engine = GraphAnalyticsEngine::new(AnalyticsConfig::default(), limits);
        let request = AnalysisRequest {
            edges: vec![Edge::new("a", "b"), Edge::new("c", "d")],
            nodes: vec![],
            directed: true,
            query: AnalysisQuery::Hits,
        };
        let err = engine.analyze(request).await.unwrap_err();
        assert!(matches!(err, GraphError::GraphTooLarge { nodes: 4, .. }));
    }

    #[tokio::test]
    async fn test_graph_build_waits_for_a_permit() {
        let limits = EngineConfig {
            max_concurrent_jobs: 1,
            ..EngineConfig::default()
        };
        let engine = GraphAnalyticsEngine::new(AnalyticsConfig::default(), limits);
        let empty = AnalysisRequest {
            edges: vec![],
            nodes: vec![],
            directed: false,
            query: AnalysisQuery::Summary,
        };

        // While every permit is held the request must not even build its graph
        let held = engine.permits.clone().acquire_owned().await.unwrap();
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            engine.analyze(empty.clone()),
        )
        .await;
        assert!(pending.is_err());

        drop(held);
        assert_eq!(engine.analyze(empty).await.unwrap_err(), GraphError::EmptyGraph);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_permits() {
        let limits = EngineConfig {
            max_concurrent_jobs: 1,
            ..EngineConfig::default()
        };
        let engine: Arc<dyn AnalyticsEngine> =
            Arc::new(GraphAnalyticsEngine::new(AnalyticsConfig::default(), limits));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.summarize(two_cluster_edges(), false).await
            }));
        }
        for handle in handles {
            let analytics = handle.await.unwrap().unwrap();
            assert_eq!(analytics.node_count, 10);
            assert_eq!(analytics.communities.len(), 2);
        }
    }
}
