//! Graph analytics engine.
//!
//! Provides in-process graph data science over an immutable, index-based
//! weighted graph built once per analysis call. Every algorithm is a pure,
//! synchronous function of `(&GraphModel, options)`; nothing is cached or
//! shared between calls.
//!
//! ## Architecture
//!
//! ```text
//! edge list ──► GraphBuilder ──► GraphModel
//!                                    │
//!        ┌────────────┬──────────────┼──────────────┬─────────────┐
//!  shortest_path  centrality     community        paths        ranking
//!        └────────────┴──────────────┼──────────────┴─────────────┘
//!                                    │
//!                    AnalyticsEngine (bounded blocking pool)
//! ```
//!
//! ## Modules
//!
//! - [`models`]: Graph model and shared result types (GraphModel, CommunityResult, GraphAnalytics, AnalyticsConfig)
//! - [`shortest_path`]: Dijkstra and Yen's k-shortest paths
//! - [`centrality`]: Degree, Brandes betweenness, closeness, harmonic, eigenvector, Katz
//! - [`community`]: Louvain, label propagation, Girvan–Newman, agglomerative, components
//! - [`paths`]: Constrained simple-path, cycle and critical-node enumeration
//! - [`ranking`]: PageRank (plain, personalised, topic-sensitive) and HITS
//! - [`engine`]: `AnalyticsEngine` trait, `GraphAnalyticsEngine`, summary analytics

pub mod centrality;
pub mod community;
pub mod engine;
pub mod models;
pub mod paths;
pub mod ranking;
pub mod shortest_path;

// Re-export primary types for convenience
pub use engine::{
    compute_all, AnalysisOutcome, AnalysisQuery, AnalysisReport, AnalysisRequest, AnalyticsEngine,
    EngineConfig, GraphAnalyticsEngine,
};
pub use models::{
    AnalyticsConfig, Community, CommunityResult, ComponentInfo, Edge, GraphAnalytics, GraphBuilder,
    GraphModel, NodeId, NodeMetrics, RankedNode,
};
pub use paths::{EnumeratedPath, PathConstraints};
pub use shortest_path::PathResult;
