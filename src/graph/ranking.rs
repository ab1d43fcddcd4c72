//! Link-analysis rankings: PageRank (plain, personalised, topic-sensitive)
//! and HITS.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::centrality::{l2_normalize, max_change};
use super::models::{rank_scores, scores_by_id, AnalyticsConfig, GraphModel, NodeId, RankedNode};
use crate::error::{GraphError, Result};

// ============================================================================
// PageRank
// ============================================================================

/// Parameters for PageRank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankOptions {
    /// Damping factor (default: 0.85)
    pub damping_factor: f64,
    /// Stop when the total absolute change falls below this (default: 1e-6)
    pub convergence_threshold: f64,
    /// Default: 100
    pub max_iterations: usize,
    /// Teleport distribution over seed nodes; uniform when `None`.
    /// Weights are normalised to sum to 1.
    pub personalization: Option<BTreeMap<NodeId, f64>>,
    /// Length of `top_nodes` (default: 10)
    pub top_n: usize,
}

impl Default for PageRankOptions {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            convergence_threshold: 1e-6,
            max_iterations: 100,
            personalization: None,
            top_n: 10,
        }
    }
}

impl From<&AnalyticsConfig> for PageRankOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            damping_factor: config.pagerank_damping,
            convergence_threshold: config.pagerank_tolerance,
            max_iterations: config.pagerank_max_iterations,
            personalization: None,
            top_n: config.top_n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRankResult {
    pub iterations: usize,
    pub converged: bool,
    /// Sums to 1 over all nodes
    pub ranks: BTreeMap<NodeId, f64>,
    pub top_nodes: Vec<RankedNode>,
}

/// Resolve the teleport vector: uniform, or the normalised personalisation.
fn teleport_vector(graph: &GraphModel, personalization: Option<&BTreeMap<NodeId, f64>>) -> Result<Vec<f64>> {
    let n = graph.node_count();
    let Some(seeds) = personalization else {
        return Ok(vec![1.0 / n as f64; n]);
    };

    let mut t = vec![0.0; n];
    for (id, &weight) in seeds {
        let i = graph.require(id)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(GraphError::invalid_parameter(
                "personalization",
                format!("weight for {} must be a non-negative number, got {}", id, weight),
            ));
        }
        t[i] += weight;
    }
    let total: f64 = t.iter().sum();
    if total <= 0.0 {
        return Err(GraphError::invalid_parameter(
            "personalization",
            "weights must not all be zero",
        ));
    }
    for v in t.iter_mut() {
        *v /= total;
    }
    Ok(t)
}

/// Weighted PageRank by power iteration.
///
/// `rank(v) = (1 − d)·t(v) + d·Σ_{u→v} rank(u)·w(u,v)/out(u)` where `t` is
/// the teleport vector. Rank held by nodes without outgoing weight is
/// redistributed along `t`. Undirected graphs follow both directions of
/// every edge. Final ranks are renormalised to sum to 1.
pub fn pagerank(graph: &GraphModel, options: &PageRankOptions) -> Result<PageRankResult> {
    let d = options.damping_factor;
    if !(0.0..=1.0).contains(&d) {
        return Err(GraphError::invalid_parameter("damping_factor", "must be within [0, 1]"));
    }
    let n = graph.node_count();
    let mut out_weight = vec![0.0; n];
    for (u, total) in out_weight.iter_mut().enumerate() {
        for &(v, w) in graph.out_edges(u) {
            if w < 0.0 {
                return Err(GraphError::InvalidWeight {
                    from: graph.id(u).to_string(),
                    to: graph.id(v).to_string(),
                    weight: w,
                });
            }
            *total += w;
        }
    }
    let teleport = teleport_vector(graph, options.personalization.as_ref())?;

    // Initialize all scores to 1/n
    let mut scores = vec![1.0 / n as f64; n];
    let mut new_scores = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;

        let dangling: f64 = (0..n)
            .filter(|&u| out_weight[u] <= 0.0)
            .map(|u| scores[u])
            .sum();
        for (v, s) in new_scores.iter_mut().enumerate() {
            *s = (1.0 - d) * teleport[v] + d * dangling * teleport[v];
        }

        // Distribute scores along weighted out-edges
        for u in 0..n {
            if out_weight[u] > 0.0 {
                let share = d * scores[u] / out_weight[u];
                for &(v, w) in graph.out_edges(u) {
                    new_scores[v] += share * w;
                }
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(&new_scores)
            .map(|(a, b)| (a - b).abs())
            .sum();
        std::mem::swap(&mut scores, &mut new_scores);

        if diff < options.convergence_threshold {
            converged = true;
            break;
        }
    }

    // Normalize to sum = 1.0
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    }

    if converged {
        tracing::debug!("pagerank converged after {} iterations", iterations);
    } else {
        tracing::warn!("pagerank did not converge within {} iterations", options.max_iterations);
    }

    let ranks = scores_by_id(graph, &scores);
    let mut top_nodes = rank_scores(&ranks);
    top_nodes.truncate(options.top_n);
    Ok(PageRankResult {
        iterations,
        converged,
        ranks,
        top_nodes,
    })
}

/// PageRank personalised towards `seeds` (weights normalised).
pub fn personalized_pagerank(
    graph: &GraphModel,
    seeds: &BTreeMap<NodeId, f64>,
    options: &PageRankOptions,
) -> Result<PageRankResult> {
    let options = PageRankOptions {
        personalization: Some(seeds.clone()),
        ..options.clone()
    };
    pagerank(graph, &options)
}

/// One personalised PageRank per topic, teleporting uniformly over the
/// topic's seed nodes.
pub fn topic_sensitive_pagerank(
    graph: &GraphModel,
    topics: &BTreeMap<String, Vec<NodeId>>,
    options: &PageRankOptions,
) -> Result<BTreeMap<String, PageRankResult>> {
    let mut results = BTreeMap::new();
    for (topic, seeds) in topics {
        if seeds.is_empty() {
            return Err(GraphError::invalid_parameter(
                "topics",
                format!("topic {} has no seed nodes", topic),
            ));
        }
        let uniform: BTreeMap<NodeId, f64> = seeds.iter().map(|id| (id.clone(), 1.0)).collect();
        results.insert(topic.clone(), personalized_pagerank(graph, &uniform, options)?);
    }
    Ok(results)
}

// ============================================================================
// HITS
// ============================================================================

/// Parameters for HITS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitsOptions {
    /// Default: 100
    pub max_iterations: usize,
    /// Early exit on the max change of either vector; 0.0 runs every
    /// iteration (default: 1e-6)
    pub tolerance: f64,
    /// Length of the top lists (default: 10)
    pub top_n: usize,
}

impl Default for HitsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
            top_n: 10,
        }
    }
}

impl From<&AnalyticsConfig> for HitsOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            max_iterations: config.hits_max_iterations,
            tolerance: config.hits_tolerance,
            top_n: config.top_n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsResult {
    pub iterations: usize,
    pub converged: bool,
    pub authorities: BTreeMap<NodeId, f64>,
    pub hubs: BTreeMap<NodeId, f64>,
    pub top_authorities: Vec<RankedNode>,
    pub top_hubs: Vec<RankedNode>,
}

/// HITS hub and authority scores on the weighted adjacency.
///
/// Each round sets `auth(v) = Σ_{u→v} w·hub(u)`, then
/// `hub(u) = Σ_{u→v} w·auth(v)`, L2-normalising both.
pub fn hits(graph: &GraphModel, options: &HitsOptions) -> HitsResult {
    let n = graph.node_count();
    let start = 1.0 / (n as f64).sqrt();
    let mut auth = vec![start; n];
    let mut hub = vec![start; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;
        let mut next_auth: Vec<f64> = (0..n)
            .map(|v| graph.in_edges(v).iter().map(|&(u, w)| w * hub[u]).sum())
            .collect();
        l2_normalize(&mut next_auth);
        let mut next_hub: Vec<f64> = (0..n)
            .map(|u| graph.out_edges(u).iter().map(|&(v, w)| w * next_auth[v]).sum())
            .collect();
        l2_normalize(&mut next_hub);

        let change = max_change(&auth, &next_auth).max(max_change(&hub, &next_hub));
        auth = next_auth;
        hub = next_hub;
        if change < options.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        tracing::debug!("hits converged after {} iterations", iterations);
    } else if options.tolerance > 0.0 {
        tracing::warn!("hits did not converge within {} iterations", options.max_iterations);
    }

    let authorities = scores_by_id(graph, &auth);
    let hubs = scores_by_id(graph, &hub);
    let mut top_authorities = rank_scores(&authorities);
    top_authorities.truncate(options.top_n);
    let mut top_hubs = rank_scores(&hubs);
    top_hubs.truncate(options.top_n);
    HitsResult {
        iterations,
        converged,
        authorities,
        hubs,
        top_authorities,
        top_hubs,
    }
}

// ============================================================================
// Tests
// ============================================================================
