//! Graph Intel
//!
//! An in-process analytics engine for weighted relationship graphs (actors,
//! campaigns, assets, network hosts) with:
//! - Shortest and k-shortest paths (Dijkstra, Yen)
//! - Centrality (degree, betweenness, closeness, harmonic, eigenvector, Katz)
//! - Community detection (Louvain, label propagation, Girvan–Newman, agglomerative)
//! - Constrained path enumeration (attack chains, cycles, critical nodes)
//! - Link-analysis rankings (PageRank, personalised PageRank, HITS)

pub mod error;
pub mod graph;

pub use error::{GraphError, Result as GraphResult};

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use graph::engine::EngineConfig;
use graph::models::AnalyticsConfig;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    /// Algorithm defaults
    pub analytics: AnalyticsConfig,
    /// Engine admission limits
    pub engine: EngineConfig,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub analytics: AnalyticsConfig,
    pub engine: EngineConfig,
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "graph-intel.yaml" in CWD. If the file
    /// doesn't exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Apply env var overrides
        let engine = EngineConfig {
            max_concurrent_jobs: env_usize("GRAPH_INTEL_MAX_JOBS")
                .unwrap_or(yaml.engine.max_concurrent_jobs),
            max_nodes: env_usize("GRAPH_INTEL_MAX_NODES").unwrap_or(yaml.engine.max_nodes),
            max_edges: env_usize("GRAPH_INTEL_MAX_EDGES").unwrap_or(yaml.engine.max_edges),
        };
        Ok(Self {
            analytics: yaml.analytics,
            engine,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("graph-intel.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
