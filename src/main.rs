//! Graph Intel - Command-line analytics
//!
//! Loads an edge list from a JSON file, runs one analysis and prints the
//! report as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graph_intel::graph::community::Linkage;
use graph_intel::graph::engine::{CentralityMeasure, CommunityMethod};
use graph_intel::graph::{
    AnalysisQuery, AnalysisRequest, AnalyticsEngine, Edge, GraphAnalyticsEngine, PathConstraints,
};
use graph_intel::Config;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "graph-intel")]
#[command(about = "Graph analytics over weighted relationship graphs")]
struct Cli {
    /// JSON file holding an array of edges: [{"from", "to", "weight"?}]
    #[arg(long, env = "GRAPH_INTEL_EDGES")]
    edges: PathBuf,

    /// Treat edges as undirected
    #[arg(long)]
    undirected: bool,

    /// YAML config file (default: graph-intel.yaml)
    #[arg(long, env = "GRAPH_INTEL_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cheapest path between two nodes
    ShortestPath { source: String, target: String },

    /// The k cheapest simple paths between two nodes
    KShortest {
        source: String,
        target: String,
        #[arg(short, default_value = "3")]
        k: usize,
    },

    /// Per-node centrality scores
    Centrality {
        /// degree, betweenness, weighted-betweenness, closeness, harmonic, eigenvector, katz
        #[arg(long, default_value = "degree")]
        measure: CentralityMeasure,
    },

    /// Community detection
    Communities {
        /// louvain, label-propagation, girvan-newman, hierarchical
        #[arg(long, default_value = "louvain")]
        method: CommunityMethod,

        /// Number of communities for girvan-newman / hierarchical
        #[arg(long)]
        target: Option<usize>,

        /// single, complete, average (hierarchical only)
        #[arg(long, default_value = "average")]
        linkage: Linkage,
    },

    /// PageRank, optionally personalised
    Pagerank {
        /// Personalisation seed as id=weight (repeatable)
        #[arg(long = "seed", value_parser = parse_seed)]
        seeds: Vec<(String, f64)>,
    },

    /// HITS hub and authority scores
    Hits,

    /// Enumerate simple paths between two nodes
    Paths {
        source: String,
        target: String,
        #[command(flatten)]
        limits: PathArgs,
    },

    /// Enumerate simple cycles through a node
    Cycles {
        start: String,
        #[command(flatten)]
        limits: PathArgs,
    },

    /// Nodes that lie on every path between two nodes
    Critical {
        source: String,
        target: String,
        #[command(flatten)]
        limits: PathArgs,
    },

    /// Per-node summary metrics, communities and components
    Summary,
}

#[derive(clap::Args)]
struct PathArgs {
    /// Maximum path length in edges
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum number of paths
    #[arg(long)]
    max_paths: Option<usize>,

    /// Node that paths must avoid (repeatable)
    #[arg(long = "forbid")]
    forbidden: Vec<String>,

    /// Node that paths must contain (repeatable)
    #[arg(long = "require")]
    required: Vec<String>,
}

impl PathArgs {
    fn constraints(self, base: PathConstraints) -> PathConstraints {
        PathConstraints {
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            max_paths: self.max_paths.unwrap_or(base.max_paths),
            forbidden_nodes: self.forbidden,
            required_nodes: self.required,
            ..base
        }
    }
}

fn parse_seed(s: &str) -> std::result::Result<(String, f64), String> {
    let (id, weight) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected id=weight, got {}", s))?;
    let weight: f64 = weight
        .parse()
        .map_err(|e| format!("invalid weight in {}: {}", s, e))?;
    Ok((id.to_string(), weight))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,graph_intel=info".into());
    let json_layer = cli
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!cli.log_json)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    // Load configuration
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    let raw = std::fs::read_to_string(&cli.edges)
        .with_context(|| format!("failed to read {}", cli.edges.display()))?;
    let edges: Vec<Edge> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse edges from {}", cli.edges.display()))?;

    let base_constraints = PathConstraints::from(&config.analytics);
    let query = match cli.command {
        Commands::ShortestPath { source, target } => AnalysisQuery::ShortestPath { source, target },
        Commands::KShortest { source, target, k } => {
            AnalysisQuery::KShortestPaths { source, target, k }
        }
        Commands::Centrality { measure } => AnalysisQuery::Centrality { measure },
        Commands::Communities {
            method,
            target,
            linkage,
        } => AnalysisQuery::Communities {
            method,
            target_communities: target,
            linkage,
        },
        Commands::Pagerank { seeds } => {
            let personalization = (!seeds.is_empty())
                .then(|| seeds.into_iter().collect::<BTreeMap<String, f64>>());
            AnalysisQuery::PageRank { personalization }
        }
        Commands::Hits => AnalysisQuery::Hits,
        Commands::Paths {
            source,
            target,
            limits,
        } => AnalysisQuery::SimplePaths {
            source,
            target,
            constraints: Some(limits.constraints(base_constraints)),
        },
        Commands::Cycles { start, limits } => AnalysisQuery::Cycles {
            start,
            constraints: Some(limits.constraints(base_constraints)),
        },
        Commands::Critical {
            source,
            target,
            limits,
        } => AnalysisQuery::CriticalNodes {
            source,
            target,
            constraints: Some(limits.constraints(base_constraints)),
        },
        Commands::Summary => AnalysisQuery::Summary,
    };

    let engine = GraphAnalyticsEngine::new(config.analytics, config.engine);
    let report = engine
        .analyze(AnalysisRequest {
            edges,
            nodes: Vec::new(),
            directed: !cli.undirected,
            query,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
