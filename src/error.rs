//! Error type shared by every analytics component.
//!
//! Only misuse is reported as an error (unknown node ids, bad weights, bad
//! parameters). Outcomes that are a normal part of graph topology, such as an
//! unreachable target or a power iteration that ran out of iterations, are
//! encoded in the result values instead.

use thiserror::Error;

/// Errors returned by graph construction and the analytics algorithms.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// No edges and no explicit nodes were supplied.
    #[error("graph is empty: supply at least one edge or node")]
    EmptyGraph,

    /// A node id passed as a parameter does not exist in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A weight that the algorithm cannot work with (negative weight consulted
    /// by a shortest-path search, or a non-finite weight at build time).
    #[error("invalid weight {weight} on edge {from} -> {to}")]
    InvalidWeight {
        from: String,
        to: String,
        weight: f64,
    },

    /// An algorithm parameter is out of its accepted range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The engine refused a graph above its configured size limits.
    #[error("graph too large: {nodes} nodes / {edges} edges (limits: {max_nodes} / {max_edges})")]
    GraphTooLarge {
        nodes: usize,
        edges: usize,
        max_nodes: usize,
        max_edges: usize,
    },

    /// The blocking task running an analysis panicked or was cancelled.
    #[error("analysis task failed: {0}")]
    TaskFailed(String),
}

impl GraphError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;
