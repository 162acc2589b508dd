//! Error types for the risk-scoring pipeline.

use thiserror::Error;

/// Result type alias using `GraphGuardError`.
pub type Result<T> = std::result::Result<T, GraphGuardError>;

/// Errors surfaced by the graph pipeline, scoring backends and lookups.
///
/// Data-quality problems (unparseable timestamps, missing amounts) are not
/// errors: they are filtered or defaulted and counted in the build report.
#[derive(Debug, Error)]
pub enum GraphGuardError {
    /// Composite node key was not seen when the registry was fitted.
    #[error("Node key not found: {0}")]
    NodeNotFound(String),

    /// Node id outside `[0, num_nodes)`.
    #[error("Node id {id} out of range (num_nodes: {num_nodes})")]
    NodeIdOutOfRange {
        /// Requested id.
        id: usize,
        /// Registry size.
        num_nodes: usize,
    },

    /// Persisted node mapping lists the same key twice.
    #[error("Duplicate node key in mapping: {0}")]
    DuplicateNode(String),

    /// Persisted node mapping row is not a valid composite key.
    #[error("Malformed node key: {0}")]
    MalformedNodeKey(String),

    /// Account number is unknown to the node mapping or risk table.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account index points at a transaction the graph does not have.
    #[error("Transaction {id} out of range (num_edges: {num_edges})")]
    TransactionOutOfRange { id: usize, num_edges: usize },

    /// Parallel edge arrays disagree on length.
    #[error("Edge arrays misaligned: {column} has {actual} rows, expected {expected}")]
    AlignmentViolation {
        /// Offending column.
        column: &'static str,
        /// Expected row count (the edge list length).
        expected: usize,
        /// Actual row count.
        actual: usize,
    },

    /// Edge timestamps go backwards.
    #[error("Edge {edge} has timestamp {timestamp} earlier than its predecessor {previous}")]
    TemporalOrder {
        /// Edge (transaction) id.
        edge: usize,
        /// Its timestamp.
        timestamp: i64,
        /// Timestamp of edge `edge - 1`.
        previous: i64,
    },

    /// Edge references a node id the graph does not contain.
    #[error("Edge {edge} references node {node} but graph has {num_nodes} nodes")]
    DanglingEdge {
        /// Edge (transaction) id.
        edge: usize,
        /// Node id referenced.
        node: usize,
        /// Number of nodes in the graph.
        num_nodes: usize,
    },

    /// Required ledger column is absent from the header row.
    #[error("Ledger is missing required column: {0}")]
    MissingColumn(String),

    /// Model weight tensor has the wrong shape.
    #[error("Shape mismatch for {name}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Parameter name.
        name: String,
        /// Expected shape.
        expected: String,
        /// Actual shape.
        actual: String,
    },

    /// Scoring backend returned a score vector of the wrong length.
    #[error("Score count mismatch: expected {expected} scores, got {actual}")]
    ScoreCountMismatch {
        /// Expected count (edges or nodes).
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// Scoring backend failure.
    #[error("Scoring failed: {0}")]
    Scoring(String),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
