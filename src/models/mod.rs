//! Risk scoring: edge scorers, GNN weights and account-level aggregation

pub mod aggregator;
pub mod gnn;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use aggregator::NodeAggregation;
pub use gnn::GraphSageGat;
pub use inference::{EdgeScorer, OutputKind, PrecomputedScores, ScoreResult, ScoringEngine};
pub use loader::ModelWeights;
