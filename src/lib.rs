//! GraphGuard AML Risk-Scoring Library
//!
//! Turns a time-ordered transaction ledger into a directed multigraph,
//! scores every transaction with a pluggable edge scorer, pools the scores
//! per account and triages accounts for analyst review.

pub mod config;
pub mod error;
pub mod explorer;
pub mod feature_extractor;
pub mod graph;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod triage;
pub mod types;

pub use config::AppConfig;
pub use error::{GraphGuardError, Result};
pub use feature_extractor::FeatureExtractor;
pub use graph::{GraphBuilder, GraphStore, NodeKey, NodeRegistry, TransactionGraph};
pub use models::{EdgeScorer, NodeAggregation, ScoringEngine};
pub use triage::{build_triage_records, rank_and_bucket, AccountDirectory};
pub use types::{alert::TriageRecord, transaction::LedgerRow, AlertLevel, AlertPolicy};
