//! Configuration management for the risk-scoring pipeline

use crate::graph::registry::IdOrder;
use crate::models::aggregator::NodeAggregation;
use crate::models::inference::OutputKind;
use crate::types::alert::AlertPolicy;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Scoring backend for per-transaction risk
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoringBackend {
    /// Native GraphSAGE + GAT edge scorer
    #[default]
    Gnn,
    /// Per-transaction scores produced elsewhere, read from a JSON array
    Precomputed,
    /// Exported model run through ONNX Runtime (requires the `onnx` feature)
    Onnx,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub graph: GraphConfig,
    pub scoring: ScoringConfig,
    pub triage: TriageConfig,
    pub logging: LoggingConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw transaction ledger (CSV)
    pub ledger_path: String,
    /// Directory for graph artifacts and score tables
    pub output_dir: String,
    /// Optional account directory CSV (Account Number, Bank Name, Entity Name)
    pub account_directory: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ledger_path: "data/LI-Small_Trans.csv".to_string(),
            output_dir: "data/processed".to_string(),
            account_directory: None,
        }
    }
}

/// Graph construction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Node id assignment order
    pub id_order: IdOrder,
    /// Delimiter of persisted `"{account}_{bank}"` node keys
    pub key_delimiter: String,
    /// Category substituted for a missing payment format
    pub unknown_payment_format: String,
}

impl GraphConfig {
    /// First character of `key_delimiter`, `_` when empty.
    pub fn delimiter(&self) -> char {
        self.key_delimiter.chars().next().unwrap_or('_')
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            id_order: IdOrder::Lexicographic,
            key_delimiter: "_".to_string(),
            unknown_payment_format: "UNK".to_string(),
        }
    }
}

/// Risk scoring settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub backend: ScoringBackend,
    /// Trained GNN weights (JSON). Seeded initialisation when absent.
    pub weights_path: Option<String>,
    /// Precomputed per-transaction scores (JSON array)
    pub scores_path: Option<String>,
    /// ONNX model file
    pub model_path: Option<String>,
    /// Seed for weight initialisation
    pub seed: u64,
    /// Node embedding width
    pub embedding_dim: usize,
    /// Edge MLP hidden width
    pub hidden_dim: usize,
    /// GAT attention heads
    pub heads: usize,
    /// Whether the model emits logits or probabilities
    pub output: OutputKind,
    /// Intra-op threads for ONNX Runtime
    pub onnx_threads: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            backend: ScoringBackend::Gnn,
            weights_path: None,
            scores_path: None,
            model_path: None,
            seed: 42,
            embedding_dim: 32,
            hidden_dim: 32,
            heads: 2,
            output: OutputKind::Logit,
            onnx_threads: 1,
        }
    }
}

/// Ranking, bucketing and evaluation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Edge → account score aggregation
    pub aggregation: NodeAggregation,
    /// Alert level policy
    pub alert_policy: AlertPolicy,
    /// K% values for precision/recall evaluation
    pub k_percents: Vec<f64>,
    /// Transactions listed per account in drill-down
    pub drilldown_top_n: usize,
    /// Accounts offered by the explorer search unless show-all is set
    pub search_limit: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            aggregation: NodeAggregation::Max,
            alert_policy: AlertPolicy::default(),
            k_percents: vec![1.0, 5.0, 10.0],
            drilldown_top_n: 5,
            search_limit: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with `GRAPHGUARD__SECTION__KEY`
    /// environment variables taking precedence.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("GRAPHGUARD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Like [`AppConfig::load_from_path`], but a missing file yields the
    /// defaults (environment overrides still apply). The flag reports
    /// whether the file was read. A file that exists but fails to parse
    /// is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::load_from_path(path)
                .with_context(|| format!("Invalid configuration file {}", path.display()))?;
            return Ok((config, true));
        }

        let config = Config::builder()
            .add_source(Environment::with_prefix("GRAPHGUARD").separator("__"))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        Ok((config, false))
    }
}
