//! Risk scoring interface: pluggable edge scorers and the engine that turns
//! their output into transaction- and account-level risk.

use crate::config::{AppConfig, ScoringBackend};
use crate::error::{GraphGuardError, Result};
use crate::graph::edges::{TransactionGraph, EDGE_FEATURE_DIM};
use crate::models::aggregator::NodeAggregation;
use crate::models::gnn::GraphSageGat;
use crate::models::loader::ModelWeights;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Whether a model's scalar output is a logit or already a probability.
/// Training and inference must agree on this.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Squashed with a sigmoid.
    #[default]
    Logit,
    /// Clamped to [0, 1].
    Probability,
}

impl OutputKind {
    pub fn to_probability(&self, raw: f64) -> f64 {
        match self {
            OutputKind::Logit => 1.0 / (1.0 + (-raw).exp()),
            OutputKind::Probability => raw.clamp(0.0, 1.0),
        }
    }
}

/// Anything that can assign one risk score per transaction.
///
/// Implementations consume the directed edge list and edge feature matrix
/// of `graph` and must return exactly `graph.num_edges()` scores in [0, 1],
/// aligned with edge order.
pub trait EdgeScorer {
    /// Backend name for logs.
    fn name(&self) -> &str;

    fn score(&self, graph: &TransactionGraph) -> Result<Vec<f64>>;
}

/// Scores produced outside this process, read from a JSON array.
pub struct PrecomputedScores {
    source: PathBuf,
    scores: Vec<f64>,
}

impl PrecomputedScores {
    pub fn new(scores: Vec<f64>) -> Self {
        Self {
            source: PathBuf::from("<memory>"),
            scores,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let scores: Vec<f64> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), count = scores.len(), "Precomputed scores loaded");
        Ok(Self {
            source: path.to_path_buf(),
            scores,
        })
    }
}

impl EdgeScorer for PrecomputedScores {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn score(&self, graph: &TransactionGraph) -> Result<Vec<f64>> {
        if self.scores.len() != graph.num_edges() {
            return Err(GraphGuardError::ScoreCountMismatch {
                expected: graph.num_edges(),
                actual: self.scores.len(),
            });
        }
        debug!(source = %self.source.display(), "Serving precomputed scores");
        Ok(self.scores.clone())
    }
}

/// Per-transaction and per-account risk for one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    /// Aligned with edge order
    pub edge_scores: Vec<f64>,
    /// Indexed by node id
    pub node_scores: Vec<f64>,
}

/// Runs an [`EdgeScorer`] and pools its output per account.
pub struct ScoringEngine {
    scorer: Box<dyn EdgeScorer>,
    aggregation: NodeAggregation,
}

impl ScoringEngine {
    pub fn new(scorer: Box<dyn EdgeScorer>, aggregation: NodeAggregation) -> Self {
        Self {
            scorer,
            aggregation,
        }
    }

    /// Build the configured backend for `graph`.
    pub fn from_config(config: &AppConfig, graph: &TransactionGraph) -> Result<Self> {
        let scoring = &config.scoring;
        let scorer: Box<dyn EdgeScorer> = match scoring.backend {
            ScoringBackend::Gnn => {
                let weights = match &scoring.weights_path {
                    Some(path) => ModelWeights::load(path)?,
                    None => {
                        info!(seed = scoring.seed, "No weights configured, using seeded initialisation");
                        ModelWeights::initialize(
                            graph.num_nodes(),
                            scoring.embedding_dim,
                            scoring.heads,
                            scoring.hidden_dim,
                            EDGE_FEATURE_DIM,
                            scoring.seed,
                        )
                    }
                };
                Box::new(GraphSageGat::new(weights, scoring.output))
            }
            ScoringBackend::Precomputed => {
                let path = scoring.scores_path.as_deref().ok_or_else(|| {
                    GraphGuardError::Scoring("scoring.scores_path is not set".to_string())
                })?;
                Box::new(PrecomputedScores::load(path)?)
            }
            #[cfg(feature = "onnx")]
            ScoringBackend::Onnx => {
                let path = scoring.model_path.as_deref().ok_or_else(|| {
                    GraphGuardError::Scoring("scoring.model_path is not set".to_string())
                })?;
                Box::new(crate::models::onnx::OnnxEdgeScorer::load(
                    path,
                    scoring.onnx_threads,
                    scoring.output,
                )?)
            }
            #[cfg(not(feature = "onnx"))]
            ScoringBackend::Onnx => {
                return Err(GraphGuardError::Scoring(
                    "onnx backend requires building with the `onnx` feature".to_string(),
                ))
            }
        };

        Ok(Self::new(scorer, config.triage.aggregation))
    }

    pub fn backend(&self) -> &str {
        self.scorer.name()
    }

    pub fn aggregation(&self) -> NodeAggregation {
        self.aggregation
    }

    /// Score every transaction, then every account.
    pub fn score(&self, graph: &TransactionGraph) -> Result<ScoreResult> {
        let edge_scores = self.scorer.score(graph)?;

        if edge_scores.len() != graph.num_edges() {
            return Err(GraphGuardError::ScoreCountMismatch {
                expected: graph.num_edges(),
                actual: edge_scores.len(),
            });
        }
        if let Some(bad) = edge_scores
            .iter()
            .position(|s| !s.is_finite() || !(0.0..=1.0).contains(s))
        {
            return Err(GraphGuardError::Scoring(format!(
                "{} produced out-of-range score {} for transaction {}",
                self.scorer.name(),
                edge_scores[bad],
                bad
            )));
        }

        let node_scores = self
            .aggregation
            .aggregate(graph.num_nodes(), graph.edges(), &edge_scores)?;

        info!(
            backend = self.scorer.name(),
            aggregation = ?self.aggregation,
            transactions = edge_scores.len(),
            accounts = node_scores.len(),
            "Risk scoring complete"
        );

        Ok(ScoreResult {
            edge_scores,
            node_scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use crate::types::transaction::LedgerRow;

    fn graph() -> TransactionGraph {
        let rows = vec![
            LedgerRow::new("2022/09/01 00:10", ("A", "1"), ("B", "1"), 10.0, "ACH", 0),
            LedgerRow::new("2022/09/01 00:20", ("B", "1"), ("C", "1"), 20.0, "Wire", 1),
        ];
        GraphBuilder::default().build(&rows).unwrap().graph
    }

    #[test]
    fn test_output_kind() {
        assert!((OutputKind::Logit.to_probability(0.0) - 0.5).abs() < 1e-12);
        assert!(OutputKind::Logit.to_probability(50.0) <= 1.0);
        assert_eq!(OutputKind::Probability.to_probability(1.7), 1.0);
        assert_eq!(OutputKind::Probability.to_probability(-0.2), 0.0);
    }

    #[test]
    fn test_precomputed_engine() {
        let engine = ScoringEngine::new(
            Box::new(PrecomputedScores::new(vec![0.3, 0.9])),
            NodeAggregation::Max,
        );
        let result = engine.score(&graph()).unwrap();

        assert_eq!(result.edge_scores, vec![0.3, 0.9]);
        assert_eq!(result.node_scores, vec![0.3, 0.9, 0.9]);
    }

    #[test]
    fn test_precomputed_length_mismatch() {
        let engine = ScoringEngine::new(
            Box::new(PrecomputedScores::new(vec![0.3])),
            NodeAggregation::Max,
        );
        assert!(matches!(
            engine.score(&graph()),
            Err(GraphGuardError::ScoreCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_out_of_range_scores_rejected() {
        let engine = ScoringEngine::new(
            Box::new(PrecomputedScores::new(vec![0.3, 1.5])),
            NodeAggregation::Max,
        );
        assert!(matches!(engine.score(&graph()), Err(GraphGuardError::Scoring(_))));
    }

    #[test]
    fn test_engine_from_default_config() {
        let graph = graph();
        let engine = ScoringEngine::from_config(&AppConfig::default(), &graph).unwrap();
        let result = engine.score(&graph).unwrap();

        assert_eq!(engine.backend(), "graphsage-gat");
        assert_eq!(result.edge_scores.len(), 2);
        assert!(result.edge_scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
