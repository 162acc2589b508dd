//! Aggregation of transaction-level risk into account-level risk.

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::EdgeTable;
use serde::Deserialize;

/// How the scores of a node's incident transactions are pooled.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeAggregation {
    /// An account is as risky as its riskiest transaction.
    #[default]
    Max,
    /// Average over incident transactions.
    Mean,
    /// Median over incident transactions.
    Median,
}

impl NodeAggregation {
    /// Pool per-edge scores into one score per node.
    ///
    /// A transaction contributes to both its source and destination (once
    /// for a self-transfer). Nodes with no incident transactions score 0.0.
    pub fn aggregate(
        &self,
        num_nodes: usize,
        edges: &EdgeTable,
        edge_scores: &[f64],
    ) -> Result<Vec<f64>> {
        if edge_scores.len() != edges.len() {
            return Err(GraphGuardError::ScoreCountMismatch {
                expected: edges.len(),
                actual: edge_scores.len(),
            });
        }

        let mut incident: Vec<Vec<f64>> = vec![Vec::new(); num_nodes];
        for edge in edges.iter() {
            let score = edge_scores[edge.id];
            incident[edge.src].push(score);
            if edge.dst != edge.src {
                incident[edge.dst].push(score);
            }
        }

        Ok(incident.iter().map(|scores| self.pool(scores)).collect())
    }

    /// Pool one node's scores.
    pub fn pool(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        match self {
            NodeAggregation::Max => max_score(scores),
            NodeAggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            NodeAggregation::Median => median_score(scores),
        }
    }
}

/// Get the maximum score.
pub fn max_score(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(0.0, f64::max)
}

/// Get the median score.
pub fn median_score(scores: &[f64]) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    if sorted.is_empty() {
        return 0.0;
    }

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges() -> EdgeTable {
        // 0 -> 1, 1 -> 2, 2 -> 2
        EdgeTable::new(
            vec![0, 1, 2],
            vec![1, 2, 2],
            vec![[0.0; 3]; 3],
            vec![1, 2, 3],
            vec![0, 0, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_max_aggregation() {
        let scores = NodeAggregation::Max
            .aggregate(4, &edges(), &[0.2, 0.9, 0.4])
            .unwrap();
        assert_eq!(scores, vec![0.2, 0.9, 0.9, 0.0]);
    }

    #[test]
    fn test_mean_aggregation() {
        let scores = NodeAggregation::Mean
            .aggregate(3, &edges(), &[0.2, 0.8, 0.5])
            .unwrap();
        assert!((scores[1] - 0.5).abs() < 1e-12);
        assert!((scores[2] - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_median_score() {
        assert!((median_score(&[0.9, 0.7, 0.5, 0.3, 0.1]) - 0.5).abs() < 1e-12);
        assert!((median_score(&[0.2, 0.4]) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_score_count_mismatch() {
        let err = NodeAggregation::Max.aggregate(3, &edges(), &[0.1]).unwrap_err();
        assert!(matches!(
            err,
            GraphGuardError::ScoreCountMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }
}
