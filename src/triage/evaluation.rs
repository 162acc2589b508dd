//! Ranked-retrieval metrics under extreme class imbalance.
//!
//! Conditions that make a metric meaningless (no items selected, no
//! positives, a single class) are reported as [`MetricValue::Undefined`]
//! rather than collapsed into 0.0.

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::TransactionGraph;
use crate::types::alert::TriageRecord;
use serde::Serialize;
use std::fmt;

/// Why a metric could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    /// `k_percent` selects zero items
    ZeroK,
    /// No positive labels in the dataset
    NoPositives,
    /// Only one class present
    SingleClass,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UndefinedReason::ZeroK => "k rounds to zero items",
            UndefinedReason::NoPositives => "no positive labels",
            UndefinedReason::SingleClass => "only one class present",
        })
    }
}

/// A metric that is either a number or explicitly undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl MetricValue {
    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => write!(f, "{v:.4}"),
            MetricValue::Undefined(reason) => write!(f, "undefined ({reason})"),
        }
    }
}

fn check_lengths(y_true: &[u8], y_scores: &[f64]) -> Result<()> {
    if y_true.len() != y_scores.len() {
        return Err(GraphGuardError::ScoreCountMismatch {
            expected: y_true.len(),
            actual: y_scores.len(),
        });
    }
    Ok(())
}

/// `floor(n * k_percent / 100)`, capped at `n`.
fn top_k(n: usize, k_percent: f64) -> usize {
    ((n as f64 * k_percent / 100.0).floor().max(0.0) as usize).min(n)
}

/// Precision and recall over the top `floor(N * k_percent / 100)` items by
/// score. Equal scores are taken in input order.
pub fn precision_recall_at_k(
    y_true: &[u8],
    y_scores: &[f64],
    k_percent: f64,
) -> Result<(MetricValue, MetricValue)> {
    check_lengths(y_true, y_scores)?;

    let n = y_scores.len();
    let k = top_k(n, k_percent);
    if k == 0 {
        let undefined = MetricValue::Undefined(UndefinedReason::ZeroK);
        return Ok((undefined, undefined));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_scores[b].total_cmp(&y_scores[a]));

    let hits = order[..k].iter().filter(|&&i| y_true[i] == 1).count();
    let positives = y_true.iter().filter(|&&y| y == 1).count();

    let precision = MetricValue::Defined(hits as f64 / k as f64);
    let recall = if positives == 0 {
        MetricValue::Undefined(UndefinedReason::NoPositives)
    } else {
        MetricValue::Defined(hits as f64 / positives as f64)
    };
    Ok((precision, recall))
}

/// ROC-AUC via the Mann-Whitney U statistic, with tied scores given their
/// average rank.
pub fn auc(y_true: &[u8], y_scores: &[f64]) -> Result<MetricValue> {
    check_lengths(y_true, y_scores)?;

    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Ok(MetricValue::Undefined(UndefinedReason::SingleClass));
    }

    let mut order: Vec<usize> = (0..y_scores.len()).collect();
    order.sort_by(|&a, &b| y_scores[a].total_cmp(&y_scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_scores[order[end]] == y_scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based: the group covers start+1 ..= end
        let average_rank = (start + 1 + end) as f64 / 2.0;
        let group_positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        positive_rank_sum += average_rank * group_positives as f64;
        start = end;
    }

    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Ok(MetricValue::Defined(u / (p * negatives as f64)))
}

/// Precision and recall at one K%.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KMetrics {
    pub k_percent: f64,
    pub k: usize,
    pub precision: MetricValue,
    pub recall: MetricValue,
}

/// Evaluation summary for one set of scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub items: usize,
    pub positives: usize,
    pub auc: MetricValue,
    pub at_k: Vec<KMetrics>,
}

/// AUC plus precision/recall at each of `k_percents`.
pub fn evaluate(y_true: &[u8], y_scores: &[f64], k_percents: &[f64]) -> Result<EvaluationReport> {
    let at_k = k_percents
        .iter()
        .map(|&k_percent| -> Result<KMetrics> {
            let (precision, recall) = precision_recall_at_k(y_true, y_scores, k_percent)?;
            Ok(KMetrics {
                k_percent,
                k: top_k(y_scores.len(), k_percent),
                precision,
                recall,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EvaluationReport {
        items: y_true.len(),
        positives: y_true.iter().filter(|&&y| y == 1).count(),
        auc: auc(y_true, y_scores)?,
        at_k,
    })
}

/// Account-level ground truth: an account is positive when any of its
/// transactions is a known laundering transaction.
pub fn account_labels(graph: &TransactionGraph) -> Vec<u8> {
    let mut labels = vec![0u8; graph.num_nodes()];
    for edge in graph.edges().iter().filter(|e| e.label == 1) {
        labels[edge.src] = 1;
        labels[edge.dst] = 1;
    }
    labels
}

/// Per-node scores recovered from a risk table. Every node must appear
/// exactly once.
pub fn node_scores_from_records(records: &[TriageRecord], num_nodes: usize) -> Result<Vec<f64>> {
    let mut scores: Vec<Option<f64>> = vec![None; num_nodes];
    for record in records {
        let slot = scores
            .get_mut(record.node_id)
            .ok_or(GraphGuardError::NodeIdOutOfRange {
                id: record.node_id,
                num_nodes,
            })?;
        *slot = Some(record.risk_score);
    }

    let covered = scores.iter().filter(|s| s.is_some()).count();
    if records.len() != num_nodes || covered != num_nodes {
        return Err(GraphGuardError::ScoreCountMismatch {
            expected: num_nodes,
            actual: covered.min(records.len()),
        });
    }
    Ok(scores.into_iter().map(|s| s.unwrap_or_default()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_recall_at_40_percent() {
        let y_true = [0, 0, 1, 1, 0];
        let y_scores = [0.1, 0.2, 0.9, 0.8, 0.3];

        let (precision, recall) = precision_recall_at_k(&y_true, &y_scores, 40.0).unwrap();
        assert_eq!(precision, MetricValue::Defined(1.0));
        assert_eq!(recall, MetricValue::Defined(1.0));
    }

    #[test]
    fn test_partial_hits() {
        let y_true = [1, 0, 0, 1];
        let y_scores = [0.9, 0.8, 0.1, 0.2];

        let (precision, recall) = precision_recall_at_k(&y_true, &y_scores, 50.0).unwrap();
        assert_eq!(precision, MetricValue::Defined(0.5));
        assert_eq!(recall, MetricValue::Defined(0.5));
    }

    #[test]
    fn test_zero_k_is_undefined() {
        let (precision, recall) = precision_recall_at_k(&[1, 0, 0], &[0.9, 0.1, 0.2], 10.0).unwrap();
        assert_eq!(precision, MetricValue::Undefined(UndefinedReason::ZeroK));
        assert_eq!(recall, MetricValue::Undefined(UndefinedReason::ZeroK));
    }

    #[test]
    fn test_no_positives_recall_undefined() {
        let (precision, recall) = precision_recall_at_k(&[0, 0, 0, 0], &[0.9, 0.1, 0.2, 0.3], 50.0).unwrap();
        assert_eq!(precision, MetricValue::Defined(0.0));
        assert_eq!(recall, MetricValue::Undefined(UndefinedReason::NoPositives));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(precision_recall_at_k(&[0, 1], &[0.5], 50.0).is_err());
        assert!(auc(&[0, 1], &[0.5]).is_err());
    }

    #[test]
    fn test_auc() {
        assert_eq!(auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap(), MetricValue::Defined(1.0));
        assert_eq!(auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap(), MetricValue::Defined(0.0));
        // one inverted pair out of four
        assert_eq!(auc(&[0, 1, 0, 1], &[0.1, 0.3, 0.5, 0.9]).unwrap(), MetricValue::Defined(0.75));
    }

    #[test]
    fn test_auc_ties_count_half() {
        assert_eq!(auc(&[0, 1], &[0.5, 0.5]).unwrap(), MetricValue::Defined(0.5));
    }

    #[test]
    fn test_auc_single_class() {
        assert_eq!(
            auc(&[1, 1], &[0.5, 0.7]).unwrap(),
            MetricValue::Undefined(UndefinedReason::SingleClass)
        );
        assert_eq!(
            auc(&[], &[]).unwrap(),
            MetricValue::Undefined(UndefinedReason::SingleClass)
        );
    }

    #[test]
    fn test_evaluate_report() {
        let report = evaluate(&[0, 0, 1, 1, 0], &[0.1, 0.2, 0.9, 0.8, 0.3], &[20.0, 40.0, 10.0]).unwrap();

        assert_eq!(report.items, 5);
        assert_eq!(report.positives, 2);
        assert_eq!(report.auc, MetricValue::Defined(1.0));
        assert_eq!(report.at_k[0].k, 1);
        assert_eq!(report.at_k[1].recall, MetricValue::Defined(1.0));
        assert!(!report.at_k[2].precision.is_defined());
    }

    #[test]
    fn test_metric_display() {
        assert_eq!(MetricValue::Defined(0.5).to_string(), "0.5000");
        assert_eq!(
            MetricValue::Undefined(UndefinedReason::NoPositives).to_string(),
            "undefined (no positive labels)"
        );
    }

    fn record(node_id: usize, risk_score: f64) -> TriageRecord {
        TriageRecord {
            rank: node_id + 1,
            node_id,
            account_number: format!("A{node_id}"),
            bank_id: "1".to_string(),
            bank_name: "1".to_string(),
            entity_name: None,
            risk_score,
            alert_level: crate::types::alert::AlertLevel::Low,
        }
    }

    #[test]
    fn test_node_scores_from_complete_table() {
        let records = [record(1, 0.7), record(0, 0.2)];
        assert_eq!(node_scores_from_records(&records, 2).unwrap(), vec![0.2, 0.7]);
    }

    #[test]
    fn test_node_scores_reject_incomplete_table() {
        let err = node_scores_from_records(&[record(0, 0.2)], 3).unwrap_err();
        assert!(matches!(
            err,
            GraphGuardError::ScoreCountMismatch { expected: 3, actual: 1 }
        ));

        // right length, but node 1 listed twice and node 2 missing
        let duplicated = [record(0, 0.1), record(1, 0.2), record(1, 0.3)];
        assert!(node_scores_from_records(&duplicated, 3).is_err());

        assert!(matches!(
            node_scores_from_records(&[record(5, 0.1)], 1),
            Err(GraphGuardError::NodeIdOutOfRange { id: 5, .. })
        ));
    }
}
