//! Ranking and alert-level bucketing of account risk

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::TransactionGraph;
use crate::types::alert::{AlertLevel, AlertPolicy, TriageRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// One ranked entity. `index` is its position in the scored input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedEntity {
    pub index: usize,
    pub score: f64,
    pub rank: usize,
    pub alert_level: AlertLevel,
}

/// Rank `scores` descending (rank 1 = riskiest) and bucket each entry.
///
/// Equal scores keep their input order, so the result is a strict total
/// order that is stable across runs. Output is sorted by rank.
pub fn rank_and_bucket(scores: &[f64], policy: &AlertPolicy) -> Vec<RankedEntity> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let total = scores.len();
    order
        .into_iter()
        .enumerate()
        .map(|(position, index)| {
            let rank = position + 1;
            let score = scores[index];
            RankedEntity {
                index,
                score,
                rank,
                alert_level: policy.classify(score, rank, total),
            }
        })
        .collect()
}

/// Directory row with the display names of an account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DirectoryEntry {
    #[serde(rename = "Account Number")]
    pub account_number: String,

    #[serde(rename = "Bank Name")]
    pub bank_name: String,

    #[serde(rename = "Entity Name", default)]
    pub entity_name: Option<String>,
}

/// Account number → bank and entity names, used to label triage output.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    entries: HashMap<String, DirectoryEntry>,
}

impl AccountDirectory {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let directory = Self::from_reader(File::open(path)?)?;
        info!(path = %path.display(), accounts = directory.len(), "Account directory loaded");
        Ok(directory)
    }

    /// Read a CSV with `Account Number`, `Bank Name` and optionally
    /// `Entity Name` columns. The first row for an account wins.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = HashMap::new();
        for row in csv.deserialize() {
            let entry: DirectoryEntry = row?;
            entries.entry(entry.account_number.clone()).or_insert(entry);
        }
        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            map.entry(entry.account_number.clone()).or_insert(entry);
        }
        Self { entries: map }
    }

    pub fn get(&self, account: &str) -> Option<&DirectoryEntry> {
        self.entries.get(account)
    }

    pub fn bank_name(&self, account: &str) -> Option<&str> {
        self.get(account).map(|e| e.bank_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the per-account risk table from node scores.
///
/// Without a directory entry an account's bank name falls back to its bank
/// id and the entity name stays empty.
pub fn build_triage_records(
    graph: &TransactionGraph,
    node_scores: &[f64],
    policy: &AlertPolicy,
    directory: Option<&AccountDirectory>,
) -> Result<Vec<TriageRecord>> {
    if node_scores.len() != graph.num_nodes() {
        return Err(GraphGuardError::ScoreCountMismatch {
            expected: graph.num_nodes(),
            actual: node_scores.len(),
        });
    }

    let registry = graph.registry();
    let records = rank_and_bucket(node_scores, policy)
        .into_iter()
        .map(|ranked| -> Result<TriageRecord> {
            let key = registry.key(ranked.index)?;
            let entry = directory.and_then(|d| d.get(&key.account));
            Ok(TriageRecord {
                rank: ranked.rank,
                node_id: ranked.index,
                account_number: key.account.clone(),
                bank_id: key.bank.clone(),
                bank_name: entry.map_or_else(|| key.bank.clone(), |e| e.bank_name.clone()),
                entity_name: entry.and_then(|e| e.entity_name.clone()),
                risk_score: ranked.score,
                alert_level: ranked.alert_level,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let count = |level| records.iter().filter(|r| r.alert_level == level).count();
    info!(
        accounts = records.len(),
        high = count(AlertLevel::High),
        medium = count(AlertLevel::Medium),
        low = count(AlertLevel::Low),
        "Triage complete"
    );
    debug!(policy = ?policy, "Alert policy applied");

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use crate::types::alert::RiskLevelThresholds;
    use crate::types::transaction::LedgerRow;

    #[test]
    fn test_ranks_descending() {
        // accounts A, B, C
        let ranked = rank_and_bucket(&[0.9, 0.1, 0.5], &AlertPolicy::default());

        let rank_of = |index: usize| ranked.iter().find(|r| r.index == index).unwrap().rank;
        assert_eq!(rank_of(0), 1);
        assert_eq!(rank_of(2), 2);
        assert_eq!(rank_of(1), 3);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank_and_bucket(&[0.4, 0.7, 0.4, 0.7], &AlertPolicy::default());
        let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_default_policy_buckets() {
        let scores: Vec<f64> = (0..200).map(|i| i as f64 / 200.0).collect();
        let ranked = rank_and_bucket(&scores, &AlertPolicy::default());

        let count = |level| ranked.iter().filter(|r| r.alert_level == level).count();
        // 1% of 200 HIGH, the next 4% MEDIUM
        assert_eq!(count(AlertLevel::High), 2);
        assert_eq!(count(AlertLevel::Medium), 8);
        assert_eq!(count(AlertLevel::Low), 190);
        assert_eq!(ranked[0].index, 199);
    }

    #[test]
    fn test_score_policy_buckets() {
        let policy = AlertPolicy::Score(RiskLevelThresholds::default());
        let ranked = rank_and_bucket(&[0.2, 0.85, 0.6], &policy);
        let levels: Vec<AlertLevel> = ranked.iter().map(|r| r.alert_level).collect();
        assert_eq!(levels, vec![AlertLevel::High, AlertLevel::Medium, AlertLevel::Low]);
    }

    #[test]
    fn test_empty_scores() {
        assert!(rank_and_bucket(&[], &AlertPolicy::default()).is_empty());
    }

    #[test]
    fn test_triage_records_with_directory() {
        let rows = vec![
            LedgerRow::new("2022/09/01 00:10", ("A", "10"), ("B", "20"), 10.0, "ACH", 0),
            LedgerRow::new("2022/09/01 00:20", ("B", "20"), ("C", "30"), 20.0, "Wire", 1),
        ];
        let graph = GraphBuilder::default().build(&rows).unwrap().graph;
        let directory = AccountDirectory::from_reader(
            "Account Number,Bank Name,Entity Name\nB,Second Bank,Corporation #7\n".as_bytes(),
        )
        .unwrap();

        let records = build_triage_records(
            &graph,
            &[0.1, 0.9, 0.9],
            &AlertPolicy::default(),
            Some(&directory),
        )
        .unwrap();

        assert_eq!(records[0].account_number, "B");
        assert_eq!(records[0].bank_name, "Second Bank");
        assert_eq!(records[0].entity_name.as_deref(), Some("Corporation #7"));
        assert_eq!(records[0].alert_level, AlertLevel::High);
        assert_eq!(records[1].account_number, "C");
        assert_eq!(records[1].bank_name, "30");
        assert_eq!(records[1].entity_name, None);
        assert_eq!(records[2].rank, 3);
    }

    #[test]
    fn test_triage_records_score_count() {
        let graph = TransactionGraph::default();
        assert!(matches!(
            build_triage_records(&graph, &[0.5], &AlertPolicy::default(), None),
            Err(GraphGuardError::ScoreCountMismatch { expected: 0, actual: 1 })
        ));
    }
}
