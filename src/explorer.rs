//! Read-only analyst views over the risk table and transaction graph.
//!
//! Every query takes its selection (bank, alert levels, account) as an
//! explicit argument; nothing here keeps state between calls.

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::{AccountIndex, TransactionGraph};
use crate::graph::store::GraphStore;
use crate::triage::ranking::AccountDirectory;
use crate::types::alert::{AlertExplanation, AlertLevel, TriageRecord};
use serde::Serialize;
use tracing::{debug, info};

/// Rows shown in the overview preview.
pub const OVERVIEW_PREVIEW_LEN: usize = 20;

const UNKNOWN: &str = "Unknown";

/// Overview filter. An empty `alert_levels` keeps every level.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewFilter {
    pub bank_name: Option<String>,
    pub alert_levels: Vec<AlertLevel>,
}

impl Default for OverviewFilter {
    fn default() -> Self {
        Self {
            bank_name: None,
            alert_levels: vec![AlertLevel::High],
        }
    }
}

impl OverviewFilter {
    pub fn matches(&self, record: &TriageRecord) -> bool {
        let bank_ok = self
            .bank_name
            .as_deref()
            .map_or(true, |bank| record.bank_name == bank);
        let level_ok =
            self.alert_levels.is_empty() || self.alert_levels.contains(&record.alert_level);
        bank_ok && level_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewSummary {
    pub accounts: usize,
    pub high_risk: usize,
    /// Share of HIGH accounts among the filtered ones, 0.0 when empty
    pub high_risk_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub summary: OverviewSummary,
    /// First rows of the filtered table by rank
    pub preview: Vec<TriageRecord>,
}

/// Records passing `filter`, sorted by rank.
pub fn filter_records(records: &[TriageRecord], filter: &OverviewFilter) -> Vec<TriageRecord> {
    let mut filtered: Vec<TriageRecord> =
        records.iter().filter(|r| filter.matches(r)).cloned().collect();
    filtered.sort_by_key(|r| r.rank);
    filtered
}

pub fn overview(records: &[TriageRecord], filter: &OverviewFilter) -> Overview {
    let filtered = filter_records(records, filter);

    let accounts = filtered.len();
    let high_risk = filtered
        .iter()
        .filter(|r| r.alert_level == AlertLevel::High)
        .count();
    let high_risk_percent = if accounts == 0 {
        0.0
    } else {
        high_risk as f64 / accounts as f64 * 100.0
    };

    Overview {
        summary: OverviewSummary {
            accounts,
            high_risk,
            high_risk_percent,
        },
        preview: filtered.into_iter().take(OVERVIEW_PREVIEW_LEN).collect(),
    }
}

/// Distinct bank names, sorted, for the bank filter.
pub fn bank_names(records: &[TriageRecord]) -> Vec<String> {
    let mut banks: Vec<String> = records.iter().map(|r| r.bank_name.clone()).collect();
    banks.sort();
    banks.dedup();
    banks
}

/// One entry of the account search list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountOption {
    pub account_number: String,
    pub label: String,
}

/// Searchable `"account | bank | entity"` labels, riskiest first. Only the
/// top `limit` accounts are offered unless `show_all` is set.
pub fn search_accounts(records: &[TriageRecord], show_all: bool, limit: usize) -> Vec<AccountOption> {
    let mut sorted: Vec<&TriageRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    if !show_all {
        sorted.truncate(limit);
    }

    sorted
        .into_iter()
        .map(|r| AccountOption {
            account_number: r.account_number.clone(),
            label: r.search_label(),
        })
        .collect()
}

/// Account number part of a search label.
pub fn account_from_label(label: &str) -> &str {
    label.split(" | ").next().unwrap_or(label).trim()
}

/// One account with the explanation for its alert level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    pub record: TriageRecord,
    pub explanation: AlertExplanation,
}

/// Look up an account. When the account number exists at several banks the
/// riskiest one is returned.
pub fn account_view(records: &[TriageRecord], account: &str) -> Result<AccountView> {
    let record = records
        .iter()
        .filter(|r| r.account_number == account)
        .min_by_key(|r| r.rank)
        .ok_or_else(|| GraphGuardError::AccountNotFound(account.to_string()))?;

    Ok(AccountView {
        record: record.clone(),
        explanation: record.alert_level.explanation().clone(),
    })
}

/// Drill-down request for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct DrilldownQuery {
    pub account: String,
    /// Restrict to one bank; all banks holding the account number otherwise
    pub bank_id: Option<String>,
    pub top_n: usize,
}

impl DrilldownQuery {
    pub fn new(account: impl Into<String>, top_n: usize) -> Self {
        Self {
            account: account.into(),
            bank_id: None,
            top_n,
        }
    }

    pub fn with_bank(mut self, bank_id: impl Into<String>) -> Self {
        self.bank_id = Some(bank_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRow {
    #[serde(rename = "Transaction ID")]
    pub transaction_id: usize,

    #[serde(rename = "From Account")]
    pub from_account: String,

    #[serde(rename = "From Bank")]
    pub from_bank: String,

    #[serde(rename = "To Account")]
    pub to_account: String,

    #[serde(rename = "To Bank")]
    pub to_bank: String,

    #[serde(rename = "Risk Score")]
    pub risk_score: f64,
}

/// Undirected account pair from the drill-down transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drilldown {
    pub account: String,
    pub transactions: Vec<TransactionRow>,
    /// Local network for explainability, one entry per distinct pair
    pub network: Vec<NetworkEdge>,
}

/// Riskiest transactions touching an account plus their local network.
///
/// Unknown accounts are an error; a known account without transactions
/// yields an empty result.
pub fn drilldown(
    graph: &TransactionGraph,
    index: &AccountIndex,
    edge_scores: &[f64],
    directory: Option<&AccountDirectory>,
    query: &DrilldownQuery,
) -> Result<Drilldown> {
    if edge_scores.len() != graph.num_edges() {
        return Err(GraphGuardError::ScoreCountMismatch {
            expected: graph.num_edges(),
            actual: edge_scores.len(),
        });
    }

    let registry = graph.registry();
    let nodes: Vec<usize> = registry
        .ids_for_account(&query.account)
        .iter()
        .copied()
        .filter(|&id| match &query.bank_id {
            Some(bank) => registry.key(id).map_or(false, |k| &k.bank == bank),
            None => true,
        })
        .collect();
    if nodes.is_empty() {
        return Err(GraphGuardError::AccountNotFound(query.account.clone()));
    }

    let mut tx_ids: Vec<usize> = nodes
        .iter()
        .flat_map(|&node| index.transactions(node).iter().copied())
        .collect();
    tx_ids.sort_unstable();
    tx_ids.dedup();
    if let Some(&bad) = tx_ids.iter().find(|&&tx| tx >= graph.num_edges()) {
        return Err(GraphGuardError::TransactionOutOfRange {
            id: bad,
            num_edges: graph.num_edges(),
        });
    }
    tx_ids.sort_by(|&a, &b| edge_scores[b].total_cmp(&edge_scores[a]));
    tx_ids.truncate(query.top_n);

    let bank_of = |account: &str| {
        directory
            .and_then(|d| d.bank_name(account))
            .unwrap_or(UNKNOWN)
            .to_string()
    };

    let transactions = tx_ids
        .into_iter()
        .map(|tx| -> Result<TransactionRow> {
            let (src, dst) = graph
                .endpoints(tx)
                .ok_or(GraphGuardError::TransactionOutOfRange {
                    id: tx,
                    num_edges: graph.num_edges(),
                })?;
            Ok(TransactionRow {
                transaction_id: tx,
                from_account: src.account.clone(),
                from_bank: bank_of(&src.account),
                to_account: dst.account.clone(),
                to_bank: bank_of(&dst.account),
                risk_score: round4(edge_scores[tx]),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut network: Vec<NetworkEdge> = Vec::new();
    for row in &transactions {
        let seen = network.iter().any(|e| {
            (e.from == row.from_account && e.to == row.to_account)
                || (e.from == row.to_account && e.to == row.from_account)
        });
        if !seen {
            network.push(NetworkEdge {
                from: row.from_account.clone(),
                to: row.to_account.clone(),
            });
        }
    }

    debug!(
        account = %query.account,
        nodes = nodes.len(),
        transactions = transactions.len(),
        "Drill-down resolved"
    );

    Ok(Drilldown {
        account: query.account.clone(),
        transactions,
        network,
    })
}

fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

/// Loaded artifacts of one processed dataset, ready for repeated queries.
pub struct Explorer {
    pub records: Vec<TriageRecord>,
    pub graph: TransactionGraph,
    pub index: AccountIndex,
    pub edge_scores: Vec<f64>,
    pub directory: Option<AccountDirectory>,
}

impl Explorer {
    /// Load the risk table, graph, account index and transaction scores.
    pub fn open(store: &GraphStore, directory: Option<AccountDirectory>) -> Result<Self> {
        let records = store.load_risk_table()?;
        let graph = store.load_graph()?;
        let index = store.load_account_index()?;
        let edge_scores = store.load_edge_scores()?;

        info!(
            dir = %store.dir().display(),
            accounts = records.len(),
            transactions = edge_scores.len(),
            "Explorer data loaded"
        );

        Ok(Self {
            records,
            graph,
            index,
            edge_scores,
            directory,
        })
    }

    pub fn overview(&self, filter: &OverviewFilter) -> Overview {
        overview(&self.records, filter)
    }

    pub fn account_view(&self, account: &str) -> Result<AccountView> {
        account_view(&self.records, account)
    }

    pub fn drilldown(&self, query: &DrilldownQuery) -> Result<Drilldown> {
        drilldown(
            &self.graph,
            &self.index,
            &self.edge_scores,
            self.directory.as_ref(),
            query,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use crate::triage::ranking::DirectoryEntry;
    use crate::types::transaction::LedgerRow;

    fn record(rank: usize, account: &str, bank: &str, score: f64, level: AlertLevel) -> TriageRecord {
        TriageRecord {
            rank,
            node_id: rank - 1,
            account_number: account.to_string(),
            bank_id: bank.to_string(),
            bank_name: bank.to_string(),
            entity_name: None,
            risk_score: score,
            alert_level: level,
        }
    }

    fn records() -> Vec<TriageRecord> {
        vec![
            record(3, "C", "Bank Y", 0.4, AlertLevel::Low),
            record(1, "A", "Bank X", 0.9, AlertLevel::High),
            record(2, "B", "Bank Y", 0.7, AlertLevel::Medium),
            record(4, "D", "Bank X", 0.1, AlertLevel::Low),
        ]
    }

    #[test]
    fn test_overview_default_filter() {
        let result = overview(&records(), &OverviewFilter::default());

        assert_eq!(result.summary.accounts, 1);
        assert_eq!(result.summary.high_risk, 1);
        assert_eq!(result.summary.high_risk_percent, 100.0);
        assert_eq!(result.preview[0].account_number, "A");
    }

    #[test]
    fn test_overview_bank_filter_all_levels() {
        let filter = OverviewFilter {
            bank_name: Some("Bank Y".to_string()),
            alert_levels: Vec::new(),
        };
        let result = overview(&records(), &filter);

        assert_eq!(result.summary.accounts, 2);
        assert_eq!(result.summary.high_risk, 0);
        let ranks: Vec<usize> = result.preview.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![2, 3]);
    }

    #[test]
    fn test_overview_empty() {
        let result = overview(&[], &OverviewFilter::default());
        assert_eq!(result.summary.accounts, 0);
        assert_eq!(result.summary.high_risk_percent, 0.0);
    }

    #[test]
    fn test_search_accounts() {
        let options = search_accounts(&records(), false, 2);

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "A | Bank X | Unknown");
        assert_eq!(options[1].account_number, "B");
        assert_eq!(account_from_label(&options[0].label), "A");
        assert_eq!(search_accounts(&records(), true, 2).len(), 4);
    }

    #[test]
    fn test_bank_names() {
        assert_eq!(bank_names(&records()), vec!["Bank X", "Bank Y"]);
    }

    #[test]
    fn test_account_view() {
        let view = account_view(&records(), "B").unwrap();
        assert_eq!(view.record.rank, 2);
        assert_eq!(view.explanation, *AlertLevel::Medium.explanation());

        assert!(matches!(
            account_view(&records(), "Z"),
            Err(GraphGuardError::AccountNotFound(ref a)) if a == "Z"
        ));
    }

    fn graph() -> TransactionGraph {
        let rows = vec![
            LedgerRow::new("2022/09/01 00:10", ("A", "1"), ("B", "2"), 10.0, "ACH", 0),
            LedgerRow::new("2022/09/01 00:20", ("B", "2"), ("A", "1"), 20.0, "Wire", 1),
            LedgerRow::new("2022/09/01 00:30", ("A", "1"), ("C", "3"), 5.0, "ACH", 0),
            LedgerRow::new("2022/09/01 00:40", ("C", "3"), ("D", "3"), 1.0, "Cash", 0),
        ];
        GraphBuilder::default().build(&rows).unwrap().graph
    }

    #[test]
    fn test_drilldown_top_transactions() {
        let graph = graph();
        let index = graph.account_index();
        let scores = [0.5, 0.912345, 0.2, 0.99];
        let directory = AccountDirectory::from_entries([DirectoryEntry {
            account_number: "B".to_string(),
            bank_name: "Second Bank".to_string(),
            entity_name: None,
        }]);

        let result = drilldown(
            &graph,
            &index,
            &scores,
            Some(&directory),
            &DrilldownQuery::new("A", 2),
        )
        .unwrap();

        let ids: Vec<usize> = result.transactions.iter().map(|t| t.transaction_id).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(result.transactions[0].risk_score, 0.9123);
        assert_eq!(result.transactions[0].from_bank, "Second Bank");
        assert_eq!(result.transactions[0].to_bank, "Unknown");
        // A-B in both directions is one pair
        assert_eq!(
            result.network,
            vec![NetworkEdge {
                from: "B".to_string(),
                to: "A".to_string()
            }]
        );
    }

    #[test]
    fn test_drilldown_unknown_account() {
        let graph = graph();
        let index = graph.account_index();
        let err = drilldown(&graph, &index, &[0.0; 4], None, &DrilldownQuery::new("Z", 5)).unwrap_err();
        assert!(matches!(err, GraphGuardError::AccountNotFound(_)));

        let err = drilldown(
            &graph,
            &index,
            &[0.0; 4],
            None,
            &DrilldownQuery::new("A", 5).with_bank("9"),
        )
        .unwrap_err();
        assert!(matches!(err, GraphGuardError::AccountNotFound(_)));
    }

    #[test]
    fn test_drilldown_account_without_transactions() {
        let graph = graph();
        // index from an empty edge table: every known account has no transactions
        let index = AccountIndex::default();
        let result = drilldown(&graph, &index, &[0.0; 4], None, &DrilldownQuery::new("A", 5)).unwrap();

        assert!(result.transactions.is_empty());
        assert!(result.network.is_empty());
    }
}
