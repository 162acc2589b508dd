//! Graph builder: time-ordered ledger → transaction graph.

use crate::error::Result;
use crate::feature_extractor::FeatureExtractor;
use crate::graph::edges::{EdgeTable, TransactionGraph};
use crate::graph::registry::{IdOrder, NodeKey, NodeRegistry};
use crate::types::transaction::LedgerRow;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Data-quality counts from one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub rows_read: usize,
    /// Rows discarded because the timestamp did not parse.
    pub rows_dropped_timestamp: usize,
    pub missing_amount_paid: usize,
    pub missing_amount_received: usize,
    pub missing_payment_format: usize,
    pub missing_label: usize,
    pub nodes: usize,
    pub edges: usize,
    pub positive_labels: usize,
}

/// Output of [`GraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: TransactionGraph,
    /// Payment-format classes; `payment_format_id` indexes this list.
    pub payment_formats: Vec<String>,
    pub report: BuildReport,
}

/// Builds a [`TransactionGraph`] from raw ledger rows.
///
/// Holds only configuration; `build` is a pure function of its input.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    id_order: IdOrder,
    unknown_payment_format: String,
    /// Composite key delimiter; lexicographic ids follow the rendered key
    delimiter: char,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(IdOrder::default(), "UNK")
    }
}

impl GraphBuilder {
    pub fn new(id_order: IdOrder, unknown_payment_format: &str) -> Self {
        Self {
            id_order,
            unknown_payment_format: unknown_payment_format.to_string(),
            delimiter: '_',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Build the graph.
    ///
    /// Rows with unparseable timestamps are dropped and counted. Survivors
    /// are stably sorted by event time before any id is assigned, so edge
    /// index `j` is the `j`-th event. An empty ledger yields an empty graph.
    pub fn build(&self, rows: &[LedgerRow]) -> Result<BuiltGraph> {
        let mut report = BuildReport {
            rows_read: rows.len(),
            ..Default::default()
        };

        let mut timed: Vec<(i64, &LedgerRow)> = rows
            .iter()
            .filter_map(|row| row.epoch_seconds().map(|ts| (ts, row)))
            .collect();
        report.rows_dropped_timestamp = rows.len() - timed.len();
        if report.rows_dropped_timestamp > 0 {
            warn!(
                dropped = report.rows_dropped_timestamp,
                rows_read = report.rows_read,
                "Dropped ledger rows with unparseable timestamps"
            );
        }

        // sort_by_key is stable: equal timestamps keep ledger order
        timed.sort_by_key(|(ts, _)| *ts);
        let sorted: Vec<LedgerRow> = timed.iter().map(|(_, row)| (*row).clone()).collect();
        let timestamps: Vec<i64> = timed.iter().map(|(ts, _)| *ts).collect();

        let from_keys: Vec<NodeKey> = sorted
            .iter()
            .map(|r| NodeKey::new(r.from_account.as_str(), r.from_bank.as_str()))
            .collect();
        let to_keys: Vec<NodeKey> = sorted
            .iter()
            .map(|r| NodeKey::new(r.to_account.as_str(), r.to_bank.as_str()))
            .collect();

        let registry = NodeRegistry::fit(
            from_keys.iter().chain(to_keys.iter()),
            self.id_order,
            self.delimiter,
        );
        let src = from_keys
            .iter()
            .map(|k| registry.transform(k))
            .collect::<Result<Vec<_>>>()?;
        let dst = to_keys
            .iter()
            .map(|k| registry.transform(k))
            .collect::<Result<Vec<_>>>()?;

        let extractor = FeatureExtractor::fit(&sorted, &self.unknown_payment_format);
        let features = sorted.iter().map(|row| extractor.extract(row)).collect();

        let labels: Vec<u8> = sorted
            .iter()
            .map(|row| row.is_laundering.map(|l| u8::from(l != 0)).unwrap_or(0))
            .collect();

        for row in &sorted {
            report.missing_amount_paid += usize::from(row.amount_paid.is_none());
            report.missing_amount_received += usize::from(row.amount_received.is_none());
            report.missing_payment_format += usize::from(row.payment_format.is_none());
            report.missing_label += usize::from(row.is_laundering.is_none());
        }
        debug!(
            missing_amount_paid = report.missing_amount_paid,
            missing_amount_received = report.missing_amount_received,
            missing_payment_format = report.missing_payment_format,
            missing_label = report.missing_label,
            "Defaulted missing ledger fields"
        );

        let edges = EdgeTable::new(src, dst, features, timestamps, labels)?;
        let graph = TransactionGraph::new(registry, edges)?;

        report.nodes = graph.num_nodes();
        report.edges = graph.num_edges();
        report.positive_labels = graph.edges().positive_count();

        info!(
            nodes = report.nodes,
            edges = report.edges,
            laundering = report.positive_labels,
            payment_formats = extractor.payment_formats().len(),
            "Transaction graph built"
        );

        Ok(BuiltGraph {
            graph,
            payment_formats: extractor.payment_formats().to_vec(),
            report,
        })
    }
}
