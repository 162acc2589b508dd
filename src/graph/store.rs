//! On-disk artifacts of a processed dataset.
//!
//! Layout under the output directory:
//!
//! | file                  | content                                         |
//! |-----------------------|-------------------------------------------------|
//! | `node_mapping.csv`    | column `node`, row index = node id              |
//! | `edge_index.json`     | `[[src...], [dst...]]`, column j = transaction j |
//! | `edge_features.json`  | E × 3 rows `[amount_paid, amount_received, payment_format_id]` |
//! | `timestamps.json`     | E epoch seconds                                 |
//! | `labels.json`         | E binary labels                                 |
//! | `payment_formats.json`| payment-format classes in code order            |
//! | `account_to_tx.json`  | per node id, incident transaction ids           |
//! | `transaction_risk_scores.json` | E per-transaction risk scores          |
//! | `account_risk.csv`    | per-account triage table                        |

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::{AccountIndex, EdgeFeatures, EdgeTable, TransactionGraph};
use crate::graph::registry::{NodeKey, NodeRegistry};
use crate::types::alert::TriageRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const NODE_MAPPING_FILE: &str = "node_mapping.csv";
pub const EDGE_INDEX_FILE: &str = "edge_index.json";
pub const EDGE_FEATURES_FILE: &str = "edge_features.json";
pub const TIMESTAMPS_FILE: &str = "timestamps.json";
pub const LABELS_FILE: &str = "labels.json";
pub const PAYMENT_FORMATS_FILE: &str = "payment_formats.json";
pub const ACCOUNT_INDEX_FILE: &str = "account_to_tx.json";
pub const EDGE_SCORES_FILE: &str = "transaction_risk_scores.json";
pub const RISK_TABLE_FILE: &str = "account_risk.csv";

/// Reader/writer for the artifact directory.
#[derive(Debug, Clone)]
pub struct GraphStore {
    dir: PathBuf,
    delimiter: char,
}

impl GraphStore {
    pub fn new<P: AsRef<Path>>(dir: P, delimiter: char) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            delimiter,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Persist node mapping and the four aligned edge arrays.
    pub fn save_graph(&self, graph: &TransactionGraph, payment_formats: &[String]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut wtr = csv::Writer::from_path(self.path(NODE_MAPPING_FILE))?;
        wtr.write_record(["node"])?;
        for key in graph.registry().keys() {
            wtr.write_record([key.composite(self.delimiter)])?;
        }
        wtr.flush()?;

        let edges = graph.edges();
        self.save_json(EDGE_INDEX_FILE, &[edges.sources(), edges.destinations()])?;
        self.save_json(EDGE_FEATURES_FILE, &edges.features())?;
        self.save_json(TIMESTAMPS_FILE, &edges.timestamps())?;
        self.save_json(LABELS_FILE, &edges.labels())?;
        self.save_json(PAYMENT_FORMATS_FILE, &payment_formats)?;

        info!(
            dir = %self.dir.display(),
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            "Graph artifacts saved"
        );
        Ok(())
    }

    /// Load the graph saved by [`GraphStore::save_graph`], re-validating
    /// alignment, temporal order and node references.
    pub fn load_graph(&self) -> Result<TransactionGraph> {
        let registry = self.load_node_mapping()?;

        let [src, dst]: [Vec<usize>; 2] = self.load_json(EDGE_INDEX_FILE)?;
        let features: Vec<EdgeFeatures> = self.load_json(EDGE_FEATURES_FILE)?;
        let timestamps: Vec<i64> = self.load_json(TIMESTAMPS_FILE)?;
        let labels: Vec<u8> = self.load_json(LABELS_FILE)?;

        let edges = EdgeTable::new(src, dst, features, timestamps, labels)?;
        let graph = TransactionGraph::new(registry, edges)?;
        debug!(nodes = graph.num_nodes(), edges = graph.num_edges(), "Graph artifacts loaded");
        Ok(graph)
    }

    pub fn load_node_mapping(&self) -> Result<NodeRegistry> {
        let mut rdr = csv::Reader::from_path(self.path(NODE_MAPPING_FILE))?;
        let mut keys = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let raw = record.get(0).unwrap_or("");
            let key = NodeKey::parse_composite(raw, self.delimiter)
                .ok_or_else(|| GraphGuardError::MalformedNodeKey(raw.to_string()))?;
            keys.push(key);
        }
        NodeRegistry::from_keys(keys)
    }

    pub fn load_payment_formats(&self) -> Result<Vec<String>> {
        self.load_json(PAYMENT_FORMATS_FILE)
    }

    pub fn save_account_index(&self, index: &AccountIndex) -> Result<()> {
        self.save_json(ACCOUNT_INDEX_FILE, index)
    }

    pub fn load_account_index(&self) -> Result<AccountIndex> {
        self.load_json(ACCOUNT_INDEX_FILE)
    }

    pub fn save_edge_scores(&self, scores: &[f64]) -> Result<()> {
        self.save_json(EDGE_SCORES_FILE, &scores)
    }

    pub fn load_edge_scores(&self) -> Result<Vec<f64>> {
        self.load_json(EDGE_SCORES_FILE)
    }

    pub fn save_risk_table(&self, records: &[TriageRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut wtr = csv::Writer::from_path(self.path(RISK_TABLE_FILE))?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        info!(accounts = records.len(), "Risk table saved");
        Ok(())
    }

    pub fn load_risk_table(&self) -> Result<Vec<TriageRecord>> {
        let mut rdr = csv::Reader::from_path(self.path(RISK_TABLE_FILE))?;
        let records = rdr.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Write any serializable value as JSON into the artifact directory.
    pub fn save_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut writer = BufWriter::new(File::create(self.path(file))?);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a JSON artifact.
    pub fn load_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let reader = BufReader::new(File::open(self.path(file))?);
        Ok(serde_json::from_reader(reader)?)
    }
}
