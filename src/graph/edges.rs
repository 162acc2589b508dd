//! Edge table (struct of arrays), the assembled transaction graph and the
//! account → transactions index.

use crate::error::{GraphGuardError, Result};
use crate::graph::registry::{NodeKey, NodeRegistry};
use serde::{Deserialize, Serialize};

/// Number of per-edge features.
pub const EDGE_FEATURE_DIM: usize = 3;

/// One row of the edge feature matrix:
/// `[amount_paid, amount_received, payment_format_id]`.
pub type EdgeFeatures = [f64; EDGE_FEATURE_DIM];

/// Index-aligned transaction columns. Position `j` in every column is
/// transaction `j`; lengths are checked at construction so the columns can
/// never drift apart. Deserialization goes through the same checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEdgeTable")]
pub struct EdgeTable {
    src: Vec<usize>,
    dst: Vec<usize>,
    features: Vec<EdgeFeatures>,
    timestamps: Vec<i64>,
    labels: Vec<u8>,
}

#[derive(Deserialize)]
struct RawEdgeTable {
    src: Vec<usize>,
    dst: Vec<usize>,
    features: Vec<EdgeFeatures>,
    timestamps: Vec<i64>,
    labels: Vec<u8>,
}

impl TryFrom<RawEdgeTable> for EdgeTable {
    type Error = GraphGuardError;

    fn try_from(raw: RawEdgeTable) -> Result<Self> {
        EdgeTable::new(raw.src, raw.dst, raw.features, raw.timestamps, raw.labels)
    }
}

/// Borrowed view of a single transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRef<'a> {
    pub id: usize,
    pub src: usize,
    pub dst: usize,
    pub features: &'a EdgeFeatures,
    pub timestamp: i64,
    pub label: u8,
}

impl EdgeTable {
    /// Assemble the table, failing on any length mismatch or a timestamp
    /// that goes backwards.
    pub fn new(
        src: Vec<usize>,
        dst: Vec<usize>,
        features: Vec<EdgeFeatures>,
        timestamps: Vec<i64>,
        labels: Vec<u8>,
    ) -> Result<Self> {
        let expected = src.len();
        let check = |column: &'static str, actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(GraphGuardError::AlignmentViolation {
                    column,
                    expected,
                    actual,
                })
            }
        };
        check("dst", dst.len())?;
        check("features", features.len())?;
        check("timestamps", timestamps.len())?;
        check("labels", labels.len())?;

        if let Some(edge) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(GraphGuardError::TemporalOrder {
                edge: edge + 1,
                timestamp: timestamps[edge + 1],
                previous: timestamps[edge],
            });
        }

        Ok(Self {
            src,
            dst,
            features,
            timestamps,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn sources(&self) -> &[usize] {
        &self.src
    }

    pub fn destinations(&self) -> &[usize] {
        &self.dst
    }

    pub fn features(&self) -> &[EdgeFeatures] {
        &self.features
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Number of edges labelled as laundering.
    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// O(1) access to transaction `id`.
    pub fn get(&self, id: usize) -> Option<EdgeRef<'_>> {
        Some(EdgeRef {
            id,
            src: *self.src.get(id)?,
            dst: *self.dst.get(id)?,
            features: self.features.get(id)?,
            timestamp: *self.timestamps.get(id)?,
            label: *self.labels.get(id)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        (0..self.len()).filter_map(move |id| self.get(id))
    }
}

/// The directed transaction multigraph: node registry plus edge table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionGraph {
    registry: NodeRegistry,
    edges: EdgeTable,
}

impl TransactionGraph {
    /// Pair a registry with an edge table, checking every endpoint is a
    /// registered node.
    pub fn new(registry: NodeRegistry, edges: EdgeTable) -> Result<Self> {
        let num_nodes = registry.len();
        for edge in edges.iter() {
            for node in [edge.src, edge.dst] {
                if node >= num_nodes {
                    return Err(GraphGuardError::DanglingEdge {
                        edge: edge.id,
                        node,
                        num_nodes,
                    });
                }
            }
        }
        Ok(Self { registry, edges })
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    pub fn num_nodes(&self) -> usize {
        self.registry.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Endpoint keys of transaction `id`.
    pub fn endpoints(&self, id: usize) -> Option<(&NodeKey, &NodeKey)> {
        let edge = self.edges.get(id)?;
        let src = self.registry.key(edge.src).ok()?;
        let dst = self.registry.key(edge.dst).ok()?;
        Some((src, dst))
    }

    /// Build the node → incident transactions index.
    pub fn account_index(&self) -> AccountIndex {
        AccountIndex::build(self.num_nodes(), &self.edges)
    }
}

/// For each node id, the ids of transactions where it is source or
/// destination, in ledger order. A self-transfer is listed once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIndex {
    by_node: Vec<Vec<usize>>,
}

impl AccountIndex {
    pub fn build(num_nodes: usize, edges: &EdgeTable) -> Self {
        let mut by_node = vec![Vec::new(); num_nodes];
        for edge in edges.iter() {
            by_node[edge.src].push(edge.id);
            if edge.dst != edge.src {
                by_node[edge.dst].push(edge.id);
            }
        }
        Self { by_node }
    }

    /// Transactions touching `node_id`; empty for unknown ids.
    pub fn transactions(&self, node_id: usize) -> &[usize] {
        self.by_node.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_nodes(&self) -> usize {
        self.by_node.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::registry::IdOrder;

    fn table() -> EdgeTable {
        EdgeTable::new(
            vec![0, 1, 2],
            vec![1, 2, 2],
            vec![[1.0, 1.0, 0.0], [2.0, 2.0, 1.0], [3.0, 3.0, 0.0]],
            vec![10, 10, 20],
            vec![0, 1, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_alignment_violation() {
        let err = EdgeTable::new(vec![0, 1], vec![1, 0], vec![[0.0; 3]; 2], vec![1], vec![0, 0])
            .unwrap_err();
        assert!(matches!(
            err,
            GraphGuardError::AlignmentViolation {
                column: "timestamps",
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_temporal_order_enforced() {
        let err = EdgeTable::new(vec![0, 0], vec![0, 0], vec![[0.0; 3]; 2], vec![5, 4], vec![0, 0])
            .unwrap_err();
        assert!(matches!(err, GraphGuardError::TemporalOrder { edge: 1, .. }));
    }

    #[test]
    fn test_edge_access() {
        let edges = table();
        let edge = edges.get(1).unwrap();

        assert_eq!((edge.src, edge.dst, edge.label), (1, 2, 1));
        assert_eq!(edge.features[2], 1.0);
        assert!(edges.get(3).is_none());
        assert_eq!(edges.positive_count(), 1);
    }

    #[test]
    fn test_dangling_edge() {
        let registry = NodeRegistry::fit(&[NodeKey::new("A", "1")], IdOrder::Lexicographic, '_');
        let err = TransactionGraph::new(registry, table()).unwrap_err();
        assert!(matches!(err, GraphGuardError::DanglingEdge { node: 1, .. }));
    }

    #[test]
    fn test_account_index() {
        let registry = NodeRegistry::fit(
            &[NodeKey::new("A", "1"), NodeKey::new("B", "1"), NodeKey::new("C", "1")],
            IdOrder::Lexicographic,
            '_',
        );
        let graph = TransactionGraph::new(registry, table()).unwrap();
        let index = graph.account_index();

        assert_eq!(index.transactions(0), &[0]);
        assert_eq!(index.transactions(1), &[0, 1]);
        // self-transfer 2 -> 2 is listed once
        assert_eq!(index.transactions(2), &[1, 2]);
        assert!(index.transactions(99).is_empty());
    }

    #[test]
    fn test_deserialize_enforces_alignment_and_order() {
        let misaligned = r#"{"src":[0,1],"dst":[0],"features":[[1.0,1.0,0.0],[2.0,2.0,0.0]],"timestamps":[1,5],"labels":[0,0]}"#;
        let err = serde_json::from_str::<EdgeTable>(misaligned).unwrap_err();
        assert!(err.to_string().contains("misaligned"));

        let unordered = r#"{"src":[0,1],"dst":[1,0],"features":[[1.0,1.0,0.0],[2.0,2.0,0.0]],"timestamps":[5,1],"labels":[0,0]}"#;
        assert!(serde_json::from_str::<EdgeTable>(unordered).is_err());

        let table = table();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(serde_json::from_str::<EdgeTable>(&json).unwrap(), table);
    }
}
