//! Transaction graph construction, identity and persistence

pub mod builder;
pub mod edges;
pub mod registry;
pub mod store;

pub use builder::{BuildReport, BuiltGraph, GraphBuilder};
pub use edges::{AccountIndex, EdgeFeatures, EdgeTable, TransactionGraph, EDGE_FEATURE_DIM};
pub use registry::{IdOrder, NodeKey, NodeRegistry};
pub use store::GraphStore;
