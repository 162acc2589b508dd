//! Type definitions for the risk-scoring pipeline

pub mod alert;
pub mod transaction;

pub use alert::{AlertExplanation, AlertLevel, AlertPolicy, RiskLevelThresholds, TriageRecord};
pub use transaction::LedgerRow;
