//! Triage: ranking, alert bucketing and ranked-retrieval evaluation

pub mod evaluation;
pub mod ranking;

pub use evaluation::{
    account_labels, auc, evaluate, node_scores_from_records, precision_recall_at_k,
    EvaluationReport, KMetrics, MetricValue, UndefinedReason,
};
pub use ranking::{build_triage_records, rank_and_bucket, AccountDirectory, DirectoryEntry, RankedEntity};
