//! Alert levels, bucketing policy and per-account triage records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discretized risk bucket assigned to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
}

impl AlertLevel {
    /// All levels, lowest first.
    pub const ALL: [AlertLevel; 3] = [AlertLevel::Low, AlertLevel::Medium, AlertLevel::High];

    /// Uppercase label used in persisted tables and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "LOW",
            AlertLevel::Medium => "MEDIUM",
            AlertLevel::High => "HIGH",
        }
    }

    /// Parse a label case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(AlertLevel::Low),
            "MEDIUM" => Some(AlertLevel::Medium),
            "HIGH" => Some(AlertLevel::High),
            _ => None,
        }
    }

    /// Analyst-facing explanation for this level.
    pub fn explanation(&self) -> &'static AlertExplanation {
        &EXPLANATIONS[*self as usize]
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display severity for an alert level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

/// Presentation record for an alert level. The core only emits the
/// `AlertLevel`; front ends render this record however they like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertExplanation {
    pub severity: Severity,
    pub headline: &'static str,
    pub body: &'static str,
}

// Indexed by `AlertLevel as usize`.
static EXPLANATIONS: [AlertExplanation; 3] = [
    AlertExplanation {
        severity: Severity::Ok,
        headline: "LOW RISK (GNN Assessment)",
        body: "This account is currently assessed as low risk by the graph neural network, \
               with no strong suspicious patterns detected.",
    },
    AlertExplanation {
        severity: Severity::Warning,
        headline: "MODERATE RISK (GNN Alert)",
        body: "This account exhibits moderate-risk patterns learned by the graph neural network, \
               indicating potentially unusual transaction behavior that may require monitoring.",
    },
    AlertExplanation {
        severity: Severity::Critical,
        headline: "HIGH RISK (GNN Alert)",
        body: "This account is flagged as high risk by the graph neural network due to repeated \
               involvement in high-risk transactions and suspicious network interactions.",
    },
];

/// Score cut points for score-based bucketing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.8,
        }
    }
}

/// Policy mapping a ranked score to an alert level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Bucket by rank: the top `high_top_percent` of accounts are HIGH, the
    /// rest of the top `medium_top_percent` are MEDIUM, everything else LOW.
    /// Cut-off counts are `ceil(total * percent / 100)`.
    Percentile {
        high_top_percent: f64,
        medium_top_percent: f64,
    },
    /// Bucket by absolute score.
    Score(RiskLevelThresholds),
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy::Percentile {
            high_top_percent: 1.0,
            medium_top_percent: 5.0,
        }
    }
}

impl AlertPolicy {
    /// Classify an entity given its score, its 1-based rank and the number
    /// of ranked entities.
    pub fn classify(&self, score: f64, rank: usize, total: usize) -> AlertLevel {
        match self {
            AlertPolicy::Percentile {
                high_top_percent,
                medium_top_percent,
            } => {
                let high_cut = percentile_cutoff(total, *high_top_percent);
                let medium_cut = percentile_cutoff(total, *medium_top_percent).max(high_cut);
                if rank <= high_cut {
                    AlertLevel::High
                } else if rank <= medium_cut {
                    AlertLevel::Medium
                } else {
                    AlertLevel::Low
                }
            }
            AlertPolicy::Score(thresholds) => {
                if score >= thresholds.high {
                    AlertLevel::High
                } else if score >= thresholds.medium {
                    AlertLevel::Medium
                } else {
                    AlertLevel::Low
                }
            }
        }
    }
}

fn percentile_cutoff(total: usize, percent: f64) -> usize {
    if total == 0 || percent <= 0.0 {
        return 0;
    }
    let cut = (total as f64 * percent.min(100.0) / 100.0).ceil() as usize;
    cut.min(total)
}

/// Per-account triage row, as persisted to the risk table and consumed by
/// the presentation layer without further joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRecord {
    #[serde(rename = "rank")]
    pub rank: usize,

    #[serde(rename = "node_id")]
    pub node_id: usize,

    #[serde(rename = "Account Number")]
    pub account_number: String,

    #[serde(rename = "Bank ID")]
    pub bank_id: String,

    #[serde(rename = "Bank Name")]
    pub bank_name: String,

    #[serde(rename = "Entity Name")]
    pub entity_name: Option<String>,

    #[serde(rename = "risk_score")]
    pub risk_score: f64,

    #[serde(rename = "alert_level")]
    pub alert_level: AlertLevel,
}

impl TriageRecord {
    /// Search label `"account | bank | entity"`.
    pub fn search_label(&self) -> String {
        format!(
            "{} | {} | {}",
            self.account_number,
            self.bank_name,
            self.entity_name.as_deref().unwrap_or("Unknown")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_policy() {
        let policy = AlertPolicy::Score(RiskLevelThresholds::default());

        assert_eq!(policy.classify(0.1, 1, 1), AlertLevel::Low);
        assert_eq!(policy.classify(0.5, 1, 1), AlertLevel::Medium);
        assert_eq!(policy.classify(0.85, 1, 1), AlertLevel::High);
    }

    #[test]
    fn test_percentile_policy() {
        let policy = AlertPolicy::Percentile {
            high_top_percent: 10.0,
            medium_top_percent: 30.0,
        };

        // 20 accounts: top 2 HIGH, ranks 3..=6 MEDIUM
        assert_eq!(policy.classify(0.0, 1, 20), AlertLevel::High);
        assert_eq!(policy.classify(0.0, 2, 20), AlertLevel::High);
        assert_eq!(policy.classify(0.0, 3, 20), AlertLevel::Medium);
        assert_eq!(policy.classify(0.0, 6, 20), AlertLevel::Medium);
        assert_eq!(policy.classify(0.0, 7, 20), AlertLevel::Low);
    }

    #[test]
    fn test_percentile_zero_percent_flags_nothing() {
        let policy = AlertPolicy::Percentile {
            high_top_percent: 0.0,
            medium_top_percent: 0.0,
        };
        assert_eq!(policy.classify(1.0, 1, 10), AlertLevel::Low);
    }

    #[test]
    fn test_explanation_lookup() {
        assert_eq!(AlertLevel::High.explanation().severity, Severity::Critical);
        assert_eq!(AlertLevel::Medium.explanation().severity, Severity::Warning);
        assert!(AlertLevel::Low.explanation().headline.starts_with("LOW"));
    }

    #[test]
    fn test_alert_level_labels() {
        assert_eq!(AlertLevel::parse("high"), Some(AlertLevel::High));
        assert_eq!(AlertLevel::parse("bogus"), None);
        assert_eq!(serde_json::to_string(&AlertLevel::Medium).unwrap(), "\"MEDIUM\"");
    }

    #[test]
    fn test_policy_deserialization() {
        let policy: AlertPolicy =
            serde_json::from_str(r#"{"kind":"score","medium":0.4,"high":0.9}"#).unwrap();
        assert_eq!(
            policy,
            AlertPolicy::Score(RiskLevelThresholds {
                medium: 0.4,
                high: 0.9
            })
        );
    }
}
