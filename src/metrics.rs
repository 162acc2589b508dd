//! Run statistics for the risk-scoring pipeline.

use crate::graph::builder::BuildReport;
use crate::types::alert::{AlertLevel, TriageRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for one pipeline run
pub struct PipelineMetrics {
    /// Ledger rows read
    pub rows_read: AtomicU64,
    /// Rows dropped for an unparseable timestamp
    pub rows_dropped: AtomicU64,
    /// Missing fields replaced by defaults
    pub fields_defaulted: AtomicU64,
    pub nodes: AtomicU64,
    pub edges: AtomicU64,
    /// Known laundering transactions
    pub positive_labels: AtomicU64,
    /// Wall time per stage, in execution order
    stage_times: RwLock<Vec<(String, Duration)>>,
    /// Accounts by alert level
    alerts_by_level: RwLock<BTreeMap<AlertLevel, u64>>,
    /// Transaction risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            rows_read: AtomicU64::new(0),
            rows_dropped: AtomicU64::new(0),
            fields_defaulted: AtomicU64::new(0),
            nodes: AtomicU64::new(0),
            edges: AtomicU64::new(0),
            positive_labels: AtomicU64::new(0),
            stage_times: RwLock::new(Vec::new()),
            alerts_by_level: RwLock::new(BTreeMap::new()),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record the data-quality counts of a graph build
    pub fn record_build(&self, report: &BuildReport) {
        self.rows_read.store(report.rows_read as u64, Ordering::Relaxed);
        self.rows_dropped
            .store(report.rows_dropped_timestamp as u64, Ordering::Relaxed);
        let defaulted = report.missing_amount_paid
            + report.missing_amount_received
            + report.missing_payment_format
            + report.missing_label;
        self.fields_defaulted.store(defaulted as u64, Ordering::Relaxed);
        self.nodes.store(report.nodes as u64, Ordering::Relaxed);
        self.edges.store(report.edges as u64, Ordering::Relaxed);
        self.positive_labels
            .store(report.positive_labels as u64, Ordering::Relaxed);
    }

    /// Record how long a stage took
    pub fn record_stage(&self, stage: &str, duration: Duration) {
        if let Ok(mut times) = self.stage_times.write() {
            times.push((stage.to_string(), duration));
        }
    }

    /// Run `f` as a named stage and record its duration
    pub fn time_stage<T>(&self, stage: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record_stage(stage, start.elapsed());
        result
    }

    /// Record transaction risk scores into the distribution
    pub fn record_scores(&self, scores: &[f64]) {
        if let Ok(mut buckets) = self.score_buckets.write() {
            for score in scores {
                let bucket = (score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    /// Record alert levels of a triage table
    pub fn record_alerts(&self, records: &[TriageRecord]) {
        if let Ok(mut by_level) = self.alerts_by_level.write() {
            for record in records {
                *by_level.entry(record.alert_level).or_insert(0) += 1;
            }
        }
    }

    /// Stage durations in execution order
    pub fn get_stage_times(&self) -> Vec<(String, Duration)> {
        self.stage_times
            .read()
            .map(|times| times.clone())
            .unwrap_or_default()
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Get accounts by alert level
    pub fn get_alerts_by_level(&self) -> BTreeMap<AlertLevel, u64> {
        self.alerts_by_level
            .read()
            .map(|by_level| by_level.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let rows = self.rows_read.load(Ordering::Relaxed);
        let dropped = self.rows_dropped.load(Ordering::Relaxed);
        let drop_rate = if rows > 0 {
            (dropped as f64 / rows as f64) * 100.0
        } else {
            0.0
        };
        let edges = self.edges.load(Ordering::Relaxed);
        let positives = self.positive_labels.load(Ordering::Relaxed);
        let positive_rate = if edges > 0 {
            (positives as f64 / edges as f64) * 100.0
        } else {
            0.0
        };

        let alerts_by_level = self.get_alerts_by_level();
        let accounts: u64 = alerts_by_level.values().sum();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            AML RISK PIPELINE - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Rows Read: {:>10}  │  Dropped: {:>8} ({:>5.2}%)         ║",
            rows, dropped, drop_rate
        );
        info!(
            "║ Accounts:  {:>10}  │  Transactions: {:>10}           ║",
            self.nodes.load(Ordering::Relaxed),
            edges
        );
        info!(
            "║ Laundering: {:>9}  │  Positive Rate: {:>7.3}%          ║",
            positives, positive_rate
        );
        info!(
            "║ Defaulted Fields: {:>8}                                   ║",
            self.fields_defaulted.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Stage Times:                                                 ║");
        for (stage, duration) in self.get_stage_times() {
            info!("║   {:12}: {:>10.1} ms", stage, duration.as_secs_f64() * 1000.0);
        }
        info!(
            "║   {:12}: {:>10.1} ms",
            "total",
            self.start_time.elapsed().as_secs_f64() * 1000.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Accounts by Alert Level:                                     ║");
        for (level, count) in alerts_by_level.iter().rev() {
            let pct = if accounts > 0 {
                (*count as f64 / accounts as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>8} ({:>5.1}%)", level, count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Transaction Risk Distribution:                               ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>8} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_recording() {
        let metrics = PipelineMetrics::new();
        metrics.record_build(&BuildReport {
            rows_read: 10,
            rows_dropped_timestamp: 2,
            missing_amount_paid: 1,
            missing_payment_format: 3,
            nodes: 5,
            edges: 8,
            positive_labels: 1,
            ..Default::default()
        });

        assert_eq!(metrics.rows_read.load(Ordering::Relaxed), 10);
        assert_eq!(metrics.rows_dropped.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.fields_defaulted.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.edges.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn test_score_distribution() {
        let metrics = PipelineMetrics::new();
        metrics.record_scores(&[0.0, 0.05, 0.5, 0.99, 1.0]);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[0], 2);
        assert_eq!(dist[5], 1);
        assert_eq!(dist[9], 2);
    }

    #[test]
    fn test_alerts_and_stages() {
        let metrics = PipelineMetrics::new();
        let record = |level| TriageRecord {
            rank: 1,
            node_id: 0,
            account_number: "A".to_string(),
            bank_id: "1".to_string(),
            bank_name: "1".to_string(),
            entity_name: None,
            risk_score: 0.5,
            alert_level: level,
        };
        metrics.record_alerts(&[
            record(AlertLevel::High),
            record(AlertLevel::Low),
            record(AlertLevel::Low),
        ]);
        let value = metrics.time_stage("score", || 7);

        assert_eq!(value, 7);
        assert_eq!(metrics.get_alerts_by_level().get(&AlertLevel::Low), Some(&2));
        assert_eq!(metrics.get_stage_times()[0].0, "score");
    }
}
