//! GraphGuard - Main Entry Point
//!
//! Batch CLI: builds the transaction graph from a ledger, scores it, triages
//! accounts and serves read-only explorer queries over the results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use graphguard::{
    config::AppConfig,
    explorer::{self, DrilldownQuery, Explorer, OverviewFilter},
    graph::{GraphBuilder, GraphStore},
    ledger,
    metrics::PipelineMetrics,
    models::ScoringEngine,
    triage::{self, AccountDirectory},
    types::AlertLevel,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphguard")]
#[command(about = "Graph-based anti-money-laundering risk scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Artifact directory (overrides data.output_dir)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build graph artifacts from a ledger CSV
    Build {
        /// Ledger CSV (overrides data.ledger_path)
        #[arg(short, long)]
        ledger: Option<PathBuf>,
    },

    /// Score transactions and accounts, write the risk table
    Score,

    /// Build, score and evaluate in one pass
    Run {
        /// Ledger CSV (overrides data.ledger_path)
        #[arg(short, long)]
        ledger: Option<PathBuf>,
    },

    /// AUC and precision/recall at the configured K%
    Evaluate {
        /// Evaluate transactions or accounts
        #[arg(short, long, value_enum, default_value_t = EvalLevel::Transaction)]
        level: EvalLevel,
    },

    /// Filtered summary of the risk table
    Overview {
        /// Bank name to keep
        #[arg(short, long)]
        bank: Option<String>,

        /// Alert levels to keep (repeatable, `all` keeps every level)
        #[arg(short, long, default_value = "HIGH")]
        alert: Vec<String>,
    },

    /// Searchable account labels, riskiest first
    Search {
        /// List every account instead of the top ones
        #[arg(long)]
        show_all: bool,
    },

    /// One account with its alert explanation
    Account {
        /// Account number or search label
        account: String,
    },

    /// Riskiest transactions of an account and their local network
    Drilldown {
        /// Account number or search label
        account: String,

        /// Restrict to one bank id
        #[arg(short, long)]
        bank: Option<String>,

        /// Transactions to list (overrides triage.drilldown_top_n)
        #[arg(short, long)]
        top: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EvalLevel {
    Transaction,
    Account,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, from_file) = AppConfig::load_or_default(&cli.config)?;
    init_logging(&config);
    if from_file {
        info!(path = %cli.config.display(), "Configuration loaded successfully");
    } else {
        warn!(path = %cli.config.display(), "Configuration file not found, using defaults");
    }

    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.data.output_dir));
    let store = GraphStore::new(&output_dir, config.graph.delimiter());

    match cli.command {
        Commands::Build { ledger } => {
            let metrics = PipelineMetrics::new();
            build(&config, &store, ledger.as_deref(), &metrics)?;
            metrics.print_summary();
        }
        Commands::Score => {
            let metrics = PipelineMetrics::new();
            score(&config, &store, &metrics)?;
            metrics.print_summary();
        }
        Commands::Run { ledger } => {
            let metrics = PipelineMetrics::new();
            build(&config, &store, ledger.as_deref(), &metrics)?;
            score(&config, &store, &metrics)?;
            let report = metrics.time_stage("evaluate", || {
                evaluate(&config, &store, EvalLevel::Transaction)
            })?;
            print_json(&report)?;
            metrics.print_summary();
        }
        Commands::Evaluate { level } => {
            print_json(&evaluate(&config, &store, level)?)?;
        }
        Commands::Overview { bank, alert } => {
            let alert_levels = alert_levels(&alert)?;
            let records = store.load_risk_table().context("Failed to load risk table")?;
            if let Some(bank) = &bank {
                let banks = explorer::bank_names(&records);
                if !banks.contains(bank) {
                    anyhow::bail!("Unknown bank {bank:?}; available: {}", banks.join(", "));
                }
            }
            let filter = OverviewFilter {
                bank_name: bank,
                alert_levels,
            };
            print_json(&explorer::overview(&records, &filter))?;
        }
        Commands::Search { show_all } => {
            let records = store.load_risk_table().context("Failed to load risk table")?;
            let options = explorer::search_accounts(&records, show_all, config.triage.search_limit);
            for option in options {
                println!("{}", option.label);
            }
        }
        Commands::Account { account } => {
            let records = store.load_risk_table().context("Failed to load risk table")?;
            let view = explorer::account_view(&records, explorer::account_from_label(&account))?;
            print_json(&view)?;
        }
        Commands::Drilldown { account, bank, top } => {
            let data = Explorer::open(&store, load_directory(&config)?)
                .context("Failed to load explorer data (run `build` and `score` first)")?;
            let mut query = DrilldownQuery::new(
                explorer::account_from_label(&account),
                top.unwrap_or(config.triage.drilldown_top_n),
            );
            if let Some(bank) = bank {
                query = query.with_bank(bank);
            }
            print_json(&data.drilldown(&query)?)?;
        }
    }

    Ok(())
}

/// Parse `--alert` values; `all` clears the level filter.
fn alert_levels(labels: &[String]) -> Result<Vec<AlertLevel>> {
    if labels.iter().any(|label| label.eq_ignore_ascii_case("all")) {
        return Ok(Vec::new());
    }
    labels
        .iter()
        .map(|label| {
            AlertLevel::parse(label).with_context(|| format!("Unknown alert level: {label}"))
        })
        .collect()
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_directory(config: &AppConfig) -> Result<Option<AccountDirectory>> {
    config
        .data
        .account_directory
        .as_ref()
        .map(|path| {
            AccountDirectory::load(path)
                .with_context(|| format!("Failed to load account directory {path}"))
        })
        .transpose()
}

fn build(
    config: &AppConfig,
    store: &GraphStore,
    ledger_path: Option<&Path>,
    metrics: &PipelineMetrics,
) -> Result<()> {
    let ledger_path = ledger_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.data.ledger_path));

    let rows = metrics
        .time_stage("read", || ledger::read_ledger(&ledger_path))
        .with_context(|| format!("Failed to read ledger {}", ledger_path.display()))?;

    let builder = GraphBuilder::new(config.graph.id_order, &config.graph.unknown_payment_format)
        .with_delimiter(config.graph.delimiter());
    let built = metrics.time_stage("build", || builder.build(&rows))?;
    metrics.record_build(&built.report);

    metrics.time_stage("persist", || -> Result<()> {
        store.save_graph(&built.graph, &built.payment_formats)?;
        store.save_account_index(&built.graph.account_index())?;
        store.save_json("build_report.json", &built.report)?;
        Ok(())
    })?;

    info!(dir = %store.dir().display(), "Build complete");
    Ok(())
}

fn score(config: &AppConfig, store: &GraphStore, metrics: &PipelineMetrics) -> Result<()> {
    let graph = store
        .load_graph()
        .context("Failed to load graph artifacts (run `build` first)")?;

    let engine = ScoringEngine::from_config(config, &graph)?;
    info!(backend = engine.backend(), aggregation = ?engine.aggregation(), "Scoring engine ready");

    let result = metrics.time_stage("score", || engine.score(&graph))?;
    metrics.record_scores(&result.edge_scores);

    let directory = load_directory(config)?;
    let records = metrics.time_stage("triage", || {
        triage::build_triage_records(
            &graph,
            &result.node_scores,
            &config.triage.alert_policy,
            directory.as_ref(),
        )
    })?;
    metrics.record_alerts(&records);

    store.save_edge_scores(&result.edge_scores)?;
    store.save_risk_table(&records)?;
    Ok(())
}

fn evaluate(config: &AppConfig, store: &GraphStore, level: EvalLevel) -> Result<triage::EvaluationReport> {
    let graph = store.load_graph().context("Failed to load graph artifacts")?;

    let (labels, scores) = match level {
        EvalLevel::Transaction => {
            let scores = store.load_edge_scores().context("Failed to load transaction scores")?;
            (graph.edges().labels().to_vec(), scores)
        }
        EvalLevel::Account => {
            let records = store.load_risk_table().context("Failed to load risk table")?;
            let scores = triage::node_scores_from_records(&records, graph.num_nodes())
                .context("Risk table does not match the graph (re-run `score`)")?;
            (triage::account_labels(&graph), scores)
        }
    };

    let report = triage::evaluate(&labels, &scores, &config.triage.k_percents)?;
    info!(auc = %report.auc, items = report.items, positives = report.positives, "Evaluation complete");
    for at_k in &report.at_k {
        info!(
            k_percent = at_k.k_percent,
            k = at_k.k,
            precision = %at_k.precision,
            recall = %at_k.recall,
            "Top-K metrics"
        );
    }
    Ok(report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview_alerts(args: &[&str]) -> Vec<String> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Overview { alert, .. } => alert,
            _ => panic!("expected overview"),
        }
    }

    #[test]
    fn test_overview_defaults_to_high() {
        let alert = overview_alerts(&["graphguard", "overview"]);
        assert_eq!(alert_levels(&alert).unwrap(), vec![AlertLevel::High]);
    }

    #[test]
    fn test_overview_alert_selection() {
        let alert = overview_alerts(&["graphguard", "overview", "-a", "MEDIUM", "-a", "LOW"]);
        assert_eq!(
            alert_levels(&alert).unwrap(),
            vec![AlertLevel::Medium, AlertLevel::Low]
        );

        let alert = overview_alerts(&["graphguard", "overview", "--alert", "all"]);
        assert!(alert_levels(&alert).unwrap().is_empty());

        assert!(alert_levels(&["SEVERE".to_string()]).is_err());
    }
}
