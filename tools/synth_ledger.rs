//! Synthetic Ledger Generator
//!
//! Writes an IBM-AML-style transaction ledger for exercising the pipeline
//! without the real dataset. Laundering transactions follow fan-out,
//! fan-in and cycle patterns through a small set of mule accounts.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use graphguard::ledger::write_ledger;
use graphguard::types::LedgerRow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const PAYMENT_FORMATS: &[&str] = &["ACH", "Cheque", "Credit Card", "Reinvestment", "Wire", "Cash"];
const CURRENCIES: &[&str] = &["US Dollar", "Euro", "UK Pound"];
const BANK_NAMES: &[&str] = &[
    "First Harbor Bank",
    "Northwind Savings",
    "Cedar Trust",
    "Meridian Credit Union",
    "Summit National",
    "Old Mill Bank",
];

#[derive(Parser, Debug)]
#[command(name = "synth-ledger")]
#[command(about = "Generate a synthetic AML transaction ledger")]
struct Args {
    /// Output ledger CSV
    #[arg(short, long, default_value = "data/synthetic_ledger.csv")]
    output: PathBuf,

    /// Also write an account directory CSV (Account Number, Bank Name, Entity Name)
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Number of transactions
    #[arg(short, long, default_value_t = 10_000)]
    rows: usize,

    /// Number of ordinary accounts
    #[arg(long, default_value_t = 500)]
    accounts: usize,

    /// Fraction of transactions belonging to laundering patterns
    #[arg(long, default_value_t = 0.01)]
    laundering_rate: f64,

    /// Fraction of rows written with a corrupt timestamp
    #[arg(long, default_value_t = 0.0)]
    bad_timestamp_rate: f64,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Debug, Clone)]
struct Account {
    number: String,
    bank: String,
}

/// Ledger generator for testing
struct LedgerGenerator {
    rng: StdRng,
    accounts: Vec<Account>,
    mules: Vec<Account>,
    start: NaiveDateTime,
    bad_timestamp_rate: f64,
}

impl LedgerGenerator {
    fn new(seed: u64, accounts: usize, bad_timestamp_rate: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let account = |rng: &mut StdRng| Account {
            number: format!("{:09X}", rng.gen_range(0x8000_0000u64..0xF_FFFF_FFFF)),
            bank: rng.gen_range(1..=BANK_NAMES.len()).to_string(),
        };
        let ordinary = (0..accounts.max(2)).map(|_| account(&mut rng)).collect();
        let mules = (0..(accounts / 50).max(3)).map(|_| account(&mut rng)).collect();

        Self {
            rng,
            accounts: ordinary,
            mules,
            start: NaiveDate::from_ymd_opt(2022, 9, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            bad_timestamp_rate,
        }
    }

    fn timestamp(&mut self) -> String {
        if self.rng.gen_bool(self.bad_timestamp_rate) {
            return "not-a-timestamp".to_string();
        }
        let offset = Duration::minutes(self.rng.gen_range(0..60 * 24 * 10));
        (self.start + offset).format("%Y/%m/%d %H:%M").to_string()
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }

    fn ordinary_account(&mut self) -> Account {
        self.accounts[self.rng.gen_range(0..self.accounts.len())].clone()
    }

    fn mule_account(&mut self) -> Account {
        self.mules[self.rng.gen_range(0..self.mules.len())].clone()
    }

    fn row(&mut self, from: &Account, to: &Account, amount: f64, format: &str, laundering: u8) -> LedgerRow {
        let currency = self.random_choice(CURRENCIES);
        let mut row = LedgerRow::new(
            &self.timestamp(),
            (&from.number, &from.bank),
            (&to.number, &to.bank),
            (amount * 100.0).round() / 100.0,
            format,
            laundering,
        );
        row.receiving_currency = Some(currency.to_string());
        row.payment_currency = Some(currency.to_string());
        row
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> LedgerRow {
        let from = self.ordinary_account();
        let to = self.ordinary_account();
        let amount = self.rng.gen_range(10.0..5_000.0);
        let format = self.random_choice(PAYMENT_FORMATS);
        self.row(&from, &to, amount, format, 0)
    }

    /// Generate one laundering pattern (fan-out, fan-in or cycle)
    fn generate_pattern(&mut self) -> Vec<LedgerRow> {
        let hub = self.mule_account();
        let width = self.rng.gen_range(3..7);
        let amount = self.rng.gen_range(8_000.0..50_000.0);

        match self.rng.gen_range(0..3) {
            0 => (0..width)
                .map(|_| {
                    let to = self.ordinary_account();
                    self.row(&hub, &to, amount / width as f64, "Wire", 1)
                })
                .collect(),
            1 => (0..width)
                .map(|_| {
                    let from = self.ordinary_account();
                    self.row(&from, &hub, amount / width as f64, "Cash", 1)
                })
                .collect(),
            _ => {
                let mut ring = vec![hub];
                ring.extend((1..width).map(|_| self.mule_account()));
                (0..ring.len())
                    .map(|i| {
                        let from = ring[i].clone();
                        let to = ring[(i + 1) % ring.len()].clone();
                        self.row(&from, &to, amount * 0.97, "ACH", 1)
                    })
                    .collect()
            }
        }
    }

    fn generate(&mut self, rows: usize, laundering_rate: f64) -> Vec<LedgerRow> {
        let mut ledger = Vec::with_capacity(rows);
        while ledger.len() < rows {
            if self.rng.gen_bool(laundering_rate) {
                ledger.extend(self.generate_pattern());
            } else {
                ledger.push(self.generate_legitimate());
            }
        }
        ledger.truncate(rows);
        ledger
    }

    fn write_directory(&mut self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
        wtr.write_record(["Account Number", "Bank Name", "Entity Name"])?;

        let all: Vec<Account> = self.accounts.iter().chain(&self.mules).cloned().collect();
        for (i, account) in all.iter().enumerate() {
            let bank_name = account
                .bank
                .parse::<usize>()
                .ok()
                .and_then(|b| b.checked_sub(1))
                .and_then(|b| BANK_NAMES.get(b))
                .copied()
                .unwrap_or("Unknown");
            let entity = if self.rng.gen_bool(0.8) {
                format!("Corporation #{i}")
            } else {
                String::new()
            };
            wtr.write_record([account.number.as_str(), bank_name, entity.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synth_ledger=info".parse()?),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.laundering_rate),
        "--laundering-rate must be within [0, 1]"
    );
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.bad_timestamp_rate),
        "--bad-timestamp-rate must be within [0, 1]"
    );

    info!(
        rows = args.rows,
        accounts = args.accounts,
        laundering_rate = args.laundering_rate,
        seed = args.seed,
        "Generating synthetic ledger"
    );

    let mut generator = LedgerGenerator::new(args.seed, args.accounts, args.bad_timestamp_rate);
    let ledger = generator.generate(args.rows, args.laundering_rate);
    let laundering = ledger.iter().filter(|r| r.is_laundering == Some(1)).count();

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?,
    );
    write_ledger(&mut writer, &ledger)?;
    writer.flush()?;

    if let Some(path) = &args.directory {
        generator.write_directory(path)?;
        info!(path = %path.display(), "Account directory written");
    }

    info!(
        path = %args.output.display(),
        rows = ledger.len(),
        laundering,
        "Completed! Synthetic ledger written"
    );
    Ok(())
}
