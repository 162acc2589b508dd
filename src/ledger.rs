//! CSV reader and writer for raw transaction ledgers.
//!
//! The IBM AML ledger layout repeats the `Account` header for the sending
//! and receiving side, so columns are resolved positionally rather than
//! through serde's header mapping.

use crate::error::{GraphGuardError, Result};
use crate::types::transaction::LedgerRow;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Header row written by [`write_ledger`].
pub const LEDGER_HEADER: [&str; 11] = [
    "Timestamp",
    "From Bank",
    "Account",
    "To Bank",
    "Account",
    "Amount Received",
    "Receiving Currency",
    "Amount Paid",
    "Payment Currency",
    "Payment Format",
    "Is Laundering",
];

/// Column positions resolved from a header row.
#[derive(Debug, Clone, PartialEq)]
struct ColumnMap {
    timestamp: usize,
    from_bank: usize,
    from_account: usize,
    to_bank: usize,
    to_account: usize,
    amount_received: Option<usize>,
    receiving_currency: Option<usize>,
    amount_paid: Option<usize>,
    payment_currency: Option<usize>,
    payment_format: Option<usize>,
    is_laundering: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| GraphGuardError::MissingColumn(name.to_string()))
        };

        let accounts: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.eq_ignore_ascii_case("Account"))
            .map(|(i, _)| i)
            .collect();

        let from_account = *accounts
            .first()
            .ok_or_else(|| GraphGuardError::MissingColumn("Account".to_string()))?;
        let to_account = match accounts.get(1) {
            Some(&i) => i,
            None => require("Account.1")?,
        };

        Ok(Self {
            timestamp: require("Timestamp")?,
            from_bank: require("From Bank")?,
            from_account,
            to_bank: require("To Bank")?,
            to_account,
            amount_received: find("Amount Received"),
            receiving_currency: find("Receiving Currency"),
            amount_paid: find("Amount Paid"),
            payment_currency: find("Payment Currency"),
            payment_format: find("Payment Format"),
            is_laundering: find("Is Laundering"),
        })
    }

    fn row(&self, record: &StringRecord) -> LedgerRow {
        let text = |i: usize| record.get(i).unwrap_or("").to_string();
        let opt_text = |i: Option<usize>| {
            i.and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let opt_amount = |i: Option<usize>| {
            i.and_then(|i| record.get(i))
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        LedgerRow {
            timestamp: text(self.timestamp),
            from_bank: text(self.from_bank),
            from_account: text(self.from_account),
            to_bank: text(self.to_bank),
            to_account: text(self.to_account),
            amount_received: opt_amount(self.amount_received),
            receiving_currency: opt_text(self.receiving_currency),
            amount_paid: opt_amount(self.amount_paid),
            payment_currency: opt_text(self.payment_currency),
            payment_format: opt_text(self.payment_format),
            is_laundering: self
                .is_laundering
                .and_then(|i| record.get(i))
                .and_then(parse_flag),
        }
    }
}

fn parse_flag(raw: &str) -> Option<u8> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(1),
        "false" => Some(0),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| u8::from(v != 0.0)),
    }
}

/// Read a ledger CSV from a file.
pub fn read_ledger<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let rows = read_ledger_from(file)?;
    info!(path = %path.display(), rows = rows.len(), "Ledger loaded");
    Ok(rows)
}

/// Read a ledger CSV from any reader.
pub fn read_ledger_from<R: Read>(reader: R) -> Result<Vec<LedgerRow>> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::resolve(rdr.headers()?)?;
    debug!(?columns, "Resolved ledger columns");

    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(columns.row(&record?));
    }
    Ok(rows)
}

/// Write rows in the IBM AML ledger layout.
pub fn write_ledger<W: Write>(writer: W, rows: &[LedgerRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(LEDGER_HEADER)?;

    let amount = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    for row in rows {
        let received = amount(row.amount_received);
        let paid = amount(row.amount_paid);
        let label = row.is_laundering.map(|v| v.to_string()).unwrap_or_default();
        wtr.write_record([
            row.timestamp.as_str(),
            row.from_bank.as_str(),
            row.from_account.as_str(),
            row.to_bank.as_str(),
            row.to_account.as_str(),
            received.as_str(),
            row.receiving_currency.as_deref().unwrap_or(""),
            paid.as_str(),
            row.payment_currency.as_deref().unwrap_or(""),
            row.payment_format.as_deref().unwrap_or(""),
            label.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
