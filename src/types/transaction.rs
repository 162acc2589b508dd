//! Ledger row data structures for IBM-AML-style transaction logs

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Naive timestamp layouts accepted in the `Timestamp` column.
const NAIVE_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d"];

/// One raw transaction as read from the ledger, before graph construction.
///
/// Optional fields are cells that were blank or unparseable; the graph
/// builder decides how each is defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Raw timestamp text
    pub timestamp: String,

    /// Sending bank identifier
    pub from_bank: String,

    /// Sending account identifier
    pub from_account: String,

    /// Receiving bank identifier
    pub to_bank: String,

    /// Receiving account identifier
    pub to_account: String,

    /// Amount credited to the receiver
    pub amount_received: Option<f64>,

    /// Currency of `amount_received`
    pub receiving_currency: Option<String>,

    /// Amount debited from the sender
    pub amount_paid: Option<f64>,

    /// Currency of `amount_paid`
    pub payment_currency: Option<String>,

    /// Payment channel (ACH, Wire, Cheque, ...)
    pub payment_format: Option<String>,

    /// Ground-truth laundering flag
    pub is_laundering: Option<u8>,
}

impl LedgerRow {
    /// Create a row with the fields the graph depends on.
    pub fn new(
        timestamp: &str,
        from: (&str, &str),
        to: (&str, &str),
        amount: f64,
        payment_format: &str,
        is_laundering: u8,
    ) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            from_account: from.0.to_string(),
            from_bank: from.1.to_string(),
            to_account: to.0.to_string(),
            to_bank: to.1.to_string(),
            amount_received: Some(amount),
            receiving_currency: Some("US Dollar".to_string()),
            amount_paid: Some(amount),
            payment_currency: Some("US Dollar".to_string()),
            payment_format: Some(payment_format.to_string()),
            is_laundering: Some(is_laundering),
        }
    }

    /// Event time in epoch seconds, or `None` when the cell does not parse.
    pub fn epoch_seconds(&self) -> Option<i64> {
        parse_timestamp(&self.timestamp)
    }
}

/// Parse a ledger timestamp into epoch seconds.
///
/// Naive values are interpreted as UTC. Returns `None` for anything that
/// cannot be parsed; callers treat that as a data-quality drop.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ibm_format() {
        assert_eq!(parse_timestamp("2022/09/01 00:20"), Some(1_661_991_600));
        assert_eq!(parse_timestamp("2022/09/01 00:20:30"), Some(1_661_991_630));
    }

    #[test]
    fn test_parse_iso_and_rfc3339() {
        assert_eq!(parse_timestamp("2022-09-01T00:20:00"), Some(1_661_991_600));
        assert_eq!(parse_timestamp("2022-09-01T02:20:00+02:00"), Some(1_661_991_600));
        assert_eq!(parse_timestamp("2022-09-01"), Some(1_661_990_400));
    }

    #[test]
    fn test_unparseable_timestamp() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2022/13/45 99:99"), None);
    }

    #[test]
    fn test_row_serialization() {
        let row = LedgerRow::new("2022/09/01 00:20", ("A1", "10"), ("B2", "20"), 12.5, "ACH", 0);

        let json = serde_json::to_string(&row).unwrap();
        let deserialized: LedgerRow = serde_json::from_str(&json).unwrap();

        assert_eq!(row, deserialized);
        assert_eq!(deserialized.epoch_seconds(), Some(1_661_991_600));
    }
}
