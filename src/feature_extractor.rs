//! Edge feature extraction for graph construction.
//!
//! Turns ledger rows into the fixed feature vector stored per transaction:
//! `[amount_paid, amount_received, payment_format_id]`.

use crate::graph::edges::EdgeFeatures;
use crate::types::transaction::LedgerRow;
use std::collections::{BTreeSet, HashMap};

/// Label encoder for a categorical column. Classes are sorted, so codes
/// are a pure function of the set of values seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl CategoryEncoder {
    /// Fit over a column's values.
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: Vec<String> = values
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let index = classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code))
            .collect();
        Self { classes, index }
    }

    pub fn transform(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Classes in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Feature extractor fitted over one ledger.
pub struct FeatureExtractor {
    unknown_label: String,
    payment_formats: CategoryEncoder,
}

impl FeatureExtractor {
    /// Fit the payment-format encoder. Missing formats are mapped to
    /// `unknown_label`, which becomes a regular category.
    pub fn fit(rows: &[LedgerRow], unknown_label: &str) -> Self {
        let payment_formats = CategoryEncoder::fit(
            rows.iter()
                .map(|row| row.payment_format.as_deref().unwrap_or(unknown_label)),
        );
        Self {
            unknown_label: unknown_label.to_string(),
            payment_formats,
        }
    }

    /// Extract the feature vector of one row.
    ///
    /// Amounts that are missing, non-finite or negative become 0.0.
    pub fn extract(&self, row: &LedgerRow) -> EdgeFeatures {
        let format = row
            .payment_format
            .as_deref()
            .unwrap_or(&self.unknown_label);
        // Rows outside the fitted ledger fall back to the unknown code.
        let format_id = self
            .payment_formats
            .transform(format)
            .or_else(|| self.payment_formats.transform(&self.unknown_label))
            .unwrap_or(self.payment_formats.classes().len());

        [
            clamp_amount(row.amount_paid),
            clamp_amount(row.amount_received),
            format_id as f64,
        ]
    }

    /// Payment-format classes in code order.
    pub fn payment_formats(&self) -> &[String] {
        self.payment_formats.classes()
    }
}

fn clamp_amount(amount: Option<f64>) -> f64 {
    amount.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(format: Option<&str>, paid: Option<f64>, received: Option<f64>) -> LedgerRow {
        let mut row = LedgerRow::new("2022/09/01 00:00", ("A", "1"), ("B", "2"), 0.0, "ACH", 0);
        row.payment_format = format.map(str::to_string);
        row.amount_paid = paid;
        row.amount_received = received;
        row
    }

    #[test]
    fn test_encoder_sorted_classes() {
        let encoder = CategoryEncoder::fit(["Wire", "ACH", "Cheque", "ACH"]);
        assert_eq!(encoder.classes(), &["ACH", "Cheque", "Wire"]);
        assert_eq!(encoder.transform("Wire"), Some(2));
        assert_eq!(encoder.transform("Bitcoin"), None);
    }

    #[test]
    fn test_feature_extraction() {
        let rows = vec![
            row(Some("Wire"), Some(100.0), Some(95.0)),
            row(None, None, Some(-3.0)),
            row(Some("ACH"), Some(f64::NAN), None),
        ];
        let extractor = FeatureExtractor::fit(&rows, "UNK");

        assert_eq!(extractor.payment_formats(), &["ACH", "UNK", "Wire"]);
        assert_eq!(extractor.extract(&rows[0]), [100.0, 95.0, 2.0]);
        assert_eq!(extractor.extract(&rows[1]), [0.0, 0.0, 1.0]);
        assert_eq!(extractor.extract(&rows[2]), [0.0, 0.0, 0.0]);
    }
}
