use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::amount::Direction;
use crate::parser::{ExtractionMode, RawTransaction};
use crate::rules::ClassificationResult;

/// Narration fragments of rows that are statement bookkeeping, not spending
pub const SUMMARY_ROW_MARKERS: &[&str] = &[
    "TOTAL",
    "INTEREST",
    "OPENING BALANCE",
    "CLOSING BALANCE",
    "BALANCE B/F",
    "BALANCE C/F",
];

/// A normalized, categorized statement row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Date exactly as printed on the statement
    #[serde(rename = "Transaction Date")]
    pub date: String,

    #[serde(rename = "Posted On")]
    pub posted_on: Option<NaiveDate>,

    #[serde(rename = "Description/Narration")]
    pub description: String,

    /// Always positive; see `direction`
    #[serde(rename = "Amount")]
    pub amount: f64,

    #[serde(rename = "Direction")]
    pub direction: Direction,

    #[serde(rename = "Balance")]
    pub balance: Option<f64>,

    #[serde(rename = "Category")]
    pub category: String,

    #[serde(rename = "Rule")]
    pub rule_id: Option<String>,

    #[serde(rename = "Confidence")]
    pub confidence: f64,

    // Provenance
    #[serde(rename = "Mode")]
    pub mode: ExtractionMode,

    #[serde(rename = "Page")]
    pub page: usize,

    #[serde(rename = "Line")]
    pub line_number: usize,
}

impl Transaction {
    /// Normalize a raw row. Debit wins when both sides carry an amount;
    /// rows without a positive amount are dropped.
    pub fn from_raw(raw: RawTransaction) -> Option<Transaction> {
        let (amount, direction) = match (raw.debit, raw.credit) {
            (Some(d), _) if d > 0.0 => (d, Direction::Debit),
            (_, Some(c)) if c > 0.0 => (c, Direction::Credit),
            _ => return None,
        };

        Some(Transaction {
            date: raw.date,
            posted_on: raw.posted_on,
            description: raw.description,
            amount: round2(amount),
            direction,
            balance: raw.balance,
            category: String::new(),
            rule_id: None,
            confidence: 0.0,
            mode: raw.mode,
            page: raw.page,
            line_number: raw.line_number,
        })
    }

    /// Attach the category engine's verdict
    pub fn set_classification(&mut self, result: ClassificationResult) {
        self.category = result.category;
        self.rule_id = result.rule_id;
        self.confidence = result.confidence;
    }

    pub fn is_debit(&self) -> bool {
        self.direction == Direction::Debit
    }

    /// "TOTAL", "INTEREST" and balance lines are not transactions
    pub fn is_summary_row(&self) -> bool {
        let upper = self.description.to_uppercase();
        SUMMARY_ROW_MARKERS.iter().any(|m| upper.contains(m))
    }

    /// Content hash used to drop rows that the extractor emitted twice
    /// (page overlap). The running balance is part of the key, so two
    /// genuine identical purchases on the same day stay distinct.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{:.2}|{}|{}",
            self.date,
            self.description.trim().to_lowercase(),
            self.amount,
            self.direction.as_str(),
            self.balance.map(|b| format!("{:.2}", b)).unwrap_or_default()
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Round to two decimals (paise / cents)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(desc: &str, debit: Option<f64>, credit: Option<f64>, balance: Option<f64>) -> RawTransaction {
        RawTransaction {
            date: "01/04/2024".to_string(),
            posted_on: NaiveDate::from_ymd_opt(2024, 4, 1),
            description: desc.to_string(),
            debit,
            credit,
            balance,
            mode: ExtractionMode::Table,
            page: 1,
            line_number: 3,
            raw_line: String::new(),
        }
    }

    #[test]
    fn test_from_raw_directions() {
        let tx = Transaction::from_raw(raw("SWIGGY", Some(250.0), None, None)).unwrap();
        assert_eq!(tx.amount, 250.0);
        assert!(tx.is_debit());

        let tx = Transaction::from_raw(raw("SALARY", None, Some(1000.0), None)).unwrap();
        assert_eq!(tx.direction, Direction::Credit);

        // Debit wins when both columns carry a value
        let tx = Transaction::from_raw(raw("ODD", Some(5.0), Some(7.0), None)).unwrap();
        assert!(tx.is_debit());
        assert_eq!(tx.amount, 5.0);
    }

    #[test]
    fn test_from_raw_drops_zero_rows() {
        assert!(Transaction::from_raw(raw("NOTHING", Some(0.0), None, None)).is_none());
        assert!(Transaction::from_raw(raw("NOTHING", None, None, None)).is_none());
    }

    #[test]
    fn test_summary_rows() {
        let total = Transaction::from_raw(raw("Total Debits", Some(900.0), None, None)).unwrap();
        assert!(total.is_summary_row());
        let interest = Transaction::from_raw(raw("Int.Pd: INTEREST", None, Some(4.0), None)).unwrap();
        assert!(interest.is_summary_row());
        let normal = Transaction::from_raw(raw("UPI ZOMATO", Some(200.0), None, None)).unwrap();
        assert!(!normal.is_summary_row());
    }

    #[test]
    fn test_fingerprint_uses_balance() {
        let a = Transaction::from_raw(raw("UBER", Some(180.0), None, Some(820.0))).unwrap();
        let b = Transaction::from_raw(raw("uber ", Some(180.0), None, Some(820.0))).unwrap();
        let c = Transaction::from_raw(raw("UBER", Some(180.0), None, Some(640.0))).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.005_1), 10.01);
        assert_eq!(round2(3.333), 3.33);
    }
}
