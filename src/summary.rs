// 📊 Dashboard Summary
// Totals by category, spend/receipt figures, statement period

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::transaction::{round2, Transaction};

/// Spend in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
    /// Percentage of total spend (0-100)
    pub share: f64,
}

/// Figures shown at the top of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_spend: f64,
    pub total_transactions: usize,
    /// `None` when the statement has no spending rows
    pub top_category: Option<String>,
    pub category_summary: Vec<CategoryTotal>,
    pub total_received: f64,
    pub credit_count: usize,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

impl DashboardSummary {
    pub fn is_empty(&self) -> bool {
        self.total_transactions == 0
    }

    pub fn category(&self, name: &str) -> Option<&CategoryTotal> {
        self.category_summary.iter().find(|c| c.category == name)
    }
}

/// Summarize categorized transactions. Spend figures use debit rows only.
pub fn summarize(transactions: &[Transaction]) -> DashboardSummary {
    let mut by_category: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut total_spend = 0.0;
    let mut total_transactions = 0;
    let mut total_received = 0.0;
    let mut credit_count = 0;

    for tx in transactions {
        if tx.is_debit() {
            total_spend += tx.amount;
            total_transactions += 1;
            let entry = by_category.entry(tx.category.as_str()).or_insert((0.0, 0));
            entry.0 += tx.amount;
            entry.1 += 1;
        } else {
            total_received += tx.amount;
            credit_count += 1;
        }
    }

    let mut category_summary: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_string(),
            total: round2(total),
            count,
            share: if total_spend > 0.0 {
                round2(total / total_spend * 100.0)
            } else {
                0.0
            },
        })
        .collect();

    category_summary.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });

    let top_category = category_summary.first().map(|c| c.category.clone());

    let dates = transactions.iter().filter_map(|tx| tx.posted_on);
    let period_start = dates.clone().min();
    let period_end = dates.max();

    DashboardSummary {
        total_spend: round2(total_spend),
        total_transactions,
        top_category,
        category_summary,
        total_received: round2(total_received),
        credit_count,
        period_start,
        period_end,
    }
}
