// 🔎 Statement Analysis Pipeline
// bytes → text/table → rows → filter → categorize → summary

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::extract::{detect_input_kind, extract_pdf_text, read_csv_table, InputKind};
use crate::parser::{detect_bank, parse_document, Document, ExtractionMode, SourceType};
use crate::rules::RuleEngine;
use crate::summary::{summarize, DashboardSummary};
use crate::transaction::Transaction;

/// Knobs for one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    /// List credit rows alongside spending rows
    pub include_credits: bool,
    /// Drop rows emitted twice by overlapping page extraction
    pub dedupe: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        AnalyzeOptions {
            include_credits: false,
            dedupe: true,
        }
    }
}

/// Everything the dashboard needs for one uploaded statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementReport {
    pub id: Uuid,
    pub source_file: String,
    pub file_sha256: String,
    pub input: InputKind,
    pub bank: SourceType,
    pub mode: ExtractionMode,
    pub generated_at: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub summary: DashboardSummary,
    /// Dated lines that did not yield an amount
    pub skipped_rows: usize,
    /// TOTAL / INTEREST / balance rows removed
    pub summary_rows_removed: usize,
    pub duplicates_removed: usize,
}

impl StatementReport {
    /// Rows to show on the dashboard
    pub fn spending(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_debit())
    }
}

/// StatementAnalyzer - owns the category rules, stateless per request
#[derive(Debug, Clone, Default)]
pub struct StatementAnalyzer {
    engine: RuleEngine,
    options: AnalyzeOptions,
}

impl StatementAnalyzer {
    pub fn new(engine: RuleEngine, options: AnalyzeOptions) -> Self {
        StatementAnalyzer { engine, options }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn options(&self) -> AnalyzeOptions {
        self.options
    }

    /// Analyze a statement file on disk
    pub fn analyze_file(&self, path: &Path) -> Result<StatementReport> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("statement");
        self.analyze_bytes(&bytes, filename)
    }

    /// Analyze an uploaded statement held in memory
    pub fn analyze_bytes(&self, bytes: &[u8], filename: &str) -> Result<StatementReport> {
        let input = detect_input_kind(bytes, filename)?;

        let doc = match input {
            InputKind::Pdf => Document::Text(extract_pdf_text(bytes)?),
            InputKind::Csv => Document::Table(read_csv_table(bytes)?),
        };

        let bank = detect_bank(&doc.search_text());
        debug!(file = filename, bank = bank.code(), input = ?input, "Parsing statement");

        let outcome = parse_document(&doc, bank)
            .with_context(|| format!("Could not find transactions in '{}'", filename))?;

        let mut transactions = Vec::with_capacity(outcome.rows.len());
        let mut seen = HashSet::new();
        let mut duplicates_removed = 0;
        let mut summary_rows_removed = 0;

        for raw in outcome.rows {
            let Some(mut tx) = Transaction::from_raw(raw) else {
                continue;
            };

            if tx.is_summary_row() {
                summary_rows_removed += 1;
                continue;
            }

            // Only rows carrying a running balance can be told apart from a
            // genuine repeat purchase
            if self.options.dedupe && tx.balance.is_some() && !seen.insert(tx.fingerprint()) {
                duplicates_removed += 1;
                continue;
            }

            tx.set_classification(self.engine.classify(&tx.description));
            transactions.push(tx);
        }

        let summary = summarize(&transactions);

        if !self.options.include_credits {
            transactions.retain(|tx| tx.is_debit());
        }

        info!(
            file = filename,
            bank = bank.code(),
            mode = outcome.mode.name(),
            rows = transactions.len(),
            total_spend = summary.total_spend,
            duplicates = duplicates_removed,
            "Statement analyzed"
        );

        Ok(StatementReport {
            id: Uuid::new_v4(),
            source_file: filename.to_string(),
            file_sha256: sha256_hex(bytes),
            input,
            bank,
            mode: outcome.mode,
            generated_at: Utc::now(),
            transactions,
            summary,
            skipped_rows: outcome.skipped,
            summary_rows_removed,
            duplicates_removed,
        })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
