// 🏗️ Statement Parser Framework
// Bank detection + row extraction: table mode first, text-line mode as fallback

use anyhow::{bail, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::amount::{
    clean_amount, direction_marker, is_money_token, is_placeholder, leading_date, parse_date,
    Direction, ParsedAmount,
};
use crate::extract::{split_cells, StatementText};

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceType - Which bank issued the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Sbi,
    Hdfc,
    Paytm,
    Generic,
}

impl SourceType {
    /// Banks with a known statement layout, in detection order
    pub const KNOWN: [SourceType; 3] = [SourceType::Sbi, SourceType::Hdfc, SourceType::Paytm];

    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceType::Sbi => "State Bank of India",
            SourceType::Hdfc => "HDFC Bank",
            SourceType::Paytm => "Paytm",
            SourceType::Generic => "Unknown bank",
        }
    }

    /// Short code for internal use
    pub fn code(&self) -> &str {
        match self {
            SourceType::Sbi => "SBI",
            SourceType::Hdfc => "HDFC",
            SourceType::Paytm => "PAYTM",
            SourceType::Generic => "GENERIC",
        }
    }

    /// Lowercase keywords that identify the bank in the statement text
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            SourceType::Sbi => &["state bank of india", "sbi"],
            SourceType::Hdfc => &["hdfc bank"],
            SourceType::Paytm => &["paytm", "one97"],
            SourceType::Generic => &[],
        }
    }

    /// Header fragments for this bank's transaction table
    pub fn columns(&self) -> ColumnAliases {
        match self {
            SourceType::Sbi => ColumnAliases {
                date: &["date"],
                description: &["narration", "description"],
                debit: &["debit"],
                credit: &["credit"],
                amount: &[],
                balance: &["balance"],
            },
            SourceType::Hdfc => ColumnAliases {
                date: &["date"],
                description: &["narration"],
                debit: &["withdrawal"],
                credit: &["deposit"],
                amount: &[],
                balance: &["balance"],
            },
            SourceType::Paytm => ColumnAliases {
                date: &["date"],
                description: &["transaction details", "details"],
                debit: &[],
                credit: &[],
                amount: &["amount"],
                balance: &["balance"],
            },
            SourceType::Generic => ColumnAliases {
                date: &["date"],
                description: &[
                    "narration",
                    "narr",
                    "description",
                    "particulars",
                    "details",
                    "remarks",
                ],
                debit: &["debit", "withdrawal", "dr"],
                credit: &["credit", "deposit", "cr"],
                amount: &["amount", "amt"],
                balance: &["balance", "bal"],
            },
        }
    }
}

/// Header fragments per column role (lowercase)
#[derive(Debug, Clone, Copy)]
pub struct ColumnAliases {
    pub date: &'static [&'static str],
    pub description: &'static [&'static str],
    pub debit: &'static [&'static str],
    pub credit: &'static [&'static str],
    pub amount: &'static [&'static str],
    pub balance: &'static [&'static str],
}

/// Column indices resolved from one header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: usize,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub amount: Option<usize>,
    pub balance: Option<usize>,
    /// Number of cells in the header row
    pub width: usize,
}

/// How a row was recovered from the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMode {
    /// Column-aligned rows under a detected header
    Table,
    /// Regex heuristics over individual text lines
    TextLines,
    /// CSV export
    Csv,
}

impl ExtractionMode {
    pub fn name(&self) -> &str {
        match self {
            ExtractionMode::Table => "table",
            ExtractionMode::TextLines => "text lines",
            ExtractionMode::Csv => "csv",
        }
    }
}

/// RawTransaction - one statement row before filtering and categorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub date: String,
    pub posted_on: Option<NaiveDate>,
    pub description: String,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub balance: Option<f64>,

    // Provenance
    pub mode: ExtractionMode,
    pub page: usize,
    pub line_number: usize,
    pub raw_line: String,
}

impl RawTransaction {
    pub fn new(
        date: String,
        posted_on: Option<NaiveDate>,
        description: String,
        mode: ExtractionMode,
        page: usize,
        line_number: usize,
        raw_line: String,
    ) -> Self {
        RawTransaction {
            date,
            posted_on,
            description,
            debit: None,
            credit: None,
            balance: None,
            mode,
            page,
            line_number,
            raw_line,
        }
    }

    /// Builder pattern: set the amount on the debit or credit side
    pub fn with_amount(mut self, value: f64, direction: Direction) -> Self {
        match direction {
            Direction::Debit => self.debit = Some(value),
            Direction::Credit => self.credit = Some(value),
        }
        self
    }

    /// Builder pattern: add running balance
    pub fn with_balance(mut self, balance: Option<f64>) -> Self {
        self.balance = balance;
        self
    }

    /// Append a wrapped narration line
    pub fn append_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }
}

/// A parsed document: rows plus how they were found
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub rows: Vec<RawTransaction>,
    pub mode: ExtractionMode,
    pub source: SourceType,
    /// Dated lines that could not be turned into a transaction
    pub skipped: usize,
}

/// Input to the parsers
#[derive(Debug, Clone)]
pub enum Document {
    /// Extracted PDF text, one string per page
    Text(StatementText),
    /// Cell grid from a CSV export
    Table(Vec<Vec<String>>),
}

impl Document {
    /// Lowercased full text, used for bank detection
    pub fn search_text(&self) -> String {
        match self {
            Document::Text(text) => text.full_text().to_lowercase(),
            Document::Table(rows) => rows
                .iter()
                .map(|r| r.join(" "))
                .collect::<Vec<_>>()
                .join("\n")
                .to_lowercase(),
        }
    }

    fn grid(&self) -> Vec<GridRow> {
        match self {
            Document::Text(text) => text
                .lines()
                .enumerate()
                .map(|(idx, (page, line))| GridRow {
                    page,
                    line_number: idx + 1,
                    cells: split_cells(line),
                    raw: line.to_string(),
                })
                .collect(),
            Document::Table(rows) => rows
                .iter()
                .enumerate()
                .map(|(idx, cells)| GridRow {
                    page: 1,
                    line_number: idx + 1,
                    cells: cells.clone(),
                    raw: cells.join("  "),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct GridRow {
    page: usize,
    line_number: usize,
    cells: Vec<String>,
    raw: String,
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// StatementParser - Core trait for row extraction
///
/// Parsers are tried in order by `parse_document`; a parser that cannot
/// make sense of a document returns an error and the next one runs.
pub trait StatementParser: Send + Sync {
    /// Extract raw rows from a document
    fn parse(&self, doc: &Document) -> Result<ParseOutcome>;

    /// Extraction mode this parser reports
    fn mode(&self) -> ExtractionMode;

    /// Bank layout whose column aliases this parser uses
    fn source_type(&self) -> SourceType;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the issuing bank from statement text.
///
/// Single-word keywords must appear as a whole word so that UPI handles like
/// "SBIN0001234" inside another bank's narration do not count.
pub fn detect_bank(text: &str) -> SourceType {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for bank in SourceType::KNOWN {
        let hit = bank.keywords().iter().any(|kw| {
            if kw.contains(' ') {
                lower.contains(kw)
            } else {
                words.contains(kw)
            }
        });
        if hit {
            return bank;
        }
    }

    SourceType::Generic
}

/// Get the parser for an extraction mode
pub fn get_parser(mode: ExtractionMode, source: SourceType) -> Box<dyn StatementParser> {
    match mode {
        ExtractionMode::Table | ExtractionMode::Csv => Box::new(TableParser::new(source)),
        ExtractionMode::TextLines => Box::new(LineParser::new(source)),
    }
}

/// Run the fallback chain: table mode, then text-line mode.
///
/// CSV exports only go through table mode; a CSV without a recognizable
/// header is an error.
pub fn parse_document(doc: &Document, source: SourceType) -> Result<ParseOutcome> {
    let table = get_parser(ExtractionMode::Table, source);

    match doc {
        Document::Table(_) => table.parse(doc),
        Document::Text(_) => {
            match table.parse(doc) {
                Ok(outcome) if !outcome.rows.is_empty() => return Ok(outcome),
                Ok(_) => tracing::debug!("Table mode found a header but no rows"),
                Err(e) => tracing::debug!(error = %e, "Table mode unavailable"),
            }
            get_parser(ExtractionMode::TextLines, source).parse(doc)
        }
    }
}

// ============================================================================
// HEADER DETECTION
// ============================================================================

fn cell_matches(cell: &str, alias: &str) -> bool {
    let cell = cell.to_lowercase();
    if alias.contains(' ') {
        return cell.contains(alias);
    }
    cell.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|w| {
            if alias.len() <= 2 {
                w == alias
            } else {
                w.starts_with(alias)
            }
        })
}

/// Resolve column roles for one candidate header row
fn header_map(cells: &[String], aliases: &ColumnAliases) -> Option<ColumnMap> {
    let mut date = None;
    let mut description = None;
    let mut debit = None;
    let mut credit = None;
    let mut amount = None;
    let mut balance = None;

    for (idx, cell) in cells.iter().enumerate() {
        let is = |list: &[&str]| list.iter().any(|a| cell_matches(cell, a));

        // One role per cell; the first cell wins each role
        if is(aliases.date) {
            date.get_or_insert(idx);
        } else if is(aliases.balance) {
            balance.get_or_insert(idx);
        } else if is(aliases.debit) {
            debit.get_or_insert(idx);
        } else if is(aliases.credit) {
            credit.get_or_insert(idx);
        } else if is(aliases.amount) {
            amount.get_or_insert(idx);
        } else if is(aliases.description) {
            description.get_or_insert(idx);
        }
    }

    if debit.is_none() && credit.is_none() && amount.is_none() {
        return None;
    }

    Some(ColumnMap {
        date: date?,
        description: description?,
        debit,
        credit,
        amount,
        balance,
        width: cells.len(),
    })
}

/// Find the first header row, trying bank-specific aliases before the
/// generic set.
pub fn find_header(rows: &[Vec<String>], source: SourceType) -> Option<(usize, ColumnMap)> {
    let mut candidates = vec![source.columns()];
    if source != SourceType::Generic {
        candidates.push(SourceType::Generic.columns());
    }

    candidates.iter().find_map(|aliases| {
        rows.iter()
            .enumerate()
            .find_map(|(idx, cells)| header_map(cells, aliases).map(|map| (idx, map)))
    })
}

fn header_words_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(date|narration|description|particulars|debit|credit|withdrawal|deposit|balance)\b")
            .expect("valid header regex")
    })
}

fn furniture_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^\s*page\s+\d+|statement\s+of\s+account|account\s+statement",
            r"|generated\s+on|computer\s+generated|continued|^\s*\d+\s*$",
            r"|\bstatement\b|customer\s+(care|service)|\bqueries\b|helpline|toll[\s-]*free",
            r"|^\W*\*{3}"
        ))
        .expect("valid furniture regex")
    })
}

/// Page headers, footers and repeated column headers. These never extend a
/// narration.
fn is_page_furniture(line: &str) -> bool {
    if furniture_re().is_match(line) {
        return true;
    }
    header_words_re().find_iter(line).count() >= 2
}

/// "Opening Balance", "Balance B/F" and similar carry-forward rows
fn is_balance_carry(description: &str) -> bool {
    let upper = description.to_uppercase();
    ["OPENING BALANCE", "BALANCE B/F", "BALANCE BROUGHT FORWARD", "B/F", "BROUGHT FORWARD"]
        .iter()
        .any(|k| upper.contains(k))
}

// ============================================================================
// DIRECTION INFERENCE
// ============================================================================

/// Narration fragments that indicate money coming in
const CREDIT_KEYWORDS: &[&str] = &[
    "salary",
    "refund",
    "reversal",
    "deposit",
    "received",
    "cashback",
    "interest",
    "credited",
    "upi/cr",
    "/cr/",
    "neft cr",
    "imps cr",
    "by transfer",
];

/// Balances closer than this are considered equal
const BALANCE_TOLERANCE: f64 = 0.011;

/// Decide debit vs credit for a lone amount.
///
/// Order: explicit marker/sign, then running-balance delta, then narration
/// keywords. Unsigned amounts default to debit.
pub fn infer_direction(
    amount: ParsedAmount,
    balance: Option<f64>,
    prev_balance: Option<f64>,
    description: &str,
) -> Direction {
    if let Some(direction) = amount.direction {
        return direction;
    }

    if let (Some(bal), Some(prev)) = (balance, prev_balance) {
        if (prev - amount.value - bal).abs() < BALANCE_TOLERANCE {
            return Direction::Debit;
        }
        if (prev + amount.value - bal).abs() < BALANCE_TOLERANCE {
            return Direction::Credit;
        }
    }

    let lower = description.to_lowercase();
    if CREDIT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Direction::Credit;
    }

    Direction::Debit
}

fn signed_balance(amount: ParsedAmount) -> f64 {
    match amount.direction {
        Some(Direction::Debit) => -amount.value,
        _ => amount.value,
    }
}

// ============================================================================
// ROW ASSEMBLY (shared by both parsers)
// ============================================================================

/// Wrapped narration lines accepted per row. Further undated text belongs
/// to the page, not the row.
const MAX_CONTINUATION_LINES: usize = 2;

#[derive(Debug, Default)]
struct RowAssembler {
    rows: Vec<RawTransaction>,
    prev_balance: Option<f64>,
    /// Some(n) while the last row may still absorb narration lines
    open: Option<usize>,
    skipped: usize,
}

impl RowAssembler {
    fn push(&mut self, row: RawTransaction) {
        if row.balance.is_some() {
            self.prev_balance = row.balance;
        }
        self.rows.push(row);
        self.open = Some(0);
    }

    fn extend_narration(&mut self, text: &str) -> bool {
        match (self.open, self.rows.last_mut()) {
            (Some(n), Some(last)) if n < MAX_CONTINUATION_LINES => {
                last.append_description(text);
                self.open = Some(n + 1);
                true
            }
            _ => false,
        }
    }

    fn close(&mut self) {
        self.open = None;
    }

    fn skip(&mut self) {
        self.skipped += 1;
        self.open = None;
    }

    fn feed(&mut self, kind: LineKind) {
        match kind {
            LineKind::Row(row) => self.push(row),
            LineKind::Balance(balance) => {
                self.prev_balance = Some(balance);
                self.close();
            }
            LineKind::Narration(text) => {
                if !self.extend_narration(&text) {
                    self.close();
                }
            }
            LineKind::Unparsed => self.skip(),
            LineKind::Blank | LineKind::Other => self.close(),
        }
    }

    fn finish(self, mode: ExtractionMode, source: SourceType) -> ParseOutcome {
        ParseOutcome {
            rows: self.rows,
            mode,
            source,
            skipped: self.skipped,
        }
    }
}

// ============================================================================
// LINE MODE
// ============================================================================

/// Classification of one text line
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Row(RawTransaction),
    /// Opening / brought-forward balance
    Balance(f64),
    /// Continuation of the previous row's narration
    Narration(String),
    /// A dated line that did not yield an amount
    Unparsed,
    Blank,
    Other,
}

/// Line Parser - regex heuristics over free text lines
pub struct LineParser {
    source: SourceType,
}

impl LineParser {
    pub fn new(source: SourceType) -> Self {
        LineParser { source }
    }

    /// Classify a single line given the running balance so far
    pub fn classify(
        &self,
        line: &str,
        page: usize,
        line_number: usize,
        prev_balance: Option<f64>,
    ) -> LineKind {
        if line.trim().is_empty() {
            return LineKind::Blank;
        }

        let Some((raw_date, date, rest)) = leading_date(line) else {
            return self.classify_undated(line);
        };

        // Skip a value date printed right after the transaction date
        let rest = match leading_date(rest) {
            Some((_, _, after)) => after,
            None => rest,
        };

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let (desc_tokens, slots) = peel_amounts(&tokens);
        let description = desc_tokens.join(" ");

        if slots.iter().all(|s| s.is_none()) {
            return LineKind::Unparsed;
        }

        if is_balance_carry(&description) {
            return match slots.iter().rev().flatten().next() {
                Some(amount) => LineKind::Balance(signed_balance(*amount)),
                None => LineKind::Unparsed,
            };
        }

        let (amount, direction, balance) = match slots.as_slice() {
            // debit / credit / balance
            [debit, credit, balance] => {
                let balance = balance.map(signed_balance);
                match (debit, credit) {
                    (Some(d), _) if !d.is_zero() => (d.value, Direction::Debit, balance),
                    (_, Some(c)) if !c.is_zero() => (c.value, Direction::Credit, balance),
                    _ => return LineKind::Unparsed,
                }
            }
            // debit / credit with one placeholder
            [Some(d), None] => (d.value, Direction::Debit, None),
            [None, Some(c)] => (c.value, Direction::Credit, None),
            // amount / running balance
            [Some(amount), Some(bal)] => {
                let balance = Some(signed_balance(*bal));
                let direction = infer_direction(*amount, balance, prev_balance, &description);
                (amount.value, direction, balance)
            }
            [Some(amount)] => {
                let direction = infer_direction(*amount, None, prev_balance, &description);
                (amount.value, direction, None)
            }
            _ => return LineKind::Unparsed,
        };

        let row = RawTransaction::new(
            raw_date,
            Some(date),
            description,
            ExtractionMode::TextLines,
            page,
            line_number,
            line.trim().to_string(),
        )
        .with_amount(amount, direction)
        .with_balance(balance);

        LineKind::Row(row)
    }

    fn classify_undated(&self, line: &str) -> LineKind {
        if is_page_furniture(line) {
            return LineKind::Other;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let has_money = tokens.iter().any(|t| is_money_token(t));

        if has_money {
            if is_balance_carry(line) {
                let (_, slots) = peel_amounts(&tokens);
                if let Some(amount) = slots.iter().rev().flatten().next() {
                    return LineKind::Balance(signed_balance(*amount));
                }
            }
            return LineKind::Other;
        }

        LineKind::Narration(line.trim().to_string())
    }
}

/// Peel trailing money tokens (and "-" placeholders) off a tokenized line.
///
/// Returns the leading description tokens and up to three amount slots in
/// their natural left-to-right order. A standalone "Cr"/"Dr" token applies
/// to the amount before it.
fn peel_amounts<'a>(tokens: &[&'a str]) -> (Vec<&'a str>, Vec<Option<ParsedAmount>>) {
    let mut end = tokens.len();
    let mut slots = Vec::new();
    let mut pending_marker = None;

    while end > 0 && slots.len() < 3 {
        let tok = tokens[end - 1];
        if let Some(marker) = direction_marker(tok) {
            if pending_marker.is_some() {
                break;
            }
            pending_marker = Some(marker);
        } else if is_money_token(tok) {
            match clean_amount(tok) {
                Some(mut amount) => {
                    if let Some(marker) = pending_marker.take() {
                        amount.direction = Some(marker);
                    }
                    slots.push(Some(amount));
                }
                None => break,
            }
        } else if tok == "-" || tok == "--" {
            if pending_marker.is_some() {
                break;
            }
            slots.push(None);
        } else {
            break;
        }
        end -= 1;
    }

    // A dangling marker belongs to the narration
    if pending_marker.is_some() {
        end += 1;
    }

    slots.reverse();
    (tokens[..end].to_vec(), slots)
}

impl StatementParser for LineParser {
    fn parse(&self, doc: &Document) -> Result<ParseOutcome> {
        let Document::Text(text) = doc else {
            bail!("Text-line mode needs extracted statement text");
        };

        let mut asm = RowAssembler::default();
        for (idx, (page, line)) in text.lines().enumerate() {
            let kind = self.classify(line, page, idx + 1, asm.prev_balance);
            asm.feed(kind);
        }

        tracing::debug!(rows = asm.rows.len(), skipped = asm.skipped, "Line mode finished");
        Ok(asm.finish(ExtractionMode::TextLines, self.source))
    }

    fn mode(&self) -> ExtractionMode {
        ExtractionMode::TextLines
    }

    fn source_type(&self) -> SourceType {
        self.source
    }
}

// ============================================================================
// TABLE MODE
// ============================================================================

/// Table Parser - column-aligned rows under a detected header
pub struct TableParser {
    source: SourceType,
    lines: LineParser,
}

impl TableParser {
    pub fn new(source: SourceType) -> Self {
        TableParser {
            source,
            lines: LineParser::new(source),
        }
    }

    /// Clean one amount cell; placeholders count as absent
    fn cell(cells: &[String], idx: Option<usize>) -> Option<ParsedAmount> {
        idx.and_then(|i| cells.get(i))
            .filter(|c| !is_placeholder(c))
            .and_then(|c| clean_amount(c))
    }

    /// A money column holding text means the cells shifted: a narration
    /// split on a wide gap while an empty amount cell collapsed.
    fn shifted(cells: &[String], map: &ColumnMap) -> bool {
        [map.debit, map.credit, map.amount, map.balance]
            .into_iter()
            .flatten()
            .filter_map(|i| cells.get(i))
            .any(|c| !is_placeholder(c) && clean_amount(c).is_none())
    }

    fn table_row(
        &self,
        row: &GridRow,
        map: &ColumnMap,
        header: &[String],
        mode: ExtractionMode,
        asm: &mut RowAssembler,
    ) {
        if row.cells.is_empty() {
            asm.close();
            return;
        }

        if same_cells(&row.cells, header) {
            asm.close();
            return;
        }

        if row.cells.len() != map.width || Self::shifted(&row.cells, map) {
            // Ragged row: empty cells collapsed in the text layer
            let kind = self
                .lines
                .classify(&row.raw, row.page, row.line_number, asm.prev_balance);
            asm.feed(kind);
            return;
        }

        let date_cell = row.cells[map.date].trim();
        let description = row.cells[map.description].trim().to_string();
        let debit = Self::cell(&row.cells, map.debit).filter(|a| !a.is_zero());
        let credit = Self::cell(&row.cells, map.credit).filter(|a| !a.is_zero());
        let amount = Self::cell(&row.cells, map.amount).filter(|a| !a.is_zero());
        let balance = Self::cell(&row.cells, map.balance).map(signed_balance);

        let Some(posted_on) = parse_date(date_cell) else {
            if is_balance_carry(&description) {
                if let Some(b) = balance.or(amount.map(signed_balance)) {
                    asm.feed(LineKind::Balance(b));
                    return;
                }
            }
            if date_cell.is_empty()
                && debit.is_none()
                && credit.is_none()
                && amount.is_none()
                && !is_page_furniture(&row.raw)
            {
                asm.feed(LineKind::Narration(description));
            } else {
                asm.close();
            }
            return;
        };

        if is_balance_carry(&description) {
            if let Some(b) = balance.or(amount.map(signed_balance)) {
                asm.feed(LineKind::Balance(b));
                return;
            }
        }

        let (value, direction) = match (debit, credit, amount) {
            (Some(d), _, _) => (d.value, Direction::Debit),
            (None, Some(c), _) => (c.value, Direction::Credit),
            (None, None, Some(a)) => (
                a.value,
                infer_direction(a, balance, asm.prev_balance, &description),
            ),
            (None, None, None) => {
                asm.skip();
                return;
            }
        };

        let tx = RawTransaction::new(
            date_cell.to_string(),
            Some(posted_on),
            description,
            mode,
            row.page,
            row.line_number,
            row.raw.trim().to_string(),
        )
        .with_amount(value, direction)
        .with_balance(balance);

        asm.push(tx);
    }
}

fn same_cells(a: &[String], b: &[String]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.trim().eq_ignore_ascii_case(y.trim()))
}

impl StatementParser for TableParser {
    fn parse(&self, doc: &Document) -> Result<ParseOutcome> {
        let grid = doc.grid();
        let cells: Vec<Vec<String>> = grid.iter().map(|r| r.cells.clone()).collect();

        let Some((header_idx, map)) = find_header(&cells, self.source) else {
            bail!("No transaction table header found (need date, narration and amount columns)");
        };

        let mode = match doc {
            Document::Table(_) => ExtractionMode::Csv,
            Document::Text(_) => ExtractionMode::Table,
        };

        tracing::debug!(
            header_row = header_idx + 1,
            columns = map.width,
            source = self.source.code(),
            "Detected transaction table header"
        );

        let header = &grid[header_idx].cells;
        let mut asm = RowAssembler::default();
        for row in &grid[header_idx + 1..] {
            self.table_row(row, &map, header, mode, &mut asm);
        }

        Ok(asm.finish(mode, self.source))
    }

    fn mode(&self) -> ExtractionMode {
        ExtractionMode::Table
    }

    fn source_type(&self) -> SourceType {
        self.source
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    fn text_doc(text: &str) -> Document {
        Document::Text(StatementText::from_text(text))
    }

    #[test]
    fn test_source_type_names() {
        assert_eq!(SourceType::Sbi.name(), "State Bank of India");
        assert_eq!(SourceType::Hdfc.code(), "HDFC");
        assert_eq!(SourceType::Paytm.code(), "PAYTM");
        assert_eq!(SourceType::Generic.name(), "Unknown bank");
    }

    #[test]
    fn test_detect_bank() {
        assert_eq!(detect_bank("STATE BANK OF INDIA\nAccount Statement"), SourceType::Sbi);
        assert_eq!(detect_bank("Welcome to HDFC Bank"), SourceType::Hdfc);
        assert_eq!(detect_bank("One97 Communications - Paytm"), SourceType::Paytm);
        assert_eq!(detect_bank("Yes Bank statement"), SourceType::Generic);
    }

    #[test]
    fn test_detect_bank_ignores_ifsc_fragments() {
        // "SBIN" in a UPI narration is not an SBI statement
        let text = "ICICI Bank\nUPI/DR/412345/ravi@okaxis/SBIN0001234";
        assert_eq!(detect_bank(text), SourceType::Generic);
    }

    #[test]
    fn test_find_header_sbi() {
        let rows = vec![
            cells(&["Account Name", "Ravi"]),
            cells(&["Txn Date", "Value Date", "Description", "Ref No./Cheque No.", "Debit", "Credit", "Balance"]),
        ];
        let (idx, map) = find_header(&rows, SourceType::Sbi).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(map.date, 0);
        assert_eq!(map.description, 2);
        assert_eq!(map.debit, Some(4));
        assert_eq!(map.credit, Some(5));
        assert_eq!(map.balance, Some(6));
        assert_eq!(map.width, 7);
    }

    #[test]
    fn test_find_header_hdfc_and_paytm() {
        let hdfc = vec![cells(&["Date", "Narration", "Chq./Ref.No.", "Value Dt", "Withdrawal Amt.", "Deposit Amt.", "Closing Balance"])];
        let (_, map) = find_header(&hdfc, SourceType::Hdfc).unwrap();
        assert_eq!(map.debit, Some(4));
        assert_eq!(map.credit, Some(5));
        assert_eq!(map.balance, Some(6));

        let paytm = vec![cells(&["Date & Time", "Transaction Details", "Your Account", "Amount"])];
        let (_, map) = find_header(&paytm, SourceType::Paytm).unwrap();
        assert_eq!(map.description, 1);
        assert_eq!(map.amount, Some(3));
        assert_eq!(map.debit, None);
    }

    #[test]
    fn test_find_header_requires_amount_column() {
        let rows = vec![cells(&["Date", "Narration", "Reference"])];
        assert!(find_header(&rows, SourceType::Generic).is_none());
    }

    #[test]
    fn test_infer_direction() {
        let plain = ParsedAmount { value: 250.0, direction: None };
        assert_eq!(infer_direction(plain, Some(9750.0), Some(10000.0), "x"), Direction::Debit);
        assert_eq!(infer_direction(plain, Some(10250.0), Some(10000.0), "x"), Direction::Credit);
        assert_eq!(infer_direction(plain, None, None, "SALARY APRIL"), Direction::Credit);
        assert_eq!(infer_direction(plain, None, None, "SWIGGY"), Direction::Debit);

        let marked = ParsedAmount { value: 250.0, direction: Some(Direction::Credit) };
        assert_eq!(infer_direction(marked, Some(9750.0), Some(10000.0), "x"), Direction::Credit);
    }

    #[test]
    fn test_line_amount_and_balance() {
        let parser = LineParser::new(SourceType::Generic);
        let line = "01 Apr 2024  01 Apr 2024  UPI/DR/412345/SWIGGY  412345678901  250.00  9,750.00";
        let LineKind::Row(row) = parser.classify(line, 1, 7, Some(10000.0)) else {
            panic!("expected a transaction row");
        };
        assert_eq!(row.date, "01 Apr 2024");
        assert_eq!(row.description, "UPI/DR/412345/SWIGGY 412345678901");
        assert_eq!(row.debit, Some(250.0));
        assert_eq!(row.credit, None);
        assert_eq!(row.balance, Some(9750.0));
        assert_eq!(row.mode, ExtractionMode::TextLines);
    }

    #[test]
    fn test_line_debit_credit_balance_slots() {
        let parser = LineParser::new(SourceType::Generic);
        let LineKind::Row(row) =
            parser.classify("05/04/2024 NEFT SALARY ACME - 50,000.00 59,750.00", 1, 1, None)
        else {
            panic!("expected a transaction row");
        };
        assert_eq!(row.credit, Some(50000.0));
        assert_eq!(row.debit, None);
        assert_eq!(row.description, "NEFT SALARY ACME");
    }

    #[test]
    fn test_line_marker_token() {
        let parser = LineParser::new(SourceType::Generic);
        let LineKind::Row(row) = parser.classify("06/04/2024 REFUND AMAZON 499.00 Cr", 1, 1, None) else {
            panic!("expected a transaction row");
        };
        assert_eq!(row.credit, Some(499.0));
    }

    #[test]
    fn test_line_balance_carry_and_noise() {
        let parser = LineParser::new(SourceType::Generic);
        assert_eq!(
            parser.classify("Opening Balance 10,000.00", 1, 1, None),
            LineKind::Balance(10000.0)
        );
        assert_eq!(
            parser.classify("01/04/2024 BALANCE B/F 5,000.00", 1, 1, None),
            LineKind::Balance(5000.0)
        );
        assert_eq!(parser.classify("Page 1 of 3", 1, 1, None), LineKind::Other);
        assert_eq!(parser.classify("   ", 1, 1, None), LineKind::Blank);
        assert_eq!(parser.classify("01/04/2024 no amount here", 1, 1, None), LineKind::Unparsed);
        assert_eq!(
            parser.classify("Txn Date Description Debit Credit Balance", 1, 1, None),
            LineKind::Other
        );
    }

    #[test]
    fn test_line_mode_document() {
        let doc = text_doc(
            "STATE BANK OF INDIA\n\
             Opening Balance 10,000.00\n\
             01/04/2024 UPI/DR/1234/SWIGGY 250.00 9,750.00\n\
             BANGALORE\n\
             02/04/2024 UPI/CR/5678/RAVI 1,000.00 10,750.00\n\
             \n\
             Page 1 of 1\n",
        );
        let outcome = LineParser::new(SourceType::Sbi).parse(&doc).unwrap();
        assert_eq!(outcome.mode, ExtractionMode::TextLines);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].description, "UPI/DR/1234/SWIGGY BANGALORE");
        assert_eq!(outcome.rows[0].debit, Some(250.0));
        assert_eq!(outcome.rows[1].credit, Some(1000.0));
    }

    #[test]
    fn test_table_mode_text_with_ragged_rows() {
        let doc = text_doc(
            "Date        Narration              Debit       Credit      Balance\n\
             01/04/2024  SWIGGY BANGALORE       250.00      -           9,750.00\n\
             02/04/2024  SALARY ACME            -           50,000.00   59,750.00\n\
             03/04/2024  FLIPKART  1,200.00  58,550.00\n",
        );
        let outcome = parse_document(&doc, SourceType::Generic).unwrap();
        assert_eq!(outcome.mode, ExtractionMode::Table);
        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.rows[0].debit, Some(250.0));
        assert_eq!(outcome.rows[1].credit, Some(50000.0));
        // Ragged row handled by the line fallback, direction from balance delta
        assert_eq!(outcome.rows[2].debit, Some(1200.0));
        assert_eq!(outcome.rows[2].mode, ExtractionMode::TextLines);
    }

    #[test]
    fn test_table_mode_shifted_columns_use_line_fallback() {
        let doc = text_doc(
            "Date        Narration   Debit       Credit      Balance\n\
             01/04/2024  UPI  SWIGGY  250.00  9,750.00\n",
        );
        let outcome = parse_document(&doc, SourceType::Generic).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        let row = &outcome.rows[0];
        assert_eq!(row.description, "UPI SWIGGY");
        assert_eq!(row.debit, Some(250.0));
        assert_eq!(row.credit, None);
        assert_eq!(row.balance, Some(9750.0));
        assert_eq!(row.mode, ExtractionMode::TextLines);
    }

    #[test]
    fn test_footer_does_not_extend_narration() {
        let doc = text_doc(
            "01/04/2024 UPI/RAVI KUMAR 500.00\n\
             *** End of Statement ***\n\
             For billing queries write to care@bank.in\n",
        );
        let outcome = LineParser::new(SourceType::Generic).parse(&doc).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].description, "UPI/RAVI KUMAR");

        let parser = LineParser::new(SourceType::Generic);
        assert_eq!(parser.classify("Customer Care: 1800 1234", 1, 9, None), LineKind::Other);
        assert_eq!(parser.classify("Statement period", 1, 9, None), LineKind::Other);
        assert_eq!(
            parser.classify("BANGALORE", 1, 9, None),
            LineKind::Narration("BANGALORE".to_string())
        );
    }

    #[test]
    fn test_narration_continuation_is_capped() {
        let doc = text_doc(
            "01/04/2024 UPI/SWIGGY 250.00\n\
             BANGALORE\n\
             KA IN\n\
             THANK YOU FOR BANKING WITH US\n\
             02/04/2024 UBER TRIP 180.00\n\
             MUMBAI\n",
        );
        let outcome = LineParser::new(SourceType::Generic).parse(&doc).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].description, "UPI/SWIGGY BANGALORE KA IN");
        assert_eq!(outcome.rows[1].description, "UBER TRIP MUMBAI");
    }

    #[test]
    fn test_table_footer_row_is_not_narration() {
        let doc = Document::Table(vec![
            cells(&["Date", "Narration", "Debit", "Credit"]),
            cells(&["01/04/2024", "UPI-RAVI", "500.00", ""]),
            cells(&["", "End of Statement", "", ""]),
        ]);
        let outcome = parse_document(&doc, SourceType::Generic).unwrap();
        assert_eq!(outcome.rows[0].description, "UPI-RAVI");
    }

    #[test]
    fn test_table_mode_csv() {
        let doc = Document::Table(vec![
            cells(&["HDFC BANK LTD"]),
            cells(&["Date", "Narration", "Chq./Ref.No.", "Withdrawal Amt.", "Deposit Amt.", "Closing Balance"]),
            cells(&["01/04/24", "UPI-ZOMATO-ORDER", "0000412345678901", "320.00", "", "9,680.00"]),
            cells(&["", "BANGALORE", "", "", "", ""]),
            cells(&["Date", "Narration", "Chq./Ref.No.", "Withdrawal Amt.", "Deposit Amt.", "Closing Balance"]),
            cells(&["02/04/24", "INTEREST PAID", "", "", "12.00", "9,692.00"]),
        ]);
        let outcome = parse_document(&doc, SourceType::Hdfc).unwrap();
        assert_eq!(outcome.mode, ExtractionMode::Csv);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].description, "UPI-ZOMATO-ORDER BANGALORE");
        assert_eq!(outcome.rows[0].debit, Some(320.0));
        assert_eq!(outcome.rows[1].credit, Some(12.0));
        assert_eq!(outcome.rows[1].balance, Some(9692.0));
    }

    #[test]
    fn test_table_mode_single_amount_column() {
        let doc = Document::Table(vec![
            cells(&["Date", "Transaction Details", "Amount"]),
            cells(&["01 Apr 2024", "Paid to Swiggy", "-Rs.450"]),
            cells(&["02 Apr 2024", "Received from Ravi", "+Rs.1,000"]),
        ]);
        let outcome = parse_document(&doc, SourceType::Paytm).unwrap();
        assert_eq!(outcome.rows[0].debit, Some(450.0));
        assert_eq!(outcome.rows[1].credit, Some(1000.0));
    }

    #[test]
    fn test_csv_without_header_is_error() {
        let doc = Document::Table(vec![cells(&["foo", "bar"])]);
        assert!(parse_document(&doc, SourceType::Generic).is_err());
    }

    #[test]
    fn test_text_without_header_falls_back_to_lines() {
        let doc = text_doc("05/04/2024 UBER TRIP 180.00\n");
        let outcome = parse_document(&doc, SourceType::Generic).unwrap();
        assert_eq!(outcome.mode, ExtractionMode::TextLines);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].debit, Some(180.0));
    }

    #[test]
    fn test_parser_source_type() {
        assert_eq!(get_parser(ExtractionMode::Table, SourceType::Hdfc).source_type(), SourceType::Hdfc);
        assert_eq!(
            get_parser(ExtractionMode::TextLines, SourceType::Paytm).source_type(),
            SourceType::Paytm
        );
        assert_eq!(LineParser::new(SourceType::Sbi).source_type(), SourceType::Sbi);
    }

    #[test]
    fn test_get_parser_modes() {
        assert_eq!(get_parser(ExtractionMode::Table, SourceType::Sbi).mode(), ExtractionMode::Table);
        assert_eq!(
            get_parser(ExtractionMode::TextLines, SourceType::Sbi).mode(),
            ExtractionMode::TextLines
        );
    }
}
