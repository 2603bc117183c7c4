// 💰 Amount & Date Cleaning
// Turns statement cells like "1,23,456.00 Cr", "Rs. 500" or "-" into numbers

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Direction of money movement relative to the account holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Money out (withdrawal, purchase, transfer out)
    Debit,
    /// Money in (deposit, refund, salary)
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "DEBIT",
            Direction::Credit => "CREDIT",
        }
    }
}

/// A cleaned amount. `value` is never negative: the sign lives in `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedAmount {
    pub value: f64,
    pub direction: Option<Direction>,
}

impl ParsedAmount {
    pub fn zero() -> Self {
        ParsedAmount {
            value: 0.0,
            direction: None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value < 0.005
    }
}

// ============================================================================
// AMOUNT CLEANING
// ============================================================================

/// Cell contents that mean "no amount in this column"
const PLACEHOLDERS: &[&str] = &["", "-", "--", "na", "n/a", "nil"];

/// Currency markers stripped before parsing (longest first)
const CURRENCY_MARKERS: &[&str] = &["₹", "rs.", "rs", "inr", "$"];

/// Digit runs this long without a decimal point are UTR/cheque/UPI references
pub const REFERENCE_ID_MIN_DIGITS: usize = 10;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<body>.*?)[\s(]*(?P<marker>cr|dr)\.?\)?$").expect("valid marker regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+(?:\.\d+)?|\.\d+)$").expect("valid number regex"))
}

fn money_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^[(+-]?(?:₹|rs\.?|inr)?",
            r"(?:\d{1,3}(?:,\d{2,3})+|\d+)\.\d{2}",
            r"\)?(?:\(?(?:cr|dr)\.?\)?)?$"
        ))
        .expect("valid money token regex")
    })
}

/// Check if a cell is an empty-amount placeholder ("-", "", "NA", ...)
pub fn is_placeholder(token: &str) -> bool {
    PLACEHOLDERS.contains(&token.trim().to_lowercase().as_str())
}

/// Check if a whitespace-delimited token looks like money in statement text.
///
/// Stricter than `clean_amount`: exactly two decimals are required, so that
/// reference numbers and cheque numbers in the narration are not mistaken
/// for amounts.
pub fn is_money_token(token: &str) -> bool {
    money_token_re().is_match(token.trim())
}

/// Check if a token is a standalone "Cr"/"Dr" marker
pub fn direction_marker(token: &str) -> Option<Direction> {
    match token
        .trim()
        .trim_matches(|c| c == '(' || c == ')' || c == '.')
        .to_lowercase()
        .as_str()
    {
        "cr" => Some(Direction::Credit),
        "dr" => Some(Direction::Debit),
        _ => None,
    }
}

/// Clean a raw amount cell.
///
/// # Returns
/// * `Some(ParsedAmount)` - placeholders clean to zero
/// * `None` - the cell is not money (text, or a long reference number)
///
/// # Examples:
/// ```
/// use statement_lens::amount::{clean_amount, Direction};
///
/// let a = clean_amount("1,23,456.50 Cr").unwrap();
/// assert_eq!(a.value, 123456.5);
/// assert_eq!(a.direction, Some(Direction::Credit));
/// assert!(clean_amount("412345678901").is_none());
/// ```
pub fn clean_amount(raw: &str) -> Option<ParsedAmount> {
    let lowered = raw.trim().to_lowercase();
    if is_placeholder(&lowered) {
        return Some(ParsedAmount::zero());
    }

    let mut direction = None;
    let mut body = lowered.clone();

    if let Some(caps) = marker_re().captures(&lowered) {
        direction = match &caps["marker"] {
            "cr" => Some(Direction::Credit),
            _ => Some(Direction::Debit),
        };
        body = caps["body"].to_string();
    }

    for marker in CURRENCY_MARKERS {
        body = body.replace(marker, "");
    }
    let mut body: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    if body.starts_with('(') && body.ends_with(')') && body.len() > 2 {
        body = body[1..body.len() - 1].to_string();
        direction.get_or_insert(Direction::Debit);
    }

    if let Some(rest) = body.strip_prefix('-') {
        body = rest.to_string();
        direction.get_or_insert(Direction::Debit);
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest.to_string();
        direction.get_or_insert(Direction::Credit);
    }

    if body.is_empty() || !number_re().is_match(&body) {
        return None;
    }

    // "if the digit string is 10+ characters, treat it as an ID, not money"
    if !body.contains('.') && body.len() >= REFERENCE_ID_MIN_DIGITS {
        return None;
    }

    let value: f64 = body.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(ParsedAmount { value, direction })
}

// ============================================================================
// DATE PARSING
// ============================================================================

/// Day-first formats seen on Indian bank statements, after separators are
/// normalized to single spaces. `%b` only takes abbreviations, so full month
/// names need their own `%B` formats.
const FOUR_DIGIT_YEAR_FORMATS: &[&str] =
    &["%d %m %Y", "%d %b %Y", "%d %B %Y", "%b %d %Y", "%B %d %Y"];
const TWO_DIGIT_YEAR_FORMATS: &[&str] = &["%d %m %y", "%d %b %y", "%d %B %y"];

fn leading_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^\s*(?P<date>",
            r"\d{4}-\d{2}-\d{2}",
            r"|\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}",
            r"|\d{1,2}[\s\-][A-Za-z]{3,9}[\s\-,]+\d{2,4}",
            r")\b"
        ))
        .expect("valid date regex")
    })
}

/// Parse a statement date (day-first, or ISO `YYYY-MM-DD`)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let normalized = raw
        .trim()
        .replace(['/', '-', '.', ','], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let parts: Vec<&str> = normalized.split(' ').collect();
    if parts.len() != 3 {
        return None;
    }

    if parts[0].len() == 4 && parts[0].chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(&normalized, "%Y %m %d").ok();
    }

    let formats = if parts[2].len() == 2 {
        TWO_DIGIT_YEAR_FORMATS
    } else {
        FOUR_DIGIT_YEAR_FORMATS
    };

    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
}

/// Split a text line into its leading date and the rest of the line.
///
/// Returns `None` when the line does not start with a parseable date.
pub fn leading_date(line: &str) -> Option<(String, NaiveDate, &str)> {
    let caps = leading_date_re().captures(line)?;
    let m = caps.name("date")?;
    let date = parse_date(m.as_str())?;
    Some((m.as_str().trim().to_string(), date, &line[m.end()..]))
}

// ============================================================================
// TESTS
// ============================================================================
