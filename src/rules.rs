// 🏷️ Category Rules - Rules as Data
// Keyword matching that turns a narration into a spending category

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Payment-rail and bank words that carry no merchant information
pub const BANK_NOISE: &[&str] = &[
    "upi", "transfer", "hdfc", "sbin", "icici", "idfc", "utr", "payment", "paid", "via", "yesb",
    "axis", "from", "to", "ref", "upiint", "upiintnet", "dr", "cr", "neft", "imps", "rtgs",
];

pub const MONEY_TRANSFER: &str = "Money Transfer";
pub const OTHERS: &str = "Others";

/// Narrations carrying this word but matching no rule are transfers
pub const TRANSFER_MARKER: &str = "upi";

/// Custom rules from a file are lifted above every built-in rule
const CUSTOM_PRIORITY_BASE: i32 = 1000;

// ============================================================================
// NORMALIZATION
// ============================================================================

/// A narration reduced to merchant-bearing words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Lowercase letter-only words, noise removed
    pub tokens: Vec<String>,
    /// `tokens` joined without separators
    pub compact: String,
}

/// Lowercase, split on anything that is not a letter or digit, drop digits,
/// then drop bank noise words.
pub fn normalize(text: &str, noise: &[String]) -> Normalized {
    let tokens: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .map(|t| t.chars().filter(|c| c.is_alphabetic()).collect::<String>())
        .filter(|t| !t.is_empty() && !noise.iter().any(|n| n == t))
        .collect();

    let compact = tokens.concat();
    Normalized { tokens, compact }
}

/// Reduce a rule pattern the same way narrations are reduced, keeping `*`
fn normalize_pattern(pattern: &str) -> String {
    pattern
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || *c == '*')
        .collect()
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Rule ID for tracking
    pub id: String,

    /// Category to assign
    pub category: String,

    /// Merchant names and their common misspellings (supports wildcards with *)
    pub patterns: Vec<String>,

    /// Require a whole-word match instead of a substring match
    #[serde(default)]
    pub whole_word: bool,

    /// Confidence score (0.0 - 1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Priority (higher = applied first)
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Description/notes about this rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_priority() -> i32 {
    0
}

fn default_confidence() -> f64 {
    0.9
}

impl ClassificationRule {
    pub fn new(id: &str, category: &str, patterns: &[&str], priority: i32) -> Self {
        ClassificationRule {
            id: id.to_string(),
            category: category.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            whole_word: false,
            confidence: default_confidence(),
            priority,
            description: None,
        }
    }

    /// Return the first pattern that matches the normalized narration
    pub fn matches(&self, text: &Normalized) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| self.pattern_matches(p, text))
            .map(|p| p.as_str())
    }

    fn pattern_matches(&self, pattern: &str, text: &Normalized) -> bool {
        let pattern = normalize_pattern(pattern);
        if pattern.is_empty() || pattern.chars().all(|c| c == '*') {
            return false;
        }

        if pattern.contains('*') {
            return wildcard_match(&pattern, &text.compact);
        }

        // Short brands ("ola") collide with ordinary words as substrings
        if self.whole_word || pattern.len() <= 3 {
            return text.tokens.iter().any(|t| *t == pattern);
        }

        text.compact.contains(&pattern)
    }
}

/// Anchored wildcard match: `swig*` is a prefix, `*kart` a suffix, and
/// middle parts must appear in order.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if first.len() + last.len() > text.len() {
        return false;
    }
    if !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }

    let mut window = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match window.find(part) {
            Some(pos) => window = &window[pos + part.len()..],
            None => return false,
        }
    }

    true
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub rule_id: Option<String>,
    pub confidence: f64,
    /// Pattern that fired, if any
    pub matched: Option<String>,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        ClassificationResult {
            category: OTHERS.to_string(),
            rule_id: None,
            confidence: 0.0,
            matched: None,
        }
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<ClassificationRule>,
    noise: Vec<String>,
    /// Lowercase substring that marks an unmatched narration as a transfer
    transfer_marker: String,
    /// Category for narrations nothing else claims
    fallback_category: String,
}

impl RuleEngine {
    /// Create a new engine with no rules (everything falls back)
    pub fn new() -> Self {
        RuleEngine {
            rules: Vec::new(),
            noise: BANK_NOISE.iter().map(|s| s.to_string()).collect(),
            transfer_marker: TRANSFER_MARKER.to_string(),
            fallback_category: OTHERS.to_string(),
        }
    }

    /// Builder pattern: change the word that marks unmatched transfers
    pub fn with_transfer_marker(mut self, marker: &str) -> Self {
        self.transfer_marker = marker.trim().to_lowercase();
        self
    }

    /// Builder pattern: change the catch-all category
    pub fn with_fallback_category(mut self, category: &str) -> Self {
        self.fallback_category = category.to_string();
        self
    }

    /// Built-in rules for Indian UPI / card narrations
    pub fn builtin_rules() -> Vec<ClassificationRule> {
        vec![
            ClassificationRule::new(
                "food-delivery",
                "Food",
                &["swiggy", "zomato", "eternal", "blinkit"],
                60,
            ),
            ClassificationRule::new(
                "online-shopping",
                "Shopping",
                &["flipkart", "flpkart", "flpkrt", "flipkrt", "myntra", "jiomart", "ajio"],
                50,
            ),
            ClassificationRule::new(
                "grocery",
                "Grocery",
                &["kirana", "mart", "store", "bigbasket", "dealshare"],
                40,
            ),
            ClassificationRule::new(
                "healthcare",
                "Healthcare",
                &["medical", "pharmacy", "chemist"],
                30,
            ),
            ClassificationRule::new("ride-hailing", "Travel", &["uber", "ola"], 20),
            ClassificationRule::new("bills", "Bills", &["recharge", "billdesk", "bill"], 10),
        ]
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rules = read_rules(path.as_ref())?;
        Ok(RuleEngine::from_rules(rules))
    }

    /// Create engine from a list of rules
    pub fn from_rules(rules: Vec<ClassificationRule>) -> Self {
        let mut engine = RuleEngine::new();
        engine.rules = rules;
        engine.sort();
        engine
    }

    /// Built-in rules with a user rule file layered on top
    pub fn with_custom_rules<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut engine = RuleEngine::default();
        for mut rule in read_rules(path.as_ref())? {
            rule.priority += CUSTOM_PRIORITY_BASE;
            engine.rules.push(rule);
        }
        engine.sort();
        Ok(engine)
    }

    /// Add a single rule
    pub fn add_rule(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
        self.sort();
    }

    // Stable: equal priorities keep insertion order
    fn sort(&mut self) {
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Apply rules to categorize a narration
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let normalized = normalize(text, &self.noise);

        // Find first matching rule (already sorted by priority)
        for rule in &self.rules {
            if let Some(pattern) = rule.matches(&normalized) {
                return ClassificationResult {
                    category: rule.category.clone(),
                    rule_id: Some(rule.id.clone()),
                    confidence: rule.confidence,
                    matched: Some(pattern.to_string()),
                };
            }
        }

        // Unrecognized UPI payments are person-to-person transfers
        if !self.transfer_marker.is_empty() && text.to_lowercase().contains(&self.transfer_marker) {
            return ClassificationResult {
                category: MONEY_TRANSFER.to_string(),
                confidence: 0.5,
                ..ClassificationResult::default()
            };
        }

        ClassificationResult {
            category: self.fallback_category.clone(),
            ..ClassificationResult::default()
        }
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Distinct category labels in priority order, fallbacks last
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !out.contains(&rule.category) {
                out.push(rule.category.clone());
            }
        }
        for fallback in [MONEY_TRANSFER, self.fallback_category.as_str()] {
            if !out.iter().any(|c| c == fallback) {
                out.push(fallback.to_string());
            }
        }
        out
    }

    /// Serialize the effective rules (for editing into a custom file)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.rules).context("Failed to serialize rules")
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        RuleEngine::from_rules(RuleEngine::builtin_rules())
    }
}

fn read_rules(path: &Path) -> Result<Vec<ClassificationRule>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {:?}", path))?;

    serde_json::from_str(&content).context("Failed to parse rules JSON")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noise() -> Vec<String> {
        BANK_NOISE.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_drops_noise_and_digits() {
        let n = normalize("UPI/DR/412345/SWIGGY LIMITED/yesb/Payment", &noise());
        assert_eq!(n.tokens, vec!["swiggy", "limited"]);
        assert_eq!(n.compact, "swiggylimited");

        // Digits inside a word go, its letters stay
        let n = normalize("NEFT CR/IMPS/RTGS P2A-ZOMATO4U", &noise());
        assert_eq!(n.tokens, vec!["pa", "zomatou"]);
    }

    #[test]
    fn test_noise_is_word_level() {
        // "to" is noise, but "store" must survive intact
        let n = normalize("PAID TO RAJU STORE", &noise());
        assert_eq!(n.tokens, vec!["raju", "store"]);
    }

    #[test]
    fn test_exact_pattern_match() {
        let rule = ClassificationRule::new("t1", "Food", &["swiggy"], 0);
        assert!(rule.matches(&normalize("SWIGGY BANGALORE", &noise())).is_some());
        assert!(rule.matches(&normalize("swiggy", &noise())).is_some());
        assert!(rule.matches(&normalize("AMAZON", &noise())).is_none());
    }

    #[test]
    fn test_split_brand_names_match() {
        let rule = ClassificationRule::new("t1", "Grocery", &["deal share"], 0);
        assert_eq!(
            rule.matches(&normalize("UPI-DE ALSHARE-PAYMENTS", &noise())),
            Some("deal share")
        );
    }

    #[test]
    fn test_wildcard_pattern() {
        let rule = ClassificationRule::new("t2", "Shopping", &["amazon*"], 0);
        assert!(rule.matches(&normalize("AMAZON PAY INDIA", &noise())).is_some());
        assert!(rule.matches(&normalize("amazon", &noise())).is_some());
        assert!(rule.matches(&normalize("PAY AMAZON", &noise())).is_none());

        let middle = ClassificationRule::new("t3", "Shopping", &["amazon*pay*india"], 0);
        assert!(middle.matches(&normalize("AMAZON SELLER PAY SERVICES INDIA", &noise())).is_some());
        assert!(middle.matches(&normalize("AMAZON INDIA", &noise())).is_none());
    }

    #[test]
    fn test_short_patterns_need_whole_word() {
        let rule = ClassificationRule::new("ola", "Travel", &["ola"], 0);
        assert!(rule.matches(&normalize("UPI/OLA CABS", &noise())).is_some());
        assert!(rule.matches(&normalize("COCA COLA STORE", &noise())).is_none());
    }

    #[test]
    fn test_rule_engine_classification() {
        let engine = RuleEngine::default();

        let result = engine.classify("UPI/DR/412345678901/SWIGGY/YESB");
        assert_eq!(result.category, "Food");
        assert_eq!(result.rule_id, Some("food-delivery".to_string()));
        assert_eq!(result.matched, Some("swiggy".to_string()));

        assert_eq!(engine.classify("FLPKRT PAYMENT").category, "Shopping");
        assert_eq!(engine.classify("BIGBASKET ORDER").category, "Grocery");
        assert_eq!(engine.classify("APOLLO PHARMACY").category, "Healthcare");
        assert_eq!(engine.classify("UBER INDIA TRIP").category, "Travel");
        assert_eq!(engine.classify("AIRTEL RECHARGE").category, "Bills");
        assert_eq!(engine.classify("BILLDESK ELECTRICITY").category, "Bills");
        assert_eq!(engine.classify("B LINKIT").category, "Food");
    }

    #[test]
    fn test_rule_priority() {
        // Both Food and Grocery fire; Food is ranked first
        let engine = RuleEngine::default();
        assert_eq!(engine.classify("ZOMATO MART").category, "Food");

        let mut engine = RuleEngine::new();
        engine.add_rule(ClassificationRule::new("general", "Shopping", &["amazon*"], 1));
        engine.add_rule(ClassificationRule::new("specific", "Subscriptions", &["amazon prime"], 100));
        assert_eq!(engine.classify("AMAZON PRIME").rule_id, Some("specific".to_string()));
    }

    #[test]
    fn test_fallbacks() {
        let engine = RuleEngine::default();

        let upi = engine.classify("UPI/DR/412345678901/RAVI KUMAR/okaxis");
        assert_eq!(upi.category, MONEY_TRANSFER);
        assert_eq!(upi.rule_id, None);

        let other = engine.classify("ATM WDL 1234 MG ROAD");
        assert_eq!(other.category, OTHERS);
        assert_eq!(other.confidence, 0.0);
    }

    #[test]
    fn test_configured_fallbacks() {
        let engine = RuleEngine::default()
            .with_transfer_marker("IMPS")
            .with_fallback_category("Uncategorized");

        assert_eq!(engine.classify("IMPS/P2A/412345/RAVI").category, MONEY_TRANSFER);
        assert_eq!(engine.classify("UPI/DR/412345678901/RAVI KUMAR").category, "Uncategorized");
        assert_eq!(engine.classify("UPI-SWIGGY").category, "Food");

        let cats = engine.categories();
        assert_eq!(cats.last().map(String::as_str), Some("Uncategorized"));
        assert!(!cats.contains(&OTHERS.to_string()));
    }

    #[test]
    fn test_no_rules_engine() {
        let engine = RuleEngine::new();
        assert_eq!(engine.rule_count(), 0);
        assert_eq!(engine.classify("SWIGGY").category, OTHERS);
    }

    #[test]
    fn test_rules_json_roundtrip_defaults() {
        let json = r#"[{"id": "netflix", "category": "Entertainment", "patterns": ["netflix"]}]"#;
        let rules: Vec<ClassificationRule> = serde_json::from_str(json).unwrap();
        assert_eq!(rules[0].priority, 0);
        assert_eq!(rules[0].confidence, 0.9);
        assert!(!rules[0].whole_word);

        let engine = RuleEngine::from_rules(rules);
        assert_eq!(engine.classify("NETFLIX.COM").category, "Entertainment");
    }

    #[test]
    fn test_custom_rules_layer_above_builtins() {
        let path = std::env::temp_dir().join(format!("rules-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"[{"id": "swiggy-instamart", "category": "Grocery", "patterns": ["instamart"]}]"#,
        )
        .unwrap();

        let engine = RuleEngine::with_custom_rules(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(engine.rule_count(), RuleEngine::builtin_rules().len() + 1);
        assert_eq!(engine.classify("SWIGGY INSTAMART").category, "Grocery");
        assert_eq!(engine.classify("SWIGGY").category, "Food");
    }

    #[test]
    fn test_categories_listing() {
        let cats = RuleEngine::default().categories();
        assert_eq!(cats.first().map(String::as_str), Some("Food"));
        assert_eq!(cats.last().map(String::as_str), Some(OTHERS));
        assert!(cats.contains(&MONEY_TRANSFER.to_string()));
    }

    #[test]
    fn test_missing_rules_file() {
        assert!(RuleEngine::from_file("/definitely/not/here.json").is_err());
    }
}
