// Statement Lens - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod amount;      // Amount and date cleaning
pub mod extract;     // PDF / CSV text extraction
pub mod parser;      // Bank detection and row extraction
pub mod transaction; // Normalized rows
pub mod rules;       // Category rules
pub mod summary;     // Dashboard figures
pub mod analyze;     // End-to-end pipeline
pub mod dashboard;   // HTML rendering
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use amount::{clean_amount, parse_date, Direction, ParsedAmount};
pub use extract::{detect_input_kind, extract_pdf_text, read_csv_table, InputKind, StatementText};
pub use parser::{
    detect_bank, get_parser, parse_document, Document, ExtractionMode, ParseOutcome,
    RawTransaction, SourceType, StatementParser,
};
pub use transaction::Transaction;
pub use rules::{ClassificationResult, ClassificationRule, RuleEngine};
pub use summary::{summarize, CategoryTotal, DashboardSummary};
pub use analyze::{AnalyzeOptions, StatementAnalyzer, StatementReport};
pub use dashboard::{render_dashboard, render_error};
pub use config::{ServerConfig, TelemetryConfig};
pub use logging::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
