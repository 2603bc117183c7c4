// Statement Lens - Command Line
// Analyze bank statements from the terminal

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use statement_lens::dashboard::format_money;
use statement_lens::{
    init_logging, AnalyzeOptions, RuleEngine, StatementAnalyzer, StatementReport, TelemetryConfig,
};

#[derive(Parser)]
#[command(name = "statement-lens")]
#[command(version)]
#[command(about = "Categorize bank statement spending", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a statement PDF or CSV
    Analyze {
        /// Statement file
        file: PathBuf,

        /// Custom rules file layered above the built-in rules
        #[arg(short, long, env = "STATEMENT_LENS_RULES")]
        rules: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// List credit rows too
        #[arg(long)]
        include_credits: bool,
    },

    /// Show the category a narration would get
    Categorize {
        /// One or more narrations
        #[arg(required = true)]
        text: Vec<String>,

        #[arg(short, long, env = "STATEMENT_LENS_RULES")]
        rules: Option<PathBuf>,
    },

    /// Print the effective category rules as JSON
    Rules {
        #[arg(short, long, env = "STATEMENT_LENS_RULES")]
        rules: Option<PathBuf>,
    },

    /// Browse a statement in the terminal dashboard
    View {
        file: PathBuf,

        #[arg(short, long, env = "STATEMENT_LENS_RULES")]
        rules: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::new("statement-lens").with_log_level(&cli.log_level);
    let telemetry = if cli.json_logs {
        telemetry.with_json_logs()
    } else {
        telemetry
    };
    init_logging(&telemetry);

    match cli.command {
        Commands::Analyze {
            file,
            rules,
            format,
            output,
            include_credits,
        } => {
            let options = AnalyzeOptions {
                include_credits,
                ..AnalyzeOptions::default()
            };
            let analyzer = StatementAnalyzer::new(load_engine(rules.as_deref())?, options);
            let report = analyzer.analyze_file(&file)?;

            match output {
                Some(path) => {
                    let out = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_report(&report, format, out)?;
                    eprintln!("✓ Wrote {} rows to {}", report.transactions.len(), path.display());
                }
                None => write_report(&report, format, io::stdout().lock())?,
            }
        }

        Commands::Categorize { text, rules } => {
            let engine = load_engine(rules.as_deref())?;
            for narration in &text {
                let result = engine.classify(narration);
                println!(
                    "{:<40} → {} [{}]",
                    narration,
                    result.category,
                    result.rule_id.as_deref().unwrap_or("fallback")
                );
            }
        }

        Commands::Rules { rules } => {
            let engine = load_engine(rules.as_deref())?;
            println!("{}", engine.to_json()?);
        }

        Commands::View { file, rules } => {
            run_ui_mode(&file, rules.as_deref())?;
        }
    }

    Ok(())
}

fn load_engine(rules: Option<&Path>) -> Result<RuleEngine> {
    match rules {
        Some(path) => RuleEngine::with_custom_rules(path),
        None => Ok(RuleEngine::default()),
    }
}

fn write_report<W: Write>(report: &StatementReport, format: OutputFormat, out: W) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(report, out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(out, report).context("Failed to write JSON")?;
            Ok(())
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for tx in &report.transactions {
                writer.serialize(tx).context("Failed to write CSV row")?;
            }
            writer.flush()?;
            Ok(())
        }
    }
}

fn write_text<W: Write>(report: &StatementReport, mut out: W) -> Result<()> {
    let summary = &report.summary;

    writeln!(out, "📄 {} ({}, {})", report.source_file, report.bank.name(), report.mode.name())?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(out, "Total spend:   {}", format_money(summary.total_spend))?;
    writeln!(out, "Transactions:  {}", summary.total_transactions)?;
    writeln!(out, "Top category:  {}", summary.top_category.as_deref().unwrap_or("-"))?;
    if summary.credit_count > 0 {
        writeln!(
            out,
            "Received:      {} ({} credits)",
            format_money(summary.total_received),
            summary.credit_count
        )?;
    }
    if report.duplicates_removed > 0 || report.skipped_rows > 0 {
        writeln!(
            out,
            "Skipped:       {} duplicates, {} unreadable rows",
            report.duplicates_removed, report.skipped_rows
        )?;
    }

    if !summary.category_summary.is_empty() {
        writeln!(out, "\n🏷️  By category")?;
        for c in &summary.category_summary {
            writeln!(
                out,
                "  {:<16} {:>4}  {:>14}  {:>5.1}%",
                c.category,
                c.count,
                format_money(c.total),
                c.share
            )?;
        }
    }

    if !report.transactions.is_empty() {
        writeln!(out, "\n📊 Transactions")?;
        for tx in &report.transactions {
            let amount = if tx.is_debit() { tx.amount } else { -tx.amount };
            writeln!(
                out,
                "  {:<10}  {:<44}  {:>12}  {}",
                tx.date,
                tx.description.chars().take(44).collect::<String>(),
                format_money(amount),
                tx.category
            )?;
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(file: &Path, rules: Option<&Path>) -> Result<()> {
    let options = AnalyzeOptions {
        include_credits: true,
        ..AnalyzeOptions::default()
    };
    let analyzer = StatementAnalyzer::new(load_engine(rules)?, options);
    let report = analyzer.analyze_file(file)?;

    let mut app = ui::App::new(report);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_file: &Path, _rules: Option<&Path>) -> Result<()> {
    anyhow::bail!("TUI mode not available. Rebuild with: cargo build --features tui")
}
