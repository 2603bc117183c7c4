// Statement Lens - Web Server
// Upload a statement, get a spending dashboard

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::info;

use statement_lens::config::{DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT};
use statement_lens::{
    init_logging, server, AnalyzeOptions, RuleEngine, ServerConfig, StatementAnalyzer,
    TelemetryConfig,
};

#[derive(Parser)]
#[command(name = "statement-lens-server")]
#[command(version)]
#[command(about = "Bank statement dashboard server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Custom rules file layered above the built-in rules
    #[arg(short, long, env = "STATEMENT_LENS_RULES")]
    rules: Option<PathBuf>,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,

    /// Disable permissive CORS
    #[arg(long)]
    no_cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let telemetry = TelemetryConfig::new("statement-lens-server").with_log_level(&args.log_level);
    let telemetry = if args.json_logs {
        telemetry.with_json_logs()
    } else {
        telemetry
    };
    init_logging(&telemetry);

    let mut builder = ServerConfig::builder()
        .addr(SocketAddr::new(args.host, args.port))
        .cors(!args.no_cors)
        .max_upload_mb(args.max_upload_mb);
    if let Some(path) = &args.rules {
        builder = builder.rules_path(path.clone());
    }
    let config = builder.build();

    let engine = match &config.rules_path {
        Some(path) => RuleEngine::with_custom_rules(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => RuleEngine::default(),
    };
    info!(
        rules = engine.rule_count(),
        custom = config.rules_path.is_some(),
        "Category rules loaded"
    );

    let analyzer = StatementAnalyzer::new(engine, AnalyzeOptions::default());
    server::serve(config, analyzer).await
}
