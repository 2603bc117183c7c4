//! Structured logging setup for both binaries.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::TelemetryConfig;

fn build_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Logs go to stderr so CLI output on stdout
/// stays machine-readable. Returns false if a subscriber was already set.
pub fn init_logging(config: &TelemetryConfig) -> bool {
    let filter = build_filter(config);

    let installed = if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(
            service = %config.service_name,
            level = %config.log_level,
            json = config.json_logs,
            "Logging initialized"
        );
    }
    installed
}
