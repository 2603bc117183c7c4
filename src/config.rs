// ⚙️ Configuration
// Server and telemetry settings shared by both binaries

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default port, overridable with `PORT`
pub const DEFAULT_PORT: u16 = 5000;

/// Default upload limit in megabytes
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

fn default_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    /// Custom category rules layered above the built-ins.
    pub rules_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            cors: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            rules_path: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new server config builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig.
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    addr: Option<SocketAddr>,
    cors: Option<bool>,
    max_upload_bytes: Option<usize>,
    rules_path: Option<PathBuf>,
}

impl ServerConfigBuilder {
    /// Sets the listen address.
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Sets whether CORS is enabled.
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = Some(enabled);
        self
    }

    /// Sets the upload limit in megabytes.
    pub fn max_upload_mb(mut self, mb: usize) -> Self {
        self.max_upload_bytes = Some(mb.saturating_mul(1024 * 1024));
        self
    }

    /// Sets the custom rules file.
    pub fn rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// Builds the server config.
    pub fn build(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            addr: self.addr.unwrap_or(defaults.addr),
            cors: self.cors.unwrap_or(defaults.cors),
            max_upload_bytes: self.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
            rules_path: self.rules_path,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "statement-lens".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json_logs(mut self) -> Self {
        self.json_logs = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 5000);
        assert!(config.addr.ip().is_unspecified());
        assert!(config.cors);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert!(config.rules_path.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let addr: SocketAddr = "127.0.0.1:8088".parse().unwrap();
        let config = ServerConfig::builder()
            .addr(addr)
            .cors(false)
            .max_upload_mb(2)
            .rules_path("rules.json")
            .build();

        assert_eq!(config.addr, addr);
        assert!(!config.cors);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
        assert_eq!(config.rules_path, Some(PathBuf::from("rules.json")));
    }

    #[test]
    fn test_builder_keeps_defaults() {
        assert_eq!(ServerConfig::builder().build(), ServerConfig::default());
    }

    #[test]
    fn test_telemetry_defaults() {
        let t = TelemetryConfig::new("statement-lens-server");
        assert_eq!(t.service_name, "statement-lens-server");
        assert_eq!(t.log_level, "info");
        assert!(!t.json_logs);

        let t = t.with_log_level("debug").with_json_logs();
        assert_eq!(t.log_level, "debug");
        assert!(t.json_logs);
    }
}
