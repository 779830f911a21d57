//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$IMAPDUMP_CONFIG` (environment variable)
//! 2. `~/.config/imapdump/config.toml` (Linux/macOS)
//!    `%APPDATA%\imapdump\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Passwords are never read from here; see `IMAPDUMP_PASSWORD`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::DEFAULT_CHECKPOINT_INTERVAL;
use crate::transport::Endpoint;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mail server connection.
    pub server: ServerConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mail server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name; prompted for when empty.
    pub host: String,
    pub port: u16,
    /// Force implicit TLS on or off. Derived from the port when unset.
    pub tls: Option<bool>,
    /// Login name; prompted for when empty.
    pub username: String,
    /// Socket read/write timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Root directory of the export.
    pub output_dir: PathBuf,
    /// Folder offered by default.
    pub folder: String,
    /// Messages between progress checkpoints.
    pub checkpoint_interval: usize,
    /// Write `IMPORT_INSTRUCTIONS.txt` next to the archives.
    pub write_instructions: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 993,
            tls: None,
            username: String::new(),
            timeout_secs: 60,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloaded_emails"),
            folder: "INBOX".to_string(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            write_instructions: true,
        }
    }
}

impl ServerConfig {
    /// Connection endpoint for `host`, honoring the TLS override and timeout.
    pub fn endpoint(&self, host: &str) -> Endpoint {
        let mut endpoint = Endpoint::new(host, self.port);
        if let Some(tls) = self.tls {
            endpoint.tls = tls;
        }
        endpoint.timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        endpoint
    }
}

// ── Load ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("IMAPDUMP_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("imapdump").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imapdump")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("imapdump.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 993);
        assert_eq!(cfg.server.tls, None);
        assert_eq!(cfg.export.folder, "INBOX");
        assert_eq!(cfg.export.output_dir, PathBuf::from("downloaded_emails"));
        assert_eq!(cfg.export.checkpoint_interval, 10);
        assert!(cfg.export.write_instructions);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.server.host = "imap.example.com".into();
        cfg.server.tls = Some(false);
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.host, "imap.example.com");
        assert_eq!(parsed.server.tls, Some(false));
        assert_eq!(parsed.export.folder, cfg.export.folder);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[server]
host = "mail.example.com"
port = 143

[export]
checkpoint_interval = 50
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.server.host, "mail.example.com");
        assert_eq!(cfg.server.port, 143);
        assert_eq!(cfg.export.checkpoint_interval, 50);
        // Other fields use defaults
        assert_eq!(cfg.export.folder, "INBOX");
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_endpoint_from_server_config() {
        let mut server = ServerConfig {
            port: 143,
            ..ServerConfig::default()
        };
        let plain = server.endpoint("mail.example.com");
        assert!(!plain.tls);
        assert_eq!(plain.timeout, Some(Duration::from_secs(60)));

        server.tls = Some(true);
        server.timeout_secs = 0;
        let forced = server.endpoint("mail.example.com");
        assert!(forced.tls);
        assert_eq!(forced.timeout, None);
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/imapdump-cache"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/imapdump-cache/imapdump.log")
        );
    }
}
