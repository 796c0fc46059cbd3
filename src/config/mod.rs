use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 30;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskd")
}

// ─── ServerConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// REST API port (TASKD_PORT env var, default: 4310).
    pub port: u16,
    /// Data directory for the SQLite database and token secret.
    pub data_dir: PathBuf,
    /// Log level filter (trace, debug, info, warn, error).
    pub log: String,
    /// Bind address (TASKD_BIND env var, default: "127.0.0.1";
    /// use 0.0.0.0 for LAN access).
    pub bind_address: String,
    /// Log output format: "pretty" (default) | "json" (structured for log
    /// aggregators).
    pub log_format: String,
    /// Lifetime of tokens minted by `taskd token issue` (default: 30 days).
    pub token_ttl_secs: i64,
    /// Queries slower than this are logged at WARN (0 = disabled).
    pub slow_query_ms: u64,
}

/// TOML file shape — every field optional so the file can set only what it
/// cares about.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    port: Option<u16>,
    log: Option<String>,
    bind_address: Option<String>,
    log_format: Option<String>,
    token_ttl_secs: Option<i64>,
    slow_query_ms: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<ConfigFile> {
    let path = data_dir.join("config.toml");
    let raw = std::fs::read_to_string(&path).ok()?;
    match toml::from_str(&raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("ignoring malformed {}: {e}", path.display());
            None
        }
    }
}

impl ServerConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("TASKD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("TASKD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let token_ttl_secs = toml.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let slow_query_ms = toml.slow_query_ms.unwrap_or(0);

        Self {
            port,
            data_dir,
            log,
            bind_address,
            log_format,
            token_ttl_secs,
            slow_query_ms,
        }
    }
}
