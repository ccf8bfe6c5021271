//! Environment-driven configuration.
//! The gateway is configured entirely through environment variables so it can
//! run unchanged under a process manager; there is no config file.

use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP façade listens on.
    pub http_port: u16,
    /// JSON-RPC endpoint of the monitoring backend.
    pub backend_url: String,
    /// Fixed session lifetime; also used as the cookie Max-Age.
    pub session_ttl: Duration,
    /// Per-call transport timeout for outbound RPC.
    pub rpc_timeout: Duration,
    /// Additional attempts after the first on transport timeout.
    pub rpc_max_retries: u32,
    /// Mark session cookies Secure (set via ZBXGATE_ENV=production).
    pub cookie_secure: bool,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend_url = std::env::var("ZBXGATE_BACKEND_URL")
            .context("ZBXGATE_BACKEND_URL must be set to the backend JSON-RPC endpoint")?;
        let http_port: u16 = env_or("ZBXGATE_HTTP_PORT", "3000")
            .parse()
            .context("ZBXGATE_HTTP_PORT must be a port number")?;
        let ttl_secs: u64 = env_or("ZBXGATE_SESSION_TTL_SECS", "86400")
            .parse()
            .context("ZBXGATE_SESSION_TTL_SECS must be an integer")?;
        let timeout_ms: u64 = env_or("ZBXGATE_RPC_TIMEOUT_MS", "10000")
            .parse()
            .context("ZBXGATE_RPC_TIMEOUT_MS must be an integer")?;
        let max_retries: u32 = env_or("ZBXGATE_RPC_MAX_RETRIES", "2")
            .parse()
            .context("ZBXGATE_RPC_MAX_RETRIES must be an integer")?;
        let cookie_secure = env_or("ZBXGATE_ENV", "development") == "production";

        Ok(Self {
            http_port,
            backend_url,
            session_ttl: Duration::from_secs(ttl_secs),
            rpc_timeout: Duration::from_millis(timeout_ms),
            rpc_max_retries: max_retries,
            cookie_secure,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            backend_url: String::new(),
            session_ttl: Duration::from_secs(86400),
            rpc_timeout: Duration::from_secs(10),
            rpc_max_retries: 2,
            cookie_secure: false,
        }
    }
}
