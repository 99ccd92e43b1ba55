//! Runtime configuration.
//!
//! Read once at startup from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8081;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// `RUST_LOG`-style filter used when `RUST_LOG` itself is unset
    pub log_filter: String,
    pub log_format: LogFormat,
    /// PostgreSQL connection string; in-memory change requests when absent
    pub database_url: Option<String>,
    /// Remote document store base URL; in-memory repositories when absent
    pub document_store_url: Option<String>,
    pub document_store_timeout: Duration,
    /// Empty means permissive CORS
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            document_store_url: None,
            document_store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            bind_address: non_empty("BIND_ADDRESS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_address),
            port: non_empty("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            log_filter: non_empty("RUST_LOG").unwrap_or(defaults.log_filter),
            log_format: match non_empty("LOG_FORMAT").as_deref() {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            document_store_url: non_empty("DOCUMENT_STORE_URL"),
            document_store_timeout: non_empty("DOCUMENT_STORE_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.document_store_timeout),
            cors_allowed_origins: non_empty("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
