//! Unit tests for runtime configuration

use business_approvals_api::config::{ApiConfig, LogFormat};
use serial_test::serial;
use std::collections::HashMap;
use std::time::Duration;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_defaults_when_nothing_is_set() {
    let config = ApiConfig::from_lookup(lookup(&[]));

    assert_eq!(config, ApiConfig::default());
    assert_eq!(config.port, 8081);
    assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8081");
    assert!(config.database_url.is_none());
    assert!(config.document_store_url.is_none());
    assert!(config.cors_allowed_origins.is_empty());
}

#[test]
fn test_reads_all_settings() {
    let config = ApiConfig::from_lookup(lookup(&[
        ("BIND_ADDRESS", "127.0.0.1"),
        ("PORT", "9000"),
        ("RUST_LOG", "debug"),
        ("LOG_FORMAT", "JSON"),
        ("DATABASE_URL", "postgres://localhost/approvals"),
        ("DOCUMENT_STORE_URL", "http://store.local/api"),
        ("DOCUMENT_STORE_TIMEOUT_SECS", "3"),
        ("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test,,"),
    ]));

    assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
    assert_eq!(config.log_filter, "debug");
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(
        config.database_url.as_deref(),
        Some("postgres://localhost/approvals")
    );
    assert_eq!(
        config.document_store_url.as_deref(),
        Some("http://store.local/api")
    );
    assert_eq!(config.document_store_timeout, Duration::from_secs(3));
    assert_eq!(
        config.cors_allowed_origins,
        vec!["http://a.test".to_string(), "http://b.test".to_string()]
    );
}

#[test]
fn test_invalid_values_fall_back_to_defaults() {
    let config = ApiConfig::from_lookup(lookup(&[
        ("PORT", "not-a-port"),
        ("BIND_ADDRESS", "nowhere"),
        ("DOCUMENT_STORE_TIMEOUT_SECS", "-1"),
        ("DATABASE_URL", "   "),
        ("LOG_FORMAT", "xml"),
    ]));

    assert_eq!(config, ApiConfig::default());
}

#[test]
#[serial]
fn test_from_env_reads_process_environment() {
    // SAFETY: serialised with other environment-mutating tests
    unsafe {
        std::env::set_var("PORT", "8123");
        std::env::set_var("DOCUMENT_STORE_URL", "http://env.store");
    }

    let config = ApiConfig::from_env();

    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("DOCUMENT_STORE_URL");
    }
    assert_eq!(config.port, 8123);
    assert_eq!(config.document_store_url.as_deref(), Some("http://env.store"));
}
