use std::collections::HashMap;

use super::*;

fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
    let env: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    ServerConfig::from_lookup(|key| env.get(key).cloned())
}

#[test]
fn defaults_when_nothing_set() {
    let cfg = config_from(&[]);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.database_url, None);
    assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    assert_eq!(cfg.store_retry, RetryConfig::default());
}

#[test]
fn parses_all_values() {
    let cfg = config_from(&[
        ("PORT", "8080"),
        ("DATABASE_URL", "postgres://markup@db/markup"),
        ("DB_MAX_CONNECTIONS", "12"),
        ("STORE_RETRIES", "5"),
        ("STORE_RETRY_BASE_MS", "10"),
    ]);
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.database_url.as_deref(), Some("postgres://markup@db/markup"));
    assert_eq!(cfg.db_max_connections, 12);
    assert_eq!(cfg.store_retry, RetryConfig { attempts: 5, base_ms: 10 });
}

#[test]
fn unparsable_values_fall_back() {
    let cfg = config_from(&[("PORT", "eighty"), ("STORE_RETRY_BASE_MS", "-1")]);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.store_retry.base_ms, DEFAULT_STORE_RETRY_BASE_MS);
}

#[test]
fn blank_database_url_means_memory_store() {
    let cfg = config_from(&[("DATABASE_URL", "   ")]);
    assert_eq!(cfg.database_url, None);
}

#[test]
fn zero_retries_still_makes_one_attempt() {
    let cfg = config_from(&[("STORE_RETRIES", "0")]);
    assert_eq!(cfg.store_retry.attempts, 1);
}
