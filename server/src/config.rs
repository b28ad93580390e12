//! Server configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_STORE_RETRIES: u32 = 3;
pub const DEFAULT_STORE_RETRY_BASE_MS: u64 = 50;

/// Bounded retry for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub attempts: u32,
    /// Base delay in milliseconds for exponential retry back-off.
    pub base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { attempts: DEFAULT_STORE_RETRIES, base_ms: DEFAULT_STORE_RETRY_BASE_MS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub store_retry: RetryConfig,
}

impl ServerConfig {
    /// Build config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: Postgres URL; in-memory store when absent or blank
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `STORE_RETRIES`: total attempts per store call, default 3 (minimum 1)
    /// - `STORE_RETRY_BASE_MS`: default 50
    ///
    /// Unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());
        Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            store_retry: RetryConfig {
                attempts: parse_or(&lookup, "STORE_RETRIES", DEFAULT_STORE_RETRIES).max(1),
                base_ms: parse_or(&lookup, "STORE_RETRY_BASE_MS", DEFAULT_STORE_RETRY_BASE_MS),
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
