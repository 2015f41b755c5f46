//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string (unset: in-memory store)
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `REQUEST_TIMEOUT_SECS` — per-request deadline (default: `30`)
/// - `RESTOCK_ON_REMOVE` — return removed cart lines to stock (default: `true`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub request_timeout_secs: u64,
    pub restock_on_remove: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            restock_on_remove: lookup("RESTOCK_ON_REMOVE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.restock_on_remove),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            request_timeout_secs: 30,
            restock_on_remove: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.restock_on_remove);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("RESTOCK_ON_REMOVE", "false"),
        ]);
        assert_eq!(config.addr(), "0.0.0.0:8081");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert_eq!(config.database_max_connections, 4);
        assert_eq!(config.request_timeout_secs, 5);
        assert!(!config.restock_on_remove);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", ""),
            ("RESTOCK_ON_REMOVE", "maybe"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
        assert!(config.restock_on_remove);
    }
}
