use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub poll_interval: Duration,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {value}"))?,
            None => 5,
        };

        let poll_secs = match lookup("POLL_INTERVAL_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("POLL_INTERVAL_SECS is not a number: {value}"))?,
            None => 10,
        };
        if poll_secs == 0 {
            anyhow::bail!("POLL_INTERVAL_SECS must be at least 1");
        }

        Ok(Self {
            database_url,
            max_connections: max_connections.max(1),
            poll_interval: Duration::from_secs(poll_secs),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn values_are_read() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/lms"),
            ("POLL_INTERVAL_SECS", "30"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/lms"));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(config_from(&[("POLL_INTERVAL_SECS", "ten")]).is_err());
        assert!(config_from(&[("POLL_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[("DATABASE_MAX_CONNECTIONS", "-1")]).is_err());
    }
}
