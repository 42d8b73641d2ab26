use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::search::IndexName;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub default_api_key: Option<String>,
    pub api_keys: HashMap<IndexName, String>,
    pub timeout_secs: u64,
}

impl SearchConfig {
    /// Key for one logical index, falling back to the shared key.
    pub fn api_key(&self, index: IndexName) -> Option<&str> {
        self.api_keys
            .get(&index)
            .or(self.default_api_key.as_ref())
            .map(String::as_str)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub search: SearchConfig,
    pub outbox: OutboxConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} is not set"));

        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("PORT").or_else(|| lookup("APP_PORT")) {
            Some(v) => v.parse().with_context(|| format!("invalid port {v:?}"))?,
            None => 8080,
        };

        // older deployments export the secret as JWT_SECRET_KEY
        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET")
                .or_else(|| lookup("JWT_SECRET_KEY"))
                .context("JWT_SECRET is not set")?,
            leeway_secs: parsed(&lookup, "JWT_LEEWAY_SECS", 0)?,
        };

        let mut api_keys = HashMap::new();
        for index in IndexName::ALL {
            let key = format!("ELASTIC_SEARCH_API_KEY_{}", index.as_str().to_uppercase());
            if let Some(v) = lookup(&key) {
                api_keys.insert(index, v);
            }
        }
        let search = SearchConfig {
            endpoint: required("ELASTIC_SEARCH_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            default_api_key: lookup("ELASTIC_SEARCH_API_KEY"),
            api_keys,
            timeout_secs: parsed(&lookup, "ELASTIC_SEARCH_TIMEOUT_SECS", 10)?,
        };

        let outbox = OutboxConfig {
            poll_interval_ms: at_least_one(&lookup, "OUTBOX_POLL_INTERVAL_MS", 2000)?,
            batch_size: at_least_one(&lookup, "OUTBOX_BATCH_SIZE", 50)?,
            max_attempts: at_least_one(&lookup, "OUTBOX_MAX_ATTEMPTS", 10)?,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            jwt,
            search,
            outbox,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {v:?}: {e}")),
        None => Ok(default),
    }
}

fn at_least_one<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + From<u8> + Copy,
    T::Err: std::fmt::Display,
{
    let value = parsed(lookup, key, default)?;
    if value < T::from(1) {
        anyhow::bail!("{key} must be at least 1");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/foocipe"),
        ("JWT_SECRET", "s3cret"),
        ("ELASTIC_SEARCH_ENDPOINT", "http://localhost:9200/"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let cfg = AppConfig::from_lookup(env(BASE)).expect("config");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.search.endpoint, "http://localhost:9200");
        assert_eq!(cfg.outbox.batch_size, 50);
        assert_eq!(cfg.outbox.max_attempts, 10);
        assert!(cfg.search.api_key(IndexName::Recipes).is_none());
    }

    #[test]
    fn per_index_key_overrides_shared_key() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ELASTIC_SEARCH_API_KEY", "shared"));
        pairs.push(("ELASTIC_SEARCH_API_KEY_PRODUCTS", "products-only"));
        let cfg = AppConfig::from_lookup(env(&pairs)).expect("config");
        assert_eq!(cfg.search.api_key(IndexName::Products), Some("products-only"));
        assert_eq!(cfg.search.api_key(IndexName::Tools), Some("shared"));
    }

    #[test]
    fn legacy_secret_name_and_port_are_accepted() {
        let pairs = [
            ("DATABASE_URL", "postgres://localhost/foocipe"),
            ("JWT_SECRET_KEY", "legacy"),
            ("ELASTIC_SEARCH_ENDPOINT", "http://es:9200"),
            ("PORT", "3001"),
        ];
        let cfg = AppConfig::from_lookup(env(&pairs)).expect("config");
        assert_eq!(cfg.jwt.secret, "legacy");
        assert_eq!(cfg.port, 3001);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = AppConfig::from_lookup(env(&BASE[1..])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let mut pairs = BASE.to_vec();
        pairs.push(("OUTBOX_BATCH_SIZE", "lots"));
        let err = AppConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("OUTBOX_BATCH_SIZE"));
    }

    #[test]
    fn outbox_tuning_below_one_is_an_error() {
        for (key, value) in [
            ("OUTBOX_BATCH_SIZE", "0"),
            ("OUTBOX_BATCH_SIZE", "-5"),
            ("OUTBOX_MAX_ATTEMPTS", "0"),
            ("OUTBOX_POLL_INTERVAL_MS", "0"),
        ] {
            let mut pairs = BASE.to_vec();
            pairs.push((key, value));
            let err = AppConfig::from_lookup(env(&pairs)).unwrap_err();
            assert_eq!(err.to_string(), format!("{key} must be at least 1"), "{key}={value}");
        }
    }
}
