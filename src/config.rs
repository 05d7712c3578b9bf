//! Environment-driven startup configuration.
//!
//! One env var per concern, comma-separated lists for per-provider credentials, and
//! a fail-fast `from_env` constructor. `dotenvy` loads a local `.env` file before env
//! vars are read, for local-dev convenience.

use std::collections::HashMap;
use std::env;
use std::net::IpAddr;

use thiserror::Error;
use url::Url;

const ENV_HOST: &str = "HOST";
const ENV_PORT: &str = "PORT";
const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_DATABASE_POOL_SIZE: &str = "DATABASE_POOL_SIZE";
const ENV_PAY_TO_FAST_RAIL: &str = "PAY_TO_FAST_RAIL";
const ENV_PAY_TO_SLOW_RAIL_B: &str = "PAY_TO_SLOW_RAIL_B";
const ENV_FAST_RAIL_RPC_URL: &str = "FAST_RAIL_RPC_URL";
const ENV_FAST_RAIL_STABLECOIN_ADDRESS: &str = "FAST_RAIL_STABLECOIN_ADDRESS";
const ENV_EXTERNAL_FACILITATOR_URL: &str = "EXTERNAL_FACILITATOR_URL";
const ENV_DEV_BYPASS_SECRET: &str = "DEV_BYPASS_SECRET";
const ENV_DEV_BYPASS_ENABLED: &str = "DEV_BYPASS_ENABLED";
const ENV_REQUEST_LOG_RETENTION_DAYS: &str = "REQUEST_LOG_RETENTION_DAYS";
const PROVIDER_SECRETS_PREFIX: &str = "PROVIDER_";
const PROVIDER_SECRETS_SUFFIX: &str = "_SECRETS";
const PROVIDER_URL_PREFIX: &str = "PROVIDER_";
const PROVIDER_URL_SUFFIX: &str = "_URL";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_POOL_SIZE: u32 = 50;
const DEFAULT_REQUEST_LOG_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("env {0} not set")]
    Missing(&'static str),
    #[error("env {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Validated startup configuration, loaded once and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Url,
    pub database_pool_size: u32,
    pub pay_to_fast: String,
    pub pay_to_slow_b: String,
    pub fast_rail_rpc_url: Url,
    pub fast_rail_stablecoin_address: String,
    pub external_facilitator_url: Url,
    pub provider_secrets: HashMap<String, Vec<String>>,
    pub provider_upstream_urls: HashMap<String, Url>,
    pub dev_bypass_secret: Option<String>,
    pub dev_bypass_enabled: bool,
    pub request_log_retention_days: u32,
}

impl Config {
    /// Loads configuration from the process environment, failing fast if required
    /// values are absent or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let host = env_or_default(ENV_HOST, DEFAULT_HOST)
            .parse::<IpAddr>()
            .map_err(|e| invalid(ENV_HOST, &env_or_default(ENV_HOST, DEFAULT_HOST), e))?;
        let port = env_or_default(ENV_PORT, &DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| invalid(ENV_PORT, &env_or_default(ENV_PORT, "8080"), e))?;

        let database_url = required_url(ENV_DATABASE_URL)?;
        let database_pool_size = match env::var(ENV_DATABASE_POOL_SIZE) {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|e| invalid(ENV_DATABASE_POOL_SIZE, &raw, e))?,
            Err(_) => DEFAULT_DATABASE_POOL_SIZE,
        };

        let pay_to_fast = required_string(ENV_PAY_TO_FAST_RAIL)?;
        let pay_to_slow_b = required_string(ENV_PAY_TO_SLOW_RAIL_B)?;
        let fast_rail_rpc_url = required_url(ENV_FAST_RAIL_RPC_URL)?;
        let fast_rail_stablecoin_address = required_string(ENV_FAST_RAIL_STABLECOIN_ADDRESS)?;
        let external_facilitator_url = required_url(ENV_EXTERNAL_FACILITATOR_URL)?;

        let provider_secrets = load_provider_secrets();
        let provider_upstream_urls = load_provider_upstream_urls();

        let dev_bypass_secret = env::var(ENV_DEV_BYPASS_SECRET).ok();
        let dev_bypass_enabled = env::var(ENV_DEV_BYPASS_ENABLED)
            .map(|raw| raw.eq_ignore_ascii_case("true") || raw == "1")
            .unwrap_or(false);

        let request_log_retention_days = match env::var(ENV_REQUEST_LOG_RETENTION_DAYS) {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|e| invalid(ENV_REQUEST_LOG_RETENTION_DAYS, &raw, e))?,
            Err(_) => DEFAULT_REQUEST_LOG_RETENTION_DAYS,
        };

        Ok(Config {
            host,
            port,
            database_url,
            database_pool_size,
            pay_to_fast,
            pay_to_slow_b,
            fast_rail_rpc_url,
            fast_rail_stablecoin_address,
            external_facilitator_url,
            provider_secrets,
            provider_upstream_urls,
            dev_bypass_secret,
            dev_bypass_enabled,
            request_log_retention_days,
        })
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required_string(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn required_url(key: &'static str) -> Result<Url, ConfigError> {
    let raw = required_string(key)?;
    Url::parse(&raw).map_err(|e| invalid(key, &raw, e))
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Scans the environment for `PROVIDER_<TAG>_SECRETS` vars and parses each into a
/// comma-separated list of credentials.
fn load_provider_secrets() -> HashMap<String, Vec<String>> {
    let mut secrets = HashMap::new();
    for (key, value) in env::vars() {
        if let Some(tag) = key
            .strip_prefix(PROVIDER_SECRETS_PREFIX)
            .and_then(|rest| rest.strip_suffix(PROVIDER_SECRETS_SUFFIX))
        {
            let list: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
            if !list.is_empty() {
                secrets.insert(tag.to_lowercase(), list);
            }
        }
    }
    secrets
}

/// Scans the environment for `PROVIDER_<TAG>_URL` vars, one upstream endpoint per
/// catalog provider tag. A tag with no configured URL has no registered handler, so
/// `UpstreamDispatcher::dispatch` fails it with `UpstreamNotConfigured` rather than
/// panicking at startup.
fn load_provider_upstream_urls() -> HashMap<String, Url> {
    let mut urls = HashMap::new();
    for (key, value) in env::vars() {
        if let Some(tag) = key
            .strip_prefix(PROVIDER_URL_PREFIX)
            .and_then(|rest| rest.strip_suffix(PROVIDER_URL_SUFFIX))
        {
            if let Ok(url) = Url::parse(&value) {
                urls.insert(tag.to_lowercase(), url);
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_var_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var(ENV_DATABASE_URL);
        }
        let err = required_string(ENV_DATABASE_URL).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_DATABASE_URL)));
    }

    #[test]
    fn provider_secrets_parses_comma_separated_list() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("PROVIDER_IMAGES_SECRETS", "key-a, key-b ,key-c");
        }
        let secrets = load_provider_secrets();
        assert_eq!(
            secrets.get("images").cloned(),
            Some(vec![
                "key-a".to_string(),
                "key-b".to_string(),
                "key-c".to_string()
            ])
        );
        unsafe {
            env::remove_var("PROVIDER_IMAGES_SECRETS");
        }
    }

    #[test]
    fn provider_upstream_urls_parses_per_tag_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("PROVIDER_IMAGE_URL", "https://images.example/generate");
        }
        let urls = load_provider_upstream_urls();
        assert_eq!(
            urls.get("image").map(|u| u.as_str()),
            Some("https://images.example/generate")
        );
        unsafe {
            env::remove_var("PROVIDER_IMAGE_URL");
        }
    }

    #[test]
    fn dev_bypass_enabled_accepts_true_or_1() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var(ENV_DEV_BYPASS_ENABLED, "1");
        }
        let enabled = env::var(ENV_DEV_BYPASS_ENABLED)
            .map(|raw| raw.eq_ignore_ascii_case("true") || raw == "1")
            .unwrap_or(false);
        assert!(enabled);
        unsafe {
            env::remove_var(ENV_DEV_BYPASS_ENABLED);
        }
    }
}
