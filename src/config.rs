//! Process configuration, read once from the environment at startup.

use std::collections::HashMap;
use std::time::Duration;

use crate::authz::DEFAULT_AUTH_TIMEOUT;
use crate::backend::DEFAULT_CANCEL_TIMEOUT;
use crate::error::ConfigError;
use crate::store::DEFAULT_STORE_TIMEOUT;
use crate::vault::VaultAllowList;

const KEYS: [&str; 15] = [
    "DB_HOST",
    "DB_PORT",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "DB_MAX_CONNECTIONS",
    "MANAGEMENT_URL",
    "REGION",
    "APPLICATION_ID",
    "EXECUTION_ENDPOINT",
    "VALID_VAULT_IDS",
    "AUTH_TIMEOUT_SECS",
    "STORE_TIMEOUT_SECS",
    "CANCEL_TIMEOUT_SECS",
    "BIND_ADDR",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Base URL of the vault management service.
    pub management_url: String,
    pub region: String,
    pub application_id: String,
    /// Base URL of the request-signing proxy in front of the execution
    /// backend API. Cancel calls are sent unsigned to this address.
    pub execution_endpoint: String,
    pub vault_ids: VaultAllowList,
    pub auth_timeout: Duration,
    pub store_timeout: Duration,
    pub cancel_timeout: Duration,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut envs = HashMap::new();
        for key in KEYS {
            if let Ok(value) = std::env::var(key) {
                envs.insert(key.to_string(), value);
            }
        }
        Self::from_env_map(&envs)
    }

    pub fn from_env_map(envs: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            envs.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database = DatabaseConfig {
            host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(envs, "DB_PORT", 5432)?,
            user: get("DB_USER").unwrap_or_default(),
            // not trimmed: leading or trailing spaces are part of the secret
            password: envs.get("DB_PASSWORD").cloned().unwrap_or_default(),
            name: get("DB_NAME").unwrap_or_default(),
            max_connections: parse_or(envs, "DB_MAX_CONNECTIONS", 5)?,
        };

        let management_url = get("MANAGEMENT_URL").ok_or(ConfigError::Missing("MANAGEMENT_URL"))?;
        let application_id = get("APPLICATION_ID").ok_or(ConfigError::Missing("APPLICATION_ID"))?;
        let region = get("REGION").unwrap_or_else(|| "us-east-1".to_string());
        let execution_endpoint =
            get("EXECUTION_ENDPOINT").ok_or(ConfigError::Missing("EXECUTION_ENDPOINT"))?;

        let vault_ids = VaultAllowList::parse(&get("VALID_VAULT_IDS").unwrap_or_default());

        Ok(Self {
            database,
            management_url,
            region,
            application_id,
            execution_endpoint,
            vault_ids,
            auth_timeout: secs_or(envs, "AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT)?,
            store_timeout: secs_or(envs, "STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT)?,
            cancel_timeout: secs_or(envs, "CANCEL_TIMEOUT_SECS", DEFAULT_CANCEL_TIMEOUT)?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    envs: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match envs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn secs_or(
    envs: &HashMap<String, String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parse_or(envs, key, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
