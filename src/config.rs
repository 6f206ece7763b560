use alloy_primitives::Address;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub rpc_url: String,
    pub network: String,
    pub vault_registry_path: String,
    pub events_path: String,
    pub share_token_mint_address: Address,
    pub clock_tick_period_secs: u64,
    pub snapshot_periods: Vec<u64>,
    pub rpc_max_elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let rpc_url = required(&env_map, "RPC_URL")?;
        let network = required(&env_map, "NETWORK")?;

        let vault_registry_path = env_map
            .get("VAULT_REGISTRY_PATH")
            .cloned()
            .unwrap_or_else(|| "config/vaults.json".to_string());

        let events_path = required(&env_map, "EVENTS_PATH")?;

        let share_token_mint_address = match env_map.get("SHARE_TOKEN_MINT_ADDRESS") {
            Some(value) => value.parse::<Address>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SHARE_TOKEN_MINT_ADDRESS".to_string(),
                    format!("must be a 20-byte hex address, got {}", value),
                )
            })?,
            None => Address::ZERO,
        };

        let clock_tick_period_secs = parse_secs(&env_map, "CLOCK_TICK_PERIOD_SECS", "3600")?;

        let snapshot_periods = env_map
            .get("SNAPSHOT_PERIODS")
            .map(|s| s.as_str())
            .unwrap_or("3600,86400")
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<u64>() {
                Ok(period) if period > 0 => Ok(period),
                _ => Err(ConfigError::InvalidValue(
                    "SNAPSHOT_PERIODS".to_string(),
                    format!("must be comma separated positive seconds, got {}", s),
                )),
            })
            .collect::<Result<Vec<u64>, ConfigError>>()?;

        let rpc_max_elapsed =
            Duration::from_secs(parse_secs(&env_map, "RPC_MAX_ELAPSED_SECS", "30")?);

        Ok(Config {
            port,
            database_path,
            rpc_url,
            network,
            vault_registry_path,
            events_path,
            share_token_mint_address,
            clock_tick_period_secs,
            snapshot_periods,
            rpc_max_elapsed,
        })
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_secs(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    match env_map.get(key).map(|s| s.as_str()).unwrap_or(default).parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive number of seconds".to_string(),
        )),
    }
}
