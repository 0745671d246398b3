use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{BASE_REWARD, DEFAULT_DIFFICULTY, DIFF_MAX, NonceStrategy, ValidationMode};
use crate::error::{LedgerError, Result};

/// Node settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub difficulty: u32,
    pub block_reward: u64,
    pub data_dir: PathBuf,
    pub peer_timeout: Duration,
    pub nonce_strategy: NonceStrategy,
    pub validation_mode: ValidationMode,
    pub miner_secret_key: Option<String>,
    pub miner_nickname: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let difficulty = parse_or(get("DIFFICULTY"), "DIFFICULTY", DEFAULT_DIFFICULTY)?;
        check_difficulty(difficulty, "DIFFICULTY")?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(get("PORT"), "PORT", 8080)?,
            difficulty,
            block_reward: parse_or(get("BLOCK_REWARD"), "BLOCK_REWARD", BASE_REWARD)?,
            data_dir: get("DATA_DIR").map_or_else(|| PathBuf::from("./db"), PathBuf::from),
            peer_timeout: Duration::from_secs(parse_or(
                get("PEER_TIMEOUT_SECS"),
                "PEER_TIMEOUT_SECS",
                5,
            )?),
            nonce_strategy: get("NONCE_STRATEGY")
                .map(|v| v.parse::<NonceStrategy>())
                .transpose()?
                .unwrap_or_default(),
            validation_mode: get("VALIDATION_MODE")
                .map(|v| v.parse::<ValidationMode>())
                .transpose()?
                .unwrap_or_default(),
            miner_secret_key: get("MINER_SECRET_KEY"),
            miner_nickname: get("MINER_NICKNAME"),
        })
    }
}

/// Difficulties above `DIFF_MAX` would tie a miner up indefinitely.
pub fn check_difficulty(difficulty: u32, source: &str) -> Result<()> {
    if difficulty > DIFF_MAX {
        return Err(LedgerError::Configuration(format!(
            "{source} {difficulty} exceeds the maximum of {DIFF_MAX}"
        )));
    }
    Ok(())
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LedgerError::Configuration(format!("{key} has invalid value '{raw}'"))),
    }
}
