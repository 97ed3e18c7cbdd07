//! Engine configuration loading from config.toml
//!
//! The vote and ranking constants are user-visible behavior, so they have
//! named defaults matching what users are used to and can be overridden in
//! an optional `[engine]` table of config.toml.

use crate::{
    core::ledger::ResetSchedule,
    errors::{Error, Result},
};
use chrono::Weekday;
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::{debug, info};

/// Deadlines within this many days count as "ending soon".
pub const ENDING_SOON_DAYS: u32 = 7;
/// Votes granted to a user at every weekly reset.
pub const DEFAULT_WEEKLY_VOTE_LIMIT: u32 = 10;
/// Bound on a single backend call made by the vote coordinator.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Vote and ranking settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Vote and ranking settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// "Ending soon" window in days
    pub ending_soon_days: u32,
    /// Weekly allowance for new profiles
    pub default_weekly_vote_limit: u32,
    /// Day of the weekly reset (e.g. `"Mon"`)
    pub reset_weekday: Weekday,
    /// Hour (UTC) of the weekly reset
    pub reset_hour_utc: u32,
    /// Backend call timeout in seconds
    pub rpc_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ending_soon_days: ENDING_SOON_DAYS,
            default_weekly_vote_limit: DEFAULT_WEEKLY_VOTE_LIMIT,
            reset_weekday: Weekday::Mon,
            reset_hour_utc: 0,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// The weekly reset schedule described by this configuration.
    pub fn reset_schedule(&self) -> Result<ResetSchedule> {
        ResetSchedule::new(self.reset_weekday, self.reset_hour_utc)
    }

    /// Timeout for a single backend call.
    #[must_use]
    pub const fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    fn validate(self) -> Result<Self> {
        self.reset_schedule()?;
        if self.rpc_timeout_secs == 0 {
            return Err(Error::Config {
                message: "rpc_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range (e.g. reset hour above 23)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Parses configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    Ok(Config {
        engine: config.engine.validate()?,
    })
}

/// Loads configuration from the default location (./config.toml), falling
/// back to built-in defaults when the file does not exist.
pub fn load_default_config() -> Result<Config> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        info!("No config.toml found, using default engine settings.");
        Ok(Config::default())
    }
}
