use std::env;

use thiserror::Error;

const DEFAULT_PAGE_SIZE: usize = 25;
const DEFAULT_THRESHOLD_WINDOW: usize = 5;
const DEFAULT_TYPING_EXPIRY_MS: u64 = 1_000;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_ACTION_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_COMMAND_BUFFER: usize = 64;
const DEFAULT_UPDATE_BUFFER: usize = 256;

/// Runtime tuning values for the engine actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Page size for bulk fetches.
    pub page_size: usize,
    /// Trailing lookahead window for load-more triggers.
    pub threshold_window: usize,
    /// Idle window after which a typing indicator expires.
    pub typing_expiry_ms: u64,
    /// Recurring tick driving typing expiry and timeout sweeps.
    pub tick_interval_ms: u64,
    /// Deadline for a mutation intent awaiting its confirmation event.
    pub action_timeout_ms: u64,
    /// Command channel capacity.
    pub command_buffer: usize,
    /// Update broadcast capacity.
    pub update_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            threshold_window: DEFAULT_THRESHOLD_WINDOW,
            typing_expiry_ms: DEFAULT_TYPING_EXPIRY_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            update_buffer: DEFAULT_UPDATE_BUFFER,
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from `THREADLIST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let page_size =
            parse_optional_usize("THREADLIST_PAGE_SIZE", DEFAULT_PAGE_SIZE, &mut lookup)?;
        let threshold_window = parse_optional_usize(
            "THREADLIST_THRESHOLD_WINDOW",
            DEFAULT_THRESHOLD_WINDOW,
            &mut lookup,
        )?;
        let typing_expiry_ms = parse_optional_u64(
            "THREADLIST_TYPING_EXPIRY_MS",
            DEFAULT_TYPING_EXPIRY_MS,
            &mut lookup,
        )?;
        let tick_interval_ms = parse_optional_u64(
            "THREADLIST_TICK_INTERVAL_MS",
            DEFAULT_TICK_INTERVAL_MS,
            &mut lookup,
        )?;
        let action_timeout_ms = parse_optional_u64(
            "THREADLIST_ACTION_TIMEOUT_MS",
            DEFAULT_ACTION_TIMEOUT_MS,
            &mut lookup,
        )?;

        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "THREADLIST_PAGE_SIZE",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if threshold_window == 0 {
            return Err(ConfigError::InvalidValue {
                key: "THREADLIST_THRESHOLD_WINDOW",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "THREADLIST_TICK_INTERVAL_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            page_size,
            threshold_window,
            typing_expiry_ms,
            tick_interval_ms,
            action_timeout_ms,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            update_buffer: DEFAULT_UPDATE_BUFFER,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        /// Offending variable name.
        key: &'static str,
        /// Raw value as found in the environment.
        value: String,
        /// Parse or validation failure description.
        reason: String,
    },
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_u64<F>(key: &'static str, default: u64, lookup: &mut F) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}
