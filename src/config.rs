//! Runtime configuration
//!
//! Configuration is environment-only. `from_lookup` takes the variable source
//! as a closure so the parsing rules can be exercised without touching the
//! process environment.

use crate::error::ConfigError;
use reqwest::Url;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "VITALSYNC_ENDPOINT";
pub const ENV_TOKEN: &str = "VITALSYNC_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "VITALSYNC_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "VITALSYNC_CONNECT_TIMEOUT_SECS";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Endpoint and credential for the sync transport
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub endpoint: Url,
    pub credential: SecretString,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl SyncConfig {
    /// Build a config with default timeouts
    pub fn new(endpoint: &str, credential: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            credential: parse_credential(credential)?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }

    /// Load from `VITALSYNC_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint =
            lookup(ENV_ENDPOINT).ok_or_else(|| ConfigError::Missing(ENV_ENDPOINT.into()))?;
        let credential =
            lookup(ENV_TOKEN).ok_or_else(|| ConfigError::Missing(ENV_TOKEN.into()))?;

        let mut config = Self::new(&endpoint, &credential)?;
        if let Some(secs) = parse_secs(&lookup, ENV_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, ENV_CONNECT_TIMEOUT_SECS)? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Replace the endpoint, keeping everything else
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ConfigError> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    /// Replace the bearer credential, keeping everything else
    pub fn with_credential(mut self, credential: &str) -> Result<Self, ConfigError> {
        self.credential = parse_credential(credential)?;
        Ok(self)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        key: ENV_ENDPOINT.into(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            key: ENV_ENDPOINT.into(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn parse_credential(raw: &str) -> Result<SecretString, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            key: ENV_TOKEN.into(),
            reason: "credential is empty".into(),
        });
    }
    Ok(SecretString::from(trimmed.to_string()))
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: key.into(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Lookback windows, in days, for every query the engine issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindows {
    /// Weight, body fat, blood pressure and heart rate on the summary
    pub summary_metrics_days: i64,
    /// Step and sleep totals on the summary
    pub summary_totals_days: i64,
    /// Weight, body fat and blood pressure in the sync payload
    pub sync_body_days: i64,
    /// Heart rate, sleep and steps in the sync payload
    pub sync_activity_days: i64,
}

impl Default for LookbackWindows {
    fn default() -> Self {
        Self {
            summary_metrics_days: 30,
            summary_totals_days: 7,
            sync_body_days: 30,
            sync_activity_days: 7,
        }
    }
}
