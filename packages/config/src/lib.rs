// ABOUTME: Environment-driven configuration for the CRS synchronization engine
// ABOUTME: Backend endpoints, stream reconnect policy, highlight timing and channel sizes

pub mod constants;

use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crs_core::constants::{
    DEFAULT_CHANGE_CHANNEL_CAPACITY, DEFAULT_HIGHLIGHT_WINDOW_MS, DEFAULT_TELEMETRY_BUFFER,
};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const MAX_RECONNECT_ATTEMPTS_LIMIT: u32 = 50;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid number for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} is out of range: {value}")]
    OutOfRange { var: &'static str, value: u64 },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Reconnect policy for the generation stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Failed attempts before the adapter gives up and needs a manual retry
    pub max_reconnect_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Failed attempts before the status reports degraded
    pub degraded_after: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            degraded_after: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub highlight_window: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            highlight_window: Duration::from_millis(DEFAULT_HIGHLIGHT_WINDOW_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: Url,
    pub ws_url: Url,
    pub http_timeout: Duration,
    pub stream: StreamConfig,
    pub render: RenderConfig,
    pub telemetry_buffer: usize,
    pub change_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        // Constant literals, parsing cannot fail
        let api_url = Url::parse(DEFAULT_API_URL).unwrap_or_else(|_| unreachable!());
        let ws_url = websocket_url_for(&api_url).unwrap_or_else(|_| unreachable!());
        Self {
            api_url,
            ws_url,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            stream: StreamConfig::default(),
            render: RenderConfig::default(),
            telemetry_buffer: DEFAULT_TELEMETRY_BUFFER,
            change_channel_capacity: DEFAULT_CHANGE_CHANNEL_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = match lookup(constants::CRS_API_URL) {
            Some(raw) => parse_http_url(&raw)?,
            None => defaults.api_url,
        };

        let ws_url = match lookup(constants::CRS_WS_URL) {
            Some(raw) => {
                let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
                if !matches!(url.scheme(), "ws" | "wss") {
                    return Err(ConfigError::InvalidUrl(format!(
                        "{} must use ws:// or wss://",
                        constants::CRS_WS_URL
                    )));
                }
                url
            }
            None => websocket_url_for(&api_url)?,
        };

        let http_timeout_secs = parse_number(
            &lookup,
            constants::CRS_HTTP_TIMEOUT_SECS,
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                var: constants::CRS_HTTP_TIMEOUT_SECS,
                value: 0,
            });
        }

        let max_reconnect_attempts = parse_number(
            &lookup,
            constants::CRS_STREAM_MAX_RECONNECT_ATTEMPTS,
            u64::from(defaults.stream.max_reconnect_attempts),
        )?;
        if max_reconnect_attempts == 0 || max_reconnect_attempts > u64::from(MAX_RECONNECT_ATTEMPTS_LIMIT)
        {
            return Err(ConfigError::OutOfRange {
                var: constants::CRS_STREAM_MAX_RECONNECT_ATTEMPTS,
                value: max_reconnect_attempts,
            });
        }

        let initial_backoff_ms = parse_number(
            &lookup,
            constants::CRS_STREAM_INITIAL_BACKOFF_MS,
            defaults.stream.initial_backoff.as_millis() as u64,
        )?;
        let max_backoff_ms = parse_number(
            &lookup,
            constants::CRS_STREAM_MAX_BACKOFF_MS,
            defaults.stream.max_backoff.as_millis() as u64,
        )?;
        if max_backoff_ms < initial_backoff_ms {
            return Err(ConfigError::OutOfRange {
                var: constants::CRS_STREAM_MAX_BACKOFF_MS,
                value: max_backoff_ms,
            });
        }

        let degraded_after = parse_number(
            &lookup,
            constants::CRS_STREAM_DEGRADED_AFTER,
            u64::from(defaults.stream.degraded_after),
        )?
        .min(max_reconnect_attempts);

        let highlight_window_ms = parse_number(
            &lookup,
            constants::CRS_HIGHLIGHT_WINDOW_MS,
            DEFAULT_HIGHLIGHT_WINDOW_MS,
        )?;

        let telemetry_buffer = parse_capacity(
            &lookup,
            constants::CRS_TELEMETRY_BUFFER,
            DEFAULT_TELEMETRY_BUFFER,
        )?;
        let change_channel_capacity = parse_capacity(
            &lookup,
            constants::CRS_STORE_CHANNEL_CAPACITY,
            DEFAULT_CHANGE_CHANNEL_CAPACITY,
        )?;

        let config = Self {
            api_url,
            ws_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
            stream: StreamConfig {
                max_reconnect_attempts: max_reconnect_attempts as u32,
                initial_backoff: Duration::from_millis(initial_backoff_ms),
                max_backoff: Duration::from_millis(max_backoff_ms),
                degraded_after: degraded_after as u32,
            },
            render: RenderConfig {
                highlight_window: Duration::from_millis(highlight_window_ms),
            },
            telemetry_buffer,
            change_channel_capacity,
        };

        debug!(api_url = %config.api_url, ws_url = %config.ws_url, "Loaded sync configuration");
        Ok(config)
    }
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http:// or https://",
            constants::CRS_API_URL
        )));
    }
    Ok(url)
}

/// Derive the socket endpoint from the REST endpoint (http -> ws, https -> wss)
pub fn websocket_url_for(api_url: &Url) -> Result<Url> {
    let scheme = if api_url.scheme() == "https" { "wss" } else { "ws" };
    let mut ws_url = api_url.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|_| ConfigError::InvalidUrl(api_url.to_string()))?;
    Ok(ws_url)
}

fn parse_number<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        None => Ok(default),
    }
}

fn parse_capacity<F>(lookup: &F, var: &'static str, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_number(lookup, var, default as u64)?;
    if value == 0 || value > 65_536 {
        return Err(ConfigError::OutOfRange { var, value });
    }
    Ok(value as usize)
}
