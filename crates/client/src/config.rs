//! Client configuration from environment variables.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::ws::ReconnectConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
/// Socket.IO endpoint on the API host.
pub const WS_PATH: &str = "/socket.io/";
/// Engine.IO v4 over a plain WebSocket, no polling upgrade.
pub const WS_QUERY: &str = "EIO=4&transport=websocket";
pub const DEFAULT_LEADERBOARD_TOP: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
    #[error("{var} must be {expected}, got {value:?}")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Everything the sync engine needs to reach the marketplace server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, e.g. `http://localhost:5000`.
    pub api_url: Url,
    /// Push channel URL, e.g. `ws://localhost:5000/socket.io/?EIO=4&transport=websocket`.
    pub ws_url: Url,
    /// N for the leaderboard pull.
    pub leaderboard_top: usize,
    /// Periodic leaderboard pull; `None` disables the timer.
    pub leaderboard_refresh: Option<Duration>,
    /// Per-request HTTP timeout; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Re-pull the snapshot after the push channel reconnects.
    pub resync_on_reconnect: bool,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Config pointing at `api_url` with every other setting at its default.
    pub fn new(api_url: Url) -> Result<Self, ConfigError> {
        let ws_url = derive_ws_url(&api_url)?;
        Ok(Self {
            api_url,
            ws_url,
            leaderboard_top: DEFAULT_LEADERBOARD_TOP,
            leaderboard_refresh: None,
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            resync_on_reconnect: true,
            reconnect: ReconnectConfig::default(),
        })
    }

    /// Parse configuration from the process environment.
    ///
    /// Environment variables:
    /// - `MEMEHUSTLE_API_URL`: REST base URL (default: "http://localhost:5000")
    /// - `MEMEHUSTLE_WS_URL`: push channel URL (default: API URL with ws scheme and the Socket.IO path)
    /// - `MEMEHUSTLE_LEADERBOARD_TOP`: leaderboard size (default: 10)
    /// - `MEMEHUSTLE_LEADERBOARD_REFRESH_SECS`: periodic leaderboard pull, 0 disables (default: 0)
    /// - `MEMEHUSTLE_REQUEST_TIMEOUT_SECS`: HTTP timeout, 0 disables (default: 30)
    /// - `MEMEHUSTLE_RESYNC_ON_RECONNECT`: "true" | "false" (default: "true")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_url = match get("MEMEHUSTLE_API_URL") {
            Some(raw) => parse_url("MEMEHUSTLE_API_URL", &raw)?,
            None => parse_url("MEMEHUSTLE_API_URL", DEFAULT_API_URL)?,
        };
        let mut config = Self::new(api_url)?;

        if let Some(raw) = get("MEMEHUSTLE_WS_URL") {
            config.ws_url = parse_url("MEMEHUSTLE_WS_URL", &raw)?;
        }
        if let Some(raw) = get("MEMEHUSTLE_LEADERBOARD_TOP") {
            let top = parse_number("MEMEHUSTLE_LEADERBOARD_TOP", &raw)?;
            if top == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "MEMEHUSTLE_LEADERBOARD_TOP",
                    expected: "a positive integer",
                    value: raw,
                });
            }
            config.leaderboard_top = top as usize;
        }
        if let Some(raw) = get("MEMEHUSTLE_LEADERBOARD_REFRESH_SECS") {
            config.leaderboard_refresh =
                seconds(parse_number("MEMEHUSTLE_LEADERBOARD_REFRESH_SECS", &raw)?);
        }
        if let Some(raw) = get("MEMEHUSTLE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = seconds(parse_number("MEMEHUSTLE_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("MEMEHUSTLE_RESYNC_ON_RECONNECT") {
            config.resync_on_reconnect = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "MEMEHUSTLE_RESYNC_ON_RECONNECT",
                        expected: "true or false",
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}

/// `http://host:port/...` becomes
/// `ws://host:port/socket.io/?EIO=4&transport=websocket`.
pub fn derive_ws_url(api_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match api_url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let mut ws_url = api_url.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|()| ConfigError::InvalidUrl {
            var: "MEMEHUSTLE_API_URL",
            reason: format!("cannot derive a websocket URL from {api_url}"),
        })?;
    ws_url.set_path(WS_PATH);
    ws_url.set_query(Some(WS_QUERY));
    Ok(ws_url)
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        var,
        reason: e.to_string(),
    })
}

fn parse_number(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        expected: "a non-negative integer",
        value: raw.to_string(),
    })
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
