//! Session configuration.
//!
//! Defaults match the values the site has always used. `SessionConfig::from_env`
//! reads overrides from `OPENDEBATE_*` variables.

use std::time::Duration;

use url::Url;

use crate::heartbeat::HeartbeatConfig;
use crate::messaging::queue::{Overflow, QueuePolicy};

/// Reconnect budget applied to every fresh failure.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Fixed delay before each reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
/// An attempt that has not opened within this window counts as failed.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;
pub const DEFAULT_PAGE_URL: &str = "http://localhost:8000/";
/// Path of the websocket endpoint on the page's host.
pub const WS_PATH: &str = "/ws/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid url `{value}`: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported page scheme `{0}` (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
    #[error("invalid value for {name}: `{value}`")]
    InvalidValue { name: &'static str, value: String },
}

/// Derive the websocket endpoint from the page URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, host and port are kept, and the
/// path is replaced by `/ws/`.
pub fn endpoint_from_page(page: &Url) -> Result<Url, ConfigError> {
    let scheme = match page.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };

    let host = page
        .host_str()
        .ok_or_else(|| ConfigError::UnsupportedScheme(page.scheme().to_string()))?;
    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let raw = format!("{scheme}://{authority}{WS_PATH}");
    Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { value: raw, source })
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Url,
    pub max_retries: u32,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub queue: QueuePolicy,
    pub heartbeat: HeartbeatConfig,
}

impl SessionConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            max_retries: DEFAULT_MAX_RETRIES,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            queue: QueuePolicy::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Build a config for the page served at `page_url`.
    pub fn for_page(page_url: &str) -> Result<Self, ConfigError> {
        let page = Url::parse(page_url).map_err(|source| ConfigError::InvalidUrl {
            value: page_url.to_string(),
            source,
        })?;
        Ok(Self::new(endpoint_from_page(&page)?))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`SessionConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("OPENDEBATE_WS_URL") {
            Some(ws_url) => {
                let endpoint = Url::parse(&ws_url).map_err(|source| ConfigError::InvalidUrl {
                    value: ws_url.clone(),
                    source,
                })?;
                Self::new(endpoint)
            }
            None => {
                let page =
                    lookup("OPENDEBATE_PAGE_URL").unwrap_or_else(|| DEFAULT_PAGE_URL.to_string());
                Self::for_page(&page)?
            }
        };

        if let Some(v) = parse_var(&lookup, "OPENDEBATE_MAX_RETRIES")? {
            config.max_retries = v;
        }
        if let Some(ms) = parse_var(&lookup, "OPENDEBATE_RECONNECT_DELAY_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(period) = parse_period(&lookup, "OPENDEBATE_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = period;
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "OPENDEBATE_QUEUE_CAPACITY")? {
            config.queue.capacity = (capacity > 0).then_some(capacity);
        }
        if let Some(value) = lookup("OPENDEBATE_QUEUE_OVERFLOW") {
            config.queue.overflow = match value.trim().to_ascii_lowercase().as_str() {
                "drop_oldest" => Overflow::DropOldest,
                "reject_new" => Overflow::RejectNew,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "OPENDEBATE_QUEUE_OVERFLOW",
                        value,
                    })
                }
            };
        }
        if let Some(period) = parse_period(&lookup, "OPENDEBATE_HEARTBEAT_INTERVAL_MS")? {
            config.heartbeat.interval = period;
        }
        if let Some(period) = parse_period(&lookup, "OPENDEBATE_HEARTBEAT_ACK_TIMEOUT_MS")? {
            config.heartbeat.ack_timeout = period;
        }
        if let Some(v) = parse_var(&lookup, "OPENDEBATE_HEARTBEAT_MAX_RETRIES")? {
            config.heartbeat.max_retries = v;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

/// A millisecond duration that must be non-zero.
fn parse_period(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match parse_var::<u64>(lookup, name)? {
        Some(0) => Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
        }),
        ms => Ok(ms.map(Duration::from_millis)),
    }
}
