use crate::error::{AppError, Result};
use crate::types::ListType;

pub const FEED_URL: &str = "wss://sportsapi.example.com/v2/aggregator";

/// Heartbeat ping interval (seconds).
pub const WS_PING_INTERVAL_SECS: u64 = 30;

/// Reconnect backoff values in milliseconds.
pub const RECONNECT_BACKOFF_MS: &[u64] = &[100, 200, 400, 800, 1600];

/// Malformed-record diagnostics: the first N are always logged, then one in every
/// `MALFORMED_LOG_EVERY`.
pub const MALFORMED_LOG_FIRST: u64 = 10;
pub const MALFORMED_LOG_EVERY: u64 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url: String,
    /// Text frame sent right after connecting (FEED_SUBSCRIBE_MSG). Opens the
    /// subscription session on the upstream side.
    pub feed_subscribe_msg: Option<String>,
    /// REST endpoint returning `{"records": [LOCATION...]}` (LOCATIONS_URL).
    pub locations_url: Option<String>,
    /// Bucket that incoming dumps are filed under (LIST_TYPE).
    pub list_type: ListType,
    pub log_level: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            feed_url: std::env::var("FEED_URL").unwrap_or_else(|_| FEED_URL.to_string()),
            feed_subscribe_msg: std::env::var("FEED_SUBSCRIBE_MSG")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            locations_url: std::env::var("LOCATIONS_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            list_type: std::env::var("LIST_TYPE")
                .map(|s| ListType::from(s.trim()))
                .unwrap_or(ListType::FavoriteMatches),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}
