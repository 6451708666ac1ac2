use thiserror::Error;

use crate::OrderId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Exchange API error (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },

    #[error("Rate limited by exchange: {0}")]
    RateLimited(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Malformed exchange data: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient {asset} balance: need {needed}, have {available}")]
    InsufficientBalance {
        asset: String,
        needed: f64,
        available: f64,
    },

    #[error("Unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Parse a decimal string from an exchange payload.
    pub fn parse_f64(field: &str, raw: &str) -> Result<f64> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Error::Parse(format!("{field}: '{raw}' is not a number")))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
