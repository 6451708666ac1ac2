use crate::{Error, Result, TradingMode};

pub const DEFAULT_REST_URL: &str = "https://api.binance.com";
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443";

/// Process-level configuration loaded from environment variables at startup.
/// Per-pair trading parameters live in the trader TOML file instead.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials (empty in paper mode)
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_rest_url: String,
    pub binance_ws_url: String,

    // Trading
    pub trading_mode: TradingMode,
    pub paper_slippage_bps: f64,
    pub paper_base_balance: f64,

    // Trader config file path
    pub trader_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let trading_mode = match required("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (required("BINANCE_API_KEY")?, required("BINANCE_SECRET")?),
            TradingMode::Paper => (
                lookup("BINANCE_API_KEY").unwrap_or_default(),
                lookup("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        Ok(Config {
            binance_api_key,
            binance_secret,
            binance_rest_url: lookup("BINANCE_REST_URL")
                .unwrap_or_else(|| DEFAULT_REST_URL.to_string()),
            binance_ws_url: lookup("BINANCE_WS_URL")
                .unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            trading_mode,
            paper_slippage_bps: parse_optional(&lookup, "PAPER_SLIPPAGE_BPS", 10.0)?,
            paper_base_balance: parse_optional(&lookup, "PAPER_BASE_BALANCE", 1.0)?,
            trader_config_path: lookup("TRADER_CONFIG_PATH")
                .unwrap_or_else(|| "config/trader.toml".to_string()),
        })
    }
}

fn parse_optional<F>(lookup: &F, key: &str, default: f64) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| {
                Error::Config(format!("{key} must be a non-negative number, got '{raw}'"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn paper_mode_needs_no_credentials() {
        let cfg = Config::from_lookup(lookup(&[("TRADING_MODE", "Paper")])).unwrap();
        assert_eq!(cfg.trading_mode, TradingMode::Paper);
        assert!(cfg.binance_api_key.is_empty());
        assert_eq!(cfg.binance_rest_url, DEFAULT_REST_URL);
        assert_eq!(cfg.trader_config_path, "config/trader.toml");
        assert!((cfg.paper_slippage_bps - 10.0).abs() < 1e-12);
    }

    #[test]
    fn live_mode_requires_credentials() {
        let err = Config::from_lookup(lookup(&[("TRADING_MODE", "live")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("BINANCE_API_KEY")));

        let cfg = Config::from_lookup(lookup(&[
            ("TRADING_MODE", "live"),
            ("BINANCE_API_KEY", "key"),
            ("BINANCE_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.binance_secret, "secret");
    }

    #[test]
    fn rejects_unknown_mode_and_bad_numbers() {
        assert!(Config::from_lookup(lookup(&[("TRADING_MODE", "demo")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("TRADING_MODE", "paper"),
            ("PAPER_SLIPPAGE_BPS", "-3"),
        ]))
        .is_err());
    }
}
