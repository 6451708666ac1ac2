use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Longest tick interval accepted; anything slower is almost certainly a typo.
pub const MAX_TICK_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Top-level trader config file (TOML).
///
/// Example `config/trader.toml`:
/// ```toml
/// [[trader]]
/// base_currency = "BTC"
/// trade_currency = "ETH"
/// trade_difference = 0.000001
/// trade_profit_percent = 0.5
/// trade_amount = 1.0
/// tick_interval_ms = 3000
/// sell_escalation_ticks = 160
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraderFileConfig {
    #[serde(rename = "trader")]
    pub traders: Vec<TraderConfig>,
}

/// Parameters of one scalper instance. Immutable once the engine is built.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TraderConfig {
    /// Quote currency the position is funded with, e.g. "BTC".
    pub base_currency: String,
    /// Currency being bought and sold, e.g. "ETH".
    pub trade_currency: String,
    /// Absolute offset added to the best bid / subtracted from the best ask.
    pub trade_difference: f64,
    /// Target profit in percent of the buy price.
    pub trade_profit_percent: f64,
    /// Quantity of `trade_currency` per trade.
    pub trade_amount: f64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_order_book_depth")]
    pub order_book_depth: usize,
    /// Ticks a buy may stay `New` before it is canceled.
    #[serde(default = "default_buy_cancel_ticks")]
    pub buy_cancel_ticks: u32,
    /// Bid levels at or above the profitable price needed to keep holding.
    #[serde(default = "default_depth_confirmations")]
    pub depth_confirmations: usize,
    /// Ticks a sell may stay open before the position is liquidated.
    /// `None` waits forever.
    #[serde(default)]
    pub sell_escalation_ticks: Option<u32>,
    #[serde(default = "default_precision")]
    pub price_precision: u32,
    #[serde(default = "default_precision")]
    pub quantity_precision: u32,
}

fn default_tick_interval_ms() -> u64 {
    3000
}

fn default_order_book_depth() -> usize {
    10
}

fn default_buy_cancel_ticks() -> u32 {
    10
}

fn default_depth_confirmations() -> usize {
    3
}

fn default_precision() -> u32 {
    8
}

impl TraderConfig {
    /// Config with the defaults of every optional field.
    pub fn new(
        base_currency: impl Into<String>,
        trade_currency: impl Into<String>,
        trade_difference: f64,
        trade_profit_percent: f64,
        trade_amount: f64,
    ) -> Self {
        Self {
            base_currency: base_currency.into(),
            trade_currency: trade_currency.into(),
            trade_difference,
            trade_profit_percent,
            trade_amount,
            tick_interval_ms: default_tick_interval_ms(),
            order_book_depth: default_order_book_depth(),
            buy_cancel_ticks: default_buy_cancel_ticks(),
            depth_confirmations: default_depth_confirmations(),
            sell_escalation_ticks: None,
            price_precision: default_precision(),
            quantity_precision: default_precision(),
        }
    }

    /// Exchange symbol, trade currency first: ETH traded against BTC is "ETHBTC".
    pub fn pair(&self) -> String {
        format!("{}{}", self.trade_currency, self.base_currency).to_uppercase()
    }

    pub fn validate(&self) -> Result<()> {
        let pair = self.pair();
        let fail = |msg: &str| Err(Error::Config(format!("[{pair}] {msg}")));

        if self.base_currency.trim().is_empty() || self.trade_currency.trim().is_empty() {
            return fail("base_currency and trade_currency must be set");
        }
        if !(self.trade_amount.is_finite() && self.trade_amount > 0.0) {
            return fail("trade_amount must be positive");
        }
        if !(self.trade_difference.is_finite() && self.trade_difference >= 0.0) {
            return fail("trade_difference must be zero or positive");
        }
        if !(self.trade_profit_percent.is_finite() && self.trade_profit_percent >= 0.0) {
            return fail("trade_profit_percent must be zero or positive");
        }
        if self.tick_interval_ms == 0 || self.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return fail("tick_interval_ms must be between 1 and 3600000");
        }
        if self.order_book_depth == 0 {
            return fail("order_book_depth must be at least 1");
        }
        Ok(())
    }
}

impl TraderFileConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read trader config at '{path}': {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Invalid trader config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if file.traders.is_empty() {
            return Err(Error::Config("no [[trader]] tables defined".into()));
        }
        for trader in &file.traders {
            trader.validate()?;
        }
        Ok(file)
    }
}
