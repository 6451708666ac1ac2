use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exchange-assigned order identifier.
pub type OrderId = u64;

/// Balances below this are treated as empty.
pub const BALANCE_EPSILON: f64 = 1e-9;

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Lifecycle status of an order as reported by the exchange.
///
/// The four named variants are the only ones the trader knows how to act on.
/// Anything else the exchange reports is carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Other(String),
}

impl OrderStatus {
    /// Map a Binance status string onto the closed set above.
    pub fn from_exchange(raw: &str) -> Self {
        match raw {
            "NEW" => OrderStatus::New,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// An order as known by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub pair: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub price: f64,
    pub quantity: f64,
}

/// One price level of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Top of the order book. Bids are sorted best (highest) first,
/// asks best (lowest) first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }
}

/// Free and locked amounts of a single asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub free: f64,
    pub locked: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Both sides of a pair's account, read together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountBalances {
    pub trading: Balance,
    pub base: Balance,
}

/// Everything the trader looks at during one tick. Built fresh every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub best_bid: f64,
    pub best_ask: f64,
    pub last_price: f64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub trading_balance_free: f64,
    pub trading_balance_locked: f64,
    pub base_balance_free: f64,
    pub total_trading_balance: f64,
    pub taken_at: DateTime<Utc>,
}

/// Live market data event from the exchange stream.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// Partial depth snapshot of the top of the book.
    Book { pair: String, book: OrderBook },
    /// A public trade printed on the pair.
    Trade {
        pair: String,
        price: f64,
        timestamp: DateTime<Utc>,
    },
}

impl MarketEvent {
    pub fn pair(&self) -> &str {
        match self {
            MarketEvent::Book { pair, .. } | MarketEvent::Trade { pair, .. } => pair,
        }
    }
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Run state of a tick scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Running => write!(f, "running"),
            RunState::Paused => write!(f, "paused"),
        }
    }
}

/// Commands sent to a scheduler via its command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Pause,
    Resume,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binance_statuses_map_onto_known_variants() {
        assert_eq!(OrderStatus::from_exchange("NEW"), OrderStatus::New);
        assert_eq!(
            OrderStatus::from_exchange("PARTIALLY_FILLED"),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(OrderStatus::from_exchange("FILLED"), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_exchange("CANCELED"), OrderStatus::Canceled);
    }

    #[test]
    fn unknown_statuses_are_preserved() {
        let status = OrderStatus::from_exchange("EXPIRED_IN_MATCH");
        assert_eq!(status, OrderStatus::Other("EXPIRED_IN_MATCH".into()));
        assert_eq!(status.to_string(), "EXPIRED_IN_MATCH");
    }

    #[test]
    fn book_exposes_top_of_book() {
        let book = OrderBook {
            bids: vec![BookLevel::new(100.0, 1.0), BookLevel::new(99.0, 2.0)],
            asks: vec![BookLevel::new(101.0, 1.0)],
        };
        assert_eq!(book.best_bid(), Some(100.0));
        assert_eq!(book.best_ask(), Some(101.0));
        assert_eq!(OrderBook::default().best_bid(), None);
    }
}
