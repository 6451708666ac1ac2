use async_trait::async_trait;

use crate::{AccountBalances, Balance, Order, OrderBook, OrderId, Result};

/// Authenticated gateway to a spot exchange for a single trading pair.
///
/// `BinanceClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// Every call is awaited to completion by the trader before it moves on;
/// a failed call aborts the current tick.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Exchange symbol of the pair, e.g. "ETHBTC".
    fn pair(&self) -> &str;

    /// Price of the most recent trade.
    async fn last_price(&self) -> Result<f64>;

    /// Top `depth` levels of each side of the book.
    async fn order_book(&self, depth: usize) -> Result<OrderBook>;

    /// Balance of the trade currency.
    async fn trading_balance(&self) -> Result<Balance>;

    /// Balance of the base (quote) currency.
    async fn base_balance(&self) -> Result<Balance>;

    /// Free plus locked amount of the trade currency.
    async fn all_trading_balance(&self) -> Result<f64>;

    /// Trade and base balances in one read. Clients whose balances come from
    /// a single account endpoint should override this.
    async fn balances(&self) -> Result<AccountBalances> {
        Ok(AccountBalances {
            trading: self.trading_balance().await?,
            base: self.base_balance().await?,
        })
    }

    /// Submit a limit buy.
    async fn buy(&self, quantity: f64, price: f64) -> Result<Order>;

    /// Submit a limit sell.
    async fn sell(&self, quantity: f64, price: f64) -> Result<Order>;

    /// Current state of a previously submitted order.
    async fn get_order(&self, id: OrderId) -> Result<Order>;

    async fn cancel_order(&self, id: OrderId) -> Result<()>;

    /// Best-effort emergency liquidation of `quantity` of the trade currency.
    /// `reference_price` is the price the caller expects to get.
    async fn panic_sell(&self, quantity: f64, reference_price: f64) -> Result<()>;
}
