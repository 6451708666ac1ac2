use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    AccountBalances, Balance, Error, ExchangeClient, MarketEvent, Order, OrderBook, OrderId,
    OrderSide, OrderStatus, Result,
};

/// Simulated spot exchange for a single pair.
///
/// Limit orders rest until the simulated book crosses them and then fill in
/// full at their limit price. Market data comes in through `update_book` /
/// `update_last_price`. No real orders are ever sent to Binance.
pub struct PaperClient {
    pair: String,
    /// Slippage in basis points applied to emergency market sells.
    slippage_bps: f64,
    ledger: RwLock<Ledger>,
}

#[derive(Default)]
struct Ledger {
    book: OrderBook,
    last_price: Option<f64>,
    base: Balance,
    trading: Balance,
    orders: HashMap<OrderId, Order>,
    next_id: OrderId,
}

impl PaperClient {
    pub fn new(pair: impl Into<String>, base_balance: f64, slippage_bps: f64) -> Self {
        let pair = pair.into();
        info!(
            pair = %pair,
            base_balance,
            slippage_bps,
            "PaperClient initialized"
        );
        Self {
            pair,
            slippage_bps,
            ledger: RwLock::new(Ledger {
                base: Balance {
                    free: base_balance,
                    locked: 0.0,
                },
                next_id: 1,
                ..Ledger::default()
            }),
        }
    }

    /// Credit free trade currency, e.g. to start with an existing position.
    pub async fn deposit_trading(&self, amount: f64) {
        self.ledger.write().await.trading.free += amount;
    }

    /// Replace the simulated book and fill every order it now crosses.
    pub async fn update_book(&self, book: OrderBook) {
        let mut ledger = self.ledger.write().await;
        ledger.book = book;
        ledger.match_orders();
    }

    pub async fn update_last_price(&self, price: f64) {
        self.ledger.write().await.last_price = Some(price);
    }

    /// Feed a stream event for this pair; other pairs are ignored.
    pub async fn apply(&self, event: &MarketEvent) {
        if event.pair() != self.pair {
            return;
        }
        match event {
            MarketEvent::Book { book, .. } => self.update_book(book.clone()).await,
            MarketEvent::Trade { price, .. } => self.update_last_price(*price).await,
        }
    }

    async fn place(&self, side: OrderSide, quantity: f64, price: f64) -> Result<Order> {
        if !(quantity > 0.0 && price > 0.0) {
            return Err(Error::Other(format!(
                "invalid order: quantity {quantity} at price {price}"
            )));
        }

        let mut ledger = self.ledger.write().await;
        match side {
            OrderSide::Buy => {
                let cost = quantity * price;
                reserve(&mut ledger.base, cost, "base")?;
            }
            OrderSide::Sell => reserve(&mut ledger.trading, quantity, "trading")?,
        }

        let id = ledger.next_id;
        ledger.next_id += 1;
        let order = Order {
            id,
            pair: self.pair.clone(),
            side,
            status: OrderStatus::New,
            price,
            quantity,
        };
        ledger.orders.insert(id, order);
        ledger.match_orders();

        let order = ledger.orders[&id].clone();
        debug!(
            pair = %self.pair,
            id,
            side = %side,
            quantity,
            price,
            status = %order.status,
            "Paper order placed"
        );
        Ok(order)
    }
}

impl Ledger {
    fn match_orders(&mut self) {
        let best_bid = self.book.best_bid();
        let best_ask = self.book.best_ask();

        let crossed: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| is_open(&o.status))
            .filter(|o| match o.side {
                OrderSide::Buy => best_ask.is_some_and(|ask| ask <= o.price),
                OrderSide::Sell => best_bid.is_some_and(|bid| bid >= o.price),
            })
            .map(|o| o.id)
            .collect();

        for id in crossed {
            self.fill(id);
        }
    }

    fn fill(&mut self, id: OrderId) {
        let Some(order) = self.orders.get_mut(&id) else {
            return;
        };
        order.status = OrderStatus::Filled;
        let (side, quantity, price) = (order.side, order.quantity, order.price);

        match side {
            OrderSide::Buy => {
                release(&mut self.base, quantity * price);
                self.trading.free += quantity;
            }
            OrderSide::Sell => {
                release(&mut self.trading, quantity);
                self.base.free += quantity * price;
            }
        }
        self.last_price = Some(price);
    }

    fn cancel(&mut self, id: OrderId) -> Result<()> {
        let order = self.orders.get_mut(&id).ok_or(Error::UnknownOrder(id))?;
        if !is_open(&order.status) {
            return Err(Error::Exchange {
                status: 400,
                body: format!("order {id} is {}", order.status),
            });
        }
        order.status = OrderStatus::Canceled;
        let (side, quantity, price) = (order.side, order.quantity, order.price);

        match side {
            OrderSide::Buy => {
                release(&mut self.base, quantity * price);
                self.base.free += quantity * price;
            }
            OrderSide::Sell => {
                release(&mut self.trading, quantity);
                self.trading.free += quantity;
            }
        }
        Ok(())
    }
}

fn is_open(status: &OrderStatus) -> bool {
    matches!(status, OrderStatus::New | OrderStatus::PartiallyFilled)
}

fn reserve(balance: &mut Balance, amount: f64, asset: &str) -> Result<()> {
    if balance.free + 1e-12 < amount {
        return Err(Error::InsufficientBalance {
            asset: asset.to_string(),
            needed: amount,
            available: balance.free,
        });
    }
    balance.free = (balance.free - amount).max(0.0);
    balance.locked += amount;
    Ok(())
}

fn release(balance: &mut Balance, amount: f64) {
    balance.locked = (balance.locked - amount).max(0.0);
}

#[async_trait]
impl ExchangeClient for PaperClient {
    fn pair(&self) -> &str {
        &self.pair
    }

    async fn last_price(&self) -> Result<f64> {
        let ledger = self.ledger.read().await;
        let mid = match (ledger.book.best_bid(), ledger.book.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        };
        ledger.last_price.or(mid).ok_or_else(|| {
            Error::Other(format!(
                "PaperClient has no price for pair '{}'. Ensure market events are flowing.",
                self.pair
            ))
        })
    }

    async fn order_book(&self, depth: usize) -> Result<OrderBook> {
        let ledger = self.ledger.read().await;
        Ok(OrderBook {
            bids: ledger.book.bids.iter().take(depth).copied().collect(),
            asks: ledger.book.asks.iter().take(depth).copied().collect(),
        })
    }

    async fn trading_balance(&self) -> Result<Balance> {
        Ok(self.ledger.read().await.trading)
    }

    async fn base_balance(&self) -> Result<Balance> {
        Ok(self.ledger.read().await.base)
    }

    async fn all_trading_balance(&self) -> Result<f64> {
        Ok(self.ledger.read().await.trading.total())
    }

    async fn balances(&self) -> Result<AccountBalances> {
        let ledger = self.ledger.read().await;
        Ok(AccountBalances {
            trading: ledger.trading,
            base: ledger.base,
        })
    }

    async fn buy(&self, quantity: f64, price: f64) -> Result<Order> {
        self.place(OrderSide::Buy, quantity, price).await
    }

    async fn sell(&self, quantity: f64, price: f64) -> Result<Order> {
        self.place(OrderSide::Sell, quantity, price).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.ledger
            .read()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownOrder(id))
    }

    async fn cancel_order(&self, id: OrderId) -> Result<()> {
        self.ledger.write().await.cancel(id)?;
        debug!(pair = %self.pair, id, "Paper order canceled");
        Ok(())
    }

    async fn panic_sell(&self, quantity: f64, reference_price: f64) -> Result<()> {
        let mut ledger = self.ledger.write().await;

        let open: Vec<OrderId> = ledger
            .orders
            .values()
            .filter(|o| is_open(&o.status))
            .map(|o| o.id)
            .collect();
        for id in open {
            ledger.cancel(id)?;
        }

        // Sells receive less
        let fill_price = reference_price * (1.0 - self.slippage_bps / 10_000.0);
        let quantity = quantity.min(ledger.trading.free);
        ledger.trading.free -= quantity;
        ledger.base.free += quantity * fill_price;
        ledger.last_price = Some(fill_price);

        info!(
            pair = %self.pair,
            quantity,
            reference_price,
            fill_price,
            "Paper liquidation filled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookLevel;

    fn book(bid: f64, ask: f64) -> OrderBook {
        OrderBook {
            bids: vec![BookLevel::new(bid, 5.0)],
            asks: vec![BookLevel::new(ask, 5.0)],
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[tokio::test]
    async fn resting_buy_locks_funds_until_book_crosses() {
        let client = PaperClient::new("ETHUSDT", 1_000.0, 0.0);
        client.update_book(book(100.0, 101.0)).await;

        let order = client.buy(2.0, 100.5).await.unwrap();
        assert_eq!(order.status, OrderStatus::New);
        let base = client.base_balance().await.unwrap();
        assert!(approx(base.free, 799.0));
        assert!(approx(base.locked, 201.0));

        client.update_book(book(100.0, 100.5)).await;

        let order = client.get_order(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(approx(client.base_balance().await.unwrap().locked, 0.0));
        assert!(approx(client.all_trading_balance().await.unwrap(), 2.0));
        assert!(approx(client.last_price().await.unwrap(), 100.5));
    }

    #[tokio::test]
    async fn marketable_sell_fills_immediately() {
        let client = PaperClient::new("ETHUSDT", 0.0, 0.0);
        client.deposit_trading(3.0).await;
        client.update_book(book(100.0, 101.0)).await;

        let order = client.sell(3.0, 99.0).await.unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert!(approx(client.base_balance().await.unwrap().free, 297.0));
        assert!(approx(client.all_trading_balance().await.unwrap(), 0.0));
    }

    #[tokio::test]
    async fn insufficient_funds_are_rejected() {
        let client = PaperClient::new("ETHUSDT", 10.0, 0.0);
        client.update_book(book(100.0, 101.0)).await;

        let err = client.buy(1.0, 100.0).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));

        let err = client.sell(1.0, 100.0).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn cancel_releases_locked_funds() {
        let client = PaperClient::new("ETHUSDT", 1_000.0, 0.0);
        client.update_book(book(100.0, 101.0)).await;
        let order = client.buy(1.0, 90.0).await.unwrap();

        client.cancel_order(order.id).await.unwrap();

        let base = client.base_balance().await.unwrap();
        assert!(approx(base.free, 1_000.0));
        assert!(approx(base.locked, 0.0));
        assert_eq!(
            client.get_order(order.id).await.unwrap().status,
            OrderStatus::Canceled
        );
        assert!(client.cancel_order(order.id).await.is_err());
    }

    #[tokio::test]
    async fn panic_sell_cancels_open_orders_and_applies_slippage() {
        let client = PaperClient::new("ETHUSDT", 0.0, 10.0); // 10 bps
        client.deposit_trading(2.0).await;
        client.update_book(book(100.0, 101.0)).await;
        let resting = client.sell(2.0, 110.0).await.unwrap();

        client.panic_sell(2.0, 1000.0).await.unwrap();

        assert_eq!(
            client.get_order(resting.id).await.unwrap().status,
            OrderStatus::Canceled
        );
        let expected = 2.0 * 1000.0 * (1.0 - 10.0 / 10_000.0);
        assert!(approx(client.base_balance().await.unwrap().free, expected));
        assert!(approx(client.all_trading_balance().await.unwrap(), 0.0));
    }

    #[tokio::test]
    async fn last_price_falls_back_to_mid_and_errors_without_data() {
        let client = PaperClient::new("ETHUSDT", 0.0, 0.0);
        assert!(client.last_price().await.is_err());

        client.update_book(book(100.0, 102.0)).await;
        assert!(approx(client.last_price().await.unwrap(), 101.0));

        client.update_last_price(100.7).await;
        assert!(approx(client.last_price().await.unwrap(), 100.7));
    }

    #[tokio::test]
    async fn applies_only_events_for_its_pair() {
        let client = PaperClient::new("ETHUSDT", 0.0, 0.0);
        client
            .apply(&MarketEvent::Trade {
                pair: "BTCUSDT".into(),
                price: 50_000.0,
                timestamp: chrono::Utc::now(),
            })
            .await;
        assert!(client.last_price().await.is_err());

        client
            .apply(&MarketEvent::Book {
                pair: "ETHUSDT".into(),
                book: book(10.0, 12.0),
            })
            .await;
        assert_eq!(client.order_book(1).await.unwrap().best_ask(), Some(12.0));
    }

    #[tokio::test]
    async fn unknown_order_is_an_error() {
        let client = PaperClient::new("ETHUSDT", 0.0, 0.0);
        assert!(matches!(
            client.get_order(42).await,
            Err(Error::UnknownOrder(42))
        ));
    }
}
