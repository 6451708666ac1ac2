//! Scriptable in-memory exchange used by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use common::{
    AccountBalances, Balance, BookLevel, Error, ExchangeClient, Order, OrderBook, OrderId,
    OrderSide, OrderStatus, Result,
};

/// Order commands the trader sent, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Buy { quantity: f64, price: f64 },
    Sell { quantity: f64, price: f64 },
    Cancel(OrderId),
    PanicSell { quantity: f64, reference_price: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    OrderBook,
    Buy,
    Sell,
    GetOrder,
    Cancel,
    PanicSell,
}

struct Inner {
    book: OrderBook,
    last_price: f64,
    trading: Balance,
    base: Balance,
    orders: HashMap<OrderId, Order>,
    next_id: OrderId,
    calls: Vec<Call>,
    account_reads: usize,
    failing: Option<Op>,
}

pub struct MockExchange {
    inner: Mutex<Inner>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                book: OrderBook {
                    bids: vec![BookLevel::new(100.0, 5.0)],
                    asks: vec![BookLevel::new(101.2, 5.0)],
                },
                last_price: 100.5,
                trading: Balance {
                    free: 10.0,
                    locked: 0.0,
                },
                base: Balance {
                    free: 5_000.0,
                    locked: 0.0,
                },
                orders: HashMap::new(),
                next_id: 1,
                calls: Vec::new(),
                account_reads: 0,
                failing: None,
            }),
        }
    }

    pub fn set_book(&self, bids: &[f64], asks: &[f64]) {
        let level = |p: &f64| BookLevel::new(*p, 1.0);
        self.inner.lock().unwrap().book = OrderBook {
            bids: bids.iter().map(level).collect(),
            asks: asks.iter().map(level).collect(),
        };
    }

    pub fn set_last_price(&self, price: f64) {
        self.inner.lock().unwrap().last_price = price;
    }

    pub fn set_trading_balance(&self, free: f64, locked: f64) {
        self.inner.lock().unwrap().trading = Balance { free, locked };
    }

    pub fn set_status(&self, id: OrderId, status: OrderStatus) {
        if let Some(order) = self.inner.lock().unwrap().orders.get_mut(&id) {
            order.status = status;
        }
    }

    pub fn fail_on(&self, op: Option<Op>) {
        self.inner.lock().unwrap().failing = op;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn account_reads(&self) -> usize {
        self.inner.lock().unwrap().account_reads
    }

    fn check(&self, op: Op) -> Result<()> {
        if self.inner.lock().unwrap().failing == Some(op) {
            return Err(Error::Http(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn submit(&self, side: OrderSide, quantity: f64, price: f64) -> Order {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        let order = Order {
            id,
            pair: "TESTPAIR".into(),
            side,
            status: OrderStatus::New,
            price,
            quantity,
        };
        inner.orders.insert(id, order.clone());
        inner.calls.push(match side {
            OrderSide::Buy => Call::Buy { quantity, price },
            OrderSide::Sell => Call::Sell { quantity, price },
        });
        order
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn pair(&self) -> &str {
        "TESTPAIR"
    }

    async fn last_price(&self) -> Result<f64> {
        Ok(self.inner.lock().unwrap().last_price)
    }

    async fn order_book(&self, _depth: usize) -> Result<OrderBook> {
        self.check(Op::OrderBook)?;
        Ok(self.inner.lock().unwrap().book.clone())
    }

    async fn trading_balance(&self) -> Result<Balance> {
        Ok(self.inner.lock().unwrap().trading)
    }

    async fn base_balance(&self) -> Result<Balance> {
        Ok(self.inner.lock().unwrap().base)
    }

    async fn all_trading_balance(&self) -> Result<f64> {
        Ok(self.inner.lock().unwrap().trading.total())
    }

    async fn balances(&self) -> Result<AccountBalances> {
        let mut inner = self.inner.lock().unwrap();
        inner.account_reads += 1;
        Ok(AccountBalances {
            trading: inner.trading,
            base: inner.base,
        })
    }

    async fn buy(&self, quantity: f64, price: f64) -> Result<Order> {
        self.check(Op::Buy)?;
        Ok(self.submit(OrderSide::Buy, quantity, price))
    }

    async fn sell(&self, quantity: f64, price: f64) -> Result<Order> {
        self.check(Op::Sell)?;
        Ok(self.submit(OrderSide::Sell, quantity, price))
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.check(Op::GetOrder)?;
        self.inner
            .lock()
            .unwrap()
            .orders
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownOrder(id))
    }

    async fn cancel_order(&self, id: OrderId) -> Result<()> {
        self.check(Op::Cancel)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(&id) {
            order.status = OrderStatus::Canceled;
        }
        inner.calls.push(Call::Cancel(id));
        Ok(())
    }

    async fn panic_sell(&self, quantity: f64, reference_price: f64) -> Result<()> {
        self.check(Op::PanicSell)?;
        self.inner.lock().unwrap().calls.push(Call::PanicSell {
            quantity,
            reference_price,
        });
        Ok(())
    }
}
