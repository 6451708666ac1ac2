use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use common::{
    AccountBalances, Error, ExchangeClient, MarketSnapshot, OrderId, OrderSide, OrderStatus,
    Result, BALANCE_EPSILON,
};

use crate::config::TraderConfig;
use crate::event::{ClearReason, LiquidationReason, SkipReason, TraderEvent};
use crate::state::{EngineState, Phase};

/// Prices derived from the top of the book for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub buy_price: f64,
    pub sell_price: f64,
    pub profitable_price: f64,
}

impl Quote {
    pub fn new(config: &TraderConfig, best_bid: f64, best_ask: f64) -> Self {
        let buy_price = best_bid + config.trade_difference;
        Self {
            buy_price,
            sell_price: best_ask - config.trade_difference,
            profitable_price: buy_price * (1.0 + config.trade_profit_percent / 100.0),
        }
    }
}

/// Order-lifecycle state machine for a single pair.
///
/// Each call to [`TraderEngine::tick`] reads a fresh snapshot, re-queries the
/// outstanding order and sends at most one order command. State is only
/// written after the exchange call it depends on has succeeded, so a failed
/// tick leaves the state exactly as it found it.
pub struct TraderEngine {
    config: TraderConfig,
    client: Arc<dyn ExchangeClient>,
    state: EngineState,
}

impl TraderEngine {
    pub fn new(config: TraderConfig, client: Arc<dyn ExchangeClient>) -> Self {
        Self::with_state(config, client, EngineState::default())
    }

    pub fn with_state(
        config: TraderConfig,
        client: Arc<dyn ExchangeClient>,
        state: EngineState,
    ) -> Self {
        Self {
            config,
            client,
            state,
        }
    }

    pub fn pair(&self) -> &str {
        self.client.pair()
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Read the market and balances for this tick.
    pub async fn snapshot(&self) -> Result<MarketSnapshot> {
        let client = &self.client;
        let (book, last_price, account) = tokio::try_join!(
            client.order_book(self.config.order_book_depth),
            client.last_price(),
            client.balances(),
        )?;
        let AccountBalances { trading, base } = account;

        let pair = self.pair();
        let best_bid = book
            .best_bid()
            .ok_or_else(|| Error::Parse(format!("{pair}: order book has no bids")))?;
        let best_ask = book
            .best_ask()
            .ok_or_else(|| Error::Parse(format!("{pair}: order book has no asks")))?;
        for (field, value) in [
            ("best bid", best_bid),
            ("best ask", best_ask),
            ("last price", last_price),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Parse(format!("{pair}: {field} is {value}")));
            }
        }

        debug!(
            pair = %pair,
            base = %self.config.base_currency,
            base_free = base.free,
            trading_free = trading.free,
            trading_locked = trading.locked,
            "Balances"
        );

        Ok(MarketSnapshot {
            best_bid,
            best_ask,
            last_price,
            bids: book.bids,
            asks: book.asks,
            trading_balance_free: trading.free,
            trading_balance_locked: trading.locked,
            base_balance_free: base.free,
            total_trading_balance: trading.total(),
            taken_at: Utc::now(),
        })
    }

    /// Run one decision cycle.
    pub async fn tick(&mut self) -> Result<Vec<TraderEvent>> {
        let snapshot = self.snapshot().await?;
        let quote = Quote::new(&self.config, snapshot.best_bid, snapshot.best_ask);
        let mut events = Vec::new();

        match self.state.phase() {
            Phase::NoPosition => self.try_enter(&snapshot, &quote, &mut events).await?,
            Phase::PendingBuy {
                buy_order_id,
                target_price,
            }
            | Phase::Holding {
                buy_order_id,
                target_price,
            } => {
                self.manage_buy(buy_order_id, target_price, &snapshot, &quote, &mut events)
                    .await?
            }
            Phase::PendingSell {
                buy_order_id,
                sell_order_id,
                ..
            } => {
                self.manage_sell(buy_order_id, sell_order_id, &snapshot, &quote, &mut events)
                    .await?
            }
        }

        Ok(events)
    }

    async fn try_enter(
        &mut self,
        snapshot: &MarketSnapshot,
        quote: &Quote,
        events: &mut Vec<TraderEvent>,
    ) -> Result<()> {
        let last_price = snapshot.last_price;
        let Some(tracking_price) = self.state.tracking_last_price else {
            self.state.tracking_last_price = Some(last_price);
            events.push(TraderEvent::BaselineRecorded { last_price });
            return Ok(());
        };

        let skip = if snapshot.best_ask < quote.profitable_price {
            Some(SkipReason::SpreadTooThin {
                best_ask: snapshot.best_ask,
                profitable_price: quote.profitable_price,
            })
        } else if last_price <= tracking_price {
            Some(SkipReason::NoMomentum {
                last_price,
                tracking_price,
            })
        } else {
            None
        };

        match skip {
            Some(reason) => events.push(TraderEvent::EntrySkipped { reason }),
            None => {
                let quantity = self.config.trade_amount;
                let order = self.client.buy(quantity, quote.buy_price).await?;
                self.state.phase = Phase::PendingBuy {
                    buy_order_id: order.id,
                    target_price: quote.profitable_price,
                };
                self.state.panic_buy_counter = 0;
                self.state.panic_sell_counter = 0;
                events.push(TraderEvent::BuySubmitted {
                    order_id: order.id,
                    price: quote.buy_price,
                    quantity,
                    target_price: quote.profitable_price,
                });
            }
        }

        self.state.tracking_last_price = Some(last_price);
        Ok(())
    }

    async fn manage_buy(
        &mut self,
        buy_order_id: OrderId,
        target_price: f64,
        snapshot: &MarketSnapshot,
        quote: &Quote,
        events: &mut Vec<TraderEvent>,
    ) -> Result<()> {
        let order = self.client.get_order(buy_order_id).await?;

        match order.status {
            OrderStatus::Canceled => {
                self.state.clear();
                events.push(TraderEvent::OrderCanceled {
                    order_id: buy_order_id,
                    side: OrderSide::Buy,
                });
            }
            OrderStatus::New => {
                let ticks = self.state.panic_buy_counter + 1;
                if ticks > self.config.buy_cancel_ticks {
                    self.client.cancel_order(buy_order_id).await?;
                    self.state.clear();
                    events.push(TraderEvent::BuyAbandoned {
                        order_id: buy_order_id,
                        ticks,
                    });
                } else {
                    self.state.panic_buy_counter = ticks;
                    events.push(TraderEvent::BuyPending {
                        order_id: buy_order_id,
                        status: OrderStatus::New,
                        ticks,
                    });
                }
            }
            OrderStatus::PartiallyFilled => {
                events.push(TraderEvent::BuyPending {
                    order_id: buy_order_id,
                    status: OrderStatus::PartiallyFilled,
                    ticks: self.state.panic_buy_counter,
                });
            }
            OrderStatus::Filled => {
                self.evaluate_exit(buy_order_id, target_price, snapshot, quote, events)
                    .await?
            }
            OrderStatus::Other(status) => {
                let reason = LiquidationReason::UnexpectedStatus {
                    order_id: buy_order_id,
                    status,
                };
                self.liquidate(buy_order_id, reason, snapshot.best_bid, snapshot, events)
                    .await?
            }
        }

        Ok(())
    }

    /// The buy is filled: keep holding while the book confirms the target,
    /// otherwise put the sell up.
    async fn evaluate_exit(
        &mut self,
        buy_order_id: OrderId,
        target_price: f64,
        snapshot: &MarketSnapshot,
        quote: &Quote,
        events: &mut Vec<TraderEvent>,
    ) -> Result<()> {
        if snapshot.total_trading_balance < BALANCE_EPSILON {
            self.state.clear();
            events.push(TraderEvent::PositionCleared {
                reason: ClearReason::BalanceExhausted {
                    order_id: buy_order_id,
                },
            });
            return Ok(());
        }

        let depth = snapshot
            .bids
            .iter()
            .filter(|level| level.price >= quote.profitable_price)
            .count();

        if snapshot.best_ask >= quote.profitable_price && depth > self.config.depth_confirmations
        {
            self.state.phase = Phase::Holding {
                buy_order_id,
                target_price,
            };
            events.push(TraderEvent::HeldForProfit {
                best_ask: snapshot.best_ask,
                profitable_price: quote.profitable_price,
                depth,
            });
            return Ok(());
        }

        let quantity = self.config.trade_amount;
        let order = self.client.sell(quantity, quote.sell_price).await?;
        self.state.phase = Phase::PendingSell {
            buy_order_id,
            sell_order_id: order.id,
            target_price,
        };
        self.state.panic_sell_counter = 0;
        events.push(TraderEvent::SellSubmitted {
            order_id: order.id,
            price: quote.sell_price,
            quantity,
            target_price,
        });
        Ok(())
    }

    async fn manage_sell(
        &mut self,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        snapshot: &MarketSnapshot,
        quote: &Quote,
        events: &mut Vec<TraderEvent>,
    ) -> Result<()> {
        let order = self.client.get_order(sell_order_id).await?;

        match order.status {
            OrderStatus::Filled => {
                self.state.clear();
                events.push(TraderEvent::RoundTripComplete {
                    buy_order_id,
                    sell_order_id,
                });
            }
            OrderStatus::Canceled => {
                self.state.clear();
                events.push(TraderEvent::OrderCanceled {
                    order_id: sell_order_id,
                    side: OrderSide::Sell,
                });
            }
            OrderStatus::Other(status) => {
                let reason = LiquidationReason::UnexpectedStatus {
                    order_id: sell_order_id,
                    status,
                };
                self.liquidate(sell_order_id, reason, snapshot.best_bid, snapshot, events)
                    .await?
            }
            status @ (OrderStatus::New | OrderStatus::PartiallyFilled) => {
                if snapshot.total_trading_balance < BALANCE_EPSILON {
                    self.state.clear();
                    events.push(TraderEvent::PositionCleared {
                        reason: ClearReason::BalanceExhausted {
                            order_id: sell_order_id,
                        },
                    });
                    return Ok(());
                }

                let ticks = self.state.panic_sell_counter + 1;
                match self.config.sell_escalation_ticks {
                    Some(limit) if ticks > limit => {
                        let reason = LiquidationReason::StaleSell {
                            order_id: sell_order_id,
                            ticks,
                        };
                        let reference_price = quote.profitable_price;
                        self.liquidate(sell_order_id, reason, reference_price, snapshot, events)
                            .await?
                    }
                    _ => {
                        self.state.panic_sell_counter = ticks;
                        events.push(TraderEvent::SellPending {
                            order_id: sell_order_id,
                            status,
                            ticks,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Dump the whole known trading balance and return to `NoPosition`.
    async fn liquidate(
        &mut self,
        order_id: OrderId,
        reason: LiquidationReason,
        reference_price: f64,
        snapshot: &MarketSnapshot,
        events: &mut Vec<TraderEvent>,
    ) -> Result<()> {
        let quantity = snapshot.total_trading_balance;
        if quantity < BALANCE_EPSILON {
            self.state.clear();
            events.push(TraderEvent::PositionCleared {
                reason: ClearReason::BalanceExhausted { order_id },
            });
            return Ok(());
        }

        self.client.panic_sell(quantity, reference_price).await?;
        self.state.clear();
        events.push(TraderEvent::PanicLiquidated {
            quantity,
            reference_price,
            reason,
        });
        Ok(())
    }
}
