use common::{OrderId, OrderSide, OrderStatus};

/// Something the trader decided or observed during a tick.
///
/// The engine only produces these; turning them into log lines, alerts or
/// metrics is up to a `TradeObserver`.
#[derive(Debug, Clone, PartialEq)]
pub enum TraderEvent {
    /// First flat tick: the momentum baseline was unknown and is now set.
    BaselineRecorded { last_price: f64 },
    /// Flat, and the market did not qualify for an entry.
    EntrySkipped { reason: SkipReason },
    BuySubmitted {
        order_id: OrderId,
        price: f64,
        quantity: f64,
        target_price: f64,
    },
    /// The buy is still open on the exchange.
    BuyPending {
        order_id: OrderId,
        status: OrderStatus,
        ticks: u32,
    },
    /// A buy stayed unfilled too long and was canceled by the trader.
    BuyAbandoned { order_id: OrderId, ticks: u32 },
    /// The exchange reports the order as canceled.
    OrderCanceled { order_id: OrderId, side: OrderSide },
    /// Filled buy kept open because the book still supports the target.
    HeldForProfit {
        best_ask: f64,
        profitable_price: f64,
        depth: usize,
    },
    SellSubmitted {
        order_id: OrderId,
        price: f64,
        quantity: f64,
        target_price: f64,
    },
    SellPending {
        order_id: OrderId,
        status: OrderStatus,
        ticks: u32,
    },
    RoundTripComplete {
        buy_order_id: OrderId,
        sell_order_id: OrderId,
    },
    /// Position state dropped without any order being sent.
    PositionCleared { reason: ClearReason },
    PanicLiquidated {
        quantity: f64,
        reference_price: f64,
        reason: LiquidationReason,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    SpreadTooThin { best_ask: f64, profitable_price: f64 },
    NoMomentum { last_price: f64, tracking_price: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClearReason {
    /// The trade currency balance is gone; nothing is left to sell.
    BalanceExhausted { order_id: OrderId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationReason {
    /// The exchange reported a status the trader has no rule for.
    UnexpectedStatus { order_id: OrderId, status: String },
    /// The sell stayed open past `sell_escalation_ticks`.
    StaleSell { order_id: OrderId, ticks: u32 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SpreadTooThin {
                best_ask,
                profitable_price,
            } => write!(f, "best ask {best_ask} below profitable price {profitable_price}"),
            SkipReason::NoMomentum {
                last_price,
                tracking_price,
            } => write!(f, "last price {last_price} not above tracked {tracking_price}"),
        }
    }
}

impl std::fmt::Display for ClearReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClearReason::BalanceExhausted { order_id } => {
                write!(f, "trading balance exhausted while tracking order {order_id}")
            }
        }
    }
}

impl std::fmt::Display for LiquidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiquidationReason::UnexpectedStatus { order_id, status } => {
                write!(f, "order {order_id} reported unexpected status {status}")
            }
            LiquidationReason::StaleSell { order_id, ticks } => {
                write!(f, "sell order {order_id} open for {ticks} ticks")
            }
        }
    }
}
