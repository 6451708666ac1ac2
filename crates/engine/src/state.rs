use common::OrderId;

/// Where the trader stands in the buy → hold → sell round trip.
///
/// Each variant carries exactly the ids it needs, so a pending buy and a
/// pending sell can never coexist and the target price exists exactly when a
/// buy order does.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Phase {
    #[default]
    NoPosition,
    PendingBuy {
        buy_order_id: OrderId,
        target_price: f64,
    },
    /// The buy filled; waiting for the market to stop supporting the target.
    Holding {
        buy_order_id: OrderId,
        target_price: f64,
    },
    PendingSell {
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        target_price: f64,
    },
}

/// Mutable position state of one trader. Owned by a single `TraderEngine`
/// and only changed inside `tick()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    pub(crate) phase: Phase,
    pub(crate) panic_buy_counter: u32,
    pub(crate) panic_sell_counter: u32,
    /// Last price seen while flat. `None` until the first flat tick.
    pub(crate) tracking_last_price: Option<f64>,
}

impl EngineState {
    /// Fresh state whose momentum baseline is already known.
    pub fn with_tracking_price(price: f64) -> Self {
        Self {
            tracking_last_price: Some(price),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_buy_order_id(&self) -> Option<OrderId> {
        match self.phase {
            Phase::NoPosition => None,
            Phase::PendingBuy { buy_order_id, .. }
            | Phase::Holding { buy_order_id, .. }
            | Phase::PendingSell { buy_order_id, .. } => Some(buy_order_id),
        }
    }

    pub fn current_sell_order_id(&self) -> Option<OrderId> {
        match self.phase {
            Phase::PendingSell { sell_order_id, .. } => Some(sell_order_id),
            _ => None,
        }
    }

    /// The profitable price recorded when the buy was submitted.
    pub fn currently_bought_price(&self) -> Option<f64> {
        match self.phase {
            Phase::NoPosition => None,
            Phase::PendingBuy { target_price, .. }
            | Phase::Holding { target_price, .. }
            | Phase::PendingSell { target_price, .. } => Some(target_price),
        }
    }

    pub fn panic_buy_counter(&self) -> u32 {
        self.panic_buy_counter
    }

    pub fn panic_sell_counter(&self) -> u32 {
        self.panic_sell_counter
    }

    pub fn tracking_last_price(&self) -> Option<f64> {
        self.tracking_last_price
    }

    pub fn is_flat(&self) -> bool {
        self.phase == Phase::NoPosition
    }

    /// Back to `NoPosition`. The momentum baseline survives.
    pub(crate) fn clear(&mut self) {
        self.phase = Phase::NoPosition;
        self.panic_buy_counter = 0;
        self.panic_sell_counter = 0;
    }
}
