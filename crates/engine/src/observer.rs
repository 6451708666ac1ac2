use tracing::{error, info, warn};

use common::Error;

use crate::event::TraderEvent;

/// Receives everything a scheduler's trader produces.
pub trait TradeObserver: Send {
    fn on_event(&mut self, pair: &str, event: &TraderEvent);

    fn on_tick_error(&mut self, pair: &str, error: &Error);
}

/// Writes every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TradeObserver for LogObserver {
    fn on_event(&mut self, pair: &str, event: &TraderEvent) {
        match event {
            TraderEvent::BaselineRecorded { last_price } => {
                info!(pair = %pair, last_price, "Momentum baseline recorded")
            }
            TraderEvent::EntrySkipped { reason } => {
                info!(pair = %pair, reason = %reason, "No entry")
            }
            TraderEvent::BuySubmitted {
                order_id,
                price,
                quantity,
                target_price,
            } => info!(
                pair = %pair,
                order_id,
                price,
                quantity,
                target_price,
                "Buy submitted"
            ),
            TraderEvent::BuyPending {
                order_id,
                status,
                ticks,
            } => info!(pair = %pair, order_id, status = %status, ticks, "Waiting for buy"),
            TraderEvent::BuyAbandoned { order_id, ticks } => {
                warn!(pair = %pair, order_id, ticks, "Buy never filled, canceled")
            }
            TraderEvent::OrderCanceled { order_id, side } => {
                warn!(pair = %pair, order_id, side = %side, "Order was canceled, cleaning up")
            }
            TraderEvent::HeldForProfit {
                best_ask,
                profitable_price,
                depth,
            } => info!(
                pair = %pair,
                best_ask,
                profitable_price,
                depth,
                "Still profitable, holding"
            ),
            TraderEvent::SellSubmitted {
                order_id,
                price,
                quantity,
                target_price,
            } => info!(
                pair = %pair,
                order_id,
                price,
                quantity,
                target_price,
                "Sell submitted"
            ),
            TraderEvent::SellPending {
                order_id,
                status,
                ticks,
            } => info!(pair = %pair, order_id, status = %status, ticks, "Waiting to sell"),
            TraderEvent::RoundTripComplete {
                buy_order_id,
                sell_order_id,
            } => info!(pair = %pair, buy_order_id, sell_order_id, "Round trip complete"),
            TraderEvent::PositionCleared { reason } => {
                warn!(pair = %pair, reason = %reason, "Position cleared")
            }
            TraderEvent::PanicLiquidated {
                quantity,
                reference_price,
                reason,
            } => error!(
                pair = %pair,
                quantity,
                reference_price,
                reason = %reason,
                "Emergency liquidation"
            ),
        }
    }

    fn on_tick_error(&mut self, pair: &str, error: &Error) {
        error!(pair = %pair, error = %error, "Unable to perform tick");
    }
}
