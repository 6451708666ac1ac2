use std::sync::Arc;

use proptest::prelude::*;

use common::{BookLevel, ExchangeClient, OrderBook};
use engine::{EngineState, Quote, TraderConfig, TraderEngine};
use paper::PaperClient;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// A flat trader buys at bid + difference exactly when the spread covers
    /// the profit target and the last price moved up.
    #[test]
    fn entry_follows_spread_and_momentum(
        best_bid in 0.0001f64..100_000.0f64,
        spread_pct in 0.0f64..5.0f64,
        trade_difference in 0.0f64..1.0f64,
        profit_percent in 0.0f64..3.0f64,
        tracking in 0.0001f64..100_000.0f64,
        last in 0.0001f64..100_000.0f64,
    ) {
        let best_ask = best_bid * (1.0 + spread_pct / 100.0) + 0.0001;
        let config = TraderConfig::new("USDT", "TEST", trade_difference, profit_percent, 1.0);
        let quote = Quote::new(&config, best_bid, best_ask);
        let should_buy = best_ask >= quote.profitable_price && last > tracking;

        let (buy_price, state) = runtime().block_on(async {
            let paper = Arc::new(PaperClient::new(config.pair(), 1e12, 0.0));
            paper.update_book(OrderBook {
                bids: vec![BookLevel::new(best_bid, 1.0)],
                asks: vec![BookLevel::new(best_ask, 1.0)],
            }).await;
            paper.update_last_price(last).await;

            let mut engine = TraderEngine::with_state(
                config.clone(),
                paper.clone(),
                EngineState::with_tracking_price(tracking),
            );
            engine.tick().await.unwrap();

            let state = engine.state().clone();
            let buy_price = match state.current_buy_order_id() {
                Some(id) => Some(paper.get_order(id).await.unwrap().price),
                None => None,
            };
            (buy_price, state)
        });

        prop_assert_eq!(buy_price.is_some(), should_buy);
        if let Some(price) = buy_price {
            prop_assert_eq!(price, quote.buy_price);
            prop_assert_eq!(state.currently_bought_price(), Some(quote.profitable_price));
            prop_assert_eq!(state.panic_buy_counter(), 0);
            prop_assert_eq!(state.panic_sell_counter(), 0);
        }
        prop_assert_eq!(state.tracking_last_price(), Some(last));
    }

    /// Whatever the market does, the trader never has a buy and a sell
    /// resting at the same time.
    #[test]
    fn never_holds_two_open_orders(
        walk in prop::collection::vec((0.5f64..1.5f64, 0.0f64..0.02f64), 1..40),
    ) {
        runtime().block_on(async {
            let config = TraderConfig {
                buy_cancel_ticks: 3,
                sell_escalation_ticks: Some(5),
                ..TraderConfig::new("USDT", "TEST", 0.01, 0.5, 2.0)
            };
            let paper = Arc::new(PaperClient::new(config.pair(), 1e9, 10.0));
            let mut engine = TraderEngine::new(config, paper.clone());

            for (factor, spread) in walk {
                let bid = 100.0 * factor;
                paper.update_book(OrderBook {
                    bids: vec![BookLevel::new(bid, 1.0)],
                    asks: vec![BookLevel::new(bid * (1.0 + spread) + 0.001, 1.0)],
                }).await;
                paper.update_last_price(bid).await;

                engine.tick().await.unwrap();

                let base = paper.base_balance().await.unwrap();
                let trading = paper.trading_balance().await.unwrap();
                assert!(
                    base.locked < 1e-6 || trading.locked < 1e-9,
                    "buy and sell both open: {base:?} {trading:?}"
                );
                assert!(base.free >= 0.0 && trading.free >= 0.0);
            }
        });
    }
}
