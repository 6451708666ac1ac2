pub mod binance;
pub mod config;
pub mod event;
pub mod lifecycle;
#[cfg(test)]
mod mock;
pub mod observer;
pub mod state;
pub mod trader;

pub use binance::{BinanceClient, BinanceStream};
pub use config::{TraderConfig, TraderFileConfig};
pub use event::{ClearReason, LiquidationReason, SkipReason, TraderEvent};
pub use lifecycle::{Scheduler, SchedulerHandle};
pub use observer::{LogObserver, TradeObserver};
pub use state::{EngineState, Phase};
pub use trader::{Quote, TraderEngine};
