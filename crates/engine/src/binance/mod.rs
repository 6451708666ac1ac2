pub mod rest;
pub mod stream;

pub use rest::BinanceClient;
pub use stream::BinanceStream;
