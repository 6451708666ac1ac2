use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use common::{
    AccountBalances, Balance, BookLevel, Error, ExchangeClient, Order, OrderBook, OrderId,
    OrderSide, OrderStatus, Result,
};

use crate::config::TraderConfig;

const RECV_WINDOW_MS: u64 = 5000;

/// Signed REST client for one Binance spot pair.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
    pair: String,
    trade_asset: String,
    base_asset: String,
    price_precision: u32,
    quantity_precision: u32,
}

impl BinanceClient {
    pub fn new(
        config: &TraderConfig,
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            pair: config.pair(),
            trade_asset: config.trade_currency.to_uppercase(),
            base_asset: config.base_currency.to_uppercase(),
            price_precision: config.price_precision,
            quantity_precision: config.quantity_precision,
        })
    }

    fn timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn sign(&self, query: &str) -> Result<String> {
        sign_query(&self.secret, query)
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{params}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed(&self, method: Method, path: &str, params: &str) -> Result<String> {
        let ts = Self::timestamp_ms();
        let query = if params.is_empty() {
            format!("recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        } else {
            format!("{params}&recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        let signed_query = format!("{query}&signature={signature}");

        let request = if method == Method::POST {
            self.http
                .post(format!("{}{path}", self.base_url))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(signed_query)
        } else {
            self.http
                .request(method, format!("{}{path}?{signed_query}", self.base_url))
        };

        let resp = request
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn account(&self) -> Result<AccountResponse> {
        let body = self.signed(Method::GET, "/api/v3/account", "").await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn place_limit(&self, side: OrderSide, quantity: f64, price: f64) -> Result<Order> {
        let quantity = format_quantity(quantity, self.quantity_precision);
        let price = format_price(price, self.price_precision);
        let params = format!(
            "symbol={}&side={side}&type=LIMIT&timeInForce=GTC&quantity={quantity}&price={price}&newClientOrderId={}",
            self.pair,
            client_order_id()
        );

        debug!(
            pair = %self.pair,
            side = %side,
            %quantity,
            %price,
            "Submitting limit order to Binance"
        );
        let body = self.signed(Method::POST, "/api/v3/order", &params).await?;
        parse_order(&body)
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn pair(&self) -> &str {
        &self.pair
    }

    async fn last_price(&self) -> Result<f64> {
        let body = self
            .public_get("/api/v3/ticker/price", &format!("symbol={}", self.pair))
            .await?;
        let ticker: PriceTicker = serde_json::from_str(&body)?;
        Error::parse_f64("price", &ticker.price)
    }

    async fn order_book(&self, depth: usize) -> Result<OrderBook> {
        let body = self
            .public_get(
                "/api/v3/depth",
                &format!("symbol={}&limit={}", self.pair, depth_limit(depth)),
            )
            .await?;
        let mut book = parse_depth(&body)?;
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }

    async fn trading_balance(&self) -> Result<Balance> {
        asset_balance(&self.account().await?, &self.trade_asset)
    }

    async fn base_balance(&self) -> Result<Balance> {
        asset_balance(&self.account().await?, &self.base_asset)
    }

    async fn all_trading_balance(&self) -> Result<f64> {
        Ok(self.trading_balance().await?.total())
    }

    async fn balances(&self) -> Result<AccountBalances> {
        let account = self.account().await?;
        Ok(AccountBalances {
            trading: asset_balance(&account, &self.trade_asset)?,
            base: asset_balance(&account, &self.base_asset)?,
        })
    }

    async fn buy(&self, quantity: f64, price: f64) -> Result<Order> {
        self.place_limit(OrderSide::Buy, quantity, price).await
    }

    async fn sell(&self, quantity: f64, price: f64) -> Result<Order> {
        self.place_limit(OrderSide::Sell, quantity, price).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        let params = format!("symbol={}&orderId={id}", self.pair);
        let body = self.signed(Method::GET, "/api/v3/order", &params).await?;
        parse_order(&body)
    }

    async fn cancel_order(&self, id: OrderId) -> Result<()> {
        let params = format!("symbol={}&orderId={id}", self.pair);
        self.signed(Method::DELETE, "/api/v3/order", &params).await?;
        info!(pair = %self.pair, order_id = id, "Order canceled");
        Ok(())
    }

    async fn panic_sell(&self, quantity: f64, reference_price: f64) -> Result<()> {
        let symbol = format!("symbol={}", self.pair);
        if let Err(e) = self
            .signed(Method::DELETE, "/api/v3/openOrders", &symbol)
            .await
        {
            warn!(pair = %self.pair, error = %e, "Could not cancel open orders before liquidation");
        }

        let quantity = format_quantity(quantity, self.quantity_precision);
        let params = format!(
            "{symbol}&side=SELL&type=MARKET&quantity={quantity}&newClientOrderId={}",
            client_order_id()
        );
        warn!(pair = %self.pair, %quantity, reference_price, "Submitting market sell");
        self.signed(Method::POST, "/api/v3/order", &params).await?;
        Ok(())
    }
}

fn sign_query(secret: &str, query: &str) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("invalid API secret: {e}")))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn client_order_id() -> String {
    format!("sc-{}", uuid::Uuid::new_v4().simple())
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    check_status(status, body)
}

fn check_status(status: StatusCode, body: String) -> Result<String> {
    match status.as_u16() {
        _ if status.is_success() => Ok(body),
        429 | 418 => Err(Error::RateLimited(body)),
        401 | 403 => Err(Error::Auth(body)),
        code => Err(Error::Exchange { status: code, body }),
    }
}

/// Binance only serves a fixed set of depth limits.
fn depth_limit(depth: usize) -> usize {
    [5, 10, 20, 50, 100, 500, 1000, 5000]
        .into_iter()
        .find(|&limit| limit >= depth)
        .unwrap_or(5000)
}

fn format_price(price: f64, precision: u32) -> String {
    format!("{:.*}", precision as usize, price)
}

/// Quantities are rounded down so the order never exceeds the balance.
fn format_quantity(quantity: f64, precision: u32) -> String {
    let factor = 10f64.powi(precision as i32);
    let floored = (quantity * factor + 1e-9).floor() / factor;
    format!("{:.*}", precision as usize, floored)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

#[derive(Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: u64,
    side: String,
    status: String,
    price: String,
    orig_qty: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<AssetBalance>,
}

#[derive(Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
    locked: String,
}

pub(crate) fn parse_levels(raw: &[[String; 2]]) -> Result<Vec<BookLevel>> {
    raw.iter()
        .map(|[price, qty]| -> Result<BookLevel> {
            Ok(BookLevel::new(
                Error::parse_f64("level price", price)?,
                Error::parse_f64("level quantity", qty)?,
            ))
        })
        .collect()
}

fn parse_depth(body: &str) -> Result<OrderBook> {
    let depth: DepthResponse = serde_json::from_str(body)?;
    Ok(OrderBook {
        bids: parse_levels(&depth.bids)?,
        asks: parse_levels(&depth.asks)?,
    })
}

fn parse_order(body: &str) -> Result<Order> {
    let resp: OrderResponse = serde_json::from_str(body)?;
    let side = match resp.side.as_str() {
        "BUY" => OrderSide::Buy,
        "SELL" => OrderSide::Sell,
        other => return Err(Error::Parse(format!("order side '{other}'"))),
    };
    Ok(Order {
        id: resp.order_id,
        pair: resp.symbol,
        side,
        status: OrderStatus::from_exchange(&resp.status),
        price: Error::parse_f64("order price", &resp.price)?,
        quantity: Error::parse_f64("order quantity", &resp.orig_qty)?,
    })
}

/// A missing asset means nothing is held.
fn asset_balance(account: &AccountResponse, asset: &str) -> Result<Balance> {
    match account.balances.iter().find(|b| b.asset == asset) {
        Some(b) => Ok(Balance {
            free: Error::parse_f64("free balance", &b.free)?,
            locked: Error::parse_f64("locked balance", &b.locked)?,
        }),
        None => Ok(Balance::default()),
    }
}
