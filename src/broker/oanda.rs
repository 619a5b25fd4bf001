//! OANDA v3 REST brokerage client.
//! Mission: turn HTTP into the `Broker` contract, nothing more.
//!
//! Grounded in the teacher's `scrapers/polymarket_api.rs`: a `reqwest::Client`
//! built once with a timeout and user agent, an exponential-backoff retry
//! helper, and `anyhow::Context` for error narration.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use crate::domain::{Fill, Instrument, InstrumentId, OpenTrade, Quote};

use super::Broker;

const PRACTICE_BASE: &str = "https://api-fxpractice.oanda.com/v3";
const LIVE_BASE: &str = "https://api-fxtrade.oanda.com/v3";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;
const FALLBACK_BALANCE: f64 = 10_000.0;

pub struct OandaClient {
    client: Client,
    base_url: String,
    account_id: String,
}

impl OandaClient {
    pub fn new(api_key: &str, account_id: &str, practice: bool) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("arbitrader/0.1 (FX Arbitrage Engine)")
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                let mut auth = reqwest::header::HeaderValue::from_str(&format!(
                    "Bearer {api_key}"
                ))
                .expect("api key must be a valid header value");
                auth.set_sensitive(true);
                headers.insert(reqwest::header::AUTHORIZATION, auth);
                headers
            })
            .build()
            .expect("failed to build OANDA HTTP client");

        Self {
            client,
            base_url: if practice { PRACTICE_BASE } else { LIVE_BASE }.to_string(),
            account_id: account_id.to_string(),
        }
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff = INITIAL_BACKOFF_MS;
        for attempt in 0..MAX_RETRIES {
            match timeout(Duration::from_secs(10), self.client.get(url).send()).await {
                Ok(Ok(response)) => {
                    if response.status().is_success() {
                        return Ok(response);
                    } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        warn!("rate limited on attempt {}, backing off", attempt + 1);
                        sleep(Duration::from_millis(backoff * 10)).await;
                    } else {
                        let status = response.status();
                        let text = response.text().await.unwrap_or_default();
                        bail!("OANDA API error {status}: {text}");
                    }
                }
                Ok(Err(e)) => warn!("request failed (attempt {}): {e}", attempt + 1),
                Err(_) => warn!("request timeout (attempt {})", attempt + 1),
            }
            if attempt < MAX_RETRIES - 1 {
                sleep(Duration::from_millis(backoff)).await;
                backoff = (backoff * 2).min(5_000);
            }
        }
        bail!("max retries exceeded for {url}")
    }
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    account: AccountSummary,
}

#[derive(Debug, Deserialize)]
struct AccountSummary {
    balance: String,
}

#[derive(Debug, Deserialize)]
struct InstrumentsResponse {
    instruments: Vec<RawInstrument>,
}

#[derive(Debug, Deserialize)]
struct RawInstrument {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<Candle>,
}

#[derive(Debug, Deserialize)]
struct Candle {
    time: String,
    bid: PriceComponent,
    ask: PriceComponent,
    mid: PriceComponent,
}

#[derive(Debug, Deserialize)]
struct PriceComponent {
    c: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(rename = "orderFillTransaction")]
    order_fill_transaction: Option<FillTransaction>,
}

#[derive(Debug, Deserialize)]
struct FillTransaction {
    price: String,
    units: String,
}

#[derive(Debug, Deserialize)]
struct OpenTradesResponse {
    trades: Vec<RawTrade>,
}

#[derive(Debug, Deserialize)]
struct RawTrade {
    id: String,
    instrument: String,
    #[serde(rename = "currentUnits")]
    current_units: String,
    price: String,
}

#[async_trait]
impl Broker for OandaClient {
    async fn get_balance(&self) -> f64 {
        let url = format!("{}/accounts/{}/summary", self.base_url, self.account_id);
        match self.get_with_retry(&url).await {
            Ok(resp) => match resp.json::<SummaryResponse>().await {
                Ok(body) => body.account.balance.parse().unwrap_or(FALLBACK_BALANCE),
                Err(e) => {
                    warn!("failed to parse account summary: {e}, using fallback balance");
                    FALLBACK_BALANCE
                }
            },
            Err(e) => {
                warn!("failed to fetch balance: {e}, using fallback balance");
                FALLBACK_BALANCE
            }
        }
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let url = format!(
            "{}/accounts/{}/instruments",
            self.base_url, self.account_id
        );
        let resp = self
            .get_with_retry(&url)
            .await
            .context("failed to fetch instrument catalog")?;
        let body: InstrumentsResponse = resp
            .json()
            .await
            .context("failed to parse instrument catalog")?;

        Ok(body
            .instruments
            .into_iter()
            .filter(|i| i.kind == "CURRENCY")
            .map(|i| Instrument {
                name: i.name,
                kind: i.kind,
            })
            .collect())
    }

    async fn get_quote(&self, id: InstrumentId) -> Option<Quote> {
        let url = format!(
            "{}/instruments/{}/candles?count=1&price=MBA&granularity=S5",
            self.base_url,
            id.name()
        );
        let resp = match self.get_with_retry(&url).await {
            Ok(r) => r,
            Err(e) => {
                debug!("transient quote error for {id}: {e}");
                return None;
            }
        };
        let body: CandlesResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                debug!("quote parse miss for {id}: {e}");
                return None;
            }
        };
        let candle = body.candles.first()?;
        let bid: f64 = candle.bid.c.parse().ok()?;
        let ask: f64 = candle.ask.c.parse().ok()?;
        let mid: f64 = candle.mid.c.parse().ok()?;
        let timestamp: DateTime<Utc> = candle.time.parse().ok()?;
        Some(Quote {
            bid,
            ask,
            mid,
            spread: ask - bid,
            timestamp,
            synthetic: false,
        })
    }

    async fn place_market_order(&self, id: InstrumentId, units: f64) -> Option<Fill> {
        let url = format!("{}/accounts/{}/orders", self.base_url, self.account_id);
        let body = serde_json::json!({
            "order": {
                "units": units.trunc().to_string(),
                "instrument": id.name(),
                "timeInForce": "FOK",
                "type": "MARKET",
                "positionFill": "DEFAULT",
            }
        });

        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("order submission failed for {id}: {e}");
                return None;
            }
        };

        if resp.status() != StatusCode::CREATED {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("order rejected for {id}: {status} {text}");
            return None;
        }

        let parsed: OrderResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                error!("failed to parse order response for {id}: {e}");
                return None;
            }
        };
        let fill_txn = parsed.order_fill_transaction?;
        let price: f64 = fill_txn.price.parse().ok()?;
        let units: f64 = fill_txn.units.parse().ok()?;
        Some(Fill { price, units })
    }

    async fn get_open_trades(&self) -> Result<Vec<OpenTrade>> {
        let url = format!("{}/accounts/{}/openTrades", self.base_url, self.account_id);
        let resp = self
            .get_with_retry(&url)
            .await
            .context("failed to fetch open trades")?;
        let body: OpenTradesResponse = resp.json().await.context("failed to parse open trades")?;
        Ok(body
            .trades
            .into_iter()
            .map(|t| OpenTrade {
                id: t.id,
                instrument: t.instrument,
                units: t.current_units.parse().unwrap_or(0.0),
                price: t.price.parse().unwrap_or(0.0),
            })
            .collect())
    }

    async fn close_trade(&self, id: &str) -> bool {
        let url = format!(
            "{}/accounts/{}/trades/{}/close",
            self.base_url, self.account_id, id
        );
        match self.client.put(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("failed to close trade {id}: {e}");
                false
            }
        }
    }
}
