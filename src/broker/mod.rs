//! Brokerage Gateway (C1).
//! Capability interface the core drives; two implementations below.

mod demo;
mod oanda;

pub use demo::DemoBroker;
pub use oanda::OandaClient;

use async_trait::async_trait;

use crate::domain::{Fill, Instrument, InstrumentId, OpenTrade, Quote};

/// Abstract brokerage gateway. `get_quote`/`place_market_order` collapse
/// transport and parse failures to `None` — the core treats both as
/// "this edge/order is unavailable this tick", never as a panic.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn get_balance(&self) -> f64;
    async fn list_instruments(&self) -> anyhow::Result<Vec<Instrument>>;
    async fn get_quote(&self, id: InstrumentId) -> Option<Quote>;
    async fn place_market_order(&self, id: InstrumentId, units: f64) -> Option<Fill>;
    async fn get_open_trades(&self) -> anyhow::Result<Vec<OpenTrade>>;
    async fn close_trade(&self, id: &str) -> bool;
}
