//! In-memory broker over a caller-supplied rate book.
//! Used for `--demo` mode and tests — fills instantly at book mid price.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::{Fill, Instrument, InstrumentId, OpenTrade, Quote};

use super::Broker;

pub struct DemoBroker {
    balance: RwLock<f64>,
    book: RwLock<HashMap<InstrumentId, Quote>>,
    instruments: Vec<Instrument>,
}

impl DemoBroker {
    pub fn new(starting_balance: f64, instruments: Vec<Instrument>) -> Self {
        Self {
            balance: RwLock::new(starting_balance),
            book: RwLock::new(HashMap::new()),
            instruments,
        }
    }

    pub async fn set_quote(&self, id: InstrumentId, quote: Quote) {
        self.book.write().await.insert(id, quote);
    }
}

#[async_trait]
impl Broker for DemoBroker {
    async fn get_balance(&self) -> f64 {
        *self.balance.read().await
    }

    async fn list_instruments(&self) -> anyhow::Result<Vec<Instrument>> {
        Ok(self.instruments.clone())
    }

    async fn get_quote(&self, id: InstrumentId) -> Option<Quote> {
        self.book.read().await.get(&id).copied()
    }

    async fn place_market_order(&self, id: InstrumentId, units: f64) -> Option<Fill> {
        let quote = self.book.read().await.get(&id).copied()?;
        Some(Fill {
            price: quote.mid,
            units: units.trunc(),
        })
    }

    async fn get_open_trades(&self) -> anyhow::Result<Vec<OpenTrade>> {
        Ok(Vec::new())
    }

    async fn close_trade(&self, _id: &str) -> bool {
        true
    }
}
