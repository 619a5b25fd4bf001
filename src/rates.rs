//! Rate Snapshot Builder (C2).
//! Mission: turn a bounded-parallel quote fetch into a coherent, atomic
//! per-tick view of the rate graph — catalog quotes, synthetic inverses,
//! and the effective rates the cycle finder actually walks.

use futures_util::stream::{self, StreamExt};
use statrs::statistics::Statistics;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::broker::Broker;
use crate::domain::{InstrumentId, Quote};

pub type RateBook = HashMap<InstrumentId, Quote>;
pub type EffectiveRateBook = HashMap<InstrumentId, f64>;

/// Bounded-parallelism budget for concurrent quote fetches (spec §4.2 step 1).
const SNAPSHOT_CONCURRENCY: usize = 10;

/// Per-instrument bounded history of mid prices, used to derive volatility.
pub struct RateHistory {
    window: usize,
    history: HashMap<InstrumentId, VecDeque<f64>>,
}

impl RateHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            history: HashMap::new(),
        }
    }

    fn push(&mut self, id: InstrumentId, mid: f64) {
        let buf = self.history.entry(id).or_default();
        buf.push_back(mid);
        while buf.len() > self.window {
            buf.pop_front();
        }
    }

    /// `stdev(history) / mean(history)`, computed only once at least 5
    /// observations have accumulated.
    pub fn volatility(&self, id: InstrumentId) -> Option<f64> {
        let buf = self.history.get(&id)?;
        if buf.len() < 5 {
            return None;
        }
        let values: Vec<f64> = buf.iter().copied().collect();
        let mean = values.clone().mean();
        if mean == 0.0 {
            return None;
        }
        Some(values.std_dev() / mean)
    }
}

/// Fetch quotes for every instrument in `valid_pairs` with bounded
/// parallelism, derive synthetic inverses, update `history`, and produce
/// the effective-rate book the cycle finder walks (spec §4.2).
pub async fn snapshot(
    broker: &dyn Broker,
    valid_pairs: &[InstrumentId],
    history: &mut RateHistory,
) -> (RateBook, EffectiveRateBook) {
    let fetched: Vec<(InstrumentId, Option<Quote>)> = stream::iter(valid_pairs.iter().copied())
        .map(|id| async move { (id, broker.get_quote(id).await) })
        .buffer_unordered(SNAPSHOT_CONCURRENCY)
        .collect()
        .await;

    let mut book: RateBook = HashMap::new();
    for (id, quote) in fetched {
        match quote {
            Some(q) => {
                history.push(id, q.mid);
                book.insert(id, q);
            }
            None => debug!("no quote for {id}, dropping from this tick's snapshot"),
        }
    }

    // Synthesize inverse quotes for reverse directions absent from both
    // the catalog and the snapshot (spec §4.2 step 4).
    let catalog: std::collections::HashSet<InstrumentId> = valid_pairs.iter().copied().collect();
    let mut synthetics = Vec::new();
    for (&id, quote) in book.iter() {
        let rev = id.reversed();
        if !catalog.contains(&rev) && !book.contains_key(&rev) {
            synthetics.push((rev, quote.inverse()));
        }
    }
    for (id, quote) in synthetics {
        book.insert(id, quote);
    }

    // Derive effective rates: catalog direction's ask is authoritative;
    // the reverse direction uses 1/bid only when it wasn't itself catalog.
    let mut effective: EffectiveRateBook = HashMap::new();
    for (&id, quote) in book.iter() {
        effective.insert(id, quote.ask);
        let rev = id.reversed();
        if !catalog.contains(&rev) {
            effective.insert(rev, 1.0 / quote.bid);
        }
    }

    debug!("updated {} exchange rates", book.len());
    (book, effective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::DemoBroker;
    use crate::domain::{Currency, Instrument};
    use chrono::Utc;

    fn pair(b: &str, q: &str) -> InstrumentId {
        InstrumentId::new(Currency::new(b).unwrap(), Currency::new(q).unwrap())
    }

    #[tokio::test]
    async fn empty_universe_yields_empty_snapshot() {
        let broker = DemoBroker::new(10_000.0, vec![]);
        let mut history = RateHistory::new(20);
        let (book, effective) = snapshot(&broker, &[], &mut history).await;
        assert!(book.is_empty());
        assert!(effective.is_empty());
    }

    #[tokio::test]
    async fn synthesizes_inverse_and_derives_effective_rates() {
        let usd_eur = pair("USD", "EUR");
        let broker = DemoBroker::new(
            10_000.0,
            vec![Instrument {
                name: "USD_EUR".into(),
                kind: "CURRENCY".into(),
            }],
        );
        broker
            .set_quote(
                usd_eur,
                Quote::new(0.8995, 0.9005, Utc::now()).unwrap(),
            )
            .await;

        let mut history = RateHistory::new(20);
        let (book, effective) = snapshot(&broker, &[usd_eur], &mut history).await;

        assert!(book.contains_key(&usd_eur));
        let eur_usd = usd_eur.reversed();
        assert!(book[&eur_usd].synthetic);
        assert!((book[&eur_usd].bid * book[&usd_eur].ask - 1.0).abs() < 1e-9);

        assert!((effective[&usd_eur] - 0.9005).abs() < 1e-9);
        assert!((effective[&eur_usd] - 1.0 / 0.8995).abs() < 1e-9);
    }

    #[tokio::test]
    async fn volatility_requires_five_observations() {
        let usd_eur = pair("USD", "EUR");
        let mut history = RateHistory::new(20);
        for i in 0..4 {
            history.push(usd_eur, 0.9 + i as f64 * 0.001);
        }
        assert!(history.volatility(usd_eur).is_none());
        history.push(usd_eur, 0.905);
        assert!(history.volatility(usd_eur).is_some());
    }
}
