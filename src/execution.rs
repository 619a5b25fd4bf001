//! Execution Engine (C8).
//! Mission: walk a cycle's legs in strict order, never reordering, never
//! unwinding a partially-filled cycle.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::cycles::Cycle;
use crate::error::TradeError;
use crate::ledger::TradeRecord;

#[derive(Debug, Clone)]
pub struct LegRecord {
    pub instrument: String,
    pub units: f64,
    pub price: f64,
    pub amount_after: f64,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub legs: Vec<LegRecord>,
    pub final_amount: f64,
    pub profit: f64,
    pub profit_pct: f64,
    pub record: TradeRecord,
}

/// An aborted execution, carrying whatever legs completed before the
/// failing step (spec §7: "do not attempt to unwind preceding legs").
/// The caller needs `legs`/`partial_amount` to decide whether a
/// `TradeRecord` should still be surfaced for the partial fill.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: TradeError,
    pub legs: Vec<LegRecord>,
    pub partial_amount: f64,
}

/// Serializes entry to the execution phase: at most one cycle in flight
/// system-wide (spec §5 "Mutual exclusion").
#[derive(Default)]
pub struct ExecutionGate {
    lock: Mutex<()>,
}

impl ExecutionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `cycle` against the live broker, starting with `amount` in
    /// the cycle's starting currency (spec §4.7).
    pub async fn execute(
        &self,
        broker: &dyn Broker,
        cycle: &Cycle,
        amount: f64,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        let _permit = self.lock.lock().await;

        let mut cur_currency = cycle.edges[0].base;
        let mut cur_amount = amount;
        let mut legs: Vec<LegRecord> = Vec::with_capacity(cycle.edges.len());

        for edge in &cycle.edges {
            if edge.base != cur_currency {
                return Err(ExecutionFailure {
                    error: TradeError::FlowBreak {
                        expected: cur_currency.to_string(),
                        found: edge.base.to_string(),
                    },
                    legs,
                    partial_amount: cur_amount,
                });
            }

            let quote = match broker.get_quote(*edge).await {
                Some(q) => q,
                None => {
                    return Err(ExecutionFailure {
                        error: TradeError::PriceMissing(edge.name()),
                        legs,
                        partial_amount: cur_amount,
                    })
                }
            };

            let raw_units = if edge.base.as_str() == "USD" {
                cur_amount
            } else {
                cur_amount / quote.mid
            };
            let units = raw_units.abs();

            let fill = match broker.place_market_order(*edge, units).await {
                Some(f) => f,
                None => {
                    return Err(ExecutionFailure {
                        error: TradeError::OrderReject(edge.name()),
                        legs,
                        partial_amount: cur_amount,
                    })
                }
            };

            if fill.price <= 0.0 || fill.units == 0.0 {
                return Err(ExecutionFailure {
                    error: TradeError::FillInvalid(
                        edge.name(),
                        format!("price={} units={}", fill.price, fill.units),
                    ),
                    legs,
                    partial_amount: cur_amount,
                });
            }

            cur_amount = fill.units * fill.price;
            cur_currency = edge.quote;
            legs.push(LegRecord {
                instrument: edge.name(),
                units: fill.units,
                price: fill.price,
                amount_after: cur_amount,
            });
            info!(
                "completed leg {} -> {}, amount: {:.2}",
                edge.base, edge.quote, cur_amount
            );
        }

        let final_amount = cur_amount;
        let profit = final_amount - amount;
        let profit_pct = final_amount / amount - 1.0;
        let record = TradeRecord {
            timestamp: chrono::Utc::now(),
            expected_profit: cycle.effective_profit,
            actual_profit: profit_pct,
            slippage: cycle.effective_profit - profit_pct,
        };

        if profit > 0.0 {
            info!("arbitrage successful: profit {:.2} ({:.4}%)", profit, profit_pct * 100.0);
        } else {
            warn!("arbitrage resulted in loss: {:.2} ({:.4}%)", profit, profit_pct * 100.0);
        }

        Ok(ExecutionOutcome {
            legs,
            final_amount,
            profit,
            profit_pct,
            record,
        })
    }
}

/// Demo-mode simulated execution (spec §4.7 "Demo mode"). Draws slippage
/// from `Normal(mu=0.001, sigma=0.0005)`; `actual = max(0, expected - draw)`.
/// The recorded "slippage" equals the raw draw rather than
/// `expected - actual` whenever the draw exceeds `expected` — the source's
/// divergence from the canonical definition (spec §9), preserved here.
pub fn simulate_cycle(cycle: &Cycle, rng: &mut impl Rng) -> TradeRecord {
    let normal = Normal::new(0.001, 0.0005).expect("valid normal parameters");
    let slippage_draw = normal.sample(rng);
    let expected = cycle.effective_profit;
    let actual = (expected - slippage_draw).max(0.0);

    if actual > 0.0 {
        info!(
            "[demo] simulated trade - expected: {:.4}%, actual: {:.4}%, slippage: {:.4}%",
            expected * 100.0,
            actual * 100.0,
            slippage_draw * 100.0
        );
    } else {
        error!("[demo] simulated trade produced no profit");
    }

    TradeRecord {
        timestamp: chrono::Utc::now(),
        expected_profit: expected,
        actual_profit: actual,
        slippage: slippage_draw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::DemoBroker;
    use crate::domain::{Currency, Instrument, InstrumentId, Quote};
    use chrono::Utc;
    use rand::SeedableRng;

    fn cur(s: &str) -> Currency {
        Currency::new(s).unwrap()
    }

    #[tokio::test]
    async fn executes_legs_in_order_and_accumulates_amount() {
        let usd_eur = InstrumentId::new(cur("USD"), cur("EUR"));
        let eur_usd = usd_eur.reversed();
        let broker = DemoBroker::new(
            10_000.0,
            vec![Instrument {
                name: "USD_EUR".into(),
                kind: "CURRENCY".into(),
            }],
        );
        broker
            .set_quote(usd_eur, Quote::new(0.899, 0.901, Utc::now()).unwrap())
            .await;
        broker
            .set_quote(eur_usd, Quote::new(1.108, 1.112, Utc::now()).unwrap())
            .await;

        let cycle = Cycle {
            edges: vec![usd_eur, eur_usd],
            profit_ratio: 1.001,
            effective_profit: 0.0008,
        };

        let gate = ExecutionGate::new();
        let outcome = gate.execute(&broker, &cycle, 1_000.0).await.unwrap();
        assert_eq!(outcome.legs.len(), 2);
        assert_eq!(outcome.legs[0].instrument, "USD_EUR");
        assert_eq!(outcome.legs[1].instrument, "EUR_USD");
    }

    #[tokio::test]
    async fn missing_quote_aborts_with_price_missing() {
        let usd_eur = InstrumentId::new(cur("USD"), cur("EUR"));
        let broker = DemoBroker::new(10_000.0, vec![]);
        let cycle = Cycle {
            edges: vec![usd_eur],
            profit_ratio: 1.0,
            effective_profit: 0.0,
        };
        let gate = ExecutionGate::new();
        let failure = gate.execute(&broker, &cycle, 100.0).await.unwrap_err();
        assert!(matches!(failure.error, TradeError::PriceMissing(_)));
        assert!(failure.legs.is_empty());
        assert_eq!(failure.partial_amount, 100.0);
    }

    #[tokio::test]
    async fn fill_invalid_on_second_leg_preserves_first_legs_fill() {
        let usd_eur = InstrumentId::new(cur("USD"), cur("EUR"));
        let eur_gbp = InstrumentId::new(cur("EUR"), cur("GBP"));
        let broker = DemoBroker::new(
            10_000.0,
            vec![Instrument {
                name: "USD_EUR".into(),
                kind: "CURRENCY".into(),
            }],
        );
        broker
            .set_quote(usd_eur, Quote::new(0.899, 0.901, Utc::now()).unwrap())
            .await;
        // EUR_GBP priced so the resulting whole-unit order truncates to zero.
        broker
            .set_quote(eur_gbp, Quote::new(9.9, 10.1, Utc::now()).unwrap())
            .await;

        let cycle = Cycle {
            edges: vec![usd_eur, eur_gbp],
            profit_ratio: 1.001,
            effective_profit: 0.0008,
        };

        let gate = ExecutionGate::new();
        let failure = gate.execute(&broker, &cycle, 5.0).await.unwrap_err();
        assert!(matches!(failure.error, TradeError::FillInvalid(_, _)));
        assert_eq!(failure.legs.len(), 1);
        assert_eq!(failure.legs[0].instrument, "USD_EUR");
        assert!(failure.partial_amount > 0.0);
    }

    #[test]
    fn simulated_slippage_never_yields_negative_profit() {
        let cycle = Cycle {
            edges: vec![InstrumentId::new(cur("USD"), cur("EUR"))],
            profit_ratio: 1.001,
            effective_profit: 0.001,
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let record = simulate_cycle(&cycle, &mut rng);
        assert!(record.actual_profit >= 0.0);
    }
}
