//! Trading loop orchestration.
//! Mission: hold every collaborator the tick needs and drive the flow in
//! spec order: session refresh, snapshot, enumerate, gate, size, execute,
//! ingest, sleep.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::config::Config;
use crate::cycles::{self, Cycle};
use crate::domain::{Currency, InstrumentId};
use crate::error::TradeError;
use crate::execution::{simulate_cycle, ExecutionFailure, ExecutionGate};
use crate::ledger::{PerformanceLedger, TradeRecord};
use crate::rates::{self, RateHistory};
use crate::risk::{self, RiskState};
use crate::session::{self, StrategyParams};

/// Fixed per spec.md/`original_source/strategies/arbitrage.py`'s default;
/// not exposed as a config key.
const MAX_CYCLE_LENGTH: usize = 3;

pub struct Trader {
    broker: Arc<dyn Broker>,
    config: Config,
    valid_pairs: Vec<InstrumentId>,
    monitored_currencies: Vec<Currency>,
    history: RateHistory,
    risk_state: RiskState,
    ledger: PerformanceLedger,
    execution_gate: ExecutionGate,
    current_threshold: f64,
    last_opportunity: Option<DateTime<Utc>>,
    demo_mode: bool,
    rng: StdRng,
}

impl Trader {
    pub async fn new(broker: Arc<dyn Broker>, config: Config, demo_mode: bool) -> anyhow::Result<Self> {
        let monitored_currencies: Vec<Currency> = config
            .currencies_to_monitor
            .iter()
            .filter_map(|c| Currency::new(c).ok())
            .collect();

        let instruments = broker.list_instruments().await?;
        let mut valid_pairs = Vec::new();
        for instrument in &instruments {
            if let Ok(id) = InstrumentId::parse(&instrument.name) {
                if monitored_currencies.contains(&id.base) && monitored_currencies.contains(&id.quote) {
                    valid_pairs.push(id);
                }
            }
        }
        info!("monitoring {} instrument pairs", valid_pairs.len());

        let balance = broker.get_balance().await;
        let risk_state = RiskState::new(balance, config.daily_loss_limit_pct);

        Ok(Self {
            current_threshold: config.min_profit_threshold,
            history: RateHistory::new(config.volatility_window),
            broker,
            valid_pairs,
            monitored_currencies,
            risk_state,
            ledger: PerformanceLedger::new(),
            execution_gate: ExecutionGate::new(),
            last_opportunity: None,
            demo_mode,
            rng: StdRng::from_entropy(),
            config,
        })
    }

    pub fn ledger(&self) -> &PerformanceLedger {
        &self.ledger
    }

    /// Run one tick of the main loop (spec.md §2 "Flow"). Returns the sleep
    /// duration the caller should honor before the next tick.
    pub async fn tick(&mut self) -> StdDuration {
        let now = Utc::now();
        let session = session::session(now);
        let params = StrategyParams::for_session(session, self.current_threshold);

        let (book, effective) = rates::snapshot(&*self.broker, &self.valid_pairs, &mut self.history).await;
        for opp in cycles::diagnostics::cross_rate_opportunities(&book) {
            debug!(
                "cross-rate discrepancy {}->{}->{}: direct={:.5} cross={:.5} delta={:.5}",
                opp.base, opp.mid, opp.quote, opp.direct_rate, opp.cross_rate, opp.discrepancy
            );
        }
        for (path, ratio) in cycles::diagnostics::triangular_opportunities(&book, params.min_profit_threshold) {
            debug!(
                "triangular opportunity {}: ratio={:.5}",
                path.iter().map(Currency::to_string).collect::<Vec<_>>().join("->"),
                ratio
            );
        }

        let balance = self.broker.get_balance().await;

        let mut best: Option<Cycle> = None;
        for &start in &self.monitored_currencies {
            let cycles = cycles::find_cycles(&effective, start, MAX_CYCLE_LENGTH, params.min_profit_threshold);
            if let Some(candidate) = cycles.into_iter().next() {
                let better = best
                    .as_ref()
                    .map(|b| candidate.effective_profit > b.effective_profit)
                    .unwrap_or(true);
                if better {
                    best = Some(candidate);
                }
            }
        }

        if best.is_some() {
            self.last_opportunity = Some(now);
        }

        let recent_slippages = self.ledger.recent_slippages(3);
        let should_trade = risk::should_trade_now(
            &self.risk_state,
            balance,
            self.config.max_consecutive_losses,
            &recent_slippages,
            session,
            self.last_opportunity,
            now,
        );

        if let (true, Some(cycle)) = (should_trade, best) {
            self.execute_cycle(&cycle, balance, session).await;
        } else {
            debug!("no trade this tick: session={session}, opportunity_found={}", self.last_opportunity.is_some());
        }

        StdDuration::from_secs(params.check_interval_secs)
    }

    async fn execute_cycle(&mut self, cycle: &Cycle, balance: f64, session: session::Session) {
        let quality = cycle.effective_profit * 100.0;
        let size = risk::position_size(
            balance,
            self.risk_state.consecutive_losses,
            session,
            &self.config.session_multipliers,
            &self.config.risk_per_trade,
            quality,
        );

        let record = if self.demo_mode {
            simulate_cycle(cycle, &mut self.rng)
        } else {
            match self.execution_gate.execute(&*self.broker, cycle, size).await {
                Ok(outcome) => outcome.record,
                Err(failure) => {
                    self.handle_execution_failure(failure, cycle, size);
                    return;
                }
            }
        };

        self.risk_state.record_outcome(record.actual_profit);
        self.ledger.record(record);
        self.current_threshold = self.ledger.adapt_threshold(self.current_threshold);
    }

    /// Apply spec §7's error policy for an aborted execution: `OrderReject`/
    /// `FillInvalid` always count against the consecutive-loss breaker, and
    /// surface a `TradeRecord` built from whatever legs filled before the
    /// abort, but only if at least one leg succeeded. `FlowBreak` is an
    /// internal invariant violation — logged at error severity, no record,
    /// no risk-state mutation. Anything else (a stray transient error
    /// surfacing mid-execution) is logged and dropped.
    fn handle_execution_failure(&mut self, failure: ExecutionFailure, cycle: &Cycle, amount: f64) {
        match &failure.error {
            TradeError::OrderReject(_) | TradeError::FillInvalid(_, _) => {
                warn!("execution aborted: {}", failure.error);
                self.risk_state.record_failure();
                if !failure.legs.is_empty() {
                    let actual_profit = failure.partial_amount / amount - 1.0;
                    let record = TradeRecord {
                        timestamp: chrono::Utc::now(),
                        expected_profit: cycle.effective_profit,
                        actual_profit,
                        slippage: cycle.effective_profit - actual_profit,
                    };
                    self.ledger.record(record);
                    self.current_threshold = self.ledger.adapt_threshold(self.current_threshold);
                }
            }
            TradeError::FlowBreak { .. } => {
                error!("execution aborted on internal invariant violation: {}", failure.error);
            }
            _ => {
                warn!("execution aborted: {}", failure.error);
            }
        }
    }
}
