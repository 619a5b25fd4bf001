//! Risk & Sizing (C6) and Circuit Breakers (C7).
//! Mission: turn account state and recent performance into a trade size,
//! and a go/no-go gate, without ever needing a second opinion mid-tick.

use chrono::{DateTime, Utc};

use crate::config::RiskPerTrade;
use crate::session::{session_factor, Session};

/// Frozen-at-construction risk baseline plus the one counter execution
/// mutates (spec §3 "RiskState").
#[derive(Debug, Clone)]
pub struct RiskState {
    pub starting_balance: f64,
    pub daily_loss_limit: f64,
    pub consecutive_losses: u32,
}

impl RiskState {
    pub fn new(starting_balance: f64, daily_loss_limit_pct: f64) -> Self {
        Self {
            starting_balance,
            daily_loss_limit: starting_balance * daily_loss_limit_pct,
            consecutive_losses: 0,
        }
    }

    /// Reset on any profitable outcome, increment on any non-profitable one.
    pub fn record_outcome(&mut self, actual_profit: f64) {
        if actual_profit > 0.0 {
            self.consecutive_losses = 0;
        } else {
            self.consecutive_losses += 1;
        }
    }

    /// Unconditional increment for a genuine order failure (spec §7:
    /// `OrderRejectError`/`FillInvalidError` always count as a loss, even
    /// when no `TradeRecord` is surfaced because zero legs filled).
    pub fn record_failure(&mut self) {
        self.consecutive_losses += 1;
    }
}

/// Balance tier -> risk-per-trade fraction (spec §4.5 step 2).
fn tier_risk(balance: f64, risk_per_trade: &RiskPerTrade) -> f64 {
    if balance < 1_000.0 {
        risk_per_trade.small_account
    } else if balance < 10_000.0 {
        risk_per_trade.medium_account
    } else {
        risk_per_trade.large_account
    }
}

/// Position size from balance tier, session multiplier, cycle quality,
/// and confidence (spec §4.5). The `cycle_quality * 10` inside the clamp
/// reproduces the source's double-scaling (§9 Open Question) — the call
/// site already multiplies `effective_profit` by 100 before passing it in
/// as `cycle_quality`; preserved rather than "fixed".
pub fn position_size(
    balance: f64,
    consecutive_losses: u32,
    session: Session,
    session_multipliers: &crate::config::SessionMultipliers,
    risk_per_trade: &RiskPerTrade,
    cycle_quality: f64,
) -> f64 {
    let tier = tier_risk(balance, risk_per_trade);
    let session_factor = session_factor(session, session_multipliers);
    let quality_factor = (cycle_quality * 10.0).clamp(0.5, 2.0);
    let confidence_factor = (1.0 - 0.2 * consecutive_losses as f64).max(0.5);

    let raw = balance * tier * session_factor * quality_factor * confidence_factor;
    raw.max(100.0).min(0.1 * balance)
}

/// Consecutive-loss gate (spec §4.6 step 1).
pub fn consecutive_loss_gate(state: &RiskState, max_consecutive_losses: u32) -> bool {
    state.consecutive_losses < max_consecutive_losses
}

/// Daily-loss gate (spec §4.6 step 2).
pub fn daily_loss_gate(state: &RiskState, current_balance: f64) -> bool {
    state.starting_balance - current_balance <= state.daily_loss_limit
}

/// Slippage gate over the last 3 trades; passes vacuously with fewer
/// records (spec §4.6 step 3).
pub fn slippage_gate(recent_slippages: &[f64]) -> bool {
    if recent_slippages.len() < 3 {
        return true;
    }
    let tail = &recent_slippages[recent_slippages.len() - 3..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    mean <= 0.003
}

/// All three circuit breakers, short-circuiting on the first failure.
pub fn check_circuit_breakers(
    state: &RiskState,
    current_balance: f64,
    max_consecutive_losses: u32,
    recent_slippages: &[f64],
) -> bool {
    consecutive_loss_gate(state, max_consecutive_losses)
        && daily_loss_gate(state, current_balance)
        && slippage_gate(recent_slippages)
}

/// Session-aware "should trade now" gate (spec §4.6), layered on top of
/// the circuit breakers.
pub fn should_trade_now(
    state: &RiskState,
    current_balance: f64,
    max_consecutive_losses: u32,
    recent_slippages: &[f64],
    session: Session,
    last_opportunity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if !check_circuit_breakers(state, current_balance, max_consecutive_losses, recent_slippages) {
        return false;
    }

    if crate::session::is_liquid(session) {
        return true;
    }

    match last_opportunity {
        Some(seen) => (now - seen).num_seconds() < 300,
        None => false,
    }
}
