//! Performance Ledger (C9).
//! Mission: an append-only trade log plus the aggregate metrics the rest
//! of the pipeline (sizing, circuit breakers, adaptive thresholds) reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed (or simulated) arbitrage cycle outcome (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub expected_profit: f64,
    pub actual_profit: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub loss_trades: usize,
    pub win_rate: f64,
    pub avg_profit: f64,
    pub avg_loss: f64,
    pub avg_slippage: f64,
    pub total_profit: f64,
}

/// Append-only in-memory trade log (spec §4.8).
#[derive(Debug, Default)]
pub struct PerformanceLedger {
    trades: Vec<TradeRecord>,
}

impl PerformanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: TradeRecord) {
        self.trades.push(record);
    }

    pub fn recent(&self, count: usize) -> &[TradeRecord] {
        let len = self.trades.len();
        &self.trades[len.saturating_sub(count)..]
    }

    pub fn recent_slippages(&self, count: usize) -> Vec<f64> {
        self.recent(count).iter().map(|t| t.slippage).collect()
    }

    pub fn all(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        if self.trades.is_empty() {
            return PerformanceMetrics::default();
        }
        let total_trades = self.trades.len();
        let profitable_trades = self.trades.iter().filter(|t| t.actual_profit > 0.0).count();
        let loss_trades = total_trades - profitable_trades;
        let win_rate = profitable_trades as f64 / total_trades as f64;

        let profits: Vec<f64> = self
            .trades
            .iter()
            .map(|t| t.actual_profit)
            .filter(|&p| p > 0.0)
            .collect();
        let losses: Vec<f64> = self
            .trades
            .iter()
            .map(|t| t.actual_profit)
            .filter(|&p| p <= 0.0)
            .collect();

        let avg_profit = if profits.is_empty() {
            0.0
        } else {
            profits.iter().sum::<f64>() / profits.len() as f64
        };
        let avg_loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f64>() / losses.len() as f64
        };
        let avg_slippage =
            self.trades.iter().map(|t| t.slippage).sum::<f64>() / total_trades as f64;
        let total_profit = self.trades.iter().map(|t| t.actual_profit).sum();

        PerformanceMetrics {
            total_trades,
            profitable_trades,
            loss_trades,
            win_rate,
            avg_profit,
            avg_loss,
            avg_slippage,
            total_profit,
        }
    }

    /// Adaptive threshold adjustment from the last 5 trades (spec §4.8).
    /// Returns the new threshold, or `current` unchanged if fewer than 5
    /// records exist.
    pub fn adapt_threshold(&self, current: f64) -> f64 {
        let window = self.recent(5);
        if window.is_empty() {
            return current;
        }
        let avg_profit = window.iter().map(|t| t.actual_profit).sum::<f64>() / window.len() as f64;
        let avg_slippage = window.iter().map(|t| t.slippage).sum::<f64>() / window.len() as f64;

        if avg_profit < 0.0 {
            (current * 1.2).min(0.005)
        } else if avg_profit > 0.002 && avg_slippage < 0.001 {
            (current * 0.9).max(0.0008)
        } else {
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expected: f64, actual: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            expected_profit: expected,
            actual_profit: actual,
            slippage: expected - actual,
        }
    }

    #[test]
    fn metrics_over_mixed_outcomes() {
        let mut ledger = PerformanceLedger::new();
        ledger.record(record(0.002, 0.0015));
        ledger.record(record(0.002, -0.0005));
        let metrics = ledger.metrics();
        assert_eq!(metrics.total_trades, 2);
        assert_eq!(metrics.profitable_trades, 1);
        assert_eq!(metrics.loss_trades, 1);
        assert!((metrics.win_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn adaptive_threshold_raises_after_losses() {
        let mut ledger = PerformanceLedger::new();
        for _ in 0..5 {
            ledger.record(record(0.002, -0.001));
        }
        let adjusted = ledger.adapt_threshold(0.001);
        assert!((adjusted - 0.0012).abs() < 1e-9);
    }

    #[test]
    fn adaptive_threshold_lowers_when_performing_well() {
        let mut ledger = PerformanceLedger::new();
        for _ in 0..5 {
            ledger.record(record(0.0025, 0.0024));
        }
        let adjusted = ledger.adapt_threshold(0.001);
        assert!((adjusted - 0.0009).abs() < 1e-9);
    }
}
