//! Performance report writer.
//! Peripheral to the trading loop: serializes the ledger on shutdown to a
//! timestamped JSON file plus a human-readable summary under a data
//! directory. Writing a report never affects in-memory ledger behavior.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::ledger::{PerformanceLedger, TradeRecord};

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    metrics: crate::ledger::PerformanceMetrics,
    trades: &'a [TradeRecord],
}

/// Writes `performance_<ts>.json` and `summary_<ts>.txt` into `data_dir`,
/// creating it if necessary. Errors are logged, never propagated — a
/// failed report write must not take down the trading loop.
pub fn write_report(data_dir: &Path, ledger: &PerformanceLedger, start_time: DateTime<Utc>) {
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        error!("error creating data directory {}: {e}", data_dir.display());
        return;
    }

    let end_time = Utc::now();
    let stamp = end_time.format("%Y%m%d_%H%M%S");
    let json_path: PathBuf = data_dir.join(format!("performance_{stamp}.json"));
    let summary_path: PathBuf = data_dir.join(format!("summary_{stamp}.txt"));

    let metrics = ledger.metrics();
    let doc = ReportDocument {
        start_time,
        end_time,
        metrics,
        trades: ledger.all(),
    };

    match serde_json::to_string_pretty(&doc) {
        Ok(body) => match std::fs::write(&json_path, body) {
            Ok(()) => info!("performance data saved to {}", json_path.display()),
            Err(e) => error!("error saving performance data: {e}"),
        },
        Err(e) => error!("error serializing performance data: {e}"),
    }

    let summary = render_summary(start_time, end_time, &metrics, ledger.all());
    match std::fs::write(&summary_path, summary) {
        Ok(()) => info!("performance report saved to {}", summary_path.display()),
        Err(e) => error!("error generating performance report: {e}"),
    }
}

fn render_summary(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    metrics: &crate::ledger::PerformanceMetrics,
    trades: &[TradeRecord],
) -> String {
    let mut out = String::new();
    out.push_str("OANDA Arbitrage Trading System - Performance Report\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out.push_str(&format!("Report generated: {end}\n"));
    out.push_str(&format!("Trading session: {start} to {end}\n"));
    out.push_str(&format!("Duration: {}\n\n", end - start));

    out.push_str("Performance Metrics:\n");
    out.push_str(&"-".repeat(20));
    out.push('\n');
    out.push_str(&format!("Total trades: {}\n", metrics.total_trades));
    out.push_str(&format!(
        "Profitable trades: {} ({:.2}%)\n",
        metrics.profitable_trades,
        metrics.win_rate * 100.0
    ));
    out.push_str(&format!("Loss trades: {}\n", metrics.loss_trades));
    out.push_str(&format!("Average profit: {:.4}%\n", metrics.avg_profit * 100.0));
    out.push_str(&format!("Average loss: {:.4}%\n", metrics.avg_loss * 100.0));
    out.push_str(&format!("Average slippage: {:.4}%\n", metrics.avg_slippage * 100.0));
    out.push_str(&format!("Total profit: {:.4}%\n\n", metrics.total_profit * 100.0));

    out.push_str("Recent Trades:\n");
    out.push_str(&"-".repeat(20));
    out.push('\n');
    let tail_start = trades.len().saturating_sub(10);
    for (i, trade) in trades[tail_start..].iter().enumerate() {
        out.push_str(&format!("Trade {}:\n", i + 1));
        out.push_str(&format!("  Timestamp: {}\n", trade.timestamp));
        out.push_str(&format!(
            "  Expected profit: {:.4}%\n",
            trade.expected_profit * 100.0
        ));
        out.push_str(&format!(
            "  Actual profit: {:.4}%\n",
            trade.actual_profit * 100.0
        ));
        out.push_str(&format!("  Slippage: {:.4}%\n\n", trade.slippage * 100.0));
    }

    out
}

/// Stable tag for report filenames when a caller needs to correlate a
/// shutdown event with the files it produced.
pub fn now_tag() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expected: f64, actual: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            expected_profit: expected,
            actual_profit: actual,
            slippage: expected - actual,
        }
    }

    #[test]
    fn writes_json_and_summary_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = PerformanceLedger::new();
        ledger.record(record(0.002, 0.0015));
        ledger.record(record(0.0018, -0.0002));

        let start = Utc::now() - Duration::minutes(5);
        write_report(dir.path(), &ledger, start);

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(entries.iter().any(|n| n.starts_with("performance_") && n.ends_with(".json")));
        assert!(entries.iter().any(|n| n.starts_with("summary_") && n.ends_with(".txt")));
    }

    #[test]
    fn summary_mentions_total_trades() {
        let mut ledger = PerformanceLedger::new();
        ledger.record(record(0.002, 0.0015));
        let summary = render_summary(Utc::now(), Utc::now(), &ledger.metrics(), ledger.all());
        assert!(summary.contains("Total trades: 1"));
    }
}
