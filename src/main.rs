//! Arbitrader binary entry point.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbitrader::broker::{Broker, OandaClient};
use arbitrader::cli::Args;
use arbitrader::config::Config;
use arbitrader::trader::Trader;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let args = Args::parse();
    let _log_guard = init_tracing(args.verbose);

    let mut config = Config::load(&args.config);
    if args.practice {
        config.practice_mode = true;
    }
    if let Some(interval) = args.interval {
        config.check_interval = interval;
    }
    if let Some(runtime) = args.runtime {
        config.max_runtime = Some(runtime);
    }

    let (api_key, account_id) = match config.credentials() {
        Ok(creds) => creds,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let broker: Arc<dyn Broker> = Arc::new(OandaClient::new(&api_key, &account_id, config.practice_mode));

    info!(
        "mode: {}",
        if args.demo { "demo (simulated execution)" } else { "live trading" }
    );
    let mut trader = Trader::new(broker, config.clone(), args.demo).await?;

    let start_time = Utc::now();
    let deadline = config
        .max_runtime
        .map(|secs| start_time + chrono::Duration::seconds(secs as i64));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            sleep_for = trader.tick() => {
                if let Some(deadline) = deadline {
                    if Utc::now() >= deadline {
                        info!("max runtime elapsed, shutting down");
                        break;
                    }
                }
                tokio::time::sleep(sleep_for).await;
            }
        }
    }

    arbitrader::report::write_report(Path::new("./data"), trader.ledger(), start_time);
    Ok(())
}

/// Stdout plus a daily-rolling file appender under `./logs/` (spec §6).
/// The returned guard must stay alive for the process lifetime — dropping
/// it stops the non-blocking writer thread and silently truncates logs.
fn init_tracing(verbose: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let default_filter = if verbose {
        "arbitrader=debug"
    } else {
        "arbitrader=info"
    };
    let file_appender = tracing_appender::rolling::daily("./logs", "arbitrader.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    guard
}
