//! Arbitrader — OANDA-style FX triangular arbitrage trader.
//!
//! Exposes every module for use by the binary and integration tests.

pub mod broker;
pub mod cli;
pub mod config;
pub mod cycles;
pub mod domain;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod rates;
pub mod report;
pub mod risk;
pub mod session;
pub mod trader;
