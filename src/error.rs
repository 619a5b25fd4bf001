//! Error kinds and the policy each one implies (spec §7).
//!
//! Transient quote/price errors are logged and the affected pair is
//! dropped from the tick. Order/fill errors abort the current execution
//! without unwinding prior legs. `Config` terminates the process at
//! startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("transient quote error: {0}")]
    TransientQuote(String),

    #[error("price missing for {0}")]
    PriceMissing(String),

    #[error("order rejected for {0}")]
    OrderReject(String),

    #[error("invalid fill for {0}: {1}")]
    FillInvalid(String, String),

    #[error("flow break: expected {expected} at leg start, found {found}")]
    FlowBreak { expected: String, found: String },

    #[error("configuration error: {0}")]
    Config(String),
}
