//! Core data model: currencies, instruments, quotes.
//! Mission: one small set of types the whole pipeline agrees on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TradeError;

/// Three-letter uppercase currency tag. Opaque — never interpreted beyond
/// being a graph vertex label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn new(code: &str) -> Result<Self, TradeError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(TradeError::Config(format!(
                "invalid currency code '{code}': must be 3 uppercase letters"
            )));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

/// A directed pair of currencies, e.g. `(USD, EUR)` — the broker's
/// `USD_EUR` instrument, or a synthetic reverse not in the catalog.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId {
    pub base: Currency,
    pub quote: Currency,
}

impl InstrumentId {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    pub fn reversed(&self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }

    pub fn name(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }

    pub fn parse(name: &str) -> Result<Self, TradeError> {
        let (base, quote) = name.split_once('_').ok_or_else(|| {
            TradeError::Config(format!("instrument name '{name}' missing '_' separator"))
        })?;
        Ok(Self::new(Currency::new(base)?, Currency::new(quote)?))
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

/// A bid/ask quote for one instrument at a point in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub spread: f64,
    pub timestamp: DateTime<Utc>,
    pub synthetic: bool,
}

impl Quote {
    /// Construct a catalog quote, enforcing `bid <= mid <= ask` and `mid > 0`.
    /// Network data is a boundary — validate rather than trust.
    pub fn new(bid: f64, ask: f64, timestamp: DateTime<Utc>) -> Result<Self, TradeError> {
        let mid = (bid + ask) / 2.0;
        let spread = ask - bid;
        if !(bid <= mid && mid <= ask) || mid <= 0.0 || spread < 0.0 {
            return Err(TradeError::Config(format!(
                "invalid quote: bid={bid} ask={ask} mid={mid}"
            )));
        }
        Ok(Self {
            bid,
            ask,
            mid,
            spread,
            timestamp,
            synthetic: false,
        })
    }

    /// Synthesize the inverse quote of `(B,Q)` as the quote for `(Q,B)`,
    /// per the spread/mid algebra: bid' = 1/ask, ask' = 1/bid.
    pub fn inverse(&self) -> Quote {
        Quote {
            bid: 1.0 / self.ask,
            ask: 1.0 / self.bid,
            mid: 1.0 / self.mid,
            spread: self.spread / (self.bid * self.ask),
            timestamp: self.timestamp,
            synthetic: true,
        }
    }
}

/// A catalog entry returned by `list_instruments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The result of a filled market order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    pub units: f64,
}

/// An open position as reported by the broker (defined for completeness;
/// not driven by the core in steady state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTrade {
    pub id: String,
    pub instrument: String,
    pub units: f64,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_currency() {
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("USDT").is_err());
        assert!(Currency::new("USD").is_ok());
    }

    #[test]
    fn inverse_round_trips_within_tolerance() {
        let q = Quote::new(0.9000, 0.9010, Utc::now()).unwrap();
        let inv = q.inverse();
        let back = inv.inverse();
        assert!((back.bid - q.bid).abs() < 1e-9);
        assert!((back.ask - q.ask).abs() < 1e-9);
        assert!((back.mid - q.mid).abs() < 1e-9);
    }

    #[test]
    fn inverse_cross_product_is_one() {
        let q = Quote::new(0.9000, 0.9010, Utc::now()).unwrap();
        let inv = q.inverse();
        assert!((inv.bid * q.ask - 1.0).abs() < 1e-9);
        assert!((inv.ask * q.bid - 1.0).abs() < 1e-9);
    }

    #[test]
    fn quote_invariants_enforced() {
        assert!(Quote::new(1.0, 0.9, Utc::now()).is_err()); // bid > ask
        assert!(Quote::new(-1.0, -0.9, Utc::now()).is_err()); // mid <= 0
    }
}
