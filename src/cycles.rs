//! Cycle Finder (C3).
//! Mission: enumerate profitable closed directed walks over the rate graph.

use std::collections::{HashMap, HashSet};

use crate::domain::{Currency, InstrumentId};
use crate::rates::EffectiveRateBook;

/// Per-leg transaction cost estimate (1 pip, spec §3).
pub const FEE_PER_LEG: f64 = 0.0001;

/// A closed directed walk of `edges.len()` legs whose product of effective
/// rates clears fees plus the configured profit margin.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub edges: Vec<InstrumentId>,
    pub profit_ratio: f64,
    pub effective_profit: f64,
}

impl Cycle {
    pub fn start(&self) -> Currency {
        self.edges[0].base
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Depth-bounded DFS over the vertex set induced by `effective_rates`'
/// keys, enumerating directed walks `start -> ... -> start` of exactly
/// `max_len` edges (spec §4.3).
pub fn find_cycles(
    effective_rates: &EffectiveRateBook,
    start: Currency,
    max_len: usize,
    min_profit: f64,
) -> Vec<Cycle> {
    if effective_rates.is_empty() || max_len < 2 {
        return Vec::new();
    }

    let mut by_source: HashMap<Currency, Vec<Currency>> = HashMap::new();
    for id in effective_rates.keys() {
        by_source.entry(id.base).or_default().push(id.quote);
    }

    let mut found = Vec::new();
    let mut path = vec![start];
    let mut visited: HashSet<Currency> = HashSet::from([start]);
    dfs(
        start,
        start,
        max_len,
        &mut path,
        &mut visited,
        effective_rates,
        &by_source,
        &mut found,
    );

    found.retain(|c: &Cycle| c.effective_profit > min_profit);
    found.sort_by(|a, b| {
        b.effective_profit
            .partial_cmp(&a.effective_profit)
            .unwrap()
            .then_with(|| {
                a.edges
                    .iter()
                    .map(InstrumentId::name)
                    .collect::<Vec<_>>()
                    .cmp(&b.edges.iter().map(InstrumentId::name).collect::<Vec<_>>())
            })
    });
    found
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    start: Currency,
    current: Currency,
    max_len: usize,
    path: &mut Vec<Currency>,
    visited: &mut HashSet<Currency>,
    effective_rates: &EffectiveRateBook,
    by_source: &HashMap<Currency, Vec<Currency>>,
    found: &mut Vec<Cycle>,
) {
    let depth = path.len() - 1;
    if depth == max_len {
        if current == start {
            if let Some(cycle) = score_cycle(path, effective_rates) {
                found.push(cycle);
            }
        }
        return;
    }

    let Some(neighbors) = by_source.get(&current) else {
        return;
    };
    for &next in neighbors {
        let is_closing_step = depth + 1 == max_len;
        if next == start {
            if !is_closing_step {
                continue; // start may only reappear at the terminal step
            }
        } else if visited.contains(&next) {
            continue; // intermediate vertices must be distinct
        }

        path.push(next);
        let inserted = visited.insert(next);
        dfs(
            start,
            next,
            max_len,
            path,
            visited,
            effective_rates,
            by_source,
            found,
        );
        if inserted {
            visited.remove(&next);
        }
        path.pop();
    }
}

fn score_cycle(path: &[Currency], effective_rates: &EffectiveRateBook) -> Option<Cycle> {
    let mut edges = Vec::with_capacity(path.len() - 1);
    let mut profit_ratio = 1.0;
    for window in path.windows(2) {
        let id = InstrumentId::new(window[0], window[1]);
        let rate = *effective_rates.get(&id)?;
        profit_ratio *= rate;
        edges.push(id);
    }
    let k = edges.len();
    let effective_profit = profit_ratio - 1.0 - FEE_PER_LEG * k as f64;
    Some(Cycle {
        edges,
        profit_ratio,
        effective_profit,
    })
}

/// Diagnostic-only scans from `original_source/strategies/arbitrage.py`.
/// Neither function feeds sizing, circuit breakers, or execution — they
/// exist purely to surface cross-rate discrepancies for observability.
pub mod diagnostics {
    use super::*;
    use crate::rates::RateBook;

    #[derive(Debug, Clone)]
    pub struct CrossRateOpportunity {
        pub base: Currency,
        pub mid: Currency,
        pub quote: Currency,
        pub direct_rate: f64,
        pub cross_rate: f64,
        pub discrepancy: f64,
    }

    /// Compare a direct `(base, quote)` mid rate against the implied cross
    /// rate through every reachable intermediate currency.
    pub fn cross_rate_opportunities(book: &RateBook) -> Vec<CrossRateOpportunity> {
        let mut by_source: HashMap<Currency, Vec<Currency>> = HashMap::new();
        for id in book.keys() {
            by_source.entry(id.base).or_default().push(id.quote);
        }

        let mut opportunities = Vec::new();
        for (&base, mids) in &by_source {
            for &mid in mids {
                let Some(seconds) = by_source.get(&mid) else {
                    continue;
                };
                for &quote in seconds {
                    let direct_id = InstrumentId::new(base, quote);
                    let Some(direct) = book.get(&direct_id) else {
                        continue;
                    };
                    let first_leg = book[&InstrumentId::new(base, mid)].mid;
                    let second_leg = book[&InstrumentId::new(mid, quote)].mid;
                    let cross_rate = first_leg * second_leg;
                    let discrepancy = (direct.mid - cross_rate).abs() / direct.mid;
                    if discrepancy > 0.0005 {
                        opportunities.push(CrossRateOpportunity {
                            base,
                            mid,
                            quote,
                            direct_rate: direct.mid,
                            cross_rate,
                            discrepancy,
                        });
                    }
                }
            }
        }
        opportunities.sort_by(|a, b| b.discrepancy.partial_cmp(&a.discrepancy).unwrap());
        opportunities
    }

    /// Simpler always-3-leg mid-price-only scan (no fee/spread adjustment).
    pub fn triangular_opportunities(book: &RateBook, min_profit: f64) -> Vec<(Vec<Currency>, f64)> {
        let currencies: HashSet<Currency> = book
            .keys()
            .flat_map(|id| [id.base, id.quote])
            .collect();

        let mut out = Vec::new();
        for &a in &currencies {
            for &b in &currencies {
                if b == a {
                    continue;
                }
                for &c in &currencies {
                    if c == a || c == b {
                        continue;
                    }
                    let legs = [
                        InstrumentId::new(a, b),
                        InstrumentId::new(b, c),
                        InstrumentId::new(c, a),
                    ];
                    if legs.iter().all(|l| book.contains_key(l)) {
                        let ratio: f64 = legs.iter().map(|l| book[l].mid).product();
                        if ratio > 1.0 + min_profit {
                            out.push((vec![a, b, c], ratio));
                        }
                    }
                }
            }
        }
        out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateBook;
    use chrono::Utc;

    fn cur(s: &str) -> Currency {
        Currency::new(s).unwrap()
    }

    fn effective_rates(pairs: &[(&str, &str, f64)]) -> EffectiveRateBook {
        pairs
            .iter()
            .map(|&(b, q, r)| (InstrumentId::new(cur(b), cur(q)), r))
            .collect()
    }

    #[test]
    fn triangle_arbitrage_detected() {
        let rates = effective_rates(&[
            ("USD", "EUR", 0.9),
            ("EUR", "GBP", 0.9),
            ("GBP", "USD", 1.25),
        ]);
        let cycles = find_cycles(&rates, cur("USD"), 3, 0.001);
        assert_eq!(cycles.len(), 1);
        let c = &cycles[0];
        assert!((c.profit_ratio - 1.0125).abs() < 1e-9);
        assert!((c.effective_profit - 0.0122).abs() < 1e-6);
    }

    #[test]
    fn unprofitable_after_fees_is_filtered() {
        let rates = effective_rates(&[
            ("USD", "EUR", 0.9),
            ("EUR", "GBP", 0.9),
            ("GBP", "USD", 1.237),
        ]);
        let cycles = find_cycles(&rates, cur("USD"), 3, 0.001);
        assert_eq!(cycles.len(), 1);
        assert!((cycles[0].effective_profit - 0.00167).abs() < 1e-5);

        let rates_tight = effective_rates(&[
            ("USD", "EUR", 0.9),
            ("EUR", "GBP", 0.9),
            ("GBP", "USD", 1.235),
        ]);
        let cycles_tight = find_cycles(&rates_tight, cur("USD"), 3, 0.001);
        assert!(cycles_tight.is_empty());
    }

    #[test]
    fn missing_edge_yields_no_cycle() {
        let rates = effective_rates(&[("USD", "EUR", 0.9), ("EUR", "GBP", 0.9)]);
        let cycles = find_cycles(&rates, cur("USD"), 3, 0.001);
        assert!(cycles.is_empty());
    }

    #[test]
    fn empty_book_yields_no_cycles() {
        let rates: EffectiveRateBook = HashMap::new();
        assert!(find_cycles(&rates, cur("USD"), 3, 0.001).is_empty());
    }

    #[test]
    fn zero_threshold_admits_fee_clearing_cycles() {
        let rates = effective_rates(&[
            ("USD", "EUR", 0.9),
            ("EUR", "GBP", 0.9),
            ("GBP", "USD", 1.236),
        ]);
        let cycles = find_cycles(&rates, cur("USD"), 3, 0.0);
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn degenerate_two_leg_cycle_detected() {
        let rates = effective_rates(&[("AAA", "BBB", 1.0), ("BBB", "AAA", 1.0021)]);
        let cycles = find_cycles(&rates, cur("AAA"), 2, 0.001);
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn results_sorted_descending_by_profit() {
        let rates = effective_rates(&[
            ("USD", "EUR", 0.9),
            ("EUR", "USD", 1.14),
            ("USD", "GBP", 0.8),
            ("GBP", "USD", 1.28),
        ]);
        let cycles = find_cycles(&rates, cur("USD"), 2, 0.0);
        assert!(cycles.windows(2).all(|w| w[0].effective_profit >= w[1].effective_profit));
    }

    #[test]
    fn diagnostics_do_not_feed_cycle_search() {
        let mut book: RateBook = HashMap::new();
        let q = crate::domain::Quote::new(0.9, 0.901, Utc::now()).unwrap();
        book.insert(InstrumentId::new(cur("USD"), cur("EUR")), q);
        let opportunities = diagnostics::cross_rate_opportunities(&book);
        assert!(opportunities.is_empty());
    }
}
