//! # Rebalance
//!
//! $$
//! \Delta_i = q^{\text{after}}_i p_i - q^{\text{before}}_i p_i
//! $$
//!
//! Turns current holdings plus target weights into a whole-share plan, and compares two books.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;
use tracing::warn;

use super::holdings::align_weights;
use super::holdings::Holdings;
use super::holdings::PriceBook;
use super::solver::AllocationResult;
use super::solver::AllocationSolver;
use crate::assets::AssetSet;
use crate::error::PortfolioError;
use crate::error::Result;

/// Whole-share target book for the currently held, priced tickers.
#[derive(Clone, Debug, PartialEq)]
pub struct RebalancePlan {
  /// Prices used, in `allocation.assets` order.
  pub prices: Vec<f64>,
  /// Market value of the current holdings, which is the budget being reallocated.
  pub total_value: f64,
  pub allocation: AllocationResult,
  /// Held tickers left out because no price was available.
  pub excluded: Vec<String>,
}

impl RebalancePlan {
  pub fn assets(&self) -> &AssetSet {
    &self.allocation.assets
  }

  pub fn target_holdings(&self) -> Holdings {
    Holdings::from_allocation(&self.allocation)
  }

  pub fn allocated_value(&self) -> f64 {
    self.allocation.invested(&self.prices)
  }
}

/// Reallocate the market value of `current` according to `weights`.
///
/// A held ticker without a price is excluded with a warning rather than
/// treated as worthless.
pub fn plan_rebalance<I, S>(
  current: &Holdings,
  weights: I,
  prices: &PriceBook,
  solver: &AllocationSolver,
) -> Result<RebalancePlan>
where
  I: IntoIterator<Item = (S, f64)>,
  S: AsRef<str>,
{
  let mut tickers = Vec::with_capacity(current.len());
  let mut quotes = Vec::with_capacity(current.len());
  let mut excluded = Vec::new();
  let mut total_value = 0.0;

  for (ticker, shares) in current.iter() {
    match prices.get(ticker)? {
      Some(price) => {
        tickers.push(ticker.to_string());
        quotes.push(price);
        total_value += shares * price;
      }
      None => {
        warn!(ticker, "no price for held ticker, excluding it from allocation");
        excluded.push(ticker.to_string());
      }
    }
  }

  if tickers.is_empty() {
    return Err(PortfolioError::allocation(
      "no held ticker has a price to allocate against",
    ));
  }

  let assets = AssetSet::new(tickers)?;
  let aligned = align_weights(&assets, weights)?;
  debug!(
    assets = assets.len(),
    excluded = excluded.len(),
    total_value,
    "aligned weights to priced holdings"
  );

  let allocation = solver.solve(&assets, &aligned, &quotes, total_value)?;

  Ok(RebalancePlan {
    prices: quotes,
    total_value,
    allocation,
    excluded,
  })
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiffRow {
  pub ticker: String,
  pub price: f64,
  pub before_shares: f64,
  pub after_shares: f64,
  pub delta_shares: f64,
  pub before_value: f64,
  pub after_value: f64,
  pub delta_value: f64,
}

/// Per-ticker comparison of two books valued at the same prices.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldingsDiff {
  /// Sorted by `delta_value`, largest gain first.
  pub rows: Vec<DiffRow>,
  pub total_before: f64,
  pub total_after: f64,
  pub difference: f64,
  /// Tickers in either book without a price.
  pub unpriced: Vec<String>,
}

impl HoldingsDiff {
  pub fn compare(before: &Holdings, after: &Holdings, prices: &PriceBook) -> Result<Self> {
    let universe: BTreeSet<&str> = before.tickers().chain(after.tickers()).collect();

    let mut rows = Vec::with_capacity(universe.len());
    let mut unpriced = Vec::new();
    for ticker in universe {
      let Some(price) = prices.get(ticker)? else {
        warn!(ticker, "no price for ticker, leaving it out of the comparison");
        unpriced.push(ticker.to_string());
        continue;
      };

      let before_shares = before.shares(ticker);
      let after_shares = after.shares(ticker);
      let before_value = before_shares * price;
      let after_value = after_shares * price;
      rows.push(DiffRow {
        ticker: ticker.to_string(),
        price,
        before_shares,
        after_shares,
        delta_shares: after_shares - before_shares,
        before_value,
        after_value,
        delta_value: after_value - before_value,
      });
    }

    rows.sort_by(|a, b| match b.delta_value.total_cmp(&a.delta_value) {
      Ordering::Equal => a.ticker.cmp(&b.ticker),
      other => other,
    });

    let total_before: f64 = rows.iter().map(|r| r.before_value).sum();
    let total_after: f64 = rows.iter().map(|r| r.after_value).sum();

    Ok(Self {
      rows,
      total_before,
      total_after,
      difference: total_after - total_before,
      unpriced,
    })
  }
}
