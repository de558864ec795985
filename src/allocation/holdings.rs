//! # Holdings
//!
//! $$
//! V=\sum_{i\in\text{priced}} q_i\,p_i
//! $$
//!
//! Ticker-keyed holdings, prices and weights, and their alignment onto an [`AssetSet`].

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::allocation::solver::AllocationResult;
use crate::assets::AssetSet;
use crate::error::PortfolioError;
use crate::error::Result;

fn normalize_ticker(ticker: &str) -> String {
  ticker.trim().to_uppercase()
}

/// Share counts per ticker. Tickers are upper-cased, repeated tickers are merged
/// by summing their shares, and iteration is in ticker order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Holdings {
  positions: BTreeMap<String, f64>,
}

impl Holdings {
  pub fn new<I, S>(positions: I) -> Result<Self>
  where
    I: IntoIterator<Item = (S, f64)>,
    S: AsRef<str>,
  {
    let mut merged = BTreeMap::new();
    for (ticker, shares) in positions {
      let ticker = normalize_ticker(ticker.as_ref());
      if ticker.is_empty() {
        return Err(PortfolioError::domain("ticker must not be empty"));
      }
      if !(shares.is_finite() && shares >= 0.0) {
        return Err(PortfolioError::domain(format!(
          "shares of {ticker} must be non-negative, got {shares}"
        )));
      }
      *merged.entry(ticker).or_insert(0.0) += shares;
    }
    Ok(Self { positions: merged })
  }

  /// Target holdings produced by the solver.
  pub fn from_allocation(result: &AllocationResult) -> Self {
    Self {
      positions: result
        .positions()
        .map(|(ticker, shares)| (ticker.to_string(), shares as f64))
        .collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  /// Shares held in `ticker`, zero when not held.
  pub fn shares(&self, ticker: &str) -> f64 {
    self
      .positions
      .get(&normalize_ticker(ticker))
      .copied()
      .unwrap_or(0.0)
  }

  pub fn tickers(&self) -> impl Iterator<Item = &str> {
    self.positions.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.positions.iter().map(|(t, s)| (t.as_str(), *s))
  }
}

/// Latest price per ticker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceBook {
  prices: HashMap<String, f64>,
}

impl PriceBook {
  pub fn new<I, S>(prices: I) -> Self
  where
    I: IntoIterator<Item = (S, f64)>,
    S: AsRef<str>,
  {
    Self {
      prices: prices
        .into_iter()
        .map(|(t, p)| (normalize_ticker(t.as_ref()), p))
        .collect(),
    }
  }

  /// `Ok(None)` when the ticker has no quote; a quote that is not a positive
  /// finite number is a domain error.
  pub fn get(&self, ticker: &str) -> Result<Option<f64>> {
    match self.prices.get(&normalize_ticker(ticker)) {
      None => Ok(None),
      Some(&p) if p.is_finite() && p > 0.0 => Ok(Some(p)),
      Some(&p) => Err(PortfolioError::domain(format!(
        "price of {} must be positive, got {p}",
        normalize_ticker(ticker)
      ))),
    }
  }
}

/// Lay ticker-keyed weights onto `assets`. Unlisted assets weigh zero, weights for
/// tickers outside the set are dropped, repeated tickers are summed.
pub fn align_weights<I, S>(assets: &AssetSet, weights: I) -> Result<Vec<f64>>
where
  I: IntoIterator<Item = (S, f64)>,
  S: AsRef<str>,
{
  let mut aligned = vec![0.0; assets.len()];
  for (ticker, weight) in weights {
    let ticker = normalize_ticker(ticker.as_ref());
    if !(weight.is_finite() && weight >= 0.0) {
      return Err(PortfolioError::domain(format!(
        "weight of {ticker} must be non-negative, got {weight}"
      )));
    }
    if let Some(i) = assets.position(&ticker) {
      aligned[i] += weight;
    }
  }
  Ok(aligned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn holdings_merge_and_sort_tickers() -> anyhow::Result<()> {
    let holdings = Holdings::new([("msft", 3.0), ("AAPL", 2.0), (" Msft ", 4.5)])?;
    let rows: Vec<(&str, f64)> = holdings.iter().collect();
    assert_eq!(rows, vec![("AAPL", 2.0), ("MSFT", 7.5)]);
    assert_eq!(holdings.shares("msft"), 7.5);
    assert_eq!(holdings.shares("GOOG"), 0.0);
    Ok(())
  }

  #[test]
  fn holdings_reject_bad_shares() {
    assert!(Holdings::new([("A", -1.0)]).unwrap_err().is_domain());
    assert!(Holdings::new([("", 1.0)]).unwrap_err().is_domain());
  }

  #[test]
  fn price_book_distinguishes_missing_from_invalid() -> anyhow::Result<()> {
    let book = PriceBook::new([("aapl", 190.0), ("BAD", 0.0)]);
    assert_eq!(book.get("AAPL")?, Some(190.0));
    assert_eq!(book.get("GOOG")?, None);
    assert!(book.get("bad").unwrap_err().is_domain());
    Ok(())
  }

  #[test]
  fn weights_align_to_asset_order() -> anyhow::Result<()> {
    let assets = AssetSet::new(["AAPL", "MSFT", "NVDA"])?;
    let aligned = align_weights(&assets, [("nvda", 0.5), ("AAPL", 0.25), ("TSLA", 0.25)])?;
    assert_eq!(aligned, vec![0.25, 0.0, 0.5]);
    assert!(align_weights(&assets, [("AAPL", -0.1)])
      .unwrap_err()
      .is_domain());
    Ok(())
  }
}
