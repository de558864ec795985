//! # Assets
//!
//! $$
//! w_i \leftarrow \frac{w_i}{\sum_j w_j}
//! $$
//!
//! Ordered ticker universe and weight normalization shared by both halves of the crate.

use std::collections::HashSet;

use ndarray::Array1;

use crate::error::PortfolioError;
use crate::error::Result;

/// Ordered set of distinct tickers. Every vector and matrix handed to the
/// simulator or the solver is indexed in this order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetSet {
  tickers: Vec<String>,
}

impl AssetSet {
  /// Build an asset set, rejecting empty or repeated tickers.
  pub fn new<I, S>(tickers: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
    let mut seen = HashSet::with_capacity(tickers.len());
    for ticker in &tickers {
      if ticker.trim().is_empty() {
        return Err(PortfolioError::domain("ticker must not be empty"));
      }
      if !seen.insert(ticker.as_str()) {
        return Err(PortfolioError::domain(format!(
          "ticker {ticker} appears more than once"
        )));
      }
    }
    Ok(Self { tickers })
  }

  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.tickers.get(index).map(String::as_str)
  }

  pub fn position(&self, ticker: &str) -> Option<usize> {
    self.tickers.iter().position(|t| t == ticker)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.tickers.iter().map(String::as_str)
  }

  /// Fail unless `actual` matches the number of assets.
  pub fn check_len(&self, context: &str, actual: usize) -> Result<()> {
    if actual != self.len() {
      return Err(PortfolioError::dimension_mismatch(
        context,
        self.len(),
        actual,
      ));
    }
    Ok(())
  }
}

/// Scale non-negative weights so they sum to one.
///
/// Zeros are allowed; an all-zero (or empty) vector is an allocation error,
/// negative or non-finite entries are domain errors.
pub fn normalize_weights(weights: &[f64]) -> Result<Array1<f64>> {
  if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
    return Err(PortfolioError::domain(format!(
      "weights must be finite and non-negative, got {bad}"
    )));
  }

  let largest = weights.iter().copied().fold(0.0, f64::max);
  if largest <= 0.0 {
    return Err(PortfolioError::allocation(
      "weights sum to zero after alignment to the asset set",
    ));
  }

  let total: f64 = weights.iter().sum();
  if total.is_finite() {
    return Ok(weights.iter().map(|w| w / total).collect());
  }

  // sum overflowed: rescale by the largest weight first
  let scaled: Vec<f64> = weights.iter().map(|w| w / largest).collect();
  let total: f64 = scaled.iter().sum();
  Ok(scaled.iter().map(|w| w / total).collect())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn asset_set_rejects_duplicates() {
    let err = AssetSet::new(["AAA", "BBB", "AAA"]).unwrap_err();
    assert!(err.is_domain());
    assert!(AssetSet::new(["AAA", " "]).is_err());
  }

  #[test]
  fn asset_set_keeps_order() -> anyhow::Result<()> {
    let assets = AssetSet::new(["MSFT", "AAPL", "GOOG"])?;
    assert_eq!(assets.len(), 3);
    assert_eq!(assets.get(1), Some("AAPL"));
    assert_eq!(assets.position("GOOG"), Some(2));
    assert!(assets.check_len("prices", 2).is_err());
    Ok(())
  }

  #[test]
  fn normalized_weights_sum_to_one() -> anyhow::Result<()> {
    for raw in [
      vec![1.0, 2.0, 3.0],
      vec![0.0, 0.0, 5.0],
      vec![1e-9, 3e9, 0.25],
      vec![0.6, 0.4],
    ] {
      let w = normalize_weights(&raw)?;
      assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
    }
    Ok(())
  }

  #[test]
  fn zero_weights_are_an_allocation_error() {
    assert!(normalize_weights(&[0.0, 0.0]).unwrap_err().is_allocation());
    assert!(normalize_weights(&[]).unwrap_err().is_allocation());
    assert!(normalize_weights(&[1.0, -0.5]).unwrap_err().is_domain());
    assert!(normalize_weights(&[f64::NAN]).unwrap_err().is_domain());
  }

  #[test]
  fn huge_finite_weights_still_normalize() -> anyhow::Result<()> {
    let w = normalize_weights(&[1e308, 1e308, 5e307])?;
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(w[0], 0.4, epsilon = 1e-12);
    assert_abs_diff_eq!(w[2], 0.2, epsilon = 1e-12);

    let tiny = normalize_weights(&[5e-324, 5e-324])?;
    assert_abs_diff_eq!(tiny[0], 0.5, epsilon = 1e-12);
    Ok(())
  }
}
