//! # Market Input Estimation
//!
//! $$
//! r_{t,i}=\frac{P_{t,i}}{P_{t-1,i}}-1,\qquad \hat\mu_i=\frac1T\sum_t r_{t,i},\qquad
//! \hat\Sigma=\frac{1}{T-1}\sum_t (r_t-\hat\mu)(r_t-\hat\mu)^\top
//! $$
//!
//! Builds the simulator inputs from a price history and the current share counts.

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use crate::assets::AssetSet;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::simulation::forecast;
use crate::simulation::Forecast;
use crate::simulation::SimulationConfig;

/// Period-over-period simple returns of a `T x N` price history (rows are dates).
/// Rows with any non-finite return are dropped.
pub fn simple_returns(prices: ArrayView2<f64>) -> Array2<f64> {
  if prices.nrows() < 2 {
    return Array2::zeros((0, prices.ncols()));
  }

  let raw = &prices.slice(s![1.., ..]) / &prices.slice(s![..-1, ..]) - 1.0;
  let keep: Vec<usize> = raw
    .axis_iter(Axis(0))
    .enumerate()
    .filter(|(_, row)| row.iter().all(|r| r.is_finite()))
    .map(|(t, _)| t)
    .collect();
  raw.select(Axis(0), &keep)
}

/// Column means of a `T x N` return matrix.
pub fn mean_returns(returns: ArrayView2<f64>) -> Result<Array1<f64>> {
  if returns.nrows() == 0 {
    return Err(PortfolioError::empty_input("mean returns"));
  }
  returns
    .mean_axis(Axis(0))
    .ok_or_else(|| PortfolioError::empty_input("mean returns"))
}

/// Sample covariance (denominator `T - 1`) of a `T x N` return matrix.
pub fn sample_covariance(returns: ArrayView2<f64>) -> Result<Array2<f64>> {
  if returns.nrows() < 2 {
    return Err(PortfolioError::domain(format!(
      "sample covariance needs at least two observations, got {}",
      returns.nrows()
    )));
  }
  returns
    .t()
    .cov(1.0)
    .map_err(|e| PortfolioError::numerical(format!("sample covariance: {e}")))
}

/// Market-value weights and total value of the current book.
///
/// Assets without a recorded share count are counted as holding one share.
pub fn market_weights(latest_prices: &[f64], shares: &[Option<f64>]) -> Result<(Array1<f64>, f64)> {
  if latest_prices.len() != shares.len() {
    return Err(PortfolioError::dimension_mismatch(
      "share counts",
      latest_prices.len(),
      shares.len(),
    ));
  }

  let mut values = Array1::zeros(latest_prices.len());
  for (i, (&price, held)) in latest_prices.iter().zip(shares).enumerate() {
    if !(price.is_finite() && price > 0.0) {
      return Err(PortfolioError::domain(format!(
        "latest price of asset {i} must be positive, got {price}"
      )));
    }
    let held = held.unwrap_or(1.0);
    if !(held.is_finite() && held >= 0.0) {
      return Err(PortfolioError::domain(format!(
        "shares of asset {i} must be non-negative, got {held}"
      )));
    }
    values[i] = price * held;
  }

  let total = values.sum();
  if total <= 0.0 {
    return Err(PortfolioError::domain(
      "current holdings have no market value",
    ));
  }
  Ok((values / total, total))
}

/// Everything the path simulator needs, estimated from history.
#[derive(Clone, Debug)]
pub struct MarketInputs {
  pub assets: AssetSet,
  pub mean: Array1<f64>,
  pub covariance: Array2<f64>,
  pub weights: Array1<f64>,
  pub initial_value: f64,
}

impl MarketInputs {
  /// `prices` is `T x N` with columns in `assets` order; its last row is taken as the current quote.
  pub fn from_history(
    assets: AssetSet,
    prices: ArrayView2<f64>,
    shares: &[Option<f64>],
  ) -> Result<Self> {
    assets.check_len("price history columns", prices.ncols())?;
    assets.check_len("share counts", shares.len())?;

    let latest = prices
      .rows()
      .into_iter()
      .last()
      .ok_or_else(|| PortfolioError::empty_input("price history"))?
      .to_vec();

    let returns = simple_returns(prices);
    let mean = mean_returns(returns.view())?;
    let covariance = sample_covariance(returns.view())?;
    let (weights, initial_value) = market_weights(&latest, shares)?;

    Ok(Self {
      assets,
      mean,
      covariance,
      weights,
      initial_value,
    })
  }

  pub fn forecast(&self, config: &SimulationConfig) -> Result<Forecast> {
    forecast(
      &self.mean,
      &self.covariance,
      &self.weights,
      self.initial_value,
      config,
    )
  }
}
