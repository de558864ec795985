//! # Allocation Solver
//!
//! $$
//! n_i=\left\lfloor \frac{w_i V}{p_i}\right\rfloor,\qquad
//! c = V-\sum_i n_i p_i,\qquad \text{top up by residual } w_iV-n_ip_i\ \text{while } c\ge\min_i p_i
//! $$
//!
//! Converts continuous target weights into whole shares under a cash budget.

use std::cmp::Ordering;

use tracing::info;
use tracing::warn;

use crate::assets::normalize_weights;
use crate::assets::AssetSet;
use crate::error::PortfolioError;
use crate::error::Result;

/// Largest share count that is exactly representable, so `n * p` stays an exact dollar figure.
const MAX_SHARES: f64 = 9_007_199_254_740_992.0;

fn whole_shares(ticker: &str, quotient: f64) -> Result<u64> {
  let floor = quotient.floor();
  if !(floor.is_finite() && floor <= MAX_SHARES) {
    return Err(PortfolioError::domain(format!(
      "budget buys {quotient:e} shares of {ticker}, more than {MAX_SHARES:e}"
    )));
  }
  Ok(floor as u64)
}

/// Whole-share holdings and the cash left after buying them.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationResult {
  pub assets: AssetSet,
  /// Share count per asset, in asset-set order.
  pub shares: Vec<u64>,
  pub cash_remaining: f64,
  /// Greedy top-up passes that were run.
  pub passes: usize,
  /// The pass cap stopped the top-up before cash fell below the cheapest price.
  pub pass_limit_reached: bool,
}

impl AllocationResult {
  /// `(ticker, shares)` pairs for downstream persistence.
  pub fn positions(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
    self.assets.iter().zip(self.shares.iter().copied())
  }

  /// Cash spent on shares at `prices`.
  pub fn invested(&self, prices: &[f64]) -> f64 {
    self
      .shares
      .iter()
      .zip(prices)
      .map(|(&n, &p)| n as f64 * p)
      .sum()
  }
}

/// Cash-constrained greedy rounding.
#[derive(Clone, Debug, Default)]
pub struct AllocationSolver {
  max_passes: Option<usize>,
}

impl AllocationSolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Override the pass cap, which defaults to `ceil(V / min p) + N`.
  pub fn with_max_passes(mut self, max_passes: usize) -> Self {
    self.max_passes = Some(max_passes);
    self
  }

  /// Allocate `total_value` across `assets`.
  ///
  /// `weights` may be any non-negative reals; they are normalized first.
  /// Every price must be strictly positive.
  pub fn solve(
    &self,
    assets: &AssetSet,
    weights: &[f64],
    prices: &[f64],
    total_value: f64,
  ) -> Result<AllocationResult> {
    assets.check_len("weights", weights.len())?;
    assets.check_len("prices", prices.len())?;
    if !(total_value.is_finite() && total_value > 0.0) {
      return Err(PortfolioError::domain(format!(
        "total value must be positive, got {total_value}"
      )));
    }
    for (ticker, &price) in assets.iter().zip(prices) {
      if !(price.is_finite() && price > 0.0) {
        return Err(PortfolioError::domain(format!(
          "price of {ticker} must be positive, got {price}"
        )));
      }
    }

    let w = normalize_weights(weights)?;
    let n = assets.len();

    let targets: Vec<f64> = w.iter().map(|wi| wi * total_value).collect();
    let mut shares = Vec::with_capacity(n);
    for ((ticker, t), p) in assets.iter().zip(&targets).zip(prices) {
      shares.push(whole_shares(ticker, t / p)?);
    }

    let spent: f64 = shares
      .iter()
      .zip(prices)
      .map(|(&s, &p)| s as f64 * p)
      .sum();
    let mut cash = (total_value - spent).max(0.0);

    let residuals: Vec<f64> = targets
      .iter()
      .zip(shares.iter().zip(prices))
      .map(|(t, (&s, &p))| t - s as f64 * p)
      .collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| match residuals[b].total_cmp(&residuals[a]) {
      Ordering::Equal => a.cmp(&b),
      other => other,
    });

    let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max_passes = self.max_passes.unwrap_or_else(|| {
      // float to int casts saturate
      ((total_value / min_price).ceil() as usize).saturating_add(n)
    });

    let mut passes = 0;
    while cash >= min_price && passes < max_passes {
      passes += 1;
      for &i in &order {
        if cash >= prices[i] {
          shares[i] = shares[i].checked_add(1).ok_or_else(|| {
            PortfolioError::domain(format!(
              "share count of {} exceeds {}",
              assets.tickers()[i],
              u64::MAX
            ))
          })?;
          cash -= prices[i];
        }
      }
    }

    let pass_limit_reached = cash >= min_price;
    if pass_limit_reached {
      warn!(
        passes,
        cash_remaining = cash,
        min_price,
        "allocation top-up stopped at the pass limit"
      );
    }

    info!(
      assets = n,
      total_value,
      invested = total_value - cash,
      cash_remaining = cash,
      passes,
      "allocated whole shares"
    );

    Ok(AllocationResult {
      assets: assets.clone(),
      shares,
      cash_remaining: cash,
      passes,
      pass_limit_reached,
    })
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;

  fn assets(tickers: &[&str]) -> AssetSet {
    AssetSet::new(tickers.iter().copied()).unwrap()
  }

  fn assert_conserves(result: &AllocationResult, prices: &[f64], total: f64) {
    assert_abs_diff_eq!(
      result.invested(prices) + result.cash_remaining,
      total,
      epsilon = 1e-6
    );
    assert!(result.cash_remaining >= 0.0);
  }

  #[test]
  fn two_asset_leftover_is_unspendable() {
    let set = assets(&["A", "B"]);
    let prices = [120.0, 75.0];
    let result = AllocationSolver::new()
      .solve(&set, &[0.6, 0.4], &prices, 10_000.0)
      .unwrap();

    assert_eq!(result.shares, vec![50, 53]);
    assert_abs_diff_eq!(result.cash_remaining, 25.0, epsilon = 1e-9);
    assert_eq!(result.passes, 0);
    assert!(!result.pass_limit_reached);
    assert_conserves(&result, &prices, 10_000.0);

    let positions: Vec<(&str, u64)> = result.positions().collect();
    assert_eq!(positions, vec![("A", 50), ("B", 53)]);
  }

  #[test]
  fn unnormalized_weights_give_the_same_answer() {
    let set = assets(&["A", "B"]);
    let a = AllocationSolver::new()
      .solve(&set, &[3.0, 2.0], &[120.0, 75.0], 10_000.0)
      .unwrap();
    assert_eq!(a.shares, vec![50, 53]);
  }

  #[test]
  fn repeated_passes_spend_down_cash() {
    // floors: A = 1 (residual 200), B = 12 (residual 20), cash 220
    let set = assets(&["A", "B"]);
    let prices = [300.0, 40.0];
    let result = AllocationSolver::new()
      .solve(&set, &[0.5, 0.5], &prices, 1000.0)
      .unwrap();

    assert_eq!(result.shares, vec![1, 17]);
    assert_abs_diff_eq!(result.cash_remaining, 20.0, epsilon = 1e-9);
    assert_eq!(result.passes, 5);
    assert!(result.cash_remaining < 40.0);
    assert_conserves(&result, &prices, 1000.0);
  }

  #[test]
  fn larger_residual_is_served_first() {
    // floors: A = 3 (residual 80), B = 3 (residual 110), cash 190; order B, A
    let set = assets(&["A", "B"]);
    let prices = [140.0, 130.0];
    let result = AllocationSolver::new()
      .solve(&set, &[0.5, 0.5], &prices, 1000.0)
      .unwrap();

    assert_eq!(result.shares, vec![3, 4]);
    assert_abs_diff_eq!(result.cash_remaining, 60.0, epsilon = 1e-9);
    assert_conserves(&result, &prices, 1000.0);
  }

  #[test]
  fn equal_residuals_fall_back_to_asset_order() {
    // both floors leave 50 of residual, cash 100 buys exactly one share
    let set = assets(&["X", "Y"]);
    let prices = [100.0, 100.0];
    let result = AllocationSolver::new()
      .solve(&set, &[0.5, 0.5], &prices, 1100.0)
      .unwrap();
    assert_eq!(result.shares, vec![6, 5]);
    assert_abs_diff_eq!(result.cash_remaining, 0.0, epsilon = 1e-9);
  }

  #[test]
  fn conservation_and_feasibility_hold_across_inputs() {
    let set = assets(&["A", "B", "C", "D"]);
    let cases: [([f64; 4], [f64; 4], f64); 5] = [
      ([0.25, 0.25, 0.25, 0.25], [13.7, 250.2, 99.99, 4.01], 12_345.67),
      ([1.0, 0.0, 0.0, 0.0], [300.0, 40.0, 55.5, 1000.0], 1000.0),
      ([0.1, 0.2, 0.3, 0.4], [1.0, 1.0, 1.0, 1.0], 10.5),
      ([5.0, 1.0, 0.5, 3.0], [1234.5, 17.25, 0.99, 66.0], 250_000.0),
      ([0.0, 0.0, 0.0, 1.0], [10.0, 20.0, 30.0, 5000.0], 999.0),
    ];

    for (weights, prices, total) in cases {
      let result = AllocationSolver::new()
        .solve(&set, &weights, &prices, total)
        .unwrap();
      assert_conserves(&result, &prices, total);
      let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
      assert!(result.pass_limit_reached || result.cash_remaining < min_price);
    }
  }

  #[test]
  #[traced_test]
  fn pass_cap_is_a_normal_stop() {
    let set = assets(&["A", "B"]);
    let prices = [300.0, 40.0];
    let result = AllocationSolver::new()
      .with_max_passes(1)
      .solve(&set, &[0.5, 0.5], &prices, 1000.0)
      .unwrap();

    assert_eq!(result.shares, vec![1, 13]);
    assert_abs_diff_eq!(result.cash_remaining, 180.0, epsilon = 1e-9);
    assert!(result.pass_limit_reached);
    assert_conserves(&result, &prices, 1000.0);
    assert!(logs_contain("pass limit"));
  }

  #[test]
  fn oversized_budget_is_a_domain_error() {
    let set = assets(&["A", "B"]);
    let solver = AllocationSolver::new();

    let err = solver
      .solve(&set, &[0.5, 0.5], &[1.0, 2.0], 1e20)
      .unwrap_err();
    assert!(err.is_domain());

    let err = solver
      .with_max_passes(3)
      .solve(&set, &[0.5, 0.5], &[1e-15, 2.0], 100.0)
      .unwrap_err();
    assert!(err.is_domain());
  }

  #[test]
  fn pass_cap_saturates_for_tiny_prices() {
    // V / min p = 1e20 is past usize::MAX before N is added
    let set = assets(&["A", "B"]);
    let prices = [1e-10, 1.0];
    let result = AllocationSolver::new()
      .solve(&set, &[0.0, 1.0], &prices, 1e10)
      .unwrap();
    assert_eq!(result.shares, vec![0, 10_000_000_000]);
    assert_eq!(result.cash_remaining, 0.0);
    assert!(!result.pass_limit_reached);
  }

  #[test]
  fn invalid_inputs_are_classified() {
    let set = assets(&["A", "B"]);
    let solver = AllocationSolver::new();

    assert!(solver
      .solve(&set, &[0.0, 0.0], &[10.0, 10.0], 100.0)
      .unwrap_err()
      .is_allocation());
    assert!(solver
      .solve(&set, &[0.5, 0.5], &[10.0, 0.0], 100.0)
      .unwrap_err()
      .is_domain());
    assert!(solver
      .solve(&set, &[0.5, 0.5], &[10.0, -3.0], 100.0)
      .unwrap_err()
      .is_domain());
    assert!(solver
      .solve(&set, &[0.5, 0.5], &[10.0, 10.0], 0.0)
      .unwrap_err()
      .is_domain());
    assert!(matches!(
      solver.solve(&set, &[1.0], &[10.0, 10.0], 100.0),
      Err(PortfolioError::DimensionMismatch { .. })
    ));
  }
}
