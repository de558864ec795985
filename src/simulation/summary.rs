//! # Outcome Summary
//!
//! $$
//! \rho_m = \frac{V_{D,m}}{V_0}-1,\qquad \bar\rho=\frac1M\sum_m\rho_m,\qquad
//! s=\sqrt{\frac1M\sum_m(\rho_m-\bar\rho)^2}
//! $$
//!
//! Cross-simulation statistics of terminal returns.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::QuantileExt;

use crate::error::PortfolioError;
use crate::error::Result;

/// Terminal normalized returns `V_D / V_0 - 1`, one per simulation.
pub fn terminal_returns(paths: ArrayView2<f64>, initial_value: f64) -> Result<Array1<f64>> {
  if !(initial_value.is_finite() && initial_value > 0.0) {
    return Err(PortfolioError::domain(format!(
      "initial value must be positive, got {initial_value}"
    )));
  }
  let last = paths.nrows().checked_sub(1);
  match last {
    Some(row) if paths.ncols() > 0 => Ok(paths.row(row).mapv(|v| v / initial_value - 1.0)),
    _ => Err(PortfolioError::empty_input("terminal returns")),
  }
}

/// Paths rescaled so that the initial value maps to one.
pub fn normalized_paths(paths: ArrayView2<f64>, initial_value: f64) -> Result<Array2<f64>> {
  if !(initial_value.is_finite() && initial_value > 0.0) {
    return Err(PortfolioError::domain(format!(
      "initial value must be positive, got {initial_value}"
    )));
  }
  Ok(paths.mapv(|v| v / initial_value))
}

/// Mean and dispersion of terminal returns over all simulations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerminalStats {
  pub mean: f64,
  /// Population standard deviation.
  pub std: f64,
  pub min: f64,
  pub max: f64,
  /// Share of simulations ending below the initial value.
  pub probability_of_loss: f64,
  pub count: usize,
}

impl TerminalStats {
  /// Summarize a path matrix. Fails with [`PortfolioError::EmptyInput`] when it has no columns.
  pub fn from_paths(paths: ArrayView2<f64>, initial_value: f64) -> Result<Self> {
    let returns = terminal_returns(paths, initial_value)?;
    Self::from_returns(&returns)
  }

  pub fn from_returns(returns: &Array1<f64>) -> Result<Self> {
    let mean = returns
      .mean()
      .ok_or_else(|| PortfolioError::empty_input("terminal statistics"))?;
    let std = returns.std(0.0);
    let min = *returns
      .min()
      .map_err(|e| PortfolioError::numerical(format!("terminal returns: {e}")))?;
    let max = *returns
      .max()
      .map_err(|e| PortfolioError::numerical(format!("terminal returns: {e}")))?;
    let losses = returns.iter().filter(|r| **r < 0.0).count();

    Ok(Self {
      mean,
      std,
      min,
      max,
      probability_of_loss: losses as f64 / returns.len() as f64,
      count: returns.len(),
    })
  }

  /// Empirical `q`-quantile of terminal returns, linearly interpolated.
  pub fn quantile(paths: ArrayView2<f64>, initial_value: f64, q: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&q) {
      return Err(PortfolioError::domain(format!(
        "quantile must lie in [0, 1], got {q}"
      )));
    }
    let mut sorted = terminal_returns(paths, initial_value)?.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
  }
}

/// Difference between two simulated outcomes, e.g. current holdings against a rebalanced book.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutcomeComparison {
  pub before: TerminalStats,
  pub after: TerminalStats,
  /// `after.mean - before.mean`
  pub return_change: f64,
  /// `after.std - before.std`
  pub risk_change: f64,
}

impl OutcomeComparison {
  pub fn between(before: TerminalStats, after: TerminalStats) -> Self {
    Self {
      before,
      after,
      return_change: after.mean - before.mean,
      risk_change: after.std - before.std,
    }
  }
}

/// Per-day mean across simulations, handy for a fan chart centre line.
pub fn mean_path(paths: ArrayView2<f64>) -> Option<Array1<f64>> {
  paths.mean_axis(Axis(1))
}
