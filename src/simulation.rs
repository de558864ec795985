//! # Simulation
//!
//! $$
//! (\mu,\Sigma,w,V_0)\xrightarrow{\ \text{Cholesky}\ }L\xrightarrow{\ \text{paths}\ }V\in\mathbb R^{D\times M}\xrightarrow{\ \text{summary}\ }(\bar\rho,s)
//! $$
//!
//! "What will happen" half of the crate: factor the covariance once, simulate
//! correlated value paths, summarize terminal returns.
//!
//! | Module      | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | [`factor`]  | Cholesky factor of the asset covariance matrix.           |
//! | [`config`]  | Run size, seed, execution mode and cancellation.          |
//! | [`paths`]   | Correlated Monte Carlo path simulator.                    |
//! | [`summary`] | Terminal return statistics and before/after comparison.   |

pub mod config;
pub mod factor;
pub mod paths;
pub mod summary;

use ndarray::Array1;
use ndarray::Array2;

pub use config::CancelToken;
pub use config::Execution;
pub use config::SimulationConfig;
pub use factor::CovarianceFactor;
pub use factor::FactorMode;
pub use paths::PathMatrix;
pub use paths::PathSimulator;
pub use summary::OutcomeComparison;
pub use summary::TerminalStats;

use crate::error::Result;

/// Simulated paths together with their terminal statistics.
#[derive(Clone, Debug)]
pub struct Forecast {
  pub paths: PathMatrix,
  pub initial_value: f64,
  /// `None` when no simulations were requested.
  pub stats: Option<TerminalStats>,
}

/// Factor, simulate and summarize in one call.
pub fn forecast(
  mean: &Array1<f64>,
  cov: &Array2<f64>,
  weights: &Array1<f64>,
  initial_value: f64,
  config: &SimulationConfig,
) -> Result<Forecast> {
  forecast_with_cancel(mean, cov, weights, initial_value, config, &CancelToken::new())
}

pub fn forecast_with_cancel(
  mean: &Array1<f64>,
  cov: &Array2<f64>,
  weights: &Array1<f64>,
  initial_value: f64,
  config: &SimulationConfig,
  cancel: &CancelToken,
) -> Result<Forecast> {
  let factor = CovarianceFactor::new(cov)?;
  let simulator = PathSimulator::new(mean, &factor, weights, initial_value)?;
  let paths = simulator.simulate_with_cancel(config, cancel)?;
  let stats = if paths.ncols() == 0 {
    None
  } else {
    Some(TerminalStats::from_paths(paths.view(), initial_value)?)
  };

  Ok(Forecast {
    paths,
    initial_value,
    stats,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn forecast_runs_end_to_end() -> anyhow::Result<()> {
    let mean = array![0.0005, 0.0003, 0.0008];
    let cov = array![
      [0.00020, 0.00005, 0.00002],
      [0.00005, 0.00010, 0.00001],
      [0.00002, 0.00001, 0.00040]
    ];
    let weights = array![0.5, 0.3, 0.2];
    let config = SimulationConfig::new(200, 60)?.with_seed(2024);

    let out = forecast(&mean, &cov, &weights, 100_000.0, &config)?;
    assert_eq!(out.paths.dim(), (60, 200));
    let stats = out.stats.expect("simulations were requested");
    assert_eq!(stats.count, 200);
    assert!(stats.std > 0.0);
    // daily drift ~0.05% over 60 days
    assert!(stats.mean > -0.1 && stats.mean < 0.15);
    Ok(())
  }

  #[test]
  fn forecast_without_simulations_has_no_stats() -> anyhow::Result<()> {
    let out = forecast(
      &array![0.0],
      &array![[0.01]],
      &array![1.0],
      10.0,
      &SimulationConfig::new(0, 5)?.with_seed(1),
    )?;
    assert!(out.stats.is_none());
    assert_eq!(out.paths.ncols(), 0);
    Ok(())
  }

  #[test]
  fn forecast_surfaces_numerical_error() -> anyhow::Result<()> {
    let err = forecast(
      &array![0.0, 0.0],
      &array![[1.0, 2.0], [2.0, 1.0]],
      &array![0.5, 0.5],
      10.0,
      &SimulationConfig::new(5, 5)?.with_seed(1),
    )
    .unwrap_err();
    assert!(err.is_numerical());
    Ok(())
  }

  #[test]
  fn flat_forecast_has_zero_dispersion() -> anyhow::Result<()> {
    let out = forecast(
      &array![0.0],
      &array![[0.0]],
      &array![1.0],
      1000.0,
      &SimulationConfig::new(10, 5)?.with_seed(5),
    )?;
    let stats = out.stats.expect("ten simulations");
    assert_abs_diff_eq!(stats.mean, 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(stats.std, 0.0, epsilon = 1e-15);
    Ok(())
  }
}
