//! # Simulation Config
//!
//! $$
//! \text{cost}\propto M\cdot D\cdot N^2
//! $$
//!
//! Run size, seeding, execution mode and cooperative cancellation for the path simulator.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::PortfolioError;
use crate::error::Result;

/// Where simulations run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Execution {
  /// One simulation after another on the calling thread.
  #[default]
  Serial,
  /// Simulations spread over rayon workers. `None` uses the global pool,
  /// `Some(k)` builds a dedicated pool with `k` threads.
  Parallel { threads: Option<usize> },
}

/// Runtime configuration for [`PathSimulator`](super::PathSimulator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationConfig {
  /// Number of independent paths (`M`).
  pub num_simulations: usize,
  /// Number of simulated periods per path (`D`).
  pub num_days: usize,
  /// Base seed; `None` draws one from the thread RNG.
  pub seed: Option<u64>,
  pub execution: Execution,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      num_simulations: 1000,
      num_days: 252,
      seed: None,
      execution: Execution::Serial,
    }
  }
}

impl SimulationConfig {
  /// Validate signed counts as they arrive from an outer layer.
  pub fn new(num_simulations: i64, num_days: i64) -> Result<Self> {
    let num_simulations = usize::try_from(num_simulations).map_err(|_| {
      PortfolioError::config(format!(
        "number of simulations must be non-negative, got {num_simulations}"
      ))
    })?;
    let num_days = usize::try_from(num_days).map_err(|_| {
      PortfolioError::config(format!(
        "number of days must be non-negative, got {num_days}"
      ))
    })?;

    Ok(Self {
      num_simulations,
      num_days,
      ..Self::default()
    })
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn with_execution(mut self, execution: Execution) -> Self {
    self.execution = execution;
    self
  }

  /// Rows of the resulting path matrix.
  pub fn rows(&self) -> usize {
    self.num_days.max(1)
  }
}

/// Shared flag checked between simulations. Cloning hands out another handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Acquire)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn negative_counts_are_config_errors() {
    assert!(SimulationConfig::new(-1, 10).unwrap_err().is_config());
    assert!(SimulationConfig::new(10, -5).unwrap_err().is_config());
  }

  #[test]
  fn builder_sets_fields() -> anyhow::Result<()> {
    let config = SimulationConfig::new(0, 0)?
      .with_seed(9)
      .with_execution(Execution::Parallel { threads: Some(2) });
    assert_eq!(config.num_simulations, 0);
    assert_eq!(config.rows(), 1);
    assert_eq!(config.seed, Some(9));
    assert_eq!(config.execution, Execution::Parallel { threads: Some(2) });
    Ok(())
  }

  #[test]
  fn cancel_is_visible_through_clones() {
    let token = CancelToken::new();
    let handle = token.clone();
    assert!(!handle.is_cancelled());
    token.cancel();
    assert!(handle.is_cancelled());
  }
}
