//! # Path Simulator
//!
//! $$
//! R = \mu\mathbf 1^\top + L Z,\quad r_t = w^\top R_{\cdot t},\quad V_t = V_0\prod_{s=1}^{t}(1+r_s)
//! $$
//!
//! Correlated multi-asset Monte Carlo. Shocks are treated as simple returns, so a tail draw
//! with `r_t < -1` flips the sign of a path. That is a property of the model and is kept;
//! it is reported through a warning, never clamped.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use ndarray::parallel::prelude::*;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayViewMut1;
use ndarray::Axis;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::StandardNormal;
use rayon::ThreadPoolBuilder;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::config::CancelToken;
use super::config::Execution;
use super::config::SimulationConfig;
use super::factor::CovarianceFactor;
use crate::error::PortfolioError;
use crate::error::Result;

/// `D x M` matrix of portfolio values; column `m` is simulation `m`, row `d` is day `d + 1`.
/// With `D = 0` it is a single row holding the initial value.
pub type PathMatrix = Array2<f64>;

const WEIGHT_SUM_TOL: f64 = 1e-6;

#[inline(always)]
fn splitmix64_next(state: &mut u64) -> u64 {
  *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
  let mut z = *state;
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
  z ^ (z >> 31)
}

/// Seed of the private random stream for simulation `index`.
///
/// Streams depend only on `(base, index)`, so results do not change with the
/// execution mode or the number of workers.
pub fn stream_seed(base: u64, index: usize) -> u64 {
  let mut state = base ^ (index as u64).wrapping_mul(0xd1b5_4a32_d192_ed03);
  splitmix64_next(&mut state)
}

struct RunContext<'c> {
  seed: u64,
  days: usize,
  requested: usize,
  cancel: &'c CancelToken,
  progress: &'c (dyn Fn(usize) + Sync),
  completed: AtomicUsize,
}

/// Simulates portfolio value paths from an expected return vector, a covariance factor and weights.
#[derive(Clone, Debug)]
pub struct PathSimulator<'a> {
  mean: &'a Array1<f64>,
  factor: &'a CovarianceFactor,
  weights: &'a Array1<f64>,
  initial_value: f64,
}

impl<'a> PathSimulator<'a> {
  /// `weights` must already sum to one, `initial_value` must be positive.
  pub fn new(
    mean: &'a Array1<f64>,
    factor: &'a CovarianceFactor,
    weights: &'a Array1<f64>,
    initial_value: f64,
  ) -> Result<Self> {
    let n = factor.dim();
    if mean.len() != n {
      return Err(PortfolioError::dimension_mismatch(
        "mean vector",
        n,
        mean.len(),
      ));
    }
    if weights.len() != n {
      return Err(PortfolioError::dimension_mismatch(
        "weight vector",
        n,
        weights.len(),
      ));
    }
    if !(initial_value.is_finite() && initial_value > 0.0) {
      return Err(PortfolioError::domain(format!(
        "initial value must be positive, got {initial_value}"
      )));
    }
    if mean.iter().chain(weights.iter()).any(|v| !v.is_finite()) {
      return Err(PortfolioError::domain(
        "mean and weight vectors must be finite",
      ));
    }
    let total = weights.sum();
    if (total - 1.0).abs() > WEIGHT_SUM_TOL {
      return Err(PortfolioError::domain(format!(
        "weights must sum to 1, got {total}"
      )));
    }

    Ok(Self {
      mean,
      factor,
      weights,
      initial_value,
    })
  }

  pub fn initial_value(&self) -> f64 {
    self.initial_value
  }

  pub fn simulate(&self, config: &SimulationConfig) -> Result<PathMatrix> {
    self.simulate_with_cancel(config, &CancelToken::new())
  }

  /// Run `config.num_simulations` paths, checking `cancel` before each one starts.
  pub fn simulate_with_cancel(
    &self,
    config: &SimulationConfig,
    cancel: &CancelToken,
  ) -> Result<PathMatrix> {
    self.simulate_with_progress(config, cancel, &|_| {})
  }

  /// Like [`Self::simulate_with_cancel`], calling `progress` with the number of finished
  /// simulations after each one completes. Under parallel execution the callback runs on
  /// worker threads and counts may arrive out of order.
  pub fn simulate_with_progress(
    &self,
    config: &SimulationConfig,
    cancel: &CancelToken,
    progress: &(dyn Fn(usize) + Sync),
  ) -> Result<PathMatrix> {
    let seed = config.seed.unwrap_or_else(|| {
      let seed = rand::random::<u64>();
      debug!(seed, "no seed supplied, drew one");
      seed
    });

    let mut paths = Array2::from_elem(
      (config.rows(), config.num_simulations),
      self.initial_value,
    );
    if config.num_days == 0 || config.num_simulations == 0 {
      return Ok(paths);
    }

    let ctx = RunContext {
      seed,
      days: config.num_days,
      requested: config.num_simulations,
      cancel,
      progress,
      completed: AtomicUsize::new(0),
    };

    match config.execution {
      Execution::Serial => paths
        .axis_iter_mut(Axis(1))
        .enumerate()
        .try_for_each(|(m, column)| self.run_one(&ctx, m, column))?,
      Execution::Parallel { threads: None } => paths
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .try_for_each(|(m, column)| self.run_one(&ctx, m, column))?,
      Execution::Parallel {
        threads: Some(threads),
      } => {
        let pool = ThreadPoolBuilder::new()
          .num_threads(threads)
          .build()
          .map_err(|e| PortfolioError::config(format!("cannot build worker pool: {e}")))?;
        pool.install(|| {
          paths
            .axis_iter_mut(Axis(1))
            .into_par_iter()
            .enumerate()
            .try_for_each(|(m, column)| self.run_one(&ctx, m, column))
        })?
      }
    }

    let breached = paths
      .axis_iter(Axis(1))
      .filter(|path| path.iter().any(|v| *v <= 0.0))
      .count();
    if breached > 0 {
      warn!(
        breached,
        simulations = config.num_simulations,
        "simulated paths reached a non-positive portfolio value"
      );
    }

    info!(
      simulations = config.num_simulations,
      days = config.num_days,
      assets = self.factor.dim(),
      seed,
      "simulated portfolio paths"
    );

    Ok(paths)
  }

  fn run_one(&self, ctx: &RunContext<'_>, m: usize, column: ArrayViewMut1<'_, f64>) -> Result<()> {
    if ctx.cancel.is_cancelled() {
      return Err(PortfolioError::Cancelled {
        completed: ctx.completed.load(Ordering::Acquire),
        requested: ctx.requested,
      });
    }
    self.fill_path(stream_seed(ctx.seed, m), ctx.days, column);
    let done = ctx.completed.fetch_add(1, Ordering::AcqRel) + 1;
    (ctx.progress)(done);
    Ok(())
  }

  fn fill_path(&self, seed: u64, days: usize, mut column: ArrayViewMut1<'_, f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let z = Array2::<f64>::random_using((self.factor.dim(), days), StandardNormal, &mut rng);

    let mut daily = self.factor.correlate(&z);
    daily += &self.mean.view().insert_axis(Axis(1));
    let portfolio = self.weights.dot(&daily);

    let mut growth = 1.0;
    for (slot, r) in column.iter_mut().zip(portfolio.iter()) {
      growth *= 1.0 + r;
      *slot = self.initial_value * growth;
    }
  }
}
