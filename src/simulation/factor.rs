//! # Covariance Factor
//!
//! $$
//! \Sigma = L L^\top,\qquad \varepsilon = L z,\ z\sim\mathcal N(0, I)
//! $$
//!
//! Lower-triangular Cholesky factor of an asset covariance matrix. The factor is
//! computed once per call and shared by every simulated draw.

use nalgebra::DMatrix;
use ndarray::Array2;
use ndarray::ArrayView2;
use tracing::debug;

use crate::error::PortfolioError;
use crate::error::Result;

/// Relative tolerance for zero pivots and symmetry.
const PIVOT_TOL: f64 = 1e-12;
const SYMMETRY_TOL: f64 = 1e-9;

/// How strictly the covariance matrix is checked before factorization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FactorMode {
  /// Positive semi-definite input is accepted. Zero pivots produce zero columns in `L`,
  /// so a zero-variance asset contributes no shock.
  #[default]
  SemiDefinite,
  /// Only positive definite input is accepted.
  Strict,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceFactor {
  lower: Array2<f64>,
}

impl CovarianceFactor {
  /// Factor `cov` in [`FactorMode::SemiDefinite`] mode.
  pub fn new(cov: &Array2<f64>) -> Result<Self> {
    Self::with_mode(cov.view(), FactorMode::SemiDefinite)
  }

  /// Factor `cov`, failing unless it is positive definite.
  pub fn strict(cov: &Array2<f64>) -> Result<Self> {
    Self::with_mode(cov.view(), FactorMode::Strict)
  }

  pub fn with_mode(cov: ArrayView2<f64>, mode: FactorMode) -> Result<Self> {
    let n = validate(cov)?;

    let na = DMatrix::from_row_iterator(n, n, cov.iter().copied());
    if let Some(chol) = na.cholesky() {
      let l = chol.l();
      debug!(dim = n, "covariance factored as positive definite");
      return Ok(Self {
        lower: Array2::from_shape_fn((n, n), |(i, j)| l[(i, j)]),
      });
    }

    match mode {
      FactorMode::Strict => Err(PortfolioError::numerical(
        "covariance matrix is not positive definite",
      )),
      FactorMode::SemiDefinite => {
        let lower = semidefinite_cholesky(cov)?;
        debug!(dim = n, "covariance factored as positive semi-definite");
        Ok(Self { lower })
      }
    }
  }

  /// Number of assets.
  pub fn dim(&self) -> usize {
    self.lower.nrows()
  }

  pub fn lower(&self) -> &Array2<f64> {
    &self.lower
  }

  /// `L Lᵀ`, which reproduces the factored covariance.
  pub fn reconstruct(&self) -> Array2<f64> {
    self.lower.dot(&self.lower.t())
  }

  /// Turn independent standard normals (`N x D`) into correlated shocks.
  pub fn correlate(&self, z: &Array2<f64>) -> Array2<f64> {
    self.lower.dot(z)
  }
}

fn validate(cov: ArrayView2<f64>) -> Result<usize> {
  let (rows, cols) = cov.dim();
  if rows != cols {
    return Err(PortfolioError::dimension_mismatch(
      "covariance columns",
      rows,
      cols,
    ));
  }
  if cov.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::numerical(
      "covariance matrix contains non-finite entries",
    ));
  }

  let scale = diagonal_scale(cov);
  for i in 0..rows {
    for j in (i + 1)..rows {
      if (cov[[i, j]] - cov[[j, i]]).abs() > SYMMETRY_TOL * scale {
        return Err(PortfolioError::numerical(format!(
          "covariance matrix is not symmetric at ({i}, {j})"
        )));
      }
    }
  }

  Ok(rows)
}

fn diagonal_scale(cov: ArrayView2<f64>) -> f64 {
  cov
    .diag()
    .iter()
    .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    .max(f64::MIN_POSITIVE)
}

/// Cholesky–Banachiewicz allowing zero pivots. A pivot below `-tol`, or a zero pivot
/// whose column still carries non-zero residuals, means the matrix is indefinite.
fn semidefinite_cholesky(cov: ArrayView2<f64>) -> Result<Array2<f64>> {
  let n = cov.nrows();
  let scale = diagonal_scale(cov);
  let tol = PIVOT_TOL * scale;
  // |Σ_ij| <= sqrt(Σ_ii Σ_jj) bounds what a zero pivot may still couple to
  let coupling_tol = (tol * scale).sqrt();
  let mut l = Array2::<f64>::zeros((n, n));

  for j in 0..n {
    let mut diag = cov[[j, j]];
    for k in 0..j {
      diag -= l[[j, k]] * l[[j, k]];
    }

    if diag < -tol {
      return Err(PortfolioError::numerical(format!(
        "covariance matrix is not positive semi-definite (pivot {j} = {diag:e})"
      )));
    }

    if diag <= tol {
      for i in (j + 1)..n {
        let mut off = cov[[i, j]];
        for k in 0..j {
          off -= l[[i, k]] * l[[j, k]];
        }
        if off.abs() > coupling_tol {
          return Err(PortfolioError::numerical(format!(
            "covariance matrix is not positive semi-definite (zero pivot {j} couples to {i})"
          )));
        }
      }
      continue;
    }

    let pivot = diag.sqrt();
    l[[j, j]] = pivot;
    for i in (j + 1)..n {
      let mut off = cov[[i, j]];
      for k in 0..j {
        off -= l[[i, k]] * l[[j, k]];
      }
      l[[i, j]] = off / pivot;
    }
  }

  Ok(l)
}
