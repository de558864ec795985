//! # Errors
//!
//! $$
//! \text{call}\to\mathrm{Ok}(x)\ \vert\ \mathrm{Err}(\text{Numerical}\,\vert\,\text{Allocation}\,\vert\,\text{Domain}\,\vert\,\text{Config})
//! $$
//!
//! Every failure is returned to the immediate caller. Nothing in the crate retries.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PortfolioError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// Factorization or estimation broke down numerically.
  #[error("numerical error: {message}")]
  Numerical { message: String },

  /// Weight vector is degenerate after alignment.
  #[error("allocation error: {message}")]
  Allocation { message: String },

  /// A price, value or weight lies outside its valid range.
  #[error("domain error: {message}")]
  Domain { message: String },

  /// Caller-supplied configuration is invalid.
  #[error("config error: {message}")]
  Config { message: String },

  /// A vector or matrix does not match the asset count.
  #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
  DimensionMismatch {
    context: String,
    expected: usize,
    actual: usize,
  },

  /// Nothing to summarize, e.g. a path matrix with no simulations.
  #[error("empty input for {context}")]
  EmptyInput { context: String },

  /// Simulation stopped at a simulation boundary after a cancel request.
  #[error("cancelled after {completed} of {requested} simulations")]
  Cancelled { completed: usize, requested: usize },
}

impl PortfolioError {
  pub fn numerical(message: impl Into<String>) -> Self {
    Self::Numerical {
      message: message.into(),
    }
  }

  pub fn allocation(message: impl Into<String>) -> Self {
    Self::Allocation {
      message: message.into(),
    }
  }

  pub fn domain(message: impl Into<String>) -> Self {
    Self::Domain {
      message: message.into(),
    }
  }

  pub fn config(message: impl Into<String>) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
    Self::DimensionMismatch {
      context: context.into(),
      expected,
      actual,
    }
  }

  pub fn empty_input(context: impl Into<String>) -> Self {
    Self::EmptyInput {
      context: context.into(),
    }
  }

  pub fn is_numerical(&self) -> bool {
    matches!(self, Self::Numerical { .. })
  }

  pub fn is_allocation(&self) -> bool {
    matches!(self, Self::Allocation { .. })
  }

  pub fn is_domain(&self) -> bool {
    matches!(self, Self::Domain { .. })
  }

  pub fn is_config(&self) -> bool {
    matches!(self, Self::Config { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_carries_context() {
    let err = PortfolioError::dimension_mismatch("weights", 3, 2);
    assert_eq!(
      err.to_string(),
      "dimension mismatch in weights: expected 3, got 2"
    );

    let err = PortfolioError::Cancelled {
      completed: 4,
      requested: 10,
    };
    assert_eq!(err.to_string(), "cancelled after 4 of 10 simulations");
  }

  #[test]
  fn predicates_classify_variants() {
    assert!(PortfolioError::numerical("x").is_numerical());
    assert!(PortfolioError::allocation("x").is_allocation());
    assert!(PortfolioError::domain("x").is_domain());
    assert!(PortfolioError::config("x").is_config());
    assert!(!PortfolioError::empty_input("x").is_domain());
  }
}
