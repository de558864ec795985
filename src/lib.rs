//! # Portfolio Sim
//!
//! $$
//! V_t = V_0\prod_{s\le t}\left(1+w^\top(\mu+L z_s)\right),\qquad \Sigma=LL^\top
//! $$
//!
//! Monte Carlo forecasting of portfolio value paths from correlated asset
//! returns, and whole-share allocation of a cash budget to target weights.
//!
//! | Module           | Description                                                     |
//! |------------------|-----------------------------------------------------------------|
//! | [`assets`]       | Ordered ticker sets and weight normalization.                    |
//! | [`simulation`]   | Covariance factor, path simulator and terminal statistics.       |
//! | [`allocation`]   | Greedy whole-share solver, holdings, rebalance plans and diffs.  |
//! | [`estimate`]     | Mean, covariance and market weights from price history.          |
//! | [`screening`]    | Normalized return entropy for ranking tickers.                   |
//! | [`error`]        | Error kinds shared by every module.                              |

pub mod allocation;
pub mod assets;
pub mod error;
pub mod estimate;
pub mod screening;
pub mod simulation;

pub use allocation::AllocationResult;
pub use allocation::AllocationSolver;
pub use assets::AssetSet;
pub use error::PortfolioError;
pub use error::Result;
pub use estimate::MarketInputs;
pub use simulation::forecast;
pub use simulation::CovarianceFactor;
pub use simulation::PathSimulator;
pub use simulation::SimulationConfig;
pub use simulation::TerminalStats;
