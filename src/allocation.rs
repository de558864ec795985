//! # Allocation
//!
//! $$
//! \sum_i n_i p_i + c = V,\qquad n_i\in\mathbb N,\ c\ge 0
//! $$
//!
//! "What to actually buy" half of the crate: whole-share holdings from target weights.

pub mod holdings;
pub mod rebalance;
pub mod solver;

pub use holdings::align_weights;
pub use holdings::Holdings;
pub use holdings::PriceBook;
pub use rebalance::plan_rebalance;
pub use rebalance::DiffRow;
pub use rebalance::HoldingsDiff;
pub use rebalance::RebalancePlan;
pub use solver::AllocationResult;
pub use solver::AllocationSolver;
