pub mod common;
pub mod ledger;
pub mod liquidity_math;
pub mod orchestrator;
pub mod range_planner;
pub mod tick_math;
pub mod types;
