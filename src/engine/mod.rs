//! Execution engine for authpol
//!
//! The engine orchestrates:
//! 1. Planning - Pair declarations with tracked state and classify each label
//! 2. Diffing - Show per-attribute drift
//! 3. Executing - Run the lifecycle verbs with bounded parallelism

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::ExecuteOptions;
pub use planner::ExecutionPlan;
