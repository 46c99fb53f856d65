//! Execution-budget accounting

pub mod pool;

pub use pool::{BudgetSnapshot, ExecutionBudgetPool};
