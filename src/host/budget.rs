//! Execution-budget host interface

use crate::host::HostResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque grant allowing the process to keep running past normal suspension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BudgetToken(u64);

impl BudgetToken {
    /// Sentinel returned when no continuation was granted
    pub const INVALID: BudgetToken = BudgetToken(0);

    pub fn new(id: u64) -> Self {
        BudgetToken(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for BudgetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#invalid")
        }
    }
}

/// Called by the host, at most once and from any thread, when a token's
/// time budget runs out before it was released
pub type ExpirationHandler = Arc<dyn Fn(BudgetToken) + Send + Sync>;

/// Host API granting execution time while the process is backgrounded
pub trait ExecutionBudgetHost: Send + Sync {
    /// Ask to keep running. The host may invoke `on_expire` later, but never
    /// from inside this call.
    fn request_continuation(&self, on_expire: ExpirationHandler) -> HostResult<BudgetToken>;

    /// Hand a grant back to the host
    fn release_continuation(&self, token: BudgetToken) -> HostResult<()>;
}
