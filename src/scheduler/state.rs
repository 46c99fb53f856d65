//! Scheduler state types

use crate::budget::BudgetSnapshot;
use crate::core::{Coordinate, Fix};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the scheduler is in its duty cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerMode {
    /// Not tracking
    Idle,
    /// Provider is sampling in coarse mode
    Acquiring,
    /// Sampling paused until the next cycle re-arms
    CoolingDown,
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerMode::Idle => "idle",
            SchedulerMode::Acquiring => "acquiring",
            SchedulerMode::CoolingDown => "cooling-down",
        };
        f.write_str(name)
    }
}

/// Most recent accepted position, kept independently of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    pub coordinate: Coordinate,
    pub accuracy_m: f64,
}

/// Point-in-time view of a running scheduler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSnapshot {
    pub mode: SchedulerMode,
    pub cycle_timer_armed: bool,
    pub window_timer_armed: bool,
    pub buffered_fixes: usize,
    pub last_good_fix: Option<Fix>,
    pub last_location: Option<LastLocation>,
    pub budget: BudgetSnapshot,
}
