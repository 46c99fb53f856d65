//! Duty-cycle scheduling
//!
//! [`DutyCycleScheduler`] is the synchronous state machine deciding when the
//! provider samples and when cycles re-arm. [`SchedulerRuntime`] hosts it on a
//! single tokio task so that fix deliveries, timer fires and host lifecycle
//! events are applied one at a time.

pub mod state;
pub mod timers;
pub mod tracker;
pub mod runtime;

pub use state::{LastLocation, SchedulerMode, SchedulerSnapshot};
pub use timers::{ManualTimers, TimerDriver, TimerHandle, TimerKind};
pub use tracker::DutyCycleScheduler;
pub use runtime::{SchedulerHandle, SchedulerRuntime, TokioTimers};
