//! Duty-Cycle Location Sampling
//!
//! Keeps a location provider on for a short acquisition window once per
//! cycle, buffers the valid fixes it delivers, and picks the most accurate
//! one for upload. While the host process is backgrounded, sampling is kept
//! alive through a pool of execution-budget tokens.

pub mod core;
pub mod validation;
pub mod host;
pub mod budget;
pub mod processing;
pub mod scheduler;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use core::{Coordinate, Fix};
pub use validation::{FixRejection, FixValidator};
pub use host::{
    AccuracyMode, AuthorizationStatus, BudgetToken, DistanceFilter, ExecutionBudgetHost, HostError,
    HostResult, LocationProvider, ProviderErrorKind, UploadTransport,
};
pub use budget::{BudgetSnapshot, ExecutionBudgetPool};
pub use processing::FixBuffer;
pub use scheduler::{
    DutyCycleScheduler, LastLocation, SchedulerHandle, SchedulerMode, SchedulerRuntime, SchedulerSnapshot,
};
pub use api::{Advisory, CallbackHandle, EventDispatcher, TrackerError, TrackerEvent, TrackerResult};
pub use utils::{ConfigError, TrackerConfig};
