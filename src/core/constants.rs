//! Design constants for the sampling duty cycle

use std::time::Duration;

/// Fixes reporting an accuracy at or above this radius (meters) are rejected
pub const ACCURACY_REJECT_THRESHOLD_M: f64 = 2000.0;

/// Fixes captured this long ago or earlier are considered stale
pub const MAX_FIX_AGE: Duration = Duration::from_secs(30);

/// Delay between the first delivery of a cycle and the re-arm of the next window
pub const CYCLE_PERIOD: Duration = Duration::from_secs(60);

/// How long the provider keeps sampling once a cycle has been armed
pub const WINDOW_DURATION: Duration = Duration::from_secs(7);

/// Distance filter (meters) applied while acquiring in coarse mode
pub const COARSE_DISTANCE_FILTER_M: f64 = 99999.0;
