//! Core data types for the tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `(0, 0)` is what providers report when they have no real position
    pub fn is_null_island(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// A single location sample delivered by the provider.
///
/// `accuracy_m` is a horizontal error radius: smaller is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub coordinate: Coordinate,
    pub accuracy_m: f64,
    pub altitude_m: f64,
    pub captured_at: DateTime<Utc>,
}

impl Fix {
    pub fn new(coordinate: Coordinate, accuracy_m: f64, altitude_m: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            accuracy_m,
            altitude_m,
            captured_at,
        }
    }

    /// Fix captured right now, mostly useful for simulations and tests
    pub fn now(lat: f64, lon: f64, accuracy_m: f64) -> Self {
        Self::new(Coordinate::new(lat, lon), accuracy_m, 0.0, Utc::now())
    }

    /// Age of the fix relative to `now`; negative ages (clock skew) count as zero
    pub fn age_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.captured_at).to_std().unwrap_or_default()
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ±{:.1}m alt {:.1}m @ {}",
            self.coordinate,
            self.accuracy_m,
            self.altitude_m,
            self.captured_at.to_rfc3339()
        )
    }
}
