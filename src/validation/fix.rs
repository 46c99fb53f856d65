//! Validity filter applied to every fix before it reaches the buffer

use crate::core::{Fix, ACCURACY_REJECT_THRESHOLD_M, MAX_FIX_AGE};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Reason a fix was dropped by the validity filter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixRejection {
    #[error("accuracy {accuracy_m} m is not positive")]
    NonPositiveAccuracy { accuracy_m: f64 },
    #[error("accuracy {accuracy_m} m is not below the {threshold_m} m threshold")]
    AccuracyTooCoarse { accuracy_m: f64, threshold_m: f64 },
    #[error("fix is {age:?} old, limit is {max_age:?}")]
    Stale { age: Duration, max_age: Duration },
    #[error("coordinate is the (0, 0) sentinel")]
    NullIsland,
}

/// Thresholds for accepting a fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixValidator {
    accuracy_threshold_m: f64,
    max_age: Duration,
}

impl Default for FixValidator {
    fn default() -> Self {
        Self {
            accuracy_threshold_m: ACCURACY_REJECT_THRESHOLD_M,
            max_age: MAX_FIX_AGE,
        }
    }
}

impl FixValidator {
    pub fn new(accuracy_threshold_m: f64, max_age: Duration) -> Self {
        Self {
            accuracy_threshold_m,
            max_age,
        }
    }

    pub fn accuracy_threshold_m(&self) -> f64 {
        self.accuracy_threshold_m
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Check a fix against the current wall clock
    pub fn validate(&self, fix: &Fix) -> Result<(), FixRejection> {
        self.validate_at(fix, Utc::now())
    }

    /// Check a fix as if the current time were `now`.
    ///
    /// Accepted iff `0 < accuracy < threshold`, `age < max_age` and the
    /// coordinate is not `(0, 0)`. NaN accuracies fail the first check.
    pub fn validate_at(&self, fix: &Fix, now: DateTime<Utc>) -> Result<(), FixRejection> {
        let age = fix.age_at(now);
        if age >= self.max_age {
            return Err(FixRejection::Stale {
                age,
                max_age: self.max_age,
            });
        }

        if !(fix.accuracy_m > 0.0) {
            return Err(FixRejection::NonPositiveAccuracy {
                accuracy_m: fix.accuracy_m,
            });
        }

        if fix.accuracy_m >= self.accuracy_threshold_m {
            return Err(FixRejection::AccuracyTooCoarse {
                accuracy_m: fix.accuracy_m,
                threshold_m: self.accuracy_threshold_m,
            });
        }

        if fix.coordinate.is_null_island() {
            return Err(FixRejection::NullIsland);
        }

        Ok(())
    }

    pub fn is_valid_at(&self, fix: &Fix, now: DateTime<Utc>) -> bool {
        self.validate_at(fix, now).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Coordinate;
    use chrono::Duration as ChronoDuration;

    fn fix_at(lat: f64, lon: f64, accuracy_m: f64, captured_at: DateTime<Utc>) -> Fix {
        Fix::new(Coordinate::new(lat, lon), accuracy_m, 12.0, captured_at)
    }

    #[test]
    fn test_accepts_fresh_accurate_fix() {
        let now = Utc::now();
        let validator = FixValidator::default();
        assert!(validator.validate_at(&fix_at(51.5, -0.12, 25.0, now), now).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_accuracy() {
        let now = Utc::now();
        let validator = FixValidator::default();

        for accuracy in [0.0, -1.0, -250.0, f64::NAN] {
            let result = validator.validate_at(&fix_at(51.5, -0.12, accuracy, now), now);
            assert!(matches!(result, Err(FixRejection::NonPositiveAccuracy { .. })));
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let now = Utc::now();
        let validator = FixValidator::default();

        assert!(validator.is_valid_at(&fix_at(51.5, -0.12, 1999.9, now), now));
        let result = validator.validate_at(&fix_at(51.5, -0.12, 2000.0, now), now);
        assert!(matches!(result, Err(FixRejection::AccuracyTooCoarse { .. })));
    }

    #[test]
    fn test_rejects_stale_fix() {
        let now = Utc::now();
        let validator = FixValidator::default();

        let borderline = fix_at(51.5, -0.12, 10.0, now - ChronoDuration::seconds(30));
        assert!(matches!(
            validator.validate_at(&borderline, now),
            Err(FixRejection::Stale { .. })
        ));

        let recent = fix_at(51.5, -0.12, 10.0, now - ChronoDuration::seconds(29));
        assert!(validator.is_valid_at(&recent, now));
    }

    #[test]
    fn test_rejects_null_island() {
        let now = Utc::now();
        let validator = FixValidator::default();
        assert_eq!(
            validator.validate_at(&fix_at(0.0, 0.0, 5.0, now), now),
            Err(FixRejection::NullIsland)
        );
        // A single zero axis is a real place
        assert!(validator.is_valid_at(&fix_at(0.0, 32.5, 5.0, now), now));
    }

    #[test]
    fn test_custom_thresholds() {
        let now = Utc::now();
        let validator = FixValidator::new(50.0, Duration::from_secs(5));

        assert!(!validator.is_valid_at(&fix_at(10.0, 10.0, 60.0, now), now));
        assert!(!validator.is_valid_at(&fix_at(10.0, 10.0, 10.0, now - ChronoDuration::seconds(6)), now));
        assert!(validator.is_valid_at(&fix_at(10.0, 10.0, 10.0, now), now));
    }
}
