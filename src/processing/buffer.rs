//! Accumulates valid fixes between uploads

use crate::core::Fix;
use crate::validation::{FixRejection, FixValidator};
use chrono::{DateTime, Utc};

/// Fixes collected during the current cycle plus the most recent good one.
///
/// The buffer is owned by a single scheduler and mutated only from its
/// coordination task, so it carries no locking of its own.
#[derive(Debug, Clone, Default)]
pub struct FixBuffer {
    /// Gate applied on every insert
    validator: FixValidator,
    /// Accepted fixes of the current cycle, in insertion order
    samples: Vec<Fix>,
    /// Most recently accepted fix; survives clears
    last_good_fix: Option<Fix>,
}

impl FixBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(validator: FixValidator) -> Self {
        Self {
            validator,
            ..Self::default()
        }
    }

    pub fn validator(&self) -> &FixValidator {
        &self.validator
    }

    /// Insert a fix if it passes the validity filter at the current time
    pub fn insert(&mut self, fix: Fix) -> Result<(), FixRejection> {
        self.insert_at(fix, Utc::now())
    }

    /// Insert a fix if it passes the validity filter as of `now`.
    ///
    /// Accepted fixes also become the last good fix, which outlives
    /// [`select_best_and_clear`](Self::select_best_and_clear).
    pub fn insert_at(&mut self, fix: Fix, now: DateTime<Utc>) -> Result<(), FixRejection> {
        self.validator.validate_at(&fix, now)?;
        self.last_good_fix = Some(fix.clone());
        self.samples.push(fix);
        Ok(())
    }

    /// Most accurate fix of the cycle, else the last good fix, else `None`.
    /// The cycle's samples are always cleared.
    ///
    /// Ties keep the earliest insertion.
    pub fn select_best_and_clear(&mut self) -> Option<Fix> {
        let best = self
            .samples
            .iter()
            .enumerate()
            .min_by(|(ia, a), (ib, b)| a.accuracy_m.total_cmp(&b.accuracy_m).then(ia.cmp(ib)))
            .map(|(_, fix)| fix.clone());

        self.samples.clear();
        best.or_else(|| self.last_good_fix.clone())
    }

    pub fn samples(&self) -> &[Fix] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last_good_fix(&self) -> Option<&Fix> {
        self.last_good_fix.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Coordinate;
    use chrono::Duration as ChronoDuration;

    fn fix(lat: f64, accuracy_m: f64, now: DateTime<Utc>) -> Fix {
        Fix::new(Coordinate::new(lat, 13.4), accuracy_m, 35.0, now)
    }

    #[test]
    fn test_best_of_selection_is_stable() {
        let now = Utc::now();
        let mut buffer = FixBuffer::new();
        let fixes = vec![fix(52.50, 5.0, now), fix(52.51, 3.0, now), fix(52.52, 3.0, now), fix(52.53, 8.0, now)];
        for f in &fixes {
            buffer.insert_at(f.clone(), now).unwrap();
        }

        assert_eq!(buffer.select_best_and_clear(), Some(fixes[1].clone()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_invalid_fixes_do_not_touch_buffer() {
        let now = Utc::now();
        let mut buffer = FixBuffer::new();
        let rejected = vec![
            fix(52.5, 0.0, now),
            fix(52.5, -3.0, now),
            fix(52.5, 2000.0, now),
            fix(52.5, 10.0, now - ChronoDuration::seconds(30)),
            Fix::new(Coordinate::new(0.0, 0.0), 10.0, 0.0, now),
        ];
        for f in rejected {
            assert!(buffer.insert_at(f, now).is_err());
        }

        assert!(buffer.is_empty());
        assert!(buffer.last_good_fix().is_none());
        assert_eq!(buffer.select_best_and_clear(), None);
    }

    #[test]
    fn test_falls_back_to_last_good_fix() {
        let now = Utc::now();
        let mut buffer = FixBuffer::new();
        let good = fix(52.5, 40.0, now);
        buffer.insert_at(good.clone(), now).unwrap();

        assert_eq!(buffer.select_best_and_clear(), Some(good.clone()));
        // Samples are gone but the last good fix persists
        assert!(buffer.is_empty());
        assert_eq!(buffer.select_best_and_clear(), Some(good));
    }

    #[test]
    fn test_last_good_fix_tracks_latest_accepted() {
        let now = Utc::now();
        let mut buffer = FixBuffer::new();
        buffer.insert_at(fix(52.50, 3.0, now), now).unwrap();
        let latest = fix(52.51, 90.0, now);
        buffer.insert_at(latest.clone(), now).unwrap();
        assert!(buffer.insert_at(fix(52.52, 5000.0, now), now).is_err());

        assert_eq!(buffer.last_good_fix(), Some(&latest));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_second_selection_does_not_repeat_cycle_best() {
        let now = Utc::now();
        let mut buffer = FixBuffer::new();
        let best = fix(52.50, 3.0, now);
        let last = fix(52.51, 9.0, now);
        buffer.insert_at(best.clone(), now).unwrap();
        buffer.insert_at(last.clone(), now).unwrap();

        assert_eq!(buffer.select_best_and_clear(), Some(best));
        assert_eq!(buffer.select_best_and_clear(), Some(last));
    }

    #[test]
    fn test_empty_buffer_without_history() {
        let mut buffer = FixBuffer::new();
        assert_eq!(buffer.select_best_and_clear(), None);
        assert_eq!(buffer.select_best_and_clear(), None);
    }
}
