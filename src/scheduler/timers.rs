//! Timer abstraction used by the scheduler

use std::time::Duration;

/// The two one-shot timers of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Fires after the cycle period and starts the next acquisition window
    CycleRearm,
    /// Fires after the window duration and pauses sampling
    AcquisitionWindow,
}

/// Identifies one scheduled timer. Never reused by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        TimerHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Schedules one-shot timers whose expiry is reported back to the
/// scheduler through [`DutyCycleScheduler::on_timer_fired`].
///
/// [`DutyCycleScheduler::on_timer_fired`]: crate::scheduler::DutyCycleScheduler::on_timer_fired
pub trait TimerDriver {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle;

    /// Cancelling a handle that already fired is a no-op
    fn cancel(&mut self, handle: TimerHandle);
}

/// Timer driver that never fires on its own.
///
/// Useful when the caller owns the clock: pending timers are inspected and
/// fired explicitly with [`take_pending`](Self::take_pending).
#[derive(Debug, Default)]
pub struct ManualTimers {
    next_id: u64,
    pending: Vec<(TimerHandle, TimerKind, Duration)>,
    scheduled: Vec<(TimerKind, Duration)>,
    cancelled: Vec<TimerHandle>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers scheduled and neither cancelled nor taken
    pub fn pending(&self) -> &[(TimerHandle, TimerKind, Duration)] {
        &self.pending
    }

    pub fn pending_of(&self, kind: TimerKind) -> usize {
        self.pending.iter().filter(|(_, k, _)| *k == kind).count()
    }

    /// Every timer ever scheduled, in order
    pub fn scheduled(&self) -> &[(TimerKind, Duration)] {
        &self.scheduled
    }

    pub fn scheduled_of(&self, kind: TimerKind) -> usize {
        self.scheduled.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn cancelled(&self) -> &[TimerHandle] {
        &self.cancelled
    }

    /// Remove the oldest pending timer of `kind` so the caller can fire it
    pub fn take_pending(&mut self, kind: TimerKind) -> Option<TimerHandle> {
        let index = self.pending.iter().position(|(_, k, _)| *k == kind)?;
        Some(self.pending.remove(index).0)
    }
}

impl TimerDriver for ManualTimers {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.pending.push((handle, kind, delay));
        self.scheduled.push((kind, delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(index) = self.pending.iter().position(|(h, _, _)| *h == handle) {
            self.pending.remove(index);
            self.cancelled.push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timers_bookkeeping() {
        let mut timers = ManualTimers::new();
        let cycle = timers.schedule(TimerKind::CycleRearm, Duration::from_secs(60));
        let window = timers.schedule(TimerKind::AcquisitionWindow, Duration::from_secs(7));
        assert_ne!(cycle, window);
        assert_eq!(timers.pending().len(), 2);

        timers.cancel(cycle);
        timers.cancel(cycle);
        assert_eq!(timers.cancelled(), &[cycle]);
        assert_eq!(timers.pending_of(TimerKind::CycleRearm), 0);

        assert_eq!(timers.take_pending(TimerKind::AcquisitionWindow), Some(window));
        assert_eq!(timers.take_pending(TimerKind::AcquisitionWindow), None);
        assert_eq!(timers.scheduled().len(), 2);
    }
}
