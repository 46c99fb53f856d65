//! The duty-cycle state machine
//!
//! A cycle starts with the first fix delivery after the scheduler began
//! acquiring. That delivery grabs a budget token and arms two independent
//! one-shot timers: the acquisition window, which pauses sampling, and the
//! cycle re-arm, which starts the next window. Later deliveries in the same
//! cycle only feed the buffer. Uploads drain the buffer on their own schedule.

use crate::api::{EventDispatcher, TrackerError, TrackerResult};
use crate::budget::ExecutionBudgetPool;
use crate::core::Fix;
use crate::host::{AccuracyMode, AuthorizationStatus, DistanceFilter, LocationProvider, ProviderErrorKind};
use crate::processing::FixBuffer;
use crate::scheduler::{LastLocation, SchedulerMode, SchedulerSnapshot, TimerDriver, TimerHandle, TimerKind};
use crate::utils::{ConfigError, TrackerConfig};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sampling scheduler for one tracking session.
///
/// Every method takes `&mut self`; callers must serialize access, which
/// [`SchedulerRuntime`](crate::scheduler::SchedulerRuntime) does by owning
/// the scheduler on a single task.
pub struct DutyCycleScheduler<T: TimerDriver> {
    /// Validated tunables
    config: TrackerConfig,
    /// Shared provider handle
    provider: Arc<dyn LocationProvider>,
    /// Process-wide continuation token pool
    pool: Arc<ExecutionBudgetPool>,
    /// Advisory and log sink
    events: Arc<EventDispatcher>,
    /// Clock for the two one-shot timers
    timers: T,
    /// Fixes accepted since the last upload
    buffer: FixBuffer,
    mode: SchedulerMode,
    /// Armed by the first delivery of a cycle; starts the next window
    cycle_timer: Option<TimerHandle>,
    /// Armed with the cycle timer; pauses sampling
    window_timer: Option<TimerHandle>,
    /// Latest accepted position, never cleared by uploads
    last_location: Option<LastLocation>,
}

impl<T: TimerDriver> DutyCycleScheduler<T> {
    /// Fails if `config` does not pass [`TrackerConfig::validate`]
    pub fn new(
        config: TrackerConfig,
        provider: Arc<dyn LocationProvider>,
        pool: Arc<ExecutionBudgetPool>,
        events: Arc<EventDispatcher>,
        timers: T,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = FixBuffer::with_validator(config.validator());
        Ok(Self {
            config,
            provider,
            pool,
            events,
            timers,
            buffer,
            mode: SchedulerMode::Idle,
            cycle_timer: None,
            window_timer: None,
            last_location: None,
        })
    }

    /// Begin tracking, or re-enter the acquisition window if already tracking.
    ///
    /// From `Idle` the provider must be enabled and authorized; otherwise an
    /// advisory is emitted and the scheduler stays idle. If the provider
    /// fails to start while tracking, sampling stays off and the start is
    /// retried when the next cycle comes due.
    pub fn start(&mut self) {
        self.events.log("startLocationTracking");
        if let Err(err) = self.try_start() {
            self.report(err);
            if self.mode != SchedulerMode::Idle && self.cycle_timer.is_none() {
                self.transition(SchedulerMode::CoolingDown);
                self.cycle_timer = Some(self.timers.schedule(TimerKind::CycleRearm, self.config.cycle_period()));
                debug!(retry_in = ?self.config.cycle_period(), "provider start failed, retry armed");
            }
        }
    }

    fn try_start(&mut self) -> TrackerResult<()> {
        if self.mode == SchedulerMode::Idle {
            self.check_provider()?;
        }
        self.begin_sampling()
    }

    fn check_provider(&self) -> TrackerResult<()> {
        if !self.provider.services_enabled() {
            return Err(TrackerError::ServiceUnavailable);
        }
        match self.provider.authorization_status() {
            AuthorizationStatus::Denied => Err(TrackerError::AuthorizationDenied),
            AuthorizationStatus::Restricted => Err(TrackerError::AuthorizationRestricted),
            AuthorizationStatus::NotDetermined => {
                // The answer arrives later; a denial then shows up as a provider error
                self.provider.request_authorization();
                Ok(())
            }
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways => Ok(()),
        }
    }

    fn begin_sampling(&mut self) -> TrackerResult<()> {
        self.provider.set_accuracy_mode(AccuracyMode::Coarse);
        self.provider
            .set_distance_filter(DistanceFilter::Meters(self.config.coarse_distance_filter_m));
        self.provider.start_sampling()?;
        self.transition(SchedulerMode::Acquiring);
        Ok(())
    }

    /// Feed a batch of fixes from the provider.
    ///
    /// Invalid fixes are dropped silently. The first delivery of a cycle
    /// arms the cycle timers; while the re-arm timer is pending, deliveries
    /// only fill the buffer.
    pub fn on_fixes_delivered(&mut self, fixes: Vec<Fix>) {
        self.events.log("locationManager didUpdateLocations");

        let now = Utc::now();
        for fix in fixes {
            let coordinate = fix.coordinate;
            let accuracy_m = fix.accuracy_m;
            match self.buffer.insert_at(fix, now) {
                Ok(()) => self.last_location = Some(LastLocation { coordinate, accuracy_m }),
                Err(rejection) => debug!(%coordinate, reason = %rejection, "fix rejected"),
            }
        }

        if self.cycle_timer.is_some() {
            return;
        }
        if self.mode == SchedulerMode::Idle {
            debug!("delivery after stop, not arming cycle timers");
            return;
        }

        self.acquire_budget();
        self.cancel_window_timer();
        self.cycle_timer = Some(self.timers.schedule(TimerKind::CycleRearm, self.config.cycle_period()));
        self.window_timer = Some(
            self.timers
                .schedule(TimerKind::AcquisitionWindow, self.config.window_duration()),
        );
        debug!(
            cycle = ?self.config.cycle_period(),
            window = ?self.config.window_duration(),
            "cycle timers armed"
        );
    }

    /// Route a timer expiry. Handles that are no longer armed are stale and ignored.
    pub fn on_timer_fired(&mut self, handle: TimerHandle) {
        if self.cycle_timer == Some(handle) {
            self.cycle_timer = None;
            self.restart();
        } else if self.window_timer == Some(handle) {
            self.window_timer = None;
            self.pause_sampling();
            self.events.log("locationManager stop updating after acquisition window");
        } else {
            debug!(timer = handle.id(), "ignoring stale timer");
        }
    }

    /// Stop active sampling until the next cycle; buffered fixes and budget
    /// tokens are kept
    pub fn pause_sampling(&mut self) {
        if self.mode == SchedulerMode::Idle {
            debug!("pause requested while idle");
            return;
        }
        self.quiesce_provider();
        self.transition(SchedulerMode::CoolingDown);
    }

    /// Start a fresh acquisition window. The previous cycle's buffer stays
    /// pending for the next upload.
    pub fn restart(&mut self) {
        self.events.log("restartLocationUpdates");
        self.cancel_timers();
        self.start();
    }

    /// End tracking. Budget tokens are left to the host lifecycle.
    pub fn stop(&mut self) {
        self.events.log("stopLocationTracking");
        self.cancel_timers();
        self.quiesce_provider();
        self.transition(SchedulerMode::Idle);
    }

    /// Host moved the process to the background: keep sampling and ask for
    /// another continuation token
    pub fn on_enter_background(&mut self) {
        self.events.log("applicationEnterBackground");
        self.start();
        self.acquire_budget();
    }

    /// Provider failures are reported but never change the scheduler state
    pub fn on_provider_error(&mut self, kind: ProviderErrorKind) {
        self.report(TrackerError::from_provider(&kind));
    }

    /// Pick the fix to upload for this cycle and clear the buffer
    pub fn take_upload_fix(&mut self) -> Option<Fix> {
        self.events.log("updateLocationToServer");

        let had_samples = !self.buffer.is_empty();
        let fix = self.buffer.select_best_and_clear();
        match (&fix, had_samples) {
            (Some(best), true) => self.events.log(format!("My best location {}", best)),
            (_, false) => self.events.log("Unable to get location, use the last known location"),
            (None, true) => {}
        }

        match &fix {
            Some(fix) => self.events.log(format!(
                "Should send to server: latitude {:.6} longitude {:.6} accuracy {:.1}",
                fix.coordinate.lat, fix.coordinate.lon, fix.accuracy_m
            )),
            None => self.events.log("No location available to send"),
        }
        fix
    }

    fn acquire_budget(&mut self) {
        match self.pool.request() {
            Ok(token) => debug!(token = %token, "budget token acquired"),
            Err(err) => self.report(TrackerError::TokenGrantRefused(err)),
        }
    }

    fn quiesce_provider(&mut self) {
        self.provider.set_accuracy_mode(AccuracyMode::Best);
        self.provider.set_distance_filter(DistanceFilter::None);
        if let Err(err) = self.provider.stop_sampling() {
            self.report(err.into());
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.cycle_timer.take() {
            self.timers.cancel(handle);
        }
        self.cancel_window_timer();
    }

    fn cancel_window_timer(&mut self) {
        if let Some(handle) = self.window_timer.take() {
            self.timers.cancel(handle);
        }
    }

    fn transition(&mut self, next: SchedulerMode) {
        if self.mode != next {
            info!(from = %self.mode, to = %next, "scheduler transition");
            self.mode = next;
        }
    }

    fn report(&self, err: TrackerError) {
        warn!(error = %err, mode = %self.mode, "tracker error");
        if let Some(advisory) = err.advisory() {
            self.events.advise(advisory);
        }
        self.events.log(err.to_string());
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn buffer(&self) -> &FixBuffer {
        &self.buffer
    }

    pub fn last_location(&self) -> Option<LastLocation> {
        self.last_location
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventDispatcher> {
        Arc::clone(&self.events)
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            mode: self.mode,
            cycle_timer_armed: self.cycle_timer.is_some(),
            window_timer_armed: self.window_timer.is_some(),
            buffered_fixes: self.buffer.len(),
            last_good_fix: self.buffer.last_good_fix().cloned(),
            last_location: self.last_location,
            budget: self.pool.snapshot(),
        }
    }
}
