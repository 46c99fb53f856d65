//! In-memory collaborators for testing and simulation
//!
//! Each mock keeps its state behind an `Arc<Mutex<_>>` and is cheap to clone,
//! so a test can hand one clone to the scheduler and keep another to inspect
//! what the scheduler did with it.

use crate::core::Fix;
use crate::host::{
    AccuracyMode, AuthorizationStatus, BudgetToken, DistanceFilter, ExecutionBudgetHost,
    ExpirationHandler, HostError, HostResult, LocationProvider, UploadTransport,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Calls observed by [`MockLocationProvider`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    RequestAuthorization,
    SetAccuracyMode(AccuracyMode),
    SetDistanceFilter(DistanceFilter),
    StartSampling,
    StopSampling,
}

#[derive(Debug)]
struct MockProviderState {
    services_enabled: bool,
    authorization: AuthorizationStatus,
    grant_on_request: bool,
    fail_start: bool,
    sampling: bool,
    accuracy_mode: AccuracyMode,
    distance_filter: DistanceFilter,
    calls: Vec<ProviderCall>,
}

/// Mock location provider recording every knob the scheduler turns
#[derive(Debug, Clone)]
pub struct MockLocationProvider {
    state: Arc<Mutex<MockProviderState>>,
}

impl Default for MockLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLocationProvider {
    /// Enabled and already authorized
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockProviderState {
                services_enabled: true,
                authorization: AuthorizationStatus::AuthorizedAlways,
                grant_on_request: true,
                fail_start: false,
                sampling: false,
                accuracy_mode: AccuracyMode::Best,
                distance_filter: DistanceFilter::None,
                calls: Vec::new(),
            })),
        }
    }

    pub fn set_services_enabled(&self, enabled: bool) {
        lock(&self.state).services_enabled = enabled;
    }

    pub fn set_authorization(&self, status: AuthorizationStatus) {
        lock(&self.state).authorization = status;
    }

    /// Whether an authorization request from `NotDetermined` is granted
    pub fn set_grant_on_request(&self, grant: bool) {
        lock(&self.state).grant_on_request = grant;
    }

    /// Make `start_sampling` fail, e.g. to exercise boundary handling
    pub fn set_fail_start(&self, fail: bool) {
        lock(&self.state).fail_start = fail;
    }

    pub fn is_sampling(&self) -> bool {
        lock(&self.state).sampling
    }

    pub fn accuracy_mode(&self) -> AccuracyMode {
        lock(&self.state).accuracy_mode
    }

    pub fn distance_filter(&self) -> DistanceFilter {
        lock(&self.state).distance_filter
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, call: &ProviderCall) -> usize {
        lock(&self.state).calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

impl LocationProvider for MockLocationProvider {
    fn services_enabled(&self) -> bool {
        lock(&self.state).services_enabled
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        lock(&self.state).authorization
    }

    fn request_authorization(&self) {
        let mut state = lock(&self.state);
        state.calls.push(ProviderCall::RequestAuthorization);
        if state.authorization == AuthorizationStatus::NotDetermined {
            state.authorization = if state.grant_on_request {
                AuthorizationStatus::AuthorizedWhenInUse
            } else {
                AuthorizationStatus::Denied
            };
        }
    }

    fn set_accuracy_mode(&self, mode: AccuracyMode) {
        let mut state = lock(&self.state);
        state.calls.push(ProviderCall::SetAccuracyMode(mode));
        state.accuracy_mode = mode;
    }

    fn set_distance_filter(&self, filter: DistanceFilter) {
        let mut state = lock(&self.state);
        state.calls.push(ProviderCall::SetDistanceFilter(filter));
        state.distance_filter = filter;
    }

    fn start_sampling(&self) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(ProviderCall::StartSampling);
        if state.fail_start {
            return Err(HostError::Provider {
                message: "simulated start failure".to_string(),
            });
        }
        state.sampling = true;
        Ok(())
    }

    fn stop_sampling(&self) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(ProviderCall::StopSampling);
        state.sampling = false;
        Ok(())
    }
}

#[derive(Default)]
struct MockBudgetState {
    next_id: u64,
    refuse: bool,
    fail_release: bool,
    outstanding: HashMap<BudgetToken, ExpirationHandler>,
    released: Vec<BudgetToken>,
    requests: usize,
}

/// Mock execution-budget host issuing sequential token ids starting at 1
#[derive(Clone, Default)]
pub struct MockBudgetHost {
    state: Arc<Mutex<MockBudgetState>>,
}

impl MockBudgetHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decline every subsequent request
    pub fn set_refuse(&self, refuse: bool) {
        lock(&self.state).refuse = refuse;
    }

    /// Report an error from every subsequent release
    pub fn set_fail_release(&self, fail: bool) {
        lock(&self.state).fail_release = fail;
    }

    /// Tokens released so far, in release order
    pub fn released(&self) -> Vec<BudgetToken> {
        lock(&self.state).released.clone()
    }

    /// Tokens granted and neither released nor expired
    pub fn outstanding(&self) -> usize {
        lock(&self.state).outstanding.len()
    }

    /// Number of continuation requests received, granted or not
    pub fn requests(&self) -> usize {
        lock(&self.state).requests
    }

    /// Let a token's budget run out. Returns false if the token was not outstanding.
    pub fn expire(&self, token: BudgetToken) -> bool {
        // Run the handler without holding our lock, like a real host would
        let handler = lock(&self.state).outstanding.remove(&token);
        match handler {
            Some(handler) => {
                handler(token);
                true
            }
            None => false,
        }
    }
}

impl ExecutionBudgetHost for MockBudgetHost {
    fn request_continuation(&self, on_expire: ExpirationHandler) -> HostResult<BudgetToken> {
        let mut state = lock(&self.state);
        state.requests += 1;
        if state.refuse {
            return Err(HostError::Refused {
                reason: "background time unavailable".to_string(),
            });
        }
        state.next_id += 1;
        let token = BudgetToken::new(state.next_id);
        state.outstanding.insert(token, on_expire);
        Ok(token)
    }

    fn release_continuation(&self, token: BudgetToken) -> HostResult<()> {
        let mut state = lock(&self.state);
        if state.fail_release {
            return Err(HostError::Refused {
                reason: format!("cannot release {}", token),
            });
        }
        state.outstanding.remove(&token);
        state.released.push(token);
        Ok(())
    }
}

#[derive(Default)]
struct UploaderState {
    uploads: Vec<Option<Fix>>,
    fail: bool,
}

/// Upload transport that keeps every payload it was given
#[derive(Clone, Default)]
pub struct RecordingUploader {
    state: Arc<Mutex<UploaderState>>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn uploads(&self) -> Vec<Option<Fix>> {
        lock(&self.state).uploads.clone()
    }
}

#[async_trait]
impl UploadTransport for RecordingUploader {
    async fn upload(&self, fix: Option<Fix>) -> HostResult<()> {
        let mut state = lock(&self.state);
        state.uploads.push(fix);
        if state.fail {
            return Err(HostError::Transport {
                message: "simulated upload failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_provider_records_calls() {
        let provider = MockLocationProvider::new();
        provider.set_accuracy_mode(AccuracyMode::Coarse);
        provider.set_distance_filter(DistanceFilter::Meters(500.0));
        provider.start_sampling().unwrap();

        assert!(provider.is_sampling());
        assert_eq!(provider.accuracy_mode(), AccuracyMode::Coarse);
        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::SetAccuracyMode(AccuracyMode::Coarse),
                ProviderCall::SetDistanceFilter(DistanceFilter::Meters(500.0)),
                ProviderCall::StartSampling,
            ]
        );

        provider.stop_sampling().unwrap();
        assert!(!provider.is_sampling());
    }

    #[test]
    fn test_provider_authorization_request() {
        let provider = MockLocationProvider::new();
        provider.set_authorization(AuthorizationStatus::NotDetermined);
        provider.request_authorization();
        assert_eq!(provider.authorization_status(), AuthorizationStatus::AuthorizedWhenInUse);

        let provider = MockLocationProvider::new();
        provider.set_authorization(AuthorizationStatus::NotDetermined);
        provider.set_grant_on_request(false);
        provider.request_authorization();
        assert_eq!(provider.authorization_status(), AuthorizationStatus::Denied);
    }

    #[test]
    fn test_provider_start_failure() {
        let provider = MockLocationProvider::new();
        provider.set_fail_start(true);
        assert!(provider.start_sampling().is_err());
        assert!(!provider.is_sampling());
    }

    #[test]
    fn test_budget_host_issues_sequential_tokens() {
        let host = MockBudgetHost::new();
        let noop: ExpirationHandler = Arc::new(|_| {});

        let first = host.request_continuation(noop.clone()).unwrap();
        let second = host.request_continuation(noop).unwrap();
        assert_eq!(first, BudgetToken::new(1));
        assert_eq!(second, BudgetToken::new(2));
        assert_eq!(host.outstanding(), 2);

        host.release_continuation(first).unwrap();
        assert_eq!(host.released(), vec![first]);
        assert_eq!(host.outstanding(), 1);
    }

    #[test]
    fn test_budget_host_refusal() {
        let host = MockBudgetHost::new();
        host.set_refuse(true);
        let result = host.request_continuation(Arc::new(|_| {}));
        assert!(matches!(result, Err(HostError::Refused { .. })));
        assert_eq!(host.requests(), 1);
        assert_eq!(host.outstanding(), 0);
    }

    #[test]
    fn test_budget_host_expiration_runs_handler() {
        let host = MockBudgetHost::new();
        let expired = Arc::new(AtomicU64::new(0));
        let seen = expired.clone();
        let token = host
            .request_continuation(Arc::new(move |t: BudgetToken| seen.store(t.id(), Ordering::SeqCst)))
            .unwrap();

        assert!(host.expire(token));
        assert_eq!(expired.load(Ordering::SeqCst), token.id());
        assert!(!host.expire(token));
    }

    #[tokio::test]
    async fn test_recording_uploader() {
        let uploader = RecordingUploader::new();
        uploader.upload(Some(Fix::now(1.0, 2.0, 3.0))).await.unwrap();
        uploader.set_fail(true);
        assert!(uploader.upload(None).await.is_err());

        let uploads = uploader.uploads();
        assert_eq!(uploads.len(), 2);
        assert!(uploads[0].is_some());
        assert!(uploads[1].is_none());
    }
}
