//! Callback registration for tracker events
//!
//! Callbacks run synchronously on the scheduler task, in registration order,
//! and must not block. Each emit works on a copy of the registry, so a
//! callback may register or unregister others; the change applies from the
//! next event.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// User-facing conditions the host may want to present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advisory {
    /// Location services are off for the whole device
    ServicesDisabled,
    /// Access was denied or is restricted by policy
    AuthorizationFailed,
    /// The provider cannot reach the network
    NetworkIssue,
}

impl Advisory {
    pub fn message(&self) -> &'static str {
        match self {
            Advisory::ServicesDisabled => "Location services are disabled",
            Advisory::AuthorizationFailed => "Location access is not authorized",
            Advisory::NetworkIssue => "Please check your network connection",
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Events emitted to registered callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackerEvent {
    Advisory(Advisory),
    Log(String),
}

/// Callback function type for tracker events
pub type EventCallback = Box<dyn Fn(&TrackerEvent) + Send + Sync>;

type SharedCallback = Arc<dyn Fn(&TrackerEvent) + Send + Sync>;

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Fan-out of tracker events to any number of observers.
///
/// Every event is also traced, so a dispatcher with no callbacks still
/// leaves a diagnostic trail.
#[derive(Default)]
pub struct EventDispatcher {
    /// Registered callbacks, ordered by handle
    callbacks: RwLock<BTreeMap<CallbackHandle, SharedCallback>>,
    /// Last handle id issued
    counter: AtomicU32,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<CallbackHandle, SharedCallback>> {
        self.callbacks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<CallbackHandle, SharedCallback>> {
        self.callbacks.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a callback for every future event
    pub fn register(&self, callback: EventCallback) -> CallbackHandle {
        let handle = CallbackHandle(self.counter.fetch_add(1, Ordering::Relaxed) + 1);
        self.write().insert(handle, Arc::from(callback));
        handle
    }

    /// Returns false if the handle was unknown
    pub fn unregister(&self, handle: CallbackHandle) -> bool {
        self.write().remove(&handle).is_some()
    }

    pub fn callback_count(&self) -> usize {
        self.read().len()
    }

    pub fn emit(&self, event: TrackerEvent) {
        match &event {
            TrackerEvent::Advisory(advisory) => info!(advisory = ?advisory, "{}", advisory),
            TrackerEvent::Log(message) => debug!("{}", message),
        }
        let callbacks: Vec<SharedCallback> = self.read().values().cloned().collect();
        for callback in callbacks {
            callback(&event);
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(TrackerEvent::Log(message.into()));
    }

    pub fn advise(&self, advisory: Advisory) {
        self.emit(TrackerEvent::Advisory(advisory));
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("callbacks", &self.callback_count())
            .finish()
    }
}
