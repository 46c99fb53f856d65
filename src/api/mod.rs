//! Delegate/observer boundary and error taxonomy
//!
//! The host UI or logging layer observes the tracker through callbacks
//! registered on an [`EventDispatcher`]. Two kinds of events flow out:
//! user-facing advisories and diagnostic log lines.

pub mod callback;
pub mod types;

pub use callback::{Advisory, CallbackHandle, EventCallback, EventDispatcher, TrackerEvent};
pub use types::{TrackerError, TrackerResult};
