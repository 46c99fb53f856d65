//! Core types and constants for the duty-cycled location tracker

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
