//! Sample validation

pub mod fix;

pub use fix::{FixRejection, FixValidator};
