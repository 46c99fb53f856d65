//! Per-cycle sample processing

pub mod buffer;

pub use buffer::FixBuffer;
