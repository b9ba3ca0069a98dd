#![forbid(unsafe_code)]

//! Shared fixtures for sprop integration tests.
//!
//! - [`fixtures`]: a recording host object, a recording GC walker, a change
//!   recorder and a manager over a fresh in-memory log.
//! - [`log_capture`]: collects `tracing` output of a closure into a buffer
//!   so tests can assert on log lines.

pub mod fixtures;
pub mod log_capture;

pub use fixtures::{ChangeRecorder, RecordingCollector, RecordingObject, memory_manager};
pub use log_capture::{LogCapture, init_tracing};
