#![forbid(unsafe_code)]

//! Transactions against an external undo log.
//!
//! - [`TransactionLog`]: the log boundary (begin / end / cancel).
//! - [`ScopedTransaction`]: RAII handle that ends its session on drop.
//! - [`MemoryLog`]: in-process log for hosts without an editor undo buffer.
//! - [`TransactionManager`]: the single managed slot and category checks.
//!
//! The manager is an ordinary value owned by the host and passed to the
//! property transaction calls. Everything is single-threaded (`Rc`/`RefCell`).

pub mod log;
pub mod manager;
pub mod memory;

pub use log::{LogIndex, ScopedTransaction, SharedLog, TransactionLog};
pub use manager::{TransactionCategory, TransactionError, TransactionId, TransactionManager};
pub use memory::{LogEvent, LogRecord, MemoryLog};
