#![forbid(unsafe_code)]

//! Boundary to the external transaction log.
//!
//! The log owns all undo history. This crate only opens, closes and cancels
//! sessions in it, and asks whether a given session is still open.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::object::AnyObject;
use crate::text::{Name, Text};

/// Index of a session, minted by the log when the session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogIndex(u64);

impl LogIndex {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An undo/redo transaction log.
pub trait TransactionLog {
    /// Global preconditions for opening a session (an undo buffer exists,
    /// the host can transact, no undo/redo is being applied).
    fn can_transact(&self) -> bool;

    /// Open a session. Returns `None` when the log refuses.
    fn begin(
        &mut self,
        session: &Name,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Option<LogIndex>;

    /// Commit the session with `index`, leaving every other open session
    /// untouched. Returns `false` when it is not open.
    fn end(&mut self, index: LogIndex) -> bool;

    /// Discard the session with `index`. Silent when it is not open.
    fn cancel(&mut self, index: LogIndex);

    fn is_open(&self, index: LogIndex) -> bool;
}

/// A log shared between the manager and outstanding scoped handles.
pub type SharedLog = Rc<RefCell<dyn TransactionLog>>;

/// Self-closing session handle.
///
/// Dropping an outstanding handle ends its session in the log. The handle
/// only holds the log weakly.
#[must_use = "the transaction ends as soon as the handle is dropped"]
pub struct ScopedTransaction {
    log: Weak<RefCell<dyn TransactionLog>>,
    index: Option<LogIndex>,
}

impl ScopedTransaction {
    /// Open a session directly against `log`.
    ///
    /// A refused or busy log yields a handle that is not outstanding.
    pub fn begin(
        log: &SharedLog,
        session: &Name,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Self {
        let index = match log.try_borrow_mut() {
            Ok(mut log) if log.can_transact() => log.begin(session, description, primary),
            Ok(_) => None,
            Err(_) => {
                tracing::warn!(session = %session, "scoped transaction: log busy");
                None
            }
        };
        Self {
            log: Rc::downgrade(log),
            index,
        }
    }

    /// True while the session is open in the log.
    #[must_use]
    pub fn is_outstanding(&self) -> bool {
        let Some(index) = self.index else {
            return false;
        };
        self.log
            .upgrade()
            .is_some_and(|log| log.try_borrow().is_ok_and(|log| log.is_open(index)))
    }

    #[must_use]
    pub fn index(&self) -> Option<LogIndex> {
        self.index
    }

    /// Discard the session instead of ending it.
    pub fn cancel(mut self) {
        if let Some(index) = self.index.take() {
            if let Some(log) = self.log.upgrade() {
                if let Ok(mut log) = log.try_borrow_mut() {
                    log.cancel(index);
                }
            }
        }
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        let Some(index) = self.index.take() else {
            return;
        };
        let Some(log) = self.log.upgrade() else {
            return;
        };
        let Ok(mut log) = log.try_borrow_mut() else {
            tracing::warn!(%index, "scoped transaction: log busy on release");
            return;
        };
        if !log.end(index) {
            tracing::debug!(%index, "scoped transaction already closed");
        }
    }
}

impl fmt::Debug for ScopedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedTransaction")
            .field("index", &self.index)
            .field("outstanding", &self.is_outstanding())
            .finish()
    }
}
