#![forbid(unsafe_code)]

//! In-process transaction log.
//!
//! [`MemoryLog`] keeps open sessions in opening order, moves ended sessions into
//! a committed list and cancelled ones into a discarded list. It stores no
//! object snapshots; it is the record of which sessions happened, for hosts
//! without an editor undo buffer and for tests.
//!
//! # Invariants
//!
//! 1. Indices are minted in increasing order and never reused.
//! 2. `end(index)` and `cancel(index)` touch only the session named by
//!    `index`; sessions may close in any order.
//! 3. Every session is in exactly one of: open, committed, cancelled.

use std::cell::RefCell;
use std::rc::Rc;

use crate::object::AnyObject;
use crate::text::{Name, Text};
use crate::undo::log::{LogIndex, TransactionLog};

/// A session as recorded by the log.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub index: LogIndex,
    pub session: Name,
    pub description: Text,
    /// Name of the primary object, if one was alive when the session opened.
    pub primary: Option<String>,
}

/// Operation applied to the log, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    Begin(LogIndex),
    End(LogIndex),
    Cancel(LogIndex),
}

#[derive(Debug)]
pub struct MemoryLog {
    can_transact: bool,
    applying: bool,
    next_index: u64,
    open: Vec<LogRecord>,
    committed: Vec<LogRecord>,
    cancelled: Vec<LogRecord>,
    events: Vec<LogEvent>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            can_transact: true,
            applying: false,
            next_index: 0,
            open: Vec::new(),
            committed: Vec::new(),
            cancelled: Vec::new(),
            events: Vec::new(),
        }
    }

    /// A fresh log wrapped for sharing with a manager.
    #[must_use]
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Toggle whether the host can transact at all.
    pub fn set_can_transact(&mut self, can_transact: bool) {
        self.can_transact = can_transact;
    }

    /// Simulate an undo/redo being applied; new sessions are refused meanwhile.
    pub fn set_applying(&mut self, applying: bool) {
        self.applying = applying;
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn open_sessions(&self) -> &[LogRecord] {
        &self.open
    }

    #[must_use]
    pub fn committed(&self) -> &[LogRecord] {
        &self.committed
    }

    #[must_use]
    pub fn cancelled(&self) -> &[LogRecord] {
        &self.cancelled
    }

    #[must_use]
    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    fn take_open(&mut self, index: LogIndex) -> Option<LogRecord> {
        let pos = self.open.iter().position(|r| r.index == index)?;
        Some(self.open.remove(pos))
    }
}

impl TransactionLog for MemoryLog {
    fn can_transact(&self) -> bool {
        self.can_transact && !self.applying
    }

    fn begin(
        &mut self,
        session: &Name,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Option<LogIndex> {
        if !self.can_transact() {
            return None;
        }
        let index = LogIndex::new(self.next_index);
        self.next_index += 1;
        self.open.push(LogRecord {
            index,
            session: session.clone(),
            description: description.clone(),
            primary: primary.and_then(|p| p.get()).map(|o| o.object_name()),
        });
        self.events.push(LogEvent::Begin(index));
        Some(index)
    }

    fn end(&mut self, index: LogIndex) -> bool {
        let Some(record) = self.take_open(index) else {
            tracing::debug!(%index, "memory log: end of a session that is not open");
            return false;
        };
        self.committed.push(record);
        self.events.push(LogEvent::End(index));
        true
    }

    fn cancel(&mut self, index: LogIndex) {
        let Some(record) = self.take_open(index) else {
            tracing::debug!(%index, "memory log: cancel of a session that is not open");
            return;
        };
        self.cancelled.push(record);
        self.events.push(LogEvent::Cancel(index));
    }

    fn is_open(&self, index: LogIndex) -> bool {
        self.open.iter().any(|r| r.index == index)
    }
}
