#![forbid(unsafe_code)]

//! Transaction manager: the single managed slot plus category validation.
//!
//! # Invariants
//!
//! 1. At most one managed transaction is outstanding per manager.
//! 2. `start_managed` never disturbs an occupied slot; it fails fast.
//! 3. Closing the managed transaction always frees the slot, even when the
//!    log contradicts the manager, so the slot cannot deadlock.
//! 4. Unmanaged and scoped transactions never read or write the slot.
//!
//! # Failure Modes
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Slot occupied | `start_managed` returns `None` |
//! | Log precondition unmet or log busy | start returns `None` |
//! | Wrong category presented to a close | `NotManaged` / `NotUnmanaged`, state untouched |
//! | Session no longer open in the log | `LogMismatch`, slot cleared, `error!` (panics with `assert_invariants`) |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::TransactionConfig;
use crate::object::AnyObject;
use crate::text::Text;
use crate::undo::log::{LogIndex, ScopedTransaction, SharedLog, TransactionLog};
use crate::undo::memory::MemoryLog;

/// Which bookkeeping a transaction id belongs to, fixed when it is minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionCategory {
    Managed,
    Unmanaged,
}

impl TransactionCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Unmanaged => "unmanaged",
        }
    }
}

/// Identifier of an open transaction. The absence of an id (`None`) is the
/// "invalid" transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId {
    index: LogIndex,
    category: TransactionCategory,
}

impl TransactionId {
    #[must_use]
    pub const fn index(self) -> LogIndex {
        self.index
    }

    #[must_use]
    pub const fn category(self) -> TransactionCategory {
        self.category
    }

    #[must_use]
    pub const fn is_managed(self) -> bool {
        matches!(self.category, TransactionCategory::Managed)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.category.as_str(), self.index)
    }
}

/// Why a close request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    /// The id is not the outstanding managed transaction.
    NotManaged(TransactionId),
    /// The id belongs to the managed slot, not the unmanaged category.
    NotUnmanaged(TransactionId),
    /// The log no longer had the session open, or failed to close it.
    LogMismatch(TransactionId),
    /// The log was already borrowed when the close was attempted.
    LogBusy(TransactionId),
}

impl TransactionError {
    /// True for failures that contradict the manager's own bookkeeping.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::LogMismatch(_) | Self::LogBusy(_))
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotManaged(id) => write!(f, "{id} is not the outstanding managed transaction"),
            Self::NotUnmanaged(id) => write!(f, "{id} is not an unmanaged transaction"),
            Self::LogMismatch(id) => write!(f, "log did not close {id}"),
            Self::LogBusy(id) => write!(f, "log busy while closing {id}"),
        }
    }
}

impl std::error::Error for TransactionError {}

#[derive(Clone, Copy)]
enum Close {
    End,
    Cancel,
}

impl Close {
    const fn as_str(self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Cancel => "cancel",
        }
    }
}

/// Owns the managed slot and opens sessions in a shared log.
pub struct TransactionManager {
    log: SharedLog,
    managed: Option<TransactionId>,
    config: TransactionConfig,
}

impl TransactionManager {
    /// Manager over `log` with the default configuration.
    #[must_use]
    pub fn new<L: TransactionLog + 'static>(log: Rc<RefCell<L>>) -> Self {
        Self::with_config(log, TransactionConfig::default())
    }

    #[must_use]
    pub fn with_config<L: TransactionLog + 'static>(
        log: Rc<RefCell<L>>,
        config: TransactionConfig,
    ) -> Self {
        Self::from_shared(log, config)
    }

    /// Manager over an already type-erased log.
    #[must_use]
    pub fn from_shared(log: SharedLog, config: TransactionConfig) -> Self {
        Self {
            log,
            managed: None,
            config,
        }
    }

    /// Manager over a fresh [`MemoryLog`], returning the concrete log too.
    #[must_use]
    pub fn in_memory() -> (Self, Rc<RefCell<MemoryLog>>) {
        let log = MemoryLog::shared();
        (Self::new(Rc::clone(&log)), log)
    }

    #[must_use]
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    #[must_use]
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Open an unmanaged transaction. Only the log's own preconditions can
    /// refuse it.
    pub fn start_unmanaged(
        &self,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Option<TransactionId> {
        self.open(TransactionCategory::Unmanaged, description, primary)
    }

    /// Open a self-closing transaction directly against the log.
    pub fn start_unmanaged_scoped(
        &self,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Option<ScopedTransaction> {
        let handle =
            ScopedTransaction::begin(&self.log, &self.config.session_name, description, primary);
        if handle.is_outstanding() {
            tracing::debug!(
                index = ?handle.index(),
                description = %description,
                "scoped transaction started"
            );
            Some(handle)
        } else {
            tracing::warn!(description = %description, "scoped transaction refused by log");
            None
        }
    }

    /// Open the managed transaction. Fails without side effects while the
    /// slot is occupied.
    pub fn start_managed(
        &mut self,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Option<TransactionId> {
        if let Some(current) = self.managed {
            tracing::warn!(
                current = %current,
                description = %description,
                "managed transaction refused: slot occupied"
            );
            return None;
        }
        let id = self.open(TransactionCategory::Managed, description, primary)?;
        self.managed = Some(id);
        Some(id)
    }

    /// `id` is the outstanding managed transaction.
    #[must_use]
    pub fn is_managed(&self, id: TransactionId) -> bool {
        id.is_managed() && self.managed == Some(id)
    }

    /// `id` is an unmanaged transaction (and therefore not the slot).
    #[must_use]
    pub fn is_unmanaged(&self, id: TransactionId) -> bool {
        !id.is_managed() && self.managed != Some(id)
    }

    #[must_use]
    pub fn has_managed(&self) -> bool {
        self.managed.is_some()
    }

    #[must_use]
    pub fn managed_transaction(&self) -> Option<TransactionId> {
        self.managed
    }

    /// Cancel the managed transaction.
    ///
    /// # Errors
    ///
    /// [`TransactionError::NotManaged`] if `id` is not the slot's id (nothing
    /// changes). Log failures clear the slot and are reported as
    /// [`TransactionError::LogMismatch`] or [`TransactionError::LogBusy`].
    pub fn cancel_managed(&mut self, id: TransactionId) -> Result<(), TransactionError> {
        self.close_managed(id, Close::Cancel)
    }

    /// End the managed transaction. Errors as [`Self::cancel_managed`].
    pub fn end_managed(&mut self, id: TransactionId) -> Result<(), TransactionError> {
        self.close_managed(id, Close::End)
    }

    /// Cancel an unmanaged transaction.
    ///
    /// # Errors
    ///
    /// [`TransactionError::NotUnmanaged`] if `id` is the managed one, or a log
    /// failure.
    pub fn cancel_unmanaged(&self, id: TransactionId) -> Result<(), TransactionError> {
        self.close_unmanaged(id, Close::Cancel)
    }

    /// End an unmanaged transaction. Errors as [`Self::cancel_unmanaged`].
    pub fn end_unmanaged(&self, id: TransactionId) -> Result<(), TransactionError> {
        self.close_unmanaged(id, Close::End)
    }

    fn open(
        &self,
        category: TransactionCategory,
        description: &Text,
        primary: Option<&AnyObject>,
    ) -> Option<TransactionId> {
        let Ok(mut log) = self.log.try_borrow_mut() else {
            tracing::warn!(
                category = category.as_str(),
                description = %description,
                "transaction refused: log busy"
            );
            return None;
        };
        if !log.can_transact() {
            tracing::warn!(
                category = category.as_str(),
                description = %description,
                "transaction refused: log cannot transact"
            );
            return None;
        }
        let Some(index) = log.begin(&self.config.session_name, description, primary) else {
            tracing::warn!(
                category = category.as_str(),
                description = %description,
                "transaction refused by log"
            );
            return None;
        };
        let id = TransactionId { index, category };
        tracing::debug!(
            id = %id,
            session = %self.config.session_name,
            description = %description,
            "transaction started"
        );
        Some(id)
    }

    fn close_managed(&mut self, id: TransactionId, close: Close) -> Result<(), TransactionError> {
        if !self.is_managed(id) {
            tracing::warn!(
                id = %id,
                slot = ?self.managed,
                op = close.as_str(),
                "not the managed transaction"
            );
            return Err(TransactionError::NotManaged(id));
        }
        let result = self.close_in_log(id, close);
        self.managed = None;
        result
    }

    fn close_unmanaged(&self, id: TransactionId, close: Close) -> Result<(), TransactionError> {
        if !self.is_unmanaged(id) {
            tracing::warn!(id = %id, op = close.as_str(), "not an unmanaged transaction");
            return Err(TransactionError::NotUnmanaged(id));
        }
        self.close_in_log(id, close)
    }

    fn close_in_log(&self, id: TransactionId, close: Close) -> Result<(), TransactionError> {
        let result = match self.log.try_borrow_mut() {
            Err(_) => Err(TransactionError::LogBusy(id)),
            Ok(mut log) => {
                let closed = log.is_open(id.index)
                    && match close {
                        Close::End => log.end(id.index),
                        Close::Cancel => {
                            log.cancel(id.index);
                            !log.is_open(id.index)
                        }
                    };
                if closed {
                    Ok(())
                } else {
                    Err(TransactionError::LogMismatch(id))
                }
            }
        };
        match &result {
            Ok(()) => tracing::debug!(id = %id, op = close.as_str(), "transaction closed"),
            Err(err) => self.invariant_violated(err),
        }
        result
    }

    fn invariant_violated(&self, err: &TransactionError) {
        tracing::error!(error = %err, "transaction log out of step with manager");
        if self.config.assert_invariants {
            panic!("transaction log out of step with manager: {err}");
        }
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("managed", &self.managed)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (TransactionManager, Rc<RefCell<MemoryLog>>) {
        let log = MemoryLog::shared();
        let config = TransactionConfig::default().with_assert_invariants(false);
        (TransactionManager::with_config(Rc::clone(&log), config), log)
    }

    fn desc(s: &str) -> Text {
        Text::from(s)
    }

    #[test]
    fn managed_slot_is_exclusive() {
        let (mut m, _log) = manager();
        let first = m.start_managed(&desc("a"), None).unwrap();
        assert!(m.is_managed(first));
        assert!(m.start_managed(&desc("b"), None).is_none());
        assert_eq!(m.managed_transaction(), Some(first));
    }

    #[test]
    fn ending_frees_the_slot() {
        let (mut m, log) = manager();
        let first = m.start_managed(&desc("a"), None).unwrap();
        m.end_managed(first).unwrap();
        assert!(!m.has_managed());
        assert_eq!(log.borrow().committed().len(), 1);
        assert!(m.start_managed(&desc("b"), None).is_some());
    }

    #[test]
    fn cancelling_frees_the_slot() {
        let (mut m, log) = manager();
        let id = m.start_managed(&desc("a"), None).unwrap();
        m.cancel_managed(id).unwrap();
        assert!(!m.has_managed());
        assert_eq!(log.borrow().cancelled().len(), 1);
    }

    #[test]
    fn unmanaged_never_touches_slot() {
        let (mut m, _log) = manager();
        let managed = m.start_managed(&desc("m"), None).unwrap();
        let a = m.start_unmanaged(&desc("u1"), None).unwrap();
        let b = m.start_unmanaged(&desc("u2"), None).unwrap();
        assert!(m.is_unmanaged(a) && m.is_unmanaged(b));
        assert!(!m.is_managed(a));
        m.end_unmanaged(b).unwrap();
        m.cancel_unmanaged(a).unwrap();
        assert_eq!(m.managed_transaction(), Some(managed));
    }

    #[test]
    fn category_mismatch_leaves_state_alone() {
        let (mut m, log) = manager();
        let managed = m.start_managed(&desc("m"), None).unwrap();
        let unmanaged = m.start_unmanaged(&desc("u"), None).unwrap();

        assert_eq!(
            m.end_managed(unmanaged),
            Err(TransactionError::NotManaged(unmanaged))
        );
        assert_eq!(
            m.cancel_unmanaged(managed),
            Err(TransactionError::NotUnmanaged(managed))
        );
        assert_eq!(m.managed_transaction(), Some(managed));
        assert_eq!(log.borrow().open_count(), 2);
    }

    #[test]
    fn stale_managed_id_is_rejected() {
        let (mut m, _log) = manager();
        let old = m.start_managed(&desc("old"), None).unwrap();
        m.end_managed(old).unwrap();
        let new = m.start_managed(&desc("new"), None).unwrap();
        assert_eq!(m.end_managed(old), Err(TransactionError::NotManaged(old)));
        assert!(m.is_managed(new));
    }

    #[test]
    fn unmanaged_cancel_targets_presented_id() {
        let (m, log) = manager();
        let a = m.start_unmanaged(&desc("a"), None).unwrap();
        let b = m.start_unmanaged(&desc("b"), None).unwrap();
        m.cancel_unmanaged(a).unwrap();
        assert!(!log.borrow().is_open(a.index()));
        assert!(log.borrow().is_open(b.index()));
    }

    #[test]
    fn log_preconditions_refuse_starts() {
        let (mut m, log) = manager();
        log.borrow_mut().set_applying(true);
        assert!(m.start_managed(&desc("m"), None).is_none());
        assert!(m.start_unmanaged(&desc("u"), None).is_none());
        assert!(m.start_unmanaged_scoped(&desc("s"), None).is_none());
        assert!(!m.has_managed());
    }

    #[test]
    fn log_mismatch_still_clears_slot() {
        let (mut m, log) = manager();
        let id = m.start_managed(&desc("m"), None).unwrap();
        // Someone else closes the session behind the manager's back.
        assert!(log.borrow_mut().end(id.index()));
        assert_eq!(m.end_managed(id), Err(TransactionError::LogMismatch(id)));
        assert!(!m.has_managed());
    }

    #[test]
    fn managed_and_unmanaged_close_in_any_order() {
        let (mut m, log) = manager();
        let managed = m.start_managed(&desc("managed"), None).unwrap();
        let unmanaged = m.start_unmanaged(&desc("unmanaged"), None).unwrap();

        m.end_managed(managed).unwrap();
        assert!(!m.has_managed());
        assert!(!log.borrow().is_open(managed.index()));
        assert!(log.borrow().is_open(unmanaged.index()));

        m.end_unmanaged(unmanaged).unwrap();
        let committed: Vec<String> = log
            .borrow()
            .committed()
            .iter()
            .map(|r| r.description.as_str().to_owned())
            .collect();
        assert_eq!(committed, vec!["managed", "unmanaged"]);
        assert_eq!(log.borrow().open_count(), 0);
    }

    #[test]
    fn cancelling_managed_keeps_inner_unmanaged_open() {
        let (mut m, log) = manager();
        let managed = m.start_managed(&desc("managed"), None).unwrap();
        let unmanaged = m.start_unmanaged(&desc("unmanaged"), None).unwrap();
        m.cancel_managed(managed).unwrap();
        assert!(log.borrow().is_open(unmanaged.index()));
        m.cancel_unmanaged(unmanaged).unwrap();
        assert_eq!(log.borrow().cancelled().len(), 2);
    }

    #[test]
    #[should_panic(expected = "out of step")]
    fn mismatch_panics_when_asserting() {
        let log = MemoryLog::shared();
        let config = TransactionConfig::default().with_assert_invariants(true);
        let mut m = TransactionManager::with_config(Rc::clone(&log), config);
        let id = m.start_managed(&desc("m"), None).unwrap();
        log.borrow_mut().cancel(id.index());
        let _ = m.cancel_managed(id);
    }

    #[test]
    fn busy_log_refuses_start() {
        let (m, log) = manager();
        let _guard = log.borrow();
        assert!(m.start_unmanaged(&desc("u"), None).is_none());
    }

    #[test]
    fn scoped_transaction_bypasses_slot() {
        let (mut m, log) = manager();
        let managed = m.start_managed(&desc("m"), None).unwrap();
        {
            let scoped = m.start_unmanaged_scoped(&desc("s"), None).unwrap();
            assert!(scoped.is_outstanding());
            assert_eq!(log.borrow().open_count(), 2);
        }
        assert_eq!(log.borrow().open_count(), 1);
        assert_eq!(m.managed_transaction(), Some(managed));
    }

    #[test]
    fn session_name_comes_from_config() {
        let log = MemoryLog::shared();
        let m = TransactionManager::with_config(Rc::clone(&log), TransactionConfig::new("Editor"));
        m.start_unmanaged(&desc("u"), None).unwrap();
        assert_eq!(log.borrow().open_sessions()[0].session.as_str(), "Editor");
    }

    #[test]
    fn id_display() {
        let (mut m, _log) = manager();
        let id = m.start_managed(&desc("m"), None).unwrap();
        assert_eq!(id.to_string(), "managed#0");
        assert_eq!(
            TransactionError::NotManaged(id).to_string(),
            "managed#0 is not the outstanding managed transaction"
        );
    }
}
