#![forbid(unsafe_code)]

//! Observable, transaction-aware property wrappers.
//!
//! # Role
//! `sprop-core` wraps single values held by host objects (scene actors,
//! document nodes, tool settings) so that every write is equality-gated,
//! observers hear about real changes exactly once, and edits can be grouped
//! into undo transactions in an external log.
//!
//! # Primary responsibilities
//! - **Value kinds**: per-type policy for comparison, GC reporting, owning
//!   object lookup and pointer-style access ([`kind`]).
//! - **Properties**: [`Property`] and the token-gated [`ConstProperty`]
//!   ([`reactive`]).
//! - **Transactions**: the managed slot, unmanaged and scoped sessions, and an
//!   in-memory log ([`undo`]).
//! - **Host boundary**: collected host objects and the GC walker ([`object`]).
//!
//! # Example
//!
//! ```
//! use sprop_core::{Property, TransactionEndResult, TransactionManager};
//!
//! let (mut manager, log) = TransactionManager::in_memory();
//! let mut width: Property<u32> = Property::new(10u32);
//!
//! assert!(width.start_managed_transaction(&mut manager, "Resize"));
//! assert!(!width.set(10u32));
//! assert!(width.set(11u32));
//! assert!(width.is_modified());
//! assert_eq!(
//!     width.end_managed_transaction(&mut manager, true),
//!     TransactionEndResult::Ended
//! );
//! assert_eq!(log.borrow().committed().len(), 1);
//! ```

/// Manager configuration and environment overrides.
pub mod config;
/// Value-kind policies and the [`PropertyValue`] trait.
pub mod kind;
/// Host objects, liveness and the GC walker boundary.
pub mod object;
/// Property types and change notification.
pub mod reactive;
/// Identifier and display-text types.
pub mod text;
/// Transaction log boundary, scoped handles and the manager.
pub mod undo;

pub use config::{ConfigError, TransactionConfig};
pub use kind::{
    Comparison, EqualTo, Equals, InnerField, Inspect, KindPolicy, PropertyError, PropertyValue,
    ValueKind,
};
pub use object::{AnyObject, HostObject, ObjectPtr, ReferenceCollector};
pub use reactive::{
    ChangeNotifier, ConstProperty, NoKey, Property, PropertyBase, TransactionEndResult,
};
pub use text::{Name, Text};
pub use undo::{
    LogIndex, MemoryLog, ScopedTransaction, TransactionCategory, TransactionError, TransactionId,
    TransactionLog, TransactionManager,
};
