#![forbid(unsafe_code)]

//! Property wrappers with change notification.
//!
//! - [`PropertyBase`]: owns one value and its resolved kind policy.
//! - [`ChangeNotifier`]: single optional callback, fired with the new value.
//! - [`ConstProperty`]: public reads, writes gated by a capability token.
//! - [`Property`]: open writes plus in-place mutation.
//!
//! # Invariants
//!
//! 1. A write whose value compares equal to the stored one is a no-op: it
//!    returns `false` and fires nothing.
//! 2. A changing write stores the value, then fires the notifier exactly once,
//!    then returns `true`.
//! 3. A property holds at most one transaction at a time.
//! 4. Types without an equality comparison cannot be wrapped by a property.

pub mod base;
pub mod notifier;
pub mod property;

pub use base::PropertyBase;
pub use notifier::ChangeNotifier;
pub use property::{ConstProperty, NoKey, Property, TransactionEndResult};
