#![forbid(unsafe_code)]

//! Read-only and mutable properties with change notification and
//! transaction bookkeeping.
//!
//! # Write capability
//!
//! [`ConstProperty<T, K>`] is readable by anyone but writable only by code
//! that can construct a `K`. The owner declares a token type with a private
//! constructor and keeps it to itself:
//!
//! ```
//! use sprop_core::ConstProperty;
//!
//! pub struct Door {
//!     pub open: ConstProperty<bool, DoorKey>,
//! }
//!
//! pub struct DoorKey(());
//!
//! impl Door {
//!     pub fn toggle(&mut self) {
//!         let next = !*self.open.get();
//!         self.open.set(DoorKey(()), next);
//!     }
//! }
//! ```
//!
//! With the default `K = NoKey` there is no token at all, so the property
//! can never be written after construction.
//!
//! # Transactions
//!
//! Each property holds at most one transaction id. Managed transactions go
//! through the manager's single slot; unmanaged ones are opened directly in
//! the log and only validated by category. A scoped transaction is returned
//! as a handle and leaves the property idle, so no modification tracking
//! happens for it.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::kind::{PropertyError, PropertyValue};
use crate::object::AnyObject;
use crate::reactive::base::PropertyBase;
use crate::reactive::notifier::ChangeNotifier;
use crate::text::Text;
use crate::undo::{ScopedTransaction, TransactionError, TransactionId, TransactionManager};

/// Token type of a property nobody may write. It has no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoKey {}

/// Outcome of ending or cancelling a property's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionEndResult {
    Cancelled,
    Ended,
    /// No transaction was open.
    Invalid,
    /// The open transaction is not the managed one.
    NotManaged,
    /// The open transaction is not an unmanaged one.
    NotUnmanaged,
    /// The log disagreed with the manager's bookkeeping.
    UnknownError,
}

impl TransactionEndResult {
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Ended)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Ended => "ended",
            Self::Invalid => "invalid",
            Self::NotManaged => "not_managed",
            Self::NotUnmanaged => "not_unmanaged",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for TransactionEndResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConstProperty
// ---------------------------------------------------------------------------

/// Publicly readable property; writes need a `K` token.
pub struct ConstProperty<T, K = NoKey> {
    base: PropertyBase<T>,
    notifier: ChangeNotifier<T>,
    transaction: Option<TransactionId>,
    modified: bool,
    _key: PhantomData<fn() -> K>,
}

impl<T: PropertyValue, K> ConstProperty<T, K> {
    /// Wrap `value`.
    ///
    /// # Errors
    ///
    /// [`PropertyError::NoComparison`] when `T` declared no equality.
    pub fn try_new(value: impl Into<T>) -> Result<Self, PropertyError> {
        Self::try_with_notifier(value, ChangeNotifier::unbound())
    }

    /// Wrap `value`.
    ///
    /// # Panics
    ///
    /// Panics when `T` declared no equality; see [`Self::try_new`].
    #[must_use]
    pub fn new(value: impl Into<T>) -> Self {
        Self::with_notifier(value, ChangeNotifier::unbound())
    }

    /// Wrap `value` with a change callback.
    ///
    /// # Errors
    ///
    /// [`PropertyError::NoComparison`] when `T` declared no equality.
    pub fn try_with_notifier(
        value: impl Into<T>,
        notifier: impl Into<ChangeNotifier<T>>,
    ) -> Result<Self, PropertyError> {
        let base = PropertyBase::new(value);
        base.policy.validate()?;
        Ok(Self {
            base,
            notifier: notifier.into(),
            transaction: None,
            modified: false,
            _key: PhantomData,
        })
    }

    /// Wrap `value` with a change callback.
    ///
    /// # Panics
    ///
    /// Panics when `T` declared no equality; see [`Self::try_new`].
    #[must_use]
    pub fn with_notifier(value: impl Into<T>, notifier: impl Into<ChangeNotifier<T>>) -> Self {
        match Self::try_with_notifier(value, notifier) {
            Ok(property) => property,
            Err(err) => panic!("{err}"),
        }
    }

    #[must_use]
    pub fn as_base(&self) -> &PropertyBase<T> {
        &self.base
    }

    /// Store `value` unless it equals the current one. Fires the notifier
    /// once when the value changed.
    pub fn set(&mut self, _key: K, value: impl Into<T>) -> bool {
        self.write(value.into())
    }

    /// Assign from another property's value, through the same equality gate.
    pub fn set_from<U>(&mut self, _key: K, other: &PropertyBase<U>) -> bool
    where
        U: PropertyValue + Clone + Into<T>,
    {
        self.write(other.get().clone().into())
    }

    /// Report an in-place change: marks the open transaction modified and
    /// fires the notifier.
    pub fn notify_changed(&mut self) -> bool {
        if self.transaction.is_some() {
            self.modified = true;
        }
        self.notifier.fire(&self.base.value)
    }

    pub fn set_notifier(&mut self, notifier: impl Into<ChangeNotifier<T>>) {
        self.notifier = notifier.into();
    }

    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier<T> {
        &self.notifier
    }

    fn write(&mut self, value: T) -> bool {
        if !self.base.replace(value) {
            return false;
        }
        self.notify_changed();
        true
    }

    // -- transactions -------------------------------------------------------

    /// Open the managed transaction for this property.
    ///
    /// Fails when this property already has a transaction, when another
    /// managed transaction is outstanding, or when the log refuses.
    pub fn start_managed_transaction(
        &mut self,
        manager: &mut TransactionManager,
        description: impl Into<Text>,
    ) -> bool {
        if let Some(current) = self.transaction {
            tracing::warn!(current = %current, "property already has a transaction");
            return false;
        }
        let description = description.into();
        let owner = self.base.owning_object();
        let Some(id) = manager.start_managed(&description, owner.as_ref()) else {
            return false;
        };
        notify_owner(owner.as_ref());
        self.open(id);
        true
    }

    /// Open an unmanaged transaction for this property.
    pub fn start_unmanaged_transaction(
        &mut self,
        manager: &TransactionManager,
        description: impl Into<Text>,
    ) -> Option<TransactionId> {
        if let Some(current) = self.transaction {
            tracing::warn!(current = %current, "property already has a transaction");
            return None;
        }
        let description = description.into();
        let owner = self.base.owning_object();
        let id = manager.start_unmanaged(&description, owner.as_ref())?;
        notify_owner(owner.as_ref());
        self.open(id);
        Some(id)
    }

    /// Open a self-closing transaction. The property stays idle and does not
    /// track modification while the handle is alive.
    pub fn start_unmanaged_scoped_transaction(
        &self,
        manager: &TransactionManager,
        description: impl Into<Text>,
    ) -> Option<ScopedTransaction> {
        if let Some(current) = self.transaction {
            tracing::warn!(current = %current, "property already has a transaction");
            return None;
        }
        let description = description.into();
        let owner = self.base.owning_object();
        let handle = manager.start_unmanaged_scoped(&description, owner.as_ref())?;
        notify_owner(owner.as_ref());
        Some(handle)
    }

    pub fn cancel_managed_transaction(
        &mut self,
        manager: &mut TransactionManager,
    ) -> TransactionEndResult {
        match self.managed_id(manager) {
            Ok(id) => {
                let outcome = manager.cancel_managed(id);
                self.settle(outcome, TransactionEndResult::Cancelled)
            }
            Err(result) => result,
        }
    }

    /// End the managed transaction. With `cancel_if_unmodified`, a session in
    /// which nothing changed is cancelled instead and reported as
    /// [`TransactionEndResult::Cancelled`].
    pub fn end_managed_transaction(
        &mut self,
        manager: &mut TransactionManager,
        cancel_if_unmodified: bool,
    ) -> TransactionEndResult {
        let id = match self.managed_id(manager) {
            Ok(id) => id,
            Err(result) => return result,
        };
        if cancel_if_unmodified && !self.modified {
            let outcome = manager.cancel_managed(id);
            self.settle(outcome, TransactionEndResult::Cancelled)
        } else {
            let outcome = manager.end_managed(id);
            self.settle(outcome, TransactionEndResult::Ended)
        }
    }

    pub fn cancel_unmanaged_transaction(
        &mut self,
        manager: &TransactionManager,
    ) -> TransactionEndResult {
        match self.unmanaged_id() {
            Ok(id) => {
                let outcome = manager.cancel_unmanaged(id);
                self.settle(outcome, TransactionEndResult::Cancelled)
            }
            Err(result) => result,
        }
    }

    /// End the unmanaged transaction; `cancel_if_unmodified` as for
    /// [`Self::end_managed_transaction`].
    pub fn end_unmanaged_transaction(
        &mut self,
        manager: &TransactionManager,
        cancel_if_unmodified: bool,
    ) -> TransactionEndResult {
        let id = match self.unmanaged_id() {
            Ok(id) => id,
            Err(result) => return result,
        };
        if cancel_if_unmodified && !self.modified {
            let outcome = manager.cancel_unmanaged(id);
            self.settle(outcome, TransactionEndResult::Cancelled)
        } else {
            let outcome = manager.end_unmanaged(id);
            self.settle(outcome, TransactionEndResult::Ended)
        }
    }

    #[must_use]
    pub fn has_managed_transaction(&self, manager: &TransactionManager) -> bool {
        self.transaction.is_some_and(|id| manager.is_managed(id))
    }

    #[must_use]
    pub fn has_unmanaged_transaction(&self, manager: &TransactionManager) -> bool {
        self.transaction.is_some_and(|id| manager.is_unmanaged(id))
    }

    /// True when the value changed during this property's managed
    /// transaction. Always false otherwise.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified && self.transaction.is_some_and(TransactionId::is_managed)
    }

    #[must_use]
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction
    }

    fn open(&mut self, id: TransactionId) {
        self.transaction = Some(id);
        self.modified = false;
    }

    fn reset(&mut self) {
        self.transaction = None;
        self.modified = false;
    }

    fn managed_id(&mut self, manager: &TransactionManager) -> Result<TransactionId, TransactionEndResult> {
        let Some(id) = self.transaction else {
            self.reset();
            return Err(TransactionEndResult::Invalid);
        };
        if !id.is_managed() {
            tracing::warn!(id = %id, "managed close requested for an unmanaged transaction");
            return Err(TransactionEndResult::NotManaged);
        }
        if !manager.is_managed(id) {
            // The slot was closed elsewhere; this id can never be closed now.
            tracing::warn!(id = %id, slot = ?manager.managed_transaction(), "stale managed transaction");
            self.reset();
            return Err(TransactionEndResult::NotManaged);
        }
        Ok(id)
    }

    fn unmanaged_id(&mut self) -> Result<TransactionId, TransactionEndResult> {
        let Some(id) = self.transaction else {
            self.reset();
            return Err(TransactionEndResult::Invalid);
        };
        if id.is_managed() {
            tracing::warn!(id = %id, "unmanaged close requested for the managed transaction");
            return Err(TransactionEndResult::NotUnmanaged);
        }
        Ok(id)
    }

    fn settle(
        &mut self,
        outcome: Result<(), TransactionError>,
        success: TransactionEndResult,
    ) -> TransactionEndResult {
        self.reset();
        match outcome {
            Ok(()) => success,
            Err(TransactionError::NotManaged(_)) => TransactionEndResult::NotManaged,
            Err(TransactionError::NotUnmanaged(_)) => TransactionEndResult::NotUnmanaged,
            Err(TransactionError::LogMismatch(_) | TransactionError::LogBusy(_)) => {
                TransactionEndResult::UnknownError
            }
        }
    }
}

fn notify_owner(owner: Option<&AnyObject>) {
    if let Some(object) = owner.and_then(AnyObject::get) {
        object.modify();
    }
}

impl<T: PropertyValue, K> Deref for ConstProperty<T, K> {
    type Target = PropertyBase<T>;

    fn deref(&self) -> &PropertyBase<T> {
        &self.base
    }
}

/// Copies value and notifier. The copy starts without a transaction.
impl<T: PropertyValue + Clone, K> Clone for ConstProperty<T, K> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            notifier: self.notifier.clone(),
            transaction: None,
            modified: false,
            _key: PhantomData,
        }
    }
}

impl<T: PropertyValue + Default, K> Default for ConstProperty<T, K> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug, K> fmt::Debug for ConstProperty<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstProperty")
            .field("value", &self.base.value)
            .field("notifier", &self.notifier)
            .field("transaction", &self.transaction)
            .field("modified", &self.modified)
            .finish()
    }
}

impl<T: Serialize, K> Serialize for ConstProperty<T, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.base.serialize(serializer)
    }
}

impl<'de, T: PropertyValue + Deserialize<'de>, K> Deserialize<'de> for ConstProperty<T, K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = T::deserialize(deserializer)?;
        Self::try_new(value).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// Property with an open setter and mutable access.
///
/// Everything else (transactions, notifier, reads) is reached through
/// `Deref` to [`ConstProperty`].
pub struct Property<T, K = NoKey> {
    inner: ConstProperty<T, K>,
}

impl<T: PropertyValue, K> Property<T, K> {
    /// # Errors
    ///
    /// [`PropertyError::NoComparison`] when `T` declared no equality.
    pub fn try_new(value: impl Into<T>) -> Result<Self, PropertyError> {
        ConstProperty::try_new(value).map(|inner| Self { inner })
    }

    /// # Panics
    ///
    /// Panics when `T` declared no equality; see [`Self::try_new`].
    #[must_use]
    pub fn new(value: impl Into<T>) -> Self {
        Self {
            inner: ConstProperty::new(value),
        }
    }

    /// # Errors
    ///
    /// [`PropertyError::NoComparison`] when `T` declared no equality.
    pub fn try_with_notifier(
        value: impl Into<T>,
        notifier: impl Into<ChangeNotifier<T>>,
    ) -> Result<Self, PropertyError> {
        ConstProperty::try_with_notifier(value, notifier).map(|inner| Self { inner })
    }

    /// # Panics
    ///
    /// Panics when `T` declared no equality; see [`Self::try_new`].
    #[must_use]
    pub fn with_notifier(value: impl Into<T>, notifier: impl Into<ChangeNotifier<T>>) -> Self {
        Self {
            inner: ConstProperty::with_notifier(value, notifier),
        }
    }

    /// Store `value` unless it equals the current one.
    pub fn set(&mut self, value: impl Into<T>) -> bool {
        self.inner.write(value.into())
    }

    pub fn set_from<U>(&mut self, other: &PropertyBase<U>) -> bool
    where
        U: PropertyValue + Clone + Into<T>,
    {
        self.inner.write(other.get().clone().into())
    }

    /// Direct mutable access. Nothing is compared or fired; call
    /// [`ConstProperty::notify_changed`] afterwards.
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.inner.base.value
    }

    /// Edit in place; fires once when the result differs from the value
    /// before the edit.
    pub fn update(&mut self, edit: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        let before = self.inner.base.value.clone();
        edit(&mut self.inner.base.value);
        if self.inner.base.policy.is_equal(&before, &self.inner.base.value) {
            return false;
        }
        self.inner.notify_changed();
        true
    }

    #[must_use]
    pub fn into_const(self) -> ConstProperty<T, K> {
        self.inner
    }
}

impl<T: PropertyValue, K> Deref for Property<T, K> {
    type Target = ConstProperty<T, K>;

    fn deref(&self) -> &ConstProperty<T, K> {
        &self.inner
    }
}

impl<T: PropertyValue, K> DerefMut for Property<T, K> {
    fn deref_mut(&mut self) -> &mut ConstProperty<T, K> {
        &mut self.inner
    }
}

impl<T: PropertyValue + Clone, K> Clone for Property<T, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PropertyValue + Default, K> Default for Property<T, K> {
    fn default() -> Self {
        Self {
            inner: ConstProperty::default(),
        }
    }
}

impl<T: fmt::Debug, K> fmt::Debug for Property<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&self.inner).finish()
    }
}

impl<T: Serialize, K> Serialize for Property<T, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de, T: PropertyValue + Deserialize<'de>, K> Deserialize<'de> for Property<T, K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ConstProperty::deserialize(deserializer).map(|inner| Self { inner })
    }
}
