#![forbid(unsafe_code)]

//! Host objects, owning references to them, and the GC walker boundary.
//!
//! Host objects live in a collected world: an [`ObjectPtr`] keeps the
//! allocation reachable, but the object itself can be flagged as destroyed
//! (pending collection) while references to it still exist. A destroyed or
//! null reference is "not alive" and must never be handed to a
//! [`ReferenceCollector`] or notified about modification.
//!
//! # Invariants
//!
//! 1. [`ObjectPtr::get`] returns `Some` only while the object is alive.
//! 2. Equality of two pointers is identity; two null pointers are equal.
//! 3. Destruction is one-way: once destroyed, an object never becomes alive.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// An object owned by the host application that properties may reference.
pub trait HostObject: 'static {
    /// Called when a transaction is about to record changes to this object.
    fn modify(&self) {}

    /// Human-readable identity used in logs and transaction records.
    fn object_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

struct ObjectCell<O: ?Sized> {
    alive: Cell<bool>,
    object: O,
}

/// Nullable owning reference to a host object.
pub struct ObjectPtr<O: ?Sized + HostObject> {
    cell: Option<Rc<ObjectCell<O>>>,
}

/// Type-erased reference handed to collectors and transaction logs.
pub type AnyObject = ObjectPtr<dyn HostObject>;

impl<O: HostObject> ObjectPtr<O> {
    /// Allocate a new live object.
    #[must_use]
    pub fn new(object: O) -> Self {
        Self {
            cell: Some(Rc::new(ObjectCell {
                alive: Cell::new(true),
                object,
            })),
        }
    }

    /// Erase the concrete type, keeping identity.
    #[must_use]
    pub fn to_any(&self) -> AnyObject {
        let cell = self.cell.clone().map(|cell| {
            let erased: Rc<ObjectCell<dyn HostObject>> = cell;
            erased
        });
        ObjectPtr { cell }
    }
}

impl<O: ?Sized + HostObject> ObjectPtr<O> {
    #[must_use]
    pub const fn null() -> Self {
        Self { cell: None }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.cell.is_none()
    }

    /// True when non-null and not destroyed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cell.as_ref().is_some_and(|cell| cell.alive.get())
    }

    /// The object, if it is still alive.
    #[must_use]
    pub fn get(&self) -> Option<&O> {
        self.cell
            .as_ref()
            .filter(|cell| cell.alive.get())
            .map(|cell| &cell.object)
    }

    /// Flag the object as garbage. Every reference observes the change.
    pub fn mark_destroyed(&self) {
        if let Some(cell) = &self.cell {
            cell.alive.set(false);
        }
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.cell, &other.cell) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Number of live references to the allocation (zero for null).
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.cell.as_ref().map_or(0, Rc::strong_count)
    }
}

impl<O: ?Sized + HostObject> Clone for ObjectPtr<O> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<O: ?Sized + HostObject> Default for ObjectPtr<O> {
    fn default() -> Self {
        Self::null()
    }
}

impl<O: ?Sized + HostObject> PartialEq for ObjectPtr<O> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<O: ?Sized + HostObject> fmt::Debug for ObjectPtr<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell {
            None => f.write_str("ObjectPtr(null)"),
            Some(cell) => f
                .debug_struct("ObjectPtr")
                .field("name", &cell.object.object_name())
                .field("alive", &cell.alive.get())
                .finish(),
        }
    }
}

/// GC walker visiting the references a property holds.
///
/// Implementations receive exactly one call per live reference.
pub trait ReferenceCollector {
    fn add_referenced_object(&mut self, object: AnyObject);
}

impl ReferenceCollector for Vec<AnyObject> {
    fn add_referenced_object(&mut self, object: AnyObject) {
        self.push(object);
    }
}
