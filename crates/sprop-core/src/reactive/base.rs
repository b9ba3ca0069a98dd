#![forbid(unsafe_code)]

//! Value holder shared by every property type.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::kind::{InnerField, KindPolicy, PropertyValue};
use crate::object::{AnyObject, ReferenceCollector};
use crate::text::Name;

/// Exclusively owns one value together with its resolved [`KindPolicy`].
///
/// Always holds a valid `T`. Reads go through [`get`](Self::get) or `Deref`;
/// pointer-style access goes through [`with_target`](Self::with_target).
pub struct PropertyBase<T> {
    pub(crate) value: T,
    pub(crate) policy: KindPolicy<T>,
}

impl<T: PropertyValue> PropertyBase<T> {
    #[must_use]
    pub fn new(value: impl Into<T>) -> Self {
        Self {
            value: value.into(),
            policy: T::policy(),
        }
    }

    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub fn policy(&self) -> &KindPolicy<T> {
        &self.policy
    }

    /// Run `f` against the pointee (the value itself for plain kinds).
    pub fn with_target<R>(&self, f: impl FnOnce(Option<&T::Target>) -> R) -> R {
        self.value.with_target(f)
    }

    /// Hand live references to the GC walker.
    pub fn add_referenced_objects(&self, collector: &mut dyn ReferenceCollector) -> bool {
        self.policy.add_referenced_objects(&self.value, collector)
    }

    #[must_use]
    pub fn has_references(&self) -> bool {
        self.policy.has_references()
    }

    #[must_use]
    pub fn find_inner_field(&self, name: &Name) -> Option<InnerField<'_>> {
        self.policy.find_inner_field(&self.value, name)
    }

    /// The live host object the value belongs to, if any.
    #[must_use]
    pub fn owning_object(&self) -> Option<AnyObject> {
        self.policy.owning_object(&self.value)
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Store `candidate` unless the policy says it equals the current value.
    pub(crate) fn replace(&mut self, candidate: T) -> bool {
        if self.policy.is_equal(&self.value, &candidate) {
            return false;
        }
        self.value = candidate;
        true
    }
}

impl<T: PropertyValue> Deref for PropertyBase<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: PropertyValue + Clone> Clone for PropertyBase<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            policy: self.policy,
        }
    }
}

impl<T: PropertyValue + Default> Default for PropertyBase<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PropertyValue> From<T> for PropertyBase<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for PropertyBase<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBase")
            .field("value", &self.value)
            .field("kind", &self.policy.kind())
            .finish()
    }
}

impl<T: Serialize> Serialize for PropertyBase<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T: PropertyValue + Deserialize<'de>> Deserialize<'de> for PropertyBase<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::new)
    }
}
