#![forbid(unsafe_code)]

//! Value-kind policies: how a wrapped value is compared, walked by the
//! collector, dereferenced, and mapped to the host object it belongs to.
//!
//! # Design
//!
//! Every wrapped type belongs to one [`ValueKind`]. The kind selects a
//! [`KindPolicy`], a small table of function pointers resolved once when a
//! property is constructed:
//!
//! | Kind     | Comparison | Collector          | Owning object     | Target          |
//! |----------|------------|--------------------|-------------------|-----------------|
//! | Plain    | chosen     | opt-in             | opt-in            | the value       |
//! | Owning   | identity   | the object if alive| the object if alive | the object if alive |
//! | Shared   | identity   | none               | none              | the pointee     |
//! | Weak     | identity   | none               | none              | pointee if it can be upgraded |
//!
//! Plain values pick their comparison explicitly, in preference order:
//! `PartialEq`, then [`Equals`], then [`EqualTo`]. A type with none of them
//! must say so with [`KindPolicy::plain_incomparable`]; such a policy fails
//! [`KindPolicy::validate`] and mutable properties refuse to wrap it rather
//! than treating every write as a change.

use std::any::{Any, type_name};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::object::{AnyObject, HostObject, ObjectPtr, ReferenceCollector};
use crate::text::{Name, Text};

/// Category of a wrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Held by value.
    Plain,
    /// Owning reference to a collected host object.
    Owning,
    /// Strong shared reference.
    Shared,
    /// Weak shared reference that may have expired.
    Weak,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Owning => "owning",
            Self::Shared => "shared",
            Self::Weak => "weak",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality strategy a policy compares with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `PartialEq`.
    Operator,
    /// [`Equals::equals`].
    Equals,
    /// [`EqualTo::equal_to`].
    EqualTo,
    /// Reference identity.
    Identity,
    /// No comparison exists for the type.
    Unavailable,
}

impl Comparison {
    #[must_use]
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Equals => "equals",
            Self::EqualTo => "equal_to",
            Self::Identity => "identity",
            Self::Unavailable => "unavailable",
        }
    }
}

/// String-style equality for types without `PartialEq`.
pub trait Equals {
    fn equals(&self, other: &Self) -> bool;
}

/// Display-text equality for types without `PartialEq` or [`Equals`].
pub trait EqualTo {
    fn equal_to(&self, other: &Self) -> bool;
}

/// Errors raised while resolving a property's policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The wrapped type declared no equality comparison.
    NoComparison { type_name: &'static str },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoComparison { type_name } => write!(
                f,
                "`{type_name}` has no equality comparison; implement PartialEq, Equals or EqualTo"
            ),
        }
    }
}

impl std::error::Error for PropertyError {}

// ---------------------------------------------------------------------------
// Reflection boundary
// ---------------------------------------------------------------------------

/// A nested field located by name inside a wrapped value.
#[derive(Clone, Copy)]
pub struct InnerField<'a> {
    name: &'static str,
    type_name: &'static str,
    data: &'a dyn Any,
}

impl<'a> InnerField<'a> {
    #[must_use]
    pub fn new<V: Any>(name: &'static str, data: &'a V) -> Self {
        Self {
            name,
            type_name: type_name::<V>(),
            data,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Raw access to the field data.
    #[must_use]
    pub fn data(&self) -> &'a dyn Any {
        self.data
    }

    #[must_use]
    pub fn downcast_ref<V: Any>(&self) -> Option<&'a V> {
        self.data.downcast_ref()
    }
}

impl fmt::Debug for InnerField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerField")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Nested field introspection for inspector tooling.
pub trait Inspect {
    fn find_inner_field(&self, name: &Name) -> Option<InnerField<'_>>;
}

// ---------------------------------------------------------------------------
// Policy table
// ---------------------------------------------------------------------------

type EqFn<T> = fn(&T, &T) -> bool;
type CollectFn<T> = fn(&T, &mut dyn ReferenceCollector) -> bool;
type OwnerFn<T> = fn(&T) -> Option<AnyObject>;
type FindFn<T> = for<'a> fn(&'a T, &Name) -> Option<InnerField<'a>>;

fn no_owner<T>(_value: &T) -> Option<AnyObject> {
    None
}

fn no_inner_field<'a, T>(_value: &'a T, _name: &Name) -> Option<InnerField<'a>> {
    None
}

/// Behaviour table for one wrapped type.
pub struct KindPolicy<T> {
    kind: ValueKind,
    comparison: Comparison,
    eq: Option<EqFn<T>>,
    collect: Option<CollectFn<T>>,
    owner: OwnerFn<T>,
    find_inner: FindFn<T>,
}

impl<T> Clone for KindPolicy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for KindPolicy<T> {}

impl<T> fmt::Debug for KindPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindPolicy")
            .field("type", &type_name::<T>())
            .field("kind", &self.kind)
            .field("comparison", &self.comparison)
            .field("has_references", &self.collect.is_some())
            .finish()
    }
}

impl<T> KindPolicy<T> {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// True when values of this kind take part in reference collection.
    #[must_use]
    pub fn has_references(&self) -> bool {
        self.collect.is_some()
    }
}

impl<T: 'static> KindPolicy<T> {
    fn base(kind: ValueKind, comparison: Comparison, eq: Option<EqFn<T>>) -> Self {
        Self {
            kind,
            comparison,
            eq,
            collect: None,
            owner: no_owner::<T>,
            find_inner: no_inner_field::<T>,
        }
    }

    /// Plain value compared with `PartialEq`.
    #[must_use]
    pub fn plain_operator() -> Self
    where
        T: PartialEq,
    {
        Self::base(ValueKind::Plain, Comparison::Operator, Some(|a, b| a == b))
    }

    /// Plain value compared with [`Equals`].
    #[must_use]
    pub fn plain_equals() -> Self
    where
        T: Equals,
    {
        Self::base(ValueKind::Plain, Comparison::Equals, Some(|a, b| a.equals(b)))
    }

    /// Plain value compared with [`EqualTo`].
    #[must_use]
    pub fn plain_equal_to() -> Self
    where
        T: EqualTo,
    {
        Self::base(
            ValueKind::Plain,
            Comparison::EqualTo,
            Some(|a, b| a.equal_to(b)),
        )
    }

    /// Plain value with no comparison. Readable, but not writable through a
    /// property.
    #[must_use]
    pub fn plain_incomparable() -> Self {
        Self::base(ValueKind::Plain, Comparison::Unavailable, None)
    }

    /// Report references held inside a plain value to the collector.
    #[must_use]
    pub fn with_reference_collector(mut self, collect: CollectFn<T>) -> Self {
        self.collect = Some(collect);
        self
    }

    /// Name the host object a plain value belongs to.
    #[must_use]
    pub fn with_owner(mut self, owner: OwnerFn<T>) -> Self {
        self.owner = owner;
        self
    }

    /// Route inner-field lookups to the value's [`Inspect`] impl.
    #[must_use]
    pub fn inspectable(mut self) -> Self
    where
        T: Inspect,
    {
        self.find_inner = |value, name| value.find_inner_field(name);
        self
    }

    /// Reject policies that cannot gate writes on equality.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::NoComparison`] for an incomparable policy.
    pub fn validate(&self) -> Result<(), PropertyError> {
        if self.eq.is_some() && self.comparison.is_available() {
            Ok(())
        } else {
            Err(PropertyError::NoComparison {
                type_name: type_name::<T>(),
            })
        }
    }

    /// Compare two values. An incomparable policy never reports equality.
    #[must_use]
    pub fn is_equal(&self, current: &T, candidate: &T) -> bool {
        self.eq.is_some_and(|eq| eq(current, candidate))
    }

    /// Hand live references to the collector. Returns whether anything was
    /// reported.
    pub fn add_referenced_objects(&self, value: &T, collector: &mut dyn ReferenceCollector) -> bool {
        self.collect.is_some_and(|collect| collect(value, collector))
    }

    /// The live host object the value belongs to, if any.
    #[must_use]
    pub fn owning_object(&self, value: &T) -> Option<AnyObject> {
        (self.owner)(value)
    }

    #[must_use]
    pub fn find_inner_field<'a>(&self, value: &'a T, name: &Name) -> Option<InnerField<'a>> {
        (self.find_inner)(value, name)
    }
}

impl<O: HostObject> KindPolicy<ObjectPtr<O>> {
    /// Owning reference to a concrete host object type.
    #[must_use]
    pub fn owning() -> Self {
        let mut policy = Self::base(ValueKind::Owning, Comparison::Identity, Some(ObjectPtr::ptr_eq));
        policy.collect = Some(|value, collector| {
            if value.is_valid() {
                collector.add_referenced_object(value.to_any());
                true
            } else {
                false
            }
        });
        policy.owner = |value| value.is_valid().then(|| value.to_any());
        policy
    }
}

impl KindPolicy<AnyObject> {
    /// Owning reference to a type-erased host object.
    #[must_use]
    pub fn owning_erased() -> Self {
        let mut policy = Self::base(ValueKind::Owning, Comparison::Identity, Some(ObjectPtr::ptr_eq));
        policy.collect = Some(|value, collector| {
            if value.is_valid() {
                collector.add_referenced_object(value.clone());
                true
            } else {
                false
            }
        });
        policy.owner = |value| value.is_valid().then(|| value.clone());
        policy
    }
}

impl<U: ?Sized + 'static> KindPolicy<Rc<U>> {
    #[must_use]
    pub fn shared() -> Self {
        Self::base(ValueKind::Shared, Comparison::Identity, Some(Rc::ptr_eq))
    }
}

impl<U: ?Sized + 'static> KindPolicy<Weak<U>> {
    #[must_use]
    pub fn weak() -> Self {
        Self::base(ValueKind::Weak, Comparison::Identity, Some(Weak::ptr_eq))
    }
}

// ---------------------------------------------------------------------------
// PropertyValue
// ---------------------------------------------------------------------------

/// A type that can be wrapped by a property.
pub trait PropertyValue: Sized + 'static {
    /// What pointer-style access resolves to.
    type Target: ?Sized;

    fn policy() -> KindPolicy<Self>;

    /// Run `f` against the pointee. References that are null, destroyed or
    /// expired yield `None`.
    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R;
}

/// Implement [`PropertyValue`] for plain types.
///
/// ```
/// use sprop_core::plain_property_value;
///
/// #[derive(Debug, PartialEq)]
/// struct Extent(u32, u32);
/// plain_property_value!(Extent);
///
/// struct Handle(u64);
/// plain_property_value!(Handle => incomparable);
/// ```
#[macro_export]
macro_rules! plain_property_value {
    (@impl $ty:ty, $ctor:ident) => {
        impl $crate::kind::PropertyValue for $ty {
            type Target = $ty;

            fn policy() -> $crate::kind::KindPolicy<Self> {
                $crate::kind::KindPolicy::$ctor()
            }

            fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
                f(Some(self))
            }
        }
    };
    ($ty:ty => operator) => {
        $crate::plain_property_value!(@impl $ty, plain_operator);
    };
    ($ty:ty => equals) => {
        $crate::plain_property_value!(@impl $ty, plain_equals);
    };
    ($ty:ty => equal_to) => {
        $crate::plain_property_value!(@impl $ty, plain_equal_to);
    };
    ($ty:ty => incomparable) => {
        $crate::plain_property_value!(@impl $ty, plain_incomparable);
    };
    ($($ty:ty),+ $(,)?) => {
        $( $crate::plain_property_value!(@impl $ty, plain_operator); )+
    };
}

plain_property_value!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
);

plain_property_value!(Name => equals);
plain_property_value!(Text => equal_to);

impl<T: PartialEq + 'static> PropertyValue for Vec<T> {
    type Target = Vec<T>;

    fn policy() -> KindPolicy<Self> {
        KindPolicy::plain_operator()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(Some(self))
    }
}

impl<T: PartialEq + 'static> PropertyValue for Option<T> {
    type Target = Option<T>;

    fn policy() -> KindPolicy<Self> {
        KindPolicy::plain_operator()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(Some(self))
    }
}

impl<A: PartialEq + 'static, B: PartialEq + 'static> PropertyValue for (A, B) {
    type Target = (A, B);

    fn policy() -> KindPolicy<Self> {
        KindPolicy::plain_operator()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(Some(self))
    }
}

impl<A, B, C> PropertyValue for (A, B, C)
where
    A: PartialEq + 'static,
    B: PartialEq + 'static,
    C: PartialEq + 'static,
{
    type Target = (A, B, C);

    fn policy() -> KindPolicy<Self> {
        KindPolicy::plain_operator()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(Some(self))
    }
}

impl<O: HostObject> PropertyValue for ObjectPtr<O> {
    type Target = O;

    fn policy() -> KindPolicy<Self> {
        KindPolicy::owning()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(self.get())
    }
}

impl PropertyValue for AnyObject {
    type Target = dyn HostObject;

    fn policy() -> KindPolicy<Self> {
        KindPolicy::owning_erased()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(self.get())
    }
}

impl<U: ?Sized + 'static> PropertyValue for Rc<U> {
    type Target = U;

    fn policy() -> KindPolicy<Self> {
        KindPolicy::shared()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        f(Some(&**self))
    }
}

impl<U: ?Sized + 'static> PropertyValue for Weak<U> {
    type Target = U;

    fn policy() -> KindPolicy<Self> {
        KindPolicy::weak()
    }

    fn with_target<R>(&self, f: impl FnOnce(Option<&Self::Target>) -> R) -> R {
        let pinned = self.upgrade();
        f(pinned.as_deref())
    }
}
