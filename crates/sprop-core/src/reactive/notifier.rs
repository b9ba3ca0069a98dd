#![forbid(unsafe_code)]

//! Single-slot change callback.
//!
//! A [`ChangeNotifier`] holds at most one callback. Every construction form
//! (plain closure, closure with bound arguments, function pointer with bound
//! arguments, instance method with bound arguments) is normalised to the same
//! `Rc<dyn Fn(&T)>`, which receives the value that was just stored.
//!
//! Instance-method bindings hold the instance weakly: the notifier never
//! keeps its owner alive, and firing after the instance is gone is a no-op.

use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

/// Optional callback fired once per successful property write.
pub struct ChangeNotifier<T> {
    callback: Option<Callback<T>>,
}

impl<T: 'static> ChangeNotifier<T> {
    /// No callback; firing does nothing.
    #[must_use]
    pub const fn unbound() -> Self {
        Self { callback: None }
    }

    /// Wrap a closure.
    #[must_use]
    pub fn new(callback: impl Fn(&T) + 'static) -> Self {
        Self {
            callback: Some(Rc::new(callback)),
        }
    }

    /// Wrap a closure together with arguments captured now.
    #[must_use]
    pub fn with_args<A: 'static>(callback: impl Fn(&T, &A) + 'static, args: A) -> Self {
        Self::new(move |value| callback(value, &args))
    }

    /// Wrap a free or associated function together with arguments captured now.
    #[must_use]
    pub fn from_fn<A: 'static>(function: fn(&T, &A), args: A) -> Self {
        Self::new(move |value| function(value, &args))
    }

    /// Bind a method of `instance`. The instance is held weakly.
    #[must_use]
    pub fn bind<I: 'static, A: 'static>(instance: &Rc<I>, method: fn(&I, &T, &A), args: A) -> Self {
        let instance: Weak<I> = Rc::downgrade(instance);
        Self::new(move |value| {
            if let Some(instance) = instance.upgrade() {
                method(&instance, value, &args);
            }
        })
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.callback.is_some()
    }

    /// Invoke the callback if one is bound. Returns whether it ran.
    pub fn fire(&self, value: &T) -> bool {
        match &self.callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    /// Drop the callback.
    pub fn clear(&mut self) {
        self.callback = None;
    }
}

impl<T: 'static> Default for ChangeNotifier<T> {
    fn default() -> Self {
        Self::unbound()
    }
}

// Manual Clone: shares the same Rc.
impl<T> Clone for ChangeNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<T: 'static, F: Fn(&T) + 'static> From<F> for ChangeNotifier<T> {
    fn from(callback: F) -> Self {
        Self::new(callback)
    }
}

impl<T> fmt::Debug for ChangeNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("bound", &self.callback.is_some())
            .finish()
    }
}
