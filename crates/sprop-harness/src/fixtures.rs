#![forbid(unsafe_code)]

//! Recording doubles for the host side of the property boundary.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sprop_core::{
    AnyObject, ChangeNotifier, HostObject, MemoryLog, ObjectPtr, ReferenceCollector,
    TransactionConfig, TransactionManager,
};

/// Host object that counts "about to be modified" notifications.
#[derive(Debug)]
pub struct RecordingObject {
    name: String,
    modify_calls: Cell<u32>,
}

impl RecordingObject {
    /// Allocate a live object.
    pub fn spawn(name: impl Into<String>) -> ObjectPtr<Self> {
        ObjectPtr::new(Self {
            name: name.into(),
            modify_calls: Cell::new(0),
        })
    }

    pub fn modify_calls(&self) -> u32 {
        self.modify_calls.get()
    }
}

impl HostObject for RecordingObject {
    fn modify(&self) {
        self.modify_calls.set(self.modify_calls.get() + 1);
    }

    fn object_name(&self) -> String {
        self.name.clone()
    }
}

/// GC walker that keeps every reported reference.
#[derive(Debug, Default)]
pub struct RecordingCollector {
    reported: Vec<AnyObject>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn reported(&self) -> &[AnyObject] {
        &self.reported
    }

    /// Names of the reported objects that are still alive.
    pub fn names(&self) -> Vec<String> {
        self.reported
            .iter()
            .filter_map(|object| object.get().map(|o| o.object_name()))
            .collect()
    }
}

impl ReferenceCollector for RecordingCollector {
    fn add_referenced_object(&mut self, object: AnyObject) {
        self.reported.push(object);
    }
}

/// Records every value a notifier fires with.
#[derive(Debug)]
pub struct ChangeRecorder<T> {
    seen: Rc<RefCell<Vec<T>>>,
}

impl<T> Default for ChangeRecorder<T> {
    fn default() -> Self {
        Self {
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Clone + 'static> ChangeRecorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that appends to this recorder.
    pub fn notifier(&self) -> ChangeNotifier<T> {
        ChangeNotifier::with_args(
            |value: &T, seen: &Rc<RefCell<Vec<T>>>| seen.borrow_mut().push(value.clone()),
            Rc::clone(&self.seen),
        )
    }

    pub fn count(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.borrow().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.seen.borrow().last().cloned()
    }
}

/// Manager over a fresh [`MemoryLog`] with the given invariant mode.
pub fn memory_manager(assert_invariants: bool) -> (TransactionManager, Rc<RefCell<MemoryLog>>) {
    let log = MemoryLog::shared();
    let config = TransactionConfig::default().with_assert_invariants(assert_invariants);
    (TransactionManager::with_config(Rc::clone(&log), config), log)
}
