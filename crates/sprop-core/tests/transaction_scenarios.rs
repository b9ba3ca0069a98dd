#![forbid(unsafe_code)]

//! End-to-end transaction scenarios across several properties sharing one
//! manager and one in-memory log.

use pretty_assertions::assert_eq;
use sprop_core::undo::LogEvent;
use sprop_core::{
    ConstProperty, ObjectPtr, Property, PropertyBase, Text, TransactionEndResult,
    TransactionError, TransactionLog,
};
use sprop_harness::{
    ChangeRecorder, LogCapture, RecordingCollector, RecordingObject, init_tracing, memory_manager,
};

#[test]
fn documented_walkthrough() {
    init_tracing();
    let (mut manager, log) = memory_manager(false);
    let recorder: ChangeRecorder<i32> = ChangeRecorder::new();
    let mut first: Property<i32> = Property::with_notifier(10, recorder.notifier());
    let mut second: Property<i32> = Property::new(0);

    assert!(!first.set(10));
    assert_eq!(recorder.count(), 0);
    assert!(first.set(11));
    assert_eq!(recorder.values(), vec![11]);
    assert_eq!(*first.get(), 11);

    assert!(first.start_managed_transaction(&mut manager, "desc"));
    let id = first.transaction_id().expect("managed id");
    assert!(!second.start_managed_transaction(&mut manager, "desc2"));
    assert_eq!(manager.managed_transaction(), Some(id));

    assert_eq!(
        first.end_managed_transaction(&mut manager, false),
        TransactionEndResult::Ended
    );
    assert!(second.start_managed_transaction(&mut manager, "desc2"));
    assert_eq!(
        second.cancel_managed_transaction(&mut manager),
        TransactionEndResult::Cancelled
    );

    let log = log.borrow();
    assert_eq!(log.committed().len(), 1);
    assert_eq!(log.committed()[0].description.as_str(), "desc");
    assert_eq!(log.cancelled()[0].description.as_str(), "desc2");
}

#[test]
fn refused_second_managed_start_leaves_first_untouched() {
    let (mut manager, log) = memory_manager(false);
    let mut a: Property<u8> = Property::new(1u8);
    let mut b: Property<u8> = Property::new(1u8);

    assert!(a.start_managed_transaction(&mut manager, "a"));
    a.set(2u8);
    assert!(!b.start_managed_transaction(&mut manager, "b"));
    assert!(a.has_managed_transaction(&manager));
    assert!(a.is_modified());
    assert!(b.transaction_id().is_none());
    assert_eq!(log.borrow().open_count(), 1);
}

#[test]
fn end_managed_with_unmanaged_id_reports_category_mismatch() {
    let (mut manager, log) = memory_manager(false);
    let mut owner: Property<i32> = Property::new(0);

    assert!(owner.start_managed_transaction(&mut manager, "managed"));
    let unmanaged = manager
        .start_unmanaged(&Text::from("side"), None)
        .expect("unmanaged id");
    let before = manager.managed_transaction();

    assert_eq!(
        manager.end_managed(unmanaged),
        Err(TransactionError::NotManaged(unmanaged))
    );
    assert_eq!(manager.managed_transaction(), before);
    assert_eq!(log.borrow().open_count(), 2);
}

#[test]
fn property_level_category_mismatch_keeps_transaction() {
    let (mut manager, _log) = memory_manager(false);
    let mut p: Property<i32> = Property::new(0);
    let id = p.start_unmanaged_transaction(&manager, "u").expect("unmanaged id");

    assert_eq!(
        p.end_managed_transaction(&mut manager, false),
        TransactionEndResult::NotManaged
    );
    assert_eq!(p.transaction_id(), Some(id));
    assert!(p.has_unmanaged_transaction(&manager));
    assert_eq!(
        p.cancel_unmanaged_transaction(&manager),
        TransactionEndResult::Cancelled
    );
}

#[test]
fn scoped_transactions_skip_local_tracking() {
    let (mut manager, log) = memory_manager(false);

    let mut scoped: Property<i32> = Property::new(0);
    {
        let handle = scoped
            .start_unmanaged_scoped_transaction(&manager, "scoped")
            .expect("scoped handle");
        scoped.set(1);
        assert!(!scoped.is_modified());
        assert!(handle.is_outstanding());
    }

    let mut managed: Property<i32> = Property::new(0);
    assert!(managed.start_managed_transaction(&mut manager, "managed"));
    managed.set(1);
    assert!(managed.is_modified());
    managed.end_managed_transaction(&mut manager, true);

    assert_eq!(log.borrow().committed().len(), 2);
}

#[test]
fn scoped_handle_cancel_discards_session() {
    let (manager, log) = memory_manager(false);
    let p: Property<i32> = Property::new(0);
    let handle = p
        .start_unmanaged_scoped_transaction(&manager, "discard")
        .expect("scoped handle");
    let index = handle.index().expect("index");
    handle.cancel();
    assert_eq!(log.borrow().events().last(), Some(&LogEvent::Cancel(index)));
    assert!(log.borrow().committed().is_empty());
}

#[test]
fn dead_references_are_never_reported() {
    let alive = RecordingObject::spawn("alive");
    let doomed = RecordingObject::spawn("doomed");
    let a: Property<ObjectPtr<RecordingObject>> = Property::new(alive.clone());
    let b: Property<ObjectPtr<RecordingObject>> = Property::new(doomed.clone());
    let null: Property<ObjectPtr<RecordingObject>> = Property::new(ObjectPtr::<RecordingObject>::null());

    doomed.mark_destroyed();

    let mut collector = RecordingCollector::new();
    assert!(a.add_referenced_objects(&mut collector));
    assert!(!b.add_referenced_objects(&mut collector));
    assert!(!null.add_referenced_objects(&mut collector));
    assert_eq!(collector.names(), vec!["alive".to_string()]);
    assert!(b.with_target(|target| target.is_none()));
}

#[test]
fn owning_object_is_told_when_transaction_starts() {
    let (mut manager, log) = memory_manager(false);
    let actor = RecordingObject::spawn("Crate");
    let mut p: Property<ObjectPtr<RecordingObject>> = Property::new(actor.clone());

    assert!(p.start_managed_transaction(&mut manager, "Move crate"));
    assert_eq!(actor.get().map(RecordingObject::modify_calls), Some(1));
    assert_eq!(
        log.borrow().open_sessions()[0].primary.as_deref(),
        Some("Crate")
    );

    let replacement = RecordingObject::spawn("Barrel");
    assert!(p.set(replacement.clone()));
    assert!(!p.set(replacement.clone()));
    assert_eq!(
        p.end_managed_transaction(&mut manager, true),
        TransactionEndResult::Ended
    );
    // The replacement was never the owner at start time.
    assert_eq!(replacement.get().map(RecordingObject::modify_calls), Some(0));
}

#[test]
fn log_mismatch_degrades_to_unknown_error() {
    let (mut manager, log) = memory_manager(false);
    let mut p: Property<i32> = Property::new(0);
    assert!(p.start_managed_transaction(&mut manager, "m"));

    // Close the session behind the manager's back.
    let id = p.transaction_id().unwrap();
    assert!(log.borrow_mut().end(id.index()));

    let capture = LogCapture::new();
    let result = capture.run(|| p.end_managed_transaction(&mut manager, false));
    assert_eq!(result, TransactionEndResult::UnknownError);
    assert!(!manager.has_managed());
    assert!(capture.contains("ERROR"));
    assert!(capture.contains("out of step"));

    // The slot is free again.
    let mut q: Property<i32> = Property::new(0);
    assert!(q.start_managed_transaction(&mut manager, "next"));
}

#[test]
fn managed_and_unmanaged_sessions_close_out_of_order() {
    let (mut manager, log) = memory_manager(true);
    let mut a: Property<i32> = Property::new(0);
    let mut b: Property<i32> = Property::new(0);

    assert!(a.start_managed_transaction(&mut manager, "A managed"));
    assert!(b.start_unmanaged_transaction(&manager, "B unmanaged").is_some());
    assert!(a.set(1));
    assert!(b.set(1));

    assert_eq!(
        a.end_managed_transaction(&mut manager, false),
        TransactionEndResult::Ended
    );
    assert!(!manager.has_managed());
    assert_eq!(
        b.end_unmanaged_transaction(&manager, false),
        TransactionEndResult::Ended
    );

    let log = log.borrow();
    let committed: Vec<&str> = log
        .committed()
        .iter()
        .map(|r| r.description.as_str())
        .collect();
    assert_eq!(committed, vec!["A managed", "B unmanaged"]);
    assert!(log.open_sessions().is_empty());
}

#[test]
fn released_scoped_handle_closes_only_its_own_session() {
    let (mut manager, log) = memory_manager(true);
    let outer: Property<i32> = Property::new(0);
    let mut inner: Property<i32> = Property::new(0);

    let scoped = outer
        .start_unmanaged_scoped_transaction(&manager, "outer scoped")
        .expect("scoped session");
    assert!(inner.start_managed_transaction(&mut manager, "inner managed"));
    drop(scoped);

    assert!(inner.has_managed_transaction(&manager));
    assert!(inner.set(5));
    assert_eq!(
        inner.end_managed_transaction(&mut manager, true),
        TransactionEndResult::Ended
    );
    assert_eq!(log.borrow().committed().len(), 2);
    assert_eq!(log.borrow().open_count(), 0);
}

#[test]
fn refused_starts_are_logged_as_warnings() {
    let (mut manager, log) = memory_manager(false);
    let mut a: Property<i32> = Property::new(0);
    let mut b: Property<i32> = Property::new(0);
    assert!(a.start_managed_transaction(&mut manager, "first"));

    let capture = LogCapture::new();
    capture.run(|| {
        assert!(!b.start_managed_transaction(&mut manager, "second"));
        log.borrow_mut().set_applying(true);
        assert!(b.start_unmanaged_transaction(&manager, "third").is_none());
    });
    assert_eq!(capture.count("WARN"), 2);
    assert!(capture.contains("slot occupied"));
    assert!(capture.contains("cannot transact"));
}

#[test]
fn const_property_owner_writes_through_token() {
    struct Gate {
        open: ConstProperty<bool, GateKey>,
    }
    struct GateKey(());

    impl Gate {
        fn toggle(&mut self) -> bool {
            let next = !*self.open.get();
            self.open.set(GateKey(()), next)
        }
    }

    let recorder: ChangeRecorder<bool> = ChangeRecorder::new();
    let mut gate = Gate {
        open: ConstProperty::with_notifier(false, recorder.notifier()),
    };
    assert!(gate.toggle());
    assert!(gate.toggle());
    assert_eq!(recorder.values(), vec![true, false]);

    let source = PropertyBase::<bool>::new(true);
    assert!(gate.open.set_from(GateKey(()), &source));
    assert!(*gate.open.get());
}

#[test]
fn properties_serialize_as_their_value() {
    let p: Property<Vec<String>> = Property::new(vec!["a".to_string(), "b".to_string()]);
    let json = serde_json::to_string(&p).expect("serialize");
    assert_eq!(json, r#"["a","b"]"#);
    let back: Property<Vec<String>> = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(*back.get(), vec!["a".to_string(), "b".to_string()]);
}
