//! Property-based invariant tests for properties and the managed slot.
//!
//! 1. Writing a value equal to the stored one returns false and fires nothing.
//! 2. Writing a different value returns true, fires once, and reads back.
//! 3. Case-only renames of a `Name` property are not changes.
//! 4. Any interleaving of managed starts, writes and ends matches a
//!    single-slot model, and the log never holds more than one open session.

use proptest::prelude::*;
use sprop_core::{Name, Property, TransactionEndResult};
use sprop_harness::{ChangeRecorder, memory_manager};

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Set(usize, i32),
    End(usize, bool),
    Cancel(usize),
}

const PROPERTIES: usize = 3;

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PROPERTIES).prop_map(Op::Start),
        (0..PROPERTIES, -3i32..=3).prop_map(|(i, v)| Op::Set(i, v)),
        (0..PROPERTIES, any::<bool>()).prop_map(|(i, c)| Op::End(i, c)),
        (0..PROPERTIES).prop_map(Op::Cancel),
    ]
}

/// Reference model: who owns the slot and whether they wrote since opening.
#[derive(Debug, Default)]
struct SlotModel {
    owner: Option<usize>,
    modified: bool,
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Equality gate
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn equal_writes_are_suppressed(value in any::<i32>()) {
        let recorder: ChangeRecorder<i32> = ChangeRecorder::new();
        let mut p: Property<i32> = Property::with_notifier(value, recorder.notifier());
        prop_assert!(!p.set(value));
        prop_assert_eq!(recorder.count(), 0);
        prop_assert_eq!(*p.get(), value);
    }

    #[test]
    fn different_writes_fire_once(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(a != b);
        let recorder: ChangeRecorder<i32> = ChangeRecorder::new();
        let mut p: Property<i32> = Property::with_notifier(a, recorder.notifier());
        prop_assert!(p.set(b));
        prop_assert_eq!(recorder.values(), vec![b]);
        prop_assert_eq!(*p.get(), b);
    }

    #[test]
    fn string_writes_follow_operator_equality(a in "[a-z]{0,8}", b in "[a-z]{0,8}") {
        let recorder: ChangeRecorder<String> = ChangeRecorder::new();
        let mut p: Property<String> = Property::with_notifier(a.clone(), recorder.notifier());
        let changed = p.set(b.clone());
        prop_assert_eq!(changed, a != b);
        prop_assert_eq!(recorder.count(), usize::from(changed));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Name comparison ignores ASCII case
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn case_only_rename_is_not_a_change(name in "[A-Za-z_]{1,12}") {
        let recorder: ChangeRecorder<Name> = ChangeRecorder::new();
        let mut p: Property<Name> = Property::with_notifier(name.as_str(), recorder.notifier());
        prop_assert!(!p.set(name.to_ascii_uppercase()));
        prop_assert!(!p.set(name.to_ascii_lowercase()));
        prop_assert_eq!(recorder.count(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Single managed slot
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn managed_slot_matches_model(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let (mut manager, log) = memory_manager(false);
        let mut props: Vec<Property<i32>> = (0..PROPERTIES).map(|_| Property::new(0)).collect();
        let mut model = SlotModel::default();

        for op in ops {
            match op {
                Op::Start(i) => {
                    let started = props[i].start_managed_transaction(&mut manager, "op");
                    prop_assert_eq!(started, model.owner.is_none());
                    if started {
                        model.owner = Some(i);
                        model.modified = false;
                    }
                }
                Op::Set(i, v) => {
                    let changed = props[i].set(v);
                    if changed && model.owner == Some(i) {
                        model.modified = true;
                    }
                }
                Op::End(i, cancel_if_unmodified) => {
                    let result = props[i].end_managed_transaction(&mut manager, cancel_if_unmodified);
                    let expected = if model.owner != Some(i) {
                        TransactionEndResult::Invalid
                    } else if cancel_if_unmodified && !model.modified {
                        TransactionEndResult::Cancelled
                    } else {
                        TransactionEndResult::Ended
                    };
                    prop_assert_eq!(result, expected);
                    if model.owner == Some(i) {
                        model.owner = None;
                    }
                }
                Op::Cancel(i) => {
                    let result = props[i].cancel_managed_transaction(&mut manager);
                    if model.owner == Some(i) {
                        prop_assert_eq!(result, TransactionEndResult::Cancelled);
                        model.owner = None;
                    } else {
                        prop_assert_eq!(result, TransactionEndResult::Invalid);
                    }
                }
            }

            prop_assert_eq!(manager.has_managed(), model.owner.is_some());
            prop_assert!(log.borrow().open_count() <= 1);
            for (i, p) in props.iter().enumerate() {
                prop_assert_eq!(p.has_managed_transaction(&manager), model.owner == Some(i));
                let expect_modified = model.owner == Some(i) && model.modified;
                prop_assert_eq!(p.is_modified(), expect_modified);
            }
        }
    }
}
