#![forbid(unsafe_code)]

//! Walkthrough of the property surface against the in-memory log.
//!
//! Log output honours `RUST_LOG` (default `info`); try
//! `RUST_LOG=sprop_core=debug` to see every transaction open and close.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use sprop_core::{
    ChangeNotifier, ConstProperty, HostObject, MemoryLog, ObjectPtr, Property, PropertyBase,
    TransactionConfig, TransactionManager,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A host object whose width can only be changed through its own methods.
struct Panel {
    width: RefCell<ConstProperty<u32, PanelKey>>,
    redraws: Cell<u32>,
}

struct PanelKey(());

impl Panel {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            width: RefCell::new(ConstProperty::new(80u32)),
            redraws: Cell::new(0),
        })
    }

    fn resize(&self, width: u32) -> bool {
        self.width.borrow_mut().set(PanelKey(()), width)
    }

    fn on_width(&self, width: &u32, reason: &&'static str) {
        self.redraws.set(self.redraws.get() + 1);
        info!(width, reason, redraws = self.redraws.get(), "panel redraw");
    }
}

impl HostObject for Panel {
    fn modify(&self) {
        info!("panel about to be modified");
    }

    fn object_name(&self) -> String {
        "Panel".into()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_tracing();

    let parsed = TransactionConfig::from_env_with_diagnostics();
    for err in &parsed.errors {
        warn!(error = %err, "ignoring configuration value");
    }
    let log = MemoryLog::shared();
    let mut manager = TransactionManager::with_config(Rc::clone(&log), parsed.config);

    // Plain values: equality-gated writes.
    let mut greeting: Property<String> = Property::new("Moo");
    {
        let scoped: Property<String> = Property::new("Foo");
        greeting.set_from(scoped.as_base());
    }
    info!(greeting = %greeting.get(), "assigned from another property");

    let base = PropertyBase::<String>::new("Hello");
    let mut length: Property<usize> = Property::new(0usize);
    length.set(base.len());
    info!(length = *length.get(), "length from a bare base");

    // Token-gated writes with a method-bound notifier.
    let panel = Panel::new();
    panel.width.borrow_mut().set_notifier(ChangeNotifier::bind(
        &panel,
        Panel::on_width,
        "resize",
    ));
    panel.resize(120);
    panel.resize(120);
    info!(redraws = panel.redraws.get(), "equal writes do not redraw");

    // In-place edits on a vector.
    let mut position: Property<(i32, i32, i32)> =
        Property::with_notifier((1, 2, 3), |p: &(i32, i32, i32)| info!(?p, "position changed"));
    position.value_mut().0 = 5;
    position.notify_changed();

    // Managed transaction on a property that references a host object.
    let actor = ObjectPtr::new(Panel {
        width: RefCell::new(ConstProperty::new(10u32)),
        redraws: Cell::new(0),
    });
    let mut target: Property<ObjectPtr<Panel>> = Property::new(actor.clone());
    if target.start_managed_transaction(&mut manager, "Retarget") {
        let other = ObjectPtr::new(Panel {
            width: RefCell::new(ConstProperty::new(20u32)),
            redraws: Cell::new(0),
        });
        target.set(other);
        let result = target.end_managed_transaction(&mut manager, true);
        info!(%result, "managed transaction closed");
    }

    // A second managed transaction must wait for the first.
    let mut color: Property<u32> = Property::new(0xff0000u32);
    let mut alpha: Property<u8> = Property::new(255u8);
    let started = color.start_managed_transaction(&mut manager, "Recolor");
    let blocked = !alpha.start_managed_transaction(&mut manager, "Fade");
    info!(started, blocked, "single managed slot");
    color.set(0x0000ffu32);
    let result = color.end_managed_transaction(&mut manager, true);
    info!(%result, modified_after = color.is_modified(), "recolor closed");

    // Unmanaged and scoped transactions.
    if alpha.start_unmanaged_transaction(&manager, "Fade").is_some() {
        alpha.set(128u8);
        info!(modified = alpha.is_modified(), "unmanaged transactions are not reported as modified");
        let result = alpha.end_unmanaged_transaction(&manager, true);
        info!(%result, "unmanaged transaction closed");
    }
    if let Some(handle) = alpha.start_unmanaged_scoped_transaction(&manager, "Scoped fade") {
        alpha.set(64u8);
        info!(
            outstanding = handle.is_outstanding(),
            modified = alpha.is_modified(),
            "scoped transactions track nothing locally"
        );
    }

    let snapshot = json!({
        "greeting": greeting,
        "length": length,
        "position": position,
        "color": color,
        "alpha": alpha,
    });
    println!("{snapshot:#}");

    let log = log.borrow();
    info!(
        committed = log.committed().len(),
        cancelled = log.cancelled().len(),
        open = log.open_count(),
        "transaction log"
    );
}
