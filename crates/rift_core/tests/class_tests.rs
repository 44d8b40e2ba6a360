//! Class registration and virtual dispatch, driven the way the engine
//! drives them: construct through the mock, resolve virtuals through
//! `get_virtual`, call through the cached thunk.
//!
//! The class registry is process-wide, so every class here has a unique
//! name and tests that share one gate its registration behind a `Once`.

use std::ffi::c_void;
use std::sync::Once;

use linkme::distributed_slice;
use rift_core::class::{
    register_all, register_class, unregister_class, ClassBuilder, ClassRegistry, HostClass,
    CLASS_REGISTRARS,
};
use rift_core::classes::{Node, RefCounted};
use rift_core::error::{Error, Result};
use rift_core::handles::{OwnershipKind, ReturnOwnership};
use rift_core::object::{EngineClass, Obj};
use rift_core::properties::{PropertyInfo, PropertyValue};
use rift_core::variant::Variant;
use rift_sys::codes::VariantTag;
use rift_sys::mock;
use rift_sys::types::{RawArgPtr, RawVariant};

// ============================================================================
// Call helpers
// ============================================================================

fn call_void(class: &str, instance: *mut c_void, method: &str) -> bool {
    let mut ret = [0i64; 2];
    // Safety: instance came from instantiate_registered for this class.
    unsafe { mock::call_registered_virtual(class, instance, method, &[], ret.as_mut_ptr().cast()) }
}

fn call_ret_i64(class: &str, instance: *mut c_void, method: &str) -> Option<i64> {
    let mut ret = [0i64; 2];
    // Safety: as above; the slot is two zeroed words.
    let hit = unsafe {
        mock::call_registered_virtual(class, instance, method, &[], ret.as_mut_ptr().cast())
    };
    hit.then(|| ret[0])
}

fn call_i64_ret_i64(class: &str, instance: *mut c_void, method: &str, value: i64) -> Option<i64> {
    let mut ret = [0i64; 2];
    let arg: RawArgPtr = (&value as *const i64).cast();
    // Safety: as above; the argument points at a live i64.
    let hit = unsafe {
        mock::call_registered_virtual(class, instance, method, &[arg], ret.as_mut_ptr().cast())
    };
    hit.then(|| ret[0])
}

fn call_str(class: &str, instance: *mut c_void, method: &str, text: &str) -> bool {
    let variant = Variant::from_str(text).unwrap();
    let slot: *mut RawVariant = variant.raw().unwrap();
    let arg: RawArgPtr = (&slot as *const *mut RawVariant).cast();
    // Safety: as above; the argument slot holds the variant pointer and
    // `variant` outlives the call.
    unsafe { mock::call_registered_virtual(class, instance, method, &[arg], std::ptr::null_mut()) }
}

// ============================================================================
// Tally: virtuals, properties, base access
// ============================================================================

struct Tally {
    base: Obj<Node>,
    total: i64,
}

impl HostClass for Tally {
    type Base = Node;
    const CLASS_NAME: &'static str = "Tally";

    fn new(base: Obj<Node>) -> Self {
        Tally { base, total: 0 }
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        builder
            .property(PropertyInfo::new("total", PropertyValue::Int(3)))
            .property(
                PropertyInfo::new("label", PropertyValue::String("tally".into()))
                    .with_hint("display name"),
            )
            .virtual_method("on_tick", 1, |this, args, ret| {
                if let Some(step) = args.get_i64(0) {
                    this.total += step;
                }
                ret.set_i64(this.total * 2);
            })
            .virtual_method("read_total", 0, |this, _args, ret| {
                ret.set_i64(this.total);
            })
            .virtual_method("adopt_name", 1, |this, args, _ret| {
                if let Some(name) = args.get_string(0) {
                    let _ = this.base.set_name(&name);
                }
            });
    }
}

fn ensure_tally() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| register_class::<Tally>().unwrap());
}

/// INVARIANT: a value crosses the boundary, mutates host state, and the
/// result crosses back intact.
#[test]
fn virtual_round_trip_mutates_host_state() {
    mock::install_for_tests();
    ensure_tally();

    let (object, instance) = mock::instantiate_registered("Tally").unwrap();
    assert_eq!(call_i64_ret_i64("Tally", instance, "on_tick", 21), Some(42));
    assert_eq!(call_i64_ret_i64("Tally", instance, "on_tick", 4), Some(50));
    assert_eq!(call_ret_i64("Tally", instance, "read_total"), Some(25));

    // A method the class never declared misses.
    assert!(!call_void("Tally", instance, "absent"));

    mock::free_registered(object);
    assert!(!mock::object_exists(object));
}

#[test]
fn virtuals_reach_the_engine_object_through_the_base() {
    mock::install_for_tests();
    ensure_tally();

    let (object, instance) = mock::instantiate_registered("Tally").unwrap();
    assert!(call_str("Tally", instance, "adopt_name", "adopted"));

    // Safety: the mock constructed `object` as a Tally, a Node subclass.
    let node = unsafe { Obj::<Node>::from_engine_raw(object, ReturnOwnership::Borrowed) };
    assert_eq!(node.name().unwrap(), "adopted");
    drop(node);

    mock::free_registered(object);
}

#[test]
fn registration_publishes_classes_and_properties() {
    mock::install_for_tests();
    ensure_tally();

    let record = ClassRegistry::global().get("Tally").unwrap();
    assert_eq!(record.name(), "Tally");
    assert_eq!(record.parent(), "Node");
    assert_eq!(
        record.virtual_names(),
        vec!["on_tick", "read_total", "adopt_name"]
    );

    // The engine saw the same shape.
    assert!(mock::registered_class_names().contains(&"Tally".to_string()));
    assert_eq!(mock::registered_parent("Tally").as_deref(), Some("Node"));
    assert_eq!(
        mock::registered_property_tags("Tally"),
        vec![
            ("total".to_string(), VariantTag::Int.to_raw()),
            ("label".to_string(), VariantTag::String.to_raw()),
        ]
    );
}

#[test]
fn property_defaults_answer_engine_queries() {
    mock::install_for_tests();
    ensure_tally();

    let raw = mock::property_default("Tally", "total").unwrap();
    // Safety: the callback hands the box to the caller.
    let total = unsafe { Variant::from_engine_raw(raw, ReturnOwnership::Owned) }.unwrap();
    assert_eq!(total.try_to_i64().unwrap(), 3);

    let raw = mock::property_default("Tally", "label").unwrap();
    // Safety: as above.
    let label = unsafe { Variant::from_engine_raw(raw, ReturnOwnership::Owned) }.unwrap();
    assert_eq!(label.try_to_string().unwrap(), "tally");

    assert!(mock::property_default("Tally", "missing").is_none());
}

#[test]
fn duplicate_registration_is_refused() {
    mock::install_for_tests();
    ensure_tally();

    match register_class::<Tally>() {
        Err(Error::AlreadyRegistered { class }) => assert_eq!(class, "Tally"),
        other => panic!("expected AlreadyRegistered, got {other:?}"),
    }
}

// ============================================================================
// Signal chain: flattening, shadowing, fallthrough
// ============================================================================

struct SignalBase {
    base: Obj<Node>,
    emitted: i64,
}

impl EngineClass for SignalBase {
    const CLASS_NAME: &'static str = "SignalBase";
    const OWNERSHIP: OwnershipKind = OwnershipKind::SceneOwned;
    type Base = Node;
}

impl HostClass for SignalBase {
    type Base = Node;
    const CLASS_NAME: &'static str = "SignalBase";

    fn new(base: Obj<Node>) -> Self {
        SignalBase { base, emitted: 0 }
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        builder
            .virtual_method("emit", 0, |this, _args, ret| {
                this.emitted += 1;
                ret.set_i64(1);
            })
            .virtual_method("base_only", 0, |this, _args, ret| {
                ret.set_i64(10 + this.emitted);
            });
    }
}

struct SignalDerived {
    base: Obj<SignalBase>,
}

impl HostClass for SignalDerived {
    type Base = SignalBase;
    const CLASS_NAME: &'static str = "SignalDerived";

    fn new(base: Obj<SignalBase>) -> Self {
        SignalDerived { base }
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        builder
            .virtual_method("emit", 0, |_this, _args, ret| {
                ret.set_i64(2);
            })
            .virtual_method("derived_only", 0, |this, _args, ret| {
                ret.set_i64(20 + i64::from(this.base.is_null()));
            });
    }
}

fn ensure_signals() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        register_class::<SignalBase>().unwrap();
        register_class::<SignalDerived>().unwrap();
    });
}

/// INVARIANT: a derived override shadows in place; unshadowed names fall
/// through to the ancestor's closure over the ancestor's state.
#[test]
fn derived_shadows_base_in_place() {
    mock::install_for_tests();
    ensure_signals();

    let derived = ClassRegistry::global().get("SignalDerived").unwrap();
    // Slot order is the base's order, with the new name appended.
    assert_eq!(
        derived.virtual_names(),
        vec!["emit", "base_only", "derived_only"]
    );

    let (object, instance) = mock::instantiate_registered("SignalDerived").unwrap();
    assert_eq!(call_ret_i64("SignalDerived", instance, "emit"), Some(2));
    assert_eq!(call_ret_i64("SignalDerived", instance, "base_only"), Some(10));
    assert_eq!(
        call_ret_i64("SignalDerived", instance, "derived_only"),
        Some(20)
    );
    mock::free_registered(object);

    // The base class is untouched by the derived shadow.
    let (object, instance) = mock::instantiate_registered("SignalBase").unwrap();
    assert_eq!(call_ret_i64("SignalBase", instance, "emit"), Some(1));
    assert_eq!(call_ret_i64("SignalBase", instance, "base_only"), Some(11));
    assert!(!call_void("SignalBase", instance, "derived_only"));
    mock::free_registered(object);
}

#[test]
fn ancestor_state_lives_in_derived_instances() {
    mock::install_for_tests();
    ensure_signals();

    let (object, instance) = mock::instantiate_registered("SignalDerived").unwrap();
    // base_only closes over SignalBase state; emit is shadowed and no
    // longer feeds it, so the count stays where construction left it.
    assert_eq!(call_ret_i64("SignalDerived", instance, "emit"), Some(2));
    assert_eq!(call_ret_i64("SignalDerived", instance, "base_only"), Some(10));
    mock::free_registered(object);
}

// ============================================================================
// Registration failure modes
// ============================================================================

struct FakeObject;

impl HostClass for FakeObject {
    type Base = Node;
    const CLASS_NAME: &'static str = "Object";

    fn new(_base: Obj<Node>) -> Self {
        FakeObject
    }

    fn describe(_builder: &mut ClassBuilder<Self>) {}
}

struct MissingBase;

impl EngineClass for MissingBase {
    const CLASS_NAME: &'static str = "MissingBase";
    const OWNERSHIP: OwnershipKind = OwnershipKind::SceneOwned;
    type Base = Node;
}

struct Orphan;

impl HostClass for Orphan {
    type Base = MissingBase;
    const CLASS_NAME: &'static str = "Orphan";

    fn new(_base: Obj<MissingBase>) -> Self {
        Orphan
    }

    fn describe(_builder: &mut ClassBuilder<Self>) {}
}

struct Ouroboros;

impl EngineClass for Ouroboros {
    const CLASS_NAME: &'static str = "Ouroboros";
    const OWNERSHIP: OwnershipKind = OwnershipKind::SceneOwned;
    type Base = Ouroboros;
}

impl HostClass for Ouroboros {
    type Base = Ouroboros;
    const CLASS_NAME: &'static str = "Ouroboros";

    fn new(_base: Obj<Ouroboros>) -> Self {
        Ouroboros
    }

    fn describe(_builder: &mut ClassBuilder<Self>) {}
}

struct Overfull;

impl HostClass for Overfull {
    type Base = Node;
    const CLASS_NAME: &'static str = "Overfull";

    fn new(_base: Obj<Node>) -> Self {
        Overfull
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        const NAMES: [&str; 33] = [
            "v00", "v01", "v02", "v03", "v04", "v05", "v06", "v07", "v08", "v09", "v10", "v11",
            "v12", "v13", "v14", "v15", "v16", "v17", "v18", "v19", "v20", "v21", "v22", "v23",
            "v24", "v25", "v26", "v27", "v28", "v29", "v30", "v31", "v32",
        ];
        for name in NAMES {
            builder.virtual_method(name, 0, |_this, _args, _ret| {});
        }
    }
}

#[test]
fn engine_class_names_cannot_be_taken() {
    mock::install_for_tests();
    assert!(matches!(
        register_class::<FakeObject>(),
        Err(Error::AlreadyRegistered { class: "Object" })
    ));
}

#[test]
fn unknown_parents_are_refused() {
    mock::install_for_tests();
    match register_class::<Orphan>() {
        Err(Error::UnresolvedParent { class, parent }) => {
            assert_eq!(class, "Orphan");
            assert_eq!(parent, "MissingBase");
        }
        other => panic!("expected UnresolvedParent, got {other:?}"),
    }
    assert!(!ClassRegistry::global().is_registered("Orphan"));
    assert!(!mock::registered_class_names().contains(&"Orphan".to_string()));
}

#[test]
fn self_parenting_is_a_cycle() {
    mock::install_for_tests();
    assert!(matches!(
        register_class::<Ouroboros>(),
        Err(Error::ParentCycle { .. })
    ));
}

#[test]
fn overlong_virtual_tables_are_refused() {
    mock::install_for_tests();
    match register_class::<Overfull>() {
        Err(Error::VirtualTableFull {
            class,
            declared,
            max,
        }) => {
            assert_eq!(class, "Overfull");
            assert_eq!(declared, 33);
            assert_eq!(max, 32);
        }
        other => panic!("expected VirtualTableFull, got {other:?}"),
    }
    assert!(!ClassRegistry::global().is_registered("Overfull"));
}

// ============================================================================
// Panic containment
// ============================================================================

struct Grenade {
    base: Obj<Node>,
}

impl HostClass for Grenade {
    type Base = Node;
    const CLASS_NAME: &'static str = "Grenade";

    fn new(base: Obj<Node>) -> Self {
        Grenade { base }
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        builder
            .virtual_method("explode", 0, |_this, _args, _ret| {
                panic!("boom");
            })
            .virtual_method("still_here", 0, |this, _args, ret| {
                ret.set_bool(!this.base.is_null());
            });
    }
}

/// INVARIANT: a panicking override never unwinds into the engine; the
/// return slot comes back zeroed.
#[test]
fn panics_are_contained_and_zero_the_return() {
    mock::install_for_tests();
    static ONCE: Once = Once::new();
    ONCE.call_once(|| register_class::<Grenade>().unwrap());

    let (object, instance) = mock::instantiate_registered("Grenade").unwrap();

    let mut ret = [i64::MAX, i64::MAX];
    // Safety: instance came from instantiate_registered for this class.
    let hit = unsafe {
        mock::call_registered_virtual("Grenade", instance, "explode", &[], ret.as_mut_ptr().cast())
    };
    assert!(hit, "the panicking method still dispatches");
    assert_eq!(ret, [0, 0], "the return slot is zeroed after a panic");

    // The instance survives and later calls work.
    let mut ret = [0i64; 2];
    let hit = unsafe {
        mock::call_registered_virtual(
            "Grenade",
            instance,
            "still_here",
            &[],
            ret.as_mut_ptr().cast(),
        )
    };
    assert!(hit);
    assert_eq!(ret[0] & 0xFF, 1);

    mock::free_registered(object);
}

// ============================================================================
// Ref-counted hosts and startup registration
// ============================================================================

struct Cache {
    base: Obj<RefCounted>,
}

impl HostClass for Cache {
    type Base = RefCounted;
    const CLASS_NAME: &'static str = "Cache";

    fn new(base: Obj<RefCounted>) -> Self {
        Cache { base }
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        builder.virtual_method("probe", 0, |this, _args, ret| {
            ret.set_i64(this.base.reference_count().unwrap_or(0));
        });
    }
}

/// INVARIANT: instance state holds its object as a view, so the state
/// never keeps the object alive.
#[test]
fn refcounted_hosts_die_by_count_despite_held_state() {
    mock::install_for_tests();
    static ONCE: Once = Once::new();
    ONCE.call_once(|| register_class::<Cache>().unwrap());

    let (object, instance) = mock::instantiate_registered("Cache").unwrap();
    // Only the creator's claim counts; the state's base view adds none.
    assert_eq!(mock::object_ref_count(object), Some(1));
    assert_eq!(call_ret_i64("Cache", instance, "probe"), Some(1));

    // Dropping the single count frees object and host state both.
    let api = rift_sys::api::EngineApi::get();
    // Safety: `object` is live and this is its final reference.
    unsafe { (api.ref_dec)(object) };
    assert!(!mock::object_exists(object));
}

struct Beacon {
    base: Obj<Node>,
}

impl HostClass for Beacon {
    type Base = Node;
    const CLASS_NAME: &'static str = "Beacon";

    fn new(base: Obj<Node>) -> Self {
        Beacon { base }
    }

    fn describe(builder: &mut ClassBuilder<Self>) {
        builder.virtual_method("ping", 0, |this, _args, ret| {
            ret.set_bool(!this.base.is_null());
        });
    }
}

#[distributed_slice(CLASS_REGISTRARS)]
static REGISTER_BEACON: fn() -> Result<()> = register_beacon;

fn register_beacon() -> Result<()> {
    register_class::<Beacon>()
}

#[test]
fn startup_registrars_run_once_through_register_all() {
    mock::install_for_tests();
    register_all().unwrap();

    assert!(ClassRegistry::global().is_registered("Beacon"));
    assert!(mock::registered_class_names().contains(&"Beacon".to_string()));

    let (object, _instance) = mock::instantiate_registered("Beacon").unwrap();
    mock::free_registered(object);

    // Withdrawing the class stops the engine from constructing it.
    unregister_class("Beacon").unwrap();
    assert!(mock::instantiate_registered("Beacon").is_none());
}
