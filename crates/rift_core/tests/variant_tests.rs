//! Variant ownership and conversion against the mock engine.
//!
//! Every test here either asserts on the mock's live-variant count or
//! churns boxes while another might, so they all serialize on one lock
//! and the counts stay exact.

use parking_lot::Mutex;
use rift_core::classes::{Node, RefCounted};
use rift_core::error::Error;
use rift_core::handles;
use rift_core::handles::ReturnOwnership;
use rift_core::object::Obj;
use rift_core::variant::Variant;
use rift_sys::api::EngineApi;
use rift_sys::codes::VariantTag;
use rift_sys::mock;

static COUNTS: Mutex<()> = Mutex::new(());

#[test]
fn primitives_round_trip() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let b = Variant::from_bool(true).unwrap();
    assert_eq!(b.tag().unwrap(), VariantTag::Bool);
    assert!(b.try_to_bool().unwrap());

    let i = Variant::from_i64(-9).unwrap();
    assert_eq!(i.tag().unwrap(), VariantTag::Int);
    assert_eq!(i.try_to_i64().unwrap(), -9);

    let f = Variant::from_f64(2.75).unwrap();
    assert_eq!(f.tag().unwrap(), VariantTag::Float);
    assert_eq!(f.try_to_f64().unwrap(), 2.75);

    let nil = Variant::nil().unwrap();
    assert_eq!(nil.tag().unwrap(), VariantTag::Nil);
    assert!(nil.is_nil().unwrap());
}

#[test]
fn extraction_mismatch_names_both_tags() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let i = Variant::from_i64(5).unwrap();
    match i.try_to_f64() {
        Err(Error::VariantType { expected, found }) => {
            assert_eq!(expected, VariantTag::Float);
            assert_eq!(found, VariantTag::Int);
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
    assert!(Variant::nil().unwrap().try_to_i64().is_err());
}

#[test]
fn strings_survive_the_engine_copy() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let s = Variant::from_str("snow\u{2744} and fire").unwrap();
    assert_eq!(s.tag().unwrap(), VariantTag::String);
    assert_eq!(s.try_to_string().unwrap(), "snow\u{2744} and fire");

    let empty = Variant::from_str("").unwrap();
    assert_eq!(empty.try_to_string().unwrap(), "");
}

#[test]
fn boxes_die_with_their_handles() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let baseline = mock::live_variant_count();
    let values: Vec<Variant> = (0..5).map(|n| Variant::from_i64(n).unwrap()).collect();
    assert_eq!(mock::live_variant_count(), baseline + 5);
    drop(values);
    assert_eq!(mock::live_variant_count(), baseline);
}

/// INVARIANT: an echo round trip leaves no variant boxes behind.
#[test]
fn echo_round_trip_returns_to_baseline() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let node = Obj::<Node>::create().unwrap();
    let baseline = mock::live_variant_count();

    let input = Variant::from_str("marco").unwrap();
    let output = node.echo(&input).unwrap();
    assert_eq!(output.try_to_string().unwrap(), "marco");
    assert_eq!(mock::live_variant_count(), baseline + 2);

    drop(output);
    drop(input);
    assert_eq!(mock::live_variant_count(), baseline);

    node.free().unwrap();
}

#[test]
fn null_object_boxes_as_nil() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let null = Obj::<Node>::null();
    let v = Variant::from_object(&null).unwrap();
    assert!(v.is_nil().unwrap());
}

#[test]
fn duplicate_is_independent() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let baseline = mock::live_variant_count();
    let original = Variant::from_str("one").unwrap();
    let copy = original.try_duplicate().unwrap();
    assert_eq!(mock::live_variant_count(), baseline + 2);

    drop(original);
    assert_eq!(copy.try_to_string().unwrap(), "one");
    drop(copy);
    assert_eq!(mock::live_variant_count(), baseline);
}

/// INVARIANT: duplication promotes frame scratch past the cycle.
#[test]
fn duplicate_outlives_the_cycle() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let api = EngineApi::get();
    // Safety: fresh mock box, adopted as cycle-bound scratch.
    let raw = unsafe { (api.variant_new_int)(64) };
    let scratch = unsafe { Variant::from_engine_raw(raw, ReturnOwnership::Transient) }.unwrap();
    let kept = scratch.try_duplicate().unwrap();

    handles::cycle();

    assert!(scratch.try_to_i64().is_err());
    assert_eq!(kept.try_to_i64().unwrap(), 64);
}

#[test]
fn borrowed_returns_copy_instead_of_adopting() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let api = EngineApi::get();
    let baseline = mock::live_variant_count();

    // Safety: the box stays ours; the binding sees it as borrowed.
    let engine_box = unsafe { (api.variant_new_int)(12) };
    let v = unsafe { Variant::from_engine_raw(engine_box, ReturnOwnership::Borrowed) }.unwrap();
    // The binding copied; the engine's box and ours both live.
    assert_eq!(mock::live_variant_count(), baseline + 2);
    assert_eq!(v.try_to_i64().unwrap(), 12);

    drop(v);
    assert_eq!(mock::live_variant_count(), baseline + 1);
    // Safety: still our box, untouched by the binding.
    unsafe { (api.variant_destroy)(engine_box) };
    assert_eq!(mock::live_variant_count(), baseline);
}

#[test]
fn into_engine_raw_hands_the_box_over() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let baseline = mock::live_variant_count();
    let v = Variant::from_i64(31).unwrap();
    let id = v.id();

    let raw = v.into_engine_raw().unwrap();
    // The box survives the handle; only the claim is gone.
    assert_eq!(mock::live_variant_count(), baseline + 1);
    assert!(!handles::is_live(id));

    let api = EngineApi::get();
    // Safety: ownership moved to us with into_engine_raw.
    unsafe { (api.variant_destroy)(raw) };
    assert_eq!(mock::live_variant_count(), baseline);
}

#[test]
fn object_round_trip_preserves_identity() {
    mock::install_for_tests();
    let _guard = COUNTS.lock();

    let rc = Obj::<RefCounted>::create().unwrap();
    let v = Variant::from_object(&rc).unwrap();
    assert_eq!(v.tag().unwrap(), VariantTag::Object);

    let back = v.try_to_object::<RefCounted>().unwrap();
    assert_eq!(back.instance_id().unwrap(), rc.instance_id().unwrap());

    // Extracting a mismatched type is a tag error.
    assert!(v.try_to_i64().is_err());
}
