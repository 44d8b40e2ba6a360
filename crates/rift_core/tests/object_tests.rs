//! Object wrapper behavior against the mock engine.
//!
//! Assertions stay per-object (existence, reference count, fields), so
//! these tests are free to run in parallel.

use rift_core::classes::{Node, Node2D, RefCounted, Resource};
use rift_core::error::Error;
use rift_core::object::Obj;
use rift_core::variant::Variant;
use rift_sys::codes::ErrorCode;
use rift_sys::mock;

/// INVARIANT: a ref-counted object lives exactly as long as its claims.
#[test]
fn refcounted_lifetime_follows_the_handle() {
    mock::install_for_tests();

    let rc = Obj::<RefCounted>::create().unwrap();
    let raw = rc.raw().unwrap();
    assert_eq!(mock::object_ref_count(raw), Some(1));

    drop(rc);
    assert!(!mock::object_exists(raw));
}

#[test]
fn clone_balances_the_engine_count() {
    mock::install_for_tests();

    let rc = Obj::<RefCounted>::create().unwrap();
    let raw = rc.raw().unwrap();

    let twin = rc.clone();
    assert_eq!(mock::object_ref_count(raw), Some(2));
    assert_eq!(
        twin.instance_id().unwrap(),
        rc.instance_id().unwrap(),
        "clone must alias the same engine object"
    );

    drop(twin);
    assert_eq!(mock::object_ref_count(raw), Some(1));
    drop(rc);
    assert!(!mock::object_exists(raw));
}

#[test]
fn upcast_calls_reach_the_same_object() {
    mock::install_for_tests();

    let gizmo = Obj::<Node2D>::create().unwrap();
    let node: &Obj<Node> = gizmo.upcast_ref();

    node.set_name("gizmo").unwrap();
    // The write through the base view is visible through the derived
    // handle; both are the same token.
    assert_eq!(gizmo.name().unwrap(), "gizmo");
    assert_eq!(node.instance_id().unwrap(), gizmo.instance_id().unwrap());
    assert_eq!(node.to_bits(), gizmo.to_bits());

    gizmo.free().unwrap();
}

#[test]
fn consuming_upcast_keeps_the_claim() {
    mock::install_for_tests();

    let gizmo = Obj::<Node2D>::create().unwrap();
    let raw = gizmo.raw().unwrap();
    let bits = gizmo.to_bits();

    let node: Obj<Node> = gizmo.upcast();
    assert_eq!(node.to_bits(), bits);
    assert!(mock::object_exists(raw));

    node.free().unwrap();
    assert!(!mock::object_exists(raw));
}

#[test]
fn position_round_trip() {
    mock::install_for_tests();

    let gizmo = Obj::<Node2D>::create().unwrap();
    gizmo.set_position_x(4.5).unwrap();
    gizmo.set_position_y(-0.25).unwrap();
    assert_eq!(gizmo.position_x().unwrap(), 4.5);
    assert_eq!(gizmo.position_y().unwrap(), -0.25);

    gizmo.free().unwrap();
}

/// INVARIANT: null handles read as zero and write as no-ops.
#[test]
fn null_handle_semantics() {
    mock::install_for_tests();

    let null = Obj::<Node2D>::null();
    assert!(null.is_null());
    assert!(!null.is_live());

    // Reads yield zero values.
    assert_eq!(null.instance_id().unwrap(), 0);
    assert_eq!(null.name().unwrap(), "");
    assert_eq!(null.class_name().unwrap(), "");
    assert_eq!(null.position_x().unwrap(), 0.0);
    assert_eq!(null.child_count().unwrap(), 0);

    // Writes are no-ops.
    null.set_name("ignored").unwrap();
    null.set_position_x(9.0).unwrap();

    // Echo through null yields nil.
    let value = Variant::from_i64(3).unwrap();
    let out = null.echo(&value).unwrap();
    assert!(out.is_nil().unwrap());

    let clone = null.clone();
    assert!(clone.is_null());
    clone.free().unwrap();
}

#[test]
fn add_child_links_nodes_and_counts_them() {
    mock::install_for_tests();

    let parent = Obj::<Node>::create().unwrap();
    let child = Obj::<Node2D>::create().unwrap();
    assert_eq!(parent.child_count().unwrap(), 0);

    parent.add_child(&child).unwrap();
    assert_eq!(parent.child_count().unwrap(), 1);

    child.free().unwrap();
    parent.free().unwrap();
}

/// INVARIANT: engine refusals surface as typed errors with the code intact.
#[test]
fn engine_refusals_keep_their_code() {
    mock::install_for_tests();

    let parent = Obj::<Node>::create().unwrap();
    let rival = Obj::<Node>::create().unwrap();
    let child = Obj::<Node>::create().unwrap();

    parent.add_child(&child).unwrap();
    // A child already in a tree is refused with Busy.
    match rival.add_child(&child) {
        Err(Error::Engine(code)) => assert_eq!(code, ErrorCode::Busy),
        other => panic!("expected a Busy engine error, got {other:?}"),
    }
    // Self-parenting and null children are parameter errors.
    match parent.add_child(&parent) {
        Err(Error::Engine(code)) => assert_eq!(code, ErrorCode::InvalidParameter),
        other => panic!("expected an InvalidParameter error, got {other:?}"),
    }
    match parent.add_child(&Obj::<Node>::null()) {
        Err(Error::Engine(code)) => assert_eq!(code, ErrorCode::InvalidParameter),
        other => panic!("expected an InvalidParameter error, got {other:?}"),
    }

    child.free().unwrap();
    rival.free().unwrap();
    parent.free().unwrap();
}

/// INVARIANT: a freed object's tokens fail, they do not dangle.
#[test]
fn stale_tokens_error_instead_of_dangling() {
    mock::install_for_tests();

    let node = Obj::<Node>::create().unwrap();
    let bits = node.to_bits();
    node.free().unwrap();

    let ghost = Obj::<Node>::from_bits(bits);
    assert!(!ghost.is_live());
    assert!(!ghost.is_null());
    assert!(ghost.raw().is_err());
    assert!(ghost.name().is_err());
    assert!(ghost.set_name("ghost").is_err());
    std::mem::forget(ghost);
}

#[test]
fn refcounted_objects_refuse_manual_free() {
    mock::install_for_tests();

    let rc = Obj::<RefCounted>::create().unwrap();
    let raw = rc.raw().unwrap();
    assert!(matches!(rc.free(), Err(Error::CannotFree { .. })));
    // The handle is spent either way; its claim went back through the
    // count and the object died with it.
    assert!(!mock::object_exists(raw));
}

#[test]
fn resource_path_round_trip() {
    mock::install_for_tests();

    let res = Obj::<Resource>::create().unwrap();
    assert_eq!(res.path().unwrap(), "");
    res.set_path("res://level/one.tscn").unwrap();
    assert_eq!(res.path().unwrap(), "res://level/one.tscn");
}

#[test]
fn class_name_reports_the_dynamic_class() {
    mock::install_for_tests();

    let gizmo = Obj::<Node2D>::create().unwrap();
    assert_eq!(gizmo.class_name().unwrap(), "Node2D");
    // The base view still answers with the object's real class.
    let node: &Obj<Node> = gizmo.upcast_ref();
    assert_eq!(node.class_name().unwrap(), "Node2D");

    gizmo.free().unwrap();
}

#[test]
fn init_ref_reports_participation() {
    mock::install_for_tests();

    let rc = Obj::<RefCounted>::create().unwrap();
    assert!(rc.init_ref().unwrap());
    assert_eq!(rc.reference_count().unwrap(), 1);

    let twin = rc.clone();
    assert_eq!(rc.reference_count().unwrap(), 2);
    drop(twin);
    assert_eq!(rc.reference_count().unwrap(), 1);
}

#[test]
fn echo_round_trips_primitives() {
    mock::install_for_tests();

    let node = Obj::<Node>::create().unwrap();

    let int_in = Variant::from_i64(42).unwrap();
    let int_out = node.echo(&int_in).unwrap();
    assert_eq!(int_out.try_to_i64().unwrap(), 42);

    let text_in = Variant::from_str("ping").unwrap();
    let text_out = node.echo(&text_in).unwrap();
    assert_eq!(text_out.try_to_string().unwrap(), "ping");
    // The copy is independent of the original.
    drop(text_in);
    assert_eq!(text_out.try_to_string().unwrap(), "ping");

    node.free().unwrap();
}

/// INVARIANT: every hop of an object through variants moves the count by
/// exactly one claim.
#[test]
fn object_variants_carry_counted_claims() {
    mock::install_for_tests();

    let rc = Obj::<RefCounted>::create().unwrap();
    let raw = rc.raw().unwrap();
    assert_eq!(mock::object_ref_count(raw), Some(1));

    let boxed = Variant::from_object(&rc).unwrap();
    assert_eq!(mock::object_ref_count(raw), Some(2));

    let node = Obj::<Node>::create().unwrap();
    let echoed = node.echo(&boxed).unwrap();
    assert_eq!(mock::object_ref_count(raw), Some(3));

    let extracted = echoed.try_to_object::<RefCounted>().unwrap();
    assert_eq!(mock::object_ref_count(raw), Some(4));
    assert_eq!(extracted.instance_id().unwrap(), rc.instance_id().unwrap());

    drop(extracted);
    assert_eq!(mock::object_ref_count(raw), Some(3));
    drop(echoed);
    assert_eq!(mock::object_ref_count(raw), Some(2));
    drop(boxed);
    assert_eq!(mock::object_ref_count(raw), Some(1));
    drop(rc);
    assert!(!mock::object_exists(raw));

    node.free().unwrap();
}
