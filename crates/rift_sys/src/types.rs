//! Raw C ABI types shared between the Rift Engine and the binding layer.
//!
//! Everything in this module mirrors `rift_abi.h` on the engine side.
//! These types carry no ownership semantics of their own; the higher-level
//! crates decide who destroys what.

use std::ffi::{c_char, c_void};

/// ABI version of the binding table layout.
///
/// The engine reports its own version in [`RawEngineTable::abi_version`];
/// a mismatch during bootstrap is a hard error, never a best-effort degrade.
pub const RIFT_ABI_VERSION: u32 = 2;

/// Maximum number of arguments the engine accepts in a single call.
pub const RIFT_MAX_CALL_ARGS: usize = 16;

// ============================================================================
// Opaque Engine Types
// ============================================================================

/// Opaque engine-side object. Only ever handled by pointer.
#[repr(C)]
pub struct RawObject {
    _opaque: [u8; 0],
}

/// Opaque engine-side variant box (string, array, dictionary, ...).
#[repr(C)]
pub struct RawVariant {
    _opaque: [u8; 0],
}

/// Opaque resolved method, produced by `method_bind_lookup`.
///
/// Binds stay valid for the lifetime of the engine library and may be
/// cached freely.
#[repr(C)]
pub struct RawMethodBind {
    _opaque: [u8; 0],
}

// ============================================================================
// Call ABI
// ============================================================================

/// Pointer to one argument's storage inside a call frame.
///
/// For value arguments (`bool`, `i64`, `f64`) this points at the value
/// itself; for pointer arguments (objects, variants) it points at the
/// stored pointer.
pub type RawArgPtr = *const c_void;

/// Invokes a resolved engine method.
///
/// `args` points at `arg_count` argument pointers; `ret` points at a
/// 16-byte slot the engine writes the return value into (untouched for
/// void methods).
pub type MethodCallFn = unsafe extern "C" fn(
    method: *mut RawMethodBind,
    receiver: *mut RawObject,
    args: *const RawArgPtr,
    arg_count: u32,
    ret: *mut c_void,
);

/// Entry point of a host-side virtual method.
///
/// Same shape as [`MethodCallFn`] minus the bind: the engine passes the
/// instance pointer it got from [`CreateInstanceFn`], the argument
/// pointer array and a return slot.
pub type VirtualCallFn =
    unsafe extern "C" fn(instance: *mut c_void, args: *const RawArgPtr, ret: *mut c_void);

// ============================================================================
// Class Registration
// ============================================================================

/// Constructs the host-side instance for a freshly created engine object.
///
/// Returns an opaque instance pointer the engine stores on the object and
/// hands back on every virtual call, or null if construction failed.
pub type CreateInstanceFn =
    unsafe extern "C" fn(userdata: *mut c_void, base: *mut RawObject) -> *mut c_void;

/// Destroys a host-side instance previously returned by [`CreateInstanceFn`].
pub type FreeInstanceFn = unsafe extern "C" fn(userdata: *mut c_void, instance: *mut c_void);

/// Resolves a virtual method by name, or null if the class does not
/// override it. Called lazily by the engine, once per (class, name).
pub type GetVirtualFn =
    unsafe extern "C" fn(userdata: *mut c_void, name: *const c_char) -> Option<VirtualCallFn>;

/// Produces a fresh variant holding the default value of a published
/// property, or null if the property is unknown or has no variant form.
/// The engine destroys the returned variant.
pub type PropertyDefaultFn =
    unsafe extern "C" fn(userdata: *mut c_void, name: *const c_char) -> *mut RawVariant;

/// One property published alongside a registered class.
#[repr(C)]
pub struct RawPropertyInfo {
    /// NUL-terminated property name.
    pub name: *const c_char,
    /// Variant tag of the value, or -1 for types with no variant form.
    pub tag: i32,
    /// NUL-terminated editor hint, or null.
    pub hint: *const c_char,
}

/// Class registration record passed to `classdb_register`.
///
/// The engine copies the strings and the property list during
/// registration; the callbacks and `userdata` must stay valid until the
/// class is unregistered.
#[repr(C)]
pub struct RawClassInfo {
    /// NUL-terminated class name.
    pub class_name: *const c_char,
    /// NUL-terminated name of the engine class this class extends.
    pub parent_name: *const c_char,
    /// Passed back verbatim on every callback.
    pub userdata: *mut c_void,
    pub create_instance: Option<CreateInstanceFn>,
    pub free_instance: Option<FreeInstanceFn>,
    pub get_virtual: Option<GetVirtualFn>,
    /// Published property list; null when `property_count` is zero.
    pub properties: *const RawPropertyInfo,
    pub property_count: u32,
    pub property_default: Option<PropertyDefaultFn>,
}

// ============================================================================
// Engine Binding Table
// ============================================================================

/// The raw function table exported by the engine.
///
/// Every entry is optional at the ABI level; [`crate::api::EngineApi`]
/// validates the table once at startup so the rest of the binding never
/// sees a missing entry.
#[repr(C)]
pub struct RawEngineTable {
    /// Must equal [`RIFT_ABI_VERSION`].
    pub abi_version: u32,

    // ----- objects -----
    pub object_construct: Option<unsafe extern "C" fn(class_name: *const c_char) -> *mut RawObject>,
    pub object_destroy: Option<unsafe extern "C" fn(object: *mut RawObject)>,
    pub singleton_lookup: Option<unsafe extern "C" fn(name: *const c_char) -> *mut RawObject>,

    // ----- methods -----
    pub method_bind_lookup: Option<
        unsafe extern "C" fn(
            class_name: *const c_char,
            method_name: *const c_char,
        ) -> *mut RawMethodBind,
    >,
    pub method_bind_call: Option<MethodCallFn>,

    // ----- reference counting -----
    pub ref_inc: Option<unsafe extern "C" fn(object: *mut RawObject) -> u32>,
    pub ref_dec: Option<unsafe extern "C" fn(object: *mut RawObject) -> u32>,
    pub ref_count: Option<unsafe extern "C" fn(object: *mut RawObject) -> u32>,

    // ----- variants -----
    pub variant_new_nil: Option<unsafe extern "C" fn() -> *mut RawVariant>,
    pub variant_new_bool: Option<unsafe extern "C" fn(value: bool) -> *mut RawVariant>,
    pub variant_new_int: Option<unsafe extern "C" fn(value: i64) -> *mut RawVariant>,
    pub variant_new_float: Option<unsafe extern "C" fn(value: f64) -> *mut RawVariant>,
    pub variant_new_string_utf8:
        Option<unsafe extern "C" fn(data: *const c_char, len: usize) -> *mut RawVariant>,
    pub variant_new_object: Option<unsafe extern "C" fn(object: *mut RawObject) -> *mut RawVariant>,
    pub variant_tag: Option<unsafe extern "C" fn(variant: *const RawVariant) -> i32>,
    pub variant_get_bool: Option<unsafe extern "C" fn(variant: *const RawVariant) -> bool>,
    pub variant_get_int: Option<unsafe extern "C" fn(variant: *const RawVariant) -> i64>,
    pub variant_get_float: Option<unsafe extern "C" fn(variant: *const RawVariant) -> f64>,
    pub variant_get_object: Option<unsafe extern "C" fn(variant: *const RawVariant) -> *mut RawObject>,
    pub variant_string_len: Option<unsafe extern "C" fn(variant: *const RawVariant) -> usize>,
    pub variant_string_copy: Option<
        unsafe extern "C" fn(variant: *const RawVariant, buf: *mut c_char, cap: usize) -> usize,
    >,
    pub variant_duplicate: Option<unsafe extern "C" fn(variant: *const RawVariant) -> *mut RawVariant>,
    pub variant_destroy: Option<unsafe extern "C" fn(variant: *mut RawVariant)>,

    // ----- class registration -----
    pub classdb_register: Option<unsafe extern "C" fn(info: *const RawClassInfo) -> i32>,
    pub classdb_unregister: Option<unsafe extern "C" fn(class_name: *const c_char) -> i32>,
}
