//! Validated engine binding table.
//!
//! The raw table exported by the engine is full of `Option` entries; this
//! module checks it exactly once at startup and exposes an [`EngineApi`]
//! whose function pointers are guaranteed present. Everything above this
//! layer calls through [`EngineApi::get`] without further checks.

use std::ffi::{c_char, CString};
use std::sync::OnceLock;

use crate::error::{BootstrapError, Result};
use crate::types::{
    MethodCallFn, RawClassInfo, RawEngineTable, RawMethodBind, RawObject, RawVariant,
    RIFT_ABI_VERSION,
};

/// Engine function table with every entry validated as present.
///
/// Field names and grouping match [`RawEngineTable`] one to one.
#[derive(Clone, Copy)]
pub struct EngineApi {
    // ----- objects -----
    pub object_construct: unsafe extern "C" fn(class_name: *const c_char) -> *mut RawObject,
    pub object_destroy: unsafe extern "C" fn(object: *mut RawObject),
    pub singleton_lookup: unsafe extern "C" fn(name: *const c_char) -> *mut RawObject,

    // ----- methods -----
    pub method_bind_lookup: unsafe extern "C" fn(
        class_name: *const c_char,
        method_name: *const c_char,
    ) -> *mut RawMethodBind,
    pub method_bind_call: MethodCallFn,

    // ----- reference counting -----
    pub ref_inc: unsafe extern "C" fn(object: *mut RawObject) -> u32,
    pub ref_dec: unsafe extern "C" fn(object: *mut RawObject) -> u32,
    pub ref_count: unsafe extern "C" fn(object: *mut RawObject) -> u32,

    // ----- variants -----
    pub variant_new_nil: unsafe extern "C" fn() -> *mut RawVariant,
    pub variant_new_bool: unsafe extern "C" fn(value: bool) -> *mut RawVariant,
    pub variant_new_int: unsafe extern "C" fn(value: i64) -> *mut RawVariant,
    pub variant_new_float: unsafe extern "C" fn(value: f64) -> *mut RawVariant,
    pub variant_new_string_utf8:
        unsafe extern "C" fn(data: *const c_char, len: usize) -> *mut RawVariant,
    pub variant_new_object: unsafe extern "C" fn(object: *mut RawObject) -> *mut RawVariant,
    pub variant_tag: unsafe extern "C" fn(variant: *const RawVariant) -> i32,
    pub variant_get_bool: unsafe extern "C" fn(variant: *const RawVariant) -> bool,
    pub variant_get_int: unsafe extern "C" fn(variant: *const RawVariant) -> i64,
    pub variant_get_float: unsafe extern "C" fn(variant: *const RawVariant) -> f64,
    pub variant_get_object: unsafe extern "C" fn(variant: *const RawVariant) -> *mut RawObject,
    pub variant_string_len: unsafe extern "C" fn(variant: *const RawVariant) -> usize,
    pub variant_string_copy:
        unsafe extern "C" fn(variant: *const RawVariant, buf: *mut c_char, cap: usize) -> usize,
    pub variant_duplicate: unsafe extern "C" fn(variant: *const RawVariant) -> *mut RawVariant,
    pub variant_destroy: unsafe extern "C" fn(variant: *mut RawVariant),

    // ----- class registration -----
    pub classdb_register: unsafe extern "C" fn(info: *const RawClassInfo) -> i32,
    pub classdb_unregister: unsafe extern "C" fn(class_name: *const c_char) -> i32,
}

static ENGINE_API: OnceLock<EngineApi> = OnceLock::new();

macro_rules! require {
    ($table:expr, $field:ident) => {
        $table.$field.ok_or(BootstrapError::MissingTableEntry {
            entry: stringify!($field),
        })?
    };
}

impl EngineApi {
    /// Validates a raw engine table.
    ///
    /// Checks the ABI version first, then every entry; the error names the
    /// first missing entry so a truncated or misbuilt engine is diagnosable
    /// from the log alone.
    pub fn from_raw(table: &RawEngineTable) -> Result<Self> {
        if table.abi_version != RIFT_ABI_VERSION {
            return Err(BootstrapError::AbiMismatch {
                engine: table.abi_version,
                binding: RIFT_ABI_VERSION,
            });
        }

        Ok(Self {
            object_construct: require!(table, object_construct),
            object_destroy: require!(table, object_destroy),
            singleton_lookup: require!(table, singleton_lookup),
            method_bind_lookup: require!(table, method_bind_lookup),
            method_bind_call: require!(table, method_bind_call),
            ref_inc: require!(table, ref_inc),
            ref_dec: require!(table, ref_dec),
            ref_count: require!(table, ref_count),
            variant_new_nil: require!(table, variant_new_nil),
            variant_new_bool: require!(table, variant_new_bool),
            variant_new_int: require!(table, variant_new_int),
            variant_new_float: require!(table, variant_new_float),
            variant_new_string_utf8: require!(table, variant_new_string_utf8),
            variant_new_object: require!(table, variant_new_object),
            variant_tag: require!(table, variant_tag),
            variant_get_bool: require!(table, variant_get_bool),
            variant_get_int: require!(table, variant_get_int),
            variant_get_float: require!(table, variant_get_float),
            variant_get_object: require!(table, variant_get_object),
            variant_string_len: require!(table, variant_string_len),
            variant_string_copy: require!(table, variant_string_copy),
            variant_duplicate: require!(table, variant_duplicate),
            variant_destroy: require!(table, variant_destroy),
            classdb_register: require!(table, classdb_register),
            classdb_unregister: require!(table, classdb_unregister),
        })
    }

    /// Validates `table` and installs it as the process-wide engine API.
    ///
    /// May be called at most once per process.
    pub fn install(table: &RawEngineTable) -> Result<()> {
        let api = Self::from_raw(table)?;
        ENGINE_API
            .set(api)
            .map_err(|_| BootstrapError::AlreadyInstalled)?;
        log::info!("Engine binding table installed (ABI v{})", RIFT_ABI_VERSION);
        Ok(())
    }

    /// The installed engine API.
    ///
    /// Panics if no engine has been bound; calling into the engine before
    /// bootstrap is a programming error, not a recoverable condition.
    #[inline]
    pub fn get() -> &'static EngineApi {
        match ENGINE_API.get() {
            Some(api) => api,
            None => panic!(
                "engine binding table is not installed; \
                 load the engine library before making engine calls"
            ),
        }
    }

    #[inline]
    pub fn try_get() -> Option<&'static EngineApi> {
        ENGINE_API.get()
    }

    #[inline]
    pub fn is_installed() -> bool {
        ENGINE_API.get().is_some()
    }
}

// ============================================================================
// Method Binds
// ============================================================================

/// A resolved engine method, cheap to copy and safe to cache in statics.
#[derive(Debug, Clone, Copy)]
pub struct MethodBind {
    raw: *mut RawMethodBind,
}

// Safety: binds are immutable engine-side records, valid for the lifetime
// of the loaded engine library.
unsafe impl Send for MethodBind {}
unsafe impl Sync for MethodBind {}

impl MethodBind {
    #[inline]
    pub fn as_raw(self) -> *mut RawMethodBind {
        self.raw
    }
}

/// Resolves an engine method by class and name, or `None` if the engine
/// does not export it.
pub fn try_method_bind(class_name: &str, method_name: &str) -> Option<MethodBind> {
    let api = EngineApi::get();
    let class = to_cstring(class_name, "class name");
    let method = to_cstring(method_name, "method name");
    // Safety: both pointers are valid NUL-terminated strings.
    let raw = unsafe { (api.method_bind_lookup)(class.as_ptr(), method.as_ptr()) };
    if raw.is_null() {
        None
    } else {
        Some(MethodBind { raw })
    }
}

/// Resolves an engine method, aborting with a diagnostic if it is missing.
///
/// A missing method means the engine and the binding were built against
/// different API revisions; resolution failure is fatal.
pub fn method_bind(class_name: &str, method_name: &str) -> MethodBind {
    match try_method_bind(class_name, method_name) {
        Some(bind) => bind,
        None => panic!(
            "engine method '{class_name}::{method_name}' not found; \
             the engine and the binding disagree on the API revision"
        ),
    }
}

fn to_cstring(value: &str, what: &str) -> CString {
    match CString::new(value) {
        Ok(s) => s,
        Err(_) => panic!("{what} '{value}' contains an interior NUL byte"),
    }
}
