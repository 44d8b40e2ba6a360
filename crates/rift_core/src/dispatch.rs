//! Virtual call dispatch for registered classes.
//!
//! The engine resolves a virtual method once per (class, name) through
//! `get_virtual` and caches the thunk it gets back. Thunks here carry
//! no class identity of their own: there is one static trampoline per
//! vtable slot, and the instance passed at call time supplies the
//! class. Flattened vtables (see [`crate::class`]) keep slot indices
//! stable down an inheritance chain, so a thunk cached against an
//! ancestor stays correct for a descendant.
//!
//! Panics in host code are contained at the ABI boundary: the return
//! slot is zeroed and the panic is logged, never unwound into the
//! engine.

use std::any::TypeId;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};

use rift_sys::api::EngineApi;
use rift_sys::codes::VariantTag;
use rift_sys::types::{RawArgPtr, RawObject, RawVariant, VirtualCallFn};

use crate::class::{HostClass, RegisteredClass};
use crate::error::Result;
use crate::handles::{self, HandleId, OwnershipKind};
use crate::variant::Variant;

/// Size of the dispatch trampoline table; a class chain may flatten to
/// at most this many virtual methods.
pub const MAX_VIRTUAL_SLOTS: usize = 32;

/// Return slots are 16 bytes, like call frame slots.
const RET_SLOT_BYTES: usize = 16;

// ============================================================================
// Instance Storage
// ============================================================================

/// Host-side state attached to one engine object of a registered class.
///
/// The engine owns the allocation's lifetime: it is created by
/// [`host_create_instance`] and destroyed by [`host_free_instance`].
/// State for every host class in the inheritance chain lives here,
/// ancestors first.
pub struct InstanceStorage {
    class: &'static RegisteredClass,
    base: HandleId,
    states: Vec<(TypeId, Box<dyn std::any::Any + Send>)>,
}

impl InstanceStorage {
    pub(crate) fn build(class: &'static RegisteredClass, object: *mut RawObject) -> Self {
        // The base claim is a view. Holding a counted claim here would
        // tie the object's lifetime to its own instance state.
        let base = handles::acquire(OwnershipKind::SceneOwned, object.cast());
        let states = class.build_states(object);
        InstanceStorage {
            class,
            base,
            states,
        }
    }

    #[inline]
    pub fn class(&self) -> &'static RegisteredClass {
        self.class
    }

    /// Token for the engine object this state belongs to.
    #[inline]
    pub fn base_id(&self) -> HandleId {
        self.base
    }

    /// The state slice belonging to host class `H` in this instance's
    /// chain, or `None` if `H` is not part of it.
    pub fn state<H: HostClass>(&self) -> Option<&H> {
        let ty = TypeId::of::<H>();
        self.states
            .iter()
            .find(|(t, _)| *t == ty)
            .and_then(|(_, s)| s.downcast_ref::<H>())
    }

    pub fn state_mut<H: HostClass>(&mut self) -> Option<&mut H> {
        let ty = TypeId::of::<H>();
        self.states
            .iter_mut()
            .find(|(t, _)| *t == ty)
            .and_then(|(_, s)| s.downcast_mut::<H>())
    }
}

impl Drop for InstanceStorage {
    fn drop(&mut self) {
        let _ = handles::release(self.base);
    }
}

// ============================================================================
// Virtual Call Arguments and Return
// ============================================================================

/// Read access to the arguments of one virtual call.
///
/// Reads are bounds-checked against the arity declared at registration;
/// the pointers themselves are trusted, per the construction contract.
pub struct VirtualArgs {
    args: *const RawArgPtr,
    arity: usize,
}

impl VirtualArgs {
    /// # Safety
    ///
    /// `args` must be null (only when `arity` is zero) or point at at
    /// least `arity` argument pointers, each valid for the call's
    /// duration and shaped per the call ABI.
    pub(crate) unsafe fn new(args: *const RawArgPtr, arity: usize) -> Self {
        VirtualArgs { args, arity }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arity == 0
    }

    fn slot(&self, index: usize) -> Option<*const c_void> {
        if index >= self.arity || self.args.is_null() {
            return None;
        }
        // Safety: index is within the arity the constructor vouched for.
        let p = unsafe { *self.args.add(index) };
        if p.is_null() {
            None
        } else {
            Some(p)
        }
    }

    pub fn get_bool(&self, index: usize) -> Option<bool> {
        // Safety: slot pointers are valid per the construction contract.
        self.slot(index).map(|p| unsafe { *(p as *const u8) != 0 })
    }

    pub fn get_i64(&self, index: usize) -> Option<i64> {
        // Safety: as above.
        self.slot(index).map(|p| unsafe { *(p as *const i64) })
    }

    pub fn get_f64(&self, index: usize) -> Option<f64> {
        // Safety: as above.
        self.slot(index).map(|p| unsafe { *(p as *const f64) })
    }

    /// Copies out a string argument passed as a variant.
    pub fn get_string(&self, index: usize) -> Option<String> {
        let p = self.slot(index)?;
        // Safety: pointer arguments store the variant pointer in the slot.
        let raw = unsafe { *(p as *const *mut RawVariant) };
        if raw.is_null() {
            return None;
        }
        let api = EngineApi::get();
        // Safety: the caller keeps argument variants alive for the call.
        unsafe {
            if (api.variant_tag)(raw) != VariantTag::String.to_raw() {
                return None;
            }
            let len = (api.variant_string_len)(raw);
            let mut buf = vec![0u8; len];
            let copied = (api.variant_string_copy)(raw, buf.as_mut_ptr() as *mut c_char, len);
            buf.truncate(copied);
            Some(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

/// Write access to the return slot of one virtual call.
pub struct VirtualReturn {
    ret: *mut c_void,
}

impl VirtualReturn {
    /// # Safety
    ///
    /// `ret` must be null or point at a zeroed slot of at least
    /// [`RET_SLOT_BYTES`] writable bytes.
    pub(crate) unsafe fn new(ret: *mut c_void) -> Self {
        VirtualReturn { ret }
    }

    pub fn set_bool(&mut self, value: bool) {
        if !self.ret.is_null() {
            // Safety: the slot is writable per the construction contract.
            unsafe { *(self.ret as *mut u8) = value as u8 };
        }
    }

    pub fn set_i64(&mut self, value: i64) {
        if !self.ret.is_null() {
            // Safety: as above.
            unsafe { *(self.ret as *mut i64) = value };
        }
    }

    pub fn set_f64(&mut self, value: f64) {
        if !self.ret.is_null() {
            // Safety: as above.
            unsafe { *(self.ret as *mut f64) = value };
        }
    }

    /// Hands a variant box to the engine as the return value.
    pub fn set_variant(&mut self, value: Variant) -> Result<()> {
        let raw = value.into_engine_raw()?;
        if self.ret.is_null() {
            // No slot to land in; the box would leak.
            let api = EngineApi::get();
            // Safety: we own the box we just took out of the registry.
            unsafe { (api.variant_destroy)(raw) };
            return Ok(());
        }
        // Safety: the slot is writable per the construction contract.
        unsafe { *(self.ret as *mut *mut RawVariant) = raw };
        Ok(())
    }

    fn zero(&mut self) {
        if !self.ret.is_null() {
            // Safety: as above.
            unsafe { std::ptr::write_bytes(self.ret as *mut u8, 0, RET_SLOT_BYTES) };
        }
    }
}

// ============================================================================
// Trampolines
// ============================================================================

unsafe extern "C" fn virtual_trampoline<const SLOT: usize>(
    instance: *mut c_void,
    args: *const RawArgPtr,
    ret: *mut c_void,
) {
    dispatch_virtual(SLOT, instance, args, ret);
}

/// One trampoline per vtable slot. `get_virtual` answers with the entry
/// at the method's slot; the class is recovered from the instance at
/// call time.
pub(crate) static TRAMPOLINES: [VirtualCallFn; MAX_VIRTUAL_SLOTS] = [
    virtual_trampoline::<0>,
    virtual_trampoline::<1>,
    virtual_trampoline::<2>,
    virtual_trampoline::<3>,
    virtual_trampoline::<4>,
    virtual_trampoline::<5>,
    virtual_trampoline::<6>,
    virtual_trampoline::<7>,
    virtual_trampoline::<8>,
    virtual_trampoline::<9>,
    virtual_trampoline::<10>,
    virtual_trampoline::<11>,
    virtual_trampoline::<12>,
    virtual_trampoline::<13>,
    virtual_trampoline::<14>,
    virtual_trampoline::<15>,
    virtual_trampoline::<16>,
    virtual_trampoline::<17>,
    virtual_trampoline::<18>,
    virtual_trampoline::<19>,
    virtual_trampoline::<20>,
    virtual_trampoline::<21>,
    virtual_trampoline::<22>,
    virtual_trampoline::<23>,
    virtual_trampoline::<24>,
    virtual_trampoline::<25>,
    virtual_trampoline::<26>,
    virtual_trampoline::<27>,
    virtual_trampoline::<28>,
    virtual_trampoline::<29>,
    virtual_trampoline::<30>,
    virtual_trampoline::<31>,
];

fn dispatch_virtual(slot: usize, instance: *mut c_void, args: *const RawArgPtr, ret: *mut c_void) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if instance.is_null() {
            log::error!("Virtual dispatch with a null instance (slot {slot})");
            return;
        }
        // Safety: `instance` is the storage this module handed the
        // engine from host_create_instance.
        let storage = unsafe { &mut *(instance as *mut InstanceStorage) };
        let class = storage.class();
        let Some(entry) = class.vtable_entry(slot) else {
            log::error!(
                "Virtual dispatch to unknown slot {slot} on class '{}'",
                class.name()
            );
            return;
        };
        // Safety: the engine passes arguments per the declared arity.
        let vargs = unsafe { VirtualArgs::new(args, entry.arity) };
        // Safety: the engine provides a zeroed, writable return slot.
        let mut vret = unsafe { VirtualReturn::new(ret) };
        (entry.thunk)(storage, &vargs, &mut vret);
    }));

    if outcome.is_err() {
        // Safety: same return slot contract as above.
        let mut vret = unsafe { VirtualReturn::new(ret) };
        vret.zero();
        log::error!("Panic in virtual method (slot {slot}); return slot zeroed");
    }
}

// ============================================================================
// Registration Callbacks
// ============================================================================

/// `create_instance` entry registered for every host class.
pub(crate) unsafe extern "C" fn host_create_instance(
    userdata: *mut c_void,
    base: *mut RawObject,
) -> *mut c_void {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if userdata.is_null() || base.is_null() {
            return std::ptr::null_mut();
        }
        // Safety: userdata is the leaked class record this module
        // registered.
        let class = unsafe { &*(userdata as *const RegisteredClass) };
        let storage = InstanceStorage::build(class, base);
        Box::into_raw(Box::new(storage)) as *mut c_void
    }));
    match outcome {
        Ok(instance) => instance,
        Err(_) => {
            log::error!("Panic while constructing instance state");
            std::ptr::null_mut()
        }
    }
}

/// `free_instance` entry registered for every host class.
pub(crate) unsafe extern "C" fn host_free_instance(_userdata: *mut c_void, instance: *mut c_void) {
    if instance.is_null() {
        return;
    }
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // Safety: `instance` came from host_create_instance and the
        // engine promises to free it exactly once.
        drop(unsafe { Box::from_raw(instance as *mut InstanceStorage) });
    }));
    if outcome.is_err() {
        log::error!("Panic while destroying instance state");
    }
}

/// `get_virtual` entry registered for every host class.
pub(crate) unsafe extern "C" fn host_get_virtual(
    userdata: *mut c_void,
    name: *const c_char,
) -> Option<VirtualCallFn> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if userdata.is_null() || name.is_null() {
            return None;
        }
        // Safety: userdata as in host_create_instance; `name` is a
        // NUL-terminated string per the ABI.
        let class = unsafe { &*(userdata as *const RegisteredClass) };
        let name = unsafe { CStr::from_ptr(name) }.to_str().ok()?;
        let slot = class.vtable_slot(name)?;
        TRAMPOLINES.get(slot).copied()
    }));
    outcome.unwrap_or_else(|_| {
        log::error!("Panic while resolving a virtual method");
        None
    })
}

/// `property_default` entry registered for every host class.
pub(crate) unsafe extern "C" fn host_property_default(
    userdata: *mut c_void,
    name: *const c_char,
) -> *mut RawVariant {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if userdata.is_null() || name.is_null() {
            return std::ptr::null_mut();
        }
        // Safety: as in host_get_virtual.
        let class = unsafe { &*(userdata as *const RegisteredClass) };
        let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
            return std::ptr::null_mut();
        };
        let Some(info) = class.property_named(name) else {
            return std::ptr::null_mut();
        };
        match info.default.to_variant().and_then(Variant::into_engine_raw) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!(
                    "Failed to box the default of '{}::{name}': {e}",
                    class.name()
                );
                std::ptr::null_mut()
            }
        }
    }));
    outcome.unwrap_or_else(|_| {
        log::error!("Panic while producing a property default");
        std::ptr::null_mut()
    })
}
