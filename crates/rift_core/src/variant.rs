//! Owned wrappers for engine variant boxes.
//!
//! A [`Variant`] is a registry-tracked claim on an engine-allocated
//! variant box. Reads go through the token, so a variant that outlives
//! its box (a transient read after [`cycle`](crate::handles::cycle))
//! fails with a stale-handle error instead of touching freed memory.

use std::ffi::c_char;
use std::fmt;

use rift_sys::api::EngineApi;
use rift_sys::codes::{ErrorCode, VariantTag};
use rift_sys::types::RawVariant;

use crate::error::{Error, Result};
use crate::handles::{self, HandleId, OwnershipKind, ReturnOwnership};
use crate::object::{EngineClass, Obj};

/// A dynamically typed engine value.
///
/// Not `Clone`; copying a variant allocates a new engine box and can
/// fail, so it goes through [`Variant::try_duplicate`].
pub struct Variant {
    id: HandleId,
}

impl Variant {
    // ----- constructors -----

    /// Allocates a nil box.
    pub fn nil() -> Result<Self> {
        let api = EngineApi::get();
        // Safety: no arguments to get wrong.
        Self::adopt(unsafe { (api.variant_new_nil)() })
    }

    pub fn from_bool(value: bool) -> Result<Self> {
        let api = EngineApi::get();
        // Safety: passing a primitive by value.
        Self::adopt(unsafe { (api.variant_new_bool)(value) })
    }

    pub fn from_i64(value: i64) -> Result<Self> {
        let api = EngineApi::get();
        // Safety: as above.
        Self::adopt(unsafe { (api.variant_new_int)(value) })
    }

    pub fn from_f64(value: f64) -> Result<Self> {
        let api = EngineApi::get();
        // Safety: as above.
        Self::adopt(unsafe { (api.variant_new_float)(value) })
    }

    /// Copies `text` into an engine string box.
    pub fn from_str(text: &str) -> Result<Self> {
        let api = EngineApi::get();
        // Safety: pointer and length describe a valid UTF-8 buffer; the
        // engine copies, it does not retain the pointer.
        let raw =
            unsafe { (api.variant_new_string_utf8)(text.as_ptr() as *const c_char, text.len()) };
        Self::adopt(raw)
    }

    /// Boxes a reference to an engine object. The box takes its own
    /// claim on the object; the handle keeps its claim too.
    pub fn from_object<T: EngineClass>(object: &Obj<T>) -> Result<Self> {
        if object.is_null() {
            return Self::nil();
        }
        let raw = object.raw()?;
        let api = EngineApi::get();
        // Safety: `raw` is live; resolve just checked.
        Self::adopt(unsafe { (api.variant_new_object)(raw) })
    }

    fn adopt(raw: *mut RawVariant) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::Engine(ErrorCode::CantCreate));
        }
        Ok(Variant {
            id: handles::acquire(OwnershipKind::ValueOwned, raw.cast()),
        })
    }

    /// Wraps a variant box coming back from the engine.
    ///
    /// `Owned` adopts the box outright. `Borrowed` leaves the engine's
    /// box alone and duplicates it into a box of our own. `Transient`
    /// adopts the box under the frame-scratch policy: it dies at the
    /// next [`cycle`](crate::handles::cycle) unless dropped or
    /// duplicated first.
    ///
    /// # Safety
    ///
    /// `raw` must be a live variant box. For `Owned` and `Transient`
    /// the engine must have transferred the box to the caller.
    pub unsafe fn from_engine_raw(raw: *mut RawVariant, ownership: ReturnOwnership) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::Engine(ErrorCode::CantCreate));
        }
        let kind = match ownership {
            ReturnOwnership::Owned => OwnershipKind::ValueOwned,
            ReturnOwnership::Transient => OwnershipKind::Transient,
            ReturnOwnership::Borrowed => {
                let api = EngineApi::get();
                let dup = (api.variant_duplicate)(raw);
                return Self::adopt(dup);
            }
        };
        Ok(Variant {
            id: handles::acquire(kind, raw.cast()),
        })
    }

    // ----- inspection -----

    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Resolves the engine box behind this variant.
    pub fn raw(&self) -> Result<*mut RawVariant> {
        Ok(handles::resolve(self.id)?.cast())
    }

    /// The box's dynamic type tag.
    pub fn tag(&self) -> Result<VariantTag> {
        let raw = self.raw()?;
        let api = EngineApi::get();
        // Safety: `raw` is live; resolve just checked.
        let tag = unsafe { (api.variant_tag)(raw) };
        match VariantTag::from_raw(tag) {
            Some(tag) => Ok(tag),
            None => {
                log::warn!("Engine reported unknown variant tag {tag}");
                Err(Error::Engine(ErrorCode::Bug))
            }
        }
    }

    pub fn is_nil(&self) -> Result<bool> {
        Ok(self.tag()? == VariantTag::Nil)
    }

    // ----- typed extraction -----

    pub fn try_to_bool(&self) -> Result<bool> {
        let raw = self.expect_tag(VariantTag::Bool)?;
        let api = EngineApi::get();
        // Safety: `raw` is live; expect_tag resolved it.
        Ok(unsafe { (api.variant_get_bool)(raw) })
    }

    pub fn try_to_i64(&self) -> Result<i64> {
        let raw = self.expect_tag(VariantTag::Int)?;
        let api = EngineApi::get();
        // Safety: as above.
        Ok(unsafe { (api.variant_get_int)(raw) })
    }

    pub fn try_to_f64(&self) -> Result<f64> {
        let raw = self.expect_tag(VariantTag::Float)?;
        let api = EngineApi::get();
        // Safety: as above.
        Ok(unsafe { (api.variant_get_float)(raw) })
    }

    /// Copies the box's string payload out.
    pub fn try_to_string(&self) -> Result<String> {
        let raw = self.raw()?;
        let found = self.tag()?;
        if !matches!(found, VariantTag::String | VariantTag::StringName) {
            return Err(Error::VariantType {
                expected: VariantTag::String,
                found,
            });
        }
        let api = EngineApi::get();
        // Safety: `raw` is live for both calls; the buffer is sized from
        // the reported length.
        unsafe {
            let len = (api.variant_string_len)(raw);
            let mut buf = vec![0u8; len];
            let copied = (api.variant_string_copy)(raw, buf.as_mut_ptr() as *mut c_char, len);
            buf.truncate(copied);
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
    }

    /// Takes a typed claim on the object inside the box.
    ///
    /// The variant keeps its own claim; the returned handle is
    /// independent. A nil object inside the box comes back as the null
    /// handle.
    pub fn try_to_object<T: EngineClass>(&self) -> Result<Obj<T>> {
        let raw = self.expect_tag(VariantTag::Object)?;
        let api = EngineApi::get();
        // Safety: `raw` is live; expect_tag resolved it.
        let object = unsafe { (api.variant_get_object)(raw) };
        // Safety: the box's claim keeps the object alive while we take
        // our own.
        Ok(unsafe { Obj::from_engine_raw(object, ReturnOwnership::Borrowed) })
    }

    fn expect_tag(&self, expected: VariantTag) -> Result<*mut RawVariant> {
        let raw = self.raw()?;
        let found = self.tag()?;
        if found != expected {
            return Err(Error::VariantType { expected, found });
        }
        Ok(raw)
    }

    // ----- lifetime -----

    /// Copies the box into a fresh host-owned box.
    ///
    /// Also the way to keep a transient value past the cycle boundary.
    pub fn try_duplicate(&self) -> Result<Variant> {
        let raw = self.raw()?;
        let api = EngineApi::get();
        // Safety: `raw` is live; resolve just checked.
        Self::adopt(unsafe { (api.variant_duplicate)(raw) })
    }

    /// Releases the box to the engine.
    ///
    /// The registry claim is retired without destroying the box; from
    /// here on the engine decides when it dies.
    pub fn into_engine_raw(self) -> Result<*mut RawVariant> {
        let raw = handles::take(self.id)?;
        std::mem::forget(self);
        Ok(raw.cast())
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        // A transient variant may already be dead after a cycle; the
        // registry logs that and we move on.
        let _ = handles::release(self.id);
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Ok(tag) => write!(f, "Variant({tag}, {:?})", self.id),
            Err(_) => write!(f, "Variant(dead, {:?})", self.id),
        }
    }
}

// ============================================================================
// Scratch Arguments
// ============================================================================

/// A variant box that lives exactly as long as one engine call.
///
/// Wrapper methods use this to pass Rust values as variant arguments
/// without going through the registry: the box is allocated, pointed at
/// from the call frame, and destroyed when the guard drops.
pub(crate) struct VariantArg {
    raw: *mut RawVariant,
}

impl VariantArg {
    pub(crate) fn string(text: &str) -> Self {
        let api = EngineApi::get();
        // Safety: pointer and length describe a valid buffer.
        let raw =
            unsafe { (api.variant_new_string_utf8)(text.as_ptr() as *const c_char, text.len()) };
        if raw.is_null() {
            log::error!("Engine failed to allocate a string argument box");
        }
        VariantArg { raw }
    }

    #[inline]
    pub(crate) fn as_raw(&self) -> *mut RawVariant {
        self.raw
    }
}

impl Drop for VariantArg {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            let api = EngineApi::get();
            // Safety: the box was ours alone and the call it fed has
            // returned.
            unsafe { (api.variant_destroy)(self.raw) };
        }
    }
}
