//! Typed object handles and the class upcast model.
//!
//! [`Obj<T>`] is a [`HandleId`] wearing a class type. The wrapper adds no
//! data and no indirection: upcasting to an ancestor class reinterprets
//! the same bits under a different type parameter, checked at compile
//! time through the [`Inherits`] marker trait.

use std::ffi::CString;
use std::fmt;
use std::marker::PhantomData;

use rift_sys::api::EngineApi;
use rift_sys::types::RawObject;

use crate::error::{Error, Result};
use crate::handles::{self, HandleId, OwnershipKind, ReturnOwnership};

/// A class in the engine's hierarchy, either an engine class wrapped by
/// the binding or a host class registered through the class registry.
pub trait EngineClass: 'static + Sized {
    /// Engine-facing class name.
    const CLASS_NAME: &'static str;

    /// How the host holds instances of this class.
    const OWNERSHIP: OwnershipKind;

    /// Direct ancestor. The hierarchy root uses itself.
    type Base: EngineClass;
}

/// Marker for "`Self` is `B` or a descendant of `B`".
///
/// # Safety
///
/// Implementing this asserts that every engine object of class `Self`
/// is a valid instance of class `B`, so a handle to one may be
/// reinterpreted as a handle to the other.
pub unsafe trait Inherits<B: EngineClass>: EngineClass {}

// Every class is trivially its own ancestor.
unsafe impl<T: EngineClass> Inherits<T> for T {}

/// Typed handle to an engine object.
///
/// Equality compares claim tokens, not objects: two separately acquired
/// handles to the same engine object are not equal.
#[repr(transparent)]
pub struct Obj<T: EngineClass> {
    id: HandleId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: EngineClass> Obj<T> {
    /// The null handle. Reads through it yield zero values, writes are
    /// no-ops.
    #[inline]
    pub fn null() -> Self {
        Self::from_id(HandleId::NULL)
    }

    #[inline]
    pub(crate) fn from_id(id: HandleId) -> Self {
        Obj {
            id,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.id.is_null()
    }

    /// Whether the handle still resolves. Null and stale handles are
    /// both dead; probing a dead handle here is not reported as misuse.
    pub fn is_live(&self) -> bool {
        handles::is_live(self.id)
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The handle's raw 64-bit transport form. See [`HandleId::to_bits`].
    #[inline]
    pub fn to_bits(&self) -> u64 {
        self.id.to_bits()
    }

    /// Reconstructs a handle from [`Self::to_bits`] output. The result
    /// carries no fresh claim; it is only as valid as the token it came
    /// from.
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self::from_id(HandleId::from_bits(bits))
    }

    /// Asks the engine to construct a new object of this class.
    ///
    /// For reference-counted classes the new object arrives with the
    /// caller's claim already counted.
    pub fn create() -> Result<Self> {
        let api = EngineApi::get();
        let name = match CString::new(T::CLASS_NAME) {
            Ok(name) => name,
            Err(_) => {
                log::error!("Class name '{}' contains a NUL byte", T::CLASS_NAME);
                return Err(Error::CreateFailed {
                    class: T::CLASS_NAME,
                });
            }
        };
        // Safety: `name` is a valid NUL-terminated string.
        let raw = unsafe { (api.object_construct)(name.as_ptr()) };
        if raw.is_null() {
            return Err(Error::CreateFailed {
                class: T::CLASS_NAME,
            });
        }
        // Safety: the engine just handed us this pointer with one claim.
        Ok(unsafe { Self::from_engine_raw(raw, ReturnOwnership::Owned) })
    }

    /// Wraps a raw object pointer coming back from the engine.
    ///
    /// `Owned` adopts the engine's transferred reference; `Borrowed`
    /// takes a fresh claim (incrementing the count for reference-counted
    /// classes). `Transient` is treated as `Borrowed`: objects are never
    /// frame-scratch.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a live object of class `T` (or a descendant).
    pub unsafe fn from_engine_raw(raw: *mut RawObject, ownership: ReturnOwnership) -> Self {
        if raw.is_null() {
            return Self::null();
        }
        if matches!(T::OWNERSHIP, OwnershipKind::RefCounted)
            && !matches!(ownership, ReturnOwnership::Owned)
        {
            (EngineApi::get().ref_inc)(raw);
        }
        Self::from_id(handles::acquire(T::OWNERSHIP, raw.cast()))
    }

    /// Takes a non-owning view of a live engine object.
    ///
    /// The claim is always scene-managed, whatever the class's normal
    /// ownership: releasing it frees the registry slot and nothing
    /// else. Host class state holds its base object this way, so an
    /// instance never keeps its own object alive.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a live object of class `T` (or a
    /// descendant).
    pub(crate) unsafe fn view(raw: *mut RawObject) -> Self {
        if raw.is_null() {
            return Self::null();
        }
        Self::from_id(handles::acquire(OwnershipKind::SceneOwned, raw.cast()))
    }

    /// Resolves the handle to the engine pointer behind it.
    pub fn raw(&self) -> Result<*mut RawObject> {
        Ok(handles::resolve(self.id)?.cast())
    }

    /// Pointer for method calls: `Ok(None)` for null (the call becomes
    /// a no-op or zero-value read), an error for stale handles.
    pub(crate) fn checked_raw(&self) -> Result<Option<*mut RawObject>> {
        if self.id.is_null() {
            return Ok(None);
        }
        Ok(Some(handles::resolve(self.id)?.cast()))
    }

    /// Reinterprets this handle as an ancestor class.
    ///
    /// Pure bit reinterpretation: same token, same claim, no engine
    /// traffic, no reference-count movement.
    #[inline]
    pub fn upcast<B: EngineClass>(self) -> Obj<B>
    where
        T: Inherits<B>,
    {
        let id = self.id;
        std::mem::forget(self);
        Obj::from_id(id)
    }

    /// Borrowing form of [`Self::upcast`].
    #[inline]
    pub fn upcast_ref<B: EngineClass>(&self) -> &Obj<B>
    where
        T: Inherits<B>,
    {
        // Safety: Obj is repr(transparent) over HandleId, so Obj<T> and
        // Obj<B> share one layout; Inherits guarantees the class side.
        unsafe { &*(self as *const Obj<T> as *const Obj<B>) }
    }

    /// Immediately destroys the engine object behind this handle.
    ///
    /// Only valid for manually managed classes; reference-counted
    /// objects die through their count.
    pub fn free(self) -> Result<()> {
        if matches!(T::OWNERSHIP, OwnershipKind::RefCounted) {
            return Err(Error::CannotFree {
                class: T::CLASS_NAME,
            });
        }
        if self.id.is_null() {
            return Ok(());
        }
        let raw = handles::take(self.id)?;
        std::mem::forget(self);
        let api = EngineApi::get();
        // Safety: the claim we just retired kept the object alive.
        unsafe { (api.object_destroy)(raw.cast()) };
        Ok(())
    }
}

impl<T: EngineClass> Clone for Obj<T> {
    /// Takes a second claim on the same engine object. For
    /// reference-counted classes this increments the engine-side count.
    fn clone(&self) -> Self {
        if self.id.is_null() {
            return Self::null();
        }
        match handles::resolve(self.id) {
            Ok(raw) => {
                if matches!(T::OWNERSHIP, OwnershipKind::RefCounted) {
                    // Safety: `raw` is live; resolve just checked.
                    unsafe { (EngineApi::get().ref_inc)(raw.cast()) };
                }
                Self::from_id(handles::acquire(T::OWNERSHIP, raw))
            }
            Err(_) => Self::null(),
        }
    }
}

impl<T: EngineClass> Drop for Obj<T> {
    fn drop(&mut self) {
        if !self.id.is_null() {
            // Stale and double releases are logged by the registry.
            let _ = handles::release(self.id);
        }
    }
}

impl<T: EngineClass> PartialEq for Obj<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: EngineClass> Eq for Obj<T> {}

impl<T: EngineClass> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj<{}>({:?})", T::CLASS_NAME, self.id)
    }
}

impl<T: EngineClass> Default for Obj<T> {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{Node, Node2D, Object};

    #[test]
    fn null_handles() {
        let obj: Obj<Node> = Obj::null();
        assert!(obj.is_null());
        assert!(!obj.is_live());
        assert!(obj.raw().is_err());
        assert!(matches!(obj.checked_raw(), Ok(None)));
        let clone = obj.clone();
        assert!(clone.is_null());
    }

    #[test]
    fn bits_round_trip_preserves_token() {
        let obj: Obj<Node> = Obj::from_id(HandleId::from_bits((5u64 << 32) | 9));
        let bits = obj.to_bits();
        let back: Obj<Node> = Obj::from_bits(bits);
        assert_eq!(back.id(), obj.id());
        std::mem::forget(obj);
        std::mem::forget(back);
    }

    #[test]
    fn upcast_preserves_bits() {
        let id = HandleId::from_bits((3u64 << 32) | 17);
        let node2d: Obj<Node2D> = Obj::from_id(id);
        let bits = node2d.to_bits();

        let node: Obj<Node> = node2d.upcast();
        assert_eq!(node.to_bits(), bits);

        let object: Obj<Object> = node.upcast();
        assert_eq!(object.to_bits(), bits);
        std::mem::forget(object);
    }

    #[test]
    fn upcast_ref_aliases() {
        let node2d: Obj<Node2D> = Obj::from_id(HandleId::from_bits(42));
        let node: &Obj<Node> = node2d.upcast_ref();
        assert_eq!(node.to_bits(), node2d.to_bits());
        let object: &Obj<Object> = node2d.upcast_ref();
        assert_eq!(object.to_bits(), node2d.to_bits());
        std::mem::forget(node2d);
    }

    #[test]
    fn token_equality_not_object_equality() {
        let a: Obj<Node> = Obj::from_id(HandleId::from_bits(7));
        let b: Obj<Node> = Obj::from_id(HandleId::from_bits(7));
        let c: Obj<Node> = Obj::from_id(HandleId::from_bits(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
        std::mem::forget((a, b, c));
    }
}
