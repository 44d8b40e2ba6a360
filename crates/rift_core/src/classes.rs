//! Bootstrap engine classes.
//!
//! Hand-written wrappers for the handful of engine classes the binding
//! ships with. Each class is a zero-sized marker wired into the
//! hierarchy through [`EngineClass`] and [`Inherits`]; methods are
//! inherent impls on [`Obj`] bounded by `Inherits<...>`, so a
//! descendant handle calls its ancestors' methods directly.
//!
//! Method binds resolve lazily, once per call site, and are cached in
//! function-local statics for the life of the process.

use std::sync::OnceLock;

use rift_sys::api::{method_bind, MethodBind};

use crate::error::{engine_result, Result};
use crate::frame::CallFrame;
use crate::handles::{OwnershipKind, ReturnOwnership};
use crate::object::{EngineClass, Inherits, Obj};
use crate::variant::{Variant, VariantArg};

/// Classes the engine itself provides. Host classes may extend these
/// but never redeclare them.
pub const ENGINE_CLASS_NAMES: &[&str] = &["Object", "RefCounted", "Resource", "Node", "Node2D"];

pub fn is_engine_class(name: &str) -> bool {
    ENGINE_CLASS_NAMES.contains(&name)
}

// ============================================================================
// Hierarchy
// ============================================================================

/// Root of the engine class hierarchy.
pub struct Object;

/// Reference-counted base class; objects die when their count hits zero.
pub struct RefCounted;

/// Loadable, path-addressed data. Reference counted.
pub struct Resource;

/// Scene tree participant. Owned by the tree, freed manually otherwise.
pub struct Node;

/// A node with a 2D transform.
pub struct Node2D;

impl EngineClass for Object {
    const CLASS_NAME: &'static str = "Object";
    const OWNERSHIP: OwnershipKind = OwnershipKind::SceneOwned;
    type Base = Object;
}

impl EngineClass for RefCounted {
    const CLASS_NAME: &'static str = "RefCounted";
    const OWNERSHIP: OwnershipKind = OwnershipKind::RefCounted;
    type Base = Object;
}

impl EngineClass for Resource {
    const CLASS_NAME: &'static str = "Resource";
    const OWNERSHIP: OwnershipKind = OwnershipKind::RefCounted;
    type Base = RefCounted;
}

impl EngineClass for Node {
    const CLASS_NAME: &'static str = "Node";
    const OWNERSHIP: OwnershipKind = OwnershipKind::SceneOwned;
    type Base = Object;
}

impl EngineClass for Node2D {
    const CLASS_NAME: &'static str = "Node2D";
    const OWNERSHIP: OwnershipKind = OwnershipKind::SceneOwned;
    type Base = Node;
}

// Safety: the engine defines these ancestries; upcasting along them is
// what the engine itself does with the same pointers.
unsafe impl Inherits<Object> for RefCounted {}
unsafe impl Inherits<Object> for Resource {}
unsafe impl Inherits<RefCounted> for Resource {}
unsafe impl Inherits<Object> for Node {}
unsafe impl Inherits<Object> for Node2D {}
unsafe impl Inherits<Node> for Node2D {}

// ============================================================================
// Object
// ============================================================================

impl<T: Inherits<Object>> Obj<T> {
    /// The engine's stable identifier for the object. Zero for the null
    /// handle.
    pub fn instance_id(&self) -> Result<u64> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Object", "get_instance_id"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(0);
        };
        let mut frame = CallFrame::new();
        // Safety: receiver is live, no arguments.
        unsafe { frame.invoke(bind, raw) };
        Ok(frame.ret_u64())
    }

    /// The object's dynamic class name, which may be a descendant of
    /// `T`'s.
    pub fn class_name(&self) -> Result<String> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Object", "get_class_name"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(String::new());
        };
        let mut frame = CallFrame::new();
        // Safety: receiver is live, no arguments.
        unsafe { frame.invoke(bind, raw) };
        // Safety: the engine hands the name back as a box of our own.
        let variant =
            unsafe { Variant::from_engine_raw(frame.ret_variant_ptr(), ReturnOwnership::Owned) }?;
        variant.try_to_string()
    }

    /// Round-trips a value through the engine, returning an independent
    /// copy. Echoing through the null handle yields nil.
    pub fn echo(&self, value: &Variant) -> Result<Variant> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Object", "echo"));
        let Some(raw) = self.checked_raw()? else {
            return Variant::nil();
        };
        let mut frame = CallFrame::new();
        frame.push_variant_ptr(value.raw()?);
        // Safety: receiver is live; the argument box outlives the call.
        unsafe { frame.invoke(bind, raw) };
        // Safety: the copy is ours to keep.
        unsafe { Variant::from_engine_raw(frame.ret_variant_ptr(), ReturnOwnership::Owned) }
    }
}

// ============================================================================
// RefCounted
// ============================================================================

impl<T: Inherits<RefCounted>> Obj<T> {
    /// Tells the engine the host now participates in the object's
    /// count. `false` means the engine refused.
    pub fn init_ref(&self) -> Result<bool> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("RefCounted", "init_ref"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(false);
        };
        let mut frame = CallFrame::new();
        // Safety: receiver is live, no arguments.
        unsafe { frame.invoke(bind, raw) };
        Ok(frame.ret_bool())
    }

    /// Engine-side reference count, as the engine reports it.
    pub fn reference_count(&self) -> Result<i64> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("RefCounted", "get_reference_count"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(0);
        };
        let mut frame = CallFrame::new();
        // Safety: as above.
        unsafe { frame.invoke(bind, raw) };
        Ok(frame.ret_i64())
    }
}

// ============================================================================
// Resource
// ============================================================================

impl<T: Inherits<Resource>> Obj<T> {
    pub fn set_path(&self, path: &str) -> Result<()> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Resource", "set_path"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(());
        };
        let arg = VariantArg::string(path);
        let mut frame = CallFrame::new();
        frame.push_variant_ptr(arg.as_raw());
        // Safety: receiver is live; `arg` outlives the call.
        unsafe { frame.invoke(bind, raw) };
        Ok(())
    }

    pub fn path(&self) -> Result<String> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Resource", "get_path"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(String::new());
        };
        let mut frame = CallFrame::new();
        // Safety: receiver is live, no arguments.
        unsafe { frame.invoke(bind, raw) };
        // The path comes back as frame scratch; copy the string out
        // before the box goes.
        let variant = unsafe {
            Variant::from_engine_raw(frame.ret_variant_ptr(), ReturnOwnership::Transient)
        }?;
        variant.try_to_string()
    }
}

// ============================================================================
// Node
// ============================================================================

impl<T: Inherits<Node>> Obj<T> {
    pub fn set_name(&self, name: &str) -> Result<()> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node", "set_name"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(());
        };
        let arg = VariantArg::string(name);
        let mut frame = CallFrame::new();
        frame.push_variant_ptr(arg.as_raw());
        // Safety: receiver is live; `arg` outlives the call.
        unsafe { frame.invoke(bind, raw) };
        Ok(())
    }

    pub fn name(&self) -> Result<String> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node", "get_name"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(String::new());
        };
        let mut frame = CallFrame::new();
        // Safety: receiver is live, no arguments.
        unsafe { frame.invoke(bind, raw) };
        // Safety: the name comes back as a box of our own.
        let variant =
            unsafe { Variant::from_engine_raw(frame.ret_variant_ptr(), ReturnOwnership::Owned) }?;
        variant.try_to_string()
    }

    /// Parents `child` under this node.
    ///
    /// The engine refuses a child that already has a parent; that comes
    /// back as an engine error, not a panic.
    pub fn add_child<C: Inherits<Node>>(&self, child: &Obj<C>) -> Result<()> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node", "add_child"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(());
        };
        let child_raw = child.checked_raw()?.unwrap_or(std::ptr::null_mut());
        let mut frame = CallFrame::new();
        frame.push_object_ptr(child_raw);
        // Safety: receiver is live; a null child is the engine's call.
        unsafe { frame.invoke(bind, raw) };
        engine_result(frame.ret_error_code())
    }

    pub fn child_count(&self) -> Result<i64> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node", "get_child_count"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(0);
        };
        let mut frame = CallFrame::new();
        // Safety: receiver is live, no arguments.
        unsafe { frame.invoke(bind, raw) };
        Ok(frame.ret_i64())
    }
}

// ============================================================================
// Node2D
// ============================================================================

impl<T: Inherits<Node2D>> Obj<T> {
    pub fn set_position_x(&self, x: f64) -> Result<()> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node2D", "set_position_x"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(());
        };
        let mut frame = CallFrame::new();
        frame.push_f64(x);
        // Safety: receiver is live.
        unsafe { frame.invoke(bind, raw) };
        Ok(())
    }

    pub fn set_position_y(&self, y: f64) -> Result<()> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node2D", "set_position_y"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(());
        };
        let mut frame = CallFrame::new();
        frame.push_f64(y);
        // Safety: as above.
        unsafe { frame.invoke(bind, raw) };
        Ok(())
    }

    pub fn position_x(&self) -> Result<f64> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node2D", "get_position_x"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(0.0);
        };
        let mut frame = CallFrame::new();
        // Safety: as above.
        unsafe { frame.invoke(bind, raw) };
        Ok(frame.ret_f64())
    }

    pub fn position_y(&self) -> Result<f64> {
        static BIND: OnceLock<MethodBind> = OnceLock::new();
        let bind = *BIND.get_or_init(|| method_bind("Node2D", "get_position_y"));
        let Some(raw) = self.checked_raw()? else {
            return Ok(0.0);
        };
        let mut frame = CallFrame::new();
        // Safety: as above.
        unsafe { frame.invoke(bind, raw) };
        Ok(frame.ret_f64())
    }
}
