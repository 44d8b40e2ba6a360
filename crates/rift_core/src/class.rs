//! Host class registration.
//!
//! A host class is host-side state attached to an engine object: the
//! engine constructs the object, the binding constructs the state, and
//! virtual calls from the engine land in Rust closures. Classes are
//! declared through [`HostClass`], described with a [`ClassBuilder`],
//! and recorded in the process-wide [`ClassRegistry`], which also runs
//! the engine handshake.
//!
//! Inheritance is flattened at registration time: a class's virtual
//! table starts as a copy of its parent's, own overrides shadow
//! inherited entries in place, and new names append. In-place
//! shadowing keeps slot indices stable down a chain, so the engine may
//! resolve a method against any class in it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use linkme::distributed_slice;
use parking_lot::RwLock;

use rift_sys::api::EngineApi;
use rift_sys::codes::ErrorCode;
use rift_sys::types::{RawClassInfo, RawObject, RawPropertyInfo};

use crate::classes::is_engine_class;
use crate::dispatch::{
    host_create_instance, host_free_instance, host_get_virtual, host_property_default,
    InstanceStorage, VirtualArgs, VirtualReturn, MAX_VIRTUAL_SLOTS,
};
use crate::error::{engine_result, Error, Result};
use crate::object::{EngineClass, Obj};
use crate::properties::PropertyInfo;

/// A Rust type exposable to the engine as a class.
///
/// The base may be an engine class or another registered host class
/// (through that class's [`EngineClass`] impl). Parents must be
/// registered before their children.
pub trait HostClass: 'static + Send + Sized {
    /// Direct ancestor in the class hierarchy.
    type Base: EngineClass;

    /// Engine-facing class name.
    const CLASS_NAME: &'static str;

    /// Builds the host state for a freshly constructed engine object.
    ///
    /// The handle is a view: it does not keep the object alive, it just
    /// names it. Dropping it releases nothing engine-side.
    fn new(base: Obj<Self::Base>) -> Self;

    /// Declares the class's virtual methods and properties.
    fn describe(builder: &mut ClassBuilder<Self>);
}

// ============================================================================
// Class Builder
// ============================================================================

type VirtualThunk = dyn Fn(&mut InstanceStorage, &VirtualArgs, &mut VirtualReturn) + Send + Sync;

#[derive(Clone)]
pub(crate) struct VirtualEntry {
    pub(crate) name: &'static str,
    pub(crate) arity: usize,
    pub(crate) thunk: Arc<VirtualThunk>,
}

/// Collects a class's virtual methods and properties during
/// [`HostClass::describe`].
pub struct ClassBuilder<H: HostClass> {
    virtuals: Vec<VirtualEntry>,
    properties: Vec<PropertyInfo>,
    _marker: PhantomData<fn() -> H>,
}

impl<H: HostClass> ClassBuilder<H> {
    fn new() -> Self {
        ClassBuilder {
            virtuals: Vec::new(),
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares a virtual method override.
    ///
    /// `arity` is the number of arguments the engine passes; the
    /// closure sees them through [`VirtualArgs`] and writes its result
    /// through [`VirtualReturn`]. Declaring a name twice keeps the
    /// later closure.
    pub fn virtual_method<F>(&mut self, name: &'static str, arity: usize, f: F) -> &mut Self
    where
        F: Fn(&mut H, &VirtualArgs, &mut VirtualReturn) + Send + Sync + 'static,
    {
        let thunk: Arc<VirtualThunk> =
            Arc::new(move |storage: &mut InstanceStorage, args, ret| {
                match storage.state_mut::<H>() {
                    Some(state) => f(state, args, ret),
                    None => log::error!(
                        "Virtual '{name}' reached an instance without {} state",
                        H::CLASS_NAME
                    ),
                }
            });
        let entry = VirtualEntry {
            name,
            arity,
            thunk,
        };
        match self.virtuals.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => self.virtuals.push(entry),
        }
        self
    }

    /// Publishes a property. Redeclaring a name replaces the earlier
    /// description.
    pub fn property(&mut self, info: PropertyInfo) -> &mut Self {
        match self.properties.iter_mut().find(|p| p.name == info.name) {
            Some(existing) => *existing = info,
            None => self.properties.push(info),
        }
        self
    }
}

// ============================================================================
// Registered Classes
// ============================================================================

type StateCtor = dyn Fn(*mut RawObject) -> (TypeId, Box<dyn Any + Send>) + Send + Sync;

/// One registered class. Records are leaked on registration so the
/// engine can hold their address as callback userdata for the life of
/// the process.
pub struct RegisteredClass {
    name: &'static str,
    parent: &'static str,
    parent_record: Option<&'static RegisteredClass>,
    state_ctor: Box<StateCtor>,
    vtable: Vec<VirtualEntry>,
    properties: Vec<PropertyInfo>,
}

impl RegisteredClass {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn parent(&self) -> &'static str {
        self.parent
    }

    /// Flattened virtual method names, in slot order.
    pub fn virtual_names(&self) -> Vec<&'static str> {
        self.vtable.iter().map(|e| e.name).collect()
    }

    /// Flattened property list, ancestors first.
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub(crate) fn vtable_slot(&self, name: &str) -> Option<usize> {
        self.vtable.iter().position(|e| e.name == name)
    }

    pub(crate) fn vtable_entry(&self, slot: usize) -> Option<&VirtualEntry> {
        self.vtable.get(slot)
    }

    pub(crate) fn property_named(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Runs the state constructors for the whole chain, ancestors first.
    pub(crate) fn build_states(&self, raw: *mut RawObject) -> Vec<(TypeId, Box<dyn Any + Send>)> {
        let mut states = Vec::new();
        self.push_states(raw, &mut states);
        states
    }

    fn push_states(&self, raw: *mut RawObject, out: &mut Vec<(TypeId, Box<dyn Any + Send>)>) {
        if let Some(parent) = self.parent_record {
            parent.push_states(raw, out);
        }
        out.push((self.state_ctor)(raw));
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Process-wide record of registered host classes.
pub struct ClassRegistry {
    classes: RwLock<HashMap<&'static str, &'static RegisteredClass>>,
}

static GLOBAL: OnceLock<ClassRegistry> = OnceLock::new();

impl ClassRegistry {
    fn new() -> Self {
        ClassRegistry {
            classes: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ClassRegistry {
        GLOBAL.get_or_init(ClassRegistry::new)
    }

    /// Registers `H` with the binding and the engine.
    ///
    /// The whole handshake runs under the registry's write lock, so two
    /// racing registrations of the same name cannot both reach the
    /// engine.
    pub fn register<H: HostClass>(&self) -> Result<()> {
        let name = H::CLASS_NAME;
        let parent = H::Base::CLASS_NAME;

        let mut classes = self.classes.write();

        if classes.contains_key(name) || is_engine_class(name) {
            return Err(Error::AlreadyRegistered { class: name });
        }
        if parent == name {
            return Err(Error::ParentCycle {
                class: name,
                parent,
            });
        }
        let parent_record = if is_engine_class(parent) {
            None
        } else {
            match classes.get(parent) {
                Some(record) => Some(*record),
                None => {
                    return Err(Error::UnresolvedParent {
                        class: name.to_string(),
                        parent: parent.to_string(),
                    })
                }
            }
        };

        // Describe the class, then flatten it onto the parent's tables.
        let mut builder = ClassBuilder::<H>::new();
        H::describe(&mut builder);

        let mut vtable = parent_record.map(|p| p.vtable.clone()).unwrap_or_default();
        for entry in builder.virtuals {
            match vtable.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => vtable.push(entry),
            }
        }
        if vtable.len() > MAX_VIRTUAL_SLOTS {
            return Err(Error::VirtualTableFull {
                class: name,
                declared: vtable.len(),
                max: MAX_VIRTUAL_SLOTS,
            });
        }

        let mut properties = parent_record
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        for info in builder.properties {
            match properties.iter_mut().find(|p| p.name == info.name) {
                Some(existing) => *existing = info,
                None => properties.push(info),
            }
        }

        let state_ctor: Box<StateCtor> = Box::new(|raw: *mut RawObject| {
            // Safety: the engine just constructed `raw` as (a descendant
            // of) H::Base and is asking for its host state.
            let base = unsafe { Obj::<H::Base>::view(raw) };
            (TypeId::of::<H>(), Box::new(H::new(base)) as Box<dyn Any + Send>)
        });

        let record: &'static RegisteredClass = Box::leak(Box::new(RegisteredClass {
            name,
            parent,
            parent_record,
            state_ctor,
            vtable,
            properties,
        }));

        register_with_engine(record)?;
        classes.insert(name, record);
        log::info!(
            "Registered class '{name}' (parent '{parent}', {} virtuals, {} properties)",
            record.vtable.len(),
            record.properties.len()
        );
        Ok(())
    }

    /// Withdraws a class from the engine and the registry.
    ///
    /// Live instances keep working host-side; the engine stops
    /// constructing new ones.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut classes = self.classes.write();
        let c_name = class_cstring(name)?;
        let api = EngineApi::get();
        // Safety: `c_name` is a valid NUL-terminated string.
        let code = unsafe { (api.classdb_unregister)(c_name.as_ptr()) };
        engine_result(ErrorCode::from_raw(code))?;
        classes.remove(name);
        log::info!("Unregistered class '{name}'");
        Ok(())
    }

    /// Looks up a registered class record.
    pub fn get(&self, name: &str) -> Option<&'static RegisteredClass> {
        self.classes.read().get(name).copied()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn class_names(&self) -> Vec<&'static str> {
        self.classes.read().keys().copied().collect()
    }
}

/// Hands a class record to the engine.
///
/// The engine copies names and property descriptions during the call;
/// only `userdata` and the callbacks outlive it, and both point at
/// static data.
fn register_with_engine(record: &'static RegisteredClass) -> Result<()> {
    let class_name = class_cstring(record.name)?;
    let parent_name = class_cstring(record.parent)?;

    let prop_names: Vec<CString> = record
        .properties
        .iter()
        .map(|p| class_cstring(&p.name))
        .collect::<Result<_>>()?;
    let prop_hints: Vec<Option<CString>> = record
        .properties
        .iter()
        .map(|p| p.hint.as_deref().map(class_cstring).transpose())
        .collect::<Result<_>>()?;
    let raw_props: Vec<RawPropertyInfo> = record
        .properties
        .iter()
        .zip(prop_names.iter().zip(prop_hints.iter()))
        .map(|(info, (name, hint))| RawPropertyInfo {
            name: name.as_ptr(),
            tag: info.kind.variant_tag().to_raw(),
            hint: hint
                .as_ref()
                .map(|h| h.as_ptr())
                .unwrap_or(std::ptr::null()),
        })
        .collect();

    let info = RawClassInfo {
        class_name: class_name.as_ptr(),
        parent_name: parent_name.as_ptr(),
        userdata: record as *const RegisteredClass as *mut c_void,
        create_instance: Some(host_create_instance),
        free_instance: Some(host_free_instance),
        get_virtual: Some(host_get_virtual),
        properties: if raw_props.is_empty() {
            std::ptr::null()
        } else {
            raw_props.as_ptr()
        },
        property_count: raw_props.len() as u32,
        property_default: Some(host_property_default),
    };

    let api = EngineApi::get();
    // Safety: `info` and everything it points at outlive this call.
    let code = unsafe { (api.classdb_register)(&info) };
    engine_result(ErrorCode::from_raw(code))
}

fn class_cstring(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| {
        log::error!("Class registration string '{value}' contains a NUL byte");
        Error::Engine(ErrorCode::InvalidParameter)
    })
}

// ============================================================================
// Convenience Entry Points
// ============================================================================

/// Registers `H` with the process-wide registry.
pub fn register_class<H: HostClass>() -> Result<()> {
    ClassRegistry::global().register::<H>()
}

/// Unregisters a class from the process-wide registry.
pub fn unregister_class(name: &str) -> Result<()> {
    ClassRegistry::global().unregister(name)
}

/// Registrars collected at link time. Crates add theirs with
/// `#[distributed_slice(CLASS_REGISTRARS)]`; [`register_all`] runs the
/// lot during runtime initialization.
#[distributed_slice]
pub static CLASS_REGISTRARS: [fn() -> Result<()>] = [..];

/// Runs every collected registrar. Parents register before children
/// when their registrars are declared that way; an ordering mistake
/// surfaces as [`Error::UnresolvedParent`].
pub fn register_all() -> Result<()> {
    for registrar in CLASS_REGISTRARS {
        registrar()?;
    }
    Ok(())
}
