//! # rift_core - Rift Engine Binding Runtime
//!
//! The machinery between host code and a running Rift Engine: a
//! generational handle registry for every engine object the host
//! touches, call-frame marshalling for method calls, a class system for
//! extending engine classes from the host, and virtual dispatch back
//! into host code.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌───────────────────┐
//! │   Host classes   │─────▶│   ClassRegistry   │
//! │ (impl HostClass) │      │ (flattened vtables)│
//! └────────┬─────────┘      └─────────┬─────────┘
//!          │ Obj<T> calls             │ registration
//!          ▼                          ▼
//! ┌──────────────────┐      ┌───────────────────┐
//! │  HandleRegistry  │      │    Rift Engine    │
//! │ (generational    │◀────▶│  (via EngineApi)  │
//! │  tokens, claims) │      └─────────┬─────────┘
//! └──────────────────┘                │ virtual calls
//!          ▲                          ▼
//! ┌────────┴─────────┐      ┌───────────────────┐
//! │    CallFrame     │      │    Trampolines    │
//! │ (arg marshalling)│      │ (into host state) │
//! └──────────────────┘      └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use rift_core::prelude::*;
//!
//! struct Sentinel {
//!     base: Obj<Node>,
//!     hits: i64,
//! }
//!
//! impl HostClass for Sentinel {
//!     type Base = Node;
//!     const CLASS_NAME: &'static str = "Sentinel";
//!
//!     fn new(base: Obj<Node>) -> Self {
//!         Sentinel { base, hits: 0 }
//!     }
//!
//!     fn describe(builder: &mut ClassBuilder<Self>) {
//!         builder
//!             .property(PropertyInfo::new("hits", PropertyValue::Int(0)))
//!             .virtual_method("_process", 1, |this, args, _ret| {
//!                 if args.get_f64(0).is_some() {
//!                     this.hits += 1;
//!                 }
//!             });
//!     }
//! }
//!
//! runtime::initialize(BindingConfig::default())?;
//! register_class::<Sentinel>()?;
//! ```
//!
//! Engine objects are never handed out as pointers. Every live object
//! the host holds sits behind a [`HandleId`] token; a token survives its
//! object's death and simply stops resolving, so use-after-free becomes
//! an error value instead of undefined behavior.

pub mod class;
pub mod classes;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod handles;
pub mod object;
pub mod properties;
pub mod runtime;
pub mod variant;

pub use class::{register_all, register_class, unregister_class, ClassBuilder, HostClass};
pub use class::{ClassRegistry, RegisteredClass, CLASS_REGISTRARS};
pub use config::BindingConfig;
pub use dispatch::{VirtualArgs, VirtualReturn, MAX_VIRTUAL_SLOTS};
pub use error::{Error, Result};
pub use frame::{CallFrame, MAX_CALL_ARGS};
pub use handles::{HandleError, HandleId, HandleRegistry, OwnershipKind, ReturnOwnership};
pub use object::{EngineClass, Inherits, Obj};
pub use properties::{PropertyInfo, PropertyKind, PropertyValue};
pub use variant::Variant;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::class::{register_class, ClassBuilder, HostClass};
    pub use crate::classes::{Node, Node2D, Object, RefCounted, Resource};
    pub use crate::config::BindingConfig;
    pub use crate::dispatch::{VirtualArgs, VirtualReturn};
    pub use crate::error::{Error, Result};
    pub use crate::handles::{HandleId, OwnershipKind};
    pub use crate::object::{EngineClass, Inherits, Obj};
    pub use crate::properties::{PropertyInfo, PropertyValue};
    pub use crate::runtime;
    pub use crate::variant::Variant;
}
