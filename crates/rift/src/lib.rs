//! # rift - Rift Engine Rust Binding
//!
//! The facade crate for binding Rust code to the Rift Engine:
//! - Re-exports of the runtime core and raw ABI crates
//! - The exported entry point for engine-hosted builds
//! - A prelude with the types every host crate touches
//!
//! ## Bootstrap
//!
//! Two startup routes, matching who loads whom:
//! - Host embeds the engine: call [`initialize`] with a
//!   [`BindingConfig`] naming the engine library.
//! - Engine loads the binding (editor plugins, exported builds): the
//!   engine resolves [`rift_binding_init`] from the binding library and
//!   hands its table over. Compile the host crate as a `cdylib` so the
//!   symbol is exported.
//!
//! ## Example
//!
//! ```ignore
//! use rift::prelude::*;
//!
//! fn main() -> Result<()> {
//!     rift::initialize(BindingConfig {
//!         engine_library: Some("librift_engine.so".into()),
//!         ..BindingConfig::default()
//!     })?;
//!
//!     let root = Node2D::create()?;
//!     root.set_name("root")?;
//!     Ok(())
//! }
//! ```

use std::panic::{self, AssertUnwindSafe};

use rift_sys::types::RawEngineTable;

// Re-export crates
pub use rift_core;
pub use rift_sys;

pub use rift_core::classes::{Node, Node2D, Object, RefCounted, Resource};
pub use rift_core::config::BindingConfig;
pub use rift_core::error::{Error, Result};
pub use rift_core::object::{EngineClass, Inherits, Obj};
pub use rift_core::runtime::{initialize, singleton};
pub use rift_core::variant::Variant;
pub use rift_core::{register_all, register_class, ClassBuilder, HostClass};

/// Configuration file read by [`rift_binding_init`], relative to the
/// working directory of the hosting process.
pub const CONFIG_FILE: &str = "rift.toml";

/// Entry point for engine-hosted builds.
///
/// The engine calls this once after loading the binding library,
/// passing its binding table. Configuration is read from
/// [`CONFIG_FILE`] when present; the `engine_library` field is ignored
/// on this route, since the engine is already attached. Returns `false`
/// on any failure, with the reason logged; the engine is expected to
/// unload the library in that case.
///
/// # Safety
///
/// `table` must be null or point to a [`RawEngineTable`] that stays
/// valid and unchanged for the rest of the process.
#[no_mangle]
pub unsafe extern "C" fn rift_binding_init(table: *const RawEngineTable) -> bool {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // Safety: forwarded under this function's own contract.
        unsafe { init_from_engine(table) }
    }));
    match outcome {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("Rift binding initialisation failed: {e}");
            false
        }
        Err(_) => {
            log::error!("Panic during Rift binding initialisation");
            false
        }
    }
}

unsafe fn init_from_engine(table: *const RawEngineTable) -> Result<()> {
    // Safety: per the rift_binding_init contract.
    unsafe { rift_sys::bootstrap::bind_raw_table(table) }?;

    let mut config = host_config();
    if config.engine_library.take().is_some() {
        log::debug!("Ignoring engine_library from {CONFIG_FILE}; the engine loaded us");
    }
    rift_core::runtime::initialize(config)
}

/// The host's configuration file, or defaults when there is none.
fn host_config() -> BindingConfig {
    match BindingConfig::load(CONFIG_FILE) {
        Ok(config) => config,
        Err(Error::ConfigRead { .. }) => BindingConfig::default(),
        Err(e) => {
            log::warn!("Failed to parse {CONFIG_FILE}, using defaults: {e}");
            BindingConfig::default()
        }
    }
}

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::{initialize, singleton, BindingConfig, Error, Result};

    // Re-export from sub-crates
    pub use rift_core::prelude::*;
}
