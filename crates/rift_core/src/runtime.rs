//! Binding lifecycle.
//!
//! [`initialize`] is the one call a host makes before touching anything
//! else: it sizes the handle registry, attaches the engine, and runs the
//! startup class registrars. After that the binding is passive; the only
//! recurring obligation is [`handles::cycle`] once per engine frame to
//! retire transient values.

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::OnceLock;

use parking_lot::Mutex;
use rift_sys::api::EngineApi;
use rift_sys::bootstrap;
use rift_sys::error::BootstrapError;

use crate::class;
use crate::classes::Object;
use crate::config::BindingConfig;
use crate::error::{Error, Result};
use crate::handles::{self, HandleId, HandleRegistry, OwnershipKind};
use crate::object::Obj;

/// Brings the binding up against a running engine.
///
/// The engine binding table must be reachable one way or the other:
/// either `config.engine_library` names a library to load, or the
/// engine already pushed its table through the binding entry point
/// before calling in. With neither, this fails with
/// [`BootstrapError::NotInstalled`].
///
/// Safe to call from exactly one place; a second initialization keeps
/// the registry already in use and reports the engine attach as
/// [`BootstrapError::AlreadyInstalled`].
pub fn initialize(config: BindingConfig) -> Result<()> {
    let registry = HandleRegistry::new(
        config.registry_shards,
        config.registry_capacity,
        config.strict_handles,
    );
    if !handles::configure(registry) {
        log::warn!("Handle registry already in use; configured sizes ignored");
    }

    match &config.engine_library {
        Some(path) => bootstrap::load_engine(path)?,
        None => {
            if !EngineApi::is_installed() {
                return Err(Error::Bootstrap(BootstrapError::NotInstalled));
            }
        }
    }

    class::register_all()?;
    log::info!(
        "Rift binding initialised, {} host classes registered",
        class::ClassRegistry::global().class_names().len()
    );
    Ok(())
}

static SINGLETONS: OnceLock<Mutex<HashMap<String, HandleId>>> = OnceLock::new();

/// Looks up an engine singleton by name.
///
/// The engine lookup happens once per name; afterwards the pointer is
/// served from a process-wide cache. Singletons are engine-owned, so
/// every handle this returns is a non-owning view: dropping it never
/// touches the object.
pub fn singleton(name: &str) -> Result<Obj<Object>> {
    let cache = SINGLETONS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock();

    if let Some(&id) = cache.get(name) {
        if handles::is_live(id) {
            let raw = handles::resolve(id)?;
            // Safety: the cache claim keeps the slot live and the
            // engine keeps the singleton itself alive.
            return Ok(unsafe { Obj::view(raw.cast()) });
        }
        cache.remove(name);
    }

    let api = EngineApi::get();
    let cname = match CString::new(name) {
        Ok(cname) => cname,
        Err(_) => {
            log::error!("Singleton name '{name}' contains a NUL byte");
            return Err(Error::SingletonNotFound {
                name: name.to_string(),
            });
        }
    };
    // Safety: `cname` is NUL-terminated; unknown names come back null.
    let raw = unsafe { (api.singleton_lookup)(cname.as_ptr()) };
    if raw.is_null() {
        return Err(Error::SingletonNotFound {
            name: name.to_string(),
        });
    }

    // One claim pins the cache entry for the life of the process, a
    // second one goes to the caller.
    cache.insert(
        name.to_string(),
        handles::acquire(OwnershipKind::SceneOwned, raw.cast()),
    );
    // Safety: the engine owns the singleton; a view claim is correct.
    Ok(unsafe { Obj::view(raw) })
}
