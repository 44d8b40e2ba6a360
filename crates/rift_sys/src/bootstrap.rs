//! Engine discovery and binding-table installation.
//!
//! Two bootstrap routes exist. Host applications that embed the engine as
//! a dynamic library call [`load_engine`]; environments where the engine
//! loads the binding instead (editor plugins, exported builds) hand the
//! table pointer straight to [`bind_raw_table`].

use std::path::Path;
use std::sync::OnceLock;

use libloading::{Library, Symbol};

use crate::api::EngineApi;
use crate::error::{BootstrapError, Result};
use crate::types::RawEngineTable;

/// Symbol the engine library exports to hand over its binding table.
pub const ENGINE_API_SYMBOL: &str = "rift_engine_get_api";

/// Signature of [`ENGINE_API_SYMBOL`].
pub type GetEngineApiFn = unsafe extern "C" fn() -> *const RawEngineTable;

// The engine library stays loaded for the rest of the process; every
// validated function pointer points into it.
static ENGINE_LIBRARY: OnceLock<Library> = OnceLock::new();

/// Loads the engine dynamic library at `path` and installs its binding
/// table as the process-wide engine API.
pub fn load_engine(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    let library = unsafe { Library::new(path) }
        .map_err(|e| BootstrapError::load_error(path.display().to_string(), e.to_string()))?;

    let get_api: Symbol<GetEngineApiFn> = unsafe { library.get(b"rift_engine_get_api\0") }
        .map_err(|_| {
            BootstrapError::symbol_not_found(path.display().to_string(), ENGINE_API_SYMBOL)
        })?;

    // Safety: the symbol has the exported signature; the table it returns
    // lives in the engine's static storage.
    let table = unsafe { get_api() };
    unsafe { bind_raw_table(table) }?;

    ENGINE_LIBRARY
        .set(library)
        .map_err(|_| BootstrapError::AlreadyInstalled)?;

    log::info!("Loaded Rift engine library from '{}'", path.display());
    Ok(())
}

/// Installs an engine binding table received from the host side.
///
/// # Safety
///
/// `table` must point to a [`RawEngineTable`] that stays valid and
/// unchanged for the rest of the process.
pub unsafe fn bind_raw_table(table: *const RawEngineTable) -> Result<()> {
    if table.is_null() {
        return Err(BootstrapError::NullApiTable);
    }
    EngineApi::install(&*table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_engine_missing_file_fails() {
        let result = load_engine("/nonexistent/librift_engine.so");
        assert!(matches!(result, Err(BootstrapError::LoadError { .. })));
    }

    #[test]
    fn bind_null_table_fails() {
        let result = unsafe { bind_raw_table(std::ptr::null()) };
        assert!(matches!(result, Err(BootstrapError::NullApiTable)));
    }
}
