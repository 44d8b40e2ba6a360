//! Bootstrap failure paths, in a process with no engine attached.
//!
//! These live alone on purpose: installing the in-process engine
//! anywhere in this binary would make the missing-engine path
//! unreachable.

use rift_core::config::BindingConfig;
use rift_core::error::Error;
use rift_core::runtime;
use rift_sys::error::BootstrapError;

#[test]
fn initialize_without_an_engine_reports_it() {
    match runtime::initialize(BindingConfig::default()) {
        Err(Error::Bootstrap(BootstrapError::NotInstalled)) => {}
        other => panic!("expected NotInstalled, got {other:?}"),
    }
}

#[test]
fn initialize_with_a_bad_library_path_reports_it() {
    let config = BindingConfig {
        engine_library: Some("/nonexistent/librift_engine.so".into()),
        ..BindingConfig::default()
    };
    match runtime::initialize(config) {
        Err(Error::Bootstrap(BootstrapError::LoadError { path, .. })) => {
            assert!(path.contains("librift_engine"));
        }
        other => panic!("expected LoadError, got {other:?}"),
    }
}
