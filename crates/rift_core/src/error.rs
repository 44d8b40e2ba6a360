//! Error types for the binding core.

use thiserror::Error;

use rift_sys::codes::{ErrorCode, VariantTag};
use rift_sys::error::BootstrapError;

use crate::handles::HandleError;

/// Errors surfaced by the binding core.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("engine call failed: {0}")]
    Engine(ErrorCode),

    #[error("variant holds {found}, expected {expected}")]
    VariantType {
        expected: VariantTag,
        found: VariantTag,
    },

    #[error("engine refused to create an object of class '{class}'")]
    CreateFailed { class: &'static str },

    #[error("class '{class}' is already registered")]
    AlreadyRegistered { class: &'static str },

    #[error("registering class '{class}' under parent '{parent}' would form a cycle")]
    ParentCycle {
        class: &'static str,
        parent: &'static str,
    },

    #[error("class '{class}' extends '{parent}', which is not registered and not an engine class")]
    UnresolvedParent { class: String, parent: String },

    #[error("engine singleton '{name}' does not exist")]
    SingletonNotFound { name: String },

    #[error("class '{class}' declares {declared} virtual methods; the dispatch table holds {max}")]
    VirtualTableFull {
        class: &'static str,
        declared: usize,
        max: usize,
    },

    #[error("objects of class '{class}' are reference counted and cannot be freed manually")]
    CannotFree { class: &'static str },

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("failed to read config '{path}': {message}")]
    ConfigRead { path: String, message: String },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result alias used throughout the binding core.
pub type Result<T> = std::result::Result<T, Error>;

/// Converts an engine status code into a `Result`.
#[inline]
pub fn engine_result(code: ErrorCode) -> Result<()> {
    if code.is_ok() {
        Ok(())
    } else {
        Err(Error::Engine(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_result_maps_codes() {
        assert!(engine_result(ErrorCode::Ok).is_ok());
        match engine_result(ErrorCode::Busy) {
            Err(Error::Engine(code)) => assert_eq!(code, ErrorCode::Busy),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn handle_errors_convert() {
        let err: Error = HandleError::Null.into();
        assert!(matches!(err, Error::Handle(HandleError::Null)));
    }
}
