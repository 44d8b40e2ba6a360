//! Error types for engine loading and binding-table installation.

use thiserror::Error;

/// Errors raised while locating the engine and installing its binding table.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to load engine library '{path}': {message}")]
    LoadError { path: String, message: String },

    #[error("Symbol '{symbol}' not found in engine library '{library}'")]
    SymbolNotFound { library: String, symbol: String },

    #[error("Engine ABI version mismatch: engine reports v{engine}, binding expects v{binding}")]
    AbiMismatch { engine: u32, binding: u32 },

    #[error("Engine returned a null binding table")]
    NullApiTable,

    #[error("Engine binding table is missing entry '{entry}'")]
    MissingTableEntry { entry: &'static str },

    #[error("Engine binding table is already installed")]
    AlreadyInstalled,

    #[error("Engine binding table is not installed")]
    NotInstalled,
}

impl BootstrapError {
    pub fn load_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoadError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn symbol_not_found(library: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            library: library.into(),
            symbol: symbol.into(),
        }
    }
}

/// Result alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;
