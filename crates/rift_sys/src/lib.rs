//! # rift_sys - Rift Engine C ABI
//!
//! Low-level surface of the Rift Engine bindings: the raw `#[repr(C)]`
//! types mirroring `rift_abi.h`, the validated binding table, and the
//! bootstrap routes that install it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌───────────────────┐
//! │   Rift Engine    │─────▶│  RawEngineTable   │
//! │ (librift_engine) │      │  (Option entries) │
//! └──────────────────┘      └─────────┬─────────┘
//!                                     │ validate once
//!                                     ▼
//! ┌──────────────────┐      ┌───────────────────┐
//! │  rift_core and   │◀─────│    EngineApi      │
//! │ generated classes│      │ (process-wide)    │
//! └──────────────────┘      └───────────────────┘
//! ```
//!
//! Two bootstrap routes feed the table in:
//! - [`bootstrap::load_engine`]: the host embeds the engine as a dynamic
//!   library and pulls the table out of it.
//! - [`bootstrap::bind_raw_table`]: the engine loads the binding and
//!   pushes the table across its entry point.
//!
//! The `mock-engine` feature adds an in-process engine implementing the
//! whole table, used by the test suites of the higher-level crates.

pub mod api;
pub mod bootstrap;
pub mod codes;
pub mod error;
pub mod types;

#[cfg(feature = "mock-engine")]
pub mod mock;

pub use api::{method_bind, try_method_bind, EngineApi, MethodBind};
pub use codes::{ErrorCode, VariantTag};
pub use error::{BootstrapError, Result};
pub use types::{RawEngineTable, RawMethodBind, RawObject, RawVariant};
pub use types::{RIFT_ABI_VERSION, RIFT_MAX_CALL_ARGS};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{EngineApi, MethodBind};
    pub use crate::bootstrap::load_engine;
    pub use crate::codes::{ErrorCode, VariantTag};
    pub use crate::error::BootstrapError;
    pub use crate::types::{RawEngineTable, RawObject, RawVariant};
}
