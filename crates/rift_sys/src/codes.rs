//! Engine status codes and variant type tags.

use std::fmt;

// ============================================================================
// Error Codes
// ============================================================================

/// Status code returned by fallible engine calls.
///
/// The numeric values are fixed by the engine ABI and never reused.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok = 0,
    Unavailable = 1,
    Unconfigured = 2,
    Unauthorised = 3,
    NotFound = 4,
    Busy = 5,
    InvalidParameter = 6,
    InvalidData = 7,
    CantAcquireResource = 8,
    CantCreate = 9,
    CantRead = 10,
    CantWrite = 11,
    OutOfMemory = 12,
    Timeout = 13,
    Bug = 14,
}

impl ErrorCode {
    /// Decodes a raw engine status code.
    ///
    /// Codes outside the known range come from a newer engine than this
    /// binding was built against and are reported as [`ErrorCode::Bug`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Ok,
            1 => Self::Unavailable,
            2 => Self::Unconfigured,
            3 => Self::Unauthorised,
            4 => Self::NotFound,
            5 => Self::Busy,
            6 => Self::InvalidParameter,
            7 => Self::InvalidData,
            8 => Self::CantAcquireResource,
            9 => Self::CantCreate,
            10 => Self::CantRead,
            11 => Self::CantWrite,
            12 => Self::OutOfMemory,
            13 => Self::Timeout,
            14 => Self::Bug,
            other => {
                log::warn!("Unknown engine status code {other}, treating as Bug");
                Self::Bug
            }
        }
    }

    #[inline]
    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short human-readable description, suitable for log lines.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unavailable => "requested operation is unavailable",
            Self::Unconfigured => "engine subsystem is not configured",
            Self::Unauthorised => "caller is not authorised",
            Self::NotFound => "requested item was not found",
            Self::Busy => "resource is busy",
            Self::InvalidParameter => "invalid parameter",
            Self::InvalidData => "invalid data",
            Self::CantAcquireResource => "cannot acquire resource",
            Self::CantCreate => "cannot create object",
            Self::CantRead => "cannot read",
            Self::CantWrite => "cannot write",
            Self::OutOfMemory => "out of memory",
            Self::Timeout => "operation timed out",
            Self::Bug => "internal engine error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.to_raw())
    }
}

// ============================================================================
// Variant Tags
// ============================================================================

/// Dynamic type tag of an engine variant.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantTag {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    StringName = 5,
    Array = 6,
    Dictionary = 7,
    Object = 8,
}

impl VariantTag {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Nil),
            1 => Some(Self::Bool),
            2 => Some(Self::Int),
            3 => Some(Self::Float),
            4 => Some(Self::String),
            5 => Some(Self::StringName),
            6 => Some(Self::Array),
            7 => Some(Self::Dictionary),
            8 => Some(Self::Object),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    /// Whether values of this tag live in an engine-allocated box
    /// (as opposed to fitting inline in a call frame slot).
    #[inline]
    pub const fn is_boxed(self) -> bool {
        matches!(
            self,
            Self::String | Self::StringName | Self::Array | Self::Dictionary | Self::Object
        )
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "Nil",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::StringName => "StringName",
            Self::Array => "Array",
            Self::Dictionary => "Dictionary",
            Self::Object => "Object",
        };
        f.write_str(name)
    }
}
