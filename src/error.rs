//! Interop error taxonomy
//!
//! Two families with different recovery stories:
//! - Lookup failures (`SymbolNotFound`) are recoverable per call.
//! - Protocol violations (double release, use after release, attach
//!   misuse) are programming defects. They surface as typed errors and
//!   are logged at error level; continuing past one risks corrupting
//!   shared runtime state, so callers must treat them as fatal to the
//!   offending operation.

use crate::value::ValueKind;

/// Kind of managed-side symbol a lookup was resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Method,
    StaticMethod,
    Field,
}

impl core::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Method => write!(f, "method"),
            Self::StaticMethod => write!(f, "static method"),
            Self::Field => write!(f, "field"),
        }
    }
}

/// Errors produced by the binding layer and the managed runtime model
#[derive(Debug, Clone, PartialEq)]
pub enum InteropError {
    /// Class/method/field resolution failed
    SymbolNotFound { kind: SymbolKind, name: String },
    /// A transient handle was used outside its call or thread, or a
    /// symbol was applied to an object of the wrong class
    InvalidHandle { reason: &'static str },
    /// Second release of the same durable handle
    DoubleRelease,
    /// Handle operation on an already-released durable handle
    UseAfterRelease,
    /// attach() while the thread already holds a live attachment
    AlreadyAttached,
    /// Handle operation from a thread with no live attachment
    NotAttached,
    /// Call argument count does not match the method signature
    ArityMismatch { expected: usize, got: usize },
    /// Value kind does not match the declared field or parameter kind
    TypeMismatch { expected: ValueKind, got: ValueKind },
    /// Object id is stale: the slot was collected or reused
    NoSuchObject,
}

impl InteropError {
    /// Whether this error is a protocol violation rather than an
    /// ordinary per-call failure
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::DoubleRelease | Self::UseAfterRelease | Self::AlreadyAttached | Self::NotAttached
        )
    }
}

impl core::fmt::Display for InteropError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SymbolNotFound { kind, name } => {
                write!(f, "{} not found: {}", kind, name)
            }
            Self::InvalidHandle { reason } => write!(f, "invalid handle: {}", reason),
            Self::DoubleRelease => write!(f, "durable handle released twice"),
            Self::UseAfterRelease => write!(f, "durable handle used after release"),
            Self::AlreadyAttached => write!(f, "thread is already attached to the runtime"),
            Self::NotAttached => write!(f, "thread is not attached to the runtime"),
            Self::ArityMismatch { expected, got } => {
                write!(f, "expected {} arguments, got {}", expected, got)
            }
            Self::TypeMismatch { expected, got } => {
                write!(f, "expected {} value, got {}", expected, got)
            }
            Self::NoSuchObject => write!(f, "object was collected or its id is stale"),
        }
    }
}

impl std::error::Error for InteropError {}

/// Crate-wide result alias
pub type Result<T> = core::result::Result<T, InteropError>;
