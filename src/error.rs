//! Error taxonomy for the interop boundary.
//!
//! Everything attributable to a single call is contained to that call's
//! success/exception pair; nothing here auto-retries. Resolution errors
//! can only occur at bind time, never mid-tick for an already-bound
//! import.

use thiserror::Error;

use crate::slot::ValueTag;

/// Failures crossing the guest/host boundary.
#[derive(Debug, Error)]
pub enum InteropError {
    /// A dotted import path did not resolve to a callable at bind time.
    #[error("unresolved import '{path}': {reason}")]
    Resolution { path: String, reason: String },

    /// A slot's tag did not match the statically expected type.
    #[error("type mismatch: expected {expected:?}, found {actual:?}")]
    TagMismatch { expected: ValueTag, actual: ValueTag },

    /// A slot carried a tag byte outside the known range.
    #[error("unknown value tag {0:#04x}")]
    UnknownTag(u8),

    /// A host value could not be encoded against its declared type.
    #[error("encode: {0}")]
    Encode(String),

    /// The resolved host function raised during execution.
    #[error("host function failed: {0}")]
    HostFunction(String),

    /// The guest presented an object handle with no tracked object.
    #[error("dangling object handle {0}")]
    DanglingHandle(u32),

    /// A guest string buffer held malformed UTF-16.
    #[error("invalid UTF-16 string at {0:#x}")]
    InvalidString(u32),

    /// An array header described a span outside the guest memory.
    #[error("array out of bounds: base {base:#x}, count {count}")]
    ArrayBounds { base: u32, count: u32 },

    /// A function signature violated a structural constraint (arity,
    /// nested arrays, void parameters).
    #[error("invalid signature: {0}")]
    Signature(String),

    /// The guest-exported allocator refused an allocation.
    #[error("guest allocation failed: {0}")]
    Alloc(String),
}
