//! Marshalling bridge between a sandboxed WASM guest and a dynamic,
//! JS-shaped host.
//!
//! The guest binds each named import once ([`InteropContext::bind_import`]),
//! receiving a stable integer index, then invokes it through 16-byte
//! tagged value slots in its own linear memory
//! ([`InteropContext::invoke_import`]), so no string lookup happens per
//! call. Host objects cross the boundary as tracked integer handles the
//! guest releases explicitly. The protocol is synchronous, single
//! threaded, and call/return only.

pub mod env;

mod codec;
mod context;
mod dispatch;
mod error;
mod host;
mod marshal;
mod memory;
mod name;
mod object;
mod registry;
mod slot;

pub use codec::GuestMalloc;
pub use context::InteropContext;
pub use dispatch::{EXCEPTION_SLOT, FIRST_ARG_SLOT, RETURN_SLOT};
pub use error::InteropError;
pub use host::{HostFunction, HostObject, HostValue};
pub use marshal::{read_utf16z, write_utf16z};
pub use memory::{GuestMemory, MemoryView, PAGE_SIZE};
pub use name::NameTable;
pub use object::ObjectTracker;
pub use registry::{BoundImport, ImportEntry, ImportRegistry, TableBuilder};
pub use slot::{
    ElementSpec, FunctionSpec, ParamSpec, ValueTag, ELEMENT_TAG_OFFSET,
    FUNCTION_SPEC_WIRE_SIZE, MAX_PARAMS, SLOT_SIZE, TAG_OFFSET,
};
