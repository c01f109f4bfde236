//! Reference tracking for host objects held by the guest.
//!
//! The guest owns the lifetime: a handle is minted on an object's first
//! crossing and freed only by explicit guest release. Forgetting to
//! release leaks the entry for the process lifetime; that is the guest's
//! responsibility, not a host-side detection feature.

use std::collections::HashMap;

use crate::error::InteropError;
use crate::host::HostObject;

/// Assigns and recycles integer handles for host objects referenced by
/// the guest. Handles are minted from 1 and never reused; handle 0 is
/// never issued.
pub struct ObjectTracker {
    entries: HashMap<u32, HostObject>,
    next_handle: u32,
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTracker {
    pub fn new() -> Self {
        ObjectTracker {
            entries: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Number of live tracked objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the object's existing handle, or mint and record a new one.
    ///
    /// At most one live handle exists per object; the object carries its
    /// handle in a hidden marker so repeated crossings are O(1).
    pub fn track_or_reuse(&mut self, object: &HostObject) -> u32 {
        if let Some(handle) = object.tracking_handle() {
            if self.entries.contains_key(&handle) {
                return handle;
            }
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        object.set_tracking_handle(Some(handle));
        self.entries.insert(handle, object.clone());
        log::trace!("tracked host object as handle {handle}");
        handle
    }

    /// Look up a handle the guest presented.
    ///
    /// A miss means the guest held a dangling handle; this is a protocol
    /// violation, logged loudly, and fails the surrounding call rather
    /// than crashing the host.
    pub fn resolve(&self, handle: u32) -> Result<HostObject, InteropError> {
        match self.entries.get(&handle) {
            Some(object) => Ok(object.clone()),
            None => {
                log::error!("guest presented dangling object handle {handle}");
                Err(InteropError::DanglingHandle(handle))
            }
        }
    }

    /// Idempotent removal. Clears the object's handle marker if it still
    /// points at this handle, so a later crossing of the same object
    /// mints a fresh handle rather than reusing a stale one.
    pub fn release(&mut self, handle: u32) {
        if let Some(object) = self.entries.remove(&handle) {
            if object.tracking_handle() == Some(handle) {
                object.set_tracking_handle(None);
            }
            log::trace!("released object handle {handle}");
        }
    }
}
