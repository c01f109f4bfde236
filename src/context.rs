//! Process-scoped interop state for one guest instance.
//!
//! All mutable registries (import tables, bound call sites, tracked
//! objects, interned names) hang off one [`InteropContext`] so several
//! independent guest instances can coexist in a host process. The three
//! `*_import`/`release_object_reference` methods are the fixed host
//! import surface an embedding engine wires into the guest's single
//! generic import namespace.

use std::collections::HashMap;
use std::rc::Rc;

use crate::codec::{Codec, GuestMalloc};
use crate::dispatch;
use crate::error::InteropError;
use crate::host::HostValue;
use crate::marshal;
use crate::memory::GuestMemory;
use crate::name::NameTable;
use crate::object::ObjectTracker;
use crate::registry::{BoundImport, ImportEntry, ImportRegistry};
use crate::slot::{FunctionSpec, ParamSpec};

/// One guest instance's view of the host.
pub struct InteropContext {
    pub(crate) memory: GuestMemory,
    pub(crate) malloc: GuestMalloc,
    pub(crate) imports: ImportRegistry,
    pub(crate) bound: Vec<Rc<BoundImport>>,
    pub(crate) objects: ObjectTracker,
    pub(crate) names: NameTable,
}

impl InteropContext {
    /// Build a context over the guest's linear memory and its exported
    /// allocator.
    pub fn new(memory: GuestMemory, malloc: GuestMalloc) -> Self {
        InteropContext {
            memory,
            malloc,
            imports: ImportRegistry::new(),
            bound: Vec::new(),
            objects: ObjectTracker::new(),
            names: NameTable::new(),
        }
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    pub fn objects(&self) -> &ObjectTracker {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectTracker {
        &mut self.objects
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Number of bound call sites.
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Install (or replace) a module's import table.
    pub fn register_module(&mut self, name: &str, table: HashMap<String, ImportEntry>) {
        self.imports.register_module(name, table);
    }

    /// Resolve and bind an import, returning its stable index.
    ///
    /// Binding the same logical import twice yields two independent
    /// indices; each call site binds once and caches its own.
    pub fn bind(
        &mut self,
        module: &str,
        import: &str,
        spec: FunctionSpec,
    ) -> Result<u32, InteropError> {
        let callable = self.imports.resolve(module, import)?;
        let index = self.bound.len() as u32;
        self.bound.push(Rc::new(BoundImport {
            index,
            full_name: format!("{module}::{import}"),
            spec,
            callable,
        }));
        Ok(index)
    }

    /// Decode the slot at `slot` against `spec`.
    pub fn decode_slot(
        &mut self,
        slot: u32,
        spec: &ParamSpec,
    ) -> Result<HostValue, InteropError> {
        self.codec().decode(slot, spec)
    }

    /// Encode `value` into the slot at `slot` per `spec`.
    pub fn encode_slot(
        &mut self,
        slot: u32,
        spec: &ParamSpec,
        value: &HostValue,
    ) -> Result<(), InteropError> {
        self.codec().encode(slot, spec, value)
    }

    fn codec(&mut self) -> Codec<'_> {
        Codec {
            memory: &self.memory,
            objects: &mut self.objects,
            malloc: &mut self.malloc,
        }
    }

    // --- host-exported import namespace -------------------------------

    /// `bind_import(modulePtr, importPtr, specPtr) -> i32`
    ///
    /// Reads two zero-terminated UTF-16 strings and a signature wire form
    /// from guest memory, resolves, and returns the bound index. Negative
    /// means failure; the guest treats it as "feature unavailable".
    pub fn bind_import(&mut self, module_ptr: u32, import_ptr: u32, spec_ptr: u32) -> i32 {
        let view = self.memory.view();
        let parsed = marshal::read_utf16z(&view, module_ptr).and_then(|module| {
            let import = marshal::read_utf16z(&view, import_ptr)?;
            let spec = FunctionSpec::read(&view, spec_ptr)?;
            Ok((module, import, spec))
        });
        let result = parsed.and_then(|(module, import, spec)| self.bind(&module, &import, spec));
        match result {
            Ok(index) => index as i32,
            Err(e) => {
                log::warn!("bind_import failed: {e}");
                -1
            }
        }
    }

    /// `invoke_import(index, paramsBufferPtr) -> i32`
    ///
    /// 1 on success (return slot written), 0 on exception (exception slot
    /// written). See [`crate::dispatch`] for the buffer layout.
    pub fn invoke_import(&mut self, index: i32, params_ptr: u32) -> i32 {
        dispatch::invoke(self, index, params_ptr)
    }

    /// `release_object_reference(handle)`
    ///
    /// Idempotent; releasing an unknown handle is a no-op.
    pub fn release_object_reference(&mut self, handle: i32) {
        if handle >= 0 {
            self.objects.release(handle as u32);
        }
    }

    /// `intern_name(strPtr) -> i32`
    ///
    /// Copies a reused string to the host once and returns its stable
    /// Name index; negative means the string was unreadable.
    pub fn intern_name(&mut self, str_ptr: u32) -> i32 {
        match marshal::read_utf16z(&self.memory.view(), str_ptr) {
            Ok(value) => self.names.intern(&value) as i32,
            Err(e) => {
                log::warn!("intern_name failed: {e}");
                -1
            }
        }
    }
}
