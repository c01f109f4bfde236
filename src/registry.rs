//! Named import registry and bind-time resolution.
//!
//! The host installs nested tables of functions under module names; the
//! guest resolves a `module` + dotted import name pair once at bind time
//! and receives a stable integer index. Invocation never re-resolves by
//! name, so the string lookup cost is paid once per distinct call site.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::InteropError;
use crate::host::{HostFunction, HostValue};
use crate::slot::FunctionSpec;

/// One entry in an import table: a callable leaf or a nested table.
pub enum ImportEntry {
    Func(HostFunction),
    Table(HashMap<String, ImportEntry>),
}

/// Host-side table of named module bindings.
#[derive(Default)]
pub struct ImportRegistry {
    modules: HashMap<String, HashMap<String, ImportEntry>>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a module's import table. Re-registering the same module
    /// name replaces it.
    pub fn register_module(&mut self, name: &str, table: HashMap<String, ImportEntry>) {
        self.modules.insert(name.to_string(), table);
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Resolve a dotted import name within a module to a callable.
    ///
    /// Splits on `.` and walks the nested tables; every intermediate
    /// segment must be a table and the final segment a function.
    pub fn resolve(&self, module: &str, import: &str) -> Result<HostFunction, InteropError> {
        let fail = |reason: String| InteropError::Resolution {
            path: format!("{module}::{import}"),
            reason,
        };

        let mut current = self
            .modules
            .get(module)
            .ok_or_else(|| fail(format!("module '{module}' is not registered")))?;

        let segments: Vec<&str> = import.split('.').collect();
        let (last, intermediate) = segments
            .split_last()
            .ok_or_else(|| fail("empty import name".into()))?;

        for segment in intermediate {
            match current.get(*segment) {
                Some(ImportEntry::Table(table)) => current = table,
                Some(ImportEntry::Func(_)) => {
                    return Err(fail(format!("'{segment}' is a function, not a table")))
                }
                None => return Err(fail(format!("'{segment}' was not found"))),
            }
        }
        match current.get(*last) {
            Some(ImportEntry::Func(func)) => Ok(Rc::clone(func)),
            Some(ImportEntry::Table(_)) => {
                Err(fail(format!("'{last}' is a table, not callable")))
            }
            None => Err(fail(format!("'{last}' was not found"))),
        }
    }
}

/// Fluent construction of nested import tables.
///
/// # Examples
///
/// ```
/// use tether::{HostValue, TableBuilder};
///
/// let table = TableBuilder::new()
///     .func("time", |_args| Ok(HostValue::Number(0.0)))
///     .table("cpu", TableBuilder::new()
///         .func("limit", |_args| Ok(HostValue::Number(20.0))))
///     .build();
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Default)]
pub struct TableBuilder {
    entries: HashMap<String, ImportEntry>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn func<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, String> + 'static,
    {
        self.entries
            .insert(name.to_string(), ImportEntry::Func(Rc::new(func)));
        self
    }

    pub fn table(mut self, name: &str, table: TableBuilder) -> Self {
        self.entries
            .insert(name.to_string(), ImportEntry::Table(table.build()));
        self
    }

    pub fn build(self) -> HashMap<String, ImportEntry> {
        self.entries
    }
}

/// A resolved import with its bound signature. Created once by the
/// resolver and stored in an append-only list; the guest retains only
/// `index`.
pub struct BoundImport {
    pub index: u32,
    /// `module::importName`, kept for diagnostics.
    pub full_name: String,
    pub spec: FunctionSpec,
    pub callable: HostFunction,
}
