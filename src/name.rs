//! Process-lifetime interned strings for hot call paths.
//!
//! A Name is copied to the host at most once; afterwards the guest passes
//! only its integer index, trading a little persistent host memory for
//! eliminating repeated string transfer. Indices are stable for the
//! process lifetime, never reused, never invalidated.

use std::collections::HashMap;

/// Append-only table of interned strings.
#[derive(Default)]
pub struct NameTable {
    values: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its stable index. Interning a value
    /// already present returns the existing index.
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&index) = self.lookup.get(value) {
            return index;
        }
        let index = self.values.len() as u32;
        self.values.push(value.to_string());
        self.lookup.insert(value.to_string(), index);
        index
    }

    pub fn resolve(&self, index: u32) -> Option<&str> {
        self.values.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
