//! Shared test fixture: a fake guest backed by a real linear memory and
//! a bump allocator, standing in for a WASM instance's exports.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use tether::{GuestMalloc, GuestMemory, InteropContext};

/// Offsets below this are scratch space tests use for slots, name
/// strings, and parameter buffers; allocations start here.
pub const HEAP_BASE: u32 = 0x1000;

pub struct FakeGuest {
    pub memory: GuestMemory,
    pub heap: Rc<Cell<u32>>,
}

impl FakeGuest {
    pub fn new() -> Self {
        FakeGuest {
            memory: GuestMemory::with_pages(1),
            heap: Rc::new(Cell::new(HEAP_BASE)),
        }
    }

    /// Bump allocator over the guest heap, growing memory on demand.
    pub fn malloc(&self) -> GuestMalloc {
        let memory = self.memory.clone();
        let heap = self.heap.clone();
        Box::new(move |size| {
            let ptr = (heap.get() + 7) & !7;
            let end = ptr.checked_add(size).ok_or("allocation overflow")?;
            while end as usize > memory.len() {
                if memory.grow(1) < 0 {
                    return Err("out of guest memory".into());
                }
            }
            heap.set(end);
            Ok(ptr)
        })
    }

    pub fn context(&self) -> InteropContext {
        InteropContext::new(self.memory.clone(), self.malloc())
    }
}
