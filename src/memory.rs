//! Typed overlay onto the guest's linear memory.
//!
//! [`GuestMemory`] is the shared byte buffer; [`MemoryView`] is a typed
//! accessor snapshot over it. Growing the memory invalidates every view
//! created before the growth; each component takes a fresh view before
//! its next access, and using a stale one is a fatal error.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// 64KB WASM pages.
pub const PAGE_SIZE: usize = 65536;

const MAX_MEMORY: usize = 4 * 1024 * 1024 * 1024;

struct MemoryInner {
    buf: Vec<u8>,
    generation: u64,
}

/// A shared, interior-mutable handle to the guest's linear memory.
///
/// Cloning is cheap; all clones refer to the same buffer. The generation
/// counter advances on every growth so views can detect staleness.
#[derive(Clone)]
pub struct GuestMemory {
    inner: Rc<RefCell<MemoryInner>>,
}

impl GuestMemory {
    /// Create a memory of `pages` zeroed 64KB pages.
    pub fn with_pages(pages: u32) -> Self {
        GuestMemory {
            inner: Rc::new(RefCell::new(MemoryInner {
                buf: vec![0; pages as usize * PAGE_SIZE],
                generation: 0,
            })),
        }
    }

    /// Current size in bytes.
    pub fn len(&self) -> usize {
        self.inner.borrow().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size in pages.
    pub fn size_pages(&self) -> u32 {
        (self.len() / PAGE_SIZE) as u32
    }

    /// Growth generation; advances by one on every successful [`grow`].
    ///
    /// [`grow`]: GuestMemory::grow
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    /// Grow by `pages` pages. Returns the old page count, or -1 if the
    /// 4GB cap would be exceeded. Invalidates all existing views.
    pub fn grow(&self, pages: u32) -> i32 {
        let mut inner = self.inner.borrow_mut();
        let old_pages = inner.buf.len() / PAGE_SIZE;
        let new_len = (old_pages + pages as usize) * PAGE_SIZE;
        if new_len > MAX_MEMORY {
            return -1;
        }
        inner.buf.resize(new_len, 0);
        inner.generation += 1;
        old_pages as i32
    }

    /// Create a typed view over the current buffer.
    pub fn view(&self) -> MemoryView {
        MemoryView {
            mem: self.clone(),
            generation: self.generation(),
        }
    }
}

/// Typed accessors over the guest memory, valid until the next growth.
///
/// Accessors are addressed by byte offset and align the offset down to
/// the access width (typed-array indexing: a 32-bit access at offset `p`
/// reads element `p >> 2`). Out-of-range offsets and stale views are
/// fatal; neither is recoverable at this layer.
pub struct MemoryView {
    mem: GuestMemory,
    generation: u64,
}

impl MemoryView {
    fn inner(&self) -> Ref<'_, MemoryInner> {
        let inner = self.mem.inner.borrow();
        assert_eq!(
            inner.generation, self.generation,
            "stale memory view: guest memory grew since this view was created"
        );
        inner
    }

    fn inner_mut(&self) -> RefMut<'_, MemoryInner> {
        let inner = self.mem.inner.borrow_mut();
        assert_eq!(
            inner.generation, self.generation,
            "stale memory view: guest memory grew since this view was created"
        );
        inner
    }

    fn load<const N: usize>(&self, offset: u32) -> [u8; N] {
        let inner = self.inner();
        let offset = (offset as usize) & !(N - 1);
        let mut out = [0u8; N];
        out.copy_from_slice(&inner.buf[offset..offset + N]);
        out
    }

    fn store<const N: usize>(&self, offset: u32, bytes: [u8; N]) {
        let mut inner = self.inner_mut();
        let offset = (offset as usize) & !(N - 1);
        inner.buf[offset..offset + N].copy_from_slice(&bytes);
    }

    pub fn u8(&self, offset: u32) -> u8 {
        self.load::<1>(offset)[0]
    }

    pub fn i8(&self, offset: u32) -> i8 {
        self.u8(offset) as i8
    }

    pub fn u16(&self, offset: u32) -> u16 {
        u16::from_le_bytes(self.load::<2>(offset))
    }

    pub fn i16(&self, offset: u32) -> i16 {
        self.u16(offset) as i16
    }

    pub fn u32(&self, offset: u32) -> u32 {
        u32::from_le_bytes(self.load::<4>(offset))
    }

    pub fn i32(&self, offset: u32) -> i32 {
        self.u32(offset) as i32
    }

    pub fn f32(&self, offset: u32) -> f32 {
        f32::from_bits(self.u32(offset))
    }

    pub fn f64(&self, offset: u32) -> f64 {
        f64::from_bits(self.u64(offset))
    }

    /// Read a 64-bit value as two 32-bit half-words.
    ///
    /// The high half is widened before the shift so no bits are lost.
    pub fn u64(&self, offset: u32) -> u64 {
        let lo = self.u32(offset) as u64;
        let hi = self.u32(offset + 4) as u64;
        (hi << 32) | lo
    }

    pub fn set_u8(&self, offset: u32, value: u8) {
        self.store::<1>(offset, [value]);
    }

    pub fn set_i8(&self, offset: u32, value: i8) {
        self.set_u8(offset, value as u8);
    }

    pub fn set_u16(&self, offset: u32, value: u16) {
        self.store::<2>(offset, value.to_le_bytes());
    }

    pub fn set_i16(&self, offset: u32, value: i16) {
        self.set_u16(offset, value as u16);
    }

    pub fn set_u32(&self, offset: u32, value: u32) {
        self.store::<4>(offset, value.to_le_bytes());
    }

    pub fn set_i32(&self, offset: u32, value: i32) {
        self.set_u32(offset, value as u32);
    }

    pub fn set_f32(&self, offset: u32, value: f32) {
        self.set_u32(offset, value.to_bits());
    }

    pub fn set_f64(&self, offset: u32, value: f64) {
        self.set_u64(offset, value.to_bits());
    }

    /// Write a 64-bit value as two 32-bit half-words.
    pub fn set_u64(&self, offset: u32, value: u64) {
        self.set_u32(offset, value as u32);
        self.set_u32(offset + 4, (value >> 32) as u32);
    }
}
