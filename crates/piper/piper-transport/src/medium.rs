//! Memory-maps the backing file and exposes typed views onto its regions:
//! the three header atomics, the metadata blob, and per-slot component
//! slices. This is the only layer that touches the mmap directly — every
//! pointer it hands out borrows `&self` so a `Medium` cannot be dropped
//! while a slice derived from it is still alive.

use std::sync::atomic::AtomicU64;

use piper_mmap::MmapFileMut;

use crate::backer::Backer;
use crate::error::{Result, TransportError};
use crate::layout::{SESSION_OFFSET, TICKETS_OFFSET, WRITES_OFFSET};

pub struct Medium {
    mmap: MmapFileMut,
}

impl Medium {
    /// Map the file described by `backer` into this process's address space.
    /// Requires lock-free 64-bit atomics: the header counters are shared
    /// across processes via plain loads/stores on the mapped bytes, which
    /// only works if the platform's `AtomicU64` doesn't fall back to a
    /// lock table.
    pub fn open(backer: &Backer) -> Result<Self> {
        if !AtomicU64::is_lock_free() {
            return Err(TransportError::AtomicsNotLockFree);
        }
        let mmap = MmapFileMut::open_rw(backer.path())?;
        Ok(Medium { mmap })
    }

    #[inline]
    fn base(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    /// # Safety contract
    /// `WRITES_OFFSET`/`TICKETS_OFFSET`/`SESSION_OFFSET` are chosen (see
    /// `layout.rs`) to be 8-byte aligned within the mmap, which itself starts
    /// page-aligned, so the pointer casts below are always valid.
    #[inline]
    pub fn writes(&self) -> &AtomicU64 {
        unsafe { &*(self.base().add(WRITES_OFFSET) as *const AtomicU64) }
    }

    #[inline]
    pub fn tickets(&self) -> &AtomicU64 {
        unsafe { &*(self.base().add(TICKETS_OFFSET) as *const AtomicU64) }
    }

    #[inline]
    pub fn session(&self) -> &AtomicU64 {
        unsafe { &*(self.base().add(SESSION_OFFSET) as *const AtomicU64) }
    }

    pub fn metadata(&self, backer: &Backer) -> &[u8] {
        let offset = backer.metadata_offset() as usize;
        let len = backer.metadata_size() as usize;
        unsafe { std::slice::from_raw_parts(self.base().add(offset), len) }
    }

    /// Read-only view of `component(slot, component)`.
    pub fn component(&self, backer: &Backer, slot: u32, component: usize) -> &[u8] {
        let offset = backer.component_offset(slot, component) as usize;
        let len = backer.component_size(component) as usize;
        unsafe { std::slice::from_raw_parts(self.base().add(offset), len) }
    }

    /// Mutable view of `component(slot, component)`. Only the session holder
    /// may legally call this (enforced by `Transport::input`, not here).
    #[allow(clippy::mut_from_ref)]
    pub fn component_mut(&self, backer: &Backer, slot: u32, component: usize) -> &mut [u8] {
        let offset = backer.component_offset(slot, component) as usize;
        let len = backer.component_size(component) as usize;
        unsafe { std::slice::from_raw_parts_mut(self.base().add(offset) as *mut u8, len) }
    }
}
