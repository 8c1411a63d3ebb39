use crate::allocator::Allocator;
use crate::storage::error::{Result, TupleError};
use std::alloc::{self, Layout};
use std::cell::Cell;
use std::fmt;
use std::ptr::{self, NonNull};

const POOL_ALIGN: usize = 16;

/// Fixed-capacity pool that hands out blocks by bumping an offset.
///
/// Only the most recent block can be resized in place or given back; the whole pool
/// rewinds once no block is live. Exhaustion is reported as a failed allocation.
pub struct BumpAllocator {
    base: NonNull<u8>,
    capacity: usize,
    offset: Cell<usize>,
    // Start offset of the most recent block, while it is still live.
    top: Cell<Option<usize>>,
    live: Cell<usize>,
    high_water: Cell<usize>,
}

impl BumpAllocator {
    pub fn new(capacity: usize) -> Result<Self> {
        let layout = Self::pool_layout(capacity)?;
        let base = NonNull::new(unsafe { alloc::alloc(layout) })
            .ok_or_else(|| TupleError::allocation(capacity))?;

        Ok(BumpAllocator {
            base,
            capacity,
            offset: Cell::new(0),
            top: Cell::new(None),
            live: Cell::new(0),
            high_water: Cell::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.offset.get()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.offset.get()
    }

    pub fn live_blocks(&self) -> usize {
        self.live.get()
    }

    /// Largest `used()` seen since construction or the last `reset`.
    pub fn high_water(&self) -> usize {
        self.high_water.get()
    }

    fn pool_layout(capacity: usize) -> Result<Layout> {
        if capacity == 0 {
            return Err(TupleError::invalid_argument(
                "bump pool capacity must be greater than zero",
            ));
        }
        Layout::from_size_align(capacity, POOL_ALIGN).map_err(|_| {
            TupleError::invalid_argument(format!("bump pool capacity {} is too large", capacity))
        })
    }

    fn start_of(&self, ptr: NonNull<u8>) -> usize {
        ptr.as_ptr() as usize - self.base.as_ptr() as usize
    }

    fn bump_to(&self, end: usize) {
        self.offset.set(end);
        if end > self.high_water.get() {
            self.high_water.set(end);
        }
    }

    fn rewind(&self) {
        self.offset.set(0);
        self.top.set(None);
    }
}

unsafe impl Allocator for BumpAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }

        let base = self.base.as_ptr() as usize;
        let cursor = base.checked_add(self.offset.get())?;
        let aligned = cursor.checked_add(layout.align() - 1)? & !(layout.align() - 1);
        let start = aligned - base;
        let end = start.checked_add(layout.size())?;
        if end > self.capacity {
            tracing::debug!(
                requested = layout.size(),
                remaining = self.remaining(),
                "[bump] pool exhausted"
            );
            return None;
        }

        self.bump_to(end);
        self.top.set(Some(start));
        self.live.set(self.live.get() + 1);
        NonNull::new(unsafe { self.base.as_ptr().add(start) })
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if new_size == 0 {
            return None;
        }

        let start = self.start_of(ptr);
        if self.top.get() == Some(start) {
            let end = start.checked_add(new_size)?;
            if end > self.capacity {
                return None;
            }
            self.bump_to(end);
            return Some(ptr);
        }

        if new_size <= layout.size() {
            return Some(ptr);
        }

        let new_layout = Layout::from_size_align(new_size, layout.align()).ok()?;
        let moved = self.allocate(new_layout)?;
        ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), layout.size());
        self.free(ptr, layout);
        Some(moved)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, _layout: Layout) {
        let live = self.live.get().saturating_sub(1);
        self.live.set(live);

        if live == 0 {
            self.rewind();
        } else {
            let start = self.start_of(ptr);
            if self.top.get() == Some(start) {
                self.offset.set(start);
                self.top.set(None);
            }
        }
    }

    fn reset(&self) {
        if self.live.get() == 0 {
            self.rewind();
        }
        self.high_water.set(self.offset.get());
    }
}

impl Drop for BumpAllocator {
    fn drop(&mut self) {
        if let Ok(layout) = Self::pool_layout(self.capacity) {
            unsafe { alloc::dealloc(self.base.as_ptr(), layout) }
        }
    }
}

impl fmt::Debug for BumpAllocator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BumpAllocator")
            .field("capacity", &self.capacity)
            .field("used", &self.offset.get())
            .field("live", &self.live.get())
            .finish()
    }
}
