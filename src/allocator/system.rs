use crate::allocator::Allocator;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// The global Rust allocator. Default strategy of every `TupleStore`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct System;

unsafe impl Allocator for System {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        NonNull::new(unsafe { alloc::alloc(layout) })
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
        // realloc requires the rounded-up size to stay representable.
        Layout::from_size_align(new_size, layout.align()).ok()?;
        NonNull::new(alloc::realloc(ptr.as_ptr(), layout, new_size))
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        alloc::dealloc(ptr.as_ptr(), layout)
    }
}
