mod bump;
mod counting;
mod hook;
mod system;

pub use bump::BumpAllocator;
pub use counting::{Counting, Events};
pub use hook::FnHook;
pub use system::System;

use std::alloc::Layout;
use std::ptr::NonNull;

/// Memory strategy behind a `TupleStore`.
///
/// Mirrors the `(pointer, size) -> pointer` hook protocol: `allocate` is `(null, N)`,
/// `resize` is `(ptr, N)`, `free` is `(ptr, 0)` and `reset` is `(null, 0)`.
///
/// # Safety
///
/// A block returned by `allocate` or `resize` must be valid for reads and writes of
/// the requested size, aligned to the requested alignment, and must not overlap any
/// other live block until it is handed back through `resize` or `free`.
pub unsafe trait Allocator {
    /// Returns `None` when the request cannot be met. Zero-sized requests always fail.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Moves or grows `ptr` to `new_size` bytes, keeping `min(old, new)` bytes of content.
    /// On `None` the original block is untouched and still live.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block of this allocator, obtained with `layout`.
    unsafe fn resize(&self, ptr: NonNull<u8>, layout: Layout, new_size: usize)
        -> Option<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` must be a live block of this allocator, obtained with `layout`.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);

    /// Flushes internal bookkeeping. Must leave live blocks valid.
    fn reset(&self) {}
}

unsafe impl<'r, A: Allocator + ?Sized> Allocator for &'r A {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        (**self).resize(ptr, layout, new_size)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).free(ptr, layout)
    }

    fn reset(&self) {
        (**self).reset()
    }
}

fn is_aligned(ptr: NonNull<u8>, align: usize) -> bool {
    ptr.as_ptr() as usize % align == 0
}
