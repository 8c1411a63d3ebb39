use crate::allocator::{is_aligned, Allocator};
use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};

/// Adapts a single `(pointer, size) -> pointer` function to [`Allocator`].
///
/// | call          | meaning                                   |
/// |---------------|-------------------------------------------|
/// | `(null, N)`   | allocate `N` bytes, null on failure       |
/// | `(ptr, N)`    | resize to `N` bytes, contents preserved   |
/// | `(ptr, 0)`    | free, return value ignored                |
/// | `(null, 0)`   | reset internal state                      |
///
/// The function knows nothing about alignment. A misaligned fresh block is handed
/// straight back and reported as a failure. A misaligned resized block cannot be,
/// since the hook has already released the original: its contents are moved into
/// an aligned block from `(null, N)` instead, and if that also fails the process
/// aborts through `handle_alloc_error`.
pub struct FnHook<F> {
    hook: F,
}

impl<F> FnHook<F>
where
    F: Fn(*mut u8, usize) -> *mut u8,
{
    /// # Safety
    ///
    /// `hook` must follow the protocol above: every non-null pointer it returns for a
    /// request of `N` bytes must be valid for `N` bytes and disjoint from every other
    /// live block, until it is passed back to `hook`.
    pub unsafe fn new(hook: F) -> Self {
        FnHook { hook }
    }

    fn call(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        (self.hook)(ptr, size)
    }

    fn checked(&self, result: *mut u8, align: usize) -> Option<NonNull<u8>> {
        let ptr = NonNull::new(result)?;
        if is_aligned(ptr, align) {
            Some(ptr)
        } else {
            tracing::error!(align, "[hook] returned a misaligned block");
            self.call(ptr.as_ptr(), 0);
            None
        }
    }
}

unsafe impl<F> Allocator for FnHook<F>
where
    F: Fn(*mut u8, usize) -> *mut u8,
{
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        self.checked(self.call(ptr::null_mut(), layout.size()), layout.align())
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

        let moved = NonNull::new(self.call(ptr.as_ptr(), new_size))?;
        if is_aligned(moved, layout.align()) {
            return Some(moved);
        }

        // `ptr` is gone; the contents only live in `moved` now.
        tracing::warn!(align = layout.align(), "[hook] resize returned a misaligned block");
        let new_layout = match Layout::from_size_align(new_size, layout.align()) {
            Ok(new_layout) => new_layout,
            Err(_) => alloc::handle_alloc_error(layout),
        };
        match self.allocate(new_layout) {
            Some(block) => {
                ptr::copy_nonoverlapping(
                    moved.as_ptr(),
                    block.as_ptr(),
                    new_size.min(layout.size()),
                );
                self.call(moved.as_ptr(), 0);
                Some(block)
            }
            None => {
                self.call(moved.as_ptr(), 0);
                alloc::handle_alloc_error(new_layout)
            }
        }
    }

    unsafe fn free(&self, ptr: NonNull<u8>, _layout: Layout) {
        self.call(ptr.as_ptr(), 0);
    }

    fn reset(&self) {
        self.call(ptr::null_mut(), 0);
    }
}

impl<F> fmt::Debug for FnHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("FnHook")
    }
}

#[cfg(test)]
mod test {
    use crate::allocator::{Allocator, FnHook};
    use std::alloc::{self, Layout};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::ptr;

    const ALIGN: usize = 16;

    // realloc-style hook over the global allocator, remembering each block's size.
    fn tracking_hook<'h>(
        blocks: &'h RefCell<HashMap<usize, usize>>,
        calls: &'h RefCell<Vec<(bool, usize)>>,
    ) -> impl Fn(*mut u8, usize) -> *mut u8 + 'h {
        move |ptr: *mut u8, size: usize| {
            calls.borrow_mut().push((ptr.is_null(), size));
            let mut blocks = blocks.borrow_mut();
            unsafe {
                match (ptr.is_null(), size) {
                    (true, 0) => ptr::null_mut(),
                    (true, n) => {
                        let p = alloc::alloc(Layout::from_size_align(n, ALIGN).unwrap());
                        blocks.insert(p as usize, n);
                        p
                    }
                    (false, 0) => {
                        let old = blocks.remove(&(ptr as usize)).unwrap();
                        alloc::dealloc(ptr, Layout::from_size_align(old, ALIGN).unwrap());
                        ptr::null_mut()
                    }
                    (false, n) => {
                        let old = blocks.remove(&(ptr as usize)).unwrap();
                        let old = Layout::from_size_align(old, ALIGN).unwrap();
                        let p = alloc::realloc(ptr, old, n);
                        blocks.insert(p as usize, n);
                        p
                    }
                }
            }
        }
    }

    #[test]
    fn routes_each_event_through_the_protocol() {
        let blocks = RefCell::new(HashMap::new());
        let calls = RefCell::new(Vec::new());
        let hook = unsafe { FnHook::new(tracking_hook(&blocks, &calls)) };
        let layout = Layout::from_size_align(8, 8).unwrap();

        hook.reset();
        let p = hook.allocate(layout).expect("allocate");
        let p = unsafe { hook.resize(p, layout, 32) }.expect("resize");
        unsafe { hook.free(p, Layout::from_size_align(32, 8).unwrap()) };

        assert_eq!(
            *calls.borrow(),
            vec![(true, 0), (true, 8), (false, 32), (false, 0)]
        );
        assert!(blocks.borrow().is_empty());
    }

    #[test]
    fn misaligned_resize_relocates_contents() {
        // Fresh blocks come back aligned; moved blocks land one byte off.
        let blocks: RefCell<HashMap<usize, (*mut u8, usize)>> = RefCell::new(HashMap::new());
        let calls = RefCell::new(Vec::new());
        let relocating = |ptr: *mut u8, size: usize| -> *mut u8 {
            calls.borrow_mut().push((ptr.is_null(), size));
            let mut blocks = blocks.borrow_mut();
            unsafe {
                if size == 0 {
                    if let Some((base, len)) = blocks.remove(&(ptr as usize)) {
                        alloc::dealloc(base, Layout::from_size_align(len + 1, ALIGN).unwrap());
                    }
                    return ptr::null_mut();
                }

                let offset = if ptr.is_null() { 0 } else { 1 };
                let base = alloc::alloc(Layout::from_size_align(size + 1, ALIGN).unwrap());
                let block = base.add(offset);
                if !ptr.is_null() {
                    let (old_base, old_len) = blocks.remove(&(ptr as usize)).unwrap();
                    ptr::copy_nonoverlapping(ptr, block, old_len.min(size));
                    let old = Layout::from_size_align(old_len + 1, ALIGN).unwrap();
                    alloc::dealloc(old_base, old);
                }
                blocks.insert(block as usize, (base, size));
                block
            }
        };
        let hook = unsafe { FnHook::new(relocating) };
        let layout = Layout::from_size_align(8, 8).unwrap();

        let p = hook.allocate(layout).expect("allocate");
        unsafe { p.as_ptr().copy_from_nonoverlapping([1u8, 2, 3, 4, 5, 6, 7, 8].as_ptr(), 8) };
        let grown = unsafe { hook.resize(p, layout, 32) }.expect("resize");

        assert_eq!(grown.as_ptr() as usize % 8, 0);
        assert_eq!(
            unsafe { std::slice::from_raw_parts(grown.as_ptr(), 8) },
            &[1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(blocks.borrow().len(), 1);

        unsafe { hook.free(grown, Layout::from_size_align(32, 8).unwrap()) };
        assert!(blocks.borrow().is_empty());
        assert_eq!(
            *calls.borrow(),
            vec![(true, 8), (false, 32), (true, 32), (false, 0), (false, 0)]
        );
    }

    #[test]
    fn null_result_is_failure() {
        let hook = unsafe { FnHook::new(|_: *mut u8, _: usize| -> *mut u8 { ptr::null_mut() }) };
        assert_eq!(hook.allocate(Layout::from_size_align(8, 8).unwrap()), None);
    }

    #[test]
    fn misaligned_result_is_released() {
        let storage = RefCell::new([0u64; 4]);
        let freed = RefCell::new(Vec::new());
        let hook = unsafe {
            FnHook::new(|ptr: *mut u8, size: usize| {
                if ptr.is_null() {
                    (storage.borrow_mut().as_mut_ptr() as *mut u8).wrapping_add(1)
                } else {
                    freed.borrow_mut().push(size);
                    ptr::null_mut()
                }
            })
        };

        assert_eq!(hook.allocate(Layout::from_size_align(8, 8).unwrap()), None);
        assert_eq!(*freed.borrow(), vec![0]);
    }
}
