use crate::allocator::Allocator;
use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Events {
    pub allocations: usize,
    pub resizes: usize,
    pub frees: usize,
    pub resets: usize,
    pub failures: usize,
    pub live_bytes: usize,
}

/// Records every event passed through to the wrapped allocator.
#[derive(Debug, Default)]
pub struct Counting<A> {
    inner: A,
    events: Cell<Events>,
}

impl<A> Counting<A> {
    pub fn new(inner: A) -> Self {
        Counting {
            inner,
            events: Cell::new(Events::default()),
        }
    }

    pub fn events(&self) -> Events {
        self.events.get()
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }

    fn record(&self, update: impl FnOnce(&mut Events)) {
        let mut events = self.events.get();
        update(&mut events);
        self.events.set(events);
    }
}

unsafe impl<A: Allocator> Allocator for Counting<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let result = self.inner.allocate(layout);
        self.record(|events| match result {
            Some(_) => {
                events.allocations += 1;
                events.live_bytes += layout.size();
            }
            None => events.failures += 1,
        });
        result
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let result = self.inner.resize(ptr, layout, new_size);
        self.record(|events| match result {
            Some(_) => {
                events.resizes += 1;
                events.live_bytes = events.live_bytes.saturating_sub(layout.size()) + new_size;
            }
            None => events.failures += 1,
        });
        result
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        self.inner.free(ptr, layout);
        self.record(|events| {
            events.frees += 1;
            events.live_bytes = events.live_bytes.saturating_sub(layout.size());
        });
    }

    fn reset(&self) {
        self.inner.reset();
        self.record(|events| events.resets += 1);
    }
}
