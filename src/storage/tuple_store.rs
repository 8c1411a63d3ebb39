use crate::allocator::{Allocator, System};
use crate::storage::error::{Result, TupleError};
use crate::storage::tuple::{Slot, Tuple};
use std::mem;

/// Builds tuples out of memory from a single injected allocator.
///
/// Tuples borrow the store, so the allocator can only be replaced or shut down
/// once every tuple it produced has been released.
#[derive(Debug)]
pub struct TupleStore<A: Allocator = System> {
    allocator: A,
}

impl Default for TupleStore<System> {
    fn default() -> Self {
        TupleStore::new(System)
    }
}

impl<A: Allocator> TupleStore<A> {
    pub fn new(allocator: A) -> Self {
        allocator.reset();
        TupleStore { allocator }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Installs `allocator` for every later construction and hands back the old one.
    /// Both are reset: the outgoing one to flush its state, the incoming one to start clean.
    pub fn set_allocator(&mut self, allocator: A) -> A {
        self.allocator.reset();
        let previous = mem::replace(&mut self.allocator, allocator);
        self.allocator.reset();
        previous
    }

    pub fn shutdown(self) -> A {
        self.allocator.reset();
        self.allocator
    }

    /// A tuple of `size` unset slots.
    pub fn construct<'a, T: ?Sized>(&self, size: usize) -> Result<Tuple<'_, 'a, T, A>> {
        Tuple::allocate(&self.allocator, size)
    }

    /// A tuple of `size` slots filled from a `None`-terminated sequence.
    ///
    /// Copying stops at the terminator or after `size` elements, whichever comes
    /// first; slots past the terminator stay unset. A sequence that runs out before
    /// either is an error.
    pub fn from_elements<'a, T: ?Sized>(
        &self,
        elements: &[Slot<'a, T>],
        size: usize,
    ) -> Result<Tuple<'_, 'a, T, A>> {
        let filled = elements
            .iter()
            .take(size)
            .take_while(|element| element.is_some())
            .count();
        if filled < size && filled == elements.len() {
            return Err(TupleError::invalid_argument(format!(
                "element sequence ended after {} of {} elements without a terminator",
                filled, size
            )));
        }

        let mut tuple = self.construct(size)?;
        tuple.slots_mut()[..filled].copy_from_slice(&elements[..filled]);
        Ok(tuple)
    }

    /// A tuple holding exactly `values`, in order. See also the `tuple!` macro.
    pub fn from_arguments<'a, T: ?Sized>(&self, values: &[&'a T]) -> Result<Tuple<'_, 'a, T, A>> {
        if values.is_empty() {
            return Err(TupleError::invalid_argument(
                "element count must be greater than zero",
            ));
        }

        let mut tuple = self.construct(values.len())?;
        for (slot, value) in tuple.slots_mut().iter_mut().zip(values) {
            *slot = Some(*value);
        }
        Ok(tuple)
    }

    /// A new tuple holding `source[lower..=upper]`. `source` may come from any store.
    pub fn from_slice<'a, T: ?Sized, B: Allocator>(
        &self,
        source: &Tuple<'_, 'a, T, B>,
        lower: i64,
        upper: i64,
    ) -> Result<Tuple<'_, 'a, T, A>> {
        let elements = source.slice(lower, upper)?;

        let mut tuple = self.construct(elements.len())?;
        tuple.slots_mut().copy_from_slice(elements);
        Ok(tuple)
    }
}
