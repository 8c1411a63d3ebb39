use crate::allocator::{Allocator, System};
use crate::storage::error::{Result, TupleError};
use byteorder::{ByteOrder, NativeEndian};
use std::alloc::Layout;
use std::fmt;
use std::iter::Copied;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::slice;

/// An element reference. `None` is an unset slot.
pub type Slot<'a, T> = Option<&'a T>;

const HEADER_SIZE: usize = mem::size_of::<u64>();

/// Fixed-size, immutable sequence of borrowed elements.
///
/// The element count and the elements share one block obtained from the store's
/// allocator:
///
/// ```text
/// [ count: u64 (native order) | padding | count x Slot<'a, T> ]
/// ```
///
/// The block goes back to the same allocator when the tuple is dropped.
pub struct Tuple<'s, 'a, T: ?Sized, A: Allocator = System> {
    block: NonNull<u8>,
    allocator: &'s A,
    _elements: PhantomData<Slot<'a, T>>,
}

impl<'s, 'a, T: ?Sized, A: Allocator> Tuple<'s, 'a, T, A> {
    /// Allocates a tuple of `count` unset slots.
    pub(crate) fn allocate(allocator: &'s A, count: usize) -> Result<Self> {
        let layout = Self::block_layout(count)?;
        let block = allocator
            .allocate(layout)
            .ok_or_else(|| TupleError::allocation(layout.size()))?;

        unsafe {
            let header = slice::from_raw_parts_mut(block.as_ptr(), HEADER_SIZE);
            NativeEndian::write_u64(header, count as u64);

            let elements = block.as_ptr().add(Self::elements_offset()) as *mut Slot<'a, T>;
            for i in 0..count {
                elements.add(i).write(None);
            }
        }

        tracing::trace!(count, size = layout.size(), "[tuple] allocated block");
        Ok(Tuple {
            block,
            allocator,
            _elements: PhantomData,
        })
    }

    /// A count whose block size overflows is reported as an allocation failure.
    fn block_layout(count: usize) -> Result<Layout> {
        let too_large = || {
            let size = count
                .saturating_mul(mem::size_of::<Slot<'a, T>>())
                .saturating_add(HEADER_SIZE);
            TupleError::allocation(size)
        };
        let elements = Layout::array::<Slot<'a, T>>(count).map_err(|_| too_large())?;
        let (layout, offset) = Layout::new::<u64>()
            .extend(elements)
            .map_err(|_| too_large())?;
        debug_assert_eq!(offset, Self::elements_offset());
        Ok(layout.pad_to_align())
    }

    fn elements_offset() -> usize {
        let align = mem::align_of::<Slot<'a, T>>();
        (HEADER_SIZE + align - 1) & !(align - 1)
    }

    fn elements_ptr(&self) -> *mut Slot<'a, T> {
        unsafe { self.block.as_ptr().add(Self::elements_offset()) as *mut Slot<'a, T> }
    }

    /// Only used while a constructor still holds the only reference.
    pub(crate) fn slots_mut(&mut self) -> &mut [Slot<'a, T>] {
        unsafe { slice::from_raw_parts_mut(self.elements_ptr(), self.size()) }
    }

    pub fn size(&self) -> usize {
        let header = unsafe { slice::from_raw_parts(self.block.as_ptr(), HEADER_SIZE) };
        NativeEndian::read_u64(header) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn as_slice(&self) -> &[Slot<'a, T>] {
        unsafe { slice::from_raw_parts(self.elements_ptr(), self.size()) }
    }

    /// Looks up an element by signed position.
    ///
    /// A negative `index` counts back from the end, so `-1` is the last element.
    /// Any index whose magnitude reaches the size is rejected, including `-size`.
    pub fn index(&self, index: i64) -> Result<Slot<'a, T>> {
        let count = self.size();
        let magnitude = index.unsigned_abs();
        if count == 0 || magnitude >= count as u64 {
            return Err(TupleError::index_out_of_range(index, count));
        }

        let position = if index >= 0 {
            magnitude as usize
        } else {
            count - magnitude as usize
        };
        Ok(self.as_slice()[position])
    }

    /// Elements `lower..=upper`. The upper bound is inclusive.
    pub fn slice(&self, lower: i64, upper: i64) -> Result<&[Slot<'a, T>]> {
        let (lower, upper) = self.check_bounds(lower, upper)?;
        Ok(&self.as_slice()[lower..=upper])
    }

    /// All elements together with their count.
    pub fn get(&self) -> (&[Slot<'a, T>], usize) {
        (self.as_slice(), self.size())
    }

    pub fn foreach<F>(&self, mut visitor: F)
    where
        F: FnMut(Slot<'a, T>, usize),
    {
        for (i, element) in self.iter().enumerate() {
            visitor(element, i);
        }
    }

    pub fn iter(&self) -> Copied<slice::Iter<'_, Slot<'a, T>>> {
        self.as_slice().iter().copied()
    }

    /// Releases the block. Equivalent to dropping the tuple.
    pub fn destroy(self) {}

    fn check_bounds(&self, lower: i64, upper: i64) -> Result<(usize, usize)> {
        let count = self.size();
        if lower < 0 {
            return Err(TupleError::invalid_argument(format!(
                "lower bound {} must not be negative",
                lower
            )));
        }
        if lower > upper {
            return Err(TupleError::invalid_argument(format!(
                "lower bound {} is greater than upper bound {}",
                lower, upper
            )));
        }
        if upper as u64 >= count as u64 {
            return Err(TupleError::invalid_argument(format!(
                "upper bound {} is past the end of a tuple of size {}",
                upper, count
            )));
        }
        Ok((lower as usize, upper as usize))
    }
}

impl<'s, 'a, T: ?Sized, A: Allocator> Drop for Tuple<'s, 'a, T, A> {
    fn drop(&mut self) {
        let count = self.size();
        if let Ok(layout) = Self::block_layout(count) {
            tracing::trace!(count, size = layout.size(), "[tuple] freeing block");
            unsafe { self.allocator.free(self.block, layout) };
        }
    }
}

impl<'t, 's, 'a, T: ?Sized, A: Allocator> IntoIterator for &'t Tuple<'s, 'a, T, A> {
    type Item = Slot<'a, T>;
    type IntoIter = Copied<slice::Iter<'t, Slot<'a, T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, 'a, T: ?Sized + fmt::Debug, A: Allocator> fmt::Debug for Tuple<'s, 'a, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
