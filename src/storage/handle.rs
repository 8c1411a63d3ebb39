use crate::allocator::{Allocator, System};
use crate::storage::error::{Result, TupleError};
use crate::storage::tuple::{Slot, Tuple};

/// A slot that either holds a live tuple or has been destroyed.
///
/// Every operation on a destroyed handle fails with `InvalidArgument`, including a
/// second `destroy`.
pub struct TupleHandle<'s, 'a, T: ?Sized, A: Allocator = System> {
    tuple: Option<Tuple<'s, 'a, T, A>>,
}

impl<'s, 'a, T: ?Sized, A: Allocator> TupleHandle<'s, 'a, T, A> {
    pub fn new(tuple: Tuple<'s, 'a, T, A>) -> Self {
        TupleHandle { tuple: Some(tuple) }
    }

    pub fn destroyed() -> Self {
        TupleHandle { tuple: None }
    }

    pub fn is_live(&self) -> bool {
        self.tuple.is_some()
    }

    pub fn tuple(&self) -> Result<&Tuple<'s, 'a, T, A>> {
        self.tuple
            .as_ref()
            .ok_or_else(|| TupleError::invalid_argument("tuple handle has been destroyed"))
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.tuple()?.size())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.tuple()?.is_empty())
    }

    pub fn index(&self, index: i64) -> Result<Slot<'a, T>> {
        self.tuple()?.index(index)
    }

    pub fn slice(&self, lower: i64, upper: i64) -> Result<&[Slot<'a, T>]> {
        self.tuple()?.slice(lower, upper)
    }

    pub fn get(&self) -> Result<(&[Slot<'a, T>], usize)> {
        Ok(self.tuple()?.get())
    }

    pub fn foreach<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(Slot<'a, T>, usize),
    {
        self.tuple()?.foreach(visitor);
        Ok(())
    }

    /// Frees the tuple and leaves the handle destroyed.
    pub fn destroy(&mut self) -> Result<()> {
        let tuple = self.tuple.take().ok_or_else(|| {
            TupleError::invalid_argument("tuple handle has already been destroyed")
        })?;
        tuple.destroy();
        Ok(())
    }

    pub fn into_inner(self) -> Option<Tuple<'s, 'a, T, A>> {
        self.tuple
    }
}

impl<'s, 'a, T: ?Sized, A: Allocator> From<Tuple<'s, 'a, T, A>> for TupleHandle<'s, 'a, T, A> {
    fn from(tuple: Tuple<'s, 'a, T, A>) -> Self {
        TupleHandle::new(tuple)
    }
}

#[cfg(test)]
mod test {
    use crate::allocator::{Counting, System};
    use crate::storage::error::{Result, TupleError};
    use crate::storage::handle::TupleHandle;
    use crate::storage::tuple_store::TupleStore;

    #[test]
    fn live_handle_delegates() -> Result<()> {
        let store = TupleStore::default();
        let handle = TupleHandle::from(store.from_arguments(&["A", "B", "C"])?);

        assert!(handle.is_live());
        assert_eq!(handle.size()?, 3);
        assert!(!handle.is_empty()?);
        assert_eq!(handle.index(-1)?, Some("C"));
        assert_eq!(handle.slice(0, 1)?, &[Some("A"), Some("B")]);
        assert_eq!(handle.get()?.1, 3);

        let mut count = 0;
        handle.foreach(|_, _| count += 1)?;
        assert_eq!(count, 3);

        Ok(())
    }

    #[test]
    fn destroyed_handle_rejects_everything() -> Result<()> {
        let store = TupleStore::new(Counting::new(System));
        let mut handle = TupleHandle::from(store.from_arguments(&["A"])?);

        handle.destroy()?;
        assert!(!handle.is_live());
        assert_eq!(store.allocator().events().frees, 1);

        assert_matches!(handle.size(), Err(TupleError::InvalidArgument(_)));
        assert_matches!(handle.is_empty(), Err(TupleError::InvalidArgument(_)));
        assert_matches!(handle.index(0), Err(TupleError::InvalidArgument(_)));
        assert_matches!(handle.slice(0, 0), Err(TupleError::InvalidArgument(_)));
        assert_matches!(handle.get(), Err(TupleError::InvalidArgument(_)));
        assert_matches!(handle.foreach(|_, _| ()), Err(TupleError::InvalidArgument(_)));
        assert_matches!(handle.destroy(), Err(TupleError::InvalidArgument(_)));
        assert_eq!(store.allocator().events().frees, 1);

        Ok(())
    }

    #[test]
    fn never_constructed_handle() {
        let handle: TupleHandle<str> = TupleHandle::destroyed();
        assert_matches!(handle.size(), Err(TupleError::InvalidArgument(_)));
        assert!(handle.into_inner().is_none());
    }
}
