//! Fixed-size tuples of borrowed elements, packed into a single block from a
//! pluggable allocator.
//!
//! ```
//! use tuplestore::{tuple, TupleStore};
//!
//! let store = TupleStore::default();
//! let animals = tuple!(store; "Dogs", "Cats", "Birds", "Fish")?;
//!
//! assert_eq!(animals.index(-1)?, Some("Fish"));
//! assert_eq!(animals.slice(1, 2)?, &[Some("Cats"), Some("Birds")]);
//! # Ok::<(), tuplestore::TupleError>(())
//! ```

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

pub mod allocator;
pub mod storage;

pub use allocator::{Allocator, BumpAllocator, Counting, Events, FnHook, System};
pub use storage::error::{Result, TupleError};
pub use storage::handle::TupleHandle;
pub use storage::tuple::{Slot, Tuple};
pub use storage::tuple_store::TupleStore;

/// Builds a tuple from a list of references: `tuple!(store; a, b, c)`.
#[macro_export]
macro_rules! tuple {
    ($store:expr; $($value:expr),+ $(,)?) => {
        $store.from_arguments(&[$($value),+])
    };
}
