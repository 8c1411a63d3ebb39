pub mod error;
pub mod handle;
pub mod tuple;
pub mod tuple_store;
