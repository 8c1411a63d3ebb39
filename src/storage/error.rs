use std::error::Error;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum TupleError {
    InvalidArgument(String),
    IndexOutOfRange { index: i64, count: usize },
    AllocationError { size: usize },
}

impl Error for TupleError {
    fn description(&self) -> &str {
        match self {
            Self::InvalidArgument(_) => "An argument was missing or out of range",
            Self::IndexOutOfRange { .. } => "The index does not address an element of the tuple",
            Self::AllocationError { .. } => "The allocator failed to provide memory",
        }
    }
}

impl std::fmt::Display for TupleError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::IndexOutOfRange { index, count } => {
                write!(f, "index {} out of bounds for tuple of size {}", index, count)
            }
            Self::AllocationError { size } => write!(f, "failed to allocate {} bytes", size),
        }
    }
}

impl TupleError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(%msg, "[tuple] invalid argument");
        Self::InvalidArgument(msg)
    }

    pub(crate) fn index_out_of_range(index: i64, count: usize) -> Self {
        tracing::error!(index, count, "[tuple] index out of bounds");
        Self::IndexOutOfRange { index, count }
    }

    pub(crate) fn allocation(size: usize) -> Self {
        tracing::error!(size, "[tuple] allocator returned no memory");
        Self::AllocationError { size }
    }
}

pub type Result<T> = std::result::Result<T, TupleError>;
