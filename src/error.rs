use std::fmt::Debug;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum KdIndexError {
    /// The tree could not be built (empty dataset, invalid dimensionality or parameters).
    #[error("Construction error: {0}")]
    Construction(String),

    /// The query was rejected before any search took place.
    #[error("Query error: {0}")]
    Query(String),

    /// A serialized index could not be read back.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The node arena hit its configured capacity.
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// The underlying stream failed for a reason other than running out of bytes.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, KdIndexError>;
