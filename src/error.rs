use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted segment: {0}")]
    Corruption(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is fatal to the whole segment, as opposed to
    /// the single call that produced it
    pub fn is_segment_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Corruption(_))
    }
}
