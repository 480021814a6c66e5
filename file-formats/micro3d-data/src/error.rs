use thiserror::Error;

/// Errors produced by the shared byte and bit readers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The buffer ended before the requested field could be read
    #[error("Unexpected end of data at offset {offset}: {needed} more byte(s) needed")]
    UnexpectedEof { offset: usize, needed: usize },

    /// A bit field wider than the reader's cache was requested
    #[error("Invalid bit field width: {0}")]
    InvalidBitWidth(u32),
}

/// Result type using DataError
pub type Result<T> = std::result::Result<T, DataError>;
