use micro3d_data::DataError;
use thiserror::Error;

/// Errors that the BMP decoder can produce
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BmpError {
    /// The buffer does not start with `BM`
    #[error("Invalid magic: expected 'BM', got {0:02X?}")]
    InvalidMagic([u8; 2]),

    /// DIB header size other than 12 (core) or 40 (info)
    #[error("Unsupported DIB header size: {0}")]
    UnsupportedHeader(i32),

    /// Anything but 8 bits per pixel
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    /// Compressed pixel data
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(i32),

    /// Zero or negative width, zero height
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    /// Raster or palette data exceeds the file
    #[error("Data at offset {offset} with size {size} exceeds the file")]
    OutOfBounds { offset: usize, size: usize },

    /// Low-level read failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Error with context information
    #[error("Context: {0}. Error: {1}")]
    Context(String, Box<Self>),
}

impl BmpError {
    /// Add context information to an error
    pub fn with_context(self, context: &str) -> Self {
        Self::Context(context.to_owned(), Box::new(self))
    }

    /// The innermost error, with all context layers removed
    pub fn root(&self) -> &Self {
        match self {
            Self::Context(_, inner) => inner.root(),
            other => other,
        }
    }
}

/// Result type using BmpError
pub type Result<T> = std::result::Result<T, BmpError>;
