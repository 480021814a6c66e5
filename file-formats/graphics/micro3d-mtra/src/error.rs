use micro3d_data::DataError;
use thiserror::Error;

/// Errors produced while decoding or querying an MTRA action table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MtraError {
    /// The buffer does not start with `MT`
    #[error("Invalid magic: expected 'MT', got {0:02X?}")]
    InvalidMagic([u8; 2]),

    /// Version outside 2..=5, or a non-zero byte after the version
    #[error("Unsupported MTRA version: {0}")]
    UnsupportedVersion(u8),

    /// A bone animation type above 6
    #[error("Animation type {kind} of bone {bone} is not supported")]
    UnsupportedBoneType { bone: usize, kind: u8 },

    /// A keyframe track with no keys
    #[error("Bone {bone} has an empty {track} track")]
    EmptyTrack { bone: usize, track: &'static str },

    /// Action index outside the table
    #[error("Action index {index} out of range ({count} actions)")]
    ActionOutOfRange { index: usize, count: usize },

    /// Low-level read failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Error with context information
    #[error("Context: {0}. Error: {1}")]
    Context(String, Box<Self>),
}

impl MtraError {
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

/// Result type using MtraError
pub type Result<T> = std::result::Result<T, MtraError>;
