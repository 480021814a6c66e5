use micro3d_bmp::BmpError;
use micro3d_mbac::MbacError;
use micro3d_mtra::MtraError;
use thiserror::Error;

/// Malformed or unsupported asset bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Model: {0}")]
    Model(#[from] MbacError),

    #[error("Animation: {0}")]
    Animation(#[from] MtraError),

    #[error("Texture: {0}")]
    Texture(#[from] BmpError),
}

/// A caller passed an index, value or command the engine cannot accept
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Action index {index} out of range ({count} actions)")]
    ActionIndex { index: usize, count: usize },

    #[error("Texture index {index} out of range ({count} textures)")]
    TextureIndex { index: usize, count: usize },

    #[error("Pattern index {index} out of range ({count} patterns)")]
    PatternIndex { index: usize, count: usize },

    #[error("Texture list is empty")]
    EmptyTextureList,

    #[error("Affine index {index} out of range ({count} transforms)")]
    AffineIndex { index: usize, count: usize },

    #[error("Unsupported command list version: {0:#010X}")]
    UnsupportedCommandListVersion(u32),

    #[error("Invalid command {command:#010X} at word {offset}")]
    InvalidCommand { offset: usize, command: u32 },

    #[error("Command at word {offset} needs {needed} words, {available} left")]
    TruncatedCommand {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid point sprite flags {flags} at word {offset}")]
    SpriteFlags { offset: usize, flags: i32 },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid effect: {0}")]
    InvalidEffect(String),

    /// An effect's specular map must be a sphere-map texture
    #[error("Texture is not a sphere map")]
    SphereTextureExpected,

    /// Figures cannot be drawn with a sphere-map texture
    #[error("Sphere-map texture cannot be bound to a figure")]
    SphereTextureRejected,
}

/// Failure reported by the GPU backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuBackendError {
    #[error("Texture upload failed: {0}")]
    Upload(String),

    #[error("Draw failed: {0}")]
    Draw(String),

    #[error("GPU context lost")]
    ContextLost,
}

/// Error type of the render crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Backend(#[from] GpuBackendError),

    /// Error with context information
    #[error("Context: {0}. Error: {1}")]
    Context(String, Box<Self>),
}

impl RenderError {
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

    /// The argument error at the root, if that is what this is
    pub fn as_argument(&self) -> Option<&ArgumentError> {
        match self.root() {
            Self::Argument(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MbacError> for RenderError {
    fn from(e: MbacError) -> Self {
        Self::Format(FormatError::Model(e))
    }
}

impl From<MtraError> for RenderError {
    fn from(e: MtraError) -> Self {
        match e.root() {
            MtraError::ActionOutOfRange { index, count } => Self::Argument(ArgumentError::ActionIndex {
                index: *index,
                count: *count,
            }),
            _ => Self::Format(FormatError::Animation(e)),
        }
    }
}

impl From<BmpError> for RenderError {
    fn from(e: BmpError) -> Self {
        Self::Format(FormatError::Texture(e))
    }
}

/// Result type using RenderError
pub type Result<T> = std::result::Result<T, RenderError>;
