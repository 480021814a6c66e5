use micro3d_data::DataError;
use thiserror::Error;

/// Errors produced while decoding or validating an MBAC model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MbacError {
    /// The buffer does not start with `MB`
    #[error("Invalid magic: expected 'MB', got {0:02X?}")]
    InvalidMagic([u8; 2]),

    /// Version outside 2..=5, or a non-zero byte after the version
    #[error("Unsupported MBAC version: {0}")]
    UnsupportedVersion(u8),

    /// A vertex, normal, polygon or bone format code that has no decoder
    #[error("Unsupported {kind} format: {value}")]
    UnsupportedFormat { kind: &'static str, value: u8 },

    /// A header count above the format hard limit
    #[error("Too many {field}: {value} (limit {max})")]
    LimitExceeded {
        field: &'static str,
        value: usize,
        max: usize,
    },

    /// A vertex run in packed vertex data is longer than the vertices left
    #[error("Vertex run of {run} exceeds the {remaining} vertices left")]
    VertexRunOverflow { run: usize, remaining: usize },

    /// A material value has bits set that the polygon format reserves
    #[error("Unexpected material {material:#06X} (reserved mask {mask:#06X})")]
    ReservedMaterialBits { material: u32, mask: u32 },

    /// A polygon references a vertex past the vertex count
    #[error("Vertex index {index} out of range ({count} vertices)")]
    IndexOutOfRange { index: u32, count: usize },

    /// A colored polygon references a palette entry past the color count
    #[error("Color index {index} out of range ({count} colors)")]
    ColorOutOfRange { index: u32, count: usize },

    /// A compressed normal escape code selects no pooled normal
    #[error("Invalid pooled normal code: {0}")]
    InvalidNormal(u32),

    /// A bone's parent is below -1 or does not precede the bone
    #[error("Bone {bone} has invalid parent {parent}")]
    InvalidParent { bone: usize, parent: i32 },

    /// Bone vertex counts do not add up to the model's vertex count
    #[error("Bones cover {bones} vertices, but the model has {vertices}")]
    BoneVertexMismatch { bones: usize, vertices: usize },

    /// The pattern table assigns more polygons than the model declares
    #[error("Pattern table assigns more {kind} polygons than the {count} declared")]
    PatternOverflow { kind: &'static str, count: usize },

    /// A bucket table no longer matches the index buffer
    #[error("Bucket lengths sum to {buckets}, but {kind} indices number {indices}")]
    BucketMismatch {
        kind: &'static str,
        buckets: usize,
        indices: usize,
    },

    /// Low-level read failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Error with context information
    #[error("Context: {0}. Error: {1}")]
    Context(String, Box<Self>),
}

impl MbacError {
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

/// Result type using MbacError
pub type Result<T> = std::result::Result<T, MbacError>;
