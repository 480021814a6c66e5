//! Decoder for micro3d MBAC model files
//!
//! An MBAC file stores a skinned mesh: vertex positions (optionally normals),
//! textured and colored polygons with per-polygon material flags, a pattern
//! table for switchable polygon visibility, and a bone hierarchy in which
//! each bone rigidly owns a contiguous range of vertices.
//!
//! ```rust,no_run
//! use micro3d_mbac::{BlendMode, Model};
//!
//! let data = std::fs::read("model.mbac")?;
//! let model = Model::parse(&data)?;
//! println!("{} vertices, {} bones", model.vertex_count(), model.bones().len());
//! for (offset, count, double_sided) in model.textured_ranges(BlendMode::Normal, 0) {
//!     println!("draw {count} indices at {offset} (cull: {})", !double_sided);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bone;
pub mod error;
pub mod geometry;
pub mod header;
pub mod model;
pub mod pattern;
pub mod polygon;
pub mod skinning;

pub use bone::Bone;
pub use error::{MbacError, Result};
pub use header::MbacHeader;
pub use model::Model;
pub use pattern::{PatternEntry, pattern_mask};
pub use polygon::{BlendMode, Material, Polygon};
pub use skinning::{SkinnedMesh, compose_bones, skin};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
