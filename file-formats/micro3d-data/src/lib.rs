//! Shared building blocks for the micro3d asset decoders
//!
//! - [`reader::BitReader`]: little-endian byte reads plus LSB-first bit fields
//! - [`writer::BitWriter`]: the matching writer, used to build test assets
//! - [`fixed`]: 4096-scaled fixed-point scalars and vectors
//! - [`affine::AffineTrans`]: fixed-point 3×4 transforms
//! - [`matrix::Matrix34`]: float 3×4 transforms for poses and GPU matrices

pub mod affine;
pub mod error;
pub mod fixed;
pub mod matrix;
pub mod reader;
pub mod writer;

pub use affine::AffineTrans;
pub use error::{DataError, Result};
pub use fixed::Vec3i;
pub use matrix::Matrix34;
pub use reader::{BitReader, ByteReader};
pub use writer::BitWriter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
