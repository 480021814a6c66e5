//! Decoder for the 8-bit paletted BMP textures used by micro3d assets
//!
//! Only uncompressed 8 bits-per-pixel images with a `BITMAPCOREHEADER` or
//! `BITMAPINFOHEADER` are accepted. Pixels expand to RGBA8 with palette
//! index 0 fully transparent.
//!
//! ```rust,no_run
//! use micro3d_bmp::TextureImage;
//!
//! let data = std::fs::read("skin.bmp")?;
//! let texture = TextureImage::decode(&data)?;
//! println!("{}x{}", texture.width, texture.height);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod header;
pub mod texture;

pub use error::{BmpError, Result};
pub use header::{BmpHeader, parse_header};
pub use texture::TextureImage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
