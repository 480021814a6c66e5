//! BMP file and DIB header parsing

use log::*;
use micro3d_data::{BitReader, ByteReader};

use crate::error::{BmpError, Result};

/// Size of the `BITMAPFILEHEADER`
pub const FILE_HEADER_SIZE: usize = 14;

/// `BITMAPCOREHEADER`
pub const DIB_CORE: i32 = 12;

/// `BITMAPINFOHEADER`
pub const DIB_INFO: i32 = 40;

/// Bytes per palette entry (blue, green, red, reserved)
pub const PALETTE_ENTRY_SIZE: usize = 4;

/// Header fields needed to locate and orient the pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    /// Offset of the first raster row from the start of the file
    pub raster_offset: usize,
    /// Size of the DIB header, 12 or 40
    pub dib_size: i32,
    pub width: u32,
    pub height: u32,
    /// Rows are stored last row first
    pub bottom_up: bool,
}

impl BmpHeader {
    /// Offset of the palette, right after the DIB header
    pub fn palette_offset(&self) -> usize {
        FILE_HEADER_SIZE + self.dib_size as usize
    }

    /// Row size in the file, padded to four bytes
    pub fn stride(&self) -> usize {
        (self.width as usize).next_multiple_of(4)
    }
}

/// Parse and validate the file and DIB headers
pub fn parse_header(data: &[u8]) -> Result<BmpHeader> {
    let mut reader = BitReader::new(data);
    let magic = [reader.read_u8()?, reader.read_u8()?];
    if &magic != b"BM" {
        return Err(BmpError::InvalidMagic(magic));
    }
    // file size and reserved words
    reader.skip(8)?;
    let raster_offset = reader.read_i32_le()?;
    let dib_size = reader.read_i32_le()?;

    let (width, height, bottom_up) = match dib_size {
        DIB_CORE => {
            let width = i64::from(reader.read_u16_le()?);
            let height = i64::from(reader.read_u16_le()?);
            // planes
            reader.skip(2)?;
            check_bit_depth(reader.read_u16_le()?)?;
            (width, height, true)
        }
        DIB_INFO => {
            let width = i64::from(reader.read_i32_le()?);
            let height = i64::from(reader.read_i32_le()?);
            reader.skip(2)?;
            check_bit_depth(reader.read_u16_le()?)?;
            let compression = reader.read_i32_le()?;
            if compression != 0 {
                return Err(BmpError::UnsupportedCompression(compression));
            }
            (width, height.abs(), height >= 0)
        }
        other => return Err(BmpError::UnsupportedHeader(other)),
    };

    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(BmpError::InvalidDimensions { width, height });
    };
    if w == 0 || h == 0 {
        return Err(BmpError::InvalidDimensions { width, height });
    }
    let raster_offset = usize::try_from(raster_offset).map_err(|_| BmpError::OutOfBounds {
        offset: 0,
        size: data.len(),
    })?;

    let header = BmpHeader {
        raster_offset,
        dib_size,
        width: w,
        height: h,
        bottom_up,
    };
    debug!(
        "BMP {}x{}, DIB {} bytes, raster at {}, {}",
        w,
        h,
        dib_size,
        raster_offset,
        if bottom_up { "bottom-up" } else { "top-down" }
    );
    Ok(header)
}

fn check_bit_depth(bpp: u16) -> Result<()> {
    if bpp == 8 {
        Ok(())
    } else {
        Err(BmpError::UnsupportedBitDepth(bpp))
    }
}

/// Check that `size` bytes at `offset` lie inside `data`
pub fn check_bounds(data: &[u8], offset: usize, size: usize) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= data.len() => Ok(()),
        _ => {
            error!(
                "Range {}+{} is out of bounds of a {} byte file",
                offset,
                size,
                data.len()
            );
            Err(BmpError::OutOfBounds { offset, size })
        }
    }
}
