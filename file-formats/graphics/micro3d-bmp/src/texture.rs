//! Palette expansion into RGBA8

use crate::error::Result;
use crate::header::{BmpHeader, PALETTE_ENTRY_SIZE, check_bounds, parse_header};

/// Decoded texture: tightly packed RGBA8 rows, top row first
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    /// Decode an 8-bit paletted BMP
    ///
    /// Palette index 0 is the color key and gets alpha 0; every other index is
    /// opaque.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = parse_header(data).map_err(|e| e.with_context("BMP header"))?;
        let rows = raster_rows(data, &header)?;
        let palette = header.palette_offset();
        let width = header.width as usize;

        let mut rgba = Vec::with_capacity(width * header.height as usize * 4);
        for row in rows {
            for &index in row {
                let entry = palette + usize::from(index) * PALETTE_ENTRY_SIZE;
                check_bounds(data, entry, 3)
                    .map_err(|e| e.with_context(&format!("palette entry {index}")))?;
                let alpha = if index == 0 { 0 } else { 0xFF };
                rgba.extend_from_slice(&[data[entry + 2], data[entry + 1], data[entry], alpha]);
            }
        }

        Ok(Self {
            width: header.width,
            height: header.height,
            rgba,
        })
    }

    /// RGBA of the pixel at column `x`, row `y` from the top
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(i..i + 4)?.try_into().ok()
    }

    /// Number of pixels with alpha 0
    pub fn transparent_pixels(&self) -> usize {
        self.rgba.chunks_exact(4).filter(|p| p[3] == 0).count()
    }

    /// Convert into an `image` buffer for export
    #[cfg(feature = "image")]
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
    }
}

/// Raster rows in display order, top row first, without padding
fn raster_rows<'a>(data: &'a [u8], header: &BmpHeader) -> Result<Vec<&'a [u8]>> {
    let stride = header.stride();
    let width = header.width as usize;
    let height = header.height as usize;
    let last_row = header.raster_offset + stride * (height - 1);
    check_bounds(data, last_row, width).map_err(|e| e.with_context("raster"))?;

    let row = |i: usize| {
        let start = header.raster_offset + i * stride;
        &data[start..start + width]
    };
    let rows = if header.bottom_up {
        (0..height).rev().map(row).collect()
    } else {
        (0..height).map(row).collect()
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BmpError;
    use pretty_assertions::assert_eq;

    /// 2x2 core-header image with a four-entry palette
    fn core_bmp() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"BM");
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&(14i32 + 12 + 16).to_le_bytes());
        data.extend_from_slice(&12i32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        // palette: BGRx
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 255, 0, 0, 255, 0, 0, 255, 0, 0, 0]);
        // bottom row first, padded to 4
        data.extend_from_slice(&[2, 3, 0, 0]);
        data.extend_from_slice(&[0, 1, 0, 0]);
        data
    }

    #[test]
    fn test_core_header_is_bottom_up() {
        let image = TextureImage::decode(&core_bmp()).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(1, 0), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(0, 1), Some([0, 255, 0, 255]));
        assert_eq!(image.pixel(1, 1), Some([0, 0, 255, 255]));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.transparent_pixels(), 1);
    }

    #[test]
    fn test_truncated_raster() {
        let mut data = core_bmp();
        data.truncate(data.len() - 3);
        let err = TextureImage::decode(&data).unwrap_err();
        assert!(matches!(err.root(), BmpError::OutOfBounds { .. }));
    }

    #[test]
    fn test_palette_entry_outside_file() {
        let mut data = core_bmp();
        let last = data.len() - 4;
        data[last] = 200;
        let err = TextureImage::decode(&data).unwrap_err();
        assert!(matches!(err.root(), BmpError::OutOfBounds { .. }));
    }
}
