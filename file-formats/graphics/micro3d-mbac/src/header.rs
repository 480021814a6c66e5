//! MBAC header: magic, version, section formats and element counts

use log::*;
use micro3d_data::ByteReader;

use crate::error::{MbacError, Result};

pub const MAX_VERTICES: usize = 21845;
pub const MAX_TEXTURES: usize = 16;
pub const MAX_PATTERNS: usize = 33;
pub const MAX_COLORS: usize = 256;

/// Decoded MBAC header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MbacHeader {
    pub version: u8,
    /// 1: plain 16-bit, 2: bit-packed runs
    pub vertex_format: u8,
    /// 0: none, 1: plain 16-bit, 2: compressed
    pub normal_format: u8,
    /// Textured polygon encoding, 1..=3; colored polygons need 3
    pub polygon_format: u8,
    pub bone_format: u8,
    pub num_vertices: usize,
    pub num_poly_t3: usize,
    pub num_poly_t4: usize,
    pub num_bones: usize,
    pub num_poly_c3: usize,
    pub num_poly_c4: usize,
    pub num_textures: usize,
    pub num_patterns: usize,
    pub num_colors: usize,
}

impl MbacHeader {
    /// Bytes at the end of version 4+ files that carry no model data
    pub const TRAILER_SIZE: usize = 20;

    pub fn has_normals(&self) -> bool {
        self.normal_format != 0
    }

    pub fn num_textured(&self) -> usize {
        self.num_poly_t3 + self.num_poly_t4
    }

    pub fn num_colored(&self) -> usize {
        self.num_poly_c3 + self.num_poly_c4
    }

    /// Index count of the textured polygons after quads are split
    pub fn textured_index_count(&self) -> usize {
        self.num_poly_t3 * 3 + self.num_poly_t4 * 6
    }

    /// Index count of all polygons after quads are split
    pub fn index_count(&self) -> usize {
        self.textured_index_count() + self.num_poly_c3 * 3 + self.num_poly_c4 * 6
    }

    /// Trailing bytes expected after the bone table
    pub fn trailer_size(&self) -> usize {
        if self.version >= 4 {
            Self::TRAILER_SIZE
        } else {
            0
        }
    }
}

fn check_limit(field: &'static str, value: usize, max: usize) -> Result<()> {
    if value > max {
        return Err(MbacError::LimitExceeded { field, value, max });
    }
    Ok(())
}

pub fn parse_header(reader: &mut impl ByteReader) -> Result<MbacHeader> {
    let magic = [reader.read_u8()?, reader.read_u8()?];
    if &magic != b"MB" {
        return Err(MbacError::InvalidMagic(magic));
    }
    let version = reader.read_u8()?;
    if reader.read_u8()? != 0 || !(2..=5).contains(&version) {
        return Err(MbacError::UnsupportedVersion(version));
    }

    let (vertex_format, normal_format, polygon_format, bone_format) = if version > 3 {
        (
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
        )
    } else {
        (1, 0, 1, 1)
    };

    if bone_format != 1 {
        return Err(MbacError::UnsupportedFormat {
            kind: "bone",
            value: bone_format,
        });
    }
    if !(1..=2).contains(&vertex_format) {
        return Err(MbacError::UnsupportedFormat {
            kind: "vertex",
            value: vertex_format,
        });
    }
    if normal_format > 2 {
        return Err(MbacError::UnsupportedFormat {
            kind: "normal",
            value: normal_format,
        });
    }
    if !(1..=3).contains(&polygon_format) {
        return Err(MbacError::UnsupportedFormat {
            kind: "polygon",
            value: polygon_format,
        });
    }

    let num_vertices = reader.read_u16_le()? as usize;
    let num_poly_t3 = reader.read_u16_le()? as usize;
    let num_poly_t4 = reader.read_u16_le()? as usize;
    let num_bones = reader.read_u16_le()? as usize;

    let (num_poly_c3, num_poly_c4, num_textures, num_patterns, num_colors) = if polygon_format < 3
    {
        (0, 0, 1, 1, 0)
    } else {
        (
            reader.read_u16_le()? as usize,
            reader.read_u16_le()? as usize,
            reader.read_u16_le()? as usize,
            reader.read_u16_le()? as usize,
            reader.read_u16_le()? as usize,
        )
    };

    check_limit("vertices", num_vertices, MAX_VERTICES)?;
    check_limit("textures", num_textures, MAX_TEXTURES)?;
    check_limit("patterns", num_patterns, MAX_PATTERNS)?;
    check_limit("colors", num_colors, MAX_COLORS)?;

    let header = MbacHeader {
        version,
        vertex_format,
        normal_format,
        polygon_format,
        bone_format,
        num_vertices,
        num_poly_t3,
        num_poly_t4,
        num_bones,
        num_poly_c3,
        num_poly_c4,
        num_textures,
        num_patterns,
        num_colors,
    };
    debug!(
        "MBAC v{}: formats v{}/n{}/p{}, {} vertices, {} bones, {}+{} textured, {}+{} colored, {} textures, {} patterns",
        version,
        vertex_format,
        normal_format,
        polygon_format,
        num_vertices,
        num_bones,
        num_poly_t3,
        num_poly_t4,
        num_poly_c3,
        num_poly_c4,
        num_textures,
        num_patterns
    );
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro3d_data::BitReader;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version_3_uses_default_formats() {
        let data = [
            b'M', b'B', 3, 0, // magic, version
            4, 0, 1, 0, 0, 0, 1, 0, // vertices, t3, t4, bones
        ];
        let header = parse_header(&mut BitReader::new(&data)).unwrap();
        assert_eq!(header.vertex_format, 1);
        assert_eq!(header.normal_format, 0);
        assert_eq!(header.polygon_format, 1);
        assert_eq!(header.num_textures, 1);
        assert_eq!(header.num_patterns, 1);
        assert_eq!(header.index_count(), 3);
        assert_eq!(header.trailer_size(), 0);
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let data = [b'M', b'T', 3, 0];
        assert_eq!(
            parse_header(&mut BitReader::new(&data)),
            Err(MbacError::InvalidMagic(*b"MT"))
        );
        let data = [b'M', b'B', 6, 0];
        assert_eq!(
            parse_header(&mut BitReader::new(&data)),
            Err(MbacError::UnsupportedVersion(6))
        );
        let data = [b'M', b'B', 4, 1];
        assert_eq!(
            parse_header(&mut BitReader::new(&data)),
            Err(MbacError::UnsupportedVersion(4))
        );
    }

    #[test]
    fn test_rejects_bone_format() {
        let data = [b'M', b'B', 4, 0, 1, 0, 1, 2];
        assert_eq!(
            parse_header(&mut BitReader::new(&data)),
            Err(MbacError::UnsupportedFormat {
                kind: "bone",
                value: 2
            })
        );
    }

    #[test]
    fn test_texture_limit() {
        let data = [
            b'M', b'B', 4, 0, 1, 0, 3, 1, // formats
            0, 0, 0, 0, 0, 0, 0, 0, // vertices, t3, t4, bones
            0, 0, 0, 0, 17, 0, 1, 0, 0, 0, // c3, c4, textures, patterns, colors
        ];
        assert_eq!(
            parse_header(&mut BitReader::new(&data)),
            Err(MbacError::LimitExceeded {
                field: "textures",
                value: 17,
                max: 16
            })
        );
    }
}
