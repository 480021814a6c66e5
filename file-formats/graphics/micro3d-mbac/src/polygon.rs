//! Polygon records and the colored / textured polygon sections
//!
//! Quads are split on load into the triangles `a,b,c` and `c,b,d`, so every
//! polygon carries three or six indices. Each index has five bytes of vertex
//! data alongside it: `u, v` (or `r, g`), then `light`, `specular` and
//! `transparent` for textured polygons, or `b, light, specular` for colored
//! ones.

use log::*;
use micro3d_data::{BitReader, ByteReader};

use crate::error::{MbacError, Result};
use crate::header::MbacHeader;

bitflags::bitflags! {
    /// Polygon material flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Material: u32 {
        /// Color key transparency for texel 0
        const TRANSPARENT = 1;
        const BLEND_HALF = 2;
        const BLEND_ADD = 4;
        const BLEND_SUB = 6;
        /// Drawn without back-face culling
        const DOUBLE_FACE = 16;
        const LIGHTING = 32;
        /// Sphere-map specular
        const SPECULAR = 64;
    }
}

impl Material {
    pub fn blend_mode(self) -> BlendMode {
        BlendMode::from_bucket(((self.bits() & Self::BLEND_SUB.bits()) >> 1) as usize)
    }

    pub fn is_double_sided(self) -> bool {
        self.contains(Self::DOUBLE_FACE)
    }

    fn light_byte(self) -> u8 {
        u8::from(self.contains(Self::LIGHTING))
    }

    fn specular_byte(self) -> u8 {
        u8::from(self.contains(Self::SPECULAR))
    }

    fn transparent_byte(self) -> u8 {
        u8::from(self.contains(Self::TRANSPARENT))
    }
}

/// Compositing rule of a polygon, in bucket order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Half = 1,
    Add = 2,
    Sub = 3,
}

impl BlendMode {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Half, Self::Add, Self::Sub];

    /// Bucket index, 0..4
    pub fn bucket(self) -> usize {
        self as usize
    }

    /// Inverse of [`BlendMode::bucket`]; values are taken modulo 4
    pub fn from_bucket(bucket: usize) -> Self {
        Self::ALL[bucket & 3]
    }

    /// Material bit encoding: `bucket << 1`
    pub fn material_bits(self) -> u32 {
        (self as u32) << 1
    }

    pub fn is_blended(self) -> bool {
        self != Self::Normal
    }
}

/// A decoded triangle or split quad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub material: Material,
    /// Visibility mask: shown under pattern `p` iff `pattern & p == pattern`
    pub pattern: i32,
    /// Texture slot, textured polygons only
    pub face: usize,
    /// Three indices, or six for a split quad
    pub indices: Vec<u32>,
    /// Five bytes per index
    pub vertex_data: Vec<u8>,
}

impl Polygon {
    pub const DATA_STRIDE: usize = 5;

    pub fn blend_mode(&self) -> BlendMode {
        self.material.blend_mode()
    }

    pub fn is_double_sided(&self) -> bool {
        self.material.is_double_sided()
    }

    pub fn is_quad(&self) -> bool {
        self.indices.len() == 6
    }

    /// Whether the polygon is shown under `pattern`
    pub fn is_visible(&self, pattern: i32) -> bool {
        self.pattern & pattern == self.pattern
    }
}

/// Corner order of a split quad
const QUAD_SPLIT: [usize; 6] = [0, 1, 2, 2, 1, 3];
const TRIANGLE: [usize; 3] = [0, 1, 2];

fn check_indices(corners: &[u32], count: usize) -> Result<()> {
    match corners.iter().find(|&&i| i as usize >= count) {
        Some(&index) => Err(MbacError::IndexOutOfRange { index, count }),
        None => Ok(()),
    }
}

fn check_material(material: u32, mask: u32) -> Result<()> {
    if material & mask != 0 {
        return Err(MbacError::ReservedMaterialBits { material, mask });
    }
    Ok(())
}

/// Assemble a polygon from its corners and per-corner data
fn build(material: u32, corners: &[u32], per_corner: &[[u8; 5]]) -> Polygon {
    let order: &[usize] = if corners.len() == 4 {
        &QUAD_SPLIT
    } else {
        &TRIANGLE
    };
    let mut indices = Vec::with_capacity(order.len());
    let mut vertex_data = Vec::with_capacity(order.len() * Polygon::DATA_STRIDE);
    for &corner in order {
        indices.push(corners[corner]);
        vertex_data.extend_from_slice(&per_corner[corner]);
    }
    Polygon {
        material: Material::from_bits_retain(material),
        pattern: 0,
        face: 0,
        indices,
        vertex_data,
    }
}

fn read_corner_bits(reader: &mut BitReader<'_>, bits: u32, n: usize) -> Result<[u32; 4]> {
    let mut corners = [0u32; 4];
    for corner in corners.iter_mut().take(n) {
        *corner = reader.read_ubits(bits)?;
    }
    Ok(corners)
}

/// Read the colored polygon section (polygon format 3 only)
pub fn read_colored(reader: &mut BitReader<'_>, header: &MbacHeader) -> Result<Vec<Polygon>> {
    let material_bits = u32::from(reader.read_u8()?);
    let index_bits = u32::from(reader.read_u8()?);
    let color_bits = u32::from(reader.read_u8()?);
    let color_id_bits = u32::from(reader.read_u8()?);
    let unknown = reader.read_u8()?;
    if unknown != 0 {
        warn!("Colored polygon header: unknown byte = {unknown}");
    }

    let mut palette = Vec::with_capacity(header.num_colors * 3);
    for _ in 0..header.num_colors * 3 {
        palette.push(reader.read_ubits(color_bits)? as u8);
    }

    let mut polygons = Vec::with_capacity(header.num_colored());
    for i in 0..header.num_colored() {
        let corner_count = if i < header.num_poly_c3 { 3 } else { 4 };
        let material = reader.read_ubits(material_bits)? << 1;
        check_material(material, 0xFC09)?;
        let corners = read_corner_bits(reader, index_bits, corner_count)?;
        let corners = &corners[..corner_count];
        check_indices(corners, header.num_vertices)?;

        let color_id = reader.read_ubits(color_id_bits)?;
        let base = color_id as usize * 3;
        let Some(rgb) = palette.get(base..base + 3) else {
            return Err(MbacError::ColorOutOfRange {
                index: color_id,
                count: header.num_colors,
            });
        };
        let flags = Material::from_bits_retain(material);
        let data = [
            rgb[0],
            rgb[1],
            rgb[2],
            flags.light_byte(),
            flags.specular_byte(),
        ];
        polygons.push(build(material, corners, &[data; 4]));
    }
    trace!("read {} colored polygons", polygons.len());
    Ok(polygons)
}

/// Read the textured polygon section in the header's polygon format
pub fn read_textured(reader: &mut BitReader<'_>, header: &MbacHeader) -> Result<Vec<Polygon>> {
    let polygons = match header.polygon_format {
        1 => read_textured_v1(reader, header)?,
        2 => {
            let material_bits = u32::from(reader.read_u8()?);
            let index_bits = u32::from(reader.read_u8()?);
            read_textured_packed(reader, header, material_bits, index_bits, 7, 0xFF88)?
        }
        3 => {
            let material_bits = reader.read_ubits(8)?;
            let index_bits = reader.read_ubits(8)?;
            let uv_bits = reader.read_ubits(8)?;
            let unknown = reader.read_ubits(8)?;
            if unknown != 0 {
                warn!("Textured polygon header: unknown byte = {unknown}");
            }
            read_textured_packed(reader, header, material_bits, index_bits, uv_bits, 0xFC08)?
        }
        other => {
            return Err(MbacError::UnsupportedFormat {
                kind: "polygon",
                value: other,
            });
        }
    };
    trace!("read {} textured polygons", polygons.len());
    Ok(polygons)
}

/// Byte-aligned layout: 16-bit material and indices, signed byte UVs
fn read_textured_v1(reader: &mut BitReader<'_>, header: &MbacHeader) -> Result<Vec<Polygon>> {
    let mut polygons = Vec::with_capacity(header.num_textured());
    for i in 0..header.num_textured() {
        let quad = i >= header.num_poly_t3;
        let raw = u32::from(reader.read_u16_le()?);
        if quad {
            check_material(raw, 0xFFF8)?;
            if raw & 1 == 0 {
                return Err(MbacError::ReservedMaterialBits {
                    material: raw,
                    mask: 1,
                });
            }
        } else {
            check_material(raw, 0xFFF9)?;
        }
        let corner_count = if quad { 4 } else { 3 };
        let mut corners = [0u32; 4];
        for corner in corners.iter_mut().take(corner_count) {
            *corner = u32::from(reader.read_u16_le()?);
        }
        let corners = &corners[..corner_count];
        check_indices(corners, header.num_vertices)?;

        // bit 2 is the double-face flag, bit 1 the color key
        let material = (raw & 4) << 2 | (raw & 2) >> 1;
        let transparent = Material::from_bits_retain(material).transparent_byte();
        let mut data = [[0u8; 5]; 4];
        for corner in data.iter_mut().take(corner_count) {
            let u = reader.read_u8()?;
            let v = reader.read_u8()?;
            *corner = [u, v, 1, 0, transparent];
        }
        polygons.push(build(material, corners, &data));
    }
    Ok(polygons)
}

/// Bit-packed layouts shared by polygon formats 2 and 3
fn read_textured_packed(
    reader: &mut BitReader<'_>,
    header: &MbacHeader,
    material_bits: u32,
    index_bits: u32,
    uv_bits: u32,
    reserved: u32,
) -> Result<Vec<Polygon>> {
    let mut polygons = Vec::with_capacity(header.num_textured());
    for i in 0..header.num_textured() {
        let corner_count = if i < header.num_poly_t3 { 3 } else { 4 };
        let material = reader.read_ubits(material_bits)?;
        check_material(material, reserved)?;
        let corners = read_corner_bits(reader, index_bits, corner_count)?;
        let corners = &corners[..corner_count];
        check_indices(corners, header.num_vertices)?;

        let flags = Material::from_bits_retain(material);
        let mut data = [[0u8; 5]; 4];
        for corner in data.iter_mut().take(corner_count) {
            let u = reader.read_ubits(uv_bits)? as u8;
            let v = reader.read_ubits(uv_bits)? as u8;
            *corner = [
                u,
                v,
                flags.light_byte(),
                flags.specular_byte(),
                flags.transparent_byte(),
            ];
        }
        polygons.push(build(material, corners, &data));
    }
    Ok(polygons)
}
