//! The decoded model and its draw-order bucket tables

use glam::Vec3;
use log::*;
use micro3d_data::BitReader;

use crate::bone::{Bone, read_bones};
use crate::error::{MbacError, Result};
use crate::geometry::{read_normals, read_vertices};
use crate::header::{MbacHeader, parse_header};
use crate::pattern::{PatternEntry, assign_patterns, read_patterns};
use crate::polygon::{BlendMode, Polygon, read_colored, read_textured};

/// Index counts per `[double_sided]` slot
pub type SideLengths = [usize; 2];

/// An immutable MBAC model
///
/// Textured polygons are stably sorted by `(blend mode, face, double sided)`
/// and colored polygons by `(blend mode, double sided)`. The flat index
/// buffer holds all textured indices followed by all colored ones, so each
/// bucket of the `sub_meshes_*` tables is one contiguous index range.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    header: MbacHeader,
    vertices: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    bones: Vec<Bone>,
    patterns: Vec<PatternEntry>,
    polygons_textured: Vec<Polygon>,
    polygons_colored: Vec<Polygon>,
    indices: Vec<u32>,
    texcoords: Vec<u8>,
    sub_meshes_textured: [Vec<SideLengths>; 4],
    sub_meshes_colored: [SideLengths; 4],
}

impl Model {
    /// Decode an MBAC buffer
    ///
    /// Nothing is returned unless the whole buffer decodes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(data);
        let header = parse_header(&mut reader).map_err(|e| e.with_context("header"))?;
        let patterns =
            read_patterns(&mut reader, &header).map_err(|e| e.with_context("pattern table"))?;

        let vertices = read_vertices(&mut reader, header.vertex_format, header.num_vertices)
            .map_err(|e| e.with_context("vertices"))?;
        reader.clear_bit_cache();

        let normals = if header.has_normals() {
            let normals = read_normals(&mut reader, header.normal_format, header.num_vertices)
                .map_err(|e| e.with_context("normals"))?;
            Some(normals)
        } else {
            None
        };
        reader.clear_bit_cache();

        // Colored and textured sections share the bit cache
        let mut polygons_colored = if header.num_colored() > 0 {
            read_colored(&mut reader, &header).map_err(|e| e.with_context("colored polygons"))?
        } else {
            Vec::new()
        };
        let mut polygons_textured = if header.num_textured() > 0 {
            read_textured(&mut reader, &header)
                .map_err(|e| e.with_context("textured polygons"))?
        } else {
            Vec::new()
        };
        reader.clear_bit_cache();

        assign_patterns(
            &patterns,
            &header,
            &mut polygons_colored,
            &mut polygons_textured,
        )?;

        let bones =
            read_bones(&mut reader, header.num_bones).map_err(|e| e.with_context("bones"))?;
        let bone_vertices: usize = bones.iter().map(|b| b.vertex_count).sum();
        if bone_vertices != header.num_vertices {
            return Err(MbacError::BoneVertexMismatch {
                bones: bone_vertices,
                vertices: header.num_vertices,
            });
        }

        let trailing = reader.remaining().saturating_sub(header.trailer_size());
        if trailing > 0 {
            warn!(
                "Uninterpreted bytes in MBAC ({trailing}, v={})",
                header.version
            );
        }

        let mut model = Self {
            header,
            vertices,
            normals,
            bones,
            patterns,
            polygons_textured,
            polygons_colored,
            indices: Vec::new(),
            texcoords: Vec::new(),
            sub_meshes_textured: Default::default(),
            sub_meshes_colored: [[0; 2]; 4],
        };
        model.sort_polygons();
        Ok(model)
    }

    /// Sort both polygon lists into buckets and build the flat buffers
    fn sort_polygons(&mut self) {
        self.polygons_textured
            .sort_by_key(|p| (p.blend_mode(), p.face, p.is_double_sided()));
        self.polygons_colored
            .sort_by_key(|p| (p.blend_mode(), p.is_double_sided()));

        let faces = self.header.num_textures.max(1);
        let mut textured: [Vec<SideLengths>; 4] = std::array::from_fn(|_| vec![[0; 2]; faces]);
        let mut colored = [[0usize; 2]; 4];
        let total = self.header.index_count();
        let mut indices = Vec::with_capacity(total);
        let mut texcoords = Vec::with_capacity(total * Polygon::DATA_STRIDE);

        for p in &self.polygons_textured {
            textured[p.blend_mode().bucket()][p.face][usize::from(p.is_double_sided())] +=
                p.indices.len();
            indices.extend_from_slice(&p.indices);
            texcoords.extend_from_slice(&p.vertex_data);
        }
        for p in &self.polygons_colored {
            colored[p.blend_mode().bucket()][usize::from(p.is_double_sided())] += p.indices.len();
            indices.extend_from_slice(&p.indices);
            texcoords.extend_from_slice(&p.vertex_data);
        }

        self.sub_meshes_textured = textured;
        self.sub_meshes_colored = colored;
        self.indices = indices;
        self.texcoords = texcoords;
    }

    pub fn header(&self) -> &MbacHeader {
        &self.header
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_patterns(&self) -> usize {
        self.header.num_patterns
    }

    pub fn num_textures(&self) -> usize {
        self.header.num_textures
    }

    /// Bone-local vertex positions in model units
    pub fn rest_positions(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Bone-local normals, 4096 = unit length
    pub fn rest_normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn patterns(&self) -> &[PatternEntry] {
        &self.patterns
    }

    /// Textured polygons in bucket order
    pub fn polygons_textured(&self) -> &[Polygon] {
        &self.polygons_textured
    }

    /// Colored polygons in bucket order
    pub fn polygons_colored(&self) -> &[Polygon] {
        &self.polygons_colored
    }

    pub fn has_textured(&self) -> bool {
        !self.polygons_textured.is_empty()
    }

    pub fn has_colored(&self) -> bool {
        !self.polygons_colored.is_empty()
    }

    /// Flat index buffer with every polygon visible
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Five bytes of vertex data per index, in index-buffer order
    pub fn texcoords(&self) -> &[u8] {
        &self.texcoords
    }

    /// Index counts by `[blend bucket][face][double sided]`
    pub fn sub_meshes_textured(&self) -> &[Vec<SideLengths>; 4] {
        &self.sub_meshes_textured
    }

    /// Index counts by `[blend bucket][double sided]`
    pub fn sub_meshes_colored(&self) -> &[SideLengths; 4] {
        &self.sub_meshes_colored
    }

    /// Number of leading indices that belong to textured polygons
    pub fn textured_index_count(&self) -> usize {
        self.header.textured_index_count()
    }

    /// Index of the off-screen vertex hidden polygons point at
    pub fn sentinel_index(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Index buffer with polygons hidden under `pattern` collapsed onto the
    /// sentinel vertex
    pub fn pattern_indices(&self, pattern: i32) -> Vec<u32> {
        let sentinel = self.sentinel_index();
        let mut out = Vec::with_capacity(self.indices.len());
        for polygon in self.polygons_textured.iter().chain(&self.polygons_colored) {
            if polygon.is_visible(pattern) {
                out.extend_from_slice(&polygon.indices);
            } else {
                out.extend(std::iter::repeat_n(sentinel, polygon.indices.len()));
            }
        }
        out
    }

    /// Index ranges of the textured buckets for one blend mode and face, as
    /// `(offset, count, double_sided)`
    pub fn textured_ranges(&self, blend: BlendMode, face: usize) -> Vec<(usize, usize, bool)> {
        let mut ranges = Vec::new();
        let mut offset = 0;
        for (bucket, faces) in self.sub_meshes_textured.iter().enumerate() {
            for (f, sides) in faces.iter().enumerate() {
                for (side, &count) in sides.iter().enumerate() {
                    if bucket == blend.bucket() && f == face && count > 0 {
                        ranges.push((offset, count, side == 1));
                    }
                    offset += count;
                }
            }
        }
        ranges
    }

    /// Index ranges of the colored buckets for one blend mode, offset past
    /// the textured indices
    pub fn colored_ranges(&self, blend: BlendMode) -> Vec<(usize, usize, bool)> {
        let mut ranges = Vec::new();
        let mut offset = self.textured_index_count();
        for (bucket, sides) in self.sub_meshes_colored.iter().enumerate() {
            for (side, &count) in sides.iter().enumerate() {
                if bucket == blend.bucket() && count > 0 {
                    ranges.push((offset, count, side == 1));
                }
                offset += count;
            }
        }
        ranges
    }

    /// Re-check the structural invariants of a decoded model
    pub fn validate(&self) -> Result<()> {
        let bone_vertices: usize = self.bones.iter().map(|b| b.vertex_count).sum();
        if bone_vertices != self.vertices.len() {
            return Err(MbacError::BoneVertexMismatch {
                bones: bone_vertices,
                vertices: self.vertices.len(),
            });
        }

        let textured: usize = self.sub_meshes_textured.iter().flatten().flatten().sum();
        if textured != self.textured_index_count() {
            return Err(MbacError::BucketMismatch {
                kind: "textured",
                buckets: textured,
                indices: self.textured_index_count(),
            });
        }
        let colored: usize = self.sub_meshes_colored.iter().flatten().sum();
        let colored_indices = self.indices.len() - self.textured_index_count().min(self.indices.len());
        if colored != colored_indices {
            return Err(MbacError::BucketMismatch {
                kind: "colored",
                buckets: colored,
                indices: colored_indices,
            });
        }

        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(MbacError::IndexOutOfRange {
                index,
                count: self.vertices.len(),
            });
        }
        if self.texcoords.len() != self.indices.len() * Polygon::DATA_STRIDE {
            return Err(MbacError::BucketMismatch {
                kind: "vertex data",
                buckets: self.texcoords.len() / Polygon::DATA_STRIDE,
                indices: self.indices.len(),
            });
        }
        Ok(())
    }
}
