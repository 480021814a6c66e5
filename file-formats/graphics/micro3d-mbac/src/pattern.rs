//! Pattern table and pattern-mask assignment
//!
//! Pattern `i` covers a run of polygons in each polygon list; polygons in
//! that run get the mask `1 << i` (pattern 0 gets mask 0, always visible).

use micro3d_data::ByteReader;

use crate::error::{MbacError, Result};
use crate::header::MbacHeader;
use crate::polygon::Polygon;

/// Triangle and quad counts covered by one pattern
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatternEntry {
    /// Colored (triangles, quads)
    pub colored: (usize, usize),
    /// Textured (triangles, quads) per texture slot
    pub textured: Vec<(usize, usize)>,
}

/// Mask assigned to polygons of pattern `index`
pub fn pattern_mask(index: usize) -> i32 {
    if index == 0 {
        0
    } else {
        1i32.wrapping_shl(index as u32)
    }
}

/// Read the pattern table (version 5), or synthesize a single pattern
pub fn read_patterns(reader: &mut impl ByteReader, header: &MbacHeader) -> Result<Vec<PatternEntry>> {
    if header.version != 5 {
        let mut textured = vec![(0, 0); header.num_textures.max(1)];
        textured[0] = (header.num_poly_t3, header.num_poly_t4);
        return Ok(vec![PatternEntry {
            colored: (header.num_poly_c3, header.num_poly_c4),
            textured,
        }]);
    }

    let mut patterns = Vec::with_capacity(header.num_patterns);
    for _ in 0..header.num_patterns {
        let colored = (
            reader.read_u16_le()? as usize,
            reader.read_u16_le()? as usize,
        );
        let mut textured = Vec::with_capacity(header.num_textures);
        for _ in 0..header.num_textures {
            textured.push((
                reader.read_u16_le()? as usize,
                reader.read_u16_le()? as usize,
            ));
        }
        patterns.push(PatternEntry { colored, textured });
    }
    Ok(patterns)
}

/// Cursor over the triangle and quad halves of one polygon list
struct Walk<'a> {
    polygons: &'a mut [Polygon],
    triangles: usize,
    next_triangle: usize,
    next_quad: usize,
    kind: &'static str,
}

impl<'a> Walk<'a> {
    fn new(polygons: &'a mut [Polygon], triangles: usize, kind: &'static str) -> Self {
        Self {
            polygons,
            triangles,
            next_triangle: 0,
            next_quad: triangles,
            kind,
        }
    }

    fn overflow(&self) -> MbacError {
        MbacError::PatternOverflow {
            kind: self.kind,
            count: self.polygons.len(),
        }
    }

    fn assign(&mut self, (tris, quads): (usize, usize), mask: i32, face: Option<usize>) -> Result<()> {
        let tri_end = self.next_triangle + tris;
        let quad_end = self.next_quad + quads;
        if tri_end > self.triangles || quad_end > self.polygons.len() {
            return Err(self.overflow());
        }
        let (triangles, quads) = self.polygons.split_at_mut(self.triangles);
        let quad_range = self.next_quad - self.triangles..quad_end - self.triangles;
        for polygon in triangles[self.next_triangle..tri_end]
            .iter_mut()
            .chain(quads[quad_range].iter_mut())
        {
            polygon.pattern = mask;
            if let Some(face) = face {
                polygon.face = face;
            }
        }
        self.next_triangle = tri_end;
        self.next_quad = quad_end;
        Ok(())
    }
}

/// Apply pattern masks and texture slots to freshly decoded polygons
///
/// Polygons outside every pattern keep mask 0 and slot 0.
pub fn assign_patterns(
    patterns: &[PatternEntry],
    header: &MbacHeader,
    colored: &mut [Polygon],
    textured: &mut [Polygon],
) -> Result<()> {
    let mut colored_walk = Walk::new(colored, header.num_poly_c3, "colored");
    let mut textured_walk = Walk::new(textured, header.num_poly_t3, "textured");
    for (index, entry) in patterns.iter().enumerate() {
        let mask = pattern_mask(index);
        colored_walk.assign(entry.colored, mask, None)?;
        for (face, &counts) in entry.textured.iter().enumerate() {
            textured_walk.assign(counts, mask, Some(face))?;
        }
    }
    Ok(())
}
