use log::*;
use micro3d_data::{BitReader, ByteReader, Matrix34};

use crate::error::{MbacError, Result};

/// One node of the skeleton
///
/// Bones own contiguous vertex ranges in file order: bone `i` owns the
/// `vertex_count` vertices following those of bone `i - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub vertex_count: usize,
    /// Index of the parent bone, or -1 for a root
    pub parent: i32,
    /// Rest transform relative to the parent
    pub matrix: Matrix34,
}

impl Bone {
    pub fn is_root(&self) -> bool {
        self.parent < 0
    }

    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

/// Read the bone table
///
/// Parents must precede their children so a single forward pass can compose
/// the hierarchy.
pub fn read_bones(reader: &mut BitReader<'_>, count: usize) -> Result<Vec<Bone>> {
    let mut bones = Vec::with_capacity(count);
    for index in 0..count {
        let vertex_count = reader.read_u16_le()? as usize;
        let parent = i32::from(reader.read_i16_le()?);
        if parent < -1 || parent >= index as i32 {
            return Err(MbacError::InvalidParent {
                bone: index,
                parent,
            });
        }
        let mut values = [0i16; 12];
        for value in &mut values {
            *value = reader.read_i16_le()?;
        }
        trace!("bone {index}: {vertex_count} vertices, parent {parent}");
        bones.push(Bone {
            vertex_count,
            parent,
            matrix: Matrix34::from_fixed_i16(&values),
        });
    }
    Ok(bones)
}
