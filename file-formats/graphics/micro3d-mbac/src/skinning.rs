//! Bone composition and rigid vertex skinning
//!
//! Every vertex belongs to exactly one bone, so skinning is a matrix per
//! contiguous vertex range rather than a weighted blend.
//!
//! ```rust,no_run
//! use micro3d_mbac::Model;
//! use micro3d_mbac::skinning::{compose_bones, skin};
//!
//! let data = std::fs::read("model.mbac")?;
//! let model = Model::parse(&data)?;
//! let matrices = compose_bones(model.bones(), &[]);
//! let mesh = skin(&model, &matrices);
//! println!("first vertex: {:?}", mesh.positions[0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use glam::Vec3;
use micro3d_data::Matrix34;

use crate::bone::Bone;
use crate::model::Model;

/// Skinned positions and normals, each with one trailing sentinel entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkinnedMesh {
    /// Model units; the last entry is the off-screen sentinel
    pub positions: Vec<Vec3>,
    /// Present when the model carries normals
    pub normals: Option<Vec<Vec3>>,
}

impl SkinnedMesh {
    /// Position of the sentinel vertex
    pub const SENTINEL_POSITION: Vec3 = Vec3::new(0.0, 0.0, f32::INFINITY);
    pub const SENTINEL_NORMAL: Vec3 = Vec3::Z;

    /// Number of real vertices, excluding the sentinel
    pub fn vertex_count(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }
}

/// Compose per-bone matrices down the hierarchy
///
/// Root bones use their rest matrix; other bones are their parent's final
/// matrix times their own rest matrix. Bone `i` is then post-multiplied by
/// `action[i]` when the action covers it.
pub fn compose_bones(bones: &[Bone], action: &[Matrix34]) -> Vec<Matrix34> {
    let mut composed: Vec<Matrix34> = Vec::with_capacity(bones.len());
    for (i, bone) in bones.iter().enumerate() {
        let local = bone.matrix;
        let mut matrix = match bone.parent_index().and_then(|p| composed.get(p)) {
            Some(parent) => parent.mul(&local),
            None => local,
        };
        if let Some(pose) = action.get(i) {
            matrix = matrix.mul(pose);
        }
        composed.push(matrix);
    }
    composed
}

/// Transform the model's rest vertices and normals by the bone matrices
pub fn skin(model: &Model, matrices: &[Matrix34]) -> SkinnedMesh {
    let src = model.rest_positions();
    let mut positions = Vec::with_capacity(src.len() + 1);
    let mut normals = model
        .rest_normals()
        .map(|n| Vec::with_capacity(n.len() + 1));

    let mut start = 0;
    for (bone, matrix) in model.bones().iter().zip(matrices) {
        let end = (start + bone.vertex_count).min(src.len());
        positions.extend(src[start..end].iter().map(|&v| matrix.transform_point(v)));
        if let (Some(out), Some(rest)) = (normals.as_mut(), model.rest_normals()) {
            out.extend(rest[start..end].iter().map(|&n| matrix.transform_vector(n)));
        }
        start = end;
    }
    // Vertices not reached by a matrix keep their rest position
    positions.extend_from_slice(&src[positions.len()..]);
    if let (Some(out), Some(rest)) = (normals.as_mut(), model.rest_normals()) {
        let done = out.len();
        out.extend_from_slice(&rest[done..]);
        out.push(SkinnedMesh::SENTINEL_NORMAL);
    }
    positions.push(SkinnedMesh::SENTINEL_POSITION);

    SkinnedMesh { positions, normals }
}

impl Model {
    /// Vertices posed by the rest skeleton alone
    pub fn rest_pose(&self) -> SkinnedMesh {
        skin(self, &compose_bones(self.bones(), &[]))
    }
}
