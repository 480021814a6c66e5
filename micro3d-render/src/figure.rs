//! A posed, textured instance of a model

use std::sync::Arc;

use glam::Vec3;
use log::*;
use micro3d_data::fixed::TO_FLOAT;
use micro3d_mbac::{Model, SkinnedMesh, compose_bones, pattern_mask, skin};
use micro3d_mtra::ActionTable;

use crate::error::{ArgumentError, Result};
use crate::texture::Texture;

/// Flat per-index vertex data handed to the backend
///
/// Positions and normals are expanded through the index buffer, so vertex
/// `n` of the staging arrays belongs to index `n` and draws can address
/// index ranges directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingBuffers {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    has_normals: bool,
}

impl StagingBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normals(&self) -> Option<&[f32]> {
        self.has_normals.then_some(self.normals.as_slice())
    }

    /// Number of staged vertices
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Drop the contents, keeping the allocations
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.has_normals = false;
    }
}

/// Live instance of a [`Model`]: pattern, pose and texture bindings
///
/// Many instances can share one model. Posture updates build the new
/// buffers completely before replacing the current ones, so a failed update
/// leaves the instance as it was.
#[derive(Debug, Clone)]
pub struct FigureInstance {
    model: Arc<Model>,
    textures: Vec<Texture>,
    selected: Option<usize>,
    pattern: i32,
    indices: Vec<u32>,
    mesh: SkinnedMesh,
}

impl FigureInstance {
    /// Instance in the rest pose with every polygon visible
    pub fn new(model: Arc<Model>) -> Self {
        let mesh = model.rest_pose();
        let indices = model.indices().to_vec();
        Self {
            model,
            textures: Vec::new(),
            selected: None,
            pattern: 0,
            indices,
            mesh,
        }
    }

    /// Decode an MBAC file into a new instance
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let model = Model::parse(data)?;
        Ok(Self::new(Arc::new(model)))
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Bind a single texture and select it
    pub fn set_texture(&mut self, texture: Texture) -> Result<()> {
        if texture.is_sphere() {
            return Err(ArgumentError::SphereTextureRejected.into());
        }
        self.textures = vec![texture];
        self.selected = Some(0);
        Ok(())
    }

    /// Bind one texture per model face; the selection is cleared
    pub fn set_textures(&mut self, textures: Vec<Texture>) -> Result<()> {
        if textures.is_empty() {
            return Err(ArgumentError::EmptyTextureList.into());
        }
        if textures.iter().any(Texture::is_sphere) {
            return Err(ArgumentError::SphereTextureRejected.into());
        }
        self.textures = textures;
        self.selected = None;
        Ok(())
    }

    pub fn select_texture(&mut self, index: usize) -> Result<()> {
        if index >= self.textures.len() {
            return Err(ArgumentError::TextureIndex {
                index,
                count: self.textures.len(),
            }
            .into());
        }
        self.selected = Some(index);
        Ok(())
    }

    /// The selected texture, if one is selected
    pub fn texture(&self) -> Option<&Texture> {
        self.selected.and_then(|i| self.textures.get(i))
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn num_patterns(&self) -> usize {
        self.model.num_patterns()
    }

    pub fn pattern(&self) -> i32 {
        self.pattern
    }

    /// Show only polygons whose mask is contained in `pattern`
    pub fn set_pattern(&mut self, pattern: i32) {
        self.indices = self.model.pattern_indices(pattern);
        self.pattern = pattern;
    }

    /// Switch to the mask of pattern table entry `index`
    pub fn select_pattern(&mut self, index: usize) -> Result<()> {
        let count = self.num_patterns();
        if index >= count {
            return Err(ArgumentError::PatternIndex { index, count }.into());
        }
        self.set_pattern(pattern_mask(index));
        Ok(())
    }

    /// Pose the figure with `action` of `actions` at `frame` (16.16 fixed
    /// point); negative frames act as 0
    pub fn set_posture(&mut self, actions: &ActionTable, action: usize, frame: i32) -> Result<()> {
        let act = actions.action(action)?;
        let frame = frame.max(0);

        let pose = act.evaluate_pose(frame);
        let matrices = compose_bones(self.model.bones(), &pose);
        let mesh = skin(&self.model, &matrices);
        let indices = act
            .pattern_at(frame)
            .map(|pattern| (pattern, self.model.pattern_indices(pattern)));

        trace!(
            "Posture action {action} frame {:.3}: {} vertices",
            frame as f32 / 65536.0,
            mesh.vertex_count()
        );
        self.mesh = mesh;
        if let Some((pattern, indices)) = indices {
            self.pattern = pattern;
            self.indices = indices;
        }
        Ok(())
    }

    /// Skinned positions in model units, sentinel included
    pub fn positions(&self) -> &[Vec3] {
        &self.mesh.positions
    }

    pub fn normals(&self) -> Option<&[Vec3]> {
        self.mesh.normals.as_deref()
    }

    /// Index buffer with the current pattern applied
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Skinned position of vertex `index` in real units
    pub fn world_position(&self, index: usize) -> Option<Vec3> {
        if index >= self.mesh.vertex_count() {
            return None;
        }
        self.mesh.positions.get(index).map(|&p| p * TO_FLOAT)
    }

    /// Expand the current pose through the index buffer into `out`
    pub fn fill_staging(&self, out: &mut StagingBuffers) {
        out.clear();
        out.positions.reserve(self.indices.len() * 3);
        for &i in &self.indices {
            let p = self.mesh.positions[i as usize];
            out.positions.extend_from_slice(&[p.x, p.y, p.z]);
        }
        if let Some(normals) = &self.mesh.normals {
            out.normals.reserve(self.indices.len() * 3);
            for &i in &self.indices {
                let n = normals[i as usize];
                out.normals.extend_from_slice(&[n.x, n.y, n.z]);
            }
            out.has_normals = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro3d_bmp::TextureImage;
    use micro3d_data::BitWriter;
    use pretty_assertions::assert_eq;

    /// Version 3 model: four vertices on one bone, one triangle
    fn triangle_model() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bytes(b"MB").write_u16_le(3);
        w.write_u16_le(4).write_u16_le(1).write_u16_le(0).write_u16_le(1);
        for v in [[0i16, 0, 0], [100, 0, 0], [0, 100, 0], [50, 50, 0]] {
            for c in v {
                w.write_i16_le(c);
            }
        }
        w.write_u16_le(0);
        for i in [0u16, 1, 2] {
            w.write_u16_le(i);
        }
        w.write_bytes(&[0, 0, 10, 0, 0, 10]);
        w.write_u16_le(4).write_i16_le(-1);
        for v in [4096i16, 0, 0, 0, 0, 4096, 0, 0, 0, 0, 4096, 0] {
            w.write_i16_le(v);
        }
        w.into_inner()
    }

    fn texture(is_sphere: bool) -> Texture {
        let image = TextureImage {
            width: 2,
            height: 2,
            rgba: vec![0; 16],
        };
        Texture::new(image, is_sphere)
    }

    #[test]
    fn test_rest_instance() {
        let figure = FigureInstance::from_bytes(&triangle_model()).unwrap();
        assert_eq!(figure.indices(), &[0, 1, 2]);
        assert_eq!(figure.positions().len(), 5);
        assert_eq!(figure.world_position(1), Some(Vec3::new(100.0 / 4096.0, 0.0, 0.0)));
        assert_eq!(figure.world_position(4), None);
        assert_eq!(figure.num_textures(), 0);
        assert!(figure.texture().is_none());
    }

    #[test]
    fn test_fill_staging_expands_indices() {
        let figure = FigureInstance::from_bytes(&triangle_model()).unwrap();
        let mut staging = StagingBuffers::new();
        staging.positions.push(99.0);
        figure.fill_staging(&mut staging);
        assert_eq!(staging.len(), 3);
        assert_eq!(
            staging.positions,
            vec![0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 100.0, 0.0]
        );
        assert!(staging.normals().is_none());
    }

    #[test]
    fn test_texture_binding() {
        let mut figure = FigureInstance::from_bytes(&triangle_model()).unwrap();
        let a = texture(false);
        figure.set_texture(a.clone()).unwrap();
        assert_eq!(figure.texture(), Some(&a));

        figure
            .set_textures(vec![texture(false), texture(false)])
            .unwrap();
        assert_eq!(figure.num_textures(), 2);
        assert!(figure.texture().is_none());
        figure.select_texture(1).unwrap();
        assert_eq!(figure.texture(), Some(&figure.textures()[1]));

        let err = figure.select_texture(2).unwrap_err();
        assert_eq!(
            err.as_argument(),
            Some(&ArgumentError::TextureIndex { index: 2, count: 2 })
        );
    }

    #[test]
    fn test_sphere_and_empty_textures_are_rejected() {
        let mut figure = FigureInstance::from_bytes(&triangle_model()).unwrap();
        let err = figure.set_texture(texture(true)).unwrap_err();
        assert_eq!(err.as_argument(), Some(&ArgumentError::SphereTextureRejected));
        let err = figure.set_textures(Vec::new()).unwrap_err();
        assert_eq!(err.as_argument(), Some(&ArgumentError::EmptyTextureList));
        assert_eq!(figure.num_textures(), 0);
    }

    #[test]
    fn test_pattern_selection() {
        let mut figure = FigureInstance::from_bytes(&triangle_model()).unwrap();
        assert_eq!(figure.num_patterns(), 1);
        figure.select_pattern(0).unwrap();
        assert_eq!(figure.pattern(), 0);
        assert_eq!(figure.indices(), &[0, 1, 2]);
        let err = figure.select_pattern(1).unwrap_err();
        assert_eq!(
            err.as_argument(),
            Some(&ArgumentError::PatternIndex { index: 1, count: 1 })
        );
    }
}
