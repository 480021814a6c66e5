//! The seam between the render queue and a GPU rasterizer
//!
//! The queue never talks to a graphics API directly. It uploads textures and
//! issues one [`DrawCall`] per bucket through a [`GpuBackend`] passed in at
//! flush time. [`RecordingBackend`] keeps a log of everything it is asked to
//! do, which is what the CLI dry run and the tests use.

use glam::{Mat4, Vec3};
use log::*;
use micro3d_bmp::TextureImage;
use micro3d_mbac::BlendMode;

use crate::config::TextureFilter;
use crate::error::GpuBackendError;
use crate::texture::TextureHandle;

/// Pixel rectangle; `right` and `bottom` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClipRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ClipRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The whole surface of a `width` × `height` viewport
    pub fn full(width: u32, height: u32) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        Self::new(0, 0, w, h)
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Overlap of two rectangles; disjoint rectangles give an empty one
    pub fn intersect(&self, other: &Self) -> Self {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right).max(left);
        let bottom = self.bottom.min(other.bottom).max(top);
        Self::new(left, top, right, bottom)
    }
}

/// Vertex assembly of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    Triangles,
}

/// Lighting uniforms, already clamped and scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub ambient: f32,
    pub directional: f32,
    /// Unit vector pointing towards the light
    pub direction: Vec3,
}

/// Toon shading uniforms; a negative threshold disables toon shading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToonParams {
    pub threshold: f32,
    pub high: f32,
    pub low: f32,
}

impl ToonParams {
    pub const DISABLED: Self = Self {
        threshold: -1.0,
        high: 0.0,
        low: 0.0,
    };

    pub fn is_enabled(&self) -> bool {
        self.threshold >= 0.0
    }
}

/// A sphere-map texture bound for specular lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SphereMap {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Where a draw takes its vertex colors from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexColors<'a> {
    None,
    /// One RGB color for every vertex
    Constant([u8; 3]),
    /// RGB bytes per vertex
    PerVertex(&'a [u8]),
}

/// One draw of a contiguous vertex range
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub topology: Topology,
    /// `position_components` floats per vertex: model-space `xyz`, or
    /// clip-space `xyzw` for point sprites
    pub positions: &'a [f32],
    pub position_components: usize,
    /// `xyz` per vertex, present only when the draw is lit
    pub normals: Option<&'a [f32]>,
    /// Model vertex data, 5 bytes per vertex (see `micro3d_mbac::Polygon`)
    pub material_data: Option<&'a [u8]>,
    /// `u, v` bytes per vertex
    pub texcoords: Option<&'a [u8]>,
    pub colors: VertexColors<'a>,
    pub first: usize,
    pub count: usize,
    pub blend: BlendMode,
    pub cull_back_faces: bool,
    /// Texel 0 is discarded
    pub color_key: bool,
    pub texture: Option<TextureHandle>,
    pub sphere: Option<SphereMap>,
    pub mvp: Mat4,
    /// Model-view matrix, also used to transform normals
    pub model_view: Mat4,
    pub light: Option<LightParams>,
    pub toon: ToonParams,
}

/// A GPU rasterizer driven by the render queue
///
/// Calls arrive from one thread at a time, while the renderer lock is held.
pub trait GpuBackend: Send + 'static {
    /// Context generation; it changes whenever previously uploaded textures
    /// become invalid
    fn generation(&self) -> u64;

    /// Upload an RGBA8 image under `handle`
    fn upload_texture(
        &mut self,
        handle: TextureHandle,
        image: &TextureImage,
        filter: TextureFilter,
    ) -> Result<(), GpuBackendError>;

    /// Restrict drawing to `clip`, or to the whole surface with `None`
    fn set_clip(&mut self, clip: Option<ClipRect>);

    fn set_depth_write(&mut self, enabled: bool);

    fn draw_indexed(&mut self, call: &DrawCall<'_>) -> Result<(), GpuBackendError>;

    /// A flush finished: blending off, depth writes on, depth buffer cleared
    fn end_frame(&mut self) {}
}

/// Summary of a draw as seen by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub topology: Topology,
    pub first: usize,
    pub count: usize,
    pub blend: BlendMode,
    pub cull_back_faces: bool,
    pub color_key: bool,
    pub texture: Option<u64>,
    pub sphere: Option<u64>,
    pub lit: bool,
    pub toon: bool,
    pub color: Option<[u8; 3]>,
    pub depth_write: bool,
}

/// Everything a [`RecordingBackend`] was asked to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Upload { id: u64, width: u32, height: u32 },
    Clip(Option<ClipRect>),
    DepthWrite(bool),
    Draw(DrawRecord),
    EndFrame,
}

/// Backend that records calls instead of rasterizing
#[derive(Debug)]
pub struct RecordingBackend {
    generation: u64,
    depth_write: bool,
    events: Vec<BackendEvent>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            generation: 1,
            depth_write: true,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    /// Only the draw records, in call order
    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Draw(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn take_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.events)
    }

    /// Simulate a lost context: every texture must be uploaded again
    pub fn reset_context(&mut self) {
        self.generation += 1;
        debug!("Recording backend context reset (generation {})", self.generation);
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn upload_texture(
        &mut self,
        handle: TextureHandle,
        image: &TextureImage,
        filter: TextureFilter,
    ) -> Result<(), GpuBackendError> {
        trace!(
            "upload texture {} ({}x{}, {filter})",
            handle.id, image.width, image.height
        );
        self.events.push(BackendEvent::Upload {
            id: handle.id,
            width: image.width,
            height: image.height,
        });
        Ok(())
    }

    fn set_clip(&mut self, clip: Option<ClipRect>) {
        self.events.push(BackendEvent::Clip(clip));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.events.push(BackendEvent::DepthWrite(enabled));
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) -> Result<(), GpuBackendError> {
        trace!(
            "draw {:?} {}+{} blend={:?}",
            call.topology, call.first, call.count, call.blend
        );
        let color = match call.colors {
            VertexColors::Constant(rgb) => Some(rgb),
            _ => None,
        };
        self.events.push(BackendEvent::Draw(DrawRecord {
            topology: call.topology,
            first: call.first,
            count: call.count,
            blend: call.blend,
            cull_back_faces: call.cull_back_faces,
            color_key: call.color_key,
            texture: call.texture.map(|h| h.id),
            sphere: call.sphere.map(|s| s.handle.id),
            lit: call.light.is_some(),
            toon: call.toon.is_enabled(),
            color,
            depth_write: self.depth_write,
        }));
        Ok(())
    }

    fn end_frame(&mut self) {
        self.depth_write = true;
        self.events.push(BackendEvent::EndFrame);
    }
}
