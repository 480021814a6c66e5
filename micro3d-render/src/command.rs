//! Command-list interpreter
//!
//! A command list is an `i32` array that starts with a version word. Each
//! following word's top byte selects either a state command, which may read a
//! fixed number of argument words, or a primitive command, followed by a
//! payload sized by the command's flags:
//!
//! ```text
//! bit 31      always 0 for primitives
//! bits 24-26  kind: 1 points, 2 lines, 3 triangles, 4 quads, 5 sprites
//! bits 16-23  primitive count
//! bits 12-13  texture coordinates, or sprite parameter blocks
//! bits 10-11  colors: 1 per command, 2 per face, 3 per vertex
//! bits 8-9    normals: 2 per face, 3 per vertex
//! bits 5-6    blend mode
//! bit 4       color key
//! bit 1       sphere map
//! bit 0       lighting
//! ```
//!
//! Payload order is vertices, normals, texture coordinates, colors.

use glam::{Mat4, Vec4};
use log::*;
use micro3d_data::Vec3i;
use micro3d_data::fixed::TO_RADIANS;
use micro3d_mbac::BlendMode;

use crate::backend::{ClipRect, Topology};
use crate::effect::{Effect3D, EnvAttributes, Light, ToonSettings};
use crate::error::{ArgumentError, Result};
use crate::layout::{FigureLayout, Viewport};
use crate::queue::SceneState;
use crate::texture::Texture;

/// First word of every supported command list
pub const VERSION_1_0: u32 = 0xFE00_0001;

pub const END: u32 = 0x8000_0000;
pub const NOP: u32 = 0x8100_0000;
pub const FLUSH: u32 = 0x8200_0000;
pub const ATTRIBUTE: u32 = 0x8300_0000;
pub const CLIP: u32 = 0x8400_0000;
pub const CENTER: u32 = 0x8500_0000;
pub const TEXTURE_INDEX: u32 = 0x8600_0000;
pub const AFFINE_INDEX: u32 = 0x8700_0000;
pub const PARALLEL_SCALE: u32 = 0x9000_0000;
pub const PARALLEL_SIZE: u32 = 0x9100_0000;
pub const PERSPECTIVE_FOV: u32 = 0x9200_0000;
pub const PERSPECTIVE_WH: u32 = 0x9300_0000;
pub const AMBIENT_LIGHT: u32 = 0xA000_0000;
pub const DIRECTION_LIGHT: u32 = 0xA100_0000;
pub const THRESHOLD: u32 = 0xAF00_0000;

pub const PRIMITIVE_POINTS: i32 = 0x0100_0000;
pub const PRIMITIVE_LINES: i32 = 0x0200_0000;
pub const PRIMITIVE_TRIANGLES: i32 = 0x0300_0000;
pub const PRIMITIVE_QUADS: i32 = 0x0400_0000;
pub const PRIMITIVE_SPRITES: i32 = 0x0500_0000;

pub const PATTR_LIGHTING: i32 = 1;
pub const PATTR_SPHERE_MAP: i32 = 2;
pub const PATTR_COLORKEY: i32 = 16;
pub const PATTR_BLEND_HALF: i32 = 32;
pub const PATTR_BLEND_ADD: i32 = 64;
pub const PATTR_BLEND_SUB: i32 = 96;

pub const PDATA_NORMAL_PER_FACE: i32 = 512;
pub const PDATA_NORMAL_PER_VERTEX: i32 = 768;
pub const PDATA_COLOR_PER_COMMAND: i32 = 1024;
pub const PDATA_COLOR_PER_FACE: i32 = 2048;
pub const PDATA_COLOR_PER_VERTEX: i32 = 3072;
pub const PDATA_TEXTURE_COORD: i32 = 12288;
pub const PDATA_SPRITE_PARAMS_PER_CMD: i32 = 4096;
pub const PDATA_SPRITE_PARAMS_PER_FACE: i32 = 8192;
pub const PDATA_SPRITE_PARAMS_PER_VERTEX: i32 = 12288;

const NORMAL_MASK: i32 = 768;
const COLOR_MASK: i32 = 3072;
const TEXCOORD_MASK: i32 = 12288;
const BLEND_MASK: i32 = 96;

/// Words in one point sprite parameter block
pub const SPRITE_PARAMS_LEN: usize = 8;

/// Sprite size flags: pixel size instead of model units
pub const SPRITE_PIXEL_SIZE: i32 = 1;
/// Sprite size flags: size does not shrink with distance
pub const SPRITE_NO_PERSPECTIVE: i32 = 2;

/// Shape of a primitive command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Points,
    Lines,
    Triangles,
    Quads,
    Sprites,
}

impl PrimitiveKind {
    /// Kind selected by bits 24-26; `None` for 0, 6 and 7
    pub fn from_command(command: i32) -> Option<Self> {
        match command & 0x0700_0000 {
            PRIMITIVE_POINTS => Some(Self::Points),
            PRIMITIVE_LINES => Some(Self::Lines),
            PRIMITIVE_TRIANGLES => Some(Self::Triangles),
            PRIMITIVE_QUADS => Some(Self::Quads),
            PRIMITIVE_SPRITES => Some(Self::Sprites),
            _ => None,
        }
    }

    /// Vertices read per primitive
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            Self::Points | Self::Sprites => 1,
            Self::Lines => 2,
            Self::Triangles => 3,
            Self::Quads => 4,
        }
    }

    pub fn topology(self) -> Topology {
        match self {
            Self::Points => Topology::Points,
            Self::Lines => Topology::Lines,
            Self::Triangles | Self::Quads | Self::Sprites => Topology::Triangles,
        }
    }

    /// Source vertex of each emitted vertex; quads become two triangles
    fn corners(self) -> &'static [usize] {
        match self {
            Self::Points | Self::Sprites => &[0],
            Self::Lines => &[0, 1],
            Self::Triangles => &[0, 1, 2],
            Self::Quads => &[0, 1, 2, 3, 0, 2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalSource {
    None,
    PerFace,
    PerVertex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    None,
    PerCommand,
    PerFace,
    PerVertex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteParams {
    None,
    PerCommand,
    PerSprite,
}

/// Word counts of each payload section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadLayout {
    pub vertices: usize,
    pub normals: usize,
    pub texcoords: usize,
    pub colors: usize,
}

impl PayloadLayout {
    pub fn total(&self) -> usize {
        self.vertices + self.normals + self.texcoords + self.colors
    }
}

/// Payload sections of one primitive command
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<'a> {
    pub vertices: &'a [i32],
    pub normals: &'a [i32],
    pub texcoords: &'a [i32],
    pub colors: &'a [i32],
}

impl<'a> Payload<'a> {
    /// Split `words` into sections; `words` must hold `layout.total()`
    fn split(words: &'a [i32], layout: &PayloadLayout) -> Self {
        let (vertices, rest) = words.split_at(layout.vertices);
        let (normals, rest) = rest.split_at(layout.normals);
        let (texcoords, rest) = rest.split_at(layout.texcoords);
        Self {
            vertices,
            normals,
            texcoords,
            colors: &rest[..layout.colors],
        }
    }
}

/// Decoded flags of a primitive command word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveHeader {
    pub command: i32,
    pub kind: PrimitiveKind,
    pub count: usize,
    pub normals: NormalSource,
    pub colors: ColorSource,
    pub texcoords: bool,
    pub sprite_params: SpriteParams,
}

impl PrimitiveHeader {
    pub fn decode(command: i32, offset: usize) -> Result<Self> {
        let kind = if command < 0 {
            None
        } else {
            PrimitiveKind::from_command(command)
        };
        let Some(kind) = kind else {
            return Err(ArgumentError::InvalidCommand {
                offset,
                command: command as u32,
            }
            .into());
        };

        let normals = match command & NORMAL_MASK {
            PDATA_NORMAL_PER_FACE => NormalSource::PerFace,
            PDATA_NORMAL_PER_VERTEX => NormalSource::PerVertex,
            _ => NormalSource::None,
        };
        let colors = match command & COLOR_MASK {
            PDATA_COLOR_PER_COMMAND => ColorSource::PerCommand,
            PDATA_COLOR_PER_FACE => ColorSource::PerFace,
            PDATA_COLOR_PER_VERTEX => ColorSource::PerVertex,
            _ => ColorSource::None,
        };
        let texcoords = kind != PrimitiveKind::Sprites && command & TEXCOORD_MASK == PDATA_TEXTURE_COORD;
        let sprite_params = if kind == PrimitiveKind::Sprites {
            match command & TEXCOORD_MASK {
                0 => SpriteParams::None,
                PDATA_SPRITE_PARAMS_PER_CMD => SpriteParams::PerCommand,
                _ => SpriteParams::PerSprite,
            }
        } else {
            SpriteParams::None
        };

        Ok(Self {
            command,
            kind,
            count: ((command >> 16) & 0xFF) as usize,
            normals,
            colors,
            texcoords,
            sprite_params,
        })
    }

    /// Number of payload words of each section
    pub fn layout(&self) -> PayloadLayout {
        let size = self.kind.vertices_per_primitive();
        let vertices = self.count * 3 * size;
        let normals = match self.normals {
            NormalSource::None => 0,
            NormalSource::PerFace => self.count * 3,
            NormalSource::PerVertex => vertices,
        };
        let texcoords = match self.sprite_params {
            SpriteParams::PerCommand => SPRITE_PARAMS_LEN,
            SpriteParams::PerSprite => self.count * SPRITE_PARAMS_LEN,
            SpriteParams::None if self.texcoords => self.count * 2 * size,
            SpriteParams::None => 0,
        };
        let colors = match self.colors {
            ColorSource::None => 0,
            ColorSource::PerCommand => 1,
            ColorSource::PerFace => self.count,
            ColorSource::PerVertex => self.count * size,
        };
        PayloadLayout {
            vertices,
            normals,
            texcoords,
            colors,
        }
    }
}

/// Vertex colors of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchColors {
    None,
    Constant([u8; 3]),
    /// RGB per emitted vertex
    PerVertex(Vec<u8>),
}

/// Primitives expanded to plain vertex arrays, ready for the queue
#[derive(Debug, Clone)]
pub struct PrimitiveBatch {
    pub kind: PrimitiveKind,
    pub command: i32,
    /// Primitives in the command
    pub count: usize,
    /// `components` floats per vertex
    pub positions: Vec<f32>,
    /// 3 for model-space vertices, 4 for clip-space sprite corners
    pub components: usize,
    pub normals: Option<Vec<f32>>,
    pub texcoords: Option<Vec<u8>>,
    pub colors: BatchColors,
    pub texture: Option<Texture>,
    pub scene: SceneState,
}

impl PrimitiveBatch {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / self.components.max(1)
    }

    /// Blend mode from bits 5-6; normal unless the scene is semi-transparent
    pub fn blend(&self) -> BlendMode {
        if self.scene.attributes.contains(EnvAttributes::SEMI_TRANSPARENT) {
            BlendMode::from_bucket(((self.command & BLEND_MASK) >> 5) as usize)
        } else {
            BlendMode::Normal
        }
    }

    pub fn color_key(&self) -> bool {
        self.command & PATTR_COLORKEY != 0
    }

    /// Lighting applies when both the scene and the command ask for it and
    /// the batch carries normals
    pub fn is_lit(&self) -> bool {
        self.scene.attributes.contains(EnvAttributes::LIGHTING)
            && self.command & PATTR_LIGHTING != 0
            && self.normals.is_some()
    }

    pub fn uses_sphere_map(&self) -> bool {
        self.is_lit()
            && self.scene.attributes.contains(EnvAttributes::SPHERE_MAP)
            && self.command & PATTR_SPHERE_MAP != 0
            && self.scene.sphere.is_some()
    }
}

/// Receiver of the interpreter's output
pub trait CommandSink {
    fn post_primitives(&mut self, batch: PrimitiveBatch);

    /// Current clip rectangle
    fn clip(&self) -> ClipRect;

    fn set_clip(&mut self, clip: ClipRect);

    /// Draw everything posted so far
    fn flush(&mut self) -> Result<()> {
        debug!("Flush requested by command list; no backend attached");
        Ok(())
    }
}

fn rgb(color: i32) -> [u8; 3] {
    [(color >> 16) as u8, (color >> 8) as u8, color as u8]
}

/// Copy `width` words per source vertex into emitted vertex order
fn expand<T>(kind: PrimitiveKind, count: usize, src: &[i32], width: usize, out: &mut Vec<T>, f: impl Fn(i32) -> T) {
    let size = kind.vertices_per_primitive();
    for p in 0..count {
        for &c in kind.corners() {
            let start = (p * size + c) * width;
            out.extend(src[start..start + width].iter().map(|&v| f(v)));
        }
    }
}

/// Repeat `width` words per primitive for each of its emitted vertices
fn replicate<T>(kind: PrimitiveKind, count: usize, src: &[i32], width: usize, out: &mut Vec<T>, f: impl Fn(i32) -> T) {
    for p in 0..count {
        for _ in kind.corners() {
            out.extend(src[p * width..(p + 1) * width].iter().map(|&v| f(v)));
        }
    }
}

fn assemble_colors(header: &PrimitiveHeader, colors: &[i32]) -> BatchColors {
    let mut out = Vec::new();
    match header.colors {
        ColorSource::None => return BatchColors::None,
        ColorSource::PerCommand => return BatchColors::Constant(rgb(colors[0])),
        ColorSource::PerFace => {
            for p in 0..header.count {
                for _ in header.kind.corners() {
                    out.extend_from_slice(&rgb(colors[p]));
                }
            }
        }
        ColorSource::PerVertex => {
            let size = header.kind.vertices_per_primitive();
            for p in 0..header.count {
                for &c in header.kind.corners() {
                    out.extend_from_slice(&rgb(colors[p * size + c]));
                }
            }
        }
    }
    BatchColors::PerVertex(out)
}

/// Projection data needed to size point sprites
#[derive(Debug, Clone, Copy)]
struct SpriteContext {
    mvp: Mat4,
    projection: Mat4,
    parallel: bool,
    near: f32,
    width: f32,
    height: f32,
}

impl SpriteContext {
    /// Half extents in clip space for one parameter block
    fn half_size(&self, width: f32, height: f32, flags: i32, clip_w: f32, offset: usize) -> Result<(f32, f32)> {
        let p0 = self.projection.col(0).x;
        let p5 = self.projection.col(1).y;
        let size = match flags {
            0 => (width * p0 * 0.5, height * p5 * 0.5),
            SPRITE_PIXEL_SIZE if self.parallel => (width / self.width, height / self.height),
            SPRITE_PIXEL_SIZE => (
                width / self.width * self.near,
                height / self.height * self.near,
            ),
            SPRITE_NO_PERSPECTIVE if self.parallel => (width * p0 * 0.5, height * p5 * 0.5),
            SPRITE_NO_PERSPECTIVE => (
                width * p0 / self.near * 0.5 * clip_w,
                height * p5 / self.near * 0.5 * clip_w,
            ),
            3 => (width / self.width * clip_w, height / self.height * clip_w),
            _ => return Err(ArgumentError::SpriteFlags { offset, flags }.into()),
        };
        Ok(size)
    }
}

/// Corners of a rotated sprite quad as two triangles
fn sprite_vertices(center: Vec4, angle: i32, hw: f32, hh: f32, out: &mut Vec<f32>) {
    let r = angle as f32 * TO_RADIANS;
    let (sin, cos) = r.sin_cos();
    let [x, y, z, w] = center.to_array();
    let a = (-hw * cos - hh * sin + x, -hw * sin + hh * cos + y);
    let b = (-hw * cos + hh * sin + x, -hw * sin - hh * cos + y);
    let c = (hw * cos - hh * sin + x, hw * sin + hh * cos + y);
    let d = (hw * cos + hh * sin + x, hw * sin - hh * cos + y);
    for (px, py) in [a, b, c, c, b, d] {
        out.extend_from_slice(&[px, py, z, w]);
    }
}

/// Command-list interpreter holding the state commands act on
///
/// The interpreter starts from a layout and effect and changes its own
/// copies, so the caller's objects are never touched.
#[derive(Debug, Clone)]
pub struct CommandListVm<'a> {
    textures: &'a [Texture],
    texture_index: usize,
    layout: FigureLayout,
    viewport: Viewport,
    attributes: EnvAttributes,
    light: Light,
    toon: ToonSettings,
    sphere: Option<Texture>,
}

impl<'a> CommandListVm<'a> {
    pub fn new(textures: &'a [Texture], layout: &FigureLayout, effect: &Effect3D, viewport: Viewport) -> Self {
        Self {
            textures,
            texture_index: 0,
            layout: layout.clone(),
            viewport,
            attributes: effect.attributes(),
            light: effect.light().copied().unwrap_or_default(),
            toon: effect.toon(),
            sphere: effect.sphere_map().cloned(),
        }
    }

    pub fn layout(&self) -> &FigureLayout {
        &self.layout
    }

    pub fn attributes(&self) -> EnvAttributes {
        self.attributes
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn toon(&self) -> ToonSettings {
        self.toon
    }

    /// The active texture, if any is bound
    pub fn texture(&self) -> Option<&Texture> {
        self.textures.get(self.texture_index)
    }

    /// Snapshot of the state a draw posted now would use
    pub fn scene(&self) -> SceneState {
        SceneState::new(
            &self.layout,
            &self.viewport,
            self.attributes,
            &self.light,
            &self.toon,
            self.sphere.as_ref(),
        )
    }

    /// Run `commands`, posting primitives to `sink`
    ///
    /// Returns the number of batches posted. Interpretation stops at `END` or
    /// at the end of the array.
    pub fn execute(&mut self, commands: &[i32], sink: &mut dyn CommandSink) -> Result<usize> {
        let Some(&version) = commands.first() else {
            return Err(ArgumentError::TruncatedCommand {
                offset: 0,
                needed: 1,
                available: 0,
            }
            .into());
        };
        if version as u32 != VERSION_1_0 {
            return Err(ArgumentError::UnsupportedCommandListVersion(version as u32).into());
        }

        let mut pos = 1;
        let mut posted = 0;
        while pos < commands.len() {
            let offset = pos;
            let command = commands[pos];
            pos += 1;
            let low = (command & 0x00FF_FFFF) as usize;

            match command as u32 & 0xFF00_0000 {
                END => {
                    trace!("END at word {offset}");
                    break;
                }
                NOP => pos = pos.saturating_add(low),
                FLUSH => sink.flush()?,
                ATTRIBUTE => {
                    self.attributes = EnvAttributes::from_bits_truncate(low as u32);
                }
                CLIP => {
                    let [l, t, r, b] = words(commands, &mut pos, offset)?;
                    let clip = sink.clip().intersect(&ClipRect::new(l, t, r, b));
                    sink.set_clip(clip);
                }
                CENTER => {
                    let [x, y] = words(commands, &mut pos, offset)?;
                    self.layout.set_center(x, y);
                }
                TEXTURE_INDEX => {
                    if low >= self.textures.len() {
                        return Err(ArgumentError::TextureIndex {
                            index: low,
                            count: self.textures.len(),
                        }
                        .into());
                    }
                    self.texture_index = low;
                }
                AFFINE_INDEX => self.layout.select_affine(low)?,
                PARALLEL_SCALE => {
                    let [sx, sy] = words(commands, &mut pos, offset)?;
                    self.layout.set_scale(sx, sy);
                }
                PARALLEL_SIZE => {
                    let [w, h] = words(commands, &mut pos, offset)?;
                    self.layout.set_parallel_size(w, h)?;
                }
                PERSPECTIVE_FOV => {
                    let [near, far, angle] = words(commands, &mut pos, offset)?;
                    self.layout.set_perspective_fov(near, far, angle)?;
                }
                PERSPECTIVE_WH => {
                    let [near, far, w, h] = words(commands, &mut pos, offset)?;
                    self.layout.set_perspective_wh(near, far, w, h)?;
                }
                AMBIENT_LIGHT => {
                    let [ambient] = words(commands, &mut pos, offset)?;
                    self.light.ambient = ambient;
                }
                DIRECTION_LIGHT => {
                    let [x, y, z, intensity] = words(commands, &mut pos, offset)?;
                    self.light.direction = Vec3i::new(x, y, z);
                    self.light.directional = intensity;
                }
                THRESHOLD => {
                    let [threshold, high, low] = words(commands, &mut pos, offset)?;
                    self.toon = ToonSettings::new(threshold, high, low)?;
                }
                _ => {
                    let header = PrimitiveHeader::decode(command, offset)?;
                    let layout = header.layout();
                    let needed = layout.total();
                    let available = commands.len() - pos;
                    if needed > available {
                        return Err(ArgumentError::TruncatedCommand {
                            offset,
                            needed,
                            available,
                        }
                        .into());
                    }
                    let payload = Payload::split(&commands[pos..pos + needed], &layout);
                    pos += needed;
                    if self.post(&header, &payload, offset, sink)? {
                        posted += 1;
                    }
                }
            }
        }
        debug!("Command list: {posted} primitive batches posted");
        Ok(posted)
    }

    /// Post one primitive command whose payload lives in separate arrays
    ///
    /// `count` replaces bits 16-23 of `command`. Returns whether anything
    /// was posted.
    pub fn post_primitives(
        &mut self,
        command: i32,
        count: u8,
        payload: Payload<'_>,
        sink: &mut dyn CommandSink,
    ) -> Result<bool> {
        let command = (command & !0x00FF_0000) | i32::from(count) << 16;
        let header = PrimitiveHeader::decode(command, 0)?;
        let layout = header.layout();
        let sections = [
            (payload.vertices.len(), layout.vertices),
            (payload.normals.len(), layout.normals),
            (payload.texcoords.len(), layout.texcoords),
            (payload.colors.len(), layout.colors),
        ];
        for (available, needed) in sections {
            if available < needed {
                return Err(ArgumentError::TruncatedCommand {
                    offset: 0,
                    needed,
                    available,
                }
                .into());
            }
        }
        self.post(&header, &payload, 0, sink)
    }

    fn post(
        &self,
        header: &PrimitiveHeader,
        payload: &Payload<'_>,
        offset: usize,
        sink: &mut dyn CommandSink,
    ) -> Result<bool> {
        match self.assemble(header, payload, offset)? {
            Some(batch) => {
                trace!(
                    "{:?} x{} at word {offset}: {} vertices",
                    batch.kind,
                    batch.count,
                    batch.vertex_count()
                );
                sink.post_primitives(batch);
                Ok(true)
            }
            None => {
                trace!("{:?} at word {offset} has nothing to draw", header.kind);
                Ok(false)
            }
        }
    }

    /// Expand a primitive command into a batch; `None` when it draws nothing
    fn assemble(&self, header: &PrimitiveHeader, payload: &Payload<'_>, offset: usize) -> Result<Option<PrimitiveBatch>> {
        if header.kind == PrimitiveKind::Sprites {
            return self.assemble_sprites(header, payload, offset);
        }

        let (kind, count) = (header.kind, header.count);
        let mut positions = Vec::with_capacity(count * kind.corners().len() * 3);
        expand(kind, count, payload.vertices, 3, &mut positions, |v| v as f32);

        let mut normals = None;
        let mut texcoords = None;
        let mut texture = None;
        let colors;
        match kind {
            PrimitiveKind::Points | PrimitiveKind::Lines => {
                colors = assemble_colors(header, payload.colors);
                if colors == BatchColors::None {
                    return Ok(None);
                }
            }
            _ => {
                let mut n = Vec::new();
                match header.normals {
                    NormalSource::None => {}
                    NormalSource::PerFace => replicate(kind, count, payload.normals, 3, &mut n, |v| v as f32),
                    NormalSource::PerVertex => expand(kind, count, payload.normals, 3, &mut n, |v| v as f32),
                }
                if header.normals != NormalSource::None {
                    normals = Some(n);
                }

                if header.texcoords {
                    let Some(active) = self.texture() else {
                        return Ok(None);
                    };
                    let mut uv = Vec::with_capacity(positions.len() / 3 * 2);
                    expand(kind, count, payload.texcoords, 2, &mut uv, |v| v as u8);
                    texcoords = Some(uv);
                    texture = Some(active.clone());
                    colors = BatchColors::None;
                } else {
                    colors = assemble_colors(header, payload.colors);
                    if colors == BatchColors::None {
                        return Ok(None);
                    }
                }
            }
        }

        Ok(Some(PrimitiveBatch {
            kind,
            command: header.command,
            count,
            positions,
            components: 3,
            normals,
            texcoords,
            colors,
            texture,
            scene: self.scene(),
        }))
    }

    fn assemble_sprites(
        &self,
        header: &PrimitiveHeader,
        payload: &Payload<'_>,
        offset: usize,
    ) -> Result<Option<PrimitiveBatch>> {
        let Some(texture) = self.texture() else {
            return Ok(None);
        };
        if header.sprite_params == SpriteParams::None {
            return Ok(None);
        }

        let projection = self.layout.projection_matrix(&self.viewport);
        let context = SpriteContext {
            mvp: projection * self.layout.view_matrix(),
            projection,
            parallel: self.layout.projection().is_parallel(),
            near: self.layout.projection().near(),
            width: self.viewport.width as f32,
            height: self.viewport.height as f32,
        };

        let count = header.count;
        let mut positions = Vec::with_capacity(count * 6 * 4);
        let mut texcoords = Vec::with_capacity(count * 6 * 2);
        let mut angle = 0;
        let (mut hw, mut hh) = (0.0, 0.0);
        let mut uv = [0u8; 4];
        for i in 0..count {
            let v = &payload.vertices[i * 3..i * 3 + 3];
            let center = context.mvp * Vec4::new(v[0] as f32, v[1] as f32, v[2] as f32, 1.0);

            if header.sprite_params == SpriteParams::PerSprite || i == 0 {
                let start = if header.sprite_params == SpriteParams::PerSprite {
                    i * SPRITE_PARAMS_LEN
                } else {
                    0
                };
                let p = &payload.texcoords[start..start + SPRITE_PARAMS_LEN];
                angle = p[2];
                uv = [
                    p[3] as u8,
                    p[4] as u8,
                    p[5].wrapping_sub(1) as u8,
                    p[6].wrapping_sub(1) as u8,
                ];
                (hw, hh) = context.half_size(p[0] as f32, p[1] as f32, p[7], center.w, offset)?;
            }

            sprite_vertices(center, angle, hw, hh, &mut positions);
            let [tx0, ty0, tx1, ty1] = uv;
            texcoords.extend_from_slice(&[tx0, ty1, tx0, ty0, tx1, ty1, tx1, ty1, tx0, ty0, tx1, ty0]);
        }

        Ok(Some(PrimitiveBatch {
            kind: PrimitiveKind::Sprites,
            command: header.command,
            count,
            positions,
            components: 4,
            normals: None,
            texcoords: Some(texcoords),
            colors: BatchColors::None,
            texture: Some(texture.clone()),
            scene: self.scene(),
        }))
    }
}

/// Read `N` argument words of the command at `offset`
fn words<const N: usize>(commands: &[i32], pos: &mut usize, offset: usize) -> Result<[i32; N]> {
    let available = commands.len().saturating_sub(*pos);
    let Some(slice) = commands.get(*pos..*pos + N) else {
        return Err(ArgumentError::TruncatedCommand {
            offset,
            needed: N,
            available,
        }
        .into());
    };
    let mut out = [0; N];
    out.copy_from_slice(slice);
    *pos += N;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(PRIMITIVE_TRIANGLES | 2 << 16 | PDATA_COLOR_PER_COMMAND, PayloadLayout { vertices: 18, normals: 0, texcoords: 0, colors: 1 } ; "triangles with one color")]
    #[test_case(PRIMITIVE_QUADS | 1 << 16 | PDATA_NORMAL_PER_VERTEX | PDATA_TEXTURE_COORD, PayloadLayout { vertices: 12, normals: 12, texcoords: 8, colors: 0 } ; "textured quad with vertex normals")]
    #[test_case(PRIMITIVE_LINES | 3 << 16 | PDATA_NORMAL_PER_FACE | PDATA_COLOR_PER_VERTEX, PayloadLayout { vertices: 18, normals: 9, texcoords: 0, colors: 6 } ; "lines with face normals")]
    #[test_case(PRIMITIVE_SPRITES | 2 << 16 | PDATA_SPRITE_PARAMS_PER_CMD, PayloadLayout { vertices: 6, normals: 0, texcoords: 8, colors: 0 } ; "sprites sharing params")]
    #[test_case(PRIMITIVE_SPRITES | 2 << 16 | PDATA_SPRITE_PARAMS_PER_FACE | PDATA_COLOR_PER_FACE, PayloadLayout { vertices: 6, normals: 0, texcoords: 16, colors: 2 } ; "sprites with own params")]
    #[test_case(PRIMITIVE_POINTS | 4 << 16 | PDATA_TEXTURE_COORD, PayloadLayout { vertices: 12, normals: 0, texcoords: 8, colors: 0 } ; "points still consume texcoords")]
    fn test_payload_layout(command: i32, expected: PayloadLayout) {
        let header = PrimitiveHeader::decode(command, 1).unwrap();
        assert_eq!(header.layout(), expected);
    }

    #[test_case(0 ; "no kind")]
    #[test_case(0x0600_0000 ; "kind six")]
    #[test_case(0x0700_0000 | 1 << 16 ; "kind seven")]
    fn test_invalid_primitive_kind(command: i32) {
        let err = PrimitiveHeader::decode(command, 3).unwrap_err();
        assert_eq!(
            err.as_argument(),
            Some(&ArgumentError::InvalidCommand {
                offset: 3,
                command: command as u32
            })
        );
    }

    #[test]
    fn test_header_flags() {
        let header = PrimitiveHeader::decode(PRIMITIVE_QUADS | 7 << 16 | PDATA_NORMAL_PER_FACE | PDATA_COLOR_PER_FACE | PATTR_BLEND_ADD, 0).unwrap();
        assert_eq!(header.kind, PrimitiveKind::Quads);
        assert_eq!(header.count, 7);
        assert_eq!(header.normals, NormalSource::PerFace);
        assert_eq!(header.colors, ColorSource::PerFace);
        assert!(!header.texcoords);
        assert_eq!(header.sprite_params, SpriteParams::None);
    }

    #[test]
    fn test_sprite_corners() {
        let mut out = Vec::new();
        sprite_vertices(Vec4::new(1.0, 2.0, 0.5, 1.0), 0, 0.25, 0.5, &mut out);
        let corners: Vec<(f32, f32)> = out.chunks(4).map(|v| (v[0], v[1])).collect();
        assert_eq!(
            corners,
            vec![
                (0.75, 2.5),
                (0.75, 1.5),
                (1.25, 2.5),
                (1.25, 2.5),
                (0.75, 1.5),
                (1.25, 1.5),
            ]
        );
        assert!(out.chunks(4).all(|v| v[2] == 0.5 && v[3] == 1.0));
    }
}
