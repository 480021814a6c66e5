//! Deferred two-pass render queue
//!
//! Figures and primitive batches are queued together with a snapshot of
//! the scene state they were posted with. A flush replays every entry twice:
//! first the opaque buckets with depth writes on, then the blended buckets
//! with depth writes off, so blended geometry of every entry is tested
//! against the complete opaque scene.

use std::sync::Arc;

use glam::Mat4;
use log::*;
use micro3d_mbac::{BlendMode, Model};

use crate::backend::{
    ClipRect, DrawCall, GpuBackend, LightParams, SphereMap, ToonParams, Topology, VertexColors,
};
use crate::command::{BatchColors, CommandSink, PrimitiveBatch, PrimitiveKind};
use crate::config::{RenderOptions, TextureFilter};
use crate::effect::{Effect3D, EnvAttributes, Light, ToonSettings};
use crate::error::{GpuBackendError, Result};
use crate::figure::{FigureInstance, StagingBuffers};
use crate::layout::{FigureLayout, Viewport};
use crate::staging::StagingPool;
use crate::texture::{Texture, TextureHandle};

/// Everything a queued draw needs from the layout and effect, frozen at
/// the moment it was posted
#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    pub projection: Mat4,
    pub view: Mat4,
    pub attributes: EnvAttributes,
    pub light: LightParams,
    pub toon: ToonParams,
    pub sphere: Option<Texture>,
}

impl SceneState {
    pub fn new(
        layout: &FigureLayout,
        viewport: &Viewport,
        attributes: EnvAttributes,
        light: &Light,
        toon: &ToonSettings,
        sphere: Option<&Texture>,
    ) -> Self {
        Self {
            projection: layout.projection_matrix(viewport),
            view: layout.view_matrix(),
            attributes,
            light: light.params(),
            toon: toon.params(attributes),
            sphere: sphere.cloned(),
        }
    }

    /// Snapshot of `layout` and `effect`
    pub fn capture(layout: &FigureLayout, viewport: &Viewport, effect: &Effect3D) -> Self {
        Self::new(
            layout,
            viewport,
            effect.attributes(),
            &effect.light().copied().unwrap_or_default(),
            &effect.toon(),
            effect.sphere_map(),
        )
    }

    pub fn mvp(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn is_transparent(&self) -> bool {
        self.attributes.contains(EnvAttributes::SEMI_TRANSPARENT)
    }
}

/// A queued figure: its model, textures and posed vertices
#[derive(Debug)]
pub struct FigureEntry {
    pub model: Arc<Model>,
    pub textures: Vec<Texture>,
    pub staging: StagingBuffers,
    pub scene: SceneState,
}

#[derive(Debug)]
pub enum QueueEntry {
    Figure(FigureEntry),
    Primitives(PrimitiveBatch),
}

/// Lifecycle of a queue between flushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    #[default]
    Idle,
    Accumulating,
    FlushingOpaque,
    FlushingBlended,
}

/// The two replays of a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Opaque,
    Blended,
}

/// What a flush did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub entries: usize,
    pub draws: usize,
    /// Entry passes cut short by a backend error
    pub failures: usize,
}

/// Per-pass drawing context shared by all entries
struct PassContext<'b, B: GpuBackend + ?Sized> {
    backend: &'b mut B,
    filter: TextureFilter,
    pass: Pass,
    draws: usize,
}

impl<B: GpuBackend + ?Sized> PassContext<'_, B> {
    fn draw(&mut self, call: &DrawCall<'_>) -> std::result::Result<(), GpuBackendError> {
        self.backend.draw_indexed(call)?;
        self.draws += 1;
        Ok(())
    }

    fn upload(&mut self, texture: &Texture) -> std::result::Result<TextureHandle, GpuBackendError> {
        texture.handle(&mut *self.backend, self.filter)
    }

    fn sphere(&mut self, texture: Option<&Texture>) -> std::result::Result<Option<SphereMap>, GpuBackendError> {
        let Some(texture) = texture else {
            return Ok(None);
        };
        let handle = self.upload(texture)?;
        Ok(Some(SphereMap {
            handle,
            width: texture.width(),
            height: texture.height(),
        }))
    }

    fn figure(&mut self, entry: &FigureEntry) -> std::result::Result<(), GpuBackendError> {
        let model: &Model = &entry.model;
        let scene = &entry.scene;
        let transparent = scene.is_transparent();
        if self.pass == Pass::Blended && !transparent {
            return Ok(());
        }

        let normals = entry.staging.normals();
        let lit = scene.attributes.contains(EnvAttributes::LIGHTING) && normals.is_some();
        let sphere = if lit && scene.attributes.contains(EnvAttributes::SPHERE_MAP) {
            self.sphere(scene.sphere.as_ref())?
        } else {
            None
        };

        let positions = entry.staging.positions.as_slice();
        let material = model.texcoords();
        let normals = if lit { normals } else { None };
        let light = lit.then_some(scene.light);
        let toon = if lit { scene.toon } else { ToonParams::DISABLED };
        let (mvp, view) = (scene.mvp(), scene.view);
        let call = move |first: usize,
                         count: usize,
                         double_sided: bool,
                         blend: BlendMode,
                         texture: Option<TextureHandle>| DrawCall {
            topology: Topology::Triangles,
            positions,
            position_components: 3,
            normals,
            material_data: Some(material),
            texcoords: None,
            colors: VertexColors::None,
            first,
            count,
            blend,
            cull_back_faces: !double_sided,
            color_key: false,
            texture,
            sphere,
            mvp,
            model_view: view,
            light,
            toon,
        };

        for mode in BlendMode::ALL {
            // without transparency every bucket is drawn opaque in the first pass
            let blend = match (self.pass, transparent) {
                (Pass::Opaque, false) => BlendMode::Normal,
                (Pass::Opaque, true) if mode.is_blended() => continue,
                (Pass::Blended, _) if !mode.is_blended() => continue,
                _ => mode,
            };
            if model.has_textured() && !entry.textures.is_empty() {
                let faces = model.sub_meshes_textured()[mode.bucket()].len();
                for face in 0..faces {
                    let ranges = model.textured_ranges(mode, face);
                    if ranges.is_empty() {
                        continue;
                    }
                    let texture = match entry.textures.get(face) {
                        Some(t) => Some(self.upload(t)?),
                        None => None,
                    };
                    for (first, count, double_sided) in ranges {
                        self.draw(&call(first, count, double_sided, blend, texture))?;
                    }
                }
            }
            if model.has_colored() {
                for (first, count, double_sided) in model.colored_ranges(mode) {
                    self.draw(&call(first, count, double_sided, blend, None))?;
                }
            }
        }
        Ok(())
    }

    fn primitives(&mut self, batch: &PrimitiveBatch) -> std::result::Result<(), GpuBackendError> {
        let blend = batch.blend();
        if blend.is_blended() != (self.pass == Pass::Blended) {
            return Ok(());
        }

        let texture = match (&batch.texture, &batch.texcoords) {
            (Some(t), Some(_)) => Some(self.upload(t)?),
            _ => None,
        };
        let lit = batch.is_lit();
        let sphere = if batch.uses_sphere_map() {
            self.sphere(batch.scene.sphere.as_ref())?
        } else {
            None
        };
        let colors = match &batch.colors {
            BatchColors::None => VertexColors::None,
            BatchColors::Constant(rgb) => VertexColors::Constant(*rgb),
            BatchColors::PerVertex(rgb) => VertexColors::PerVertex(rgb),
        };
        // sprite corners are already in clip space
        let mvp = if batch.kind == PrimitiveKind::Sprites {
            Mat4::IDENTITY
        } else {
            batch.scene.mvp()
        };

        self.draw(&DrawCall {
            topology: batch.kind.topology(),
            positions: &batch.positions,
            position_components: batch.components,
            normals: if lit { batch.normals.as_deref() } else { None },
            material_data: None,
            texcoords: batch.texcoords.as_deref(),
            colors,
            first: 0,
            count: batch.vertex_count(),
            blend,
            cull_back_faces: false,
            color_key: batch.color_key(),
            texture,
            sphere,
            mvp,
            model_view: batch.scene.view,
            light: lit.then_some(batch.scene.light),
            toon: if lit { batch.scene.toon } else { ToonParams::DISABLED },
        })
    }
}

/// Queue of posted draws, replayed in two passes on flush
#[derive(Debug)]
pub struct RenderQueue {
    entries: Vec<QueueEntry>,
    state: QueueState,
    pool: StagingPool,
    filter: TextureFilter,
    viewport: Viewport,
    clip: ClipRect,
}

impl RenderQueue {
    pub fn new(options: &RenderOptions) -> Self {
        let viewport = Viewport::new(options.viewport.0, options.viewport.1);
        Self {
            entries: Vec::new(),
            state: QueueState::Idle,
            pool: StagingPool::new(options.staging_pool_limit),
            filter: options.texture_filter,
            viewport,
            clip: viewport.rect(),
        }
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Change the target size; the clip is reset to the whole surface
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.clip = viewport.rect();
    }

    pub fn clip(&self) -> ClipRect {
        self.clip
    }

    /// Restrict the next flush to `clip`, limited to the viewport
    pub fn set_clip(&mut self, clip: ClipRect) {
        self.clip = self.viewport.rect().intersect(&clip);
    }

    pub fn reset_clip(&mut self) {
        self.clip = self.viewport.rect();
    }

    pub fn pool(&self) -> &StagingPool {
        &self.pool
    }

    /// Queue `figure` with its bound textures
    pub fn post_figure(&mut self, figure: &FigureInstance, layout: &FigureLayout, effect: &Effect3D) {
        self.post_figure_with(figure, figure.textures().to_vec(), layout, effect);
    }

    /// Queue `figure` drawn with `textures`, one per model face
    pub fn post_figure_with(
        &mut self,
        figure: &FigureInstance,
        textures: Vec<Texture>,
        layout: &FigureLayout,
        effect: &Effect3D,
    ) {
        let model = Arc::clone(figure.model());
        let mut staging = self.pool.acquire(&model);
        figure.fill_staging(&mut staging);
        let scene = SceneState::capture(layout, &self.viewport, effect);
        trace!("Queued figure with {} staged vertices", staging.len());
        self.push(QueueEntry::Figure(FigureEntry {
            model,
            textures,
            staging,
            scene,
        }));
    }

    /// Queue a batch assembled by the command-list interpreter
    pub fn post_primitives(&mut self, batch: PrimitiveBatch) {
        trace!("Queued {:?} batch of {} vertices", batch.kind, batch.vertex_count());
        self.push(QueueEntry::Primitives(batch));
    }

    fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
        self.state = QueueState::Accumulating;
    }

    /// Drop every queued entry without drawing
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            if let QueueEntry::Figure(figure) = entry {
                self.pool.release(&figure.model, figure.staging);
            }
        }
        self.state = QueueState::Idle;
    }

    /// Draw every queued entry on `backend` and empty the queue
    ///
    /// Opaque buckets of all entries are drawn in posting order before any
    /// blended bucket. A backend error skips the rest of that entry's pass
    /// and the flush carries on with the next entry.
    pub fn flush<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> FlushReport {
        if self.entries.is_empty() {
            self.state = QueueState::Idle;
            return FlushReport::default();
        }

        let full = self.viewport.rect();
        backend.set_clip((self.clip != full).then_some(self.clip));

        let mut report = FlushReport {
            entries: self.entries.len(),
            ..FlushReport::default()
        };
        for (pass, state) in [
            (Pass::Opaque, QueueState::FlushingOpaque),
            (Pass::Blended, QueueState::FlushingBlended),
        ] {
            self.state = state;
            backend.set_depth_write(pass == Pass::Opaque);
            let mut context = PassContext {
                backend: &mut *backend,
                filter: self.filter,
                pass,
                draws: 0,
            };
            for (index, entry) in self.entries.iter().enumerate() {
                let result = match entry {
                    QueueEntry::Figure(figure) => context.figure(figure),
                    QueueEntry::Primitives(batch) => context.primitives(batch),
                };
                if let Err(e) = result {
                    warn!("Skipping rest of entry {index} in {pass:?} pass: {e}");
                    report.failures += 1;
                }
            }
            debug!("{pass:?} pass: {} draws", context.draws);
            report.draws += context.draws;
        }

        self.clear();
        self.pool.prune();
        backend.end_frame();
        debug!(
            "Flushed {} entries with {} draws ({} failures)",
            report.entries, report.draws, report.failures
        );
        report
    }
}

/// A bare queue has no backend, so a FLUSH in the command list is logged
/// and ignored; run command lists through `Renderer` to draw them.
impl CommandSink for RenderQueue {
    fn flush(&mut self) -> Result<()> {
        warn!(
            "Command list FLUSH ignored: queue has no backend ({} entries stay queued)",
            self.entries.len()
        );
        Ok(())
    }

    fn post_primitives(&mut self, batch: PrimitiveBatch) {
        Self::post_primitives(self, batch);
    }

    fn clip(&self) -> ClipRect {
        Self::clip(self)
    }

    fn set_clip(&mut self, clip: ClipRect) {
        Self::set_clip(self, clip);
    }
}
