//! Thread-safe front end owning the queue and the GPU backend

use log::*;
use parking_lot::Mutex;

use crate::backend::{ClipRect, GpuBackend};
use crate::command::{CommandListVm, CommandSink, Payload, PrimitiveBatch};
use crate::config::RenderOptions;
use crate::effect::Effect3D;
use crate::error::Result;
use crate::figure::FigureInstance;
use crate::layout::{FigureLayout, Viewport};
use crate::queue::{FlushReport, RenderQueue};
use crate::texture::Texture;

struct RendererState<B> {
    queue: RenderQueue,
    backend: B,
    options: RenderOptions,
}

impl<B: GpuBackend> RendererState<B> {
    fn flush_queue(&mut self) -> FlushReport {
        self.queue.flush(&mut self.backend)
    }
}

impl<B: GpuBackend> CommandSink for RendererState<B> {
    fn post_primitives(&mut self, batch: PrimitiveBatch) {
        self.queue.post_primitives(batch);
    }

    fn clip(&self) -> ClipRect {
        self.queue.clip()
    }

    fn set_clip(&mut self, clip: ClipRect) {
        self.queue.set_clip(clip);
    }

    fn flush(&mut self) -> Result<()> {
        let report = self.flush_queue();
        debug!("Command list flush drew {} entries", report.entries);
        Ok(())
    }
}

/// Queue and backend behind one lock
///
/// Every method takes the lock for its whole duration, so posting, command
/// list execution and flushing from several threads are serialized against
/// the single GPU context.
pub struct Renderer<B: GpuBackend> {
    state: Mutex<RendererState<B>>,
}

impl<B: GpuBackend> Renderer<B> {
    pub fn new(backend: B, options: RenderOptions) -> Self {
        debug!(
            "Renderer {}x{}, {} filtering",
            options.viewport.0, options.viewport.1, options.texture_filter
        );
        Self {
            state: Mutex::new(RendererState {
                queue: RenderQueue::new(&options),
                backend,
                options,
            }),
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.state.lock().options.clone()
    }

    pub fn viewport(&self) -> Viewport {
        self.state.lock().queue.viewport()
    }

    /// Retarget the renderer; the clip is reset to the new surface
    pub fn set_viewport(&self, viewport: Viewport) {
        let mut state = self.state.lock();
        state.options.viewport = (viewport.width, viewport.height);
        state.queue.set_viewport(viewport);
    }

    pub fn clip(&self) -> ClipRect {
        self.state.lock().queue.clip()
    }

    pub fn set_clip(&self, clip: ClipRect) {
        self.state.lock().queue.set_clip(clip);
    }

    pub fn reset_clip(&self) {
        self.state.lock().queue.reset_clip();
    }

    /// Queue `figure` with every texture bound to it, one per face
    pub fn post_figure(&self, figure: &FigureInstance, layout: &FigureLayout, effect: &Effect3D) {
        self.state.lock().queue.post_figure(figure, layout, effect);
    }

    /// Queue `figure` with only its selected texture, then flush
    pub fn draw_figure(
        &self,
        figure: &FigureInstance,
        layout: &FigureLayout,
        effect: &Effect3D,
    ) -> FlushReport {
        let textures = figure.texture().cloned().into_iter().collect();
        let mut state = self.state.lock();
        state.queue.post_figure_with(figure, textures, layout, effect);
        state.flush_queue()
    }

    /// Interpret `commands` against `textures`, queueing what they draw
    ///
    /// Returns the number of primitive batches queued. A `FLUSH` command
    /// flushes immediately; anything queued after it waits for the next
    /// [`Renderer::flush`].
    pub fn draw_command_list(
        &self,
        textures: &[Texture],
        commands: &[i32],
        layout: &FigureLayout,
        effect: &Effect3D,
    ) -> Result<usize> {
        let mut state = self.state.lock();
        let viewport = state.queue.viewport();
        let mut vm = CommandListVm::new(textures, layout, effect, viewport);
        vm.execute(commands, &mut *state)
    }

    /// Queue a single primitive command whose payload comes in separate
    /// arrays; returns whether anything was queued
    pub fn render_primitives(
        &self,
        texture: Option<&Texture>,
        command: i32,
        count: u8,
        payload: Payload<'_>,
        layout: &FigureLayout,
        effect: &Effect3D,
    ) -> Result<bool> {
        let textures: Vec<Texture> = texture.cloned().into_iter().collect();
        let mut state = self.state.lock();
        let viewport = state.queue.viewport();
        let mut vm = CommandListVm::new(&textures, layout, effect, viewport);
        vm.post_primitives(command, count, payload, &mut *state)
    }

    /// Draw everything queued in two passes
    pub fn flush(&self) -> FlushReport {
        self.state.lock().flush_queue()
    }

    /// Drop everything queued without drawing
    pub fn reset(&self) {
        self.state.lock().queue.clear();
    }

    /// Number of queued entries
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.state.lock().backend)
    }

    pub fn with_queue<R>(&self, f: impl FnOnce(&RenderQueue) -> R) -> R {
        f(&self.state.lock().queue)
    }

    pub fn into_backend(self) -> B {
        self.state.into_inner().backend
    }
}
