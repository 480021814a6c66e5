//! Two-pass flush ordering and figure posing through the renderer

use std::sync::Arc;

use glam::Vec3;
use micro3d_bmp::TextureImage;
use micro3d_data::BitWriter;
use micro3d_mbac::{BlendMode, Model};
use micro3d_mtra::ActionTable;
use micro3d_render::{
    BackendEvent, DrawCall, Effect3D, FigureInstance, FigureLayout, GpuBackend, GpuBackendError,
    QueueEntry, QueueState, RecordingBackend, RenderOptions, RenderQueue, Renderer, Texture, TextureFilter,
    TextureHandle, Topology,
};
use pretty_assertions::assert_eq;

/// Route flush warnings to the test output
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn identity_bone(w: &mut BitWriter, vertices: u16, parent: i16, t: [i16; 3]) {
    w.write_u16_le(vertices).write_i16_le(parent);
    for (row, offset) in t.iter().enumerate() {
        for col in 0..3 {
            w.write_i16_le(if row == col { 4096 } else { 0 });
        }
        w.write_i16_le(*offset);
    }
}

/// Version 4 model with one textured triangle of the given material
fn triangle_model(material: u32) -> Arc<Model> {
    let mut w = BitWriter::new();
    w.write_bytes(b"MB").write_u8(4).write_u8(0);
    w.write_bytes(&[1, 0, 2, 1]);
    w.write_u16_le(3).write_u16_le(1).write_u16_le(0).write_u16_le(1);
    for v in [0i16, 0, 0, 100, 0, 0, 0, 100, 0] {
        w.write_i16_le(v);
    }
    // material bits, index bits
    w.write_bytes(&[7, 2]);
    w.write_bits(material, 7);
    for corner in [0, 1, 2] {
        w.write_bits(corner, 2);
    }
    for uv in [0, 0, 7, 0, 0, 7] {
        w.write_bits(uv, 7);
    }
    w.flush_bits();
    identity_bone(&mut w, 3, -1, [0, 0, 0]);
    w.write_bytes(&[0; 20]);
    Arc::new(Model::parse(&w.into_inner()).unwrap())
}

/// Version 3 model: bone 0 owns vertices 0-2, bone 1 owns vertices 3-5
fn six_vertex_model() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bytes(b"MB").write_u8(3).write_u8(0);
    w.write_u16_le(6).write_u16_le(1).write_u16_le(0).write_u16_le(2);
    for v in [
        0i16, 0, 0, 4096, 0, 0, 0, 4096, 0, 10, 20, 30, -40, 50, 60, 70, 80, -90,
    ] {
        w.write_i16_le(v);
    }
    w.write_u16_le(0);
    w.write_u16_le(0).write_u16_le(1).write_u16_le(2);
    w.write_bytes(&[0, 0, 1, 0, 0, 1]);
    identity_bone(&mut w, 3, -1, [0, 0, 0]);
    identity_bone(&mut w, 3, 0, [0, 0, 0]);
    w.into_inner()
}

/// One action: bone 0 identity, bone 1 a static translation of 100 along X
fn static_translation_actions() -> ActionTable {
    let mut w = BitWriter::new();
    w.write_bytes(b"MT").write_u8(3).write_u8(0);
    w.write_u16_le(1).write_u16_le(2);
    for _ in 0..8 {
        w.write_u16_le(0);
    }
    w.write_i32_le(0);
    w.write_u16_le(1);
    w.write_u8(1);
    w.write_u8(0);
    for v in [4096i16, 0, 0, 100, 0, 4096, 0, 0, 0, 0, 4096, 0] {
        w.write_i16_le(v);
    }
    ActionTable::parse(&w.into_inner()).unwrap()
}

fn texture() -> Texture {
    let image = TextureImage {
        width: 8,
        height: 8,
        rgba: vec![255; 8 * 8 * 4],
    };
    Texture::new(image, false)
}

fn figure(material: u32, texture: &Texture) -> FigureInstance {
    let mut figure = FigureInstance::new(triangle_model(material));
    figure.set_texture(texture.clone()).unwrap();
    figure
}

const HALF: u32 = 2;
const ADD: u32 = 4;

#[test]
fn test_opaque_buckets_of_all_entries_come_first() {
    let tex = texture();
    let opaque = figure(0, &tex);
    let blended = figure(ADD, &tex);
    let layout = FigureLayout::default();
    let effect = Effect3D::default();

    let mut queue = RenderQueue::new(&RenderOptions::default());
    queue.post_figure(&blended, &layout, &effect);
    queue.post_figure(&opaque, &layout, &effect);
    assert_eq!(queue.state(), QueueState::Accumulating);

    let mut backend = RecordingBackend::new();
    let report = queue.flush(&mut backend);
    assert_eq!(report.entries, 2);
    assert_eq!(report.draws, 2);
    assert_eq!(report.failures, 0);
    assert_eq!(queue.state(), QueueState::Idle);
    assert!(queue.is_empty());

    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].blend, BlendMode::Normal);
    assert!(draws[0].depth_write);
    assert_eq!(draws[1].blend, BlendMode::Add);
    assert!(!draws[1].depth_write);
    assert!(draws.iter().all(|d| d.topology == Topology::Triangles && d.count == 3));

    let events = backend.events();
    assert_eq!(events[0], BackendEvent::Clip(None));
    assert_eq!(events[1], BackendEvent::DepthWrite(true));
    assert_eq!(events.last(), Some(&BackendEvent::EndFrame));
    let uploads = events
        .iter()
        .filter(|e| matches!(e, BackendEvent::Upload { .. }))
        .count();
    assert_eq!(uploads, 1);
}

#[test]
fn test_opaque_entries_keep_submission_order() {
    let first = texture();
    let second = texture();
    let layout = FigureLayout::default();
    let effect = Effect3D::default();

    let mut queue = RenderQueue::new(&RenderOptions::default());
    queue.post_figure(&figure(0, &first), &layout, &effect);
    queue.post_figure(&figure(HALF, &second), &layout, &effect);
    queue.post_figure(&figure(0, &second), &layout, &effect);

    let mut backend = RecordingBackend::new();
    queue.flush(&mut backend);
    let first_id = first.cached_handle().unwrap().id;
    let second_id = second.cached_handle().unwrap().id;
    let order: Vec<(Option<u64>, BlendMode)> = backend
        .draws()
        .iter()
        .map(|d| (d.texture, d.blend))
        .collect();
    assert_eq!(
        order,
        vec![
            (Some(first_id), BlendMode::Normal),
            (Some(second_id), BlendMode::Normal),
            (Some(second_id), BlendMode::Half),
        ]
    );
}

#[test]
fn test_blended_polygons_are_opaque_without_transparency() {
    let tex = texture();
    let mut effect = Effect3D::default();
    effect.set_transparency(false);

    let mut queue = RenderQueue::new(&RenderOptions::default());
    queue.post_figure(&figure(ADD, &tex), &FigureLayout::default(), &effect);
    let mut backend = RecordingBackend::new();
    queue.flush(&mut backend);

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].blend, BlendMode::Normal);
    assert!(draws[0].depth_write);
}

#[test]
fn test_untextured_figure_draws_nothing() {
    let mut queue = RenderQueue::new(&RenderOptions::default());
    let bare = FigureInstance::new(triangle_model(0));
    queue.post_figure(&bare, &FigureLayout::default(), &Effect3D::default());
    let mut backend = RecordingBackend::new();
    let report = queue.flush(&mut backend);
    assert_eq!(report.entries, 1);
    assert_eq!(report.draws, 0);
}

#[test]
fn test_queued_figure_is_immune_to_later_changes() {
    let tex = texture();
    let mut live = figure(0, &tex);
    let mut layout = FigureLayout::default();
    let mut queue = RenderQueue::new(&RenderOptions::default());
    queue.post_figure(&live, &layout, &Effect3D::default());

    layout.set_center(120, 160);
    live.set_texture(texture()).unwrap();

    let QueueEntry::Figure(entry) = &queue.entries()[0] else {
        panic!("expected a figure entry");
    };
    assert_eq!(
        entry.staging.positions,
        vec![0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 100.0, 0.0]
    );
    assert_eq!(entry.scene.projection.col(3).x, -1.0);
    assert_eq!(entry.textures, vec![tex]);
}

#[test]
fn test_staging_buffers_are_recycled() {
    let tex = texture();
    let fig = figure(0, &tex);
    let layout = FigureLayout::default();
    let effect = Effect3D::default();
    let mut queue = RenderQueue::new(&RenderOptions::default());
    let mut backend = RecordingBackend::new();

    queue.post_figure(&fig, &layout, &effect);
    queue.post_figure(&fig, &layout, &effect);
    queue.flush(&mut backend);
    assert_eq!(queue.pool().pooled(fig.model()), 2);

    queue.post_figure(&fig, &layout, &effect);
    assert_eq!(queue.pool().pooled(fig.model()), 1);
    queue.clear();
    assert_eq!(queue.pool().pooled(fig.model()), 2);
    assert_eq!(queue.state(), QueueState::Idle);
}

/// Fails the first `failures` draws, then records like [`RecordingBackend`]
struct FlakyBackend {
    inner: RecordingBackend,
    failures: usize,
}

impl GpuBackend for FlakyBackend {
    fn generation(&self) -> u64 {
        self.inner.generation()
    }

    fn upload_texture(
        &mut self,
        handle: TextureHandle,
        image: &TextureImage,
        filter: TextureFilter,
    ) -> Result<(), GpuBackendError> {
        self.inner.upload_texture(handle, image, filter)
    }

    fn set_clip(&mut self, clip: Option<micro3d_render::ClipRect>) {
        self.inner.set_clip(clip);
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.inner.set_depth_write(enabled);
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) -> Result<(), GpuBackendError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(GpuBackendError::Draw("out of memory".into()));
        }
        self.inner.draw_indexed(call)
    }

    fn end_frame(&mut self) {
        self.inner.end_frame();
    }
}

#[test]
fn test_failed_draw_skips_only_that_entry() {
    init_logging();
    let tex = texture();
    let layout = FigureLayout::default();
    let effect = Effect3D::default();
    let mut queue = RenderQueue::new(&RenderOptions::default());
    queue.post_figure(&figure(0, &tex), &layout, &effect);
    queue.post_figure(&figure(0, &tex), &layout, &effect);

    let mut backend = FlakyBackend {
        inner: RecordingBackend::new(),
        failures: 1,
    };
    let report = queue.flush(&mut backend);
    assert_eq!(report.failures, 1);
    assert_eq!(report.draws, 1);
    assert_eq!(backend.inner.draws().len(), 1);
    assert_eq!(backend.inner.events().last(), Some(&BackendEvent::EndFrame));
    assert!(queue.is_empty());
}

#[test]
fn test_lost_context_reuploads_textures() {
    let tex = texture();
    let fig = figure(0, &tex);
    let renderer = Renderer::new(RecordingBackend::new(), RenderOptions::default());
    let layout = FigureLayout::default();
    let effect = Effect3D::default();

    renderer.draw_figure(&fig, &layout, &effect);
    let before = tex.cached_handle().unwrap();
    renderer.with_backend(RecordingBackend::reset_context);
    renderer.draw_figure(&fig, &layout, &effect);
    let after = tex.cached_handle().unwrap();
    assert_ne!(before.id, after.id);
    assert_eq!(after.generation, before.generation + 1);
}

#[test]
fn test_static_bone_moves_child_vertices() {
    let mut figure = FigureInstance::from_bytes(&six_vertex_model()).unwrap();
    let rest: Vec<Vec3> = figure.positions().to_vec();
    figure
        .set_posture(&static_translation_actions(), 0, 0)
        .unwrap();

    let world = figure.world_position(3).unwrap();
    assert_eq!(world, rest[3] / 4096.0 + Vec3::new(100.0 / 4096.0, 0.0, 0.0));
    assert_eq!(figure.world_position(0), Some(rest[0] / 4096.0));
}

#[test]
fn test_invalid_action_leaves_pose_untouched() {
    let mut figure = FigureInstance::from_bytes(&six_vertex_model()).unwrap();
    let actions = static_translation_actions();
    figure.set_posture(&actions, 0, 0).unwrap();
    let posed = figure.positions().to_vec();

    let err = figure.set_posture(&actions, 1, 0).unwrap_err();
    assert_eq!(
        err.as_argument(),
        Some(&micro3d_render::ArgumentError::ActionIndex { index: 1, count: 1 })
    );
    assert_eq!(figure.positions(), posed.as_slice());
}

#[test]
fn test_bare_queue_keeps_entries_on_command_flush() {
    use micro3d_render::command::{
        CommandListVm, FLUSH, PDATA_COLOR_PER_COMMAND, PRIMITIVE_TRIANGLES, VERSION_1_0,
    };

    init_logging();
    let mut commands = vec![
        VERSION_1_0 as i32,
        PRIMITIVE_TRIANGLES | 1 << 16 | PDATA_COLOR_PER_COMMAND,
    ];
    commands.extend_from_slice(&[0, 0, 0, 100, 0, 0, 0, 100, 0, 0x00FF_0000]);
    commands.push(FLUSH as i32);

    let options = RenderOptions::default();
    let mut queue = RenderQueue::new(&options);
    let layout = FigureLayout::default();
    let effect = Effect3D::default();
    let viewport = micro3d_render::Viewport::new(options.viewport.0, options.viewport.1);
    let mut vm = CommandListVm::new(&[], &layout, &effect, viewport);

    assert_eq!(vm.execute(&commands, &mut queue).unwrap(), 1);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.state(), QueueState::Accumulating);
}

#[test]
fn test_flush_prunes_staging_of_dropped_models() {
    let tex = texture();
    let layout = FigureLayout::default();
    let effect = Effect3D::default();
    let mut queue = RenderQueue::new(&RenderOptions::default());
    let mut backend = RecordingBackend::new();

    let kept = figure(0, &tex);
    queue.post_figure(&kept, &layout, &effect);
    queue.flush(&mut backend);
    for _ in 0..8 {
        let transient = figure(0, &tex);
        queue.post_figure(&transient, &layout, &effect);
        queue.flush(&mut backend);
    }
    queue.post_figure(&kept, &layout, &effect);
    queue.flush(&mut backend);
    assert_eq!(queue.pool().slots(), 1);
    assert_eq!(queue.pool().pooled(kept.model()), 1);
}
