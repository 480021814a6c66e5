//! Figures, command lists and the two-pass render queue of the micro3d
//! engine
//!
//! Decoded models become posed [`FigureInstance`]s; those and the primitive
//! batches produced by the command-list interpreter are queued with a
//! snapshot of their layout and effect, then replayed on a [`GpuBackend`]
//! in an opaque pass followed by a blended pass.
//!
//! ```rust,no_run
//! use micro3d_mtra::ActionTable;
//! use micro3d_render::{
//!     Effect3D, FigureInstance, FigureLayout, RecordingBackend, RenderOptions, Renderer, Texture,
//! };
//!
//! let mut figure = FigureInstance::from_bytes(&std::fs::read("hero.mbac")?)?;
//! figure.set_texture(Texture::decode(&std::fs::read("hero.bmp")?, false)?)?;
//! let actions = ActionTable::parse(&std::fs::read("hero.mtra")?)?;
//! figure.set_posture(&actions, 0, 3 << 16)?;
//!
//! let renderer = Renderer::new(RecordingBackend::new(), RenderOptions::from_env());
//! let mut layout = FigureLayout::default();
//! layout.set_center(120, 160);
//! renderer.post_figure(&figure, &layout, &Effect3D::default());
//! let report = renderer.flush();
//! println!("{} draws", report.draws);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod effect;
pub mod error;
pub mod figure;
pub mod layout;
pub mod queue;
pub mod renderer;
pub mod staging;
pub mod texture;

pub use backend::{
    BackendEvent, ClipRect, DrawCall, DrawRecord, GpuBackend, LightParams, RecordingBackend,
    SphereMap, ToonParams, Topology, VertexColors,
};
pub use command::{CommandListVm, CommandSink, Payload, PrimitiveBatch, PrimitiveKind};
pub use config::{RenderOptions, TextureFilter};
pub use effect::{Effect3D, EnvAttributes, Light, Shading, ToonSettings};
pub use error::{ArgumentError, FormatError, GpuBackendError, RenderError, Result};
pub use figure::{FigureInstance, StagingBuffers};
pub use layout::{FigureLayout, Projection, Viewport};
pub use queue::{FlushReport, QueueEntry, QueueState, RenderQueue, SceneState};
pub use renderer::Renderer;
pub use staging::StagingPool;
pub use texture::{Texture, TextureHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
