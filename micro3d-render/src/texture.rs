//! Shared textures and their GPU handles
//!
//! A [`Texture`] is an immutable decoded image behind an `Arc`, so figures,
//! effects and queued entries can hold it without copying pixels. The GPU
//! copy is created lazily the first time a backend needs it and re-created
//! whenever the backend's context generation moves on.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::*;
use micro3d_bmp::TextureImage;
use parking_lot::Mutex;

use crate::backend::GpuBackend;
use crate::config::TextureFilter;
use crate::error::{GpuBackendError, Result};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// A fresh process-wide texture id; ids are never handed out twice
pub fn next_texture_id() -> u64 {
    NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Name of an uploaded texture within one backend context generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub id: u64,
    pub generation: u64,
}

struct TextureInner {
    image: TextureImage,
    is_sphere: bool,
    handle: Mutex<Option<TextureHandle>>,
}

/// A decoded texture shared between figures, effects and queued draws
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    /// Wrap a decoded image; `is_sphere` marks a sphere-map (specular)
    /// texture
    pub fn new(image: TextureImage, is_sphere: bool) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                image,
                is_sphere,
                handle: Mutex::new(None),
            }),
        }
    }

    /// Decode an 8-bit paletted BMP
    pub fn decode(data: &[u8], is_sphere: bool) -> Result<Self> {
        let image = TextureImage::decode(data)?;
        Ok(Self::new(image, is_sphere))
    }

    pub fn image(&self) -> &TextureImage {
        &self.inner.image
    }

    pub fn width(&self) -> u32 {
        self.inner.image.width
    }

    pub fn height(&self) -> u32 {
        self.inner.image.height
    }

    pub fn is_sphere(&self) -> bool {
        self.inner.is_sphere
    }

    /// Handle of the last upload, valid or not
    pub fn cached_handle(&self) -> Option<TextureHandle> {
        *self.inner.handle.lock()
    }

    /// GPU handle for `backend`, uploading when there is none yet or the
    /// cached one belongs to an older context generation
    pub fn handle<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        filter: TextureFilter,
    ) -> std::result::Result<TextureHandle, GpuBackendError> {
        let generation = backend.generation();
        let mut slot = self.inner.handle.lock();
        if let Some(handle) = *slot {
            if handle.generation == generation {
                return Ok(handle);
            }
            debug!(
                "Texture {} is stale (generation {} -> {generation})",
                handle.id, handle.generation
            );
        }

        let handle = TextureHandle {
            id: next_texture_id(),
            generation,
        };
        backend.upload_texture(handle, &self.inner.image, filter)?;
        *slot = Some(handle);
        Ok(handle)
    }

    /// Both values refer to the same decoded image
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("is_sphere", &self.is_sphere())
            .field("handle", &self.cached_handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEvent, RecordingBackend};
    use pretty_assertions::assert_eq;

    fn image() -> TextureImage {
        TextureImage {
            width: 1,
            height: 1,
            rgba: vec![1, 2, 3, 255],
        }
    }

    #[test]
    fn test_upload_once_per_generation() {
        let texture = Texture::new(image(), false);
        let mut backend = RecordingBackend::new();

        let first = texture.handle(&mut backend, TextureFilter::Nearest).unwrap();
        let again = texture.handle(&mut backend, TextureFilter::Nearest).unwrap();
        assert_eq!(first, again);
        assert_eq!(backend.events().len(), 1);

        backend.reset_context();
        let fresh = texture.handle(&mut backend, TextureFilter::Nearest).unwrap();
        assert!(fresh.id > first.id);
        assert_eq!(fresh.generation, first.generation + 1);
        assert!(matches!(
            backend.events().last(),
            Some(BackendEvent::Upload { width: 1, height: 1, .. })
        ));
    }

    #[test]
    fn test_clones_share_the_handle() {
        let texture = Texture::new(image(), true);
        let copy = texture.clone();
        let mut backend = RecordingBackend::new();
        let handle = texture.handle(&mut backend, TextureFilter::Linear).unwrap();
        assert_eq!(copy.cached_handle(), Some(handle));
        assert_eq!(copy, texture);
        assert_ne!(Texture::new(image(), true), texture);
    }
}
