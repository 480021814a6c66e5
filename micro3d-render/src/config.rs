//! Renderer options and their environment overrides

use std::fmt;
use std::str::FromStr;

use log::*;

/// Environment variable selecting the texture filter (`nearest` or `linear`)
pub const ENV_TEXTURE_FILTER: &str = "MICRO3D_TEXTURE_FILTER";
/// Environment variable selecting the viewport size (`WxH`)
pub const ENV_VIEWPORT: &str = "MICRO3D_VIEWPORT";

/// Sampling used for figure and sprite textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum TextureFilter {
    #[default]
    Nearest,
    Linear,
}

impl TextureFilter {
    pub fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
        }
    }
}

impl fmt::Display for TextureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextureFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            other => Err(format!("unknown texture filter '{other}'")),
        }
    }
}

/// Parse a `WxH` viewport size; both sides must be positive
pub fn parse_viewport(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Options shared by the render queue and its backend
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderOptions {
    pub texture_filter: TextureFilter,
    /// Target surface size in pixels
    pub viewport: (u32, u32),
    /// Staging buffers kept per model between flushes
    pub staging_pool_limit: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            texture_filter: TextureFilter::Nearest,
            viewport: (240, 320),
            staging_pool_limit: 4,
        }
    }
}

impl RenderOptions {
    /// Defaults overridden by `MICRO3D_TEXTURE_FILTER` and `MICRO3D_VIEWPORT`
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source; invalid values are logged
    /// and skipped
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_TEXTURE_FILTER) {
            match value.parse() {
                Ok(filter) => self.texture_filter = filter,
                Err(e) => warn!("Ignoring {ENV_TEXTURE_FILTER}: {e}"),
            }
        }
        if let Some(value) = lookup(ENV_VIEWPORT) {
            match parse_viewport(&value) {
                Some(viewport) => self.viewport = viewport,
                None => warn!("Ignoring {ENV_VIEWPORT}: '{value}' is not WxH"),
            }
        }
        self
    }
}
