//! Lighting, shading and transparency settings applied to a draw

use bitflags::bitflags;
use glam::Vec3;
use micro3d_data::Vec3i;
use micro3d_data::fixed::ONE;

use crate::backend::{LightParams, ToonParams};
use crate::error::{ArgumentError, Result};
use crate::texture::Texture;

bitflags! {
    /// Environment attributes, as carried by the `ATTRIBUTE` command
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EnvAttributes: u32 {
        const LIGHTING = 1;
        const SPHERE_MAP = 2;
        const TOON_SHADING = 4;
        const SEMI_TRANSPARENT = 8;
    }
}

/// Ambient plus one directional light, fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Light {
    pub ambient: i32,
    pub directional: i32,
    /// Direction the light travels
    pub direction: Vec3i,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            ambient: ONE,
            directional: 0,
            direction: Vec3i::new(0, 0, ONE),
        }
    }
}

impl Light {
    pub const fn new(ambient: i32, directional: i32, direction: Vec3i) -> Self {
        Self {
            ambient,
            directional,
            direction,
        }
    }

    /// Clamped and scaled values for the backend
    pub fn params(&self) -> LightParams {
        let d = self.direction.to_real();
        let d = if d == Vec3::ZERO { Vec3::Z } else { d.normalize() };
        LightParams {
            ambient: self.ambient.clamp(0, ONE) as f32 / ONE as f32,
            directional: self.directional.clamp(0, ONE * 4) as f32 / ONE as f32,
            direction: -d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shading {
    #[default]
    Normal,
    Toon,
}

/// Two-tone shading: intensities above `threshold` get `high`, the rest
/// `low`; all three are 0..=255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToonSettings {
    pub threshold: u8,
    pub high: u8,
    pub low: u8,
}

fn toon_channel(name: &str, value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|_| {
        ArgumentError::InvalidEffect(format!("toon {name} {value} outside 0..=255")).into()
    })
}

impl ToonSettings {
    pub fn new(threshold: i32, high: i32, low: i32) -> Result<Self> {
        Ok(Self {
            threshold: toon_channel("threshold", threshold)?,
            high: toon_channel("high", high)?,
            low: toon_channel("low", low)?,
        })
    }

    /// Uniforms for `attrs`; disabled unless TOON_SHADING is set
    pub fn params(&self, attrs: EnvAttributes) -> ToonParams {
        if !attrs.contains(EnvAttributes::TOON_SHADING) {
            return ToonParams::DISABLED;
        }
        ToonParams {
            threshold: f32::from(self.threshold) / 255.0,
            high: f32::from(self.high) / 255.0,
            low: f32::from(self.low) / 255.0,
        }
    }
}

/// Rendering effect applied to figures and command lists
#[derive(Debug, Clone, PartialEq)]
pub struct Effect3D {
    light: Option<Light>,
    shading: Shading,
    transparency: bool,
    sphere: Option<Texture>,
    toon: ToonSettings,
}

impl Default for Effect3D {
    fn default() -> Self {
        Self {
            light: None,
            shading: Shading::Normal,
            transparency: true,
            sphere: None,
            toon: ToonSettings::default(),
        }
    }
}

impl Effect3D {
    pub fn new(
        light: Option<Light>,
        shading: Shading,
        transparency: bool,
        sphere: Option<Texture>,
    ) -> Result<Self> {
        let mut effect = Self {
            light,
            shading,
            transparency,
            ..Self::default()
        };
        effect.set_sphere_map(sphere)?;
        Ok(effect)
    }

    pub fn light(&self) -> Option<&Light> {
        self.light.as_ref()
    }

    pub fn set_light(&mut self, light: Option<Light>) {
        self.light = light;
    }

    pub fn shading(&self) -> Shading {
        self.shading
    }

    pub fn set_shading(&mut self, shading: Shading) {
        self.shading = shading;
    }

    pub fn transparency(&self) -> bool {
        self.transparency
    }

    pub fn set_transparency(&mut self, enabled: bool) {
        self.transparency = enabled;
    }

    pub fn sphere_map(&self) -> Option<&Texture> {
        self.sphere.as_ref()
    }

    /// Set the specular map; only sphere-map textures are accepted
    pub fn set_sphere_map(&mut self, texture: Option<Texture>) -> Result<()> {
        if texture.as_ref().is_some_and(|t| !t.is_sphere()) {
            return Err(ArgumentError::SphereTextureExpected.into());
        }
        self.sphere = texture;
        Ok(())
    }

    pub fn toon(&self) -> ToonSettings {
        self.toon
    }

    pub fn set_toon_params(&mut self, threshold: i32, high: i32, low: i32) -> Result<()> {
        self.toon = ToonSettings::new(threshold, high, low)?;
        Ok(())
    }

    pub fn attributes(&self) -> EnvAttributes {
        let mut attrs = EnvAttributes::empty();
        attrs.set(EnvAttributes::LIGHTING, self.light.is_some());
        attrs.set(EnvAttributes::TOON_SHADING, self.shading == Shading::Toon);
        attrs.set(EnvAttributes::SEMI_TRANSPARENT, self.transparency);
        attrs.set(EnvAttributes::SPHERE_MAP, self.sphere.is_some());
        attrs
    }
}
