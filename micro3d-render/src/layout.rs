//! Figure placement: view transforms, screen center and projection

use glam::Mat4;
use micro3d_data::AffineTrans;
use micro3d_data::fixed::TO_FLOAT;

use crate::backend::ClipRect;
use crate::error::{ArgumentError, Result};

/// Width used by a parallel-size projection given a width of 0
const DEFAULT_PARALLEL_WIDTH: f32 = 1600.0;

/// Target area of a draw in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn rect(&self) -> ClipRect {
        ClipRect::full(self.width, self.height)
    }
}

/// Projection parameters in the units the engine API takes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Projection {
    /// Orthographic; 4096 maps one model unit to one pixel
    ParallelScale { sx: i32, sy: i32 },
    /// Orthographic showing `width` × `height` model units; 0 picks a default
    ParallelSize { width: i32, height: i32 },
    /// Perspective; `angle` is the field of view in 4096-per-turn units
    PerspectiveFov { near: i32, far: i32, angle: i32 },
    /// Perspective with a near-plane size in fixed point; 0 uses the viewport
    PerspectiveWh {
        near: i32,
        far: i32,
        width: i32,
        height: i32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::ParallelScale { sx: 512, sy: 512 }
    }
}

fn check_depth_range(near: i32, far: i32) -> Result<()> {
    if near >= far || near < 1 || far > 32767 {
        return Err(ArgumentError::InvalidLayout(format!(
            "depth range {near}..{far} must satisfy 1 <= near < far <= 32767"
        ))
        .into());
    }
    Ok(())
}

fn check_size(width: i32, height: i32) -> Result<()> {
    if width < 0 || height < 0 {
        return Err(
            ArgumentError::InvalidLayout(format!("negative size {width}x{height}")).into(),
        );
    }
    Ok(())
}

/// Column-major orthographic matrix
fn parallel(sx: f32, sy: f32, tx: f32, ty: f32) -> Mat4 {
    Mat4::from_cols_array(&[
        sx, 0.0, 0.0, 0.0, //
        0.0, sy, 0.0, 0.0, //
        0.0, 0.0, 1.0 / 65536.0, 0.0, //
        tx, ty, 0.0, 1.0,
    ])
}

/// Column-major perspective matrix with an off-center principal point
fn perspective(sx: f32, sy: f32, near: f32, far: f32, tx: f32, ty: f32) -> Mat4 {
    let rd = 1.0 / (near - far);
    let sz = -(far + near) * rd;
    let tz = 2.0 * far * near * rd;
    Mat4::from_cols_array(&[
        sx, 0.0, 0.0, 0.0, //
        0.0, sy, 0.0, 0.0, //
        tx, ty, sz, 1.0, //
        0.0, 0.0, tz, 0.0,
    ])
}

impl Projection {
    /// Check the parameters against the accepted ranges
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::ParallelScale { .. } => Ok(()),
            Self::ParallelSize { width, height } => check_size(width, height),
            Self::PerspectiveFov { near, far, angle } => {
                check_depth_range(near, far)?;
                if !(1..=2047).contains(&angle) {
                    return Err(ArgumentError::InvalidLayout(format!(
                        "field of view {angle} outside 1..=2047"
                    ))
                    .into());
                }
                Ok(())
            }
            Self::PerspectiveWh {
                near,
                far,
                width,
                height,
            } => {
                check_depth_range(near, far)?;
                check_size(width, height)
            }
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::ParallelScale { .. } | Self::ParallelSize { .. })
    }

    /// Near plane distance; 0 for parallel projections
    pub fn near(&self) -> f32 {
        match *self {
            Self::PerspectiveFov { near, .. } | Self::PerspectiveWh { near, .. } => near as f32,
            _ => 0.0,
        }
    }

    /// GPU projection matrix for `viewport`, with the screen center at
    /// `center` pixels from the viewport origin
    pub fn matrix(&self, viewport: &Viewport, center: (i32, i32)) -> Mat4 {
        let vw = viewport.width as f32;
        let vh = viewport.height as f32;
        let tx = 2.0 * (center.0 + viewport.x) as f32 / vw - 1.0;
        let ty = 2.0 * (center.1 + viewport.y) as f32 / vh - 1.0;
        match *self {
            Self::ParallelScale { sx, sy } => {
                let w = vw * (4096.0 / sx as f32);
                let h = vh * (4096.0 / sy as f32);
                parallel(2.0 / w, 2.0 / h, tx, ty)
            }
            Self::ParallelSize { width, height } => {
                let w = if width == 0 {
                    DEFAULT_PARALLEL_WIDTH
                } else {
                    width as f32
                };
                let h = if height == 0 {
                    w * (vh / vw)
                } else {
                    height as f32
                };
                parallel(2.0 / w, 2.0 / h, tx, ty)
            }
            Self::PerspectiveFov { near, far, angle } => {
                let sx = 1.0 / (angle as f32 * TO_FLOAT * std::f32::consts::PI).tan();
                let sy = sx * (vw / vh);
                perspective(sx, sy, near as f32, far as f32, tx, ty)
            }
            Self::PerspectiveWh {
                near,
                far,
                width,
                height,
            } => {
                let width = if width == 0 {
                    vw
                } else {
                    width as f32 * TO_FLOAT
                };
                let height = if height == 0 {
                    vh
                } else {
                    height as f32 * TO_FLOAT
                };
                let n = near as f32;
                perspective(2.0 * n / width, 2.0 * n / height, n, far as f32, tx, ty)
            }
        }
    }
}

/// Where and how a figure is placed on screen
///
/// Holds an array of view transforms with one selected, the screen center
/// and a projection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FigureLayout {
    affines: Vec<AffineTrans>,
    selected: usize,
    center: (i32, i32),
    projection: Projection,
}

impl Default for FigureLayout {
    fn default() -> Self {
        Self {
            affines: vec![AffineTrans::IDENTITY],
            selected: 0,
            center: (0, 0),
            projection: Projection::default(),
        }
    }
}

impl FigureLayout {
    /// Single view transform, parallel-scale projection
    pub fn new(affine: AffineTrans, sx: i32, sy: i32, cx: i32, cy: i32) -> Self {
        Self {
            affines: vec![affine],
            selected: 0,
            center: (cx, cy),
            projection: Projection::ParallelScale { sx, sy },
        }
    }

    /// The selected view transform
    pub fn affine(&self) -> &AffineTrans {
        &self.affines[self.selected]
    }

    pub fn affines(&self) -> &[AffineTrans] {
        &self.affines
    }

    pub fn selected_affine(&self) -> usize {
        self.selected
    }

    /// Replace the transform array with a single transform
    pub fn set_affine(&mut self, affine: AffineTrans) {
        self.affines = vec![affine];
        self.selected = 0;
    }

    /// Replace the transform array and select its first entry
    pub fn set_affines(&mut self, affines: Vec<AffineTrans>) -> Result<()> {
        if affines.is_empty() {
            return Err(ArgumentError::InvalidLayout("empty transform array".into()).into());
        }
        self.affines = affines;
        self.selected = 0;
        Ok(())
    }

    pub fn select_affine(&mut self, index: usize) -> Result<()> {
        if index >= self.affines.len() {
            return Err(ArgumentError::AffineIndex {
                index,
                count: self.affines.len(),
            }
            .into());
        }
        self.selected = index;
        Ok(())
    }

    pub fn center(&self) -> (i32, i32) {
        self.center
    }

    pub fn set_center(&mut self, cx: i32, cy: i32) {
        self.center = (cx, cy);
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Validate and switch to `projection`; the layout is unchanged on error
    pub fn set_projection(&mut self, projection: Projection) -> Result<()> {
        projection.validate()?;
        self.projection = projection;
        Ok(())
    }

    pub fn set_scale(&mut self, sx: i32, sy: i32) {
        self.projection = Projection::ParallelScale { sx, sy };
    }

    pub fn set_parallel_size(&mut self, width: i32, height: i32) -> Result<()> {
        self.set_projection(Projection::ParallelSize { width, height })
    }

    pub fn set_perspective_fov(&mut self, near: i32, far: i32, angle: i32) -> Result<()> {
        self.set_projection(Projection::PerspectiveFov { near, far, angle })
    }

    pub fn set_perspective_wh(&mut self, near: i32, far: i32, width: i32, height: i32) -> Result<()> {
        self.set_projection(Projection::PerspectiveWh {
            near,
            far,
            width,
            height,
        })
    }

    /// Selected transform as a GPU view matrix
    pub fn view_matrix(&self) -> Mat4 {
        self.affine().to_mat4()
    }

    pub fn projection_matrix(&self, viewport: &Viewport) -> Mat4 {
        self.projection.matrix(viewport, self.center)
    }
}
