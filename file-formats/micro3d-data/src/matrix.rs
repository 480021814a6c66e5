//! Float 3×4 affine matrix used for bone poses and GPU uploads

use glam::{Mat4, Vec3, Vec4};

use crate::fixed::TO_FLOAT;

/// Row-major float affine transform
///
/// The rotation block is in real units; the translation column is in model
/// units, the vertex space models are stored in.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix34 {
    data: [f32; 12],
}

impl Default for Matrix34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix34 {
    pub const IDENTITY: Self = Self {
        data: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    };

    pub const ZERO: Self = Self { data: [0.0; 12] };

    pub const fn from_array(data: [f32; 12]) -> Self {
        Self { data }
    }

    /// Decode twelve file values: rotation scaled by 1/4096, translation raw
    pub fn from_fixed_i16(values: &[i16; 12]) -> Self {
        let mut data = [0.0f32; 12];
        for (i, (dst, &v)) in data.iter_mut().zip(values).enumerate() {
            *dst = if i % 4 == 3 {
                f32::from(v)
            } else {
                f32::from(v) * TO_FLOAT
            };
        }
        Self { data }
    }

    pub fn to_array(&self) -> [f32; 12] {
        self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * 4 + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * 4 + col] = value;
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.data[3], self.data[7], self.data[11])
    }

    pub fn set_translation(&mut self, t: Vec3) {
        self.data[3] = t.x;
        self.data[7] = t.y;
        self.data[11] = t.z;
    }

    /// `self · rhs` with the translation of `rhs` rotated by `self`
    pub fn mul(&self, rhs: &Self) -> Self {
        let l = &self.data;
        let r = &rhs.data;
        let mut out = [0.0f32; 12];
        for row in 0..3 {
            let (a0, a1, a2, a3) = (l[row * 4], l[row * 4 + 1], l[row * 4 + 2], l[row * 4 + 3]);
            for col in 0..4 {
                out[row * 4 + col] = a0 * r[col] + a1 * r[4 + col] + a2 * r[8 + col];
            }
            out[row * 4 + 3] += a3;
        }
        Self { data: out }
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let m = &self.data;
        Vec3::new(
            m[0] * p.x + m[1] * p.y + m[2] * p.z + m[3],
            m[4] * p.x + m[5] * p.y + m[6] * p.z + m[7],
            m[8] * p.x + m[9] * p.y + m[10] * p.z + m[11],
        )
    }

    /// Rotate a direction, ignoring translation
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let m = &self.data;
        Vec3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z,
            m[4] * v.x + m[5] * v.y + m[6] * v.z,
            m[8] * v.x + m[9] * v.y + m[10] * v.z,
        )
    }

    /// Expand to a column-major 4×4 with `(0, 0, 0, 1)` as the last row
    pub fn to_mat4(&self) -> Mat4 {
        let m = &self.data;
        Mat4::from_cols(
            Vec4::new(m[0], m[4], m[8], 0.0),
            Vec4::new(m[1], m[5], m[9], 0.0),
            Vec4::new(m[2], m[6], m[10], 0.0),
            Vec4::new(m[3], m[7], m[11], 1.0),
        )
    }
}
