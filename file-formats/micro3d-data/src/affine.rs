//! Fixed-point 3×4 affine transforms
//!
//! Rotation entries are scaled by 4096; the translation column is in model
//! units and is never rescaled. Products round every entry with
//! `(sum + 2048) >> 12`.

use crate::fixed::{self, ONE, TO_FLOAT, Vec3i};
use crate::matrix::Matrix34;

/// Fixed-point affine transform stored as three rows of four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AffineTrans {
    pub m: [[i32; 4]; 3],
}

impl Default for AffineTrans {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[inline]
fn round12(sum: i32) -> i32 {
    sum.wrapping_add(2048) >> 12
}

#[inline]
fn dot3(a0: i32, a1: i32, a2: i32, b0: i32, b1: i32, b2: i32) -> i32 {
    a0.wrapping_mul(b0)
        .wrapping_add(a1.wrapping_mul(b1))
        .wrapping_add(a2.wrapping_mul(b2))
}

impl AffineTrans {
    pub const IDENTITY: Self = Self {
        m: [[ONE, 0, 0, 0], [0, ONE, 0, 0], [0, 0, ONE, 0]],
    };

    /// Build from twelve values in row-major order
    pub const fn from_array(a: [i32; 12]) -> Self {
        Self {
            m: [
                [a[0], a[1], a[2], a[3]],
                [a[4], a[5], a[6], a[7]],
                [a[8], a[9], a[10], a[11]],
            ],
        }
    }

    /// Twelve values in row-major order
    pub fn to_array(&self) -> [i32; 12] {
        let m = &self.m;
        [
            m[0][0], m[0][1], m[0][2], m[0][3], m[1][0], m[1][1], m[1][2], m[1][3], m[2][0],
            m[2][1], m[2][2], m[2][3],
        ]
    }

    pub fn set_identity(&mut self) {
        *self = Self::IDENTITY;
    }

    /// Translation column
    pub fn translation(&self) -> Vec3i {
        Vec3i::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    pub fn set_translation(&mut self, t: Vec3i) {
        self.m[0][3] = t.x;
        self.m[1][3] = t.y;
        self.m[2][3] = t.z;
    }

    /// `self · rhs`: rotations compose, and `rhs`'s translation is rotated by
    /// `self` before `self`'s translation is added.
    pub fn mul(&self, rhs: &Self) -> Self {
        let l = &self.m;
        let r = &rhs.m;
        let mut out = [[0i32; 4]; 3];
        for (row, dst) in out.iter_mut().enumerate() {
            let [a0, a1, a2, a3] = l[row];
            for col in 0..3 {
                dst[col] = round12(dot3(a0, a1, a2, r[0][col], r[1][col], r[2][col]));
            }
            dst[3] = round12(dot3(a0, a1, a2, r[0][3], r[1][3], r[2][3])).wrapping_add(a3);
        }
        Self { m: out }
    }

    /// Transform a point: rotate with rounding, then translate
    pub fn transform(&self, v: Vec3i) -> Vec3i {
        let m = &self.m;
        let row = |r: &[i32; 4]| round12(dot3(v.x, v.y, v.z, r[0], r[1], r[2])).wrapping_add(r[3]);
        Vec3i::new(row(&m[0]), row(&m[1]), row(&m[2]))
    }

    /// Replace the rotation part with a rotation about X
    pub fn set_rotation_x(&mut self, angle: i32) {
        let (s, c) = (fixed::sin(angle), fixed::cos(angle));
        self.set_rotation_rows([[ONE, 0, 0], [0, c, -s], [0, s, c]]);
    }

    /// Replace the rotation part with a rotation about Y
    pub fn set_rotation_y(&mut self, angle: i32) {
        let (s, c) = (fixed::sin(angle), fixed::cos(angle));
        self.set_rotation_rows([[c, 0, s], [0, ONE, 0], [-s, 0, c]]);
    }

    /// Replace the rotation part with a rotation about Z
    pub fn set_rotation_z(&mut self, angle: i32) {
        let (s, c) = (fixed::sin(angle), fixed::cos(angle));
        self.set_rotation_rows([[c, -s, 0], [s, c, 0], [0, 0, ONE]]);
    }

    /// Replace the rotation part with a rotation of `angle` about `axis`
    ///
    /// `axis` is expected to be a unit vector (length 4096). Each product is
    /// rounded to 12 fractional bits before it is combined.
    pub fn set_rotation_axis(&mut self, axis: Vec3i, angle: i32) {
        let Vec3i { x, y, z } = axis;
        let c = fixed::cos(angle);
        let s = fixed::sin(angle);
        let xs = round12(x.wrapping_mul(s));
        let ys = round12(y.wrapping_mul(s));
        let zs = round12(z.wrapping_mul(s));
        let nc = ONE - c;
        let scaled = |a: i32, b: i32| round12(round12(a.wrapping_mul(b)).wrapping_mul(nc));
        let xync = scaled(x, y);
        let yznc = scaled(y, z);
        let zxnc = scaled(x, z);
        self.set_rotation_rows([
            [c + scaled(x, x), xync - zs, zxnc + ys],
            [zs + xync, c + scaled(y, y), yznc - xs],
            [zxnc - ys, xs + yznc, c + scaled(z, z)],
        ]);
    }

    /// Build a view transform looking along `look` from `position`
    ///
    /// Rows are `unit(look × up)`, `unit(look × row0)` and `unit(look)`; each
    /// translation entry is the rounded dot of `-position` with its row.
    pub fn look_at(position: Vec3i, look: Vec3i, up: Vec3i) -> Self {
        let neg = Vec3i::new(
            position.x.wrapping_neg(),
            position.y.wrapping_neg(),
            position.z.wrapping_neg(),
        );
        let row0 = look.cross(up).unit();
        let row1 = look.cross(row0).unit();
        let row2 = look.unit();
        let row = |v: Vec3i| [v.x, v.y, v.z, round12(neg.dot(v))];
        Self {
            m: [row(row0), row(row1), row(row2)],
        }
    }

    fn set_rotation_rows(&mut self, rows: [[i32; 3]; 3]) {
        for (dst, src) in self.m.iter_mut().zip(rows) {
            dst[..3].copy_from_slice(&src);
        }
    }

    /// Float copy: rotation divided by 4096, translation unchanged
    pub fn to_matrix34(&self) -> Matrix34 {
        let mut out = [0.0f32; 12];
        for (row, src) in self.m.iter().enumerate() {
            for col in 0..3 {
                out[row * 4 + col] = src[col] as f32 * TO_FLOAT;
            }
            out[row * 4 + 3] = src[3] as f32;
        }
        Matrix34::from_array(out)
    }

    /// Column-major 4×4 float matrix for GPU upload
    pub fn to_mat4(&self) -> glam::Mat4 {
        self.to_matrix34().to_mat4()
    }
}
