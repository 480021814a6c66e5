//! Per-bone animation records and their evaluation to local matrices
//!
//! Animated bones start from a zero matrix and are built in a fixed order:
//! translation column, rotation that turns the local Z axis onto the sampled
//! direction, roll about that new axis, then (type 2 only) column scaling.

use glam::Vec3;
use micro3d_data::Matrix34;

use crate::track::{RollTrack, VectorTrack};

/// One bone's animation, by MTRA bone type
#[derive(Debug, Clone, PartialEq)]
pub enum BoneAnimation {
    /// Type 0: a literal matrix for every frame
    Static(Matrix34),
    /// Type 1
    Identity,
    /// Type 2: every channel animated
    Full {
        translate: VectorTrack,
        scale: VectorTrack,
        rotate: VectorTrack,
        roll: RollTrack,
    },
    /// Type 3: animated direction, constant translation and roll
    FixedTranslateRoll {
        translate: Vec3,
        rotate: VectorTrack,
        roll: f32,
    },
    /// Type 4
    RotateRoll { rotate: VectorTrack, roll: RollTrack },
    /// Type 5
    Rotate { rotate: VectorTrack },
    /// Type 6
    TranslateRotateRoll {
        translate: VectorTrack,
        rotate: VectorTrack,
        roll: RollTrack,
    },
}

impl BoneAnimation {
    /// MTRA type code
    pub fn kind(&self) -> u8 {
        match self {
            Self::Static(_) => 0,
            Self::Identity => 1,
            Self::Full { .. } => 2,
            Self::FixedTranslateRoll { .. } => 3,
            Self::RotateRoll { .. } => 4,
            Self::Rotate { .. } => 5,
            Self::TranslateRotateRoll { .. } => 6,
        }
    }

    /// Local matrix at `frame`, a 16.16 fixed-point keyframe position
    pub fn evaluate(&self, frame: i32) -> Matrix34 {
        let position = frame as f32 / 65536.0;
        let mut m = Matrix34::ZERO;
        match self {
            Self::Static(matrix) => return *matrix,
            Self::Identity => return Matrix34::IDENTITY,
            Self::Full {
                translate,
                scale,
                rotate,
                roll,
            } => {
                m.set_translation(translate.sample(position));
                rotate_to(&mut m, rotate.sample(position));
                apply_roll(&mut m, roll.sample(position));
                scale_columns(&mut m, scale.sample(position));
            }
            Self::FixedTranslateRoll {
                translate,
                rotate,
                roll,
            } => {
                m.set_translation(*translate);
                rotate_to(&mut m, rotate.sample(position));
                apply_roll(&mut m, *roll);
            }
            Self::RotateRoll { rotate, roll } => {
                rotate_to(&mut m, rotate.sample(position));
                apply_roll(&mut m, roll.sample(position));
            }
            Self::Rotate { rotate } => {
                rotate_to(&mut m, rotate.sample(position));
            }
            Self::TranslateRotateRoll {
                translate,
                rotate,
                roll,
            } => {
                m.set_translation(translate.sample(position));
                rotate_to(&mut m, rotate.sample(position));
                apply_roll(&mut m, roll.sample(position));
            }
        }
        m
    }
}

/// Overwrite the rotation block with a basis whose Z axis is `direction`
///
/// A zero direction is treated as +Z.
pub fn rotate_to(m: &mut Matrix34, direction: Vec3) {
    let Vec3 { x, y, z } = direction.try_normalize().unwrap_or(Vec3::Z);
    let xx = x * x;
    let yy = y * y;
    if xx > 0.0 || yy > 0.0 {
        let a = (1.0 - z) / (xx + yy);
        let b = -(x * y) * a;
        m.set(0, 0, z + yy * a);
        m.set(0, 1, b);
        m.set(0, 2, x);
        m.set(1, 0, b);
        m.set(1, 1, z + xx * a);
        m.set(1, 2, y);
        m.set(2, 0, -x);
        m.set(2, 1, -y);
    } else {
        m.set(0, 0, 1.0);
        m.set(0, 1, 0.0);
        m.set(0, 2, 0.0);
        m.set(1, 0, 0.0);
        m.set(1, 1, z);
        m.set(1, 2, 0.0);
        m.set(2, 0, 0.0);
        m.set(2, 1, 0.0);
    }
    m.set(2, 2, z);
}

/// Rotate the first two columns by `angle` radians about the local Z axis
pub fn apply_roll(m: &mut Matrix34, angle: f32) {
    let (s, c) = angle.sin_cos();
    for row in 0..3 {
        let a = m.get(row, 0);
        let b = m.get(row, 1);
        m.set(row, 0, a * c + b * s);
        m.set(row, 1, b * c - a * s);
    }
}

/// Scale rotation columns 0, 1 and 2 by `s.x`, `s.y` and `s.z`
pub fn scale_columns(m: &mut Matrix34, s: Vec3) {
    for row in 0..3 {
        for (col, factor) in [s.x, s.y, s.z].into_iter().enumerate() {
            m.set(row, col, m.get(row, col) * factor);
        }
    }
}
