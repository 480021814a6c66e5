//! Fixed-point scalar and vector helpers
//!
//! The engine API represents real numbers as integers scaled by 4096 and
//! angles in units of 4096 per full turn (2048 per half turn). Every
//! intermediate is computed in wrapping 32-bit arithmetic so results match the
//! devices bit for bit, overflow included.

use std::f64::consts::PI;

/// Fixed-point representation of 1.0
pub const ONE: i32 = 4096;

/// Multiplier converting a fixed-point value to a float
pub const TO_FLOAT: f32 = 1.0 / 4096.0;

/// Multiplier converting angle units to radians
pub const TO_RADIANS: f32 = std::f32::consts::PI / 2048.0;

/// Rounding: halves go towards positive infinity
fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Sine of an angle in 4096-per-turn units, scaled by 4096
pub fn sin(angle: i32) -> i32 {
    let radians = f64::from(angle) * PI / 2048.0;
    round_half_up(radians.sin() * 4096.0)
}

/// Cosine of an angle in 4096-per-turn units, scaled by 4096
pub fn cos(angle: i32) -> i32 {
    sin(angle.wrapping_add(1024))
}

/// Rounded square root of a non-negative integer
///
/// Returns `None` for negative input.
pub fn sqrt(value: i32) -> Option<i32> {
    if value < 0 {
        return None;
    }
    Some(round_half_up(f64::from(value).sqrt()))
}

/// Rounded square root treating the bit pattern as unsigned
///
/// Sums of squares routinely overflow into the sign bit; this variant reads
/// them back as the unsigned value they represent. Results that would round
/// up to 65536 saturate at 65535.
pub fn usqrt(value: i32) -> i32 {
    if value == 0 {
        return 0;
    }
    if value < 0 && value > 0xFFFD_0002_u32 as i32 {
        return 0xFFFF;
    }
    round_half_up(f64::from(value as u32).sqrt())
}

/// Integer 3-vector in model or fixed-point units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    pub const ZERO: Self = Self::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Dot product without rescaling
    pub fn dot(self, rhs: Self) -> i32 {
        self.x
            .wrapping_mul(rhs.x)
            .wrapping_add(self.y.wrapping_mul(rhs.y))
            .wrapping_add(self.z.wrapping_mul(rhs.z))
    }

    /// Cross product without rescaling
    pub fn cross(self, rhs: Self) -> Self {
        Self {
            x: self
                .y
                .wrapping_mul(rhs.z)
                .wrapping_sub(self.z.wrapping_mul(rhs.y)),
            y: self
                .z
                .wrapping_mul(rhs.x)
                .wrapping_sub(self.x.wrapping_mul(rhs.z)),
            z: self
                .x
                .wrapping_mul(rhs.y)
                .wrapping_sub(self.y.wrapping_mul(rhs.x)),
        }
    }

    /// Scale to length 4096
    ///
    /// Components are first shifted so the largest magnitude occupies 15 bits,
    /// which keeps the sum of squares inside 32 bits (as unsigned). The zero
    /// vector maps to `(0, 0, 4096)`.
    pub fn unit(self) -> Self {
        let (mut x, mut y, mut z) = (self.x, self.y, self.z);
        let bits = x.unsigned_abs() | y.unsigned_abs() | z.unsigned_abs();
        let shift = bits.leading_zeros() as i32 - 17;
        if shift > 0 {
            x = x.wrapping_shl(shift as u32);
            y = y.wrapping_shl(shift as u32);
            z = z.wrapping_shl(shift as u32);
        } else if shift < 0 {
            let shift = (-shift) as u32;
            x >>= shift;
            y >>= shift;
            z >>= shift;
        }
        let length = usqrt(
            x.wrapping_mul(x)
                .wrapping_add(y.wrapping_mul(y))
                .wrapping_add(z.wrapping_mul(z)),
        );
        if length == 0 {
            return Self::new(0, 0, ONE);
        }
        Self {
            x: (x << 12) / length,
            y: (y << 12) / length,
            z: (z << 12) / length,
        }
    }

    /// Real-valued copy (each component divided by 4096)
    pub fn to_real(self) -> glam::Vec3 {
        glam::Vec3::new(
            self.x as f32 * TO_FLOAT,
            self.y as f32 * TO_FLOAT,
            self.z as f32 * TO_FLOAT,
        )
    }
}

impl From<[i32; 3]> for Vec3i {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self { x, y, z }
    }
}
