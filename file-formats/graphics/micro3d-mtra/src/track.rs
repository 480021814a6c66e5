//! Keyframe tracks sampled by linear interpolation

use std::ops::{Add, Mul, Sub};

use glam::Vec3;

/// Values a track can interpolate
pub trait Interpolate: Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self> {
    fn lerp_to(self, next: Self, t: f32) -> Self {
        self + (next - self) * t
    }
}

impl Interpolate for f32 {}
impl Interpolate for Vec3 {}

/// `(key, value)` pairs with keys in keyframe units
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    keys: Vec<u16>,
    values: Vec<T>,
}

/// Translation, scale or rotation-axis track
pub type VectorTrack = Track<Vec3>;

/// Roll angle track, in radians
pub type RollTrack = Track<f32>;

impl<T: Interpolate> Track<T> {
    /// Build from parallel key and value lists; `None` when empty or ragged
    pub fn new(keys: Vec<u16>, values: Vec<T>) -> Option<Self> {
        if keys.is_empty() || keys.len() != values.len() {
            return None;
        }
        Some(Self { keys, values })
    }

    /// A single key at frame 0
    pub fn constant(value: T) -> Self {
        Self {
            keys: vec![0],
            values: vec![value],
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[u16] {
        &self.keys
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// First value, used by tracks that hold one value for all frames
    pub fn first(&self) -> T {
        self.values[0]
    }

    /// Sample at a fractional keyframe position
    ///
    /// At or past the last key the last value is held; before the first key
    /// the first value is held. In between, the bracketing keys are found by
    /// a reverse linear scan and interpolated.
    pub fn sample(&self, position: f32) -> T {
        let last = self.keys.len() - 1;
        if position >= f32::from(self.keys[last]) {
            return self.values[last];
        }
        for i in (0..last).rev() {
            let key = f32::from(self.keys[i]);
            if key > position {
                continue;
            }
            let value = self.values[i];
            if key == position {
                return value;
            }
            let next_key = f32::from(self.keys[i + 1]);
            let t = (position - key) / (next_key - key);
            return value.lerp_to(self.values[i + 1], t);
        }
        self.values[0]
    }
}
