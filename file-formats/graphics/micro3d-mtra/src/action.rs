//! MTRA action table decoding and per-frame queries

use std::collections::BTreeMap;

use glam::Vec3;
use log::*;
use micro3d_data::fixed::{TO_FLOAT, TO_RADIANS};
use micro3d_data::{BitReader, ByteReader, Matrix34};

use crate::error::{MtraError, Result};
use crate::pose::BoneAnimation;
use crate::track::{RollTrack, Track, VectorTrack};

/// Size of the unused block at the end of version 4 and later files
pub const TRAILER_SIZE: usize = 20;

/// One animation: a keyframe count, a transform per bone and optional
/// pattern changes over time
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Number of keyframes
    pub keyframes: u16,
    /// One entry per bone of the table
    pub bones: Vec<BoneAnimation>,
    /// Pattern mask in effect from each keyframe onward (version 5)
    pub dynamic_patterns: BTreeMap<u16, i32>,
}

impl Action {
    /// Length in 16.16 fixed-point frames
    pub fn num_frames(&self) -> i32 {
        i32::from(self.keyframes) << 16
    }

    /// Local matrix of every bone at `frame`; negative frames act as 0
    pub fn evaluate_pose(&self, frame: i32) -> Vec<Matrix34> {
        let frame = frame.max(0);
        self.bones.iter().map(|b| b.evaluate(frame)).collect()
    }

    /// Pattern mask of the last key at or before `frame`, if any
    pub fn pattern_at(&self, frame: i32) -> Option<i32> {
        let key = if frame < 0 { 0 } else { frame >> 16 };
        let key = u16::try_from(key).unwrap_or(u16::MAX);
        self.dynamic_patterns
            .range(..=key)
            .next_back()
            .map(|(_, pattern)| *pattern)
    }
}

/// Decoded MTRA file
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTable {
    pub version: u8,
    pub num_bones: usize,
    /// Bone counts per animation type as stored in the header
    pub type_counts: [u16; 8],
    pub actions: Vec<Action>,
}

impl ActionTable {
    /// Decode an MTRA file
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(data);

        let magic = [reader.read_u8()?, reader.read_u8()?];
        if &magic != b"MT" {
            return Err(MtraError::InvalidMagic(magic));
        }
        let version = reader.read_u8()?;
        if reader.read_u8()? != 0 || !(2..=5).contains(&version) {
            return Err(MtraError::UnsupportedVersion(version));
        }

        let num_actions = usize::from(reader.read_u16_le()?);
        let num_bones = usize::from(reader.read_u16_le()?);
        let mut type_counts = [0u16; 8];
        for count in &mut type_counts {
            *count = reader.read_u16_le()?;
        }
        if type_counts[7] != 0 {
            warn!("MTRA type count slot 7 is {}", type_counts[7]);
        }
        let data_size = reader.read_i32_le()?;
        debug!(
            "MTRA v{version}: {num_actions} actions, {num_bones} bones, data size {data_size}"
        );

        let mut actions = Vec::with_capacity(num_actions);
        for index in 0..num_actions {
            let action = read_action(&mut reader, version, num_bones)
                .map_err(|e| e.with_context(&format!("action {index}")))?;
            actions.push(action);
        }

        let mut remaining = reader.remaining();
        if version >= 4 {
            remaining = remaining.saturating_sub(TRAILER_SIZE);
        }
        if remaining > 0 {
            warn!("{remaining} uninterpreted bytes at the end of MTRA data");
        }

        Ok(Self {
            version,
            num_bones,
            type_counts,
            actions,
        })
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    /// The action at `index`
    pub fn action(&self, index: usize) -> Result<&Action> {
        self.actions.get(index).ok_or(MtraError::ActionOutOfRange {
            index,
            count: self.actions.len(),
        })
    }

    /// Length of an action in 16.16 fixed-point frames
    pub fn num_frames(&self, action: usize) -> Result<i32> {
        Ok(self.action(action)?.num_frames())
    }

    /// Dynamic pattern at `frame`, or `default` when the action defines none
    /// at or before it
    pub fn pattern(&self, action: usize, frame: i32, default: i32) -> Result<i32> {
        Ok(self.action(action)?.pattern_at(frame).unwrap_or(default))
    }
}

fn read_action(reader: &mut BitReader, version: u8, num_bones: usize) -> Result<Action> {
    let keyframes = reader.read_u16_le()?;
    let mut bones = Vec::with_capacity(num_bones);
    for bone in 0..num_bones {
        bones.push(read_bone(reader, bone)?);
    }

    let mut dynamic_patterns = BTreeMap::new();
    if version >= 5 {
        let count = reader.read_u16_le()?;
        for _ in 0..count {
            let frame = reader.read_u16_le()?;
            let pattern = reader.read_i32_le()?;
            dynamic_patterns.insert(frame, pattern);
        }
    }

    Ok(Action {
        keyframes,
        bones,
        dynamic_patterns,
    })
}

fn read_bone(reader: &mut BitReader, bone: usize) -> Result<BoneAnimation> {
    let kind = reader.read_u8()?;
    trace!("bone {bone}: type {kind}");
    let animation = match kind {
        0 => {
            let mut values = [0i16; 12];
            for v in &mut values {
                *v = reader.read_i16_le()?;
            }
            BoneAnimation::Static(Matrix34::from_fixed_i16(&values))
        }
        1 => BoneAnimation::Identity,
        2 => BoneAnimation::Full {
            translate: read_vector_track(reader, bone, "translate", 1.0)?,
            scale: read_vector_track(reader, bone, "scale", TO_FLOAT)?,
            rotate: read_vector_track(reader, bone, "rotate", 1.0)?,
            roll: read_roll_track(reader, bone)?,
        },
        3 => {
            let translate = read_vec3(reader, 1.0)?;
            let rotate = read_vector_track(reader, bone, "rotate", 1.0)?;
            let roll = f32::from(reader.read_i16_le()?) * TO_RADIANS;
            BoneAnimation::FixedTranslateRoll {
                translate,
                rotate,
                roll,
            }
        }
        4 => BoneAnimation::RotateRoll {
            rotate: read_vector_track(reader, bone, "rotate", 1.0)?,
            roll: read_roll_track(reader, bone)?,
        },
        5 => BoneAnimation::Rotate {
            rotate: read_vector_track(reader, bone, "rotate", 1.0)?,
        },
        6 => BoneAnimation::TranslateRotateRoll {
            translate: read_vector_track(reader, bone, "translate", 1.0)?,
            rotate: read_vector_track(reader, bone, "rotate", 1.0)?,
            roll: read_roll_track(reader, bone)?,
        },
        kind => return Err(MtraError::UnsupportedBoneType { bone, kind }),
    };
    Ok(animation)
}

fn read_vec3(reader: &mut BitReader, scale: f32) -> Result<Vec3> {
    let x = f32::from(reader.read_i16_le()?);
    let y = f32::from(reader.read_i16_le()?);
    let z = f32::from(reader.read_i16_le()?);
    Ok(Vec3::new(x, y, z) * scale)
}

fn read_vector_track(
    reader: &mut BitReader,
    bone: usize,
    track: &'static str,
    scale: f32,
) -> Result<VectorTrack> {
    let count = usize::from(reader.read_u16_le()?);
    let mut keys = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(reader.read_u16_le()?);
        values.push(read_vec3(reader, scale)?);
    }
    Track::new(keys, values).ok_or(MtraError::EmptyTrack { bone, track })
}

fn read_roll_track(reader: &mut BitReader, bone: usize) -> Result<RollTrack> {
    let count = usize::from(reader.read_u16_le()?);
    let mut keys = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(reader.read_u16_le()?);
        values.push(f32::from(reader.read_i16_le()?) * TO_RADIANS);
    }
    Track::new(keys, values).ok_or(MtraError::EmptyTrack {
        bone,
        track: "roll",
    })
}
