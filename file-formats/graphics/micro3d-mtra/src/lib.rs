//! Decoder and pose evaluator for micro3d MTRA action tables
//!
//! An MTRA file holds a list of actions. Each action has a keyframe count
//! and, for every bone, one of seven animation types ranging from a fixed
//! matrix to fully keyed translation, scale, direction and roll tracks.
//! Version 5 files add per-action pattern masks that change over time.
//!
//! Frames are 16.16 fixed point: `1 << 16` is one keyframe.
//!
//! ```rust,no_run
//! use micro3d_mtra::ActionTable;
//!
//! let data = std::fs::read("walk.mtra")?;
//! let table = ActionTable::parse(&data)?;
//! let action = table.action(0)?;
//! let pose = action.evaluate_pose(action.num_frames() / 2);
//! println!("{} bone matrices", pose.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod action;
pub mod error;
pub mod pose;
pub mod track;

pub use action::{Action, ActionTable};
pub use error::{MtraError, Result};
pub use pose::BoneAnimation;
pub use track::{Interpolate, RollTrack, Track, VectorTrack};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
