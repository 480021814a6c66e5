//! Command implementations for each asset type

pub mod bmp;
pub mod cmdlist;
pub mod mbac;
pub mod mtra;
pub mod pose;

use std::path::Path;

use anyhow::{Context, Result};

/// Read a whole input file
pub(crate) fn read_file(path: &Path, kind: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {kind} file: {}", path.display()))
}
