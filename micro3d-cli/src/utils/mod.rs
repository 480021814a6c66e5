//! Shared utilities for the micro3d CLI

pub mod format;
pub mod table;
pub mod words;

pub use format::*;
pub use table::*;
pub use words::*;
