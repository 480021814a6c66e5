//! Micro3d CLI library
//!
//! Command definitions and helpers behind the `micro3d` binary.

// Reports go to stdout; diagnostics go through log
#![allow(clippy::print_stdout)]

pub mod cli;
pub mod commands;
pub mod utils;
