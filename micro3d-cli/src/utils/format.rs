//! Formatting utilities

use humansize::{DECIMAL, format_size};

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a 16.16 fixed-point frame number
pub fn format_frame(frame: i32) -> String {
    format!("{:.3}", f64::from(frame) / 65536.0)
}

/// Convert a frame number to 16.16 fixed point, saturating
pub fn frame_to_fixed(frame: f64) -> i32 {
    (frame * 65536.0).round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Format a position with a fixed number of decimals
pub fn format_xyz(x: f32, y: f32, z: f32, decimals: usize) -> [String; 3] {
    [
        format!("{x:.decimals$}"),
        format!("{y:.decimals$}"),
        format!("{z:.decimals$}"),
    ]
}
