//! BMP texture command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use micro3d_bmp::{TextureImage, parse_header};

use super::read_file;
use crate::utils::format_bytes;

#[derive(Subcommand)]
pub enum BmpCommands {
    /// Display information about a paletted BMP texture
    Info {
        /// Path to the BMP file
        file: PathBuf,
    },

    /// Decode a BMP texture and save it as PNG
    #[cfg(feature = "image")]
    Convert {
        /// Input BMP file
        input: PathBuf,

        /// Output PNG file
        output: PathBuf,
    },
}

pub fn execute(cmd: BmpCommands) -> Result<()> {
    match cmd {
        BmpCommands::Info { file } => show_info(&file),
        #[cfg(feature = "image")]
        BmpCommands::Convert { input, output } => convert(&input, &output),
    }
}

fn decode(path: &Path, data: &[u8]) -> Result<TextureImage> {
    TextureImage::decode(data)
        .with_context(|| format!("Failed to decode BMP file: {}", path.display()))
}

fn show_info(file: &Path) -> Result<()> {
    let data = read_file(file, "BMP")?;
    let header = parse_header(&data)
        .with_context(|| format!("Failed to read BMP header: {}", file.display()))?;
    let image = decode(file, &data)?;

    println!("BMP Texture Information: {}", file.display());
    println!("=====================================");
    println!("File Size: {}", format_bytes(data.len() as u64));
    println!("Dimensions: {}x{}", header.width, header.height);
    println!(
        "Header: {}",
        if header.dib_size == 12 { "OS/2 core (12 bytes)" } else { "Windows info (40 bytes)" }
    );
    println!("Row Order: {}", if header.bottom_up { "bottom-up" } else { "top-down" });
    println!("Raster Offset: {}", header.raster_offset);
    println!(
        "Color-keyed Pixels: {} of {}",
        image.transparent_pixels(),
        u64::from(image.width) * u64::from(image.height)
    );

    Ok(())
}

#[cfg(feature = "image")]
fn convert(input: &Path, output: &Path) -> Result<()> {
    let data = read_file(input, "BMP")?;
    let texture = decode(input, &data)?;
    let rgba = texture
        .to_rgba_image()
        .context("Decoded pixel buffer does not match its dimensions")?;

    log::info!("Converting {}x{} texture to PNG", texture.width, texture.height);
    rgba.save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("Failed to save image: {}", output.display()))?;

    println!("✓ Converted {} to {}", input.display(), output.display());
    Ok(())
}
