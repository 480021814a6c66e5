//! MBAC model command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use log::*;
use micro3d_mbac::{BlendMode, Model};

use super::read_file;
use crate::utils::{add_table_row, create_table, format_bytes};

#[derive(Subcommand)]
pub enum MbacCommands {
    /// Display information about an MBAC model
    Info {
        /// Path to the MBAC file
        file: PathBuf,

        /// Show bucket tables, bones and patterns
        #[arg(short, long)]
        detailed: bool,
    },

    /// Decode and re-check one or more MBAC models
    Validate {
        /// Paths to the MBAC files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Validate files in parallel (needs the `parallel` feature)
        #[arg(long)]
        parallel: bool,
    },
}

pub fn execute(cmd: MbacCommands) -> Result<()> {
    match cmd {
        MbacCommands::Info { file, detailed } => show_info(&file, detailed),
        MbacCommands::Validate { files, parallel } => validate_files(&files, parallel),
    }
}

/// Decode a model file
pub fn load_model(path: &Path) -> Result<Model> {
    let data = read_file(path, "MBAC")?;
    Model::parse(&data).with_context(|| format!("Failed to decode MBAC file: {}", path.display()))
}

fn show_info(file: &Path, detailed: bool) -> Result<()> {
    let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or_default();
    let model = load_model(file)?;
    let header = model.header();

    println!("MBAC Model Information: {}", file.display());
    println!("=====================================");
    println!("File Size: {}", format_bytes(size));
    println!("Version: {}", header.version);
    println!(
        "Formats: vertex {}, normal {}, polygon {}, bone {}",
        header.vertex_format, header.normal_format, header.polygon_format, header.bone_format
    );
    println!("Vertices: {}", model.vertex_count());
    println!("Normals: {}", if model.rest_normals().is_some() { "yes" } else { "no" });
    println!(
        "Textured Polygons: {} triangles, {} quads",
        header.num_poly_t3, header.num_poly_t4
    );
    println!(
        "Colored Polygons: {} triangles, {} quads",
        header.num_poly_c3, header.num_poly_c4
    );
    println!("Bones: {}", model.bones().len());
    println!("Textures: {}", model.num_textures());
    println!("Patterns: {}", model.num_patterns());
    println!("Indices: {} ({} textured)", model.indices().len(), model.textured_index_count());

    if !detailed {
        return Ok(());
    }

    println!("\nTextured Buckets (single / double sided index counts):");
    let mut table = create_table(vec!["Blend", "Face", "Single", "Double"]);
    for (bucket, faces) in model.sub_meshes_textured().iter().enumerate() {
        for (face, sides) in faces.iter().enumerate() {
            if sides.iter().any(|&n| n > 0) {
                add_table_row(
                    &mut table,
                    vec![
                        format!("{:?}", BlendMode::from_bucket(bucket)),
                        face.to_string(),
                        sides[0].to_string(),
                        sides[1].to_string(),
                    ],
                );
            }
        }
    }
    table.printstd();

    println!("\nColored Buckets:");
    let mut table = create_table(vec!["Blend", "Single", "Double"]);
    for (bucket, sides) in model.sub_meshes_colored().iter().enumerate() {
        if sides.iter().any(|&n| n > 0) {
            add_table_row(
                &mut table,
                vec![
                    format!("{:?}", BlendMode::from_bucket(bucket)),
                    sides[0].to_string(),
                    sides[1].to_string(),
                ],
            );
        }
    }
    table.printstd();

    println!("\nBones:");
    let mut table = create_table(vec!["Index", "Parent", "Vertices", "Translation"]);
    for (i, bone) in model.bones().iter().enumerate() {
        let t = bone.matrix.translation();
        add_table_row(
            &mut table,
            vec![
                i.to_string(),
                bone.parent.to_string(),
                bone.vertex_count.to_string(),
                format!("({:.1}, {:.1}, {:.1})", t.x, t.y, t.z),
            ],
        );
    }
    table.printstd();

    println!("\nPatterns:");
    let mut table = create_table(vec!["Index", "Colored (tri/quad)", "Textured (tri/quad per face)"]);
    for (i, pattern) in model.patterns().iter().enumerate() {
        let textured = pattern
            .textured
            .iter()
            .map(|(t, q)| format!("{t}/{q}"))
            .collect::<Vec<_>>()
            .join(" ");
        add_table_row(
            &mut table,
            vec![
                i.to_string(),
                format!("{}/{}", pattern.colored.0, pattern.colored.1),
                textured,
            ],
        );
    }
    table.printstd();

    Ok(())
}

fn validate_one(path: &Path) -> Result<()> {
    let model = load_model(path)?;
    model
        .validate()
        .with_context(|| format!("Invalid MBAC model: {}", path.display()))
}

#[cfg(feature = "parallel")]
fn validate_all(files: &[PathBuf], parallel: bool) -> Vec<Result<()>> {
    use rayon::prelude::*;

    if parallel {
        files.par_iter().map(|f| validate_one(f)).collect()
    } else {
        files.iter().map(|f| validate_one(f)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn validate_all(files: &[PathBuf], parallel: bool) -> Vec<Result<()>> {
    if parallel {
        warn!("Built without the `parallel` feature, validating sequentially");
    }
    files.iter().map(|f| validate_one(f)).collect()
}

fn validate_files(files: &[PathBuf], parallel: bool) -> Result<()> {
    let results = validate_all(files, parallel);

    let mut failed = 0;
    for (file, result) in files.iter().zip(&results) {
        match result {
            Ok(()) => println!("✓ {}", file.display()),
            Err(e) => {
                failed += 1;
                println!("✗ {}: {e:#}", file.display());
            }
        }
    }
    debug!("Validated {} files, {failed} failed", files.len());

    if failed > 0 {
        bail!("{failed} of {} files failed validation", files.len());
    }
    Ok(())
}
