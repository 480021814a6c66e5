//! Command list dry runs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use log::*;
use micro3d_render::{
    BackendEvent, DrawRecord, Effect3D, FigureLayout, RecordingBackend, RenderOptions, Renderer,
    Texture,
};

use super::read_file;
use crate::utils::{add_table_row, create_table, parse_words};

#[derive(Subcommand)]
pub enum CmdlistCommands {
    /// Interpret a command list against a recording backend and print what
    /// it would draw
    Run {
        /// Text file of whitespace or comma separated words (decimal or 0x hex)
        file: PathBuf,

        /// BMP textures the list may select, in order
        #[arg(short, long = "texture")]
        textures: Vec<PathBuf>,

        /// Screen center as X,Y
        #[arg(long, value_parser = center_arg, default_value = "0,0")]
        center: (i32, i32),
    },
}

pub fn execute(cmd: CmdlistCommands, options: RenderOptions) -> Result<()> {
    match cmd {
        CmdlistCommands::Run {
            file,
            textures,
            center,
        } => run(&file, &textures, center, options),
    }
}

fn center_arg(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("'{s}' is not X,Y"))?;
    let x = x.trim().parse().map_err(|_| format!("invalid X in '{s}'"))?;
    let y = y.trim().parse().map_err(|_| format!("invalid Y in '{s}'"))?;
    Ok((x, y))
}

fn load_texture(path: &Path) -> Result<Texture> {
    let data = read_file(path, "BMP")?;
    Texture::decode(&data, false)
        .with_context(|| format!("Failed to decode texture: {}", path.display()))
}

fn describe_draw(draw: &DrawRecord) -> String {
    let mut parts = vec![
        format!("{:?}", draw.topology),
        format!("first {} count {}", draw.first, draw.count),
        format!("{:?}", draw.blend),
    ];
    if let Some(id) = draw.texture {
        parts.push(format!("texture #{id}"));
    }
    if let Some([r, g, b]) = draw.color {
        parts.push(format!("color #{r:02X}{g:02X}{b:02X}"));
    }
    if draw.lit {
        parts.push("lit".to_string());
    }
    if draw.toon {
        parts.push("toon".to_string());
    }
    if !draw.cull_back_faces {
        parts.push("double sided".to_string());
    }
    parts.join(", ")
}

fn describe(event: &BackendEvent) -> (&'static str, String) {
    match event {
        BackendEvent::Upload { id, width, height } => {
            ("upload", format!("texture #{id} {width}x{height}"))
        }
        BackendEvent::Clip(None) => ("clip", "full viewport".to_string()),
        BackendEvent::Clip(Some(rect)) => (
            "clip",
            format!("({}, {})-({}, {})", rect.left, rect.top, rect.right, rect.bottom),
        ),
        BackendEvent::DepthWrite(on) => ("depth write", on.to_string()),
        BackendEvent::Draw(draw) => ("draw", describe_draw(draw)),
        BackendEvent::EndFrame => ("end frame", String::new()),
    }
}

fn run(file: &Path, texture_paths: &[PathBuf], center: (i32, i32), options: RenderOptions) -> Result<()> {
    let data = read_file(file, "command list")?;
    let text = String::from_utf8(data)
        .with_context(|| format!("Command list is not UTF-8 text: {}", file.display()))?;
    let words = parse_words(&text)
        .with_context(|| format!("Failed to parse command list: {}", file.display()))?;
    let textures = texture_paths
        .iter()
        .map(|p| load_texture(p))
        .collect::<Result<Vec<_>>>()?;
    info!("Running {} words with {} textures", words.len(), textures.len());

    let renderer = Renderer::new(RecordingBackend::new(), options);
    let mut layout = FigureLayout::default();
    layout.set_center(center.0, center.1);

    let queued = renderer
        .draw_command_list(&textures, &words, &layout, &Effect3D::default())
        .with_context(|| format!("Command list rejected: {}", file.display()))?;
    renderer.flush();

    let backend = renderer.into_backend();
    let mut table = create_table(vec!["#", "Event", "Details"]);
    for (i, event) in backend.events().iter().enumerate() {
        let (name, details) = describe(event);
        add_table_row(&mut table, vec![i.to_string(), name.to_string(), details]);
    }
    table.printstd();

    println!(
        "{} words, {} primitive batches, {} draws",
        words.len(),
        queued,
        backend.draws().len()
    );
    Ok(())
}
