//! Skinned vertex dump of a posed model

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use log::*;
use micro3d_render::FigureInstance;

use super::mbac::load_model;
use super::mtra::load_actions;
use crate::utils::{add_table_row, create_table, format_xyz, frame_to_fixed};

#[derive(Args)]
pub struct PoseArgs {
    /// Path to the MBAC model
    pub model: PathBuf,

    /// Path to the MTRA action table
    pub actions: PathBuf,

    /// Action to apply
    #[arg(short, long, default_value = "0")]
    pub action: usize,

    /// Frame, fractional frames allowed
    #[arg(short, long, default_value = "0")]
    pub frame: f64,

    /// Print real units (model units divided by 4096)
    #[arg(long)]
    pub real: bool,
}

pub fn execute(args: PoseArgs) -> Result<()> {
    let model = Arc::new(load_model(&args.model)?);
    let actions = load_actions(&args.actions)?;
    let vertex_count = model.vertex_count();

    let mut figure = FigureInstance::new(model);
    let frame = frame_to_fixed(args.frame);
    figure
        .set_posture(&actions, args.action, frame)
        .with_context(|| format!("Failed to pose with action {}", args.action))?;
    debug!("Posed {} vertices at frame {}", vertex_count, args.frame);

    let (units, decimals) = if args.real { ("real", 4) } else { ("model", 1) };
    println!(
        "Action {} frame {} ({} units), pattern {:#x}",
        args.action,
        args.frame,
        units,
        figure.pattern()
    );

    let mut table = create_table(vec!["Vertex", "X", "Y", "Z"]);
    for i in 0..vertex_count {
        let p = if args.real {
            figure.world_position(i)
        } else {
            figure.positions().get(i).copied()
        };
        let Some(p) = p else { continue };
        let [x, y, z] = format_xyz(p.x, p.y, p.z, decimals);
        add_table_row(&mut table, vec![i.to_string(), x, y, z]);
    }
    table.printstd();

    Ok(())
}
