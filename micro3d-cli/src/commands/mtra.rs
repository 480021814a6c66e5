//! MTRA animation command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use micro3d_mtra::{ActionTable, BoneAnimation};

use super::read_file;
use crate::utils::{add_table_row, create_table, format_frame};

#[derive(Subcommand)]
pub enum MtraCommands {
    /// Display information about an MTRA action table
    Info {
        /// Path to the MTRA file
        file: PathBuf,

        /// Show the bone tracks and pattern keys of one action
        #[arg(short, long)]
        action: Option<usize>,
    },
}

pub fn execute(cmd: MtraCommands) -> Result<()> {
    match cmd {
        MtraCommands::Info { file, action } => show_info(&file, action),
    }
}

/// Decode an action table file
pub fn load_actions(path: &Path) -> Result<ActionTable> {
    let data = read_file(path, "MTRA")?;
    ActionTable::parse(&data)
        .with_context(|| format!("Failed to decode MTRA file: {}", path.display()))
}

fn kind_name(bone: &BoneAnimation) -> &'static str {
    match bone {
        BoneAnimation::Static(_) => "static matrix",
        BoneAnimation::Identity => "identity",
        BoneAnimation::Full { .. } => "translate, scale, rotate, roll",
        BoneAnimation::FixedTranslateRoll { .. } => "rotate (fixed translate/roll)",
        BoneAnimation::RotateRoll { .. } => "rotate, roll",
        BoneAnimation::Rotate { .. } => "rotate",
        BoneAnimation::TranslateRotateRoll { .. } => "translate, rotate, roll",
    }
}

fn show_info(file: &Path, action: Option<usize>) -> Result<()> {
    let table = load_actions(file)?;

    println!("MTRA Action Table: {}", file.display());
    println!("=====================================");
    println!("Version: {}", table.version);
    println!("Bones: {}", table.num_bones);
    println!("Bone Types: {:?}", table.type_counts);
    println!("Actions: {}", table.num_actions());

    let mut summary = create_table(vec!["Action", "Keyframes", "Frames", "Pattern Keys"]);
    for (i, act) in table.actions.iter().enumerate() {
        add_table_row(
            &mut summary,
            vec![
                i.to_string(),
                act.keyframes.to_string(),
                format_frame(act.num_frames()),
                act.dynamic_patterns.len().to_string(),
            ],
        );
    }
    summary.printstd();

    let Some(index) = action else {
        return Ok(());
    };
    let act = table.action(index)?;

    println!("\nAction {index}:");
    let mut bones = create_table(vec!["Bone", "Type", "Channels"]);
    for (i, bone) in act.bones.iter().enumerate() {
        add_table_row(
            &mut bones,
            vec![i.to_string(), bone.kind().to_string(), kind_name(bone).to_string()],
        );
    }
    bones.printstd();

    if !act.dynamic_patterns.is_empty() {
        println!("\nPattern Keys:");
        for (key, pattern) in &act.dynamic_patterns {
            println!("  Keyframe {key}: mask {pattern:#x}");
        }
    }

    Ok(())
}
