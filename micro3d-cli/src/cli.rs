//! Root CLI structure for micro3d

use clap::{Parser, Subcommand};
use micro3d_render::config::parse_viewport;
use micro3d_render::{RenderOptions, TextureFilter};

#[derive(Parser)]
#[command(name = "micro3d")]
#[command(about = "Command-line tools for micro3d models, animations and command lists", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Texture sampling (nearest or linear), overrides MICRO3D_TEXTURE_FILTER
    #[arg(long, global = true)]
    pub texture_filter: Option<TextureFilter>,

    /// Viewport size as WxH, overrides MICRO3D_VIEWPORT
    #[arg(long, global = true, value_parser = viewport_arg)]
    pub viewport: Option<(u32, u32)>,
}

impl Cli {
    /// Options from the environment with command-line flags applied on top
    pub fn render_options(&self) -> RenderOptions {
        let mut options = RenderOptions::from_env();
        if let Some(filter) = self.texture_filter {
            options.texture_filter = filter;
        }
        if let Some(viewport) = self.viewport {
            options.viewport = viewport;
        }
        options
    }
}

fn viewport_arg(s: &str) -> Result<(u32, u32), String> {
    parse_viewport(s).ok_or_else(|| format!("'{s}' is not a WxH size"))
}

#[derive(Subcommand)]
pub enum Commands {
    /// MBAC model operations
    Mbac {
        #[command(subcommand)]
        command: crate::commands::mbac::MbacCommands,
    },

    /// MTRA animation operations
    Mtra {
        #[command(subcommand)]
        command: crate::commands::mtra::MtraCommands,
    },

    /// Print the skinned vertices of a model posed by an action
    Pose(crate::commands::pose::PoseArgs),

    /// BMP texture operations
    Bmp {
        #[command(subcommand)]
        command: crate::commands::bmp::BmpCommands,
    },

    /// Command list operations
    Cmdlist {
        #[command(subcommand)]
        command: crate::commands::cmdlist::CmdlistCommands,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_flags_override_defaults() {
        let cli = Cli::parse_from([
            "micro3d",
            "--texture-filter",
            "linear",
            "--viewport",
            "176x208",
            "cmdlist",
            "run",
            "list.txt",
        ]);
        let options = cli.render_options();
        assert_eq!(options.texture_filter, TextureFilter::Linear);
        assert_eq!(options.viewport, (176, 208));
    }

    #[test]
    fn test_bad_viewport_is_rejected() {
        let result = Cli::try_parse_from(["micro3d", "--viewport", "wide", "mbac", "info", "a.mbac"]);
        assert!(result.is_err());
    }
}
