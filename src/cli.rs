// cli.rs - Command-line interface configuration
use clap::Parser;
use std::path::PathBuf;

use crate::config::SceneKind;

#[derive(Parser, Debug, Clone)]
#[command(name = "fps-camera")]
#[command(about = "First-person camera demos on wgpu", long_about = None)]
pub struct Cli {
    /// Demo scene to run
    #[arg(long, value_enum)]
    pub scene: Option<SceneKind>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Texture for the rectangle, rotating and cubes scenes
    #[arg(long)]
    pub texture: Option<PathBuf>,

    /// glTF file for the model scene
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// WGSL shader replacing the built-in one
    #[arg(long)]
    pub shader: Option<PathBuf>,

    /// Cap on frame delta time in seconds, 0 disables the cap
    #[arg(long = "max-frame-delta")]
    pub max_frame_delta: Option<f32>,

    /// Present without waiting for vertical sync
    #[arg(long = "no-vsync", default_value = "false")]
    pub no_vsync: bool,
}
