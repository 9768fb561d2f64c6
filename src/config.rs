use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::camera::CameraSettings;
use crate::cli::Cli;

/// Demo scene selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Triangle,
    /// Triangle whose color pulses through a per-frame uniform
    Uniforms,
    Rectangle,
    /// Textured quad spinning about the view axis
    Rotating,
    #[default]
    Cubes,
    Model,
}

/// Graphics API the adapter is requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsApi {
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl GraphicsApi {
    pub fn backends(self) -> wgpu::Backends {
        match self {
            GraphicsApi::Auto => wgpu::Backends::PRIMARY,
            GraphicsApi::Vulkan => wgpu::Backends::VULKAN,
            GraphicsApi::Metal => wgpu::Backends::METAL,
            GraphicsApi::Dx12 => wgpu::Backends::DX12,
            GraphicsApi::Gl => wgpu::Backends::GL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub graphics_api: GraphicsApi,
    pub high_performance: bool,
    /// Hide and confine the cursor for mouse look
    pub capture_cursor: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "fps-camera".to_string(),
            width: 800,
            height: 600,
            vsync: true,
            graphics_api: GraphicsApi::Auto,
            high_performance: false,
            capture_cursor: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Upper bound on a single frame's delta time in seconds; `null` disables it
    pub max_delta: Option<f32>,
    pub clear_color: [f32; 4],
    pub near_plane: f32,
    pub far_plane: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_delta: Some(0.25),
            clear_color: [0.3, 0.3, 0.3, 1.0],
            near_plane: 0.1,
            far_plane: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub kind: SceneKind,
    pub texture: PathBuf,
    pub model: PathBuf,
    /// WGSL file replacing the built-in shader
    pub shader: Option<PathBuf>,
    pub flip_textures: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            kind: SceneKind::Cubes,
            texture: PathBuf::from("textures/illum.jpeg"),
            model: PathBuf::from("models/fish/fish.gltf"),
            shader: None,
            flip_textures: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub camera: CameraSettings,
    pub frame: FrameConfig,
    pub scene: SceneConfig,
}

impl AppConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid config JSON")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Config file named on the command line (if any) with flag overrides applied
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(kind) = cli.scene {
            self.scene.kind = kind;
        }
        if let Some(texture) = &cli.texture {
            self.scene.texture = texture.clone();
        }
        if let Some(model) = &cli.model {
            self.scene.model = model.clone();
        }
        if let Some(shader) = &cli.shader {
            self.scene.shader = Some(shader.clone());
        }
        if let Some(max_delta) = cli.max_frame_delta {
            self.frame.max_delta = (max_delta > 0.0).then_some(max_delta);
        }
        if cli.no_vsync {
            self.window.vsync = false;
        }
    }
}
