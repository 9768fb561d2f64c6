mod common;
mod cubes;
mod model;
mod rectangle;
mod triangle;
mod uniforms;

use anyhow::Result;
use glam::Mat4;

use crate::config::{SceneConfig, SceneKind};
use crate::core::backend::{DrawCall, ResourceScope};
use crate::frame::FrameInfo;

pub use common::{cube_vertices, CUBE_POSITIONS};
pub use cubes::CubesScene;
pub use model::ModelScene;
pub use rectangle::RectangleScene;
pub use triangle::TriangleScene;
pub use uniforms::{pulse_tint, UniformsScene};

/// Camera-derived transforms for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub view: Mat4,
    pub projection: Mat4,
    /// Seconds since start, narrowed for animation
    pub time: f32,
}

/// A demo: acquires its GPU objects once, then emits draws every frame
pub trait SceneProvider {
    /// Scene name for logging
    fn name(&self) -> &str;

    /// Create every GPU object the scene draws with
    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()>;

    /// Update scene state (optional, for animated scenes)
    fn update(&mut self, _frame: &FrameInfo) {}

    /// Draw calls for this frame
    fn draw_calls(&self, params: &ViewParams) -> Vec<DrawCall>;
}

/// Build the scene selected by the config
pub fn create_scene(config: &SceneConfig) -> Box<dyn SceneProvider> {
    match config.kind {
        SceneKind::Triangle => Box::new(TriangleScene::new(config.shader.clone())),
        SceneKind::Uniforms => Box::new(UniformsScene::new(config.shader.clone())),
        SceneKind::Rectangle => Box::new(RectangleScene::new(config)),
        SceneKind::Rotating => Box::new(RectangleScene::rotating(config)),
        SceneKind::Cubes => Box::new(CubesScene::new(config)),
        SceneKind::Model => Box::new(ModelScene::new(config)),
    }
}
