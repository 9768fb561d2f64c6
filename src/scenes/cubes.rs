use anyhow::Result;
use glam::{Mat4, Vec3};
use std::path::PathBuf;

use super::common::{acquire_program, cube_vertices, CUBE_POSITIONS};
use super::{SceneProvider, ViewParams};
use crate::config::SceneConfig;
use crate::core::backend::{DrawCall, ResourceScope, Uniforms};
use crate::core::resources::ResourceId;

/// Degrees per second for the first cube; cube `i` spins `i + 1` times faster
const SPIN_RATE: f32 = 50.0;
const CUBE_VERTEX_COUNT: u32 = 36;

#[derive(Debug, Clone, Copy)]
struct Handles {
    program: ResourceId,
    vertices: ResourceId,
    texture: Option<ResourceId>,
}

/// Ten textured cubes tumbling in front of the camera
pub struct CubesScene {
    shader: Option<PathBuf>,
    texture_path: PathBuf,
    flip_textures: bool,
    handles: Option<Handles>,
}

impl CubesScene {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            shader: config.shader.clone(),
            texture_path: config.texture.clone(),
            flip_textures: config.flip_textures,
            handles: None,
        }
    }

    /// Model matrix of cube `index` at `time` seconds
    pub fn model_matrix(index: usize, time: f32) -> Mat4 {
        let angle = time * SPIN_RATE * (index as f32 + 1.0);
        Mat4::from_translation(CUBE_POSITIONS[index])
            * Mat4::from_axis_angle(Vec3::new(1.0, 0.3, 0.5).normalize(), angle.to_radians())
    }
}

impl SceneProvider for CubesScene {
    fn name(&self) -> &str {
        "cubes"
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        let program = acquire_program(resources, &self.shader)?;
        let vertices = resources.vertex_buffer("cube vertices", &cube_vertices())?;
        let texture = resources.texture_from_file(&self.texture_path, self.flip_textures)?;
        self.handles = Some(Handles {
            program,
            vertices,
            texture,
        });
        Ok(())
    }

    fn draw_calls(&self, params: &ViewParams) -> Vec<DrawCall> {
        let Some(handles) = self.handles else {
            return Vec::new();
        };
        (0..CUBE_POSITIONS.len())
            .map(|i| DrawCall {
                program: handles.program,
                vertex_buffer: handles.vertices,
                vertex_count: CUBE_VERTEX_COUNT,
                texture: handles.texture,
                uniforms: Uniforms::new(
                    Self::model_matrix(i, params.time),
                    params.view,
                    params.projection,
                ),
            })
            .collect()
    }
}
