use anyhow::Result;
use std::path::PathBuf;

use super::common::acquire_program;
use super::{SceneProvider, ViewParams};
use crate::core::backend::{DrawCall, ResourceScope, Uniforms, Vertex};
use crate::core::resources::ResourceId;

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

const VERTICES: [Vertex; 3] = [
    Vertex::new([0.5, -0.5, 0.0], WHITE, [1.0, 0.0]),
    Vertex::new([-0.5, -0.5, 0.0], WHITE, [0.0, 0.0]),
    Vertex::new([0.0, 0.5, 0.0], WHITE, [0.5, 1.0]),
];

/// Green channel oscillating over [0, 1] with the elapsed time
pub fn pulse_tint(time: f32) -> [f32; 4] {
    [0.0, time.sin() / 2.0 + 0.5, 0.0, 1.0]
}

/// Triangle colored only by the uniform tint, updated every frame
pub struct UniformsScene {
    shader: Option<PathBuf>,
    handles: Option<(ResourceId, ResourceId)>,
}

impl UniformsScene {
    pub fn new(shader: Option<PathBuf>) -> Self {
        Self {
            shader,
            handles: None,
        }
    }
}

impl SceneProvider for UniformsScene {
    fn name(&self) -> &str {
        "uniforms"
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        let program = acquire_program(resources, &self.shader)?;
        let vertices = resources.vertex_buffer("uniforms vertices", &VERTICES)?;
        self.handles = Some((program, vertices));
        Ok(())
    }

    fn draw_calls(&self, params: &ViewParams) -> Vec<DrawCall> {
        let Some((program, vertex_buffer)) = self.handles else {
            return Vec::new();
        };
        vec![DrawCall {
            program,
            vertex_buffer,
            vertex_count: VERTICES.len() as u32,
            texture: None,
            uniforms: Uniforms::identity().with_tint(pulse_tint(params.time)),
        }]
    }
}
