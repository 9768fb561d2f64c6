use anyhow::Result;
use std::path::PathBuf;

use super::common::acquire_program;
use super::{SceneProvider, ViewParams};
use crate::core::backend::{DrawCall, ResourceScope, Uniforms, Vertex};
use crate::core::resources::ResourceId;

const GRAY: [f32; 3] = [0.5, 0.5, 0.5];

const VERTICES: [Vertex; 3] = [
    Vertex::new([-0.5, -0.5, 0.0], GRAY, [0.0, 0.0]),
    Vertex::new([0.5, -0.5, 0.0], GRAY, [1.0, 0.0]),
    Vertex::new([0.0, 0.5, 0.0], GRAY, [0.5, 1.0]),
];

#[derive(Debug, Clone, Copy)]
struct Handles {
    program: ResourceId,
    vertices: ResourceId,
}

/// Flat gray triangle in clip space; ignores the camera
pub struct TriangleScene {
    shader: Option<PathBuf>,
    handles: Option<Handles>,
}

impl TriangleScene {
    pub fn new(shader: Option<PathBuf>) -> Self {
        Self {
            shader,
            handles: None,
        }
    }
}

impl SceneProvider for TriangleScene {
    fn name(&self) -> &str {
        "triangle"
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        let program = acquire_program(resources, &self.shader)?;
        let vertices = resources.vertex_buffer("triangle vertices", &VERTICES)?;
        self.handles = Some(Handles { program, vertices });
        Ok(())
    }

    fn draw_calls(&self, _params: &ViewParams) -> Vec<DrawCall> {
        self.handles
            .map(|h| DrawCall {
                program: h.program,
                vertex_buffer: h.vertices,
                vertex_count: VERTICES.len() as u32,
                texture: None,
                uniforms: Uniforms::identity(),
            })
            .into_iter()
            .collect()
    }
}
