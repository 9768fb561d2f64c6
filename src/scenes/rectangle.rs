use anyhow::Result;
use glam::Mat4;
use std::path::PathBuf;

use super::common::acquire_program;
use super::{SceneProvider, ViewParams};
use crate::config::SceneConfig;
use crate::core::backend::{DrawCall, ResourceScope, Uniforms, Vertex};
use crate::core::resources::ResourceId;

const CORNERS: [Vertex; 4] = [
    Vertex::new([0.5, 0.5, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0]),   // top right
    Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),  // bottom right
    Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]), // bottom left
    Vertex::new([-0.5, 0.5, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0]),  // top left
];

const INDICES: [usize; 6] = [0, 1, 3, 1, 2, 3];

/// Textured quad built from two triangles, in clip space
///
/// The rotating variant spins the quad about the z axis, one radian per
/// second.
pub struct RectangleScene {
    rotating: bool,
    shader: Option<PathBuf>,
    texture_path: PathBuf,
    flip_textures: bool,
    handles: Option<(ResourceId, ResourceId, Option<ResourceId>)>,
}

impl RectangleScene {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            rotating: false,
            shader: config.shader.clone(),
            texture_path: config.texture.clone(),
            flip_textures: config.flip_textures,
            handles: None,
        }
    }

    pub fn rotating(config: &SceneConfig) -> Self {
        Self {
            rotating: true,
            ..Self::new(config)
        }
    }

    pub fn model(&self, time: f32) -> Mat4 {
        if self.rotating {
            Mat4::from_rotation_z(time)
        } else {
            Mat4::IDENTITY
        }
    }

    pub fn vertices() -> Vec<Vertex> {
        INDICES.iter().map(|&i| CORNERS[i]).collect()
    }
}

impl SceneProvider for RectangleScene {
    fn name(&self) -> &str {
        if self.rotating {
            "rotating"
        } else {
            "rectangle"
        }
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        let program = acquire_program(resources, &self.shader)?;
        let vertices = resources.vertex_buffer("rectangle vertices", &Self::vertices())?;
        let texture = resources.texture_from_file(&self.texture_path, self.flip_textures)?;
        self.handles = Some((program, vertices, texture));
        Ok(())
    }

    fn draw_calls(&self, params: &ViewParams) -> Vec<DrawCall> {
        let Some((program, vertex_buffer, texture)) = self.handles else {
            return Vec::new();
        };
        vec![DrawCall {
            program,
            vertex_buffer,
            vertex_count: INDICES.len() as u32,
            texture,
            uniforms: Uniforms::new(self.model(params.time), Mat4::IDENTITY, Mat4::IDENTITY),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_expands_to_two_triangles() {
        let vertices = RectangleScene::vertices();
        assert_eq!(vertices.len(), 6);
        // Both triangles share the bottom right to top left diagonal
        assert_eq!(vertices[2], vertices[5]);
        assert_eq!(vertices[1], vertices[3]);
    }

    #[test]
    fn test_no_draws_before_acquire() {
        let scene = RectangleScene::new(&SceneConfig::default());
        let params = ViewParams {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            time: 0.0,
        };
        assert!(scene.draw_calls(&params).is_empty());
    }

    #[test]
    fn test_rotating_quad_turns_one_radian_per_second() {
        let config = SceneConfig::default();
        assert_eq!(RectangleScene::new(&config).model(3.0), Mat4::IDENTITY);

        let scene = RectangleScene::rotating(&config);
        assert_eq!(scene.name(), "rotating");
        let corner = scene
            .model(std::f32::consts::FRAC_PI_2)
            .transform_point3(glam::Vec3::new(0.5, 0.0, 0.0));
        assert!((corner - glam::Vec3::new(0.0, 0.5, 0.0)).length() < 1e-5);
    }
}
