use anyhow::Result;
use glam::{Mat4, Vec3};
use std::path::PathBuf;

use super::common::acquire_program;
use super::{SceneProvider, ViewParams};
use crate::config::SceneConfig;
use crate::core::backend::{DrawCall, ResourceScope, Uniforms};
use crate::core::resources::ResourceId;
use crate::loaders::load_model;

const MODEL_SCALE: f32 = 0.3;
const SPIN_RATE: f32 = 50.0;

#[derive(Debug, Clone, Copy)]
struct MeshHandles {
    vertices: ResourceId,
    vertex_count: u32,
    texture: Option<ResourceId>,
}

/// Imported glTF model spinning about the vertical axis
pub struct ModelScene {
    shader: Option<PathBuf>,
    model_path: PathBuf,
    program: Option<ResourceId>,
    meshes: Vec<MeshHandles>,
}

impl ModelScene {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            shader: config.shader.clone(),
            model_path: config.model.clone(),
            program: None,
            meshes: Vec::new(),
        }
    }

    pub fn model_matrix(time: f32) -> Mat4 {
        Mat4::from_rotation_y((time * SPIN_RATE).to_radians()) * Mat4::from_scale(Vec3::splat(MODEL_SCALE))
    }
}

impl SceneProvider for ModelScene {
    fn name(&self) -> &str {
        "model"
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        self.program = Some(acquire_program(resources, &self.shader)?);

        let model = match load_model(&self.model_path) {
            Ok(model) => model,
            Err(e) => {
                log::warn!("Continuing without model: {:#}", e);
                return Ok(());
            }
        };

        // glTF images are uploaded once even when several meshes share them
        let mut textures = Vec::with_capacity(model.textures.len());
        for (i, image) in model.textures.iter().enumerate() {
            let id = match image {
                Some(image) => Some(resources.texture(&format!("model texture {}", i), image)?),
                None => None,
            };
            textures.push(id);
        }

        for mesh in &model.meshes {
            let vertices = mesh.vertices();
            if vertices.is_empty() {
                continue;
            }
            let buffer = resources.vertex_buffer(&mesh.name, &vertices)?;
            self.meshes.push(MeshHandles {
                vertices: buffer,
                vertex_count: vertices.len() as u32,
                texture: mesh.texture.and_then(|i| textures.get(i).copied().flatten()),
            });
        }

        Ok(())
    }

    fn draw_calls(&self, params: &ViewParams) -> Vec<DrawCall> {
        let Some(program) = self.program else {
            return Vec::new();
        };
        let uniforms = Uniforms::new(Self::model_matrix(params.time), params.view, params.projection);
        self.meshes
            .iter()
            .map(|mesh| DrawCall {
                program,
                vertex_buffer: mesh.vertices,
                vertex_count: mesh.vertex_count,
                texture: mesh.texture,
                uniforms,
            })
            .collect()
    }
}
