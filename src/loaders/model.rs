use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Vec3};
use std::path::Path;

use super::texture::ImageData;
use crate::core::backend::Vertex;

/// One glTF primitive with node transforms already applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
    /// Index into [`Model::textures`]
    pub texture: Option<usize>,
}

impl MeshData {
    /// Triangle-list vertices with indices expanded, tinted by the base color
    pub fn vertices(&self) -> Vec<Vertex> {
        let color = [self.base_color[0], self.base_color[1], self.base_color[2]];
        let vertex = |i: usize| {
            Vertex::new(
                self.positions[i].to_array(),
                color,
                self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
            )
        };

        if self.indices.is_empty() {
            (0..self.positions.len() - self.positions.len() % 3).map(vertex).collect()
        } else {
            self.indices
                .chunks_exact(3)
                .filter(|tri| tri.iter().all(|&i| (i as usize) < self.positions.len()))
                .flatten()
                .map(|&i| vertex(i as usize))
                .collect()
        }
    }
}

/// Imported model: meshes plus the images their materials reference
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub meshes: Vec<MeshData>,
    pub textures: Vec<Option<ImageData>>,
}

/// Import every mesh primitive reachable from the model's scenes
pub fn load_model(path: impl AsRef<Path>) -> Result<Model> {
    let path = path.as_ref();
    log::info!("Loading model: {:?}", path);

    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF file: {:?}", path))?;

    log::debug!(
        "glTF loaded: {} scenes, {} nodes, {} meshes, {} images",
        document.scenes().count(),
        document.nodes().count(),
        document.meshes().count(),
        images.len()
    );

    let textures = images.iter().map(convert_image).collect();

    let mut meshes = Vec::new();
    for scene in document.scenes() {
        for node in scene.nodes() {
            process_node(&node, &buffers, &Mat4::IDENTITY, &mut meshes)?;
        }
    }

    if meshes.is_empty() {
        log::warn!("No geometry found in {:?}", path);
    }

    log::info!("Extracted {} meshes from {:?}", meshes.len(), path);
    Ok(Model { meshes, textures })
}

/// Recursively processes glTF nodes
fn process_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent_transform: &Mat4,
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    let global_transform = *parent_transform * local_transform;

    if let Some(mesh) = node.mesh() {
        process_mesh(&mesh, buffers, &global_transform, meshes)?;
    }

    for child in node.children() {
        process_node(&child, buffers, &global_transform, meshes)?;
    }

    Ok(())
}

fn process_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    transform: &Mat4,
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();
    let name = mesh.name().unwrap_or("unnamed").to_string();

    for primitive in mesh.primitives() {
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .with_context(|| format!("Mesh {:?} primitive has no positions", name))?
            .map(|p| transform.transform_point3(Vec3::from_array(p)))
            .collect();

        if positions.is_empty() {
            continue;
        }

        let normals = reader
            .read_normals()
            .map(|normals| {
                normals
                    .map(|n| (normal_matrix * Vec3::from_array(n)).normalize_or_zero())
                    .collect()
            })
            .unwrap_or_default();

        let tex_coords = reader
            .read_tex_coords(0)
            .map(|uv| uv.into_f32().collect())
            .unwrap_or_default();

        let indices = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_default();

        let pbr = primitive.material().pbr_metallic_roughness();
        let texture = pbr
            .base_color_texture()
            .map(|info| info.texture().source().index());

        meshes.push(MeshData {
            name: name.clone(),
            positions,
            normals,
            tex_coords,
            indices,
            base_color: pbr.base_color_factor(),
            texture,
        });
    }

    Ok(())
}

fn convert_image(image: &gltf::image::Data) -> Option<ImageData> {
    let channels = match image.format {
        gltf::image::Format::R8 => 1,
        gltf::image::Format::R8G8 => 2,
        gltf::image::Format::R8G8B8 => 3,
        gltf::image::Format::R8G8B8A8 => 4,
        other => {
            log::warn!("Unsupported glTF image format {:?}, skipping texture", other);
            return None;
        }
    };
    Some(ImageData::new(image.pixels.clone(), image.width, image.height, channels))
}
