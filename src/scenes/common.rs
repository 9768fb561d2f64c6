use anyhow::Result;
use glam::Vec3;
use std::path::PathBuf;

use crate::core::backend::{ResourceScope, ShaderSource, Vertex};
use crate::core::resources::ResourceId;

/// World positions of the ten cubes
pub const CUBE_POSITIONS: [Vec3; 10] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(2.0, 5.0, -15.0),
    Vec3::new(-1.5, -2.2, -2.5),
    Vec3::new(-3.8, -2.0, -12.3),
    Vec3::new(2.4, -0.4, -3.5),
    Vec3::new(-1.7, 3.0, -7.5),
    Vec3::new(1.3, -2.0, -2.5),
    Vec3::new(1.5, 2.0, -2.5),
    Vec3::new(-1.5, 0.2, -1.5),
    Vec3::new(0.5, 1.0, -10.5),
];

const FACE_COLORS: [[f32; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
];

const FACE_UVS: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [1.0, 1.0],
    [1.0, 1.0],
    [0.0, 1.0],
    [0.0, 0.0],
];

// Two triangles per face, corners in FACE_UVS order
const FACES: [[[f32; 3]; 6]; 6] = [
    // back
    [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, -0.5],
    ],
    // front
    [
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
        [-0.5, -0.5, 0.5],
    ],
    // left
    [
        [-0.5, 0.5, 0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, -0.5],
        [-0.5, -0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ],
    // right
    [
        [0.5, 0.5, 0.5],
        [0.5, 0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
    ],
    // bottom
    [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [-0.5, -0.5, 0.5],
        [-0.5, -0.5, -0.5],
    ],
    // top
    [
        [-0.5, 0.5, -0.5],
        [0.5, 0.5, -0.5],
        [0.5, 0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
        [-0.5, 0.5, -0.5],
    ],
];

/// Unit cube centred on the origin as 36 triangle-list vertices
pub fn cube_vertices() -> Vec<Vertex> {
    FACES
        .iter()
        .flat_map(|face| {
            face.iter()
                .zip(FACE_COLORS.iter().zip(FACE_UVS.iter()))
                .map(|(&position, (&color, &uv))| Vertex::new(position, color, uv))
        })
        .collect()
}

/// Program from the configured shader file, or the built-in one
pub(crate) fn acquire_program(resources: &mut ResourceScope<'_>, shader: &Option<PathBuf>) -> Result<ResourceId> {
    match shader {
        Some(path) => resources.program_from_file(path),
        None => resources.program(&ShaderSource::textured()),
    }
}
