use anyhow::{Context, Result};
use glam::Mat4;
use std::path::Path;

use super::resources::{ResourceId, ResourceKind, ResourceRegistry};
use crate::loaders::{load_image, ImageData};

/// Byte limit for shader compile/link logs
pub const INFO_LOG_LEN: usize = 512;

/// Interleaved vertex: position, color, texture coordinates
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coords,
        }
    }
}

/// Per-draw transform block plus a color multiplied into every fragment
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

impl Uniforms {
    pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    pub fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            tint: Self::WHITE,
        }
    }

    pub fn with_tint(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }

    pub fn identity() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// One draw submission for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub program: ResourceId,
    pub vertex_buffer: ResourceId,
    pub vertex_count: u32,
    pub texture: Option<ResourceId>,
    pub uniforms: Uniforms,
}

/// WGSL shader text with `vs_main`/`fs_main` entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: String,
    pub code: String,
}

impl ShaderSource {
    pub fn wgsl(label: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }

    /// Built-in textured shader
    pub fn textured() -> Self {
        Self::wgsl("textured", include_str!("../shaders/textured.wgsl"))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read shader file: {:?}", path))?;
        Ok(Self::wgsl(path.display().to_string(), code))
    }
}

/// Outcome of building a program; a failed program stays allocated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    Linked,
    Failed { log: String },
}

/// GPU driver seam: object creation, draw submission, presentation
///
/// Creation errors are fatal to the session. Shader failures are not errors;
/// they come back as [`ProgramStatus::Failed`].
pub trait GpuBackend {
    fn create_vertex_buffer(&mut self, id: ResourceId, label: &str, vertices: &[Vertex]) -> Result<()>;

    fn create_texture(&mut self, id: ResourceId, label: &str, image: &ImageData) -> Result<()>;

    fn create_program(&mut self, id: ResourceId, source: &ShaderSource) -> Result<ProgramStatus>;

    /// Destroy an object; called exactly once per created id
    fn release(&mut self, id: ResourceId, kind: ResourceKind);

    /// Reconfigure the render target; zero sizes are ignored
    fn resize(&mut self, width: u32, height: u32);

    /// Current render target size in pixels
    fn size(&self) -> (u32, u32);

    /// Start a frame cleared to `color`
    fn clear(&mut self, color: [f32; 4]);

    fn draw(&mut self, call: &DrawCall);

    /// Flush the frame's draws and show it
    fn present(&mut self) -> Result<()>;
}

/// Truncate a driver log to [`INFO_LOG_LEN`] bytes on a char boundary
pub fn bounded_log(log: &str) -> String {
    if log.len() <= INFO_LOG_LEN {
        return log.to_string();
    }
    let mut end = INFO_LOG_LEN;
    while !log.is_char_boundary(end) {
        end -= 1;
    }
    log[..end].to_string()
}

/// Acquisition-time view of the backend handed to scenes
///
/// Every object created here is registered and later released by the frame
/// loop; scenes never release anything themselves.
pub struct ResourceScope<'a> {
    backend: &'a mut dyn GpuBackend,
    registry: &'a mut ResourceRegistry,
}

impl<'a> ResourceScope<'a> {
    pub fn new(backend: &'a mut dyn GpuBackend, registry: &'a mut ResourceRegistry) -> Self {
        Self { backend, registry }
    }

    pub fn vertex_buffer(&mut self, label: &str, vertices: &[Vertex]) -> Result<ResourceId> {
        let id = self.registry.peek_id();
        self.backend
            .create_vertex_buffer(id, label, vertices)
            .with_context(|| format!("Failed to create vertex buffer {:?}", label))?;
        Ok(self.registry.insert(ResourceKind::Buffer, label))
    }

    pub fn texture(&mut self, label: &str, image: &ImageData) -> Result<ResourceId> {
        let id = self.registry.peek_id();
        self.backend
            .create_texture(id, label, image)
            .with_context(|| format!("Failed to create texture {:?}", label))?;
        Ok(self.registry.insert(ResourceKind::Texture, label))
    }

    /// Decode and upload an image; a decode failure is logged and yields `None`
    pub fn texture_from_file(&mut self, path: &Path, flip_vertically: bool) -> Result<Option<ResourceId>> {
        match load_image(path, flip_vertically) {
            Ok(image) => self.texture(&path.display().to_string(), &image).map(Some),
            Err(e) => {
                log::warn!("Failed to load texture: {}", e);
                Ok(None)
            }
        }
    }

    /// Build a program; compile/link failures are logged and the id stays live
    pub fn program(&mut self, source: &ShaderSource) -> Result<ResourceId> {
        let id = self.registry.peek_id();
        let status = self
            .backend
            .create_program(id, source)
            .with_context(|| format!("Failed to create program {:?}", source.label))?;
        if let ProgramStatus::Failed { log } = &status {
            log::error!("Shader program {:?} failed to build:\n{}", source.label, bounded_log(log));
        }
        Ok(self.registry.insert(ResourceKind::Program, source.label.clone()))
    }

    /// Program from a shader file; an unreadable file yields a program that
    /// fails to build instead of aborting
    pub fn program_from_file(&mut self, path: &Path) -> Result<ResourceId> {
        let source = ShaderSource::from_file(path).unwrap_or_else(|e| {
            log::error!("{:#}", e);
            ShaderSource::wgsl(path.display().to_string(), "")
        });
        self.program(&source)
    }

    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }
}
