use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use wgpu::{BindGroup, BindGroupLayout, Buffer, Device, RenderPipeline, Sampler, SurfaceConfiguration, Texture, TextureView};
use winit::window::Window;

use super::backend::{DrawCall, GpuBackend, ProgramStatus, ShaderSource, Uniforms, Vertex};
use super::gpu_context::GpuContext;
use super::resources::{ResourceId, ResourceKind};
use crate::config::WindowConfig;
use crate::loaders::ImageData;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_DRAW_CAPACITY: usize = 64;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

/// Vertex buffer layout matching [`Vertex`]
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Preferred sRGB format and first alpha mode the surface supports
pub fn pick_surface_format(
    caps: &wgpu::SurfaceCapabilities,
) -> Result<(wgpu::TextureFormat, wgpu::CompositeAlphaMode)> {
    let fallback = caps
        .formats
        .first()
        .copied()
        .context("Surface reports no supported texture formats")?;
    let format = caps.formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(fallback);
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .context("Surface reports no supported alpha modes")?;
    Ok((format, alpha_mode))
}

struct GpuTexture {
    texture: Texture,
    bind_group: BindGroup,
}

/// Per-draw uniform blocks packed at dynamic offsets into one buffer
struct UniformRing {
    buffer: Buffer,
    bind_group: BindGroup,
    stride: u64,
    capacity: usize,
}

/// Renders draw calls to a window surface through wgpu
///
/// Scene objects live in maps keyed by [`ResourceId`]; the frame loop owns
/// their lifetime. The depth buffer, uniform ring and fallback texture are
/// internal and follow the backend's own lifetime.
pub struct WgpuBackend {
    gpu: GpuContext,
    surface_config: SurfaceConfiguration,
    depth_view: TextureView,
    uniform_layout: BindGroupLayout,
    texture_layout: BindGroupLayout,
    sampler: Sampler,
    uniforms: UniformRing,
    fallback: GpuTexture,
    buffers: HashMap<ResourceId, Buffer>,
    textures: HashMap<ResourceId, GpuTexture>,
    programs: HashMap<ResourceId, Option<RenderPipeline>>,
    clear_color: wgpu::Color,
    pending: Vec<DrawCall>,
    reported_invalid: HashSet<ResourceId>,
}

impl WgpuBackend {
    /// Create a backend presenting to `window`
    pub async fn new(window: Arc<Window>, config: &WindowConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuContext::for_window(window, config).await?;

        let surface_caps = gpu.surface().get_capabilities(gpu.adapter());
        let (surface_format, alpha_mode) = pick_surface_format(&surface_caps)?;

        let surface_config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if config.vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        gpu.surface().configure(gpu.device(), &surface_config);

        let device = gpu.device();
        let depth_view = Self::create_depth_view(device, &surface_config);
        let uniform_layout = Self::create_uniform_layout(device);
        let texture_layout = Self::create_texture_layout(device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Diffuse Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let uniforms = Self::create_uniform_ring(device, &uniform_layout, INITIAL_DRAW_CAPACITY);

        let mut backend = Self {
            fallback: Self::upload_texture(&gpu, &texture_layout, &sampler, "Fallback Texture", &ImageData::white()),
            gpu,
            surface_config,
            depth_view,
            uniform_layout,
            texture_layout,
            sampler,
            uniforms,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            clear_color: wgpu::Color::BLACK,
            pending: Vec::new(),
            reported_invalid: HashSet::new(),
        };
        backend.pending.reserve(INITIAL_DRAW_CAPACITY);

        log::info!(
            "Surface configured: {}x{} {:?} {:?}",
            backend.surface_config.width,
            backend.surface_config.height,
            surface_format,
            backend.surface_config.present_mode
        );
        Ok(backend)
    }

    fn create_depth_view(device: &Device, config: &SurfaceConfiguration) -> TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Depth Texture"),
                size: wgpu::Extent3d {
                    width: config.width,
                    height: config.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_uniform_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                },
                count: None,
            }],
        })
    }

    fn create_texture_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn create_uniform_ring(device: &Device, layout: &BindGroupLayout, capacity: usize) -> UniformRing {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let size = std::mem::size_of::<Uniforms>() as u64;
        let stride = size.div_ceil(alignment) * alignment;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Ring"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(size),
                }),
            }],
        });

        UniformRing {
            buffer,
            bind_group,
            stride,
            capacity,
        }
    }

    fn upload_texture(
        gpu: &GpuContext,
        layout: &BindGroupLayout,
        sampler: &Sampler,
        label: &str,
        image: &ImageData,
    ) -> GpuTexture {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        gpu.queue().write_texture(
            texture.as_image_copy(),
            &image.to_rgba8(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        GpuTexture { texture, bind_group }
    }

    fn build_pipeline(&self, source: &ShaderSource) -> RenderPipeline {
        let device = self.gpu.device();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.code.as_str().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&source.label),
            bind_group_layouts: &[&self.uniform_layout, &self.texture_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&source.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Write every pending draw's uniforms, growing the ring if needed
    fn upload_uniforms(&mut self) {
        if self.pending.len() > self.uniforms.capacity {
            let capacity = self.pending.len().next_power_of_two();
            log::debug!("Growing uniform ring to {} draws", capacity);
            self.uniforms = Self::create_uniform_ring(self.gpu.device(), &self.uniform_layout, capacity);
        }
        for (i, call) in self.pending.iter().enumerate() {
            self.gpu.queue().write_buffer(
                &self.uniforms.buffer,
                i as u64 * self.uniforms.stride,
                bytemuck::bytes_of(&call.uniforms),
            );
        }
    }

    fn encode_frame(&mut self, target: &TextureView) -> wgpu::CommandBuffer {
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (i, call) in self.pending.iter().enumerate() {
                let Some(Some(pipeline)) = self.programs.get(&call.program) else {
                    if self.reported_invalid.insert(call.program) {
                        log::warn!("Skipping draws with unusable program {}", call.program);
                    }
                    continue;
                };
                let Some(vertices) = self.buffers.get(&call.vertex_buffer) else {
                    continue;
                };
                let texture = call
                    .texture
                    .and_then(|id| self.textures.get(&id))
                    .unwrap_or(&self.fallback);

                let offset = (i as u64 * self.uniforms.stride) as wgpu::DynamicOffset;
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.uniforms.bind_group, &[offset]);
                render_pass.set_bind_group(1, &texture.bind_group, &[]);
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                render_pass.draw(0..call.vertex_count, 0..1);
            }
        }

        encoder.finish()
    }
}

impl GpuBackend for WgpuBackend {
    fn create_vertex_buffer(&mut self, id: ResourceId, label: &str, vertices: &[Vertex]) -> Result<()> {
        anyhow::ensure!(!vertices.is_empty(), "vertex buffer {:?} is empty", label);
        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffers.insert(id, buffer);
        Ok(())
    }

    fn create_texture(&mut self, id: ResourceId, label: &str, image: &ImageData) -> Result<()> {
        let max = self.gpu.device().limits().max_texture_dimension_2d;
        anyhow::ensure!(
            image.width > 0 && image.height > 0 && image.width <= max && image.height <= max,
            "texture {:?} has unsupported size {}x{}",
            label,
            image.width,
            image.height
        );
        let texture = Self::upload_texture(&self.gpu, &self.texture_layout, &self.sampler, label, image);
        self.textures.insert(id, texture);
        Ok(())
    }

    fn create_program(&mut self, id: ResourceId, source: &ShaderSource) -> Result<ProgramStatus> {
        let device = self.gpu.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.build_pipeline(source);
        let error = pollster::block_on(self.gpu.device().pop_error_scope());

        let status = match error {
            Some(error) => {
                self.programs.insert(id, None);
                ProgramStatus::Failed {
                    log: error.to_string(),
                }
            }
            None => {
                self.programs.insert(id, Some(pipeline));
                ProgramStatus::Linked
            }
        };
        Ok(status)
    }

    fn release(&mut self, id: ResourceId, kind: ResourceKind) {
        match kind {
            ResourceKind::Buffer => {
                if let Some(buffer) = self.buffers.remove(&id) {
                    buffer.destroy();
                }
            }
            ResourceKind::Texture => {
                if let Some(texture) = self.textures.remove(&id) {
                    texture.texture.destroy();
                }
            }
            ResourceKind::Program => {
                self.programs.remove(&id);
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.gpu.surface().configure(self.gpu.device(), &self.surface_config);
        self.depth_view = Self::create_depth_view(self.gpu.device(), &self.surface_config);
    }

    fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.pending.clear();
        self.clear_color = wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        };
    }

    fn draw(&mut self, call: &DrawCall) {
        self.pending.push(*call);
    }

    fn present(&mut self) -> Result<()> {
        let frame = match self.gpu.surface().get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.gpu.surface().configure(self.gpu.device(), &self.surface_config);
                self.pending.clear();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, dropping frame");
                self.pending.clear();
                return Ok(());
            }
            Err(e) => {
                self.pending.clear();
                return Err(e.into());
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.upload_uniforms();
        let commands = self.encode_frame(&view);
        self.gpu.queue().submit(std::iter::once(commands));
        frame.present();
        self.pending.clear();
        Ok(())
    }
}
