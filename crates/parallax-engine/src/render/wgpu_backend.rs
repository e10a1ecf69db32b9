//! wgpu implementation of [`RenderBackend`].
//!
//! Binding calls only update recorded state; `draw_indexed` snapshots it into
//! a draw command. [`WgpuBackend::encode`] replays the commands of one frame
//! into a single render pass. Bound state is kept after encoding, so a frame
//! that skips redundant binds still draws with the state of the previous one.

use std::collections::HashMap;

use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::buffers::{BufferUsage, ElementKind};
use crate::coords::{ColorRgba, PixelRect, Rect, Size};
use crate::error::{ParallaxError, Result};

use super::backend::{
    BufferKind, GpuBufferId, ProgramId, RenderBackend, TextureFilter, TextureId, TextureOptions,
    VertexArrayId,
};
use super::shader::validate_wgsl;
use super::{Material, SceneUniforms};

struct VertexArray {
    program: ProgramId,
    vertex: GpuBufferId,
    index: GpuBufferId,
    index_format: wgpu::IndexFormat,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Copy, Clone)]
struct DrawCommand {
    program: ProgramId,
    vao: VertexArrayId,
    texture: TextureId,
    viewport: Rect,
    scissor: PixelRect,
    count: u32,
}

#[derive(Debug, Default, Copy, Clone)]
struct BoundState {
    program: Option<ProgramId>,
    vao: Option<VertexArrayId>,
    texture: Option<TextureId>,
    viewport: Option<Rect>,
    scissor: Option<PixelRect>,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    surface: Size,
    next_id: u64,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,

    pipelines: HashMap<ProgramId, wgpu::RenderPipeline>,
    buffers: HashMap<GpuBufferId, wgpu::Buffer>,
    vertex_arrays: HashMap<VertexArrayId, VertexArray>,
    textures: HashMap<TextureId, GpuTexture>,

    bound: BoundState,
    clear: Option<ColorRgba>,
    commands: Vec<DrawCommand>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat, surface: Size) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("parallax scene uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(SceneUniforms::SIZE),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("parallax atlas bgl"),
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
        });

        let sampler = |label: &str, filter: wgpu::FilterMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("parallax linear sampler", wgpu::FilterMode::Linear);
        let nearest_sampler = sampler("parallax nearest sampler", wgpu::FilterMode::Nearest);

        Self {
            device,
            queue,
            format,
            surface,
            next_id: 1,
            uniform_layout,
            texture_layout,
            linear_sampler,
            nearest_sampler,
            pipelines: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            bound: BoundState::default(),
            clear: None,
            commands: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Number of draws recorded since the last [`WgpuBackend::encode`].
    pub fn pending_draws(&self) -> usize {
        self.commands.len()
    }

    /// Replays this frame's clear and draws into one render pass on `view`.
    pub fn encode(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let load = match self.clear.take() {
            Some(c) => wgpu::LoadOp::Clear(c.to_wgpu()),
            None => wgpu::LoadOp::Load,
        };
        let commands = std::mem::take(&mut self.commands);

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("parallax scenes pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let mut current: Option<ProgramId> = None;
        for cmd in commands {
            let Some(pipeline) = self.pipelines.get(&cmd.program) else { continue };
            let Some(vao) = self.vertex_arrays.get(&cmd.vao) else { continue };
            let Some(texture) = self.textures.get(&cmd.texture) else { continue };
            let Some(vertex) = self.buffers.get(&vao.vertex) else { continue };
            let Some(index) = self.buffers.get(&vao.index) else { continue };

            if current != Some(cmd.program) {
                rpass.set_pipeline(pipeline);
                current = Some(cmd.program);
            }
            rpass.set_bind_group(0, &vao.bind_group, &[]);
            rpass.set_bind_group(1, &texture.bind_group, &[]);
            rpass.set_vertex_buffer(0, vertex.slice(..));
            rpass.set_index_buffer(index.slice(..), vao.index_format);

            let v = cmd.viewport;
            rpass.set_viewport(v.x, v.y, v.w, v.h, 0.0, 1.0);
            let s = cmd.scissor;
            rpass.set_scissor_rect(s.x, s.y, s.w, s.h);
            rpass.draw_indexed(0..cmd.count, 0, 0..1);
        }
    }

    fn vertex_format(components: u32) -> Result<wgpu::VertexFormat> {
        Ok(match components {
            1 => wgpu::VertexFormat::Float32,
            2 => wgpu::VertexFormat::Float32x2,
            3 => wgpu::VertexFormat::Float32x3,
            4 => wgpu::VertexFormat::Float32x4,
            n => return Err(ParallaxError::config(format!("unsupported vertex input width {n}"))),
        })
    }
}

fn alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn premultiplied(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let a = px[3] as u16;
        for c in 0..3 {
            px[c] = ((px[c] as u16 * a + 127) / 255) as u8;
        }
    }
    out
}

impl RenderBackend for WgpuBackend {
    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn surface_size(&self) -> Size {
        self.surface
    }

    fn set_surface_size(&mut self, size: Size) {
        self.surface = size;
    }

    fn compile_program(&mut self, material: &Material) -> Result<ProgramId> {
        validate_wgsl(&material.source, &[material.vertex_entry, material.fragment_entry])?;

        let attributes = material
            .layout()
            .map(|(input, offset)| {
                Ok(wgpu::VertexAttribute {
                    format: Self::vertex_format(input.components)?,
                    offset: offset as u64 * std::mem::size_of::<f32>() as u64,
                    shader_location: input.location,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(material.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(material.source.as_str().into()),
        });

        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("parallax pipeline layout"),
            bind_group_layouts: &[&self.uniform_layout, &self.texture_layout],
            immediate_size: 0,
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(material.label.as_str()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(material.vertex_entry),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: material.stride_bytes(),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(material.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: material.transparent.then(alpha_blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let id = ProgramId::from_raw(self.next());
        self.pipelines.insert(id, pipeline);
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.bound.program = Some(program);
    }

    fn create_buffer(&mut self, kind: BufferKind, usage: BufferUsage, bytes: &[u8]) -> Result<GpuBufferId> {
        let usages = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let label = match (kind, usage) {
            (BufferKind::Vertex, BufferUsage::Static) => "parallax static vbo",
            (BufferKind::Vertex, BufferUsage::Dynamic) => "parallax dynamic vbo",
            (BufferKind::Index, _) => "parallax ibo",
        };

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytes,
            usage: usages,
        });

        let id = GpuBufferId::from_raw(self.next());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: GpuBufferId, offset: u64, bytes: &[u8]) {
        let Some(target) = self.buffers.get(&buffer) else {
            log::warn!("write to unknown buffer {buffer:?}");
            return;
        };
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            log::error!("unaligned buffer write at {offset} into {buffer:?}");
            return;
        }
        let rem = bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT;
        if rem == 0 {
            self.queue.write_buffer(target, offset, bytes);
        } else {
            // created padded by create_buffer_init
            let mut padded = bytes.to_vec();
            padded.resize(bytes.len() + (wgpu::COPY_BUFFER_ALIGNMENT - rem) as usize, 0);
            self.queue.write_buffer(target, offset, &padded);
        }
    }

    fn delete_buffer(&mut self, buffer: GpuBufferId) {
        if let Some(b) = self.buffers.remove(&buffer) {
            b.destroy();
        }
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramId,
        vertex: GpuBufferId,
        index: GpuBufferId,
        index_kind: ElementKind,
    ) -> Result<VertexArrayId> {
        if !self.pipelines.contains_key(&program) {
            return Err(ParallaxError::config(format!("unknown program {program:?}")));
        }
        if !self.buffers.contains_key(&vertex) || !self.buffers.contains_key(&index) {
            return Err(ParallaxError::config("vertex array references a deleted buffer"));
        }
        let index_format = match index_kind {
            ElementKind::U16 => wgpu::IndexFormat::Uint16,
            ElementKind::U32 => wgpu::IndexFormat::Uint32,
            ElementKind::F32 => return Err(ParallaxError::config("index buffers must be integer typed")),
        };

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("parallax scene ubo"),
            size: SceneUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("parallax scene bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        let id = VertexArrayId::from_raw(self.next());
        self.vertex_arrays.insert(
            id,
            VertexArray {
                program,
                vertex,
                index,
                index_format,
                uniforms,
                bind_group,
            },
        );
        Ok(id)
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.bound.vao = vao;
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        if let Some(v) = self.vertex_arrays.remove(&vao) {
            v.uniforms.destroy();
        }
        if self.bound.vao == Some(vao) {
            self.bound.vao = None;
        }
    }

    fn write_uniforms(&mut self, vao: VertexArrayId, uniforms: &SceneUniforms) {
        let Some(v) = self.vertex_arrays.get(&vao) else { return };
        self.queue.write_buffer(&v.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    fn create_texture(&mut self, image: &RgbaImage, options: &TextureOptions) -> Result<TextureId> {
        let (width, height) = image.dimensions();
        let max = self.max_texture_size();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(ParallaxError::Context(format!(
                "texture {width}x{height} is outside the device range 1..={max}"
            )));
        }

        let converted;
        let pixels = if options.premultiply_alpha {
            converted = premultiplied(image);
            &converted
        } else {
            image
        };

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(options.label.as_deref().unwrap_or("parallax atlas")),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = match options.filter {
            TextureFilter::Linear => &self.linear_sampler,
            TextureFilter::Nearest => &self.nearest_sampler,
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("parallax atlas bind group"),
            layout: &self.texture_layout,
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

        let id = TextureId::from_raw(self.next());
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                bind_group,
            },
        );
        Ok(id)
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.bound.texture = Some(texture);
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture) {
            t.texture.destroy();
        }
        if self.bound.texture == Some(texture) {
            self.bound.texture = None;
        }
    }

    fn clear(&mut self, color: ColorRgba) {
        self.clear = Some(color);
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.bound.viewport = Some(rect);
    }

    fn set_scissor(&mut self, rect: PixelRect) {
        self.bound.scissor = Some(rect);
    }

    fn draw_indexed(&mut self, count: u32) {
        let b = self.bound;
        let (Some(program), Some(vao), Some(texture)) = (b.program, b.vao, b.texture) else {
            log::warn!("draw without a bound program, vertex array and texture; skipped");
            return;
        };
        if self.vertex_arrays.get(&vao).is_some_and(|v| v.program != program) {
            log::debug!("vertex array {vao:?} was built for another program");
        }

        let viewport = b
            .viewport
            .unwrap_or(Rect::new(0.0, 0.0, self.surface.w as f32, self.surface.h as f32));
        let scissor = b
            .scissor
            .unwrap_or(PixelRect::new(0, 0, self.surface.w, self.surface.h));

        self.commands.push(DrawCommand {
            program,
            vao,
            texture,
            viewport,
            scissor,
            count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_scales_colour_by_alpha() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 128, 0, 128]));
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));

        let out = premultiplied(&img);
        assert_eq!(out.get_pixel(0, 0).0, [128, 64, 0, 128]);
        assert_eq!(out.get_pixel(1, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn vertex_formats_cover_float_vectors() {
        assert_eq!(WgpuBackend::vertex_format(4).unwrap(), wgpu::VertexFormat::Float32x4);
        assert!(WgpuBackend::vertex_format(5).is_err());
    }
}
