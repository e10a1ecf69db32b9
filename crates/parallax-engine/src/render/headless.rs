//! Device-free backend that records every call.
//!
//! Used by tests and tools to exercise the render controller without a GPU.
//! Programs are still validated with naga so shader errors surface.

use std::collections::{HashMap, HashSet};

use image::RgbaImage;

use crate::buffers::{BufferUsage, ElementKind};
use crate::coords::{ColorRgba, PixelRect, Rect, Size};
use crate::error::{ParallaxError, Result};

use super::backend::{
    BufferKind, GpuBufferId, ProgramId, RenderBackend, TextureId, TextureOptions, VertexArrayId,
};
use super::shader::validate_wgsl;
use super::{Material, SceneUniforms};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CompileProgram(ProgramId),
    UseProgram(ProgramId),
    CreateBuffer { id: GpuBufferId, kind: BufferKind, len: usize },
    WriteBuffer { id: GpuBufferId, offset: u64, len: usize },
    DeleteBuffer(GpuBufferId),
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    DeleteVertexArray(VertexArrayId),
    WriteUniforms(VertexArrayId),
    CreateTexture { id: TextureId, width: u32, height: u32 },
    BindTexture(TextureId),
    DeleteTexture(TextureId),
    Clear(ColorRgba),
    SetViewport(Rect),
    SetScissor(PixelRect),
    DrawIndexed(u32),
}

#[derive(Debug)]
pub struct HeadlessBackend {
    max_texture_size: u32,
    surface: Size,
    next_id: u64,
    calls: Vec<BackendCall>,
    programs: HashSet<ProgramId>,
    buffers: HashMap<GpuBufferId, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayId, SceneUniforms>,
    textures: HashSet<TextureId>,
}

impl HeadlessBackend {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            surface: Size::new(800, 600),
            next_id: 1,
            calls: Vec::new(),
            programs: HashSet::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashSet::new(),
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Current contents of a live buffer.
    pub fn buffer_bytes(&self, id: GpuBufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    /// Last uniform block written for a live vertex array.
    pub fn uniforms(&self, vao: VertexArrayId) -> Option<&SceneUniforms> {
        self.vertex_arrays.get(&vao)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }
}

impl RenderBackend for HeadlessBackend {
    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn surface_size(&self) -> Size {
        self.surface
    }

    fn set_surface_size(&mut self, size: Size) {
        self.surface = size;
    }

    fn compile_program(&mut self, material: &Material) -> Result<ProgramId> {
        validate_wgsl(&material.source, &[material.vertex_entry, material.fragment_entry])?;
        let id = ProgramId::from_raw(self.next());
        self.programs.insert(id);
        self.calls.push(BackendCall::CompileProgram(id));
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn create_buffer(&mut self, kind: BufferKind, _usage: BufferUsage, bytes: &[u8]) -> Result<GpuBufferId> {
        let id = GpuBufferId::from_raw(self.next());
        self.buffers.insert(id, bytes.to_vec());
        self.calls.push(BackendCall::CreateBuffer {
            id,
            kind,
            len: bytes.len(),
        });
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: GpuBufferId, offset: u64, bytes: &[u8]) {
        self.calls.push(BackendCall::WriteBuffer {
            id: buffer,
            offset,
            len: bytes.len(),
        });
        let start = offset as usize;
        let slot = self
            .buffers
            .get_mut(&buffer)
            .and_then(|b| b.get_mut(start..start + bytes.len()));
        match slot {
            Some(dst) => dst.copy_from_slice(bytes),
            None => log::error!("write of {} bytes at {offset} out of bounds for {buffer:?}", bytes.len()),
        }
    }

    fn delete_buffer(&mut self, buffer: GpuBufferId) {
        self.buffers.remove(&buffer);
        self.calls.push(BackendCall::DeleteBuffer(buffer));
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramId,
        vertex: GpuBufferId,
        index: GpuBufferId,
        _index_kind: ElementKind,
    ) -> Result<VertexArrayId> {
        if !self.programs.contains(&program) {
            return Err(ParallaxError::config(format!("unknown program {program:?}")));
        }
        if !self.buffers.contains_key(&vertex) || !self.buffers.contains_key(&index) {
            return Err(ParallaxError::config("vertex array references a deleted buffer"));
        }
        let id = VertexArrayId::from_raw(self.next());
        self.vertex_arrays.insert(id, SceneUniforms::default());
        self.calls.push(BackendCall::CreateVertexArray(id));
        Ok(id)
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        self.calls.push(BackendCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        self.vertex_arrays.remove(&vao);
        self.calls.push(BackendCall::DeleteVertexArray(vao));
    }

    fn write_uniforms(&mut self, vao: VertexArrayId, uniforms: &SceneUniforms) {
        if let Some(slot) = self.vertex_arrays.get_mut(&vao) {
            *slot = *uniforms;
        }
        self.calls.push(BackendCall::WriteUniforms(vao));
    }

    fn create_texture(&mut self, image: &RgbaImage, _options: &TextureOptions) -> Result<TextureId> {
        let (width, height) = image.dimensions();
        if width > self.max_texture_size || height > self.max_texture_size {
            return Err(ParallaxError::Context(format!(
                "texture {width}x{height} exceeds device limit {}",
                self.max_texture_size
            )));
        }
        let id = TextureId::from_raw(self.next());
        self.textures.insert(id);
        self.calls.push(BackendCall::CreateTexture { id, width, height });
        Ok(id)
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.calls.push(BackendCall::BindTexture(texture));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.calls.push(BackendCall::DeleteTexture(texture));
    }

    fn clear(&mut self, color: ColorRgba) {
        self.calls.push(BackendCall::Clear(color));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.calls.push(BackendCall::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: PixelRect) {
        self.calls.push(BackendCall::SetScissor(rect));
    }

    fn draw_indexed(&mut self, count: u32) {
        self.calls.push(BackendCall::DrawIndexed(count));
    }
}
