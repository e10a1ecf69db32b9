use image::RgbaImage;

use crate::buffers::{BufferUsage, ElementKind};
use crate::coords::{ColorRgba, PixelRect, Rect, Size};
use crate::error::Result;

use super::{Material, SceneUniforms};

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Compiled shader program (render pipeline).
    ProgramId
);
gpu_handle!(
    /// GPU-side copy of a vertex or index buffer.
    GpuBufferId
);
gpu_handle!(
    /// Captured vertex binding: vertex buffer + index buffer + per-scene uniforms.
    VertexArrayId
);
gpu_handle!(
    /// Sampled atlas texture.
    TextureId
);

/// Binding point of a GPU buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Sampling filter for atlas textures.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// Texture creation options.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureOptions {
    pub filter: TextureFilter,
    /// Multiply color channels by alpha before upload.
    pub premultiply_alpha: bool,
    pub label: Option<String>,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Linear,
            premultiply_alpha: false,
            label: None,
        }
    }
}

/// GPU operations the render controller needs.
///
/// The trait mirrors a stateful immediate-mode API: binding calls (`use_program`,
/// `bind_vertex_array`, `bind_texture`) change state that persists until the
/// next binding call, across frames. Implementations that record commands
/// (wgpu) must preserve that contract.
pub trait RenderBackend {
    /// Largest texture side the device accepts.
    fn max_texture_size(&self) -> u32;

    /// Drawable size in physical pixels.
    fn surface_size(&self) -> Size;

    fn set_surface_size(&mut self, size: Size);

    /// Compiles the material's program; diagnostics surface as `ShaderCompile`.
    fn compile_program(&mut self, material: &Material) -> Result<ProgramId>;

    fn use_program(&mut self, program: ProgramId);

    fn create_buffer(&mut self, kind: BufferKind, usage: BufferUsage, bytes: &[u8]) -> Result<GpuBufferId>;

    /// Writes `bytes` at byte `offset`. The buffer never changes size.
    fn write_buffer(&mut self, buffer: GpuBufferId, offset: u64, bytes: &[u8]);

    fn delete_buffer(&mut self, buffer: GpuBufferId);

    fn create_vertex_array(
        &mut self,
        program: ProgramId,
        vertex: GpuBufferId,
        index: GpuBufferId,
        index_kind: ElementKind,
    ) -> Result<VertexArrayId>;

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);

    fn delete_vertex_array(&mut self, vao: VertexArrayId);

    /// Writes the per-scene uniform block owned by `vao`.
    fn write_uniforms(&mut self, vao: VertexArrayId, uniforms: &SceneUniforms);

    fn create_texture(&mut self, image: &RgbaImage, options: &TextureOptions) -> Result<TextureId>;

    fn bind_texture(&mut self, texture: TextureId);

    fn delete_texture(&mut self, texture: TextureId);

    /// Clears the whole surface.
    fn clear(&mut self, color: ColorRgba);

    fn set_viewport(&mut self, rect: Rect);

    fn set_scissor(&mut self, rect: PixelRect);

    /// Draws `count` indices of the bound vertex array.
    fn draw_indexed(&mut self, count: u32);
}
