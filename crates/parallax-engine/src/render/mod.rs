//! Scene rendering.
//!
//! [`RenderController`] owns GPU binding state and issues one viewport- and
//! scissor-scoped indexed draw per scene. It talks to the GPU only through
//! [`RenderBackend`]:
//! - [`WgpuBackend`] records draws and replays them into a render pass
//! - [`HeadlessBackend`] records calls without a device
//!
//! Convention: scene rects are logical pixels (top-left origin, +Y down);
//! viewports and scissors are physical pixels.

mod backend;
mod camera;
mod controller;
mod headless;
mod material;
mod shader;
mod uniforms;
mod upload;
mod wgpu_backend;

pub use backend::{
    BufferKind, GpuBufferId, ProgramId, RenderBackend, TextureFilter, TextureId, TextureOptions,
    VertexArrayId,
};
pub use camera::Camera2D;
pub use controller::RenderController;
pub use headless::{BackendCall, HeadlessBackend};
pub use material::{Material, VertexInput, PARALLAX_WGSL};
pub use shader::validate_wgsl;
pub use uniforms::{GlobalUniforms, SceneUniforms};
pub use upload::BufferRegistry;
pub use wgpu_backend::WgpuBackend;
