use std::collections::HashMap;
use std::rc::Rc;

use crate::buffers::{BufferSource, ElementKind, InterleavedBufferAttribute};
use crate::coords::{ColorRgba, Rect, Size, Vec2};
use crate::error::{ParallaxError, Result};
use crate::scene::ParallaxScene;

use super::backend::{BufferKind, ProgramId, RenderBackend, TextureId, VertexArrayId};
use super::upload::BufferRegistry;
use super::{GlobalUniforms, Material, SceneUniforms};

#[derive(Debug)]
struct SceneBinding {
    vao: VertexArrayId,
    uniforms: Option<SceneUniforms>,
}

/// Owns all GPU binding state and draws scenes one at a time.
///
/// Programs are compiled once per material; vertex arrays once per scene.
/// The active program and texture carry over between scenes and frames, so
/// redundant binds are skipped.
#[derive(Debug)]
pub struct RenderController {
    programs: HashMap<u64, ProgramId>,
    active_program: Option<ProgramId>,
    bound_texture: Option<TextureId>,
    bindings: HashMap<u64, SceneBinding>,
    buffers: BufferRegistry,
    globals: GlobalUniforms,
    pixel_ratio: f32,
    frame: u64,
}

impl Default for RenderController {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
            active_program: None,
            bound_texture: None,
            bindings: HashMap::new(),
            buffers: BufferRegistry::new(),
            globals: GlobalUniforms::default(),
            pixel_ratio: 1.0,
            frame: 0,
        }
    }
}

impl RenderController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resizes the drawing surface. `width`/`height` are logical pixels.
    pub fn update_resolution<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: f32,
        height: f32,
        pixel_ratio: f32,
    ) {
        let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        self.pixel_ratio = ratio;
        self.globals.resolution = Vec2::new(width.max(0.0), height.max(0.0));

        let physical = Size::new(
            (width * ratio).round().max(1.0) as u32,
            (height * ratio).round().max(1.0) as u32,
        );
        backend.set_surface_size(physical);
        log::debug!("resolution {width}x{height} @{ratio} -> {}x{}", physical.w, physical.h);
    }

    #[inline]
    pub fn set_time(&mut self, seconds: f32) {
        self.globals.time = seconds;
    }

    #[inline]
    pub fn globals(&self) -> GlobalUniforms {
        self.globals
    }

    #[inline]
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn program(&self, material: &Material) -> Option<ProgramId> {
        self.programs.get(&material.id()).copied()
    }

    /// Starts a frame by clearing the whole surface.
    pub fn begin_frame<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, clear: ColorRgba) {
        self.frame += 1;
        backend.clear(clear);
    }

    /// Draws one scene. Returns `false` when the scene was skipped
    /// (inactive or fully outside the surface).
    pub fn render<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &mut ParallaxScene,
    ) -> Result<bool> {
        if !scene.is_active() {
            return Ok(false);
        }

        let viewport = self.physical(scene.rect());
        let Some(scissor) = viewport.to_scissor(backend.surface_size()) else {
            log::trace!("scene '{}' is outside the surface", scene.id());
            return Ok(false);
        };

        let program = self.ensure_program(backend, scene.material())?;
        if self.active_program != Some(program) {
            backend.use_program(program);
            self.active_program = Some(program);
        }

        let vertex = Rc::clone(scene.vertex_buffer());
        let vertex_id = self
            .buffers
            .sync(backend, BufferKind::Vertex, &mut *vertex.borrow_mut())?;

        let scene_id = scene.id().to_string();
        let Some(index) = scene.geometry_mut().index_mut() else {
            return Err(ParallaxError::config(format!("scene '{scene_id}' has no index buffer")));
        };
        let index_count = index.count() as u32;
        let index_id = self.buffers.sync(backend, BufferKind::Index, index)?;

        let vao = match self.bindings.get(&scene.instance_id()) {
            Some(binding) => binding.vao,
            None => {
                check_layout(scene.material(), scene.views(), vertex.borrow().stride())?;
                let vao = backend.create_vertex_array(program, vertex_id, index_id, ElementKind::U16)?;
                self.bindings
                    .insert(scene.instance_id(), SceneBinding { vao, uniforms: None });
                vao
            }
        };
        backend.bind_vertex_array(Some(vao));

        let uniforms = self.scene_uniforms(scene, viewport);
        if let Some(binding) = self.bindings.get_mut(&scene.instance_id()) {
            if binding.uniforms != Some(uniforms) {
                backend.write_uniforms(vao, &uniforms);
                binding.uniforms = Some(uniforms);
            }
        }

        if self.bound_texture != Some(scene.texture()) {
            backend.bind_texture(scene.texture());
            self.bound_texture = Some(scene.texture());
        }

        backend.set_viewport(viewport);
        backend.set_scissor(scissor);
        backend.draw_indexed(index_count);
        backend.bind_vertex_array(None);
        Ok(true)
    }

    /// Releases the scene's vertex array and every GPU buffer it owns.
    ///
    /// The atlas texture is shared between scenes; release it through
    /// [`RenderController::delete_texture`] once no scene uses it.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, scene: &ParallaxScene) {
        if let Some(binding) = self.bindings.remove(&scene.instance_id()) {
            backend.delete_vertex_array(binding.vao);
        }
        for attribute in scene.geometry().attributes() {
            self.buffers.delete(backend, attribute.key());
        }
        let vertex_key = scene.vertex_buffer().borrow().key();
        self.buffers.delete(backend, vertex_key);
        if let Some(index) = scene.geometry().index() {
            self.buffers.delete(backend, index.key());
        }
    }

    pub fn delete_texture<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, texture: TextureId) {
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
        backend.delete_texture(texture);
    }

    fn ensure_program<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        material: &Material,
    ) -> Result<ProgramId> {
        if let Some(&program) = self.programs.get(&material.id()) {
            return Ok(program);
        }
        let program = backend.compile_program(material)?;
        log::debug!("compiled program '{}' ({program:?})", material.label);
        self.programs.insert(material.id(), program);
        Ok(program)
    }

    fn physical(&self, rect: Rect) -> Rect {
        let r = self.pixel_ratio;
        Rect::new(rect.x * r, rect.y * r, rect.w * r, rect.h * r)
    }

    fn scene_uniforms(&self, scene: &ParallaxScene, viewport: Rect) -> SceneUniforms {
        let world = scene.camera().size();
        SceneUniforms {
            projection: scene.camera().projection(),
            world_size: [world.w as f32, world.h as f32],
            resolution: [viewport.w, viewport.h],
            pointer: scene.pointer().to_array(),
            global_resolution: self.globals.resolution.to_array(),
            time: self.globals.time,
            _pad: [0.0; 3],
        }
    }
}

/// Checks that interleaved views line up with the material's vertex inputs.
fn check_layout(material: &Material, views: &[InterleavedBufferAttribute], stride: usize) -> Result<()> {
    if stride != material.stride() as usize {
        return Err(ParallaxError::config(format!(
            "vertex stride {stride} does not match material '{}' ({})",
            material.label,
            material.stride()
        )));
    }
    for (input, offset) in material.layout() {
        let Some(view) = views.iter().find(|v| v.name == input.name) else {
            return Err(ParallaxError::config(format!("missing vertex attribute '{}'", input.name)));
        };
        if view.item_size() != input.components as usize || view.offset() != offset as usize {
            return Err(ParallaxError::config(format!(
                "attribute '{}' is {}@{}, material expects {}@{offset}",
                input.name,
                view.item_size(),
                view.offset(),
                input.components
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BackendCall, HeadlessBackend};
    use crate::scene::test_support::scene;

    fn setup() -> (HeadlessBackend, RenderController) {
        let mut backend = HeadlessBackend::new(4096);
        let mut controller = RenderController::new();
        controller.update_resolution(&mut backend, 800.0, 600.0, 1.0);
        (backend, controller)
    }

    #[test]
    fn first_render_builds_everything_once() {
        let (mut backend, mut controller) = setup();
        let mut s = scene("a", 2);

        assert!(controller.render(&mut backend, &mut s).unwrap());
        assert!(controller.render(&mut backend, &mut s).unwrap());

        assert_eq!(backend.count(|c| matches!(c, BackendCall::CompileProgram(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::UseProgram(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateVertexArray(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateBuffer { .. })), 2);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::WriteBuffer { .. })), 0);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::WriteUniforms(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::BindTexture(_))), 1);
        assert_eq!(backend.count(|c| *c == BackendCall::DrawIndexed(12)), 2);
    }

    #[test]
    fn version_bump_uploads_once() {
        let (mut backend, mut controller) = setup();
        let mut s = scene("a", 1);
        controller.render(&mut backend, &mut s).unwrap();

        s.vertex_buffer().borrow_mut().mark_dirty();
        controller.render(&mut backend, &mut s).unwrap();
        controller.render(&mut backend, &mut s).unwrap();

        assert_eq!(backend.count(|c| matches!(c, BackendCall::WriteBuffer { .. })), 1);
        assert_eq!(controller.buffers().uploads(), 1);
    }

    #[test]
    fn viewport_and_scissor_follow_the_rect() {
        let (mut backend, mut controller) = setup();
        controller.update_resolution(&mut backend, 400.0, 300.0, 2.0);
        let mut s = scene("a", 1);
        s.set_rect(Rect::new(10.0, 20.0, 100.0, 50.0)).unwrap();

        controller.render(&mut backend, &mut s).unwrap();

        assert!(backend.calls().contains(&BackendCall::SetViewport(Rect::new(20.0, 40.0, 200.0, 100.0))));
        assert!(backend
            .calls()
            .contains(&BackendCall::SetScissor(crate::coords::PixelRect::new(20, 40, 200, 100))));

        let vao = backend
            .calls()
            .iter()
            .find_map(|c| match c {
                BackendCall::CreateVertexArray(vao) => Some(*vao),
                _ => None,
            })
            .unwrap();
        let uniforms = backend.uniforms(vao).unwrap();
        assert_eq!(uniforms.world_size, [100.0, 50.0]);
        assert_eq!(uniforms.resolution, [200.0, 100.0]);
    }

    #[test]
    fn pointer_changes_rewrite_uniforms() {
        let (mut backend, mut controller) = setup();
        let mut s = scene("a", 1);
        controller.render(&mut backend, &mut s).unwrap();
        s.set_pointer(0.25, 0.75);
        controller.render(&mut backend, &mut s).unwrap();

        let writes: Vec<VertexArrayId> = backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::WriteUniforms(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(writes.len(), 2);
        let u = backend.uniforms(writes[1]).unwrap();
        assert_eq!(u.pointer, [0.25, 0.75]);
        assert_eq!(u.world_size, [100.0, 100.0]);
    }

    #[test]
    fn skips_inactive_and_clipped_scenes() {
        let (mut backend, mut controller) = setup();
        let mut hidden = scene("hidden", 1);
        hidden.set_active(false);
        let mut outside = scene("outside", 1);
        outside.set_rect(Rect::new(900.0, 0.0, 100.0, 100.0)).unwrap();

        assert!(!controller.render(&mut backend, &mut hidden).unwrap());
        assert!(!controller.render(&mut backend, &mut outside).unwrap());
        assert_eq!(backend.count(|c| matches!(c, BackendCall::DrawIndexed(_))), 0);
    }

    #[test]
    fn dispose_releases_buffers_and_vertex_array() {
        let (mut backend, mut controller) = setup();
        let mut s = scene("a", 3);
        controller.render(&mut backend, &mut s).unwrap();
        assert_eq!(backend.live_buffers(), 2);

        controller.dispose(&mut backend, &s);
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.live_vertex_arrays(), 0);
        assert!(controller.buffers().is_empty());
    }

    #[test]
    fn layout_mismatch_is_a_configuration_error() {
        let (mut backend, mut controller) = setup();
        let mut s = scene("a", 1);
        let mut material = Material::parallax();
        material.inputs.swap(0, 1);
        material.inputs[0].components = 4;
        s.set_material(Rc::new(material));

        let err = controller.render(&mut backend, &mut s).unwrap_err();
        assert!(matches!(err, ParallaxError::Configuration(_)));
    }
}
