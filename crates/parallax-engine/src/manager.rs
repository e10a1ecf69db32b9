//! Scene orchestration: load, merge, upload, build and draw.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::rc::Rc;

use crate::coords::ColorRgba;
use crate::error::{ParallaxError, Result};
use crate::loader::{AssetLoader, LoadProgress, LoadedImage};
use crate::packing::PackerStrategy;
use crate::render::{Material, RenderBackend, RenderController, TextureOptions};
use crate::resources::{CacheTable, CanvasOptions, ResourceController, SlotState};
use crate::scene::{LayerSettings, ParallaxLayer, ParallaxScene, SceneDescriptor};
use crate::time::FrameClock;

/// Scenes are shared with the host, which moves their pointer and rect.
pub type SceneHandle = Rc<RefCell<ParallaxScene>>;

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub packer: PackerStrategy,
    /// Upper bound for binary-tree bin growth.
    pub max_bin_size: u32,
    /// Atlas size cap below the device limit, if any.
    pub max_texture_size: Option<u32>,
    pub clear_color: ColorRgba,
    pub canvas: CanvasOptions,
    pub texture: TextureOptions,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            packer: PackerStrategy::BinaryTree,
            max_bin_size: 16384,
            max_texture_size: None,
            clear_color: ColorRgba::new(0.0, 0.0, 0.0, 0.0),
            canvas: CanvasOptions::default(),
            texture: TextureOptions::default(),
        }
    }
}

/// Owns every scene and the controllers they share.
///
/// Methods take `&self` so several `init_scene` futures for different ids can
/// be in flight together; a second request for an id still loading fails with
/// [`ParallaxError::InFlight`]. No borrow is held across an await.
pub struct ParallaxManager<B: RenderBackend, L: AssetLoader> {
    config: ManagerConfig,
    loader: L,
    material: Rc<Material>,
    backend: RefCell<B>,
    resources: RefCell<ResourceController>,
    renderer: RefCell<RenderController>,
    scenes: RefCell<CacheTable<SceneHandle>>,
    clock: RefCell<FrameClock>,
}

impl<B: RenderBackend, L: AssetLoader> ParallaxManager<B, L> {
    pub fn new(backend: B, loader: L, config: ManagerConfig) -> Self {
        let device_max = backend.max_texture_size();
        let max_texture_size = config
            .max_texture_size
            .map_or(device_max, |cap| cap.min(device_max));
        let resources = ResourceController::new(config.packer, max_texture_size, config.max_bin_size);

        Self {
            loader,
            material: Rc::new(Material::parallax()),
            backend: RefCell::new(backend),
            resources: RefCell::new(resources),
            renderer: RefCell::new(RenderController::new()),
            scenes: RefCell::new(CacheTable::new()),
            clock: RefCell::new(FrameClock::new()),
            config,
        }
    }

    /// Builds the scene for `descriptor`, or reactivates the one already built
    /// under its id without loading anything.
    pub async fn init_scene(
        &self,
        descriptor: &SceneDescriptor,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<SceneHandle> {
        let settings = descriptor.layer_settings()?;
        let id = descriptor.id.as_str();

        let reservation = {
            let mut scenes = self.scenes.borrow_mut();
            if let Some(scene) = scenes.get(id) {
                scene.borrow_mut().set_active(true);
                return Ok(Rc::clone(scene));
            }
            scenes.reserve(id)?
        };

        let images = self.loader.load_images(&descriptor.layers, progress).await?;
        let scene = self.build_scene(descriptor, settings, &images)?;
        log::debug!("scene '{id}' built with {} layers", scene.layers().len());

        let handle = Rc::new(RefCell::new(scene));
        self.scenes.borrow_mut().complete(reservation, Rc::clone(&handle));
        Ok(handle)
    }

    fn build_scene(
        &self,
        descriptor: &SceneDescriptor,
        settings: Vec<LayerSettings>,
        images: &[LoadedImage],
    ) -> Result<ParallaxScene> {
        let id = descriptor.id.as_str();
        let mut resources = self.resources.borrow_mut();
        let merged = resources.merge(images, &self.config.canvas)?;

        let layers = descriptor
            .layers
            .iter()
            .zip(settings)
            .enumerate()
            .map(|(index, (layer, settings))| {
                let Some(atlas) = merged.data.entry(&layer.url) else {
                    return Err(ParallaxError::config(format!(
                        "texture packing error: no atlas entry for '{}'",
                        layer.url
                    )));
                };
                let source = atlas.source_size;
                Ok(ParallaxLayer {
                    id: format!("{}_{index}", layer.url),
                    settings,
                    atlas: atlas.clone(),
                    ratio: source.w as f32 / source.h.max(1) as f32,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut backend = self.backend.borrow_mut();
        let texture = resources.create_texture(&mut *backend, &merged.hash, &merged.image, &self.config.texture)?;

        let scene = match ParallaxScene::new(id, layers, texture, merged.hash.clone(), Rc::clone(&self.material)) {
            Ok(scene) => scene,
            Err(err) => {
                if let Some(texture) = resources.delete_texture(&merged.hash) {
                    self.renderer.borrow_mut().delete_texture(&mut *backend, texture);
                }
                return Err(err);
            }
        };

        resources.add(&format!("Merged:{id}"), Rc::clone(&merged.image));
        for image in images {
            resources.add(&image.url, Rc::clone(&image.bitmap));
        }
        Ok(scene)
    }

    /// Must be called whenever the canvas changes size (logical pixels).
    pub fn update_resolution(&self, width: f32, height: f32, pixel_ratio: Option<f32>) {
        let mut backend = self.backend.borrow_mut();
        self.renderer
            .borrow_mut()
            .update_resolution(&mut *backend, width, height, pixel_ratio.unwrap_or(1.0));
    }

    /// Clears the surface and draws every active scene in creation order.
    ///
    /// Returns the number of scenes drawn.
    pub fn render(&self) -> Result<usize> {
        let elapsed = self.clock.borrow_mut().tick().elapsed;

        let mut handles: Vec<SceneHandle> = self.scenes.borrow().ready().map(|(_, h)| Rc::clone(h)).collect();
        handles.sort_by_key(|h| h.try_borrow().map_or(u64::MAX, |s| s.instance_id()));

        let mut backend = self.backend.borrow_mut();
        let mut renderer = self.renderer.borrow_mut();
        renderer.set_time(elapsed);
        renderer.begin_frame(&mut *backend, self.config.clear_color);

        let mut drawn = 0;
        for handle in handles {
            let Ok(mut scene) = handle.try_borrow_mut() else {
                log::warn!("scene is borrowed by the host during render; skipped");
                continue;
            };
            if renderer.render(&mut *backend, &mut scene)? {
                drawn += 1;
            }
        }
        Ok(drawn)
    }

    /// Frees the scene's GPU buffers, its texture once unused, and its bitmaps.
    ///
    /// Disposing an id that is not built fails; disposal is one-time.
    pub fn dispose(&self, id: &str) -> Result<()> {
        let Some(handle) = self.scenes.borrow_mut().remove(id) else {
            return Err(ParallaxError::config(format!("scene '{id}' is not registered")));
        };
        let Ok(scene) = handle.try_borrow() else {
            self.scenes.borrow_mut().insert(id, Rc::clone(&handle));
            return Err(ParallaxError::config(format!("scene '{id}' is borrowed and cannot be disposed")));
        };

        let mut backend = self.backend.borrow_mut();
        let mut renderer = self.renderer.borrow_mut();
        let mut resources = self.resources.borrow_mut();

        renderer.dispose(&mut *backend, &scene);
        if let Some(texture) = resources.delete_texture(scene.texture_hash()) {
            renderer.delete_texture(&mut *backend, texture);
        }

        let mut urls = HashSet::new();
        for layer in scene.layers() {
            if urls.insert(layer.atlas.id.as_str()) {
                resources.delete_image(&layer.atlas.id);
            }
        }
        resources.delete_image(&format!("Merged:{id}"));

        log::warn!("scene '{id}' disposed");
        Ok(())
    }

    pub fn scene(&self, id: &str) -> Option<SceneHandle> {
        self.scenes.borrow().get(id).cloned()
    }

    pub fn scene_state(&self, id: &str) -> Option<SlotState> {
        self.scenes.borrow_mut().state(id)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.borrow().len()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn backend(&self) -> Ref<'_, B> {
        self.backend.borrow()
    }

    /// Mutable backend access, e.g. to encode recorded draws.
    pub fn backend_mut(&self) -> RefMut<'_, B> {
        self.backend.borrow_mut()
    }

    pub fn resources(&self) -> Ref<'_, ResourceController> {
        self.resources.borrow()
    }

    pub fn renderer(&self) -> Ref<'_, RenderController> {
        self.renderer.borrow()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::coords::Rect;
    use crate::loader::ProgressMode;
    use crate::render::{BackendCall, HeadlessBackend};
    use crate::scene::LayerDescriptor;

    /// Serves solid bitmaps sized from the url (`name-WxH.png`), optionally
    /// suspending once before completing.
    #[derive(Default)]
    struct StubLoader {
        calls: Cell<usize>,
        suspend: bool,
    }

    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    fn size_from_url(url: &str) -> (u32, u32) {
        let dims = url.rsplit('-').next().unwrap().trim_end_matches(".png");
        let (w, h) = dims.split_once('x').unwrap();
        (w.parse().unwrap(), h.parse().unwrap())
    }

    impl AssetLoader for StubLoader {
        async fn load_images(
            &self,
            layers: &[LayerDescriptor],
            progress: &mut dyn FnMut(LoadProgress),
        ) -> Result<Vec<LoadedImage>> {
            self.calls.set(self.calls.get() + 1);
            if self.suspend {
                YieldOnce(false).await;
            }
            let mut out: Vec<LoadedImage> = Vec::new();
            for layer in layers {
                if layer.url.starts_with("missing") {
                    return Err(ParallaxError::Transfer {
                        url: layer.url.clone(),
                        message: "not found".into(),
                    });
                }
                if out.iter().any(|i| i.url == layer.url) {
                    continue;
                }
                let (w, h) = size_from_url(&layer.url);
                out.push(LoadedImage::new(layer.url.clone(), RgbaImage::from_pixel(w, h, Rgba([255; 4]))));
            }
            progress(LoadProgress {
                loaded: out.len() as u64,
                total: out.len() as u64,
                mode: ProgressMode::Items,
            });
            Ok(out)
        }
    }

    fn descriptor(id: &str, urls: &[&str]) -> SceneDescriptor {
        SceneDescriptor {
            id: id.to_string(),
            layers: urls.iter().map(|u| LayerDescriptor::new(*u)).collect(),
        }
    }

    fn manager(loader: StubLoader) -> ParallaxManager<HeadlessBackend, StubLoader> {
        let m = ParallaxManager::new(HeadlessBackend::new(4096), loader, ManagerConfig::default());
        m.update_resolution(800.0, 600.0, None);
        m
    }

    fn init(m: &ParallaxManager<HeadlessBackend, StubLoader>, d: &SceneDescriptor) -> Result<SceneHandle> {
        pollster::block_on(m.init_scene(d, &mut |_| {}))
    }

    #[test]
    fn init_is_idempotent_per_id() {
        let m = manager(StubLoader::default());
        let d = descriptor("forest", &["sky-64x32.png", "trees-32x32.png"]);

        let first = init(&m, &d).unwrap();
        first.borrow_mut().set_active(false);
        let second = init(&m, &d).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(second.borrow().is_active());
        assert_eq!(m.loader.calls.get(), 1);
        assert_eq!(m.resources().packs(), 1);
        assert_eq!(m.backend().count(|c| matches!(c, BackendCall::CreateTexture { .. })), 1);
    }

    #[test]
    fn repeated_urls_get_distinct_layer_ids() {
        let m = manager(StubLoader::default());
        let scene = init(&m, &descriptor("s", &["a-10x10.png", "a-10x10.png"])).unwrap();
        let ids: Vec<String> = scene.borrow().layers().iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, ["a-10x10.png_0", "a-10x10.png_1"]);
        assert!(m.resources().image("Merged:s").is_some());
        assert!(m.resources().image("a-10x10.png").is_some());

        m.dispose("s").unwrap();
        assert_eq!(m.resources().image_count(), 0);
    }

    #[test]
    fn render_draws_active_scenes_with_shared_program_and_texture() {
        let m = manager(StubLoader::default());
        let a = init(&m, &descriptor("a", &["x-16x16.png", "y-8x8.png"])).unwrap();
        let b = init(&m, &descriptor("b", &["y-8x8.png", "x-16x16.png"])).unwrap();
        a.borrow_mut().set_rect(Rect::new(0.0, 0.0, 400.0, 300.0)).unwrap();
        b.borrow_mut().set_rect(Rect::new(400.0, 0.0, 400.0, 300.0)).unwrap();

        assert_eq!(m.render().unwrap(), 2);
        assert_eq!(m.render().unwrap(), 2);

        let backend = m.backend();
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CompileProgram(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::UseProgram(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::CreateTexture { .. })), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::BindTexture(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::DrawIndexed(12))), 4);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::Clear(_))), 2);
    }

    #[test]
    fn inactive_scenes_are_skipped_not_disposed() {
        let m = manager(StubLoader::default());
        let a = init(&m, &descriptor("a", &["x-16x16.png"])).unwrap();
        a.borrow_mut().set_active(false);

        assert_eq!(m.render().unwrap(), 0);
        assert_eq!(m.backend().count(|c| matches!(c, BackendCall::DrawIndexed(_))), 0);
        assert_eq!(m.scene_count(), 1);
    }

    #[test]
    fn dispose_frees_everything_and_is_not_repeatable() {
        let m = manager(StubLoader::default());
        init(&m, &descriptor("a", &["x-16x16.png"])).unwrap();
        m.render().unwrap();

        m.dispose("a").unwrap();
        assert!(m.scene("a").is_none());
        assert!(m.dispose("a").is_err());

        {
            let backend = m.backend();
            assert_eq!(backend.live_buffers(), 0);
            assert_eq!(backend.live_vertex_arrays(), 0);
            assert_eq!(backend.live_textures(), 0);
            assert_eq!(m.resources().image_count(), 0);
        }

        m.backend_mut().clear_calls();
        m.render().unwrap();
        assert_eq!(m.backend().count(|c| matches!(c, BackendCall::DrawIndexed(_))), 0);
    }

    #[test]
    fn shared_texture_survives_until_last_scene_is_disposed() {
        let m = manager(StubLoader::default());
        init(&m, &descriptor("a", &["x-16x16.png"])).unwrap();
        init(&m, &descriptor("b", &["x-16x16.png"])).unwrap();

        m.dispose("a").unwrap();
        assert_eq!(m.backend().live_textures(), 1);
        assert!(m.resources().image("x-16x16.png").is_some());
        assert!(m.resources().image("Merged:b").is_some());

        m.dispose("b").unwrap();
        assert_eq!(m.backend().live_textures(), 0);
        assert!(m.resources().image("x-16x16.png").is_none());
        assert_eq!(m.resources().image_count(), 0);
    }

    #[test]
    fn loader_errors_leave_no_cache_slot() {
        let m = manager(StubLoader::default());
        let err = init(&m, &descriptor("bad", &["missing-1x1.png"])).unwrap_err();
        assert!(matches!(err, ParallaxError::Transfer { .. }));
        assert_eq!(m.scene_state("bad"), None);
    }

    #[test]
    fn concurrent_init_of_one_id_is_rejected_and_cancellation_frees_the_slot() {
        let m = manager(StubLoader {
            suspend: true,
            ..Default::default()
        });
        let d = descriptor("slow", &["x-4x4.png"]);
        let mut cx = Context::from_waker(Waker::noop());

        {
            let mut noop = |_: LoadProgress| {};
            let mut first = pin!(m.init_scene(&d, &mut noop));
            assert!(first.as_mut().poll(&mut cx).is_pending());
            assert_eq!(m.scene_state("slow"), Some(SlotState::Pending));

            let second = init(&m, &d);
            assert!(matches!(second, Err(ParallaxError::InFlight(_))));
        }

        assert_eq!(m.scene_state("slow"), None);
        assert!(init(&m, &d).is_ok());
        assert_eq!(m.scene_state("slow"), Some(SlotState::Ready));
    }

    #[test]
    fn invalid_descriptors_fail_before_loading() {
        let m = manager(StubLoader::default());
        let mut d = descriptor("f", &["x-4x4.png"]);
        d.layers[0].fit = Some(crate::scene::FitDescriptor { w: Some(1.0), h: Some(1.0) });

        assert!(matches!(init(&m, &d), Err(ParallaxError::Configuration(_))));
        assert_eq!(m.loader.calls.get(), 0);
    }
}
