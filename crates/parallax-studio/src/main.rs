use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use winit::event::WindowEvent;
use winit::window::WindowId;

use parallax_engine::coords::{Rect, Size, Vec2};
use parallax_engine::core::{App, AppControl, FrameCtx};
use parallax_engine::device::GpuInit;
use parallax_engine::logging::{init_logging, LoggingConfig};
use parallax_engine::render::WgpuBackend;
use parallax_engine::window::{Runtime, RuntimeConfig};
use parallax_engine::{FileLoader, ManagerConfig, ParallaxManager, SceneDescriptor, SceneHandle};

/// Shows every scene of a JSON scene list in a grid; the pointer drives the
/// scene under it. Layer urls resolve relative to the list file.
struct Studio {
    descriptors: Vec<SceneDescriptor>,
    root: PathBuf,
    manager: Option<ParallaxManager<WgpuBackend, FileLoader>>,
    scenes: Vec<SceneHandle>,
    /// Physical pixels; converted with the window's pixel ratio per frame.
    cursor: Option<(f64, f64)>,
    resolution: Option<(f32, f32, f32)>,
}

impl Studio {
    fn new(descriptors: Vec<SceneDescriptor>, root: PathBuf) -> Self {
        Self {
            descriptors,
            root,
            manager: None,
            scenes: Vec::new(),
            cursor: None,
            resolution: None,
        }
    }

    fn start(&mut self, ctx: &FrameCtx<'_, '_>) {
        let physical = ctx.gpu.size();
        let backend = WgpuBackend::new(
            ctx.gpu.device().clone(),
            ctx.gpu.queue().clone(),
            ctx.gpu.surface_format(),
            Size::new(physical.width, physical.height),
        );
        let manager = ParallaxManager::new(backend, FileLoader::new(&self.root), ManagerConfig::default());

        for descriptor in &self.descriptors {
            let id = descriptor.id.clone();
            let mut report = |p: parallax_engine::LoadProgress| {
                log::info!("scene '{id}': {:.0}% loaded", p.percent());
            };
            match pollster::block_on(manager.init_scene(descriptor, &mut report)) {
                Ok(scene) => self.scenes.push(scene),
                Err(err) => log::error!("scene '{}' failed to load: {err}", descriptor.id),
            }
        }
        self.manager = Some(manager);
    }

    /// Lays scenes out in a near-square grid and routes the pointer.
    fn layout(&self, width: f32, height: f32, pointer: Option<Vec2>) {
        let count = self.scenes.len().max(1);
        let cols = (count as f32).sqrt().ceil() as usize;
        let rows = count.div_ceil(cols);
        let (cell_w, cell_h) = (width / cols as f32, height / rows as f32);

        for (i, handle) in self.scenes.iter().enumerate() {
            let rect = Rect::new((i % cols) as f32 * cell_w, (i / cols) as f32 * cell_h, cell_w, cell_h);
            let Ok(mut scene) = handle.try_borrow_mut() else { continue };

            if let Err(err) = scene.set_rect(rect) {
                log::warn!("scene '{}': {err}", scene.id());
            }
            match pointer {
                Some(p) if rect.contains(p) => {
                    let n = rect.normalize_point(p);
                    scene.set_pointer(n.x, n.y);
                }
                _ => scene.set_pointer(0.5, 0.5),
            }
        }
    }
}

impl App for Studio {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::CursorMoved { position, .. } => self.cursor = Some((position.x, position.y)),
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            _ => {}
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.manager.is_none() {
            self.start(ctx);
        }

        let (width, height) = ctx.window.logical_size();
        let ratio = ctx.window.pixel_ratio();
        let pointer = self
            .cursor
            .map(|(x, y)| Vec2::new(x as f32 / ratio, y as f32 / ratio));
        self.layout(width, height, pointer);

        let Some(manager) = &self.manager else {
            return AppControl::Exit;
        };

        if self.resolution != Some((width, height, ratio)) {
            manager.update_resolution(width, height, Some(ratio));
            self.resolution = Some((width, height, ratio));
        }

        if let Err(err) = manager.render() {
            log::error!("render failed: {err}");
            return AppControl::Exit;
        }

        ctx.render(|encoder, view| manager.backend_mut().encode(encoder, view))
    }
}

fn load_descriptors(path: &Path) -> Result<Vec<SceneDescriptor>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let descriptors = SceneDescriptor::list_from_json(&json)?;
    anyhow::ensure!(!descriptors.is_empty(), "{} lists no scenes", path.display());
    Ok(descriptors)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let path = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "scenes.json".to_string()));
    let descriptors = load_descriptors(&path)?;
    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    log::info!("{} scenes from {}", descriptors.len(), path.display());

    Runtime::run(
        RuntimeConfig {
            title: "parallax studio".to_string(),
            ..Default::default()
        },
        GpuInit::default(),
        Studio::new(descriptors, root),
    )
}
