use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffers::{BufferSource, BufferUsage, InterleavedBufferAttribute, SharedInterleavedBuffer};
use crate::coords::{Rect, Size, Vec2};
use crate::error::{ParallaxError, Result};
use crate::geometry::{merge_geometries, interleave_attributes, parallax_geometry, BufferGeometry};
use crate::render::{Camera2D, Material, TextureId};

use super::ParallaxLayer;

/// Rect a scene is built against before the host lays it out.
pub const INITIAL_RECT: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

/// A built scene: one merged, interleaved geometry drawn with one atlas texture.
///
/// `pointer`, `rect` and `active` are the host-facing mutation points; the rest
/// is fixed at construction.
#[derive(Debug)]
pub struct ParallaxScene {
    instance_id: u64,
    id: String,
    layers: Vec<ParallaxLayer>,
    geometry: BufferGeometry,
    vertex_buffer: SharedInterleavedBuffer,
    views: Vec<InterleavedBufferAttribute>,
    texture: TextureId,
    texture_hash: String,
    material: Rc<Material>,
    camera: Camera2D,
    pointer: Vec2,
    rect: Rect,
    active: bool,
}

impl ParallaxScene {
    pub fn new(
        id: impl Into<String>,
        layers: Vec<ParallaxLayer>,
        texture: TextureId,
        texture_hash: impl Into<String>,
        material: Rc<Material>,
    ) -> Result<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        let quads: Vec<BufferGeometry> = layers.iter().map(parallax_geometry).collect();
        let geometry = merge_geometries(&quads, true)?;
        let views = interleave_attributes(geometry.attributes())?;

        let Some(first) = views.first() else {
            return Err(ParallaxError::config("scene geometry has no attributes"));
        };
        let vertex_buffer = Rc::clone(first.data());
        if geometry.attributes().iter().any(|a| a.usage() == BufferUsage::Dynamic) {
            vertex_buffer.borrow_mut().set_usage(BufferUsage::Dynamic);
        }

        let mut scene = Self {
            instance_id: NEXT.fetch_add(1, Ordering::Relaxed),
            id: id.into(),
            layers,
            geometry,
            vertex_buffer,
            views,
            texture,
            texture_hash: texture_hash.into(),
            material,
            camera: Camera2D::new(Size::new(INITIAL_RECT.w as u32, INITIAL_RECT.h as u32)),
            pointer: Vec2::center(),
            rect: INITIAL_RECT,
            active: true,
        };
        scene.resize(INITIAL_RECT.w, INITIAL_RECT.h)?;
        Ok(scene)
    }

    /// Unique per built scene, also across scenes reusing an id.
    #[inline]
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn layers(&self) -> &[ParallaxLayer] {
        &self.layers
    }

    #[inline]
    pub fn geometry(&self) -> &BufferGeometry {
        &self.geometry
    }

    #[inline]
    pub fn geometry_mut(&mut self) -> &mut BufferGeometry {
        &mut self.geometry
    }

    #[inline]
    pub fn vertex_buffer(&self) -> &SharedInterleavedBuffer {
        &self.vertex_buffer
    }

    #[inline]
    pub fn views(&self) -> &[InterleavedBufferAttribute] {
        &self.views
    }

    pub fn view(&self, name: &str) -> Option<&InterleavedBufferAttribute> {
        self.views.iter().find(|v| v.name == name)
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Atlas cache key the texture was created under.
    #[inline]
    pub fn texture_hash(&self) -> &str {
        &self.texture_hash
    }

    #[inline]
    pub fn material(&self) -> &Rc<Material> {
        &self.material
    }

    pub fn set_material(&mut self, material: Rc<Material>) {
        self.material = material;
    }

    #[inline]
    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    #[inline]
    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    /// Normalized pointer position; values are clamped to `[0, 1]`.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        let p = Vec2::new(x, y);
        if !p.is_finite() {
            return;
        }
        self.pointer = Vec2::new(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Places the scene on the canvas (logical pixels).
    ///
    /// A change of size updates the projection and rescales fitted layers.
    /// Empty rects are stored as-is; the scene is then skipped when drawing.
    pub fn set_rect(&mut self, rect: Rect) -> Result<()> {
        self.rect = rect;
        if rect.is_empty() {
            return Ok(());
        }

        let size = Size::new(rect.w.floor().max(1.0) as u32, rect.h.floor().max(1.0) as u32);
        if size != self.camera.size() {
            self.resize(size.w as f32, size.h as f32)?;
            self.camera.set_projection(size);
        }
        Ok(())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Inactive scenes keep their GPU resources but are not drawn.
    #[inline]
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Rewrites the `scale` of every fitted layer for a scene of `width` x `height`.
    ///
    /// Vertices are located through the layer's merged group. One update range
    /// is recorded per layer and the buffer version is bumped once. On error
    /// no layer is touched.
    pub fn resize(&mut self, width: f32, height: f32) -> Result<()> {
        let Some(scale) = self.view("scale").cloned() else {
            return Err(ParallaxError::config("scene geometry has no 'scale' attribute"));
        };
        let Some(index) = self.geometry.index() else {
            return Err(ParallaxError::config("scene geometry has no index buffer"));
        };

        let mut fitted = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let Some(size) = layer.fitted_size(width, height)? else {
                continue;
            };
            let Some(group) = self.geometry.group(&layer.id) else {
                return Err(ParallaxError::config(format!("no geometry group for layer '{}'", layer.id)));
            };
            fitted.push((group.start..group.start + group.count, size));
        }

        let stride = self.vertex_buffer.borrow().stride();
        let mut ranges = Vec::with_capacity(fitted.len());

        for (span, (w, h)) in fitted {
            let (mut lo, mut hi) = (usize::MAX, 0);
            for &i in &index.array()[span] {
                let v = i as usize;
                scale.set_xy(v, w, h);
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if lo <= hi {
                ranges.push((lo * stride + scale.offset(), (hi - lo) * stride + scale.item_size()));
            }
        }

        if ranges.is_empty() {
            return Ok(());
        }
        let mut buffer = self.vertex_buffer.borrow_mut();
        for (start, count) in ranges {
            buffer.add_update_range(start, count);
        }
        buffer.mark_dirty();
        log::trace!("scene '{}' rescaled to {width}x{height} (v{})", self.id, buffer.version());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::UpdateRange;
    use crate::scene::test_support::{layer, scene_with};
    use crate::scene::Fit;

    #[test]
    fn fit_height_example() {
        let mut s = scene_with(vec![layer(0, 400, 200, Some(Fit::Height(1.5)))]);
        s.resize(1000.0, 200.0).unwrap();

        let scale = s.view("scale").unwrap();
        for v in 0..4 {
            assert_eq!((scale.get_x(v), scale.get_y(v)), (600.0, 300.0));
        }
    }

    #[test]
    fn layers_without_fit_keep_their_size_and_do_not_stop_the_loop() {
        let mut s = scene_with(vec![
            layer(0, 300, 100, None),
            layer(1, 200, 100, Some(Fit::Width(0.5))),
        ]);
        s.resize(800.0, 600.0).unwrap();

        let scale = s.view("scale").unwrap();
        assert_eq!((scale.get_x(0), scale.get_y(0)), (300.0, 100.0));
        assert_eq!((scale.get_x(4), scale.get_y(4)), (400.0, 200.0));
        assert_eq!((scale.get_x(7), scale.get_y(7)), (400.0, 200.0));
    }

    #[test]
    fn resize_records_one_range_per_layer_and_one_version_bump() {
        let mut s = scene_with(vec![
            layer(0, 100, 100, Some(Fit::Width(1.0))),
            layer(1, 100, 100, Some(Fit::Height(1.0))),
        ]);
        s.vertex_buffer().borrow_mut().clear_update_ranges();
        let before = s.vertex_buffer().borrow().version();

        s.resize(300.0, 200.0).unwrap();

        let buf = s.vertex_buffer().borrow();
        assert_eq!(buf.version(), before + 1);
        // stride 12, scale at offset 10
        assert_eq!(
            buf.update_ranges(),
            &[UpdateRange::new(10, 38), UpdateRange::new(58, 38)]
        );
    }

    #[test]
    fn zero_size_is_a_scaling_error() {
        let mut s = scene_with(vec![layer(0, 100, 100, Some(Fit::Height(0.5)))]);
        let err = s.resize(100.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("scaling failed"));
    }

    #[test]
    fn failed_rescale_leaves_layers_and_camera_untouched() {
        let mut s = scene_with(vec![
            layer(0, 200, 100, Some(Fit::Width(1.0))),
            layer(1, 100, 100, Some(Fit::Height(0.02))),
        ]);
        s.set_rect(Rect::new(0.0, 0.0, 200.0, 300.0)).unwrap();
        s.vertex_buffer().borrow_mut().clear_update_ranges();
        let version = s.vertex_buffer().borrow().version();

        let err = s.set_rect(Rect::new(0.0, 0.0, 640.0, 40.0)).unwrap_err();
        assert!(err.to_string().contains("scaling failed"));

        assert_eq!(s.camera().size(), Size::new(200, 300));
        let scale = s.view("scale").unwrap();
        assert_eq!((scale.get_x(0), scale.get_y(0)), (200.0, 100.0));
        assert_eq!(s.vertex_buffer().borrow().version(), version);
        assert!(s.vertex_buffer().borrow().update_ranges().is_empty());

        // a later valid size still rescales
        s.set_rect(Rect::new(0.0, 0.0, 640.0, 400.0)).unwrap();
        assert_eq!(s.view("scale").unwrap().get_x(0), 640.0);
        assert_eq!(s.vertex_buffer().borrow().version(), version + 1);
    }

    #[test]
    fn set_rect_rescales_only_on_size_change() {
        let mut s = scene_with(vec![layer(0, 100, 50, Some(Fit::Width(1.0)))]);
        let v0 = s.vertex_buffer().borrow().version();

        s.set_rect(Rect::new(50.0, 10.0, 100.0, 100.0)).unwrap();
        assert_eq!(s.vertex_buffer().borrow().version(), v0);

        s.set_rect(Rect::new(0.0, 0.0, 640.0, 480.0)).unwrap();
        assert_eq!(s.vertex_buffer().borrow().version(), v0 + 1);
        assert_eq!(s.camera().size(), Size::new(640, 480));
        assert_eq!(s.view("scale").unwrap().get_x(0), 640.0);

        s.set_rect(Rect::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(s.rect().is_empty());
        assert_eq!(s.camera().size(), Size::new(640, 480));
    }

    #[test]
    fn pointer_defaults_to_centre_and_clamps() {
        let mut s = scene_with(vec![layer(0, 10, 10, None)]);
        assert_eq!(s.pointer(), Vec2::center());
        s.set_pointer(1.5, -0.5);
        assert_eq!(s.pointer(), Vec2::new(1.0, 0.0));
        s.set_pointer(f32::NAN, 0.2);
        assert_eq!(s.pointer(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn merged_geometry_has_one_group_per_layer() {
        let s = scene_with(vec![layer(0, 10, 10, None), layer(1, 20, 10, None), layer(2, 5, 5, None)]);
        assert_eq!(s.geometry().groups().len(), 3);
        assert_eq!(s.geometry().index().unwrap().count(), 18);
        assert_eq!(s.vertex_buffer().borrow().count(), 12);
        assert_eq!(s.vertex_buffer().borrow().usage(), BufferUsage::Dynamic);
    }
}
