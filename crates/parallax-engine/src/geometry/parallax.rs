use crate::buffers::{BufferAttribute, BufferUsage};
use crate::scene::ParallaxLayer;

use super::BufferGeometry;

/// Two triangles over the quad `[tl, tr, bl, br]`.
pub const QUAD_INDICES: [u16; 6] = [0, 2, 1, 2, 3, 1];

const QUAD_POSITIONS: [f32; 8] = [-0.5, 0.5, 0.5, 0.5, -0.5, -0.5, 0.5, -0.5];
const QUAD_UVS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];

/// Builds the unit quad for one layer.
///
/// Attributes, in layout order:
/// - `position` (2): unit quad centred on the origin, +Y up
/// - `uv` (2)
/// - `atlas` (4): normalized `w, h, x, y` of the layer inside the atlas
/// - `parallax` (2): movement factor
/// - `scale` (2): world size of the quad, defaults to the source image size
pub fn parallax_geometry(layer: &ParallaxLayer) -> BufferGeometry {
    let vertices = QUAD_POSITIONS.len() / 2;

    let n = layer.atlas.normalized;
    let atlas: Vec<f32> = [n.w, n.h, n.x, n.y].repeat(vertices);

    let parallax: Vec<f32> = layer.settings.parallax.to_array().repeat(vertices);

    let source = layer.atlas.source_size;
    let scale: Vec<f32> = [source.w as f32, source.h as f32].repeat(vertices);

    let mut geometry = BufferGeometry::new(layer.id.clone());
    geometry.set_index(QUAD_INDICES.to_vec());
    geometry.set_attribute("position", BufferAttribute::new(QUAD_POSITIONS.to_vec(), 2));
    geometry.set_attribute("uv", BufferAttribute::new(QUAD_UVS.to_vec(), 2));
    geometry.set_attribute("atlas", BufferAttribute::new(atlas, 4));
    geometry.set_attribute("parallax", BufferAttribute::new(parallax, 2));
    geometry.set_attribute(
        "scale",
        BufferAttribute::new(scale, 2).with_usage(BufferUsage::Dynamic),
    );

    if let Some(t) = layer.settings.translate {
        geometry.translate(t.x, t.y);
    }

    geometry
}
