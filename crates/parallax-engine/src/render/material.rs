use std::sync::atomic::{AtomicU64, Ordering};

/// WGSL source of the default parallax program.
pub const PARALLAX_WGSL: &str = include_str!("shaders/parallax.wgsl");

/// One vertex input of a material: attribute name, shader location, component count.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexInput {
    pub name: &'static str,
    pub location: u32,
    pub components: u32,
}

impl VertexInput {
    pub const fn new(name: &'static str, location: u32, components: u32) -> Self {
        Self {
            name,
            location,
            components,
        }
    }
}

/// Program description shared by scenes.
///
/// `id` is unique per instance; the render controller compiles each material once.
#[derive(Debug, Clone)]
pub struct Material {
    id: u64,
    pub label: String,
    pub source: String,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    /// Vertex inputs in buffer order; the vertex buffer is tightly interleaved f32s.
    pub inputs: Vec<VertexInput>,
    pub transparent: bool,
}

impl Material {
    pub fn new(label: impl Into<String>, source: impl Into<String>, inputs: Vec<VertexInput>) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            source: source.into(),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            inputs,
            transparent: true,
        }
    }

    /// The layer program: `position`, `uv`, `atlas`, `parallax`, `scale`.
    pub fn parallax() -> Self {
        Self::new(
            "parallax",
            PARALLAX_WGSL,
            vec![
                VertexInput::new("position", 0, 2),
                VertexInput::new("uv", 1, 2),
                VertexInput::new("atlas", 2, 4),
                VertexInput::new("parallax", 3, 2),
                VertexInput::new("scale", 4, 2),
            ],
        )
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Components per vertex.
    pub fn stride(&self) -> u32 {
        self.inputs.iter().map(|i| i.components).sum()
    }

    #[inline]
    pub fn stride_bytes(&self) -> u64 {
        self.stride() as u64 * std::mem::size_of::<f32>() as u64
    }

    /// `(input, offset in components)` pairs in buffer order.
    pub fn layout(&self) -> impl Iterator<Item = (&VertexInput, u32)> + '_ {
        self.inputs.iter().scan(0u32, |offset, input| {
            let at = *offset;
            *offset += input.components;
            Some((input, at))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ATTRIBUTE_NAMES;

    #[test]
    fn parallax_layout_follows_quad_attributes() {
        let m = Material::parallax();
        let names: Vec<&str> = m.inputs.iter().map(|i| i.name).collect();
        assert_eq!(names, ATTRIBUTE_NAMES);
        assert_eq!(m.stride(), 12);
        assert_eq!(m.stride_bytes(), 48);

        let offsets: Vec<u32> = m.layout().map(|(_, o)| o).collect();
        assert_eq!(offsets, [0, 2, 4, 8, 10]);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Material::parallax().id(), Material::parallax().id());
    }
}
