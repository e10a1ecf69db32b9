use crate::buffers::BufferAttribute;

/// Contiguous slice of the index buffer owned by one source geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryGroup {
    pub id: String,
    pub start: usize,
    pub count: usize,
}

/// Attribute set plus optional index buffer.
///
/// Attributes keep insertion order; that order becomes the interleaved
/// vertex layout.
#[derive(Debug, Default)]
pub struct BufferGeometry {
    pub name: String,
    attributes: Vec<BufferAttribute<f32>>,
    index: Option<BufferAttribute<u16>>,
    groups: Vec<GeometryGroup>,
}

impl BufferGeometry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Inserts or replaces the attribute called `name`.
    pub fn set_attribute(&mut self, name: &str, attribute: BufferAttribute<f32>) {
        let attribute = attribute.named(name);
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(slot) => *slot = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&BufferAttribute<f32>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut BufferAttribute<f32>> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    pub fn attributes(&self) -> &[BufferAttribute<f32>] {
        &self.attributes
    }

    pub fn set_index(&mut self, indices: Vec<u16>) {
        self.index = Some(BufferAttribute::new(indices, 1).named("index"));
    }

    pub fn index(&self) -> Option<&BufferAttribute<u16>> {
        self.index.as_ref()
    }

    pub fn index_mut(&mut self) -> Option<&mut BufferAttribute<u16>> {
        self.index.as_mut()
    }

    pub fn add_group(&mut self, start: usize, count: usize, id: impl Into<String>) {
        self.groups.push(GeometryGroup {
            id: id.into(),
            start,
            count,
        });
    }

    pub fn groups(&self) -> &[GeometryGroup] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&GeometryGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Vertex count taken from `position`, or the first attribute.
    pub fn vertex_count(&self) -> usize {
        self.attribute("position")
            .or_else(|| self.attributes.first())
            .map_or(0, |a| a.count())
    }

    /// Offsets every position by `(x, y)`.
    pub fn translate(&mut self, x: f32, y: f32) {
        let Some(position) = self.attribute_mut("position") else { return };
        for i in 0..position.count() {
            let (px, py) = (position.get_x(i), position.get_y(i));
            position.set_xy(i, px + x, py + y);
        }
        position.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut g = BufferGeometry::new("g");
        g.set_attribute("position", BufferAttribute::new(vec![0.0; 4], 2));
        g.set_attribute("uv", BufferAttribute::new(vec![0.0; 4], 2));
        g.set_attribute("position", BufferAttribute::new(vec![1.0; 6], 2));

        let names: Vec<&str> = g.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["position", "uv"]);
        assert_eq!(g.vertex_count(), 3);
    }

    #[test]
    fn translate_moves_positions() {
        let mut g = BufferGeometry::new("g");
        g.set_attribute("position", BufferAttribute::new(vec![-0.5, 0.5, 0.5, -0.5], 2));
        g.translate(0.25, -1.0);

        let pos = g.attribute("position").map(|a| a.array().to_vec());
        assert_eq!(pos, Some(vec![-0.25, -0.5, 0.75, -1.5]));
    }
}
