use crate::buffers::{BufferAttribute, BufferSource, Element};
use crate::error::{ParallaxError, Result};

use super::BufferGeometry;

/// Merges indexed geometries into one.
///
/// Each source's indices are offset by the number of vertices contributed
/// before it, same-named attributes are concatenated in input order, and with
/// `use_groups` every source gets a group `{ id: name, start, count }` over its
/// slice of the merged index range.
///
/// All inputs must be indexed and declare the same attributes with the same
/// item sizes.
pub fn merge_geometries(geometries: &[BufferGeometry], use_groups: bool) -> Result<BufferGeometry> {
    let Some(first) = geometries.first() else {
        return Err(ParallaxError::config("cannot merge an empty geometry list"));
    };

    for (i, geometry) in geometries.iter().enumerate() {
        if geometry.index().is_none() {
            return Err(ParallaxError::config(format!(
                "geometry {i} ('{}') has no index buffer",
                geometry.name
            )));
        }
        let same_layout = geometry.attributes().len() == first.attributes().len()
            && first.attributes().iter().all(|a| {
                geometry
                    .attribute(&a.name)
                    .is_some_and(|b| b.item_size() == a.item_size())
            });
        if !same_layout {
            return Err(ParallaxError::config(format!(
                "geometry {i} ('{}') does not match the attribute layout of '{}'",
                geometry.name, first.name
            )));
        }
    }

    let mut merged = BufferGeometry::new("merged");

    let mut indices: Vec<u16> = Vec::new();
    let mut vertex_offset: u32 = 0;

    for geometry in geometries {
        let Some(index) = geometry.index() else { continue };

        if use_groups {
            merged.add_group(indices.len(), index.count(), geometry.name.clone());
        }

        for &i in index.array() {
            let rebased = offset_index(i, vertex_offset)?;
            indices.push(rebased);
        }

        vertex_offset += geometry.vertex_count() as u32;
    }

    merged.set_index(indices);

    for template in first.attributes() {
        let mut array: Vec<f32> = Vec::new();
        for geometry in geometries {
            if let Some(attr) = geometry.attribute(&template.name) {
                array.extend_from_slice(attr.array());
            }
        }
        merged.set_attribute(
            &template.name,
            BufferAttribute::new(array, template.item_size()).with_usage(template.usage()),
        );
    }

    Ok(merged)
}

fn offset_index<T: Element>(index: T, offset: u32) -> Result<T> {
    T::from_u32(index.to_u32() + offset).ok_or_else(|| {
        ParallaxError::config("merged geometry exceeds the 16-bit index range")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(name: &str, tag: f32) -> BufferGeometry {
        let mut g = BufferGeometry::new(name);
        g.set_attribute("position", BufferAttribute::new(vec![tag; 8], 2));
        g.set_attribute("uv", BufferAttribute::new(vec![0.0; 8], 2));
        g.set_index(vec![0, 2, 1, 2, 3, 1]);
        g
    }

    #[test]
    fn groups_cover_the_whole_index_range() {
        let merged = merge_geometries(&[quad("a", 1.0), quad("b", 2.0)], true).unwrap();
        let index = merged.index().unwrap();

        let total: usize = merged.groups().iter().map(|g| g.count).sum();
        assert_eq!(total, index.count());
        assert_eq!(merged.groups()[1].start, 6);
        assert_eq!(merged.vertex_count(), 8);
    }

    #[test]
    fn group_indices_only_reach_their_own_vertices() {
        let merged = merge_geometries(&[quad("a", 1.0), quad("b", 2.0)], true).unwrap();
        let index = merged.index().unwrap();
        let position = merged.attribute("position").unwrap();

        for (group, tag) in merged.groups().iter().zip([1.0, 2.0]) {
            for i in group.start..group.start + group.count {
                let v = index.get_x(i) as usize;
                assert_eq!(position.get_x(v), tag, "group {} reached a foreign vertex", group.id);
            }
        }
        assert_eq!(&index.array()[6..], &[4, 6, 5, 6, 7, 5]);
    }

    #[test]
    fn mismatched_layouts_are_rejected() {
        let mut odd = quad("odd", 0.0);
        odd.set_attribute("scale", BufferAttribute::new(vec![0.0; 8], 2));
        let err = merge_geometries(&[quad("a", 1.0), odd], false).unwrap_err();
        assert!(matches!(err, ParallaxError::Configuration(_)));
    }

    #[test]
    fn without_groups_no_groups_are_recorded() {
        let merged = merge_geometries(&[quad("a", 1.0), quad("b", 2.0)], false).unwrap();
        assert!(merged.groups().is_empty());
        assert_eq!(merged.index().unwrap().count(), 12);
    }
}
