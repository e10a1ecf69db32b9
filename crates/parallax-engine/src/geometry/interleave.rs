use std::rc::Rc;

use crate::buffers::{BufferAttribute, Element, InterleavedBuffer, InterleavedBufferAttribute};
use crate::error::{ParallaxError, Result};

/// Packs N attributes of equal vertex count into one shared buffer.
///
/// `stride = Σ item_size`; each returned view keeps the source attribute's name
/// and reads its components at `offset` inside every vertex.
pub fn interleave_attributes<T: Element>(
    attributes: &[BufferAttribute<T>],
) -> Result<Vec<InterleavedBufferAttribute<T>>> {
    let Some(first) = attributes.first() else {
        return Err(ParallaxError::config("cannot interleave an empty attribute list"));
    };

    let count = first.count();
    if let Some(odd) = attributes.iter().find(|a| a.count() != count) {
        return Err(ParallaxError::config(format!(
            "attribute '{}' has {} vertices, expected {count}",
            odd.name,
            odd.count()
        )));
    }

    let stride: usize = attributes.iter().map(|a| a.item_size()).sum();
    let mut array = vec![T::default(); count * stride];

    let mut offset = 0;
    for attribute in attributes {
        let item_size = attribute.item_size();
        for v in 0..count {
            let at = v * stride + offset;
            array[at..at + item_size].copy_from_slice(attribute.item(v));
        }
        offset += item_size;
    }

    let data = InterleavedBuffer::new(array, stride).into_shared();

    let mut views = Vec::with_capacity(attributes.len());
    let mut offset = 0;
    for attribute in attributes {
        let mut view = InterleavedBufferAttribute::new(Rc::clone(&data), attribute.item_size(), offset);
        view.name = attribute.name.clone();
        offset += attribute.item_size();
        views.push(view);
    }

    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, values: Vec<f32>, item_size: usize) -> BufferAttribute<f32> {
        BufferAttribute::new(values, item_size).named(name)
    }

    #[test]
    fn every_view_reads_back_its_source() {
        let sources = vec![
            attr("position", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2),
            attr("atlas", (0..12).map(|v| v as f32 * 0.5).collect(), 4),
            attr("scale", vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0], 2),
        ];
        let views = interleave_attributes(&sources).unwrap();

        assert_eq!(views[0].data().borrow().stride(), 8);
        for (src, view) in sources.iter().zip(&views) {
            assert_eq!(src.name, view.name);
            for v in 0..src.count() {
                for c in 0..src.item_size() {
                    assert_eq!(view.get(v, c), src.get(v, c));
                }
            }
        }
    }

    #[test]
    fn views_share_a_single_buffer() {
        let views = interleave_attributes(&[
            attr("a", vec![0.0; 4], 2),
            attr("b", vec![0.0; 2], 1),
        ])
        .unwrap();
        assert!(Rc::ptr_eq(views[0].data(), views[1].data()));
        assert_eq!(views[1].offset(), 2);
    }

    #[test]
    fn vertex_count_mismatch_is_an_error() {
        let err = interleave_attributes(&[attr("a", vec![0.0; 4], 2), attr("b", vec![0.0; 3], 1)])
            .unwrap_err();
        assert!(matches!(err, ParallaxError::Configuration(_)));
    }
}
