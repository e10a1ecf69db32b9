use std::collections::HashMap;

use crate::buffers::{merge_update_ranges, BufferKey, BufferSource};
use crate::error::{ParallaxError, Result};

use super::backend::{BufferKind, GpuBufferId, RenderBackend};

#[derive(Debug, Copy, Clone)]
struct Uploaded {
    id: GpuBufferId,
    version: u32,
    byte_len: u64,
}

/// Tracks the GPU copy of every CPU buffer and re-uploads only on version change.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    entries: HashMap<BufferKey, Uploaded>,
    uploads: u64,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the GPU buffer for `source`, creating or updating it as needed.
    ///
    /// Updates honour the recorded dirty ranges: none means a full upload,
    /// otherwise one partial write per merged range. Ranges are cleared after.
    pub fn sync<B, S>(&mut self, backend: &mut B, kind: BufferKind, source: &mut S) -> Result<GpuBufferId>
    where
        B: RenderBackend + ?Sized,
        S: BufferSource + ?Sized,
    {
        let key = source.key();
        let bytes = source.bytes();
        let byte_len = bytes.len() as u64;

        let Some(entry) = self.entries.get_mut(&key) else {
            let id = backend.create_buffer(kind, source.usage(), bytes)?;
            self.entries.insert(
                key,
                Uploaded {
                    id,
                    version: source.version(),
                    byte_len,
                },
            );
            source.clear_update_ranges();
            return Ok(id);
        };

        if entry.version == source.version() {
            return Ok(entry.id);
        }
        if entry.byte_len != byte_len {
            return Err(ParallaxError::BufferResize {
                expected: entry.byte_len,
                actual: byte_len,
            });
        }

        let ranges = source.update_ranges();
        if ranges.is_empty() {
            backend.write_buffer(entry.id, 0, bytes);
            self.uploads += 1;
        } else {
            let element = source.kind().byte_size();
            for range in merge_update_ranges(ranges) {
                let start = (range.start * element).min(bytes.len());
                let end = (range.end() * element).min(bytes.len());
                if start == end {
                    continue;
                }
                backend.write_buffer(entry.id, start as u64, &bytes[start..end]);
                self.uploads += 1;
            }
        }

        entry.version = source.version();
        source.clear_update_ranges();
        Ok(entry.id)
    }

    pub fn get(&self, key: BufferKey) -> Option<GpuBufferId> {
        self.entries.get(&key).map(|e| e.id)
    }

    /// Releases the GPU copy of `key`, if one was ever created.
    pub fn delete<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, key: BufferKey) {
        if let Some(entry) = self.entries.remove(&key) {
            backend.delete_buffer(entry.id);
        }
    }

    /// Number of buffer writes issued after creation.
    #[inline]
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::{BufferAttribute, InterleavedBuffer};
    use crate::render::{BackendCall, HeadlessBackend};

    fn writes(backend: &HeadlessBackend) -> Vec<(u64, usize)> {
        backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                BackendCall::WriteBuffer { offset, len, .. } => Some((*offset, *len)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn unchanged_version_uploads_nothing() {
        let mut backend = HeadlessBackend::new(4096);
        let mut registry = BufferRegistry::new();
        let mut attr = BufferAttribute::new(vec![1.0f32, 2.0, 3.0, 4.0], 2);

        let first = registry.sync(&mut backend, BufferKind::Vertex, &mut attr).unwrap();
        let second = registry.sync(&mut backend, BufferKind::Vertex, &mut attr).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.uploads(), 0);
        assert!(writes(&backend).is_empty());

        attr.set(1, 0, 9.0);
        attr.mark_dirty();
        registry.sync(&mut backend, BufferKind::Vertex, &mut attr).unwrap();
        assert_eq!(registry.uploads(), 1);
        assert_eq!(writes(&backend), [(0, 16)]);
        assert_eq!(backend.buffer_bytes(first).unwrap(), bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0, 9.0, 4.0]));
    }

    #[test]
    fn dirty_ranges_upload_merged_slices() {
        let mut backend = HeadlessBackend::new(4096);
        let mut registry = BufferRegistry::new();
        let mut buf = InterleavedBuffer::new(vec![0.0f32; 12], 4);
        registry.sync(&mut backend, BufferKind::Vertex, &mut buf).unwrap();

        buf.add_update_range(0, 2);
        buf.add_update_range(3, 2);
        buf.add_update_range(10, 1);
        buf.mark_dirty();
        registry.sync(&mut backend, BufferKind::Vertex, &mut buf).unwrap();

        assert_eq!(writes(&backend), [(0, 20), (40, 4)]);
        assert!(buf.update_ranges().is_empty());
        assert_eq!(registry.uploads(), 2);
    }

    #[test]
    fn size_change_is_rejected() {
        let mut backend = HeadlessBackend::new(4096);
        let mut registry = BufferRegistry::new();
        let mut attr = BufferAttribute::new(vec![0.0f32; 4], 2);
        registry.sync(&mut backend, BufferKind::Vertex, &mut attr).unwrap();

        attr.set_array(vec![0.0f32; 6]);
        let err = registry.sync(&mut backend, BufferKind::Vertex, &mut attr).unwrap_err();
        assert!(matches!(err, ParallaxError::BufferResize { expected: 16, actual: 24 }));
    }

    #[test]
    fn delete_releases_gpu_copy() {
        let mut backend = HeadlessBackend::new(4096);
        let mut registry = BufferRegistry::new();
        let mut attr = BufferAttribute::new(vec![0u16, 1, 2], 1);
        let id = registry.sync(&mut backend, BufferKind::Index, &mut attr).unwrap();

        registry.delete(&mut backend, attr.key());
        registry.delete(&mut backend, attr.key());
        assert!(registry.is_empty());
        assert!(backend.buffer_bytes(id).is_none());
        assert_eq!(backend.count(|c| matches!(c, BackendCall::DeleteBuffer(_))), 1);
    }
}
