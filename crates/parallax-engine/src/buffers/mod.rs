//! CPU-side vertex and index storage.
//!
//! Every buffer carries a monotonic `version` and optional dirty ranges. The
//! render layer re-uploads a buffer only when its version moved past the one
//! recorded at the last upload.
//!
//! Setters never bump the version on their own: callers batch their writes
//! and call `mark_dirty` once.

mod attribute;
mod element;
mod interleaved;
mod range;

pub use attribute::BufferAttribute;
pub use element::{Element, ElementKind};
pub use interleaved::{InterleavedBuffer, InterleavedBufferAttribute, SharedInterleavedBuffer};
pub use range::{merge_update_ranges, UpdateRange};

use std::sync::atomic::{AtomicU64, Ordering};

/// Upload frequency hint forwarded to the GPU layer.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    Static,
    /// Rewritten regularly (e.g. the `scale` attribute on resize).
    Dynamic,
}

/// Process-unique identity of a CPU buffer, used to key its GPU copy.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BufferKey(u64);

impl BufferKey {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Read access the upload path needs from any CPU buffer.
pub trait BufferSource {
    fn key(&self) -> BufferKey;
    fn version(&self) -> u32;
    fn usage(&self) -> BufferUsage;
    fn kind(&self) -> ElementKind;
    fn bytes(&self) -> &[u8];
    fn update_ranges(&self) -> &[UpdateRange];
    fn clear_update_ranges(&mut self);
}
