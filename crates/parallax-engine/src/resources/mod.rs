//! Resource caching: bitmaps, merged atlases and atlas textures.
//!
//! All caches go through [`CacheTable`], which has an explicit pending state per
//! key so concurrent requests for one key do not duplicate work.

mod cache;
mod controller;
mod hash;

pub use cache::{CacheTable, Reservation, SlotState};
pub use controller::{CanvasOptions, MergeResult, ResourceController};
pub use hash::group_hash;
