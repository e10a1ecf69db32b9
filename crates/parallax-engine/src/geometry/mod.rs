//! Geometry model: named attributes, a u16 index buffer and named groups.
//!
//! Each parallax layer is one quad. A scene merges its quads into one
//! geometry, then interleaves the merged attributes into a single buffer so
//! one vertex binding and one indexed draw cover the whole scene.

mod buffer_geometry;
mod interleave;
mod merge;
mod parallax;

pub use buffer_geometry::{BufferGeometry, GeometryGroup};
pub use interleave::interleave_attributes;
pub use merge::merge_geometries;
pub use parallax::{parallax_geometry, QUAD_INDICES};

/// Attribute names in the order every parallax quad declares them.
pub const ATTRIBUTE_NAMES: [&str; 5] = ["position", "uv", "atlas", "parallax", "scale"];
