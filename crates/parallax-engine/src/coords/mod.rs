//! Coordinate and geometry primitives shared by packing, scenes and rendering.
//!
//! Scene rectangles are logical pixels with a top-left origin and +Y down.
//! [`PixelRect`] and [`Size`] are physical pixels (atlas space, scissors).

mod color;
mod rect;
mod size;
mod vec2;

pub use color::ColorRgba;
pub use rect::Rect;
pub use size::{PixelRect, Size};
pub use vec2::Vec2;
