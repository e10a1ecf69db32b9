//! Rectangle bin packing for texture atlases.
//!
//! Two strategies implement [`Packer`]:
//! - [`BinaryTreePacker`]: largest-area first, grows the root right or down to
//!   stay close to square. Default.
//! - [`SkylinePacker`]: lowest-skyline placement, doubles the shorter side of
//!   the bin when an item does not fit. Tends to produce larger atlases.
//!
//! Both finish the same way: placements are normalized to `[0, 1]` against the
//! packed size, then the atlas and every placement are uniformly downscaled
//! when the packed size exceeds the device texture limit.

mod binary_tree;
mod skyline;

pub use binary_tree::BinaryTreePacker;
pub use skyline::SkylinePacker;

use std::rc::Rc;

use image::RgbaImage;

use crate::coords::{PixelRect, Rect, Size};
use crate::error::{ParallaxError, Result};

/// One decoded image to place in the atlas.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub id: String,
    pub bitmap: Rc<RgbaImage>,
}

impl ImageSource {
    pub fn new(id: impl Into<String>, bitmap: Rc<RgbaImage>) -> Self {
        Self {
            id: id.into(),
            bitmap,
        }
    }

    #[inline]
    pub fn size(&self) -> Size {
        let (w, h) = self.bitmap.dimensions();
        Size::new(w, h)
    }
}

/// Placement of one image inside the atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasEntry {
    pub id: String,
    /// Pixel rectangle in the final (possibly downscaled) atlas.
    pub rect: PixelRect,
    /// UV rectangle in `[0, 1]`.
    pub normalized: Rect,
    /// Size of the image before any downscale.
    pub source_size: Size,
}

/// Output of a packing run.
#[derive(Debug, Clone, PartialEq)]
pub struct PackResult {
    pub size: Size,
    pub atlas: Vec<AtlasEntry>,
}

impl PackResult {
    pub fn entry(&self, id: &str) -> Option<&AtlasEntry> {
        self.atlas.iter().find(|e| e.id == id)
    }
}

/// Atlas packing strategy.
pub trait Packer {
    fn name(&self) -> &'static str;

    /// Places every image without overlap, or fails when growth is exhausted.
    fn pack(&self, images: &[ImageSource]) -> Result<PackResult>;
}

/// Selects the packer built by the resource controller.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum PackerStrategy {
    #[default]
    BinaryTree,
    Skyline,
}

impl PackerStrategy {
    pub fn build(self, max_texture_size: u32, max_bin_size: u32) -> Box<dyn Packer> {
        match self {
            PackerStrategy::BinaryTree => {
                Box::new(BinaryTreePacker::new(max_texture_size).with_max_bin_size(max_bin_size))
            }
            PackerStrategy::Skyline => Box::new(SkylinePacker::new(max_texture_size)),
        }
    }
}

// ── shared validation + finish ────────────────────────────────────────────

/// Rejects empty input and zero-area images.
fn validate(images: &[ImageSource]) -> Result<()> {
    if images.is_empty() {
        return Err(ParallaxError::config("cannot pack an empty image list"));
    }
    if let Some(bad) = images.iter().find(|i| i.size().is_empty()) {
        return Err(ParallaxError::config(format!("image '{}' has zero area", bad.id)));
    }
    Ok(())
}

/// Normalizes raw placements and applies the texture-size downscale.
fn finish(placed: Vec<(String, PixelRect)>, packed: Size, max_texture_size: u32) -> PackResult {
    let longest = packed.max_side();
    let scale = |v: u32| -> u32 {
        if longest > max_texture_size {
            (v as u64 * max_texture_size as u64 / longest as u64) as u32
        } else {
            v
        }
    };

    if longest > max_texture_size {
        log::debug!(
            "atlas {}x{} exceeds max texture size {max_texture_size}; downscaling",
            packed.w,
            packed.h
        );
    }

    let atlas = placed
        .into_iter()
        .map(|(id, r)| {
            let normalized = Rect::new(
                r.x as f32 / packed.w as f32,
                r.y as f32 / packed.h as f32,
                r.w as f32 / packed.w as f32,
                r.h as f32 / packed.h as f32,
            );
            let (x, y) = (scale(r.x), scale(r.y));
            let rect = PixelRect::new(x, y, scale(r.right()) - x, scale(r.bottom()) - y);
            AtlasEntry {
                id,
                rect,
                normalized,
                source_size: r.size(),
            }
        })
        .collect();

    PackResult {
        size: Size::new(scale(packed.w), scale(packed.h)),
        atlas,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn image(id: &str, w: u32, h: u32) -> ImageSource {
        ImageSource::new(id, Rc::new(RgbaImage::new(w, h)))
    }

    /// Bounds, overlap and downscale invariants every packer must satisfy.
    pub fn assert_valid(result: &PackResult, count: usize, max_texture_size: u32) {
        assert_eq!(result.atlas.len(), count);
        assert!(result.size.max_side() <= max_texture_size);

        for (i, a) in result.atlas.iter().enumerate() {
            assert!(a.rect.fits_within(result.size), "{} escapes the atlas", a.id);
            let n = a.normalized;
            assert!(n.x >= 0.0 && n.y >= 0.0 && n.x + n.w <= 1.0 + 1e-6 && n.y + n.h <= 1.0 + 1e-6);
            for b in &result.atlas[i + 1..] {
                assert!(!a.rect.overlaps(b.rect), "{} overlaps {}", a.id, b.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::image;
    use super::*;

    #[test]
    fn downscale_keeps_placements_inside_and_disjoint() {
        let placed = vec![
            ("a".to_string(), PixelRect::new(0, 0, 300, 300)),
            ("b".to_string(), PixelRect::new(300, 0, 100, 100)),
            ("c".to_string(), PixelRect::new(300, 100, 1, 1)),
        ];
        let result = finish(placed, Size::new(400, 300), 200);

        assert_eq!(result.size, Size::new(200, 150));
        assert_eq!(result.atlas[0].rect, PixelRect::new(0, 0, 150, 150));
        assert_eq!(result.atlas[1].rect, PixelRect::new(150, 0, 50, 50));
        assert_eq!(result.atlas[0].normalized, Rect::new(0.0, 0.0, 0.75, 1.0));
        assert_eq!(result.atlas[1].source_size, Size::new(100, 100));

        for (i, a) in result.atlas.iter().enumerate() {
            assert!(a.rect.fits_within(result.size));
            for b in &result.atlas[i + 1..] {
                assert!(!a.rect.overlaps(b.rect));
            }
        }
    }

    #[test]
    fn empty_and_zero_area_inputs_are_rejected() {
        assert!(matches!(validate(&[]), Err(ParallaxError::Configuration(_))));
        assert!(matches!(
            validate(&[image("ok", 2, 2), image("flat", 4, 0)]),
            Err(ParallaxError::Configuration(_))
        ));
    }
}
