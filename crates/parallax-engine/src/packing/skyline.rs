use crate::coords::{PixelRect, Size};
use crate::error::{ParallaxError, Result};

use super::{finish, validate, ImageSource, PackResult, Packer};

/// Starting bin for a skyline run.
pub const DEFAULT_INITIAL_SIZE: Size = Size::new(512, 512);

/// Skyline packer.
///
/// Keeps an x-ordered list of skyline segments and drops every rectangle at
/// the lowest reachable `y`. On failure the shorter bin side doubles (capped
/// at the texture limit) and the same item is retried.
#[derive(Debug, Clone)]
pub struct SkylinePacker {
    max_texture_size: u32,
    initial_size: Size,
}

impl SkylinePacker {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            initial_size: DEFAULT_INITIAL_SIZE,
        }
    }

    pub fn with_initial_size(mut self, size: Size) -> Self {
        self.initial_size = size;
        self
    }
}

impl Packer for SkylinePacker {
    fn name(&self) -> &'static str {
        "skyline"
    }

    fn pack(&self, images: &[ImageSource]) -> Result<PackResult> {
        validate(images)?;

        let max = self.max_texture_size;
        let mut items: Vec<(&str, Size)> = images.iter().map(|i| (i.id.as_str(), i.size())).collect();
        items.sort_by(|a, b| b.1.w.cmp(&a.1.w));

        let start = Size::new(self.initial_size.w.clamp(1, max), self.initial_size.h.clamp(1, max));
        let mut bin = Skyline::new(start);
        let mut placed = Vec::with_capacity(items.len());

        let mut i = 0;
        while i < items.len() {
            let (id, size) = items[i];

            if let Some((x, y)) = bin.add(size) {
                placed.push((id.to_string(), PixelRect::new(x, y, size.w, size.h)));
                i += 1;
                continue;
            }

            let exhausted = || {
                let abandoned: Vec<&str> = items[i..].iter().map(|(id, _)| *id).collect();
                log::error!("skyline bin saturated at {max}x{max}; abandoning {abandoned:?}");
                ParallaxError::ResourceExhausted {
                    id: id.to_string(),
                    width: size.w,
                    height: size.h,
                    max,
                }
            };

            if size.w > max || size.h > max {
                return Err(exhausted());
            }

            let current = bin.size;
            let mut next = current;

            if current.w <= current.h {
                next.w = (current.w * 2).max(size.w);
            } else {
                next.h = (current.h * 2).max(size.h);
            }
            next.w = next.w.min(max);
            next.h = next.h.min(max);

            if next.w < size.w {
                next.w = (current.w * 2).max(size.w).min(max);
            }
            if next.h < size.h {
                next.h = (current.h * 2).max(size.h).min(max);
            }

            if next == current {
                return Err(exhausted());
            }

            bin.grow(next);
        }

        log::debug!(
            "skyline packed {} images into {}x{}",
            placed.len(),
            bin.size.w,
            bin.size.h
        );

        Ok(finish(placed, bin.size, max))
    }
}

// ── skyline ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Segment {
    x: u32,
    y: u32,
}

/// Segment `i` spans from `segments[i].x` to the next segment's x (or the
/// bin edge) at height `segments[i].y`.
#[derive(Debug)]
struct Skyline {
    segments: Vec<Segment>,
    size: Size,
}

impl Skyline {
    fn new(size: Size) -> Self {
        Self {
            segments: vec![Segment { x: 0, y: 0 }],
            size,
        }
    }

    /// Places `size` at the lowest reachable top edge; first candidate wins ties.
    fn add(&mut self, size: Size) -> Option<(u32, u32)> {
        let (w, h) = (size.w, size.h);
        if w > self.size.w || h > self.size.h {
            return None;
        }

        // (first spanned, one past last spanned, x, y)
        let mut best: Option<(usize, usize, u32, u32)> = None;

        for (i, seg) in self.segments.iter().enumerate() {
            let x = seg.x;
            if x + w > self.size.w {
                continue;
            }

            let mut top = seg.y;
            let mut end = i + 1;
            while end < self.segments.len() && self.segments[end].x < x + w {
                top = top.max(self.segments[end].y);
                end += 1;
            }

            if best.is_some_and(|(.., best_y)| top >= best_y) {
                continue;
            }
            if top + h > self.size.h {
                continue;
            }

            best = Some((i, end, x, top));
        }

        let (first, end, x, y) = best?;

        let last_y = self.segments[end - 1].y;
        let right = x + w;
        let next_x = self.segments.get(end).map_or(self.size.w, |s| s.x);

        let mut replacement = vec![Segment { x, y: y + h }];
        if right < next_x {
            replacement.push(Segment { x: right, y: last_y });
        }
        self.segments.splice(first..end, replacement);

        self.merge();
        Some((x, y))
    }

    /// Collapses neighbours at the same height.
    fn merge(&mut self) {
        self.segments.dedup_by(|next, prev| next.y == prev.y);
    }

    fn grow(&mut self, next: Size) {
        if next.w > self.size.w {
            if self.segments.last().is_some_and(|s| s.y > 0) {
                self.segments.push(Segment {
                    x: self.size.w,
                    y: 0,
                });
            }
            self.size.w = next.w;
        }
        if next.h > self.size.h {
            self.size.h = next.h;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::test_support::{assert_valid, image};

    #[test]
    fn fills_the_lowest_segment_first() {
        let mut bin = Skyline::new(Size::new(100, 100));
        assert_eq!(bin.add(Size::new(60, 50)), Some((0, 0)));
        assert_eq!(bin.add(Size::new(40, 20)), Some((60, 0)));
        assert_eq!(bin.add(Size::new(40, 20)), Some((60, 20)));
        assert_eq!(bin.add(Size::new(30, 10)), Some((60, 40)));
        assert_eq!(
            bin.segments,
            vec![Segment { x: 0, y: 50 }, Segment { x: 90, y: 40 }]
        );
    }

    #[test]
    fn spanning_placement_takes_the_highest_spanned_segment() {
        let mut bin = Skyline::new(Size::new(100, 100));
        bin.add(Size::new(50, 30));
        bin.add(Size::new(50, 10));
        assert_eq!(bin.add(Size::new(80, 10)), Some((0, 30)));
        assert_eq!(
            bin.segments,
            vec![Segment { x: 0, y: 40 }, Segment { x: 80, y: 10 }]
        );
    }

    #[test]
    fn grows_the_shorter_side_until_everything_fits() {
        let images: Vec<ImageSource> = (0..6).map(|i| image(&format!("tile{i}"), 64, 64)).collect();
        let result = SkylinePacker::new(1024)
            .with_initial_size(Size::new(64, 64))
            .pack(&images)
            .unwrap();

        assert_valid(&result, 6, 1024);
        assert!(result.size.w > 64 || result.size.h > 64);
    }

    #[test]
    fn mixed_sizes_never_overlap() {
        let images: Vec<ImageSource> = [(300, 120), (64, 64), (128, 400), (90, 30), (256, 256), (500, 10)]
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| image(&format!("img{i}"), w, h))
            .collect();

        let result = SkylinePacker::new(2048).pack(&images).unwrap();
        assert_valid(&result, images.len(), 2048);
    }

    #[test]
    fn saturated_bin_reports_exhaustion() {
        let images: Vec<ImageSource> = (0..5).map(|i| image(&format!("big{i}"), 100, 100)).collect();
        let err = SkylinePacker::new(200)
            .with_initial_size(Size::new(100, 100))
            .pack(&images)
            .unwrap_err();
        assert!(matches!(err, ParallaxError::ResourceExhausted { max: 200, .. }));
    }

    #[test]
    fn item_larger_than_the_limit_is_exhausted() {
        let err = SkylinePacker::new(128).pack(&[image("huge", 256, 16)]).unwrap_err();
        assert!(matches!(err, ParallaxError::ResourceExhausted { .. }));
    }
}
