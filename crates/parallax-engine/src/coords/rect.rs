use super::{PixelRect, Size, Vec2};

/// Axis-aligned rectangle with float components.
///
/// Used both for scene rectangles (logical pixels, top-left origin) and for
/// normalized atlas placements (`[0, 1]` UV space).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    #[inline]
    pub fn area(self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.w && p.y < self.y + self.h
    }

    /// Position of `p` relative to this rectangle, clamped to `[0, 1]`.
    #[inline]
    pub fn normalize_point(self, p: Vec2) -> Vec2 {
        if self.is_empty() {
            return Vec2::center();
        }
        Vec2::new(
            ((p.x - self.x) / self.w).clamp(0.0, 1.0),
            ((p.y - self.y) / self.h).clamp(0.0, 1.0),
        )
    }

    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);

        let w = x1 - x0;
        let h = y1 - y0;

        if w <= 0.0 || h <= 0.0 {
            None
        } else {
            Some(Rect::new(x0, y0, w, h))
        }
    }

    /// Integer scissor rectangle clipped to the drawable surface.
    ///
    /// Returns `None` when nothing of the rectangle is visible.
    pub fn to_scissor(self, surface: Size) -> Option<PixelRect> {
        let bounds = Rect::new(0.0, 0.0, surface.w as f32, surface.h as f32);
        let clipped = self.intersect(bounds)?;

        let x = clipped.x.floor() as u32;
        let y = clipped.y.floor() as u32;
        let x2 = ((clipped.x + clipped.w).ceil() as u32).min(surface.w);
        let y2 = ((clipped.y + clipped.h).ceil() as u32).min(surface.h);

        let (w, h) = (x2.saturating_sub(x), y2.saturating_sub(y));
        if w == 0 || h == 0 {
            None
        } else {
            Some(PixelRect::new(x, y, w, h))
        }
    }
}
