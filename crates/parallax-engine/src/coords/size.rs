/// Integer width/height in pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    #[inline]
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    #[inline]
    pub fn area(self) -> u64 {
        self.w as u64 * self.h as u64
    }

    #[inline]
    pub fn max_side(self) -> u32 {
        self.w.max(self.h)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Integer rectangle in pixels, top-left origin.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(self) -> u32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(self) -> u32 {
        self.y + self.h
    }

    #[inline]
    pub fn size(self) -> Size {
        Size::new(self.w, self.h)
    }

    /// True when the rectangle lies fully inside `(0, 0, bounds.w, bounds.h)`.
    #[inline]
    pub fn fits_within(self, bounds: Size) -> bool {
        self.right() <= bounds.w && self.bottom() <= bounds.h
    }

    /// Shared edges do not count as overlap.
    #[inline]
    pub fn overlaps(self, other: PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_requires_shared_area() {
        let a = PixelRect::new(0, 0, 10, 10);
        assert!(a.overlaps(PixelRect::new(5, 5, 10, 10)));
        assert!(!a.overlaps(PixelRect::new(10, 0, 10, 10)));
        assert!(!a.overlaps(PixelRect::new(0, 10, 10, 10)));
    }

    #[test]
    fn fits_within_is_inclusive_of_edges() {
        let bounds = Size::new(20, 10);
        assert!(PixelRect::new(10, 0, 10, 10).fits_within(bounds));
        assert!(!PixelRect::new(11, 0, 10, 10).fits_within(bounds));
    }
}
