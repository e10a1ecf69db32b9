use crate::coords::Size;

/// Orthographic 2D camera over a scene rect.
///
/// World space is the scene rect in logical pixels, origin top left, +Y down.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera2D {
    size: Size,
    projection: [[f32; 4]; 3],
}

impl Camera2D {
    pub fn new(size: Size) -> Self {
        let mut camera = Self {
            size,
            projection: [[0.0; 4]; 3],
        };
        camera.set_projection(size);
        camera
    }

    /// Recomputes the projection; empty sizes keep the previous one.
    pub fn set_projection(&mut self, size: Size) {
        if size.is_empty() {
            return;
        }
        self.size = size;

        let w = size.w as f32;
        let h = size.h as f32;
        self.projection = [
            [2.0 / w, 0.0, 0.0, 0.0],
            [0.0, -2.0 / h, 0.0, 0.0],
            [-1.0, 1.0, 1.0, 0.0],
        ];
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Column-major 3x3 matrix, columns padded to `vec4`.
    #[inline]
    pub fn projection(&self) -> [[f32; 4]; 3] {
        self.projection
    }

    /// Applies the projection to a world point.
    pub fn project(&self, x: f32, y: f32) -> [f32; 2] {
        let m = &self.projection;
        [
            m[0][0] * x + m[1][0] * y + m[2][0],
            m[0][1] * x + m[1][1] * y + m[2][1],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_map_to_clip_space() {
        let cam = Camera2D::new(Size::new(400, 200));
        assert_eq!(cam.project(0.0, 0.0), [-1.0, 1.0]);
        assert_eq!(cam.project(400.0, 200.0), [1.0, -1.0]);
        assert_eq!(cam.project(200.0, 100.0), [0.0, 0.0]);
    }

    #[test]
    fn empty_size_keeps_projection() {
        let mut cam = Camera2D::new(Size::new(100, 100));
        let before = cam.projection();
        cam.set_projection(Size::new(0, 50));
        assert_eq!(cam.projection(), before);
        assert_eq!(cam.size(), Size::new(100, 100));
    }
}
