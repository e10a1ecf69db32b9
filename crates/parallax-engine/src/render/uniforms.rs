use bytemuck::{Pod, Zeroable};

use crate::coords::Vec2;

/// Values shared by every scene: logical canvas size and seconds since start.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct GlobalUniforms {
    pub resolution: Vec2,
    pub time: f32,
}

/// Per-scene uniform block, bound at group 0.
///
/// Layout follows WGSL uniform rules: `mat3x3<f32>` is three padded columns.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub projection: [[f32; 4]; 3],
    /// Scene rect size in logical pixels (the camera size).
    pub world_size: [f32; 2],
    /// Viewport size in physical pixels.
    pub resolution: [f32; 2],
    pub pointer: [f32; 2],
    pub global_resolution: [f32; 2],
    pub time: f32,
    pub _pad: [f32; 3],
}

impl SceneUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_wgsl_size() {
        // mat3x3 (48) + 4 * vec2 (32) + f32 rounded up to 16
        assert_eq!(SceneUniforms::SIZE, 96);
        assert_eq!(SceneUniforms::SIZE % 16, 0);
    }
}
