/// Device and surface creation parameters.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick an sRGB surface format when one is offered. Atlas textures are
    /// uploaded as sRGB, so a linear surface would darken every layer.
    pub prefer_srgb: bool,

    /// Swap behavior. FIFO is available everywhere and caps the frame rate
    /// at the display refresh.
    pub present_mode: wgpu::PresentMode,

    /// Preferred surface alpha mode. Falls back to the first supported mode when unsupported.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Device features to request. The parallax pipeline needs none.
    pub required_features: wgpu::Features,

    /// `max_texture_dimension_2d` from these limits bounds the atlas size.
    pub required_limits: wgpu::Limits,

    /// Frames the surface may queue ahead. A hint; backends may ignore it.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
