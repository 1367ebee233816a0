//! Renderer configuration: target formats and present background.

/// Renderer and bridge configuration.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Render surface color format. Must be an sRGB RGBA8 format so readbacks are display-encoded.
    pub surface_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    /// Swapchain texture format for present (e.g. Rgba8Unorm or Bgra8Unorm).
    pub swapchain_format: wgpu::TextureFormat,
    /// Linear RGB the present pass composites the (possibly transparent) surface over.
    pub present_background: [f32; 3],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            depth_format: wgpu::TextureFormat::Depth32Float,
            swapchain_format: wgpu::TextureFormat::Rgba8Unorm,
            // #131316
            present_background: [0.0065, 0.0065, 0.0080],
        }
    }
}
