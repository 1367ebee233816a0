//! Render target: the offscreen color surface frames are drawn into, plus its depth buffer.

use wgpu::TextureView;

pub struct RenderTarget {
    pub color: wgpu::Texture,
    pub depth: wgpu::Texture,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Reuse `existing` when the size matches, otherwise allocate a new target (the old one is destroyed).
    pub fn ensure_size(
        device: &wgpu::Device,
        existing: Option<Self>,
        width: u32,
        height: u32,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err("RenderTarget: width and height must be > 0".to_string());
        }
        let limit = device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(format!("RenderTarget: {}x{} exceeds max texture size {}", width, height, limit));
        }
        if let Some(r) = existing {
            if r.width == width && r.height == height && r.color.format() == color_format {
                return Ok(r);
            }
            r.destroy();
        }
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_surface_color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: color_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_surface_depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Ok(Self { color, depth, width, height })
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn color_view(&self) -> TextureView { self.color.create_view(&Default::default()) }
    pub fn depth_view(&self) -> TextureView { self.depth.create_view(&Default::default()) }

    /// Free GPU memory now instead of waiting for the last reference to drop.
    pub fn destroy(self) {
        self.color.destroy();
        self.depth.destroy();
    }
}
