//! Mockup Renderer: wgpu forward pass (hemisphere lighting) into an offscreen surface, readback, present.

pub mod config;
pub mod forward;
pub mod present;
pub mod readback;
pub mod target;

use std::sync::Arc;

pub use config::RendererConfig;
pub use forward::{ForwardPass, FrameUniforms, MeshDraw};
pub use present::PresentPass;
pub use target::RenderTarget;

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,
    forward_pass: ForwardPass,
    present_pass: PresentPass,
    target: Option<RenderTarget>,
    fallback_map: Arc<wgpu::TextureView>,
}

impl Renderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, String> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    pub fn new_with_config(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self, String> {
        let forward_pass = ForwardPass::new(&device, config.surface_format, config.depth_format)?;
        let present_pass = PresentPass::new(&device, config.swapchain_format, config.present_background)?;
        let fallback_map = Arc::new(create_white_texel(&device, &queue));
        Ok(Self {
            device,
            queue,
            config,
            forward_pass,
            present_pass,
            target: None,
            fallback_map,
        })
    }

    pub fn device(&self) -> &wgpu::Device { &self.device }
    pub fn queue(&self) -> &wgpu::Queue { &self.queue }
    pub fn config(&self) -> &RendererConfig { &self.config }

    /// 1x1 white texel bound when a material has no base color map.
    pub fn fallback_map(&self) -> Arc<wgpu::TextureView> {
        self.fallback_map.clone()
    }

    pub fn ensure_target(&mut self, width: u32, height: u32) -> Result<(), String> {
        let existing = self.target.take();
        let target = RenderTarget::ensure_size(
            &self.device,
            existing,
            width,
            height,
            self.config.surface_format,
            self.config.depth_format,
        )?;
        log::debug!("render target {}x{}", width, height);
        self.target = Some(target);
        Ok(())
    }

    pub fn release_target(&mut self) {
        if let Some(target) = self.target.take() {
            target.destroy();
        }
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    /// Encode the forward pass into the given encoder. Call ensure_target first.
    pub fn encode_frame(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &FrameUniforms,
        clear_color: [f32; 4],
        meshes: &[MeshDraw],
    ) -> Result<(), String> {
        let target = self.target.as_ref().ok_or("encode_frame: no render target (call ensure_target first)")?;
        let clear = wgpu::Color {
            r: clear_color[0] as f64,
            g: clear_color[1] as f64,
            b: clear_color[2] as f64,
            a: clear_color[3] as f64,
        };
        self.forward_pass.encode(encoder, &self.device, &self.queue, target, frame, clear, meshes)
    }

    /// Encode and submit one frame.
    pub fn render_frame(&self, frame: &FrameUniforms, clear_color: [f32; 4], meshes: &[MeshDraw]) -> Result<(), String> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("mockup_frame") });
        self.encode_frame(&mut encoder, frame, clear_color, meshes)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Blocking copy of the render target into tight RGBA8 rows.
    pub fn read_target(&self) -> Result<(u32, u32, Vec<u8>), String> {
        let target = self.target.as_ref().ok_or("read_target: no render target")?;
        let rgba = readback::read_texture_tight(&self.device, &self.queue, &target.color)?;
        Ok((target.width(), target.height(), rgba))
    }

    /// Encode present pass: render target -> output view (e.g. swapchain).
    pub fn encode_present_to(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
    ) -> Result<(), String> {
        let target = self.target.as_ref().ok_or("encode_present_to: no render target")?;
        self.present_pass.encode(encoder, &self.device, &self.queue, &target.color_view(), output_view)
    }
}

fn create_white_texel(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let size = wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("fallback_white"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(4), rows_per_image: Some(1) },
        size,
    );
    texture.create_view(&Default::default())
}
