//! Window-capable backend: created from a window, implements RenderBackendWindow.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use render_api::{
    DrawItem, FrameView, MaterialDesc, MaterialId, MeshData, MeshId, RenderBackend, RenderBackendWindow,
    ResourceCounts, SurfacePixels, TextureData, TextureId,
};
use wgpu::SurfaceTargetUnsafe;

use crate::plugin::MockupPlugin;
use mockup_renderer::RendererConfig;

/// Backend that owns the wgpu Instance and a MockupPlugin; can present to a window.
/// Surface is recreated on every present (wgpu::Surface lifetime is tied to the window; this
/// avoids platform-specific staleness when the window is dragged or resized).
pub struct MockupWindowBackend {
    instance: wgpu::Instance,
    plugin: MockupPlugin,
}

impl MockupWindowBackend {
    /// Create a window-capable backend from a window (e.g. winit). The window is only used to get
    /// raw handles and an initial surface for adapter selection. The host must keep the window alive.
    pub fn from_window(window: &(impl HasWindowHandle + HasDisplayHandle)) -> Result<Self, String> {
        let (raw_window, raw_display) = {
            let wh = window.window_handle().map_err(|e| e.to_string())?;
            let dh = window.display_handle().map_err(|e| e.to_string())?;
            (wh.as_raw(), dh.as_raw())
        };
        pollster::block_on(Self::from_raw_handles_async(raw_window, raw_display))
    }

    async fn from_raw_handles_async(
        raw_window_handle: raw_window_handle::RawWindowHandle,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<Self, String> {
        let instance = wgpu::Instance::default();
        let target = SurfaceTargetUnsafe::RawHandle {
            raw_window_handle,
            raw_display_handle,
        };
        let surface = unsafe { instance.create_surface_unsafe(target).map_err(|e| e.to_string())? };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or("No adapter")?;
        log::info!("window adapter: {}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .map_err(|e| e.to_string())?;
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .first()
            .copied()
            .unwrap_or(wgpu::TextureFormat::Rgba8Unorm);
        let config = RendererConfig {
            swapchain_format: format,
            ..RendererConfig::default()
        };
        let plugin = MockupPlugin::new_with_config(device, queue, config)?;
        drop(surface);
        Ok(Self { instance, plugin })
    }

    fn surface_config(format: wgpu::TextureFormat, width: u32, height: u32) -> wgpu::SurfaceConfiguration {
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            // The present pass writes linear values; view the swapchain through its sRGB variant.
            view_formats: if format.add_srgb_suffix() == format { vec![] } else { vec![format.add_srgb_suffix()] },
            desired_maximum_frame_latency: 2,
        }
    }
}

impl RenderBackend for MockupWindowBackend {
    fn configure_surface(&mut self, width: u32, height: u32) -> Result<(), String> {
        self.plugin.configure_surface(width, height)
    }
    fn release_surface(&mut self) {
        self.plugin.release_surface()
    }
    fn surface_size(&self) -> Option<(u32, u32)> {
        self.plugin.surface_size()
    }
    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, String> {
        self.plugin.create_mesh(mesh)
    }
    fn release_mesh(&mut self, id: MeshId) {
        self.plugin.release_mesh(id)
    }
    fn create_texture(&mut self, texture: &TextureData) -> Result<TextureId, String> {
        self.plugin.create_texture(texture)
    }
    fn release_texture(&mut self, id: TextureId) {
        self.plugin.release_texture(id)
    }
    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId, String> {
        self.plugin.create_material(desc)
    }
    fn update_material(&mut self, id: MaterialId, desc: &MaterialDesc) -> Result<(), String> {
        self.plugin.update_material(id, desc)
    }
    fn release_material(&mut self, id: MaterialId) {
        self.plugin.release_material(id)
    }
    fn render_frame(&mut self, view: &FrameView, draws: &[DrawItem]) -> Result<(), String> {
        self.plugin.render_frame(view, draws)
    }
    fn read_surface(&mut self) -> Result<SurfacePixels, String> {
        self.plugin.read_surface()
    }
    fn resource_counts(&self) -> ResourceCounts {
        self.plugin.resource_counts()
    }
}

impl RenderBackendWindow for MockupWindowBackend {
    fn present_to_window(
        &mut self,
        window_size: (u32, u32),
        raw_window_handle: raw_window_handle::RawWindowHandle,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<(), String> {
        let target = SurfaceTargetUnsafe::RawHandle {
            raw_window_handle,
            raw_display_handle,
        };
        let surface = unsafe {
            self.instance
                .create_surface_unsafe(target)
                .map_err(|e| e.to_string())?
        };
        let (width, height) = window_size;
        let swapchain_format = self.plugin.renderer().config().swapchain_format;
        let config = Self::surface_config(swapchain_format, width.max(1), height.max(1));
        surface.configure(self.plugin.device(), &config);

        let frame = match surface.get_current_texture() {
            Ok(f) => f,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                surface.configure(self.plugin.device(), &config);
                surface.get_current_texture().map_err(|e| e.to_string())?
            }
            Err(wgpu::SurfaceError::Timeout) => return Err("Surface get_current_texture timeout".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        let output = frame.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(swapchain_format.add_srgb_suffix()),
            ..Default::default()
        });
        let mut encoder = self.plugin.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mockup_window_present"),
        });
        self.plugin.renderer().encode_present_to(&mut encoder, &output)?;
        self.plugin.queue().submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
