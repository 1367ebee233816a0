//! Minimal wgpu init (no window). Verifies mockup-renderer and wgpu work, then renders and reads
//! back one empty frame through the offscreen backend.

use render_api::{FrameView, RenderBackend};

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let (device, queue) = pollster::block_on(request_device())?;
    let _renderer = mockup_renderer::Renderer::new(device, queue)?;
    log::info!("renderer: OK");

    let mut backend = mockup_bridge::MockupPlugin::new_offscreen()?;
    backend.configure_surface(64, 64)?;
    backend.render_frame(&FrameView::default(), &[])?;
    let pixels = backend.read_surface()?;
    if pixels.rgba.len() != 64 * 64 * 4 {
        return Err(format!("readback returned {} bytes", pixels.rgba.len()));
    }
    backend.release_surface();
    log::info!("offscreen frame + readback: OK ({:?})", backend.resource_counts());
    Ok(())
}

async fn request_device() -> Result<(wgpu::Device, wgpu::Queue), String> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .ok_or("No adapter")?;
    log::info!("adapter: {}", adapter.get_info().name);
    adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .map_err(|e| e.to_string())
}
