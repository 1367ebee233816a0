//! Trait for render backends (wgpu offscreen, window, headless). The viewer uses this to create
//! resources and render frames uniformly.

use crate::extract::{DrawItem, FrameView};
use crate::resources::{
    MaterialDesc, MaterialId, MeshData, MeshId, ResourceCounts, SurfacePixels, TextureData, TextureId,
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Render backend that the viewer can use regardless of implementation.
///
/// All calls happen on the render timeline. Ids are only meaningful to the backend that issued
/// them; releasing an unknown id is a no-op.
pub trait RenderBackend: Send {
    /// Create (or resize) the render surface at its backing resolution in physical pixels.
    fn configure_surface(&mut self, width: u32, height: u32) -> Result<(), String>;

    /// Drop the render surface and its depth buffer.
    fn release_surface(&mut self);

    fn surface_size(&self) -> Option<(u32, u32)>;

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, String>;

    fn release_mesh(&mut self, id: MeshId);

    fn create_texture(&mut self, texture: &TextureData) -> Result<TextureId, String>;

    fn release_texture(&mut self, id: TextureId);

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId, String>;

    /// Overwrite a material's parameters in place.
    fn update_material(&mut self, id: MaterialId, desc: &MaterialDesc) -> Result<(), String>;

    fn release_material(&mut self, id: MaterialId);

    /// Draw one frame into the render surface. Submits work internally.
    fn render_frame(&mut self, view: &FrameView, draws: &[DrawItem]) -> Result<(), String>;

    /// Copy the render surface's current pixels into a standalone buffer.
    fn read_surface(&mut self) -> Result<SurfacePixels, String>;

    fn resource_counts(&self) -> ResourceCounts;
}

/// Extension for backends that can show the render surface in a window. Host passes raw handles
/// (e.g. from winit); the backend owns the swapchain and performs get_current_texture + present.
pub trait RenderBackendWindow: RenderBackend {
    /// Blit the last rendered surface to the window identified by the raw handles.
    fn present_to_window(
        &mut self,
        window_size: (u32, u32),
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), String>;
}
