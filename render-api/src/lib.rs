//! Shared render backend API for the mockup viewer.
//! Defines resource and per-frame extract types plus the RenderBackend trait, so the viewer core
//! drives the wgpu backend, the window backend and the headless backend through one code path
//! (create resources + render_frame + read_surface).

mod backend;
mod extract;
mod resources;

pub use backend::{RenderBackend, RenderBackendWindow};
pub use extract::{DrawItem, FrameView, HemisphereLight, IDENTITY};
pub use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
pub use resources::{
    AlphaMode, ColorSpace, MaterialDesc, MaterialId, MeshData, MeshId, ResourceCounts, SurfacePixels, TextureData,
    TextureId, Vertex,
};
