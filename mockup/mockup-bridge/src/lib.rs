//! Mockup bridge: implements render_api::RenderBackend using mockup-renderer.

mod plugin;
mod window_backend;

pub use plugin::MockupPlugin;
pub use window_backend::MockupWindowBackend;
