//! Mug mockup viewer core.
//!
//! A mounted [`Viewer`] owns one [`SceneContext`] (camera, orbit controls, hemisphere light, render
//! surface), loads a single product asset off the render timeline, normalizes it so any source
//! scale frames identically, binds two named surfaces to live customization channels (image decal
//! and solid tint), ticks a cancellable render loop and exports the current view as PNG.
//! Rendering goes through [`render_api::RenderBackend`]; [`HeadlessBackend`] is the in-process CPU
//! implementation used by tests and the headless CLI.

pub mod arena;
pub mod asset;
pub mod camera;
pub mod color;
pub mod config;
pub mod controls;
pub mod customize;
pub mod error;
pub mod export;
pub mod headless;
pub mod normalize;
pub mod render_loop;
pub mod scene;
pub mod task;
pub mod timeline;
pub mod viewer;

pub use arena::{Arena, Handle};
pub use asset::{AssetLoader, AssetSource, LoadedAsset, MeshNode, PendingLoad, SourceMaterial, BUNDLED_MUG};
pub use camera::PerspectiveCamera;
pub use color::Color;
pub use config::{CameraConfig, ControlsConfig, LightConfig, SurfaceBindings, SurfaceConfig, ViewerConfig};
pub use controls::{ControlInput, OrbitControls};
pub use customize::{ChannelState, Customization, SurfaceRole};
pub use error::{
    ColorParseError, ConfigError, CustomizeError, ExportError, InitError, LoadError, NormalizationError, ViewerError,
};
pub use export::{encode_png, ExportedImage};
pub use headless::HeadlessBackend;
pub use normalize::{compute_bounds, normalize, Aabb, NormalizedPlacement};
pub use render_loop::{CancelToken, FixedRefresh, RefreshSignal, RenderLoop, TickOutcome};
pub use scene::{HeadlessTarget, MaterialEntry, MountTarget, RenderSurface, SceneContext};
pub use timeline::ViewerThread;
pub use viewer::{LoadStatus, Viewer};
