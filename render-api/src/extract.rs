//! Per-frame data extracted from the viewer's scene into the render world.
//! The viewer fills these each tick; backends only read them.

use crate::resources::{MaterialId, MeshId};

/// Column-major 4x4 identity.
pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// One mesh instance to draw this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshId,
    pub material: MaterialId,
    /// World transform: column-major 4x4 matrix (WGSL/wgpu convention).
    /// Index [col*4+row]; e.g. m[0..4] is the first column.
    pub transform: [f32; 16],
}

/// Sky/ground ambient light. Colors are linear RGB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: [f32; 3],
    pub ground_color: [f32; 3],
    pub intensity: f32,
}

impl Default for HemisphereLight {
    fn default() -> Self {
        Self {
            sky_color: [1.0, 1.0, 1.0],
            ground_color: [0.016, 0.016, 0.016],
            intensity: 1.0,
        }
    }
}

/// View/camera data for the current frame.
#[derive(Clone, Debug)]
pub struct FrameView {
    /// Projection * view, column-major, WebGPU NDC (z in [0,1]).
    pub view_proj: [f32; 16],
    pub hemisphere: HemisphereLight,
    /// Linear RGBA; alpha 0 keeps the background transparent in readbacks.
    pub clear_color: [f32; 4],
}

impl Default for FrameView {
    fn default() -> Self {
        Self {
            view_proj: IDENTITY,
            hemisphere: HemisphereLight::default(),
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}
