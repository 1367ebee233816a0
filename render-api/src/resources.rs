//! GPU resource descriptions and the ids backends hand out for them.

/// Backend-issued id for an uploaded mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

/// Backend-issued id for an uploaded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Backend-issued id for a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

/// Interleaved vertex: position, normal, uv. 32-byte stride, matches the forward pipeline layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Triangle list geometry in model space.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// How texel values are interpreted when sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSpace {
    /// Color images (decals, base-color maps): decoded sRGB -> linear on sample.
    #[default]
    Srgb,
    /// Data textures, sampled as stored.
    Linear,
}

/// Tightly packed RGBA8 texels, row-major from the top-left texel.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
}

impl TextureData {
    /// Check the buffer length against the dimensions.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("texture must be non-empty, got {}x{}", self.width, self.height));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.rgba.len() != expected {
            return Err(format!(
                "texture data is {} bytes, expected {} for {}x{} RGBA8",
                self.rgba.len(),
                expected,
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

/// How the alpha of `base_color * sample(base_color_map)` reaches the render surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AlphaMode {
    /// Alpha is ignored; the surface is written with alpha 1.
    #[default]
    Opaque,
    /// Fragments below the cutoff are discarded, the rest are opaque.
    Mask { cutoff: f32 },
    /// Straight-alpha blend over what is already in the target.
    Blend,
}

impl AlphaMode {
    /// Default cutoff for `Mask` when the asset does not give one.
    pub const DEFAULT_CUTOFF: f32 = 0.5;

    /// Alpha written for a fragment of coverage `alpha`, or None when the fragment is discarded.
    pub fn resolve(self, alpha: f32) -> Option<f32> {
        match self {
            AlphaMode::Opaque => Some(1.0),
            AlphaMode::Mask { cutoff } if alpha < cutoff => None,
            AlphaMode::Mask { .. } => Some(1.0),
            AlphaMode::Blend => Some(alpha.clamp(0.0, 1.0)),
        }
    }

    /// `[mode, cutoff]` as packed into the forward material uniform.
    pub fn shader_params(self) -> [f32; 2] {
        match self {
            AlphaMode::Opaque => [0.0, 0.0],
            AlphaMode::Mask { cutoff } => [1.0, cutoff],
            AlphaMode::Blend => [2.0, 0.0],
        }
    }
}

/// Unlit-color inputs of the forward material: `base_color * sample(base_color_map)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialDesc {
    /// Linear RGBA.
    pub base_color: [f32; 4],
    /// When None the backend samples a 1x1 white texel.
    pub base_color_map: Option<TextureId>,
    pub alpha_mode: AlphaMode,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_map: None,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

/// Live resource counts, used to assert that nothing leaks across mount cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub meshes: usize,
    pub textures: usize,
    pub materials: usize,
    pub surfaces: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.meshes + self.textures + self.materials + self.surfaces
    }
}

/// Render surface contents copied out after a frame: tight RGBA8 rows, sRGB-encoded, straight alpha.
#[derive(Clone, Debug)]
pub struct SurfacePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_and_mask_write_full_alpha() {
        assert_eq!(AlphaMode::Opaque.resolve(0.0), Some(1.0));
        let mask = AlphaMode::Mask { cutoff: AlphaMode::DEFAULT_CUTOFF };
        assert_eq!(mask.resolve(0.2), None);
        assert_eq!(mask.resolve(0.7), Some(1.0));
        assert_eq!(AlphaMode::Blend.resolve(0.25), Some(0.25));
    }
}
