//! CPU render backend. Tracks every live resource so tests can assert nothing leaks, and
//! rasterizes draws (depth-tested, hemisphere-shaded, base color x nearest-sampled map, alpha per the
//! material's alpha mode) so exports show the model without a GPU.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use render_api::{
    ColorSpace, DrawItem, FrameView, MaterialDesc, MaterialId, MeshData, MeshId, RenderBackend, ResourceCounts,
    SurfacePixels, TextureData, TextureId,
};

use crate::color::{linear_to_srgb_u8, srgb_to_linear};

const MAX_SURFACE_SIZE: u32 = 8192;
const MAX_TEXTURE_SIZE: u32 = 8192;

struct Surface {
    width: u32,
    height: u32,
    /// Linear RGBA, straight alpha.
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
}

struct ScreenVertex {
    /// Pixel coordinates, y down.
    pos: Vec2,
    depth: f32,
    inv_w: f32,
    normal: Vec3,
    uv: Vec2,
}

#[derive(Default)]
pub struct HeadlessBackend {
    next_id: u64,
    surface: Option<Surface>,
    meshes: HashMap<u64, MeshData>,
    textures: HashMap<u64, TextureData>,
    materials: HashMap<u64, MaterialDesc>,
    textures_created: usize,
    frames_rendered: u64,
    pending_failures: u32,
    last_draws: Vec<DrawItem>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Make the next `n` calls to `render_frame` fail.
    pub fn inject_render_failures(&mut self, n: u32) {
        self.pending_failures = n;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Textures ever created, including ones since released.
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn last_draws(&self) -> &[DrawItem] {
        &self.last_draws
    }

    pub fn material(&self, id: MaterialId) -> Option<&MaterialDesc> {
        self.materials.get(&id.0)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(&id.0)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(&id.0)
    }

    fn sample(&self, map: Option<TextureId>, uv: Vec2) -> Vec4 {
        let Some(texture) = map.and_then(|id| self.textures.get(&id.0)) else {
            return Vec4::ONE;
        };
        let x = ((uv.x.clamp(0.0, 1.0) * texture.width as f32) as u32).min(texture.width - 1);
        let y = ((uv.y.clamp(0.0, 1.0) * texture.height as f32) as u32).min(texture.height - 1);
        let i = (y as usize * texture.width as usize + x as usize) * 4;
        let texel = &texture.rgba[i..i + 4];
        let channel = |c: u8| match texture.color_space {
            ColorSpace::Srgb => srgb_to_linear(c as f32 / 255.0),
            ColorSpace::Linear => c as f32 / 255.0,
        };
        Vec4::new(channel(texel[0]), channel(texel[1]), channel(texel[2]), texel[3] as f32 / 255.0)
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl RenderBackend for HeadlessBackend {
    fn configure_surface(&mut self, width: u32, height: u32) -> Result<(), String> {
        if width == 0 || height == 0 {
            return Err("surface width and height must be > 0".to_string());
        }
        if width > MAX_SURFACE_SIZE || height > MAX_SURFACE_SIZE {
            return Err(format!("surface {}x{} exceeds max size {}", width, height, MAX_SURFACE_SIZE));
        }
        let len = width as usize * height as usize;
        self.surface = Some(Surface { width, height, color: vec![[0.0; 4]; len], depth: vec![1.0; len] });
        Ok(())
    }

    fn release_surface(&mut self) {
        self.surface = None;
    }

    fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface.as_ref().map(|s| (s.width, s.height))
    }

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, String> {
        if mesh.is_empty() {
            return Err("mesh has no triangles".to_string());
        }
        if let Some(bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
            return Err(format!("index {} out of range for {} vertices", bad, mesh.vertices.len()));
        }
        let id = self.alloc_id();
        self.meshes.insert(id, mesh.clone());
        Ok(MeshId(id))
    }

    fn release_mesh(&mut self, id: MeshId) {
        self.meshes.remove(&id.0);
    }

    fn create_texture(&mut self, texture: &TextureData) -> Result<TextureId, String> {
        texture.validate()?;
        if texture.width > MAX_TEXTURE_SIZE || texture.height > MAX_TEXTURE_SIZE {
            return Err(format!(
                "texture {}x{} exceeds max size {}",
                texture.width, texture.height, MAX_TEXTURE_SIZE
            ));
        }
        let id = self.alloc_id();
        self.textures.insert(id, texture.clone());
        self.textures_created += 1;
        Ok(TextureId(id))
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id.0);
    }

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId, String> {
        if let Some(map) = desc.base_color_map {
            if !self.textures.contains_key(&map.0) {
                return Err(format!("unknown texture {:?}", map));
            }
        }
        let id = self.alloc_id();
        self.materials.insert(id, *desc);
        Ok(MaterialId(id))
    }

    fn update_material(&mut self, id: MaterialId, desc: &MaterialDesc) -> Result<(), String> {
        if let Some(map) = desc.base_color_map {
            if !self.textures.contains_key(&map.0) {
                return Err(format!("unknown texture {:?}", map));
            }
        }
        let slot = self.materials.get_mut(&id.0).ok_or_else(|| format!("unknown material {:?}", id))?;
        *slot = *desc;
        Ok(())
    }

    fn release_material(&mut self, id: MaterialId) {
        self.materials.remove(&id.0);
    }

    fn render_frame(&mut self, view: &FrameView, draws: &[DrawItem]) -> Result<(), String> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err("injected render failure".to_string());
        }
        let mut surface = self.surface.take().ok_or_else(|| "no render surface configured".to_string())?;
        let result = self.rasterize(&mut surface, view, draws);
        self.surface = Some(surface);
        result?;
        self.frames_rendered += 1;
        self.last_draws = draws.to_vec();
        Ok(())
    }

    fn read_surface(&mut self) -> Result<SurfacePixels, String> {
        let surface = self.surface.as_ref().ok_or_else(|| "no render surface configured".to_string())?;
        let mut rgba = Vec::with_capacity(surface.color.len() * 4);
        for px in &surface.color {
            rgba.extend_from_slice(&[
                linear_to_srgb_u8(px[0]),
                linear_to_srgb_u8(px[1]),
                linear_to_srgb_u8(px[2]),
                (px[3].clamp(0.0, 1.0) * 255.0).round() as u8,
            ]);
        }
        Ok(SurfacePixels { width: surface.width, height: surface.height, rgba })
    }

    fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            meshes: self.meshes.len(),
            textures: self.textures.len(),
            materials: self.materials.len(),
            surfaces: usize::from(self.surface.is_some()),
        }
    }
}

impl HeadlessBackend {
    fn rasterize(&self, surface: &mut Surface, view: &FrameView, draws: &[DrawItem]) -> Result<(), String> {
        surface.color.fill(view.clear_color);
        surface.depth.fill(1.0);
        let view_proj = Mat4::from_cols_array(&view.view_proj);
        let sky = Vec3::from(view.hemisphere.sky_color);
        let ground = Vec3::from(view.hemisphere.ground_color);
        let (width, height) = (surface.width as f32, surface.height as f32);

        for draw in draws {
            let mesh = self.meshes.get(&draw.mesh.0).ok_or_else(|| format!("unknown mesh {:?}", draw.mesh))?;
            let material =
                self.materials.get(&draw.material.0).ok_or_else(|| format!("unknown material {:?}", draw.material))?;
            let model = Mat4::from_cols_array(&draw.transform);
            let clip_from_model = view_proj * model;
            let normal_matrix = Mat3::from_mat4(model).inverse().transpose();
            let base = Vec4::from(material.base_color);

            let project = |index: u32| -> Option<ScreenVertex> {
                let v = &mesh.vertices[index as usize];
                let clip = clip_from_model * Vec3::from(v.position).extend(1.0);
                if clip.w <= 0.0 {
                    return None;
                }
                let ndc = clip.truncate() / clip.w;
                Some(ScreenVertex {
                    pos: Vec2::new((ndc.x * 0.5 + 0.5) * width, (0.5 - ndc.y * 0.5) * height),
                    depth: ndc.z,
                    inv_w: 1.0 / clip.w,
                    normal: normal_matrix * Vec3::from(v.normal),
                    uv: Vec2::from(v.uv),
                })
            };

            for tri in mesh.indices.chunks_exact(3) {
                // Triangles crossing the camera plane are skipped rather than clipped.
                let (Some(a), Some(b), Some(c)) = (project(tri[0]), project(tri[1]), project(tri[2])) else {
                    continue;
                };
                let area = edge(a.pos, b.pos, c.pos);
                if area.abs() < f32::EPSILON || !area.is_finite() {
                    continue;
                }
                let min = a.pos.min(b.pos).min(c.pos).max(Vec2::ZERO);
                let max = a.pos.max(b.pos).max(c.pos).min(Vec2::new(width - 1.0, height - 1.0));
                if min.x > max.x || min.y > max.y {
                    continue;
                }
                for y in min.y.floor() as u32..=max.y.ceil().min(height - 1.0) as u32 {
                    for x in min.x.floor() as u32..=max.x.ceil().min(width - 1.0) as u32 {
                        let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                        let w0 = edge(b.pos, c.pos, p) / area;
                        let w1 = edge(c.pos, a.pos, p) / area;
                        let w2 = edge(a.pos, b.pos, p) / area;
                        if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                            continue;
                        }
                        let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
                        let i = y as usize * surface.width as usize + x as usize;
                        if !(0.0..=1.0).contains(&depth) || depth > surface.depth[i] {
                            continue;
                        }
                        // Perspective-correct attributes.
                        let (p0, p1, p2) = (w0 * a.inv_w, w1 * b.inv_w, w2 * c.inv_w);
                        let sum = p0 + p1 + p2;
                        let uv = (a.uv * p0 + b.uv * p1 + c.uv * p2) / sum;
                        let n = ((a.normal * p0 + b.normal * p1 + c.normal * p2) / sum).normalize_or_zero();

                        let hemi = ground.lerp(sky, 0.5 * n.y + 0.5) * view.hemisphere.intensity;
                        let src = base * self.sample(material.base_color_map, uv);
                        let rgb = hemi * src.truncate();
                        let Some(alpha) = material.alpha_mode.resolve(src.w) else {
                            continue;
                        };

                        let dst = surface.color[i];
                        let blend = |s: f32, d: f32| s * alpha + d * (1.0 - alpha);
                        surface.color[i] = [
                            blend(rgb.x, dst[0]),
                            blend(rgb.y, dst[1]),
                            blend(rgb.z, dst[2]),
                            alpha + dst[3] * (1.0 - alpha),
                        ];
                        surface.depth[i] = depth;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_api::{AlphaMode, HemisphereLight, Vertex, IDENTITY};

    fn quad() -> MeshData {
        let v = |x: f32, y: f32, u: f32, t: f32| Vertex { position: [x, y, 0.5], normal: [0.0, 1.0, 0.0], uv: [u, t] };
        MeshData {
            vertices: vec![v(-1.0, -1.0, 0.0, 1.0), v(1.0, -1.0, 1.0, 1.0), v(1.0, 1.0, 1.0, 0.0), v(-1.0, 1.0, 0.0, 0.0)],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    fn lit_view(clear_alpha: f32) -> FrameView {
        FrameView {
            view_proj: IDENTITY,
            hemisphere: HemisphereLight { sky_color: [1.0; 3], ground_color: [1.0; 3], intensity: 1.0 },
            clear_color: [0.0, 0.0, 0.0, clear_alpha],
        }
    }

    #[test]
    fn counts_track_create_and_release() {
        let mut backend = HeadlessBackend::new();
        backend.configure_surface(4, 4).unwrap();
        let mesh = backend.create_mesh(&quad()).unwrap();
        let tex = backend
            .create_texture(&TextureData { rgba: vec![255; 4], width: 1, height: 1, color_space: ColorSpace::Srgb })
            .unwrap();
        let mat = backend.create_material(&MaterialDesc { base_color_map: Some(tex), ..Default::default() }).unwrap();
        assert_eq!(backend.resource_counts(), ResourceCounts { meshes: 1, textures: 1, materials: 1, surfaces: 1 });
        backend.release_material(mat);
        backend.release_texture(tex);
        backend.release_mesh(mesh);
        backend.release_surface();
        assert_eq!(backend.resource_counts().total(), 0);
        // Unknown ids are ignored.
        backend.release_mesh(mesh);
    }

    #[test]
    fn fullscreen_quad_covers_surface_with_map_color() {
        let mut backend = HeadlessBackend::new();
        backend.configure_surface(8, 8).unwrap();
        let mesh = backend.create_mesh(&quad()).unwrap();
        let tex = backend
            .create_texture(&TextureData { rgba: vec![255, 0, 0, 255], width: 1, height: 1, color_space: ColorSpace::Srgb })
            .unwrap();
        let mat = backend.create_material(&MaterialDesc { base_color_map: Some(tex), ..Default::default() }).unwrap();
        let draws = [DrawItem { mesh, material: mat, transform: IDENTITY }];
        backend.render_frame(&lit_view(0.0), &draws).unwrap();
        let pixels = backend.read_surface().unwrap();
        assert_eq!((pixels.width, pixels.height), (8, 8));
        for px in pixels.rgba.chunks_exact(4) {
            assert_eq!(px, &[255, 0, 0, 255]);
        }
    }

    fn render_transparent_texel(alpha_mode: AlphaMode) -> Vec<u8> {
        let mut backend = HeadlessBackend::new();
        backend.configure_surface(4, 4).unwrap();
        let mesh = backend.create_mesh(&quad()).unwrap();
        let tex = backend
            .create_texture(&TextureData { rgba: vec![255, 0, 0, 0], width: 1, height: 1, color_space: ColorSpace::Srgb })
            .unwrap();
        let mat = backend
            .create_material(&MaterialDesc { base_color_map: Some(tex), alpha_mode, ..Default::default() })
            .unwrap();
        let draws = [DrawItem { mesh, material: mat, transform: IDENTITY }];
        backend.render_frame(&lit_view(0.0), &draws).unwrap();
        backend.read_surface().unwrap().rgba
    }

    #[test]
    fn alpha_mode_decides_how_texel_alpha_reaches_the_surface() {
        let opaque = render_transparent_texel(AlphaMode::Opaque);
        assert!(opaque.chunks_exact(4).all(|px| px == [255, 0, 0, 255]));

        let masked = render_transparent_texel(AlphaMode::Mask { cutoff: 0.5 });
        assert!(masked.chunks_exact(4).all(|px| px[3] == 0));

        let blended = render_transparent_texel(AlphaMode::Blend);
        assert!(blended.chunks_exact(4).all(|px| px[3] == 0));
    }

    #[test]
    fn empty_frame_keeps_clear_alpha() {
        let mut backend = HeadlessBackend::new();
        backend.configure_surface(2, 2).unwrap();
        backend.render_frame(&lit_view(0.0), &[]).unwrap();
        let pixels = backend.read_surface().unwrap();
        assert!(pixels.rgba.chunks_exact(4).all(|px| px[3] == 0));
    }

    #[test]
    fn injected_failures_are_consumed() {
        let mut backend = HeadlessBackend::new();
        backend.configure_surface(2, 2).unwrap();
        backend.inject_render_failures(2);
        assert!(backend.render_frame(&lit_view(1.0), &[]).is_err());
        assert!(backend.render_frame(&lit_view(1.0), &[]).is_err());
        assert!(backend.render_frame(&lit_view(1.0), &[]).is_ok());
        assert_eq!(backend.frames_rendered(), 1);
    }

    #[test]
    fn rejects_unknown_ids_and_bad_textures() {
        let mut backend = HeadlessBackend::new();
        assert!(backend.update_material(MaterialId(7), &MaterialDesc::default()).is_err());
        assert!(backend
            .create_material(&MaterialDesc { base_color_map: Some(TextureId(3)), ..Default::default() })
            .is_err());
        assert!(backend
            .create_texture(&TextureData { rgba: vec![0; 3], width: 1, height: 1, color_space: ColorSpace::Srgb })
            .is_err());
        assert!(backend.render_frame(&lit_view(1.0), &[]).is_err());
    }
}
