//! Scene context: camera, orbit controls, hemisphere light, render surface and the resident asset.
//! All backend resources the viewer creates are owned here and released in [`SceneContext::teardown`].

use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3};
use render_api::{
    DrawItem, FrameView, HemisphereLight, MaterialDesc, MaterialId, MeshId, RenderBackend, TextureData, TextureId,
};

use crate::arena::{Arena, Handle};
use crate::asset::LoadedAsset;
use crate::camera::PerspectiveCamera;
use crate::config::ViewerConfig;
use crate::controls::OrbitControls;
use crate::error::{CustomizeError, InitError, LoadError};
use crate::normalize::NormalizedPlacement;

/// Host container the render surface is inserted into.
pub trait MountTarget: Send {
    fn device_pixel_ratio(&self) -> f32;

    /// Insert the surface; fails when the container is unavailable.
    fn attach(&mut self, surface: &RenderSurface) -> Result<(), String>;

    fn detach(&mut self);
}

#[derive(Debug, Default)]
struct HeadlessTargetState {
    attached: Option<(u32, u32)>,
    attach_count: usize,
    detach_count: usize,
}

/// In-process mount target. Clones share state so a host (or test) can observe attach/detach
/// after handing one clone to the viewer.
#[derive(Clone, Debug)]
pub struct HeadlessTarget {
    device_pixel_ratio: f32,
    available: bool,
    state: Arc<Mutex<HeadlessTargetState>>,
}

impl HeadlessTarget {
    pub fn new(device_pixel_ratio: f32) -> Self {
        Self { device_pixel_ratio, available: true, state: Arc::default() }
    }

    /// A target whose container has gone away; `attach` fails.
    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new(1.0) }
    }

    /// Backing size of the attached surface.
    pub fn attached(&self) -> Option<(u32, u32)> {
        self.state.lock().map(|s| s.attached).unwrap_or(None)
    }

    pub fn attach_count(&self) -> usize {
        self.state.lock().map(|s| s.attach_count).unwrap_or(0)
    }

    pub fn detach_count(&self) -> usize {
        self.state.lock().map(|s| s.detach_count).unwrap_or(0)
    }
}

impl MountTarget for HeadlessTarget {
    fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn attach(&mut self, surface: &RenderSurface) -> Result<(), String> {
        if !self.available {
            return Err("container is not available".to_string());
        }
        let mut state = self.state.lock().map_err(|_| "target state poisoned".to_string())?;
        state.attached = Some(surface.backing_size());
        state.attach_count += 1;
        Ok(())
    }

    fn detach(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if state.attached.take().is_some() {
                state.detach_count += 1;
            }
        }
    }
}

/// Fixed logical size; the device pixel ratio only changes the backing resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSurface {
    pub logical_width: u32,
    pub logical_height: u32,
    pub device_pixel_ratio: f32,
}

impl RenderSurface {
    pub fn backing_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.device_pixel_ratio).round() as u32).max(1);
        (scale(self.logical_width), scale(self.logical_height))
    }

    pub fn aspect(&self) -> f32 {
        self.logical_width as f32 / self.logical_height as f32
    }
}

/// A backend material plus the map texture it owns.
#[derive(Clone, Debug)]
pub struct MaterialEntry {
    pub id: MaterialId,
    pub name: String,
    pub desc: MaterialDesc,
    /// Released together with the material, or when replaced.
    pub owned_map: Option<TextureId>,
}

#[derive(Clone, Debug)]
struct ResidentMesh {
    name: String,
    mesh: MeshId,
    material: Handle<MaterialEntry>,
    /// Asset-local transform; the root offset is applied at draw time.
    transform: Mat4,
}

#[derive(Clone, Debug)]
struct ResidentAsset {
    name: String,
    root_offset: Vec3,
    meshes: Vec<ResidentMesh>,
}

pub struct SceneContext {
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub light: HemisphereLight,
    /// Linear RGBA.
    pub clear_color: [f32; 4],
    surface: RenderSurface,
    materials: Arena<MaterialEntry>,
    resident: Option<ResidentAsset>,
    target: Box<dyn MountTarget>,
}

impl SceneContext {
    /// Configure the render surface and insert it into `target`. Nothing stays allocated on failure.
    pub fn initialize<B: RenderBackend>(
        backend: &mut B,
        config: &ViewerConfig,
        mut target: Box<dyn MountTarget>,
    ) -> Result<Self, InitError> {
        let dpr = target.device_pixel_ratio();
        if !(dpr.is_finite() && dpr > 0.0) {
            return Err(InitError::InvalidPixelRatio(dpr));
        }
        let surface = RenderSurface {
            logical_width: config.surface.width,
            logical_height: config.surface.height,
            device_pixel_ratio: dpr,
        };
        let (width, height) = surface.backing_size();
        backend.configure_surface(width, height).map_err(InitError::Surface)?;
        if let Err(e) = target.attach(&surface) {
            backend.release_surface();
            return Err(InitError::TargetUnavailable(e));
        }

        let camera = PerspectiveCamera::from_config(&config.camera, surface.aspect());
        let controls = OrbitControls::new(&camera);
        let light = HemisphereLight {
            sky_color: config.light.sky.to_linear(),
            ground_color: config.light.ground.to_linear(),
            intensity: config.light.intensity,
        };
        log::info!("scene initialized: surface {}x{} (dpr {})", width, height, dpr);
        Ok(Self {
            camera,
            controls,
            light,
            clear_color: config.clear_color.to_linear_rgba(config.clear_alpha),
            surface,
            materials: Arena::new(),
            resident: None,
            target,
        })
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn has_asset(&self) -> bool {
        self.resident.is_some()
    }

    pub fn asset_name(&self) -> Option<&str> {
        self.resident.as_ref().map(|r| r.name.as_str())
    }

    pub fn root_offset(&self) -> Option<Vec3> {
        self.resident.as_ref().map(|r| r.root_offset)
    }

    pub fn mesh_names(&self) -> Vec<&str> {
        self.resident
            .as_ref()
            .map(|r| r.meshes.iter().map(|m| m.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Material of the first resident mesh with this name, in traversal order.
    pub fn find_surface(&self, mesh_name: &str) -> Option<Handle<MaterialEntry>> {
        let resident = self.resident.as_ref()?;
        resident.meshes.iter().find(|m| m.name == mesh_name).map(|m| m.material)
    }

    pub fn material(&self, handle: Handle<MaterialEntry>) -> Option<&MaterialEntry> {
        self.materials.get(handle)
    }

    /// Upload a normalized asset. Any previous asset is released first; a failed upload releases
    /// whatever it created and leaves the scene empty.
    pub fn install_asset<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        asset: LoadedAsset,
        placement: &NormalizedPlacement,
    ) -> Result<(), LoadError> {
        self.discard_asset(backend);
        let mut created_meshes = Vec::new();
        let mut handles = Vec::new();
        let result = self.upload(backend, &asset, &mut created_meshes, &mut handles);
        match result {
            Ok(()) => {
                let meshes: Vec<ResidentMesh> = asset
                    .nodes
                    .into_iter()
                    .zip(created_meshes)
                    .map(|(node, mesh)| ResidentMesh {
                        name: node.name,
                        mesh,
                        material: handles[node.material],
                        transform: node.transform,
                    })
                    .collect();
                log::info!("installed {} ({} meshes, {} materials)", asset.name, meshes.len(), handles.len());
                self.resident = Some(ResidentAsset { name: asset.name, root_offset: placement.root_offset, meshes });
                Ok(())
            }
            Err(e) => {
                for mesh in created_meshes {
                    backend.release_mesh(mesh);
                }
                for handle in handles {
                    if let Some(entry) = self.materials.remove(handle) {
                        release_material(backend, entry);
                    }
                }
                Err(LoadError::Upload(e))
            }
        }
    }

    fn upload<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        asset: &LoadedAsset,
        created_meshes: &mut Vec<MeshId>,
        handles: &mut Vec<Handle<MaterialEntry>>,
    ) -> Result<(), String> {
        for source in &asset.materials {
            let owned_map = match &source.base_color_map {
                Some(texture) => Some(backend.create_texture(texture)?),
                None => None,
            };
            let desc = MaterialDesc {
                base_color: source.base_color,
                base_color_map: owned_map,
                alpha_mode: source.alpha_mode,
            };
            let id = match backend.create_material(&desc) {
                Ok(id) => id,
                Err(e) => {
                    if let Some(t) = owned_map {
                        backend.release_texture(t);
                    }
                    return Err(e);
                }
            };
            handles.push(self.materials.insert(MaterialEntry { id, name: source.name.clone(), desc, owned_map }));
        }
        for node in &asset.nodes {
            if node.material >= handles.len() {
                return Err(format!("{} references missing material {}", node.name, node.material));
            }
            created_meshes.push(backend.create_mesh(&node.mesh)?);
        }
        Ok(())
    }

    /// Release the resident asset and every material it owns. All surface handles go stale.
    pub fn discard_asset<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(resident) = self.resident.take() {
            for mesh in &resident.meshes {
                backend.release_mesh(mesh.mesh);
            }
            log::debug!("discarded {}", resident.name);
        }
        for entry in self.materials.drain() {
            release_material(backend, entry);
        }
    }

    /// Replace a material's color map with a new texture, releasing the one it owned.
    pub fn set_color_map<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        handle: Handle<MaterialEntry>,
        texture: &TextureData,
    ) -> Result<TextureId, CustomizeError> {
        let entry = self.materials.get_mut(handle).ok_or(CustomizeError::Stale)?;
        let new_map = backend.create_texture(texture).map_err(CustomizeError::Backend)?;
        let desc = MaterialDesc { base_color_map: Some(new_map), ..entry.desc };
        if let Err(e) = backend.update_material(entry.id, &desc) {
            backend.release_texture(new_map);
            return Err(CustomizeError::Backend(e));
        }
        if let Some(old) = entry.owned_map.replace(new_map) {
            backend.release_texture(old);
        }
        entry.desc = desc;
        Ok(new_map)
    }

    /// Overwrite a material's base color in place (linear RGB, alpha kept).
    pub fn set_base_color<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        handle: Handle<MaterialEntry>,
        rgb: [f32; 3],
    ) -> Result<(), CustomizeError> {
        let entry = self.materials.get_mut(handle).ok_or(CustomizeError::Stale)?;
        let desc = MaterialDesc { base_color: [rgb[0], rgb[1], rgb[2], entry.desc.base_color[3]], ..entry.desc };
        backend.update_material(entry.id, &desc).map_err(CustomizeError::Backend)?;
        entry.desc = desc;
        Ok(())
    }

    /// Advance the orbit controller by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.controls.update(&mut self.camera, dt);
    }

    pub fn frame_view(&self) -> FrameView {
        FrameView {
            view_proj: self.camera.view_proj().to_cols_array(),
            hemisphere: self.light,
            clear_color: self.clear_color,
        }
    }

    pub fn draw_items(&self) -> Vec<DrawItem> {
        let Some(resident) = self.resident.as_ref() else {
            return Vec::new();
        };
        let root = Mat4::from_translation(resident.root_offset);
        resident
            .meshes
            .iter()
            .filter_map(|m| {
                let entry = self.materials.get(m.material)?;
                Some(DrawItem { mesh: m.mesh, material: entry.id, transform: (root * m.transform).to_cols_array() })
            })
            .collect()
    }

    pub fn render<B: RenderBackend>(&self, backend: &mut B) -> Result<(), String> {
        backend.render_frame(&self.frame_view(), &self.draw_items())
    }

    /// Release everything this scene created and remove the surface from its container.
    pub fn teardown<B: RenderBackend>(mut self, backend: &mut B) {
        self.discard_asset(backend);
        backend.release_surface();
        self.target.detach();
        log::info!("scene torn down");
    }
}

fn release_material<B: RenderBackend>(backend: &mut B, entry: MaterialEntry) {
    backend.release_material(entry.id);
    if let Some(map) = entry.owned_map {
        backend.release_texture(map);
    }
}
