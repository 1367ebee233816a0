//! Mockup plugin: implements RenderBackend on top of the wgpu renderer.

use std::collections::HashMap;
use std::sync::Arc;

use mockup_renderer::{FrameUniforms, MeshDraw, Renderer, RendererConfig};
use render_api::{
    ColorSpace, DrawItem, FrameView, MaterialDesc, MaterialId, MeshData, MeshId, RenderBackend, ResourceCounts,
    SurfacePixels, TextureData, TextureId,
};

struct GpuMesh {
    vertex_buf: Arc<wgpu::Buffer>,
    index_buf: Arc<wgpu::Buffer>,
    index_count: u32,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: Arc<wgpu::TextureView>,
}

/// Owns the wgpu device/queue (through the renderer) and every resource the viewer created.
pub struct MockupPlugin {
    renderer: Renderer,
    next_id: u64,
    meshes: HashMap<u64, GpuMesh>,
    textures: HashMap<u64, GpuTexture>,
    materials: HashMap<u64, MaterialDesc>,
}

impl MockupPlugin {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, String> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    pub fn new_with_config(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self, String> {
        let renderer = Renderer::new_with_config(device, queue, config)?;
        Ok(Self {
            renderer,
            next_id: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
        })
    }

    /// Headless device with no surface; used for exports and tests on machines with a GPU.
    pub fn new_offscreen() -> Result<Self, String> {
        let (device, queue) = pollster::block_on(Self::request_offscreen_device())?;
        Self::new(device, queue)
    }

    async fn request_offscreen_device() -> Result<(wgpu::Device, wgpu::Queue), String> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or("No adapter")?;
        log::info!("offscreen adapter: {}", adapter.get_info().name);
        adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .map_err(|e| e.to_string())
    }

    pub fn device(&self) -> &wgpu::Device {
        self.renderer.device()
    }
    pub fn queue(&self) -> &wgpu::Queue {
        self.renderer.queue()
    }
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    fn issue_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_map(&self, desc: &MaterialDesc) -> Result<(), String> {
        match desc.base_color_map {
            Some(TextureId(t)) if !self.textures.contains_key(&t) => Err(format!("material references unknown texture {}", t)),
            _ => Ok(()),
        }
    }

    fn collect_draws(&self, draws: &[DrawItem]) -> Result<Vec<MeshDraw>, String> {
        draws
            .iter()
            .map(|item| {
                let mesh = self.meshes.get(&item.mesh.0).ok_or_else(|| format!("unknown mesh {}", item.mesh.0))?;
                let material = self
                    .materials
                    .get(&item.material.0)
                    .ok_or_else(|| format!("unknown material {}", item.material.0))?;
                let base_color_map = match material.base_color_map {
                    Some(TextureId(t)) => self
                        .textures
                        .get(&t)
                        .map(|tex| Arc::clone(&tex.view))
                        .ok_or_else(|| format!("unknown texture {}", t))?,
                    None => self.renderer.fallback_map(),
                };
                Ok(MeshDraw {
                    vertex_buf: Arc::clone(&mesh.vertex_buf),
                    index_buf: Arc::clone(&mesh.index_buf),
                    index_count: mesh.index_count,
                    transform: item.transform,
                    base_color: material.base_color,
                    base_color_map,
                    alpha: material.alpha_mode.shader_params(),
                })
            })
            .collect()
    }

    /// Encode the frame and, when given, the present blit into one submission.
    pub(crate) fn render_frame_impl(
        &mut self,
        view: &FrameView,
        draws: &[DrawItem],
        swapchain_view: Option<&wgpu::TextureView>,
    ) -> Result<(), String> {
        let meshes = self.collect_draws(draws)?;
        let h = view.hemisphere;
        let frame = FrameUniforms {
            view_proj: view.view_proj,
            sky: [h.sky_color[0], h.sky_color[1], h.sky_color[2], h.intensity],
            ground: [h.ground_color[0], h.ground_color[1], h.ground_color[2], 0.0],
        };
        let mut encoder = self.renderer.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mockup_plugin_frame"),
        });
        self.renderer.encode_frame(&mut encoder, &frame, view.clear_color, &meshes)?;
        if let Some(sv) = swapchain_view {
            self.renderer.encode_present_to(&mut encoder, sv)?;
        }
        self.renderer.queue().submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl RenderBackend for MockupPlugin {
    fn configure_surface(&mut self, width: u32, height: u32) -> Result<(), String> {
        self.renderer.ensure_target(width, height)
    }

    fn release_surface(&mut self) {
        self.renderer.release_target();
    }

    fn surface_size(&self) -> Option<(u32, u32)> {
        self.renderer.target().map(|t| (t.width(), t.height()))
    }

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, String> {
        if mesh.is_empty() {
            return Err("mesh has no triangles".to_string());
        }
        let device = self.renderer.device();
        let queue = self.renderer.queue();
        let vertex_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mockup_mesh_vertex"),
            size: mesh.vertex_bytes().len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buf, 0, mesh.vertex_bytes());
        let index_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mockup_mesh_index"),
            size: mesh.index_bytes().len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&index_buf, 0, mesh.index_bytes());
        let id = self.issue_id();
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buf: Arc::new(vertex_buf),
                index_buf: Arc::new(index_buf),
                index_count: mesh.indices.len() as u32,
            },
        );
        Ok(MeshId(id))
    }

    fn release_mesh(&mut self, id: MeshId) {
        if let Some(mesh) = self.meshes.remove(&id.0) {
            mesh.vertex_buf.destroy();
            mesh.index_buf.destroy();
        }
    }

    fn create_texture(&mut self, texture: &TextureData) -> Result<TextureId, String> {
        texture.validate()?;
        let limit = self.renderer.device().limits().max_texture_dimension_2d;
        if texture.width > limit || texture.height > limit {
            return Err(format!(
                "texture {}x{} exceeds max texture size {}",
                texture.width, texture.height, limit
            ));
        }
        let format = match texture.color_space {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        };
        let size = wgpu::Extent3d { width: texture.width, height: texture.height, depth_or_array_layers: 1 };
        let tex = self.renderer.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("mockup_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.renderer.queue().write_texture(
            wgpu::ImageCopyTexture {
                texture: &tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texture.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * texture.width),
                rows_per_image: Some(texture.height),
            },
            size,
        );
        let view = Arc::new(tex.create_view(&Default::default()));
        let id = self.issue_id();
        self.textures.insert(id, GpuTexture { texture: tex, view });
        Ok(TextureId(id))
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(t) = self.textures.remove(&id.0) {
            t.texture.destroy();
        }
    }

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId, String> {
        self.check_map(desc)?;
        let id = self.issue_id();
        self.materials.insert(id, *desc);
        Ok(MaterialId(id))
    }

    fn update_material(&mut self, id: MaterialId, desc: &MaterialDesc) -> Result<(), String> {
        self.check_map(desc)?;
        let slot = self.materials.get_mut(&id.0).ok_or_else(|| format!("unknown material {}", id.0))?;
        *slot = *desc;
        Ok(())
    }

    fn release_material(&mut self, id: MaterialId) {
        self.materials.remove(&id.0);
    }

    fn render_frame(&mut self, view: &FrameView, draws: &[DrawItem]) -> Result<(), String> {
        self.render_frame_impl(view, draws, None)
    }

    fn read_surface(&mut self) -> Result<SurfacePixels, String> {
        let (width, height, rgba) = self.renderer.read_target()?;
        Ok(SurfacePixels { width, height, rgba })
    }

    fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            meshes: self.meshes.len(),
            textures: self.textures.len(),
            materials: self.materials.len(),
            surfaces: usize::from(self.renderer.target().is_some()),
        }
    }
}
