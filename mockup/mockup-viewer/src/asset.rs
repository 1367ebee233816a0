//! Asset loading: decode a glTF 2.0 (`.glb` or self-contained `.gltf`) or Wavefront OBJ byte source
//! into named mesh nodes with world transforms and source materials. Decoding runs on a worker
//! thread; the render timeline polls the returned [`PendingLoad`].

use std::path::PathBuf;

use glam::{Mat4, Vec3};
use render_api::{AlphaMode, ColorSpace, MeshData, TextureData, Vertex};

use crate::error::LoadError;
use crate::task::{self, Pending, TaskPoll};

/// The packaged mug model.
pub static BUNDLED_MUG: &[u8] = include_bytes!("../assets/mug.glb");

#[derive(Clone, Debug)]
pub enum AssetSource {
    Bundled,
    Bytes { name: String, bytes: Vec<u8> },
    /// Read on the worker thread.
    Path(PathBuf),
}

impl AssetSource {
    pub fn bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Bytes { name: name.into(), bytes }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Bundled => "bundled mug".to_string(),
            Self::Bytes { name, bytes } => format!("{} ({} bytes)", name, bytes.len()),
            Self::Path(p) => p.display().to_string(),
        }
    }

    fn into_named_bytes(self) -> Result<(String, std::borrow::Cow<'static, [u8]>), LoadError> {
        match self {
            Self::Bundled => Ok(("mug.glb".to_string(), std::borrow::Cow::Borrowed(BUNDLED_MUG))),
            Self::Bytes { name, bytes } => Ok((name, std::borrow::Cow::Owned(bytes))),
            Self::Path(path) => {
                let bytes = std::fs::read(&path).map_err(|source| LoadError::Read { path: path.clone(), source })?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Ok((name, std::borrow::Cow::Owned(bytes)))
            }
        }
    }
}

/// Material as authored in the asset. `base_color` is linear RGBA.
#[derive(Clone, Debug)]
pub struct SourceMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub base_color_map: Option<TextureData>,
    /// Opaque unless the glTF material says otherwise; OBJ materials are always opaque.
    pub alpha_mode: AlphaMode,
}

impl SourceMaterial {
    fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_map: None,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

fn gltf_alpha_mode(material: &gltf::Material) -> AlphaMode {
    match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => {
            AlphaMode::Mask { cutoff: material.alpha_cutoff().unwrap_or(AlphaMode::DEFAULT_CUTOFF) }
        }
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    }
}

/// One drawable mesh: geometry in model space plus its transform within the asset.
#[derive(Clone, Debug)]
pub struct MeshNode {
    pub name: String,
    pub transform: Mat4,
    pub mesh: MeshData,
    /// Index into [`LoadedAsset::materials`].
    pub material: usize,
}

#[derive(Clone, Debug)]
pub struct LoadedAsset {
    pub name: String,
    pub nodes: Vec<MeshNode>,
    pub materials: Vec<SourceMaterial>,
}

impl LoadedAsset {
    /// First node with this name, in traversal order.
    pub fn find_node(&self, name: &str) -> Option<&MeshNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().map(|n| n.mesh.indices.len() / 3).sum()
    }
}

/// Decode an asset, sniffing the format from its content.
pub fn decode(name: &str, bytes: &[u8]) -> Result<LoadedAsset, LoadError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace()).copied();
    let asset = if bytes.starts_with(b"glTF") || first == Some(b'{') {
        decode_gltf(name, bytes)?
    } else {
        decode_obj(name, bytes)?
    };
    if asset.nodes.is_empty() {
        return Err(LoadError::Empty);
    }
    log::debug!(
        "decoded {}: {} meshes, {} materials, {} triangles",
        asset.name,
        asset.nodes.len(),
        asset.materials.len(),
        asset.triangle_count()
    );
    Ok(asset)
}

fn decode_gltf(name: &str, bytes: &[u8]) -> Result<LoadedAsset, LoadError> {
    let (doc, buffers, images) = gltf::import_slice(bytes).map_err(|e| LoadError::Gltf(e.to_string()))?;

    let mut materials: Vec<SourceMaterial> = doc
        .materials()
        .enumerate()
        .map(|(i, m)| {
            let pbr = m.pbr_metallic_roughness();
            let base_color_map = pbr.base_color_texture().and_then(|info| {
                let image_index = info.texture().source().index();
                images.get(image_index).and_then(gltf_image_to_texture)
            });
            SourceMaterial {
                name: m.name().map(str::to_string).unwrap_or_else(|| format!("material_{}", i)),
                base_color: pbr.base_color_factor(),
                base_color_map,
                alpha_mode: gltf_alpha_mode(&m),
            }
        })
        .collect();
    let mut default_material = None;

    let scene = doc
        .default_scene()
        .or_else(|| doc.scenes().next())
        .ok_or_else(|| LoadError::Gltf("document has no scene".to_string()))?;

    let mut nodes = Vec::new();
    let mut stack: Vec<(gltf::Node, Mat4)> = scene.nodes().map(|n| (n, Mat4::IDENTITY)).collect();
    stack.reverse();
    while let Some((node, parent)) = stack.pop() {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            let base = node
                .name()
                .or_else(|| mesh.name())
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
            for (i, primitive) in mesh.primitives().enumerate() {
                let mesh_name = if i == 0 { base.clone() } else { format!("{}_{}", base, i) };
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!("{}: skipping non-triangle primitive ({:?})", mesh_name, primitive.mode());
                    continue;
                }
                let Some(data) = read_primitive(&primitive, &buffers, &mesh_name)? else {
                    continue;
                };
                let material = match primitive.material().index() {
                    Some(index) => index,
                    None => *default_material.get_or_insert_with(|| {
                        materials.push(SourceMaterial::plain("default"));
                        materials.len() - 1
                    }),
                };
                nodes.push(MeshNode { name: mesh_name, transform: world, mesh: data, material });
            }
        }
        // Children pushed in reverse so traversal stays in document order.
        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push((child, world));
        }
    }

    Ok(LoadedAsset { name: name.to_string(), nodes, materials })
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    mesh_name: &str,
) -> Result<Option<MeshData>, LoadError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
    let Some(positions) = reader.read_positions() else {
        log::warn!("{}: primitive has no positions", mesh_name);
        return Ok(None);
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
    let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
    let indices: Vec<u32> = match reader.read_indices() {
        Some(i) => i.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    let has_normals = normals.as_ref().is_some_and(|n| n.len() == positions.len());
    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, p)| Vertex {
            position: *p,
            normal: normals.as_ref().filter(|_| has_normals).map_or([0.0; 3], |n| n[i]),
            uv: uvs.as_ref().and_then(|u| u.get(i)).copied().unwrap_or([0.0; 2]),
        })
        .collect();
    let mut mesh = MeshData { vertices, indices };
    validate_indices(&mesh).map_err(|e| LoadError::Gltf(format!("{}: {}", mesh_name, e)))?;
    if mesh.is_empty() {
        return Ok(None);
    }
    if !has_normals {
        compute_normals(&mut mesh);
    }
    Ok(Some(mesh))
}

fn gltf_image_to_texture(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;
    let rgba: Vec<u8> = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image.pixels.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect(),
        Format::R8G8 => image.pixels.chunks_exact(2).flat_map(|c| [c[0], c[0], c[0], c[1]]).collect(),
        Format::R8 => image.pixels.iter().flat_map(|&c| [c, c, c, 255]).collect(),
        other => {
            log::warn!("unsupported base color image format {:?}; using plain color", other);
            return None;
        }
    };
    let texture = TextureData { rgba, width: image.width, height: image.height, color_space: ColorSpace::Srgb };
    match texture.validate() {
        Ok(()) => Some(texture),
        Err(e) => {
            log::warn!("invalid base color image: {}", e);
            None
        }
    }
}

fn decode_obj(name: &str, bytes: &[u8]) -> Result<LoadedAsset, LoadError> {
    let mut reader = bytes;
    // Materials (.mtl) are external files; a byte source has none, so every object gets a plain material.
    let (models, _) = tobj::load_obj_buf(&mut reader, &tobj::GPU_LOAD_OPTIONS, |_| Err(tobj::LoadError::OpenFileFailed))
        .map_err(|e| LoadError::Obj(e.to_string()))?;

    let mut nodes = Vec::new();
    let mut materials = Vec::new();
    for model in models {
        let m = model.mesh;
        let count = m.positions.len() / 3;
        let has_normals = m.normals.len() == m.positions.len();
        let has_uvs = m.texcoords.len() / 2 == count;
        let vertices = (0..count)
            .map(|i| Vertex {
                position: [m.positions[3 * i] as f32, m.positions[3 * i + 1] as f32, m.positions[3 * i + 2] as f32],
                normal: if has_normals {
                    [m.normals[3 * i] as f32, m.normals[3 * i + 1] as f32, m.normals[3 * i + 2] as f32]
                } else {
                    [0.0; 3]
                },
                // OBJ puts the uv origin bottom-left; the renderer samples top-left.
                uv: if has_uvs { [m.texcoords[2 * i] as f32, 1.0 - m.texcoords[2 * i + 1] as f32] } else { [0.0; 2] },
            })
            .collect();
        let mut mesh = MeshData { vertices, indices: m.indices };
        validate_indices(&mesh).map_err(|e| LoadError::Obj(format!("{}: {}", model.name, e)))?;
        if mesh.is_empty() {
            continue;
        }
        if !has_normals {
            compute_normals(&mut mesh);
        }
        materials.push(SourceMaterial::plain(model.name.clone()));
        nodes.push(MeshNode { name: model.name, transform: Mat4::IDENTITY, mesh, material: materials.len() - 1 });
    }
    Ok(LoadedAsset { name: name.to_string(), nodes, materials })
}

fn validate_indices(mesh: &MeshData) -> Result<(), String> {
    if mesh.indices.len() % 3 != 0 {
        return Err(format!("index count {} is not a multiple of 3", mesh.indices.len()));
    }
    let n = mesh.vertices.len() as u32;
    match mesh.indices.iter().find(|&&i| i >= n) {
        Some(i) => Err(format!("index {} out of range for {} vertices", i, n)),
        None => Ok(()),
    }
}

/// Area-weighted smooth normals. Vertices touched by no (non-degenerate) triangle point up.
pub fn compute_normals(mesh: &mut MeshData) {
    let mut acc = vec![Vec3::ZERO; mesh.vertices.len()];
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from(mesh.vertices[a].position);
        let pb = Vec3::from(mesh.vertices[b].position);
        let pc = Vec3::from(mesh.vertices[c].position);
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    for (v, n) in mesh.vertices.iter_mut().zip(acc) {
        v.normal = n.try_normalize().unwrap_or(Vec3::Y).to_array();
    }
}

/// Hands out load tasks; each load gets a new generation so stale results can be recognized.
#[derive(Debug, Default)]
pub struct AssetLoader {
    generation: u64,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, source: AssetSource) -> PendingLoad {
        self.generation += 1;
        let generation = self.generation;
        let description = source.describe();
        log::info!("loading asset {} (generation {})", description, generation);
        let pending = task::spawn(&format!("asset-load-{}", generation), move || {
            let (name, bytes) = source.into_named_bytes()?;
            decode(&name, &bytes)
        });
        PendingLoad { generation, description, pending }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub struct PendingLoad {
    generation: u64,
    description: String,
    pending: Pending<Result<LoadedAsset, LoadError>>,
}

impl PendingLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// `None` while decoding.
    pub fn poll(&self) -> Option<Result<LoadedAsset, LoadError>> {
        match self.pending.poll() {
            TaskPoll::Ready(result) => Some(result),
            TaskPoll::Pending => None,
            TaskPoll::Lost => Some(Err(LoadError::WorkerLost)),
        }
    }

    pub fn wait(self) -> Result<LoadedAsset, LoadError> {
        self.pending.wait().unwrap_or(Err(LoadError::WorkerLost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
o Panel
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3
f 1/1 3/3 4/4
";

    #[test]
    fn bundled_mug_exposes_both_surfaces() {
        let asset = decode("mug.glb", BUNDLED_MUG).unwrap();
        let names: Vec<_> = asset.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Mug_Porcelain_PBR001_0", "Mug_Porcelain_PBR002_0"]);
        assert_eq!(asset.materials.len(), 2);
        assert!(asset.materials.iter().all(|m| m.alpha_mode == AlphaMode::Opaque));
        let decal = asset.find_node("Mug_Porcelain_PBR001_0").unwrap();
        let tint = asset.find_node("Mug_Porcelain_PBR002_0").unwrap();
        assert_ne!(decal.material, tint.material);
        // Root node scales centimeters to meters.
        let p = decal.transform.transform_point3(Vec3::new(100.0, 0.0, 0.0));
        assert!((p.x - 1.0).abs() < 1e-5);
        assert!(asset.triangle_count() > 0);
    }

    fn triangle_gltf(material: &str) -> String {
        format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"name": "Sticker", "mesh": 0}}],
  "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}, "material": 0}}]}}],
  "materials": [{}],
  "accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0, 0, 0], "max": [1, 1, 0]}}],
  "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
  "buffers": [{{"byteLength": 36,
               "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"}}]
}}"#,
            material
        )
    }

    #[test]
    fn gltf_alpha_mode_is_carried_into_source_materials() {
        let opaque = decode("sticker.gltf", triangle_gltf(r#"{"name": "plain"}"#).as_bytes()).unwrap();
        assert_eq!(opaque.materials[0].alpha_mode, AlphaMode::Opaque);

        let mask = decode("sticker.gltf", triangle_gltf(r#"{"alphaMode": "MASK", "alphaCutoff": 0.25}"#).as_bytes())
            .unwrap();
        assert_eq!(mask.materials[0].alpha_mode, AlphaMode::Mask { cutoff: 0.25 });

        let blend = decode("sticker.gltf", triangle_gltf(r#"{"alphaMode": "BLEND"}"#).as_bytes()).unwrap();
        assert_eq!(blend.materials[0].alpha_mode, AlphaMode::Blend);
    }

    #[test]
    fn obj_decodes_with_flipped_uvs_and_computed_normals() {
        let asset = decode("quad.obj", QUAD_OBJ.as_bytes()).unwrap();
        assert_eq!(asset.nodes.len(), 1);
        let node = &asset.nodes[0];
        assert_eq!(node.name, "Panel");
        assert_eq!(node.mesh.indices.len(), 6);
        assert_eq!(asset.materials[node.material].name, "Panel");
        assert_eq!(asset.materials[node.material].alpha_mode, AlphaMode::Opaque);
        let origin = node.mesh.vertices.iter().find(|v| v.position == [0.0, 0.0, 0.0]).unwrap();
        assert_eq!(origin.uv, [0.0, 1.0]);
        for v in &node.mesh.vertices {
            assert!((Vec3::from(v.normal) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn garbage_is_a_load_error() {
        assert!(decode("junk", &[0xff, 0xfe, 0x00, 0x81, 0x02]).is_err());
        assert!(matches!(decode("empty.obj", b"# nothing here\n"), Err(LoadError::Empty)));
        assert!(matches!(decode("bad.gltf", b"{ not json"), Err(LoadError::Gltf(_))));
    }

    #[test]
    fn out_of_range_obj_indices_are_rejected() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(decode("broken.obj", obj.as_bytes()).is_err());
    }

    #[test]
    fn loader_runs_off_thread_and_counts_generations() {
        let mut loader = AssetLoader::new();
        let first = loader.load(AssetSource::Bundled);
        let second = loader.load(AssetSource::bytes("quad.obj", QUAD_OBJ.as_bytes().to_vec()));
        assert_eq!(first.generation(), 1);
        assert_eq!(second.generation(), 2);
        assert!(first.wait().is_ok());
        assert_eq!(second.wait().unwrap().nodes.len(), 1);
    }

    #[test]
    fn missing_path_reports_read_error() {
        let mut loader = AssetLoader::new();
        let pending = loader.load(AssetSource::Path(PathBuf::from("/definitely/not/here.glb")));
        assert!(matches!(pending.wait(), Err(LoadError::Read { .. })));
    }
}
