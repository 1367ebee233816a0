//! Model normalization: frame any asset identically regardless of its authored scale and origin.

use glam::Vec3;

use crate::asset::LoadedAsset;
use crate::camera::PerspectiveCamera;
use crate::config::ViewerConfig;
use crate::controls::OrbitControls;
use crate::error::NormalizationError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Diagonal length.
    pub fn size(&self) -> f32 {
        self.extent().length()
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self { min: self.min + offset, max: self.max + offset }
    }
}

/// World-space bounds over every vertex after its node transform. `None` without vertices; a
/// non-finite vertex yields a non-finite box.
pub fn compute_bounds(asset: &LoadedAsset) -> Option<Aabb> {
    let mut bounds: Option<Aabb> = None;
    for node in &asset.nodes {
        for v in &node.mesh.vertices {
            let p = node.transform.transform_point3(Vec3::from(v.position));
            if !p.is_finite() {
                // min/max skip NaN; poison the box instead so callers see it.
                return Some(Aabb::from_point(Vec3::NAN));
            }
            match bounds.as_mut() {
                Some(b) => b.extend(p),
                None => bounds = Some(Aabb::from_point(p)),
            }
        }
    }
    bounds
}

/// Where the asset and camera were placed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedPlacement {
    pub bounds: Aabb,
    pub center: Vec3,
    /// Bounding diagonal after clamping.
    pub size: f32,
    /// Translation applied to the asset root (`-center`).
    pub root_offset: Vec3,
    pub camera_position: Vec3,
    pub near: f32,
    pub far: f32,
    pub max_distance: f32,
    /// The bounding diagonal was below the minimum model size.
    pub clamped: bool,
}

/// Reset the controller, then frame the asset. Same asset in, same camera and controller state out.
pub fn normalize(
    asset: &LoadedAsset,
    camera: &mut PerspectiveCamera,
    controls: &mut OrbitControls,
    config: &ViewerConfig,
) -> Result<NormalizedPlacement, NormalizationError> {
    let bounds = compute_bounds(asset).ok_or(NormalizationError::NoGeometry)?;
    if !bounds.is_finite() || !bounds.size().is_finite() {
        return Err(NormalizationError::NonFinite);
    }
    let cam = &config.camera;
    let center = bounds.center();
    let measured = bounds.size();
    let clamped = measured < cam.minimum_model_size;
    let size = if clamped {
        log::warn!(
            "{}: bounding diagonal {} below minimum {}, clamping",
            asset.name,
            measured,
            cam.minimum_model_size
        );
        cam.minimum_model_size
    } else {
        measured
    };

    controls.reset(camera);
    controls.apply_config(&config.controls);
    controls.max_distance = size * cam.max_distance_multiplier;

    camera.position = center + Vec3::from(cam.framing_offset) * size;
    camera.near = size / cam.near_divisor;
    camera.far = size * cam.far_multiplier;
    camera.update_projection();
    camera.look_at(center);

    let placement = NormalizedPlacement {
        bounds,
        center,
        size,
        root_offset: -center,
        camera_position: camera.position,
        near: camera.near,
        far: camera.far,
        max_distance: controls.max_distance,
        clamped,
    };
    log::debug!("normalized {}: {:?}", asset.name, placement);
    Ok(placement)
}
