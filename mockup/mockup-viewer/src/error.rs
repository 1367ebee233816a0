//! Error taxonomy of the viewer core.

use std::path::PathBuf;

/// Mount failed: the viewer instance is unusable until mounted again.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("mount target unavailable: {0}")]
    TargetUnavailable(String),
    #[error("invalid device pixel ratio {0}")]
    InvalidPixelRatio(f32),
    #[error("render surface unavailable: {0}")]
    Surface(String),
    #[error("viewer is already mounted")]
    AlreadyMounted,
    #[error("failed to start render timeline: {0}")]
    Timeline(String),
}

/// Degenerate geometry that cannot be framed.
#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error("asset has no geometry to frame")]
    NoGeometry,
    #[error("asset bounds are not finite")]
    NonFinite,
}

/// Asset load failed; the scene is left as it was before the load was applied.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read asset at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode glTF: {0}")]
    Gltf(String),
    #[error("failed to decode OBJ: {0}")]
    Obj(String),
    #[error("asset contains no triangle meshes")]
    Empty,
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error("failed to upload asset: {0}")]
    Upload(String),
    #[error("asset decode worker exited without a result")]
    WorkerLost,
    #[error("viewer is not mounted")]
    NotMounted,
}

/// A customization event could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum CustomizeError {
    #[error("viewer is not mounted")]
    NotMounted,
    #[error(transparent)]
    Color(#[from] ColorParseError),
    #[error("failed to decode decal image: {0}")]
    Decode(String),
    #[error("customizable surface is no longer resident")]
    Stale,
    #[error("failed to update material: {0}")]
    Backend(String),
}

/// Export failed; the host may retry.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("viewer is not mounted")]
    NotMounted,
    #[error("forced render failed: {0}")]
    Render(String),
    #[error("surface readback failed: {0}")]
    Readback(String),
    #[error("PNG encode failed: {0}")]
    Encode(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("render timeline is gone")]
    TimelineGone,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("empty color value")]
    Empty,
    #[error("invalid color value {0:?}: expected #rgb, #rrggbb or rgb(r, g, b)")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for hosts that drive the whole viewer.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Customize(#[from] CustomizeError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("render timeline is gone")]
    TimelineGone,
}
