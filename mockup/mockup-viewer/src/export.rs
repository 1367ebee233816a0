//! Export pipeline: force one frame, copy the surface out, encode PNG with alpha.

use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use render_api::RenderBackend;

use crate::error::ExportError;
use crate::scene::SceneContext;

/// One encoded still. Never cached: every export renders a fresh frame.
#[derive(Clone, Debug)]
pub struct ExportedImage {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl ExportedImage {
    /// Save under `dir` with the configured file name.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let path = dir.as_ref().join(&self.file_name);
        std::fs::write(&path, &self.png).map_err(|source| ExportError::Write { path: path.clone(), source })?;
        log::info!("wrote {} ({} bytes)", path.display(), self.png.len());
        Ok(path)
    }
}

/// Lossless PNG of tight RGBA8 rows.
pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, ExportError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(ExportError::Encode(format!(
            "{} bytes of pixels for {}x{} (expected {})",
            rgba.len(),
            width,
            height,
            expected
        )));
    }
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(rgba, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(png)
}

/// Update the controller, render once and read back that frame before anything else can draw.
pub fn export_frame<B: RenderBackend>(
    scene: &mut SceneContext,
    backend: &mut B,
    file_name: &str,
) -> Result<ExportedImage, ExportError> {
    scene.advance(0.0);
    scene.render(backend).map_err(ExportError::Render)?;
    let pixels = backend.read_surface().map_err(ExportError::Readback)?;
    let expected = scene.surface().backing_size();
    if (pixels.width, pixels.height) != expected {
        return Err(ExportError::Readback(format!(
            "surface is {}x{}, expected {}x{}",
            pixels.width, pixels.height, expected.0, expected.1
        )));
    }
    let png = encode_png(pixels.width, pixels.height, &pixels.rgba)?;
    log::info!("exported {}x{} frame ({} bytes)", pixels.width, pixels.height, png.len());
    Ok(ExportedImage { file_name: file_name.to_string(), width: pixels.width, height: pixels.height, png })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_keeps_alpha_and_dimensions() {
        let rgba = [10, 20, 30, 0, 40, 50, 60, 255, 70, 80, 90, 128];
        let png = encode_png(3, 1, &rgba).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 1));
        assert_eq!(decoded.into_raw(), rgba.to_vec());
    }

    #[test]
    fn mismatched_length_is_an_encode_error() {
        assert!(matches!(encode_png(2, 2, &[0; 12]), Err(ExportError::Encode(_))));
    }

    #[test]
    fn write_to_uses_file_name() {
        let dir = std::env::temp_dir().join(format!("mockup-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image = ExportedImage {
            file_name: "custom-mug.png".to_string(),
            width: 1,
            height: 1,
            png: encode_png(1, 1, &[1, 2, 3, 4]).unwrap(),
        };
        let path = image.write_to(&dir).unwrap();
        assert_eq!(path.file_name().unwrap(), "custom-mug.png");
        assert_eq!(std::fs::read(&path).unwrap(), image.png);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
