#![allow(dead_code)]

use mockup_viewer::{AssetSource, HeadlessBackend, HeadlessTarget, Viewer, ViewerConfig};

pub const DECAL: &str = "Mug_Porcelain_PBR001_0";
pub const TINT: &str = "Mug_Porcelain_PBR002_0";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn small_config() -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.surface.width = 64;
    config.surface.height = 64;
    config
}

pub fn mounted(dpr: f32) -> (Viewer<HeadlessBackend>, HeadlessTarget) {
    init_logging();
    let target = HeadlessTarget::new(dpr);
    let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
    viewer.mount(Box::new(target.clone())).unwrap();
    (viewer, target)
}

pub fn loaded(source: AssetSource) -> Viewer<HeadlessBackend> {
    let (mut viewer, _) = mounted(1.0);
    viewer.load(source).unwrap();
    viewer.flush().unwrap();
    viewer
}

pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height).flat_map(|_| rgba).collect();
    mockup_viewer::encode_png(width, height, &pixels).unwrap()
}

/// Two unit panels named after the mug's customizable surfaces, side by side.
pub fn panels_obj(scale: f32, names: [&str; 2]) -> AssetSource {
    let mut obj = String::new();
    for (i, name) in names.iter().enumerate() {
        let x0 = i as f32 * 1.5 * scale;
        let x1 = x0 + scale;
        obj.push_str(&format!("o {}\n", name));
        obj.push_str(&format!("v {} 0 0\nv {} 0 0\nv {} {} 0\nv {} {} 0\n", x0, x1, x1, scale, x0, scale));
        obj.push_str("vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n");
        let b = i * 4;
        obj.push_str(&format!("f {}/{} {}/{} {}/{}\n", b + 1, b + 1, b + 2, b + 2, b + 3, b + 3));
        obj.push_str(&format!("f {}/{} {}/{} {}/{}\n", b + 1, b + 1, b + 3, b + 3, b + 4, b + 4));
    }
    AssetSource::bytes(format!("panels-x{}.obj", scale), obj.into_bytes())
}
