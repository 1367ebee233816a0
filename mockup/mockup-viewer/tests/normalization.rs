mod common;

use mockup_viewer::asset::decode;
use mockup_viewer::{compute_bounds, AssetSource, LoadStatus, BUNDLED_MUG};

use common::{loaded, panels_obj, DECAL, TINT};

#[test]
fn bundled_mug_is_centered_at_the_origin() {
    let viewer = loaded(AssetSource::Bundled);
    assert_eq!(viewer.load_status(), &LoadStatus::Ready);
    let bounds = compute_bounds(&decode("mug.glb", BUNDLED_MUG).unwrap()).unwrap();
    let offset = viewer.scene().unwrap().root_offset().unwrap();
    let moved = bounds.center() + offset;
    assert!(moved.length() < 1e-6, "center after offset: {:?}", moved);
}

#[test]
fn clip_planes_and_max_distance_follow_model_size() {
    let viewer = loaded(AssetSource::Bundled);
    let size = compute_bounds(&decode("mug.glb", BUNDLED_MUG).unwrap()).unwrap().size();
    let scene = viewer.scene().unwrap();
    assert!((scene.camera.near - size / 100.0).abs() <= size * 1e-6);
    assert!((scene.camera.far - size * 100.0).abs() <= size * 1e-3);
    assert!((scene.controls.max_distance - size * 50.0).abs() <= size * 1e-4);
    assert!(scene.controls.enable_damping);
    assert!(scene.controls.auto_rotate);
    assert_eq!(scene.controls.damping_factor, 0.07);
}

#[test]
fn framing_scales_with_the_source_units() {
    let small = loaded(panels_obj(1.0, [DECAL, TINT]));
    let large = loaded(panels_obj(1000.0, [DECAL, TINT]));
    let (a, b) = (small.scene().unwrap(), large.scene().unwrap());
    let ratio = b.camera.near / a.camera.near;
    assert!((ratio - 1000.0).abs() < 0.5, "near ratio {}", ratio);
    let distance = |s: &mockup_viewer::SceneContext| (s.camera.position + s.root_offset().unwrap()).length();
    let ratio = distance(b) / distance(a);
    assert!((ratio - 1000.0).abs() < 0.5, "distance ratio {}", ratio);
}

#[test]
fn zero_size_model_is_clamped_and_still_loads() {
    let obj = "o Speck\nv 1 1 1\nv 1 1 1\nv 1 1 1\nf 1 2 3\n";
    let viewer = loaded(AssetSource::bytes("speck.obj", obj.as_bytes().to_vec()));
    assert_eq!(viewer.load_status(), &LoadStatus::Ready);
    let camera = &viewer.scene().unwrap().camera;
    assert!(camera.near > 0.0 && camera.near.is_finite());
    assert!(camera.far > camera.near);
}

#[test]
fn reloading_the_same_asset_frames_identically() {
    let mut viewer = loaded(AssetSource::Bundled);
    let first = viewer.scene().unwrap().camera.position;
    viewer.load(AssetSource::Bundled).unwrap();
    viewer.flush().unwrap();
    let second = viewer.scene().unwrap().camera.position;
    assert!((first - second).length() < 1e-6);
}
