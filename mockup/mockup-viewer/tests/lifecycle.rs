mod common;

use std::time::Duration;

use mockup_viewer::{
    AssetSource, ExportError, FixedRefresh, HeadlessBackend, HeadlessTarget, LoadError, LoadStatus, TickOutcome,
    Viewer, ViewerThread,
};
use render_api::RenderBackend;

use common::{init_logging, loaded, mounted, small_config, solid_png};

#[test]
fn export_before_mount_is_an_error() {
    init_logging();
    let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
    assert!(matches!(viewer.export(), Err(ExportError::NotMounted)));
}

#[test]
fn export_has_backing_resolution_and_shows_the_model() {
    let (mut viewer, target) = mounted(2.0);
    assert_eq!(target.attached(), Some((128, 128)));
    viewer.load(AssetSource::Bundled).unwrap();
    viewer.flush().unwrap();
    assert_eq!(viewer.tick(1.0 / 60.0), TickOutcome::Rendered);

    let exported = viewer.export().unwrap();
    assert_eq!(exported.file_name, "custom-mug.png");
    assert!(!exported.png.is_empty());
    let decoded = image::load_from_memory(&exported.png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (128, 128));
    assert_eq!((exported.width, exported.height), (128, 128));
    assert_eq!(decoded.get_pixel(64, 64)[3], 255, "model should cover the center");

    // Every export renders a fresh frame.
    let frames = viewer.backend().frames_rendered();
    viewer.export().unwrap();
    assert_eq!(viewer.backend().frames_rendered(), frames + 1);
}

#[test]
fn empty_scene_exports_a_transparent_image() {
    let (mut viewer, _target) = mounted(1.0);
    let exported = viewer.export().unwrap();
    let decoded = image::load_from_memory(&exported.png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (64, 64));
    assert!(decoded.pixels().all(|p| p[3] == 0));
}

#[test]
fn unmount_with_a_load_in_flight_is_clean() {
    let (mut viewer, target) = mounted(1.0);
    viewer.load(AssetSource::Bundled).unwrap();
    viewer.select_color("#ff0000").unwrap();
    viewer.unmount();
    assert_eq!(viewer.load_status(), &LoadStatus::Idle);
    assert_eq!(target.detach_count(), 1);

    // Let the worker finish; its result has nowhere to go.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(viewer.tick(0.016), TickOutcome::Cancelled);
    assert!(viewer.flush().is_ok());
    assert_eq!(viewer.backend().resource_counts().total(), 0);
    assert!(viewer.scene().is_none());
}

#[test]
fn superseded_load_never_lands() {
    let (mut viewer, _target) = mounted(1.0);
    viewer.load(AssetSource::Bundled).unwrap();
    let obj = "o Only\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
    viewer.load(AssetSource::bytes("tri.obj", obj.as_bytes().to_vec())).unwrap();
    viewer.flush().unwrap();
    let scene = viewer.scene().unwrap();
    assert_eq!(scene.asset_name(), Some("tri.obj"));
    assert_eq!(scene.mesh_names(), vec!["Only"]);
    assert_eq!(viewer.backend().resource_counts().meshes, 1);
}

#[test]
fn failed_load_leaves_the_scene_empty() {
    let (mut viewer, _target) = mounted(1.0);
    viewer.load(AssetSource::bytes("broken.glb", b"glTF garbage".to_vec())).unwrap();
    let err = viewer.flush().unwrap_err();
    assert!(matches!(err, mockup_viewer::ViewerError::Load(LoadError::Gltf(_))), "{}", err);
    assert!(matches!(viewer.load_status(), LoadStatus::Failed(_)));
    assert!(!viewer.scene().unwrap().has_asset());
    assert_eq!(viewer.backend().resource_counts().meshes, 0);
    // The loop keeps running with an empty scene.
    assert_eq!(viewer.tick(0.016), TickOutcome::Rendered);
}

#[test]
fn failing_frames_do_not_stop_the_loop() {
    let mut viewer = loaded(AssetSource::Bundled);
    viewer.backend_mut().inject_render_failures(3);
    let outcomes: Vec<_> = (0..5).map(|_| viewer.tick(1.0 / 60.0)).collect();
    assert_eq!(
        outcomes,
        vec![
            TickOutcome::Failed,
            TickOutcome::Failed,
            TickOutcome::Failed,
            TickOutcome::Rendered,
            TickOutcome::Rendered
        ]
    );
}

#[test]
fn tick_auto_rotates_the_camera() {
    let mut viewer = loaded(AssetSource::Bundled);
    viewer.tick(1.0 / 60.0);
    let before = viewer.scene().unwrap().camera.position;
    for _ in 0..30 {
        viewer.tick(1.0 / 60.0);
    }
    let after = viewer.scene().unwrap().camera.position;
    assert!((after - before).length() > 1e-5);
}

#[test]
fn mount_load_unmount_cycles_reach_steady_state() {
    init_logging();
    let target = HeadlessTarget::new(1.5);
    let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
    for cycle in 0..4 {
        viewer.mount(Box::new(target.clone())).unwrap();
        viewer.load(AssetSource::Bundled).unwrap();
        viewer.select_image(solid_png(4, 4, [cycle as u8, 0, 0, 255])).unwrap();
        viewer.select_color("#336699").unwrap();
        viewer.flush().unwrap();
        viewer.tick(1.0 / 60.0);
        viewer.export().unwrap();
        let live = viewer.backend().resource_counts();
        assert_eq!((live.meshes, live.textures, live.surfaces), (2, 1, 1), "cycle {}", cycle);
        viewer.unmount();
        assert_eq!(viewer.backend().resource_counts().total(), 0, "cycle {}", cycle);
    }
    assert_eq!(target.attach_count(), 4);
    assert_eq!(target.detach_count(), 4);
}

#[test]
fn viewer_thread_round_trip() {
    init_logging();
    let target = HeadlessTarget::new(1.0);
    let viewer = Viewer::new(HeadlessBackend::new(), small_config());
    let thread = ViewerThread::spawn(viewer, Box::new(target.clone()), FixedRefresh::new(120.0)).unwrap();
    thread.load(AssetSource::Bundled).unwrap();
    thread.select_color("#ff8800").unwrap();
    thread.select_image(solid_png(4, 4, [0, 128, 255, 255])).unwrap();
    thread.flush().unwrap();
    assert_eq!(thread.load_status(), Some(LoadStatus::Ready));

    let exported = thread.export().unwrap();
    assert_eq!((exported.width, exported.height), (64, 64));

    let viewer = thread.unmount().unwrap();
    assert!(!viewer.is_mounted());
    assert_eq!(viewer.backend().resource_counts().total(), 0);
    assert!(viewer.backend().frames_rendered() > 0);
    assert_eq!(target.detach_count(), 1);
}
