//! Viewer façade: one mounted scene, one in-flight load, two customization channels, the render
//! loop and export. Every method runs on the render timeline; worker results are applied in `tick`.

use render_api::RenderBackend;

use crate::asset::{AssetLoader, AssetSource, LoadedAsset, PendingLoad};
use crate::color::Color;
use crate::config::ViewerConfig;
use crate::controls::ControlInput;
use crate::customize::Customization;
use crate::error::{CustomizeError, ExportError, InitError, LoadError, ViewerError};
use crate::export::{self, ExportedImage};
use crate::normalize::normalize;
use crate::render_loop::{CancelToken, RenderLoop, TickOutcome};
use crate::scene::{MountTarget, SceneContext};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

pub struct Viewer<B: RenderBackend> {
    backend: B,
    config: ViewerConfig,
    scene: Option<SceneContext>,
    render_loop: Option<RenderLoop>,
    loader: AssetLoader,
    pending_load: Option<PendingLoad>,
    customization: Customization,
    status: LoadStatus,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(backend: B, config: ViewerConfig) -> Self {
        let customization = Customization::new(&config.surfaces);
        Self {
            backend,
            config,
            scene: None,
            render_loop: None,
            loader: AssetLoader::new(),
            pending_load: None,
            customization,
            status: LoadStatus::Idle,
        }
    }

    /// Create the scene inside `target` and register the render loop.
    pub fn mount(&mut self, target: Box<dyn MountTarget>) -> Result<(), InitError> {
        if self.scene.is_some() {
            return Err(InitError::AlreadyMounted);
        }
        let scene = SceneContext::initialize(&mut self.backend, &self.config, target)?;
        self.scene = Some(scene);
        self.render_loop = Some(RenderLoop::register());
        self.customization = Customization::new(&self.config.surfaces);
        self.status = LoadStatus::Idle;
        log::info!("viewer mounted");
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.scene.is_some()
    }

    /// Start loading `source` off the render timeline. The resident asset (and any load still in
    /// flight) is discarded now; the new asset is installed by a later `tick` or `flush`.
    pub fn load(&mut self, source: AssetSource) -> Result<(), LoadError> {
        let scene = self.scene.as_mut().ok_or(LoadError::NotMounted)?;
        if let Some(previous) = self.pending_load.take() {
            log::debug!("load of {} superseded", previous.description());
        }
        scene.discard_asset(&mut self.backend);
        self.customization.begin_load();
        self.pending_load = Some(self.loader.load(source));
        self.status = LoadStatus::Loading;
        Ok(())
    }

    /// Apply finished worker results, then advance and render one frame.
    pub fn tick(&mut self, dt: f32) -> TickOutcome {
        if self.render_loop.as_ref().map_or(true, RenderLoop::is_cancelled) {
            return TickOutcome::Cancelled;
        }
        self.poll_load();
        self.poll_decode();
        match (self.scene.as_mut(), self.render_loop.as_mut()) {
            (Some(scene), Some(render_loop)) => render_loop.tick(scene, &mut self.backend, dt),
            _ => TickOutcome::Cancelled,
        }
    }

    fn poll_load(&mut self) {
        let Some(result) = self.pending_load.as_ref().and_then(PendingLoad::poll) else {
            return;
        };
        if let Some(pending) = self.pending_load.take() {
            // Errors are already logged and reflected in the load status.
            let _ = self.finish_load(pending.generation(), result);
        }
    }

    fn poll_decode(&mut self) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        if let Some(Err(e)) = self.customization.poll_decode(scene, &mut self.backend) {
            log::warn!("decal not applied: {}", e);
        }
    }

    /// Normalize, install, bind and replay. Results from a superseded or torn-down load are dropped.
    fn finish_load(&mut self, generation: u64, result: Result<LoadedAsset, LoadError>) -> Result<(), LoadError> {
        if generation != self.loader.generation() {
            log::warn!("discarding result of superseded load {}", generation);
            return Ok(());
        }
        let Some(scene) = self.scene.as_mut() else {
            log::warn!("discarding load {} that finished after unmount", generation);
            return Ok(());
        };
        let installed = result.and_then(|asset| {
            // Frame on copies so a failed upload leaves the camera untouched.
            let mut camera = scene.camera.clone();
            let mut controls = scene.controls.clone();
            let placement = normalize(&asset, &mut camera, &mut controls, &self.config)?;
            scene.install_asset(&mut self.backend, asset, &placement)?;
            scene.camera = camera;
            scene.controls = controls;
            Ok(())
        });
        match installed {
            Ok(()) => {
                self.customization.bind(scene);
                self.customization.replay(scene, &mut self.backend);
                self.status = LoadStatus::Ready;
                Ok(())
            }
            Err(e) => {
                log::error!("load failed: {}", e);
                self.customization.load_failed();
                self.status = LoadStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Decode `bytes` as the new decal. Applied by a later `tick` or `flush`.
    pub fn select_image(&mut self, bytes: Vec<u8>) -> Result<(), CustomizeError> {
        if self.scene.is_none() {
            return Err(CustomizeError::NotMounted);
        }
        self.customization.select_image(bytes);
        Ok(())
    }

    /// Parse `value` (`#rrggbb`, `#rgb` or `rgb(r, g, b)`) and tint the tint-bearing surface.
    pub fn select_color(&mut self, value: &str) -> Result<(), CustomizeError> {
        let color = Color::parse(value)?;
        self.apply_color(color)
    }

    pub fn apply_color(&mut self, color: Color) -> Result<(), CustomizeError> {
        let scene = self.scene.as_mut().ok_or(CustomizeError::NotMounted)?;
        self.customization.select_color(scene, &mut self.backend, color)
    }

    /// Ignored when not mounted.
    pub fn pointer_input(&mut self, input: ControlInput) {
        if let Some(scene) = self.scene.as_mut() {
            let viewport_height = scene.surface().backing_size().1 as f32;
            scene.controls.handle_input(input, &scene.camera, viewport_height);
        }
    }

    /// Force one frame and encode it as PNG with alpha.
    pub fn export(&mut self) -> Result<ExportedImage, ExportError> {
        let scene = self.scene.as_mut().ok_or(ExportError::NotMounted)?;
        export::export_frame(scene, &mut self.backend, &self.config.export_file_name)
    }

    /// Block until the in-flight load and decal decode finish, and apply them.
    pub fn flush(&mut self) -> Result<(), ViewerError> {
        if let Some(pending) = self.pending_load.take() {
            let generation = pending.generation();
            let result = pending.wait();
            self.finish_load(generation, result)?;
        }
        if let Some(scene) = self.scene.as_mut() {
            self.customization.flush(scene, &mut self.backend)?;
        }
        Ok(())
    }

    /// Cancel the render loop, then release everything. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        let Some(render_loop) = self.render_loop.take() else {
            return;
        };
        render_loop.cancel();
        if let Some(pending) = self.pending_load.take() {
            log::debug!("abandoning load of {}", pending.description());
        }
        self.customization.unbind();
        if let Some(scene) = self.scene.take() {
            scene.teardown(&mut self.backend);
        }
        self.status = LoadStatus::Idle;
        log::info!(
            "viewer unmounted after {} frames ({} failed)",
            render_loop.frames(),
            render_loop.failures()
        );
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn scene(&self) -> Option<&SceneContext> {
        self.scene.as_ref()
    }

    pub fn customization(&self) -> &Customization {
        &self.customization
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Token of the registered render loop; `None` when not mounted.
    pub fn render_token(&self) -> Option<CancelToken> {
        self.render_loop.as_ref().map(RenderLoop::token)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

impl<B: RenderBackend> Drop for Viewer<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::scene::HeadlessTarget;

    fn small_config() -> ViewerConfig {
        let mut config = ViewerConfig::default();
        config.surface.width = 32;
        config.surface.height = 32;
        config
    }

    #[test]
    fn operations_before_mount_fail_cleanly() {
        let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
        assert!(matches!(viewer.load(AssetSource::Bundled), Err(LoadError::NotMounted)));
        assert!(matches!(viewer.select_color("#ff0000"), Err(CustomizeError::NotMounted)));
        assert!(matches!(viewer.select_image(vec![1, 2, 3]), Err(CustomizeError::NotMounted)));
        assert!(matches!(viewer.export(), Err(ExportError::NotMounted)));
        assert_eq!(viewer.tick(0.016), TickOutcome::Cancelled);
        assert!(viewer.render_token().is_none());
        viewer.unmount();
    }

    #[test]
    fn mount_twice_is_rejected() {
        let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
        viewer.mount(Box::new(HeadlessTarget::new(1.0))).unwrap();
        assert!(matches!(viewer.mount(Box::new(HeadlessTarget::new(1.0))), Err(InitError::AlreadyMounted)));
    }

    #[test]
    fn unavailable_target_leaves_nothing_allocated() {
        let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
        let err = viewer.mount(Box::new(HeadlessTarget::unavailable())).unwrap_err();
        assert!(matches!(err, InitError::TargetUnavailable(_)));
        assert!(!viewer.is_mounted());
        assert_eq!(viewer.backend().resource_counts().total(), 0);
    }

    #[test]
    fn invalid_color_is_reported_before_touching_the_scene() {
        let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
        viewer.mount(Box::new(HeadlessTarget::new(1.0))).unwrap();
        assert!(matches!(viewer.select_color("teal-ish"), Err(CustomizeError::Color(_))));
    }

    #[test]
    fn unmount_cancels_token_first() {
        let mut viewer = Viewer::new(HeadlessBackend::new(), small_config());
        viewer.mount(Box::new(HeadlessTarget::new(1.0))).unwrap();
        let token = viewer.render_token().unwrap();
        viewer.unmount();
        assert!(token.is_cancelled());
        assert_eq!(viewer.tick(0.016), TickOutcome::Cancelled);
        assert_eq!(viewer.backend().resource_counts().total(), 0);
    }
}
