//! Window host: the viewer renders off-screen through MockupWindowBackend and is presented each
//! redraw. Drop an image on the window to set the decal, 1-6 pick a tint, E exports
//! custom-mug.png to the working directory. Left drag orbits, right drag pans, the wheel zooms.
//! Run: cargo run -p debug --bin mug_viewer [-- model.glb]

use std::path::PathBuf;
use std::time::Instant;

use mockup_bridge::MockupWindowBackend;
use mockup_viewer::{AssetSource, ControlInput, MountTarget, RenderSurface, Viewer, ViewerConfig};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use render_api::RenderBackendWindow;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

const PRESETS: [&str; 6] = ["#ffffff", "#ff0000", "#00ff00", "#1e3a8a", "#111111", "#f5c542"];

/// The window itself is the container; the render surface is blitted onto it on present.
struct WindowTarget {
    scale_factor: f32,
}

impl MountTarget for WindowTarget {
    fn device_pixel_ratio(&self) -> f32 {
        self.scale_factor
    }

    fn attach(&mut self, surface: &RenderSurface) -> Result<(), String> {
        log::info!("surface attached at {:?}", surface.backing_size());
        Ok(())
    }

    fn detach(&mut self) {
        log::info!("surface detached");
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Drag {
    Rotate,
    Pan,
}

struct App {
    model: Option<PathBuf>,
    // Declared before the window so it is torn down first.
    viewer: Option<Viewer<MockupWindowBackend>>,
    window: Option<winit::window::Window>,
    last_frame: Instant,
    cursor: Option<(f64, f64)>,
    drag: Option<Drag>,
}

impl App {
    fn new(model: Option<PathBuf>) -> Self {
        Self { model, window: None, viewer: None, last_frame: Instant::now(), cursor: None, drag: None }
    }

    fn mount(&mut self, window: &winit::window::Window) -> Result<Viewer<MockupWindowBackend>, String> {
        let backend = MockupWindowBackend::from_window(window)?;
        let mut viewer = Viewer::new(backend, ViewerConfig::default());
        viewer
            .mount(Box::new(WindowTarget { scale_factor: window.scale_factor() as f32 }))
            .map_err(|e| e.to_string())?;
        let source = match &self.model {
            Some(path) => AssetSource::Path(path.clone()),
            None => AssetSource::Bundled,
        };
        viewer.load(source).map_err(|e| e.to_string())?;
        Ok(viewer)
    }

    fn redraw(&mut self) {
        let (Some(window), Some(viewer)) = (&self.window, &mut self.viewer) else {
            return;
        };
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        viewer.tick(dt);
        let (raw_window, raw_display) = match (window.window_handle(), window.display_handle()) {
            (Ok(wh), Ok(dh)) => (wh.as_raw(), dh.as_raw()),
            _ => return,
        };
        let size = window.inner_size();
        if let Err(e) = viewer.backend_mut().present_to_window((size.width, size.height), raw_window, raw_display) {
            log::warn!("present failed: {}", e);
        }
        window.request_redraw();
    }

    fn on_key(&mut self, key: &Key, event_loop: &ActiveEventLoop) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        match key {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Character(c) if c.as_str().eq_ignore_ascii_case("e") => match viewer.export() {
                Ok(image) => match image.write_to(".") {
                    Ok(path) => log::info!("exported {}", path.display()),
                    Err(e) => log::error!("{}", e),
                },
                Err(e) => log::error!("export failed: {}", e),
            },
            Key::Character(c) => {
                let preset = c.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| PRESETS.get(i));
                if let Some(value) = preset {
                    if let Err(e) = viewer.select_color(value) {
                        log::warn!("{}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let config = ViewerConfig::default();
        let attrs = winit::window::WindowAttributes::default()
            .with_title("Mug mockup")
            .with_inner_size(winit::dpi::LogicalSize::new(config.surface.width, config.surface.height))
            .with_resizable(false);
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                log::error!("create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        match self.mount(&window) {
            Ok(viewer) => self.viewer = Some(viewer),
            Err(e) => {
                log::error!("mount failed: {}", e);
                event_loop.exit();
                return;
            }
        }
        self.last_frame = Instant::now();
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                // Unmount before the window (and its surface) goes away.
                if let Some(mut viewer) = self.viewer.take() {
                    viewer.unmount();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::DroppedFile(path) => match std::fs::read(&path) {
                Ok(bytes) => {
                    if let Some(viewer) = self.viewer.as_mut() {
                        if let Err(e) = viewer.select_image(bytes) {
                            log::warn!("{}", e);
                        }
                    }
                }
                Err(e) => log::warn!("{}: {}", path.display(), e),
            },
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                self.on_key(&event.logical_key, event_loop);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                let drag = match button {
                    MouseButton::Left => Drag::Rotate,
                    MouseButton::Right | MouseButton::Middle => Drag::Pan,
                    _ => return,
                };
                match state {
                    ElementState::Pressed => {
                        self.drag = Some(drag);
                        viewer.pointer_input(ControlInput::Begin);
                    }
                    ElementState::Released if self.drag == Some(drag) => {
                        self.drag = None;
                        viewer.pointer_input(ControlInput::End);
                    }
                    ElementState::Released => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace((position.x, position.y));
                let (Some((px, py)), Some(drag), Some(viewer)) = (previous, self.drag, self.viewer.as_mut()) else {
                    return;
                };
                let (dx, dy) = ((position.x - px) as f32, (position.y - py) as f32);
                viewer.pointer_input(match drag {
                    Drag::Rotate => ControlInput::Rotate { dx, dy },
                    Drag::Pan => ControlInput::Pan { dx, dy },
                });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(p) => -p.y as f32,
                };
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.pointer_input(ControlInput::Zoom { delta_y });
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let model = std::env::args().nth(1).map(PathBuf::from);
    let event_loop = winit::event_loop::EventLoop::new().map_err(|e| e.to_string())?;
    let mut app = App::new(model);
    event_loop.run_app(&mut app).map_err(|e| e.to_string())?;
    Ok(())
}
