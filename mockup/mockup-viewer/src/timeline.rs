//! Render timeline thread: owns a mounted [`Viewer`], ticks it once per refresh and applies host
//! commands between frames. Export and flush are blocking round trips.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use render_api::RenderBackend;

use crate::asset::AssetSource;
use crate::color::Color;
use crate::controls::ControlInput;
use crate::error::{ExportError, InitError, ViewerError};
use crate::export::ExportedImage;
use crate::render_loop::{CancelToken, RefreshSignal, TickOutcome};
use crate::scene::MountTarget;
use crate::viewer::{LoadStatus, Viewer};

enum Command {
    Load(AssetSource),
    SelectImage(Vec<u8>),
    SelectColor(Color),
    Pointer(ControlInput),
    Export(Sender<Result<ExportedImage, ExportError>>),
    Flush(Sender<Result<(), ViewerError>>),
    Status(Sender<LoadStatus>),
    Unmount,
}

pub struct ViewerThread<B: RenderBackend + 'static> {
    commands: Sender<Command>,
    token: CancelToken,
    handle: Option<JoinHandle<Viewer<B>>>,
}

impl<B: RenderBackend + 'static> ViewerThread<B> {
    /// Mount `viewer` into `target` on the calling thread, then hand it to the render timeline.
    pub fn spawn<R>(mut viewer: Viewer<B>, target: Box<dyn MountTarget>, refresh: R) -> Result<Self, InitError>
    where
        R: RefreshSignal + 'static,
    {
        viewer.mount(target)?;
        let Some(token) = viewer.render_token() else {
            return Err(InitError::Timeline("render loop was not registered".to_string()));
        };
        let (commands, receiver) = crossbeam_channel::unbounded();
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name("render-timeline".to_string())
            .spawn(move || run(viewer, receiver, thread_token, refresh))
            .map_err(|e| InitError::Timeline(e.to_string()))?;
        Ok(Self { commands, token, handle: Some(handle) })
    }

    fn send(&self, command: Command) -> Result<(), ViewerError> {
        self.commands.send(command).map_err(|_| ViewerError::TimelineGone)
    }

    pub fn load(&self, source: AssetSource) -> Result<(), ViewerError> {
        self.send(Command::Load(source))
    }

    pub fn select_image(&self, bytes: Vec<u8>) -> Result<(), ViewerError> {
        self.send(Command::SelectImage(bytes))
    }

    /// The value is parsed here so a bad color is reported to the caller.
    pub fn select_color(&self, value: &str) -> Result<(), ViewerError> {
        let color = Color::parse(value).map_err(crate::error::CustomizeError::from)?;
        self.send(Command::SelectColor(color))
    }

    pub fn pointer_input(&self, input: ControlInput) -> Result<(), ViewerError> {
        self.send(Command::Pointer(input))
    }

    pub fn export(&self) -> Result<ExportedImage, ExportError> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.commands.send(Command::Export(reply)).map_err(|_| ExportError::TimelineGone)?;
        response.recv().map_err(|_| ExportError::TimelineGone)?
    }

    pub fn flush(&self) -> Result<(), ViewerError> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.send(Command::Flush(reply))?;
        response.recv().map_err(|_| ViewerError::TimelineGone)?
    }

    /// `None` once the timeline has exited.
    pub fn load_status(&self) -> Option<LoadStatus> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.send(Command::Status(reply)).ok()?;
        response.recv().ok()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Stop the loop, tear the scene down and hand back the unmounted viewer.
    pub fn unmount(mut self) -> Option<Viewer<B>> {
        self.token.cancel();
        let _ = self.commands.send(Command::Unmount);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(viewer) => Some(viewer),
            Err(_) => {
                log::error!("render timeline panicked");
                None
            }
        }
    }
}

impl<B: RenderBackend + 'static> Drop for ViewerThread<B> {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(Command::Unmount);
            if handle.join().is_err() {
                log::error!("render timeline panicked");
            }
        }
    }
}

fn run<B, R>(mut viewer: Viewer<B>, commands: Receiver<Command>, token: CancelToken, mut refresh: R) -> Viewer<B>
where
    B: RenderBackend,
    R: RefreshSignal,
{
    log::debug!("render timeline started");
    'frames: loop {
        let dt = refresh.wait_next();
        if token.is_cancelled() {
            break;
        }
        loop {
            match commands.try_recv() {
                Ok(Command::Unmount) | Err(TryRecvError::Disconnected) => break 'frames,
                Ok(command) => apply(&mut viewer, command),
                Err(TryRecvError::Empty) => break,
            }
        }
        if viewer.tick(dt) == TickOutcome::Cancelled {
            break;
        }
    }
    viewer.unmount();
    log::debug!("render timeline stopped");
    viewer
}

fn apply<B: RenderBackend>(viewer: &mut Viewer<B>, command: Command) {
    match command {
        Command::Load(source) => {
            if let Err(e) = viewer.load(source) {
                log::warn!("load rejected: {}", e);
            }
        }
        Command::SelectImage(bytes) => {
            if let Err(e) = viewer.select_image(bytes) {
                log::warn!("image selection rejected: {}", e);
            }
        }
        Command::SelectColor(color) => {
            if let Err(e) = viewer.apply_color(color) {
                log::warn!("color selection rejected: {}", e);
            }
        }
        Command::Pointer(input) => viewer.pointer_input(input),
        Command::Export(reply) => {
            let _ = reply.send(viewer.export());
        }
        Command::Flush(reply) => {
            let _ = reply.send(viewer.flush());
        }
        Command::Status(reply) => {
            let _ = reply.send(viewer.load_status().clone());
        }
        Command::Unmount => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::headless::HeadlessBackend;
    use crate::render_loop::FixedRefresh;
    use crate::scene::HeadlessTarget;

    fn small_viewer() -> Viewer<HeadlessBackend> {
        let mut config = ViewerConfig::default();
        config.surface.width = 24;
        config.surface.height = 24;
        Viewer::new(HeadlessBackend::new(), config)
    }

    #[test]
    fn unmount_returns_torn_down_viewer() {
        let target = HeadlessTarget::new(1.0);
        let thread = ViewerThread::spawn(small_viewer(), Box::new(target.clone()), FixedRefresh::new(240.0)).unwrap();
        assert_eq!(target.attached(), Some((24, 24)));
        assert_eq!(thread.load_status(), Some(LoadStatus::Idle));
        let export = thread.export().unwrap();
        assert_eq!((export.width, export.height), (24, 24));
        let token = thread.token();
        let viewer = thread.unmount().unwrap();
        assert!(token.is_cancelled());
        assert!(!viewer.is_mounted());
        assert_eq!(viewer.backend().resource_counts().total(), 0);
        assert_eq!(target.detach_count(), 1);
    }

    #[test]
    fn bad_color_is_rejected_on_the_host_side() {
        let thread =
            ViewerThread::spawn(small_viewer(), Box::new(HeadlessTarget::new(1.0)), FixedRefresh::new(240.0)).unwrap();
        assert!(matches!(thread.select_color("nope"), Err(ViewerError::Customize(_))));
    }

    #[test]
    fn failed_mount_does_not_start_a_thread() {
        let result = ViewerThread::spawn(small_viewer(), Box::new(HeadlessTarget::unavailable()), FixedRefresh::default());
        assert!(matches!(result, Err(InitError::TargetUnavailable(_))));
    }
}
