//! Customization controller: the decal channel (image -> color map) and the tint channel
//! (color -> base color), each bound once per asset to the material of a configured mesh name.

use render_api::{ColorSpace, RenderBackend, TextureData};

use crate::arena::Handle;
use crate::color::Color;
use crate::config::SurfaceBindings;
use crate::error::CustomizeError;
use crate::scene::{MaterialEntry, SceneContext};
use crate::task::{self, Pending, TaskPoll};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Decal,
    Tint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// No mesh with the configured name; input is ignored.
    Unbound,
    BoundIdle,
    BoundActive,
}

#[derive(Debug)]
struct Channel {
    mesh_name: String,
    material: Option<Handle<MaterialEntry>>,
    state: ChannelState,
}

impl Channel {
    fn new(mesh_name: String) -> Self {
        Self { mesh_name, material: None, state: ChannelState::Unbound }
    }

    fn unbind(&mut self) {
        self.material = None;
        self.state = ChannelState::Unbound;
    }
}

#[derive(Debug)]
struct PendingDecode {
    sequence: u64,
    pending: Pending<Result<TextureData, CustomizeError>>,
}

#[derive(Debug)]
pub struct Customization {
    decal: Channel,
    tint: Channel,
    awaiting_bind: bool,
    /// Latest selection per channel while a load is in flight; replayed once its surfaces are bound.
    queued_image: Option<Vec<u8>>,
    queued_color: Option<Color>,
    decode: Option<PendingDecode>,
    decode_sequence: u64,
    tint_color: Option<Color>,
}

/// Decode an image for use as a color map: RGBA8, sRGB, rows kept in file order.
pub fn decode_image(bytes: &[u8]) -> Result<TextureData, CustomizeError> {
    let image = image::load_from_memory(bytes).map_err(|e| CustomizeError::Decode(e.to_string()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData { rgba: rgba.into_raw(), width, height, color_space: ColorSpace::Srgb })
}

impl Customization {
    pub fn new(bindings: &SurfaceBindings) -> Self {
        Self {
            decal: Channel::new(bindings.decal.clone()),
            tint: Channel::new(bindings.tint.clone()),
            awaiting_bind: false,
            queued_image: None,
            queued_color: None,
            decode: None,
            decode_sequence: 0,
            tint_color: None,
        }
    }

    fn channel(&self, role: SurfaceRole) -> &Channel {
        match role {
            SurfaceRole::Decal => &self.decal,
            SurfaceRole::Tint => &self.tint,
        }
    }

    pub fn state(&self, role: SurfaceRole) -> ChannelState {
        self.channel(role).state
    }

    pub fn bound_material(&self, role: SurfaceRole) -> Option<Handle<MaterialEntry>> {
        self.channel(role).material
    }

    pub fn mesh_name(&self, role: SurfaceRole) -> &str {
        &self.channel(role).mesh_name
    }

    pub fn is_awaiting_bind(&self) -> bool {
        self.awaiting_bind
    }

    /// Selections waiting for the in-flight load, at most one per channel.
    pub fn queued_events(&self) -> usize {
        usize::from(self.queued_image.is_some()) + usize::from(self.queued_color.is_some())
    }

    pub fn has_pending_decode(&self) -> bool {
        self.decode.is_some()
    }

    /// Last color applied to the tint surface.
    pub fn tint_color(&self) -> Option<Color> {
        self.tint_color
    }

    /// Drop bindings, queued events and any in-flight decode. The decode's late result is discarded.
    pub fn unbind(&mut self) {
        self.decal.unbind();
        self.tint.unbind();
        self.awaiting_bind = false;
        self.queued_image = None;
        self.queued_color = None;
        self.decode = None;
        self.tint_color = None;
    }

    /// A new load started: unbind and queue events until it binds.
    pub fn begin_load(&mut self) {
        self.unbind();
        self.awaiting_bind = true;
    }

    /// The in-flight load failed; queued events have nowhere to go.
    pub fn load_failed(&mut self) {
        let queued = self.queued_events();
        if queued > 0 {
            log::warn!("dropping {} customization events queued for a failed load", queued);
        }
        self.queued_image = None;
        self.queued_color = None;
        self.awaiting_bind = false;
    }

    /// Resolve both mesh names against the freshly installed asset.
    pub fn bind(&mut self, scene: &SceneContext) {
        for channel in [&mut self.decal, &mut self.tint] {
            match scene.find_surface(&channel.mesh_name) {
                Some(handle) => {
                    channel.material = Some(handle);
                    channel.state = ChannelState::BoundIdle;
                    log::debug!("bound {} to {:?}", channel.mesh_name, handle);
                }
                None => {
                    channel.unbind();
                    log::warn!("mesh {} not found; its channel is inert", channel.mesh_name);
                }
            }
        }
        self.awaiting_bind = false;
    }

    /// Apply the latest selection of each channel made while the load was in flight.
    pub fn replay<B: RenderBackend>(&mut self, scene: &mut SceneContext, backend: &mut B) {
        let queued = self.queued_events();
        if queued > 0 {
            log::debug!("replaying {} queued customization events", queued);
        }
        if let Some(color) = self.queued_color.take() {
            if let Err(e) = self.select_color(scene, backend, color) {
                log::warn!("queued customization failed: {}", e);
            }
        }
        if let Some(bytes) = self.queued_image.take() {
            self.select_image(bytes);
        }
    }

    /// Start decoding a decal image. A newer selection supersedes any decode still in flight.
    pub fn select_image(&mut self, bytes: Vec<u8>) {
        if self.awaiting_bind {
            if self.queued_image.replace(bytes).is_some() {
                log::debug!("queued decal image superseded");
            }
            return;
        }
        if self.decal.state == ChannelState::Unbound {
            log::debug!("decal channel unbound; ignoring image");
            return;
        }
        self.decode_sequence += 1;
        let sequence = self.decode_sequence;
        if let Some(previous) = self.decode.take() {
            log::debug!("decal decode {} superseded by {}", previous.sequence, sequence);
        }
        let pending = task::spawn(&format!("decal-decode-{}", sequence), move || decode_image(&bytes));
        self.decode = Some(PendingDecode { sequence, pending });
    }

    pub fn select_color<B: RenderBackend>(
        &mut self,
        scene: &mut SceneContext,
        backend: &mut B,
        color: Color,
    ) -> Result<(), CustomizeError> {
        if self.awaiting_bind {
            self.queued_color = Some(color);
            return Ok(());
        }
        let Some(handle) = self.tint.material else {
            log::debug!("tint channel unbound; ignoring {}", color);
            return Ok(());
        };
        scene.set_base_color(backend, handle, color.to_linear())?;
        self.tint.state = ChannelState::BoundActive;
        self.tint_color = Some(color);
        log::debug!("tint set to {}", color);
        Ok(())
    }

    /// Apply the latest decode if it has finished. `None` when nothing was ready.
    pub fn poll_decode<B: RenderBackend>(
        &mut self,
        scene: &mut SceneContext,
        backend: &mut B,
    ) -> Option<Result<(), CustomizeError>> {
        let result = match self.decode.as_ref()?.pending.poll() {
            TaskPoll::Pending => return None,
            TaskPoll::Ready(result) => result,
            TaskPoll::Lost => Err(CustomizeError::Decode("decode worker exited without a result".to_string())),
        };
        self.decode = None;
        Some(self.apply_decoded(scene, backend, result))
    }

    /// Block on the in-flight decode, then apply it.
    pub fn flush<B: RenderBackend>(&mut self, scene: &mut SceneContext, backend: &mut B) -> Result<(), CustomizeError> {
        let Some(decode) = self.decode.take() else {
            return Ok(());
        };
        let result = decode
            .pending
            .wait()
            .unwrap_or_else(|| Err(CustomizeError::Decode("decode worker exited without a result".to_string())));
        self.apply_decoded(scene, backend, result)
    }

    fn apply_decoded<B: RenderBackend>(
        &mut self,
        scene: &mut SceneContext,
        backend: &mut B,
        result: Result<TextureData, CustomizeError>,
    ) -> Result<(), CustomizeError> {
        let texture = result?;
        // The asset may have been replaced while decoding.
        let handle = self.decal.material.ok_or(CustomizeError::Stale)?;
        let id = scene.set_color_map(backend, handle, &texture)?;
        self.decal.state = ChannelState::BoundActive;
        log::debug!("decal {}x{} applied as texture {:?}", texture.width, texture.height, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let pixels: Vec<u8> = (0..width * height).flat_map(|_| rgba).collect();
        crate::export::encode_png(width, height, &pixels).unwrap()
    }

    #[test]
    fn decodes_png_without_flipping() {
        let mut pixels = vec![0u8; 2 * 2 * 4];
        // Top-left red, bottom-left blue.
        pixels[..4].copy_from_slice(&[255, 0, 0, 255]);
        pixels[8..12].copy_from_slice(&[0, 0, 255, 128]);
        let bytes = crate::export::encode_png(2, 2, &pixels).unwrap();
        let texture = decode_image(&bytes).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(texture.color_space, ColorSpace::Srgb);
        assert_eq!(&texture.rgba[..4], &[255, 0, 0, 255]);
        assert_eq!(&texture.rgba[8..12], &[0, 0, 255, 128]);
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        assert!(matches!(decode_image(b"not an image"), Err(CustomizeError::Decode(_))));
    }

    #[test]
    fn queues_while_awaiting_bind_and_ignores_when_unbound() {
        let mut c = Customization::new(&SurfaceBindings::default());
        c.select_image(png(1, 1, [1, 2, 3, 255]));
        assert!(!c.has_pending_decode());
        assert_eq!(c.queued_events(), 0);

        c.begin_load();
        c.select_image(png(1, 1, [1, 2, 3, 255]));
        assert_eq!(c.queued_events(), 1);
        assert!(!c.has_pending_decode());

        // Later selections replace the queued one rather than piling up.
        c.select_image(png(2, 2, [4, 5, 6, 255]));
        c.select_image(png(3, 3, [7, 8, 9, 255]));
        assert_eq!(c.queued_events(), 1);
        assert_eq!(c.queued_image.as_deref(), Some(png(3, 3, [7, 8, 9, 255]).as_slice()));

        c.load_failed();
        assert_eq!(c.queued_events(), 0);
        assert!(!c.is_awaiting_bind());
        assert_eq!(c.state(SurfaceRole::Decal), ChannelState::Unbound);
    }
}
