//! The recurring tick: advance the orbit controller, render once. Registered at mount with a
//! [`CancelToken`]; unmount cancels the token before any resource is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use render_api::RenderBackend;

use crate::scene::SceneContext;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    /// The frame failed; logged, and the loop keeps going.
    Failed,
    /// The token was cancelled (or the viewer is not mounted); nothing was touched.
    Cancelled,
}

#[derive(Debug)]
pub struct RenderLoop {
    token: CancelToken,
    frames: u64,
    failures: u64,
}

impl RenderLoop {
    /// Start a loop with a fresh token.
    pub fn register() -> Self {
        Self { token: CancelToken::new(), frames: 0, failures: 0 }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn tick<B: RenderBackend>(&mut self, scene: &mut SceneContext, backend: &mut B, dt: f32) -> TickOutcome {
        if self.token.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        scene.advance(dt);
        match scene.render(backend) {
            Ok(()) => {
                self.frames += 1;
                TickOutcome::Rendered
            }
            Err(e) => {
                self.failures += 1;
                log::warn!("frame {} failed: {}", self.frames + self.failures, e);
                TickOutcome::Failed
            }
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

/// Source of display refresh callbacks for the render timeline.
pub trait RefreshSignal: Send {
    /// Block until the next refresh; returns seconds since the previous one.
    fn wait_next(&mut self) -> f32;
}

/// Sleep-based refresh at a fixed rate.
#[derive(Debug)]
pub struct FixedRefresh {
    interval: Duration,
    last: Option<Instant>,
}

impl FixedRefresh {
    pub fn new(hz: f32) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { 60.0 };
        Self { interval: Duration::from_secs_f32(1.0 / hz), last: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FixedRefresh {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl RefreshSignal for FixedRefresh {
    fn wait_next(&mut self) -> f32 {
        let Some(last) = self.last else {
            self.last = Some(Instant::now());
            return self.interval.as_secs_f32();
        };
        let deadline = last + self.interval;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        let now = Instant::now();
        self.last = Some(now);
        now.duration_since(last).as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn fixed_refresh_waits_roughly_one_interval() {
        let mut refresh = FixedRefresh::new(200.0);
        let first = refresh.wait_next();
        assert!((first - 0.005).abs() < 1e-4);
        let dt = refresh.wait_next();
        assert!(dt >= 0.004, "dt {}", dt);
    }

    #[test]
    fn invalid_rate_falls_back_to_60hz() {
        let refresh = FixedRefresh::new(0.0);
        assert_eq!(refresh.interval(), Duration::from_secs_f32(1.0 / 60.0));
    }
}
