use std::sync::Arc;
use std::time::Instant;
use winit::window::{CursorGrabMode, Window};

use crate::core::{InputState, Platform};

/// winit side of the frame loop
///
/// Events arrive through the application handler and are pushed straight into
/// the session's [`InputState`], so polling only has to schedule the next
/// redraw.
pub struct WinitPlatform {
    window: Arc<Window>,
    start: Instant,
}

impl WinitPlatform {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            start: Instant::now(),
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Hide and grab the cursor for mouse look; returns whether the grab held
    ///
    /// `Locked` pins the cursor so only relative motion arrives, which keeps
    /// yaw unbounded. `Confined` is the fallback where locking is unsupported.
    pub fn capture_cursor(&self) -> bool {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));

        match grabbed {
            Ok(()) => {
                self.window.set_cursor_visible(false);
                true
            }
            Err(e) => {
                log::warn!("Cursor capture unavailable: {}", e);
                false
            }
        }
    }

    pub fn release_cursor(&self) {
        if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            log::debug!("Failed to release cursor: {}", e);
        }
        self.window.set_cursor_visible(true);
    }
}

impl Platform for WinitPlatform {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn poll_events(&mut self, _input: &mut InputState) {
        self.window.request_redraw();
    }
}
