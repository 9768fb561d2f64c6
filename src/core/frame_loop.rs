use thiserror::Error;

use super::backend::{DrawCall, GpuBackend, ResourceScope};
use super::clock::Clock;
use super::controller::{Controller, Key};
use super::input_adapter::{InputEvent, InputState};
use super::resources::{ResourceError, ResourceKind, ResourceRegistry};
use crate::camera::{Camera, CameraMovement};
use crate::config::AppConfig;
use crate::frame::FrameInfo;
use crate::scenes::{SceneProvider, ViewParams};

/// Session lifecycle; only moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    ResourcesAcquired,
    Running,
    ResourcesReleased,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// Close was requested; release resources next
    Exit,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot {action} in state {state:?}")]
    InvalidTransition { action: &'static str, state: LoopState },
    #[error("resource acquisition failed: {0:#}")]
    Acquire(anyhow::Error),
    #[error("frame presentation failed: {0:#}")]
    Present(anyhow::Error),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Windowing side of the loop: the clock and the event pump
pub trait Platform {
    /// Monotonic seconds since the platform started
    fn now(&self) -> f64;

    /// Collect pending platform events into `input`
    fn poll_events(&mut self, input: &mut InputState);
}

/// Per-run mutable state, owned by the loop and lent to callbacks
#[derive(Debug, Clone)]
pub struct Session {
    pub camera: Camera,
    pub clock: Clock,
    pub input: InputState,
    pub constrain_pitch: bool,
}

impl Session {
    pub fn new(camera: Camera, clock: Clock) -> Self {
        Self {
            camera,
            clock,
            input: InputState::new(),
            constrain_pitch: true,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut session = Self::new(
            Camera::from_settings(&config.camera),
            Clock::new(config.frame.max_delta),
        );
        session.constrain_pitch = config.camera.constrain_pitch;
        session
    }
}

/// The render loop: acquire once, iterate, release once
///
/// Each iteration runs delta time, input, clear, draw, present and poll in
/// that order. A close request is only honoured at the top of the next
/// iteration, never mid-frame.
pub struct FrameLoop<B: GpuBackend> {
    state: LoopState,
    backend: B,
    registry: ResourceRegistry,
    scene: Box<dyn SceneProvider>,
    session: Session,
    clear_color: [f32; 4],
    near_plane: f32,
    far_plane: f32,
    frame_number: u64,
}

impl<B: GpuBackend> FrameLoop<B> {
    pub fn new(backend: B, scene: Box<dyn SceneProvider>, session: Session) -> Self {
        Self {
            state: LoopState::Uninitialized,
            backend,
            registry: ResourceRegistry::new(),
            scene,
            session,
            clear_color: [0.3, 0.3, 0.3, 1.0],
            near_plane: 0.1,
            far_plane: 100.0,
            frame_number: 0,
        }
    }

    pub fn from_config(backend: B, scene: Box<dyn SceneProvider>, config: &AppConfig) -> Self {
        let mut frame_loop = Self::new(backend, scene, Session::from_config(config));
        frame_loop.clear_color = config.frame.clear_color;
        frame_loop.near_plane = config.frame.near_plane;
        frame_loop.far_plane = config.frame.far_plane;
        frame_loop
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.session.input
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Let the scene create its GPU objects; allowed exactly once
    pub fn acquire(&mut self) -> Result<(), LifecycleError> {
        self.expect_state("acquire resources", &[LoopState::Uninitialized])?;

        let mut scope = ResourceScope::new(&mut self.backend, &mut self.registry);
        self.scene.acquire(&mut scope).map_err(LifecycleError::Acquire)?;

        log::debug!(
            "Scene {:?} acquired {} resources",
            self.scene.name(),
            self.registry.live_count()
        );
        self.state = LoopState::ResourcesAcquired;
        Ok(())
    }

    /// Run one iteration, or report `Exit` if close was requested last time
    pub fn run_frame(&mut self, platform: &mut dyn Platform) -> Result<FrameOutcome, LifecycleError> {
        self.expect_state(
            "run a frame",
            &[LoopState::ResourcesAcquired, LoopState::Running],
        )?;

        if self.session.input.close_requested() {
            return Ok(FrameOutcome::Exit);
        }
        self.state = LoopState::Running;

        // 1. timing
        let now = platform.now();
        let delta = self.session.clock.tick(now);
        let frame = FrameInfo::new(self.frame_number, now, delta);

        // 2. input and state
        self.process_input(delta);
        self.scene.update(&frame);

        // 3. clear
        self.backend.clear(self.clear_color);

        // 4. draw
        let params = self.view_params(now);
        let calls = self.scene.draw_calls(&params);
        if let Err(e) = self.submit_draws(&calls) {
            self.registry.clear_pending();
            return Err(e);
        }

        // 5. present
        let presented = self.backend.present();
        self.registry.clear_pending();
        presented.map_err(LifecycleError::Present)?;

        // 6. poll
        platform.poll_events(&mut self.session.input);

        self.frame_number += 1;
        Ok(FrameOutcome::Continue)
    }

    /// Release every acquired resource exactly once, newest first
    pub fn release(&mut self) -> Result<usize, LifecycleError> {
        self.expect_state(
            "release resources",
            &[LoopState::ResourcesAcquired, LoopState::Running],
        )?;

        let entries = self.registry.release_all()?;
        for entry in &entries {
            log::debug!("Releasing {:?} {} ({})", entry.kind, entry.id, entry.label);
            self.backend.release(entry.id, entry.kind);
        }
        self.state = LoopState::ResourcesReleased;
        Ok(entries.len())
    }

    pub fn terminate(&mut self) -> Result<(), LifecycleError> {
        self.expect_state("terminate", &[LoopState::ResourcesReleased])?;
        self.state = LoopState::Terminated;
        log::info!("Session ended after {} frames", self.frame_number);
        Ok(())
    }

    /// Release then terminate
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        self.release()?;
        self.terminate()
    }

    /// Drive frames until close is requested, then shut down
    pub fn run(&mut self, platform: &mut dyn Platform) -> Result<(), LifecycleError> {
        while self.run_frame(platform)? == FrameOutcome::Continue {}
        self.shutdown()
    }

    fn process_input(&mut self, delta: f32) {
        let session = &mut self.session;

        for event in session.input.drain() {
            match event {
                InputEvent::CursorMoved { x, y } => {
                    let (x_offset, y_offset) = session.input.cursor_offset(x, y);
                    session
                        .camera
                        .process_mouse_movement(x_offset, y_offset, session.constrain_pitch);
                }
                InputEvent::MouseMotion { dx, dy } => {
                    let (x_offset, y_offset) = session.input.motion_offset(dx, dy);
                    session
                        .camera
                        .process_mouse_movement(x_offset, y_offset, session.constrain_pitch);
                }
                InputEvent::Scroll { y } => session.camera.process_mouse_scroll(y),
                InputEvent::Key { key, pressed } => {
                    session.input.set_key(key, pressed);
                    if key == Key::Escape && pressed {
                        session.input.request_close();
                    }
                }
                InputEvent::Resized { width, height } => self.backend.resize(width, height),
                InputEvent::CloseRequested => session.input.request_close(),
            }
        }

        for movement in CameraMovement::ALL {
            if session.input.is_down(movement.key()) {
                session.camera.process_keyboard(movement, delta);
            }
        }
    }

    /// Check every call before pinning any of them, so a bad draw submits nothing
    fn submit_draws(&mut self, calls: &[DrawCall]) -> Result<(), LifecycleError> {
        for call in calls {
            self.registry.expect_kind(call.program, ResourceKind::Program)?;
            self.registry.expect_kind(call.vertex_buffer, ResourceKind::Buffer)?;
            if let Some(texture) = call.texture {
                self.registry.expect_kind(texture, ResourceKind::Texture)?;
            }
        }

        for call in calls {
            self.registry.mark_pending(call.program)?;
            self.registry.mark_pending(call.vertex_buffer)?;
            if let Some(texture) = call.texture {
                self.registry.mark_pending(texture)?;
            }
            self.backend.draw(call);
        }
        Ok(())
    }

    fn view_params(&self, time: f64) -> ViewParams {
        let (width, height) = self.backend.size();
        let aspect = if height == 0 { 1.0 } else { width as f32 / height as f32 };
        let camera = &self.session.camera;
        ViewParams {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(aspect, self.near_plane, self.far_plane),
            time: time as f32,
        }
    }

    fn expect_state(&self, action: &'static str, allowed: &[LoopState]) -> Result<(), LifecycleError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }
}
