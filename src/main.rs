use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use fps_camera::cli::Cli;
use fps_camera::config::AppConfig;
use fps_camera::core::{
    FpsCounter, FrameLoop, FrameOutcome, LifecycleError, LoopState, Platform, PointerMode, WgpuBackend,
};
use fps_camera::scenes::create_scene;
use fps_camera::window::WinitPlatform;

// === Constants ===

const FPS_UPDATE_INTERVAL: f32 = 1.0;
const INIT_FAILURE_EXIT_CODE: i32 = -1;

// === Application Handler ===

struct App {
    config: AppConfig,
    platform: Option<WinitPlatform>,
    frame_loop: Option<FrameLoop<WgpuBackend>>,
    fps: FpsCounter,
    last_redraw: f64,
    exit_code: i32,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            platform: None,
            frame_loop: None,
            fps: FpsCounter::new(FPS_UPDATE_INTERVAL),
            last_redraw: 0.0,
            exit_code: 0,
        }
    }

    /// Window, backend and scene resources; any failure here is fatal
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_config = &self.config.window;
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title(window_config.title.clone())
                    .with_inner_size(winit::dpi::LogicalSize::new(
                        window_config.width,
                        window_config.height,
                    )),
            )?,
        );

        let backend = pollster::block_on(WgpuBackend::new(window.clone(), window_config))?;
        let scene = create_scene(&self.config.scene);
        log::info!("Starting scene {:?}", scene.name());

        let mut frame_loop = FrameLoop::from_config(backend, scene, &self.config);
        frame_loop.acquire()?;

        let platform = WinitPlatform::new(window.clone());
        if window_config.capture_cursor && platform.capture_cursor() {
            frame_loop.input_mut().set_pointer_mode(PointerMode::Relative);
        }
        window.request_redraw();

        self.frame_loop = Some(frame_loop);
        self.platform = Some(platform);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(frame_loop), Some(platform)) = (&mut self.frame_loop, &mut self.platform) else {
            return;
        };

        match frame_loop.run_frame(platform) {
            Ok(FrameOutcome::Continue) => {
                let now = platform.now();
                if let Some(fps) = self.fps.tick((now - self.last_redraw) as f32) {
                    platform
                        .window()
                        .set_title(&format!("{} - {:.0} FPS", self.config.window.title, fps));
                }
                self.last_redraw = now;
            }
            Ok(FrameOutcome::Exit) => self.finish(event_loop),
            Err(LifecycleError::Present(e)) => {
                log::error!("Render error: {:#}", e);
                platform.window().request_redraw();
            }
            Err(e) => {
                log::error!("Frame loop failed: {}", e);
                self.finish(event_loop);
            }
        }
    }

    /// Release scene resources once, then stop the event loop
    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(platform) = &self.platform {
            platform.release_cursor();
        }
        if let Some(frame_loop) = &mut self.frame_loop {
            frame_loop.input_mut().set_pointer_mode(PointerMode::Absolute);
            if frame_loop.state() != LoopState::Terminated {
                if let Err(e) = frame_loop.shutdown() {
                    log::error!("Shutdown failed: {}", e);
                }
            }
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.frame_loop.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("Failed to initialize: {:#}", e);
            self.exit_code = INIT_FAILURE_EXIT_CODE;
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::Focused(focused) => {
                let (Some(frame_loop), Some(platform)) = (&mut self.frame_loop, &self.platform) else {
                    return;
                };
                let input = frame_loop.input_mut();
                input.reset_baseline();
                if focused && self.config.window.capture_cursor && platform.capture_cursor() {
                    input.set_pointer_mode(PointerMode::Relative);
                } else if !focused {
                    platform.release_cursor();
                    input.set_pointer_mode(PointerMode::Absolute);
                }
            }
            event => {
                if let Some(frame_loop) = &mut self.frame_loop {
                    frame_loop.input_mut().push_window_event(&event);
                }
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let Some(frame_loop) = &mut self.frame_loop {
            frame_loop.input_mut().push_device_event(&event);
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        let released = self
            .frame_loop
            .as_ref()
            .is_none_or(|frame_loop| frame_loop.state() == LoopState::Terminated);
        if !released {
            self.finish(event_loop);
        }
    }
}

fn run(config: AppConfig) -> Result<i32> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);

    log::info!("Controls: WASD to move, mouse to look, scroll to zoom, Escape to quit");
    event_loop.run_app(&mut app)?;

    Ok(app.exit_code)
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let code = match AppConfig::from_cli(&cli).and_then(run) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            INIT_FAILURE_EXIT_CODE
        }
    };
    std::process::exit(code);
}
