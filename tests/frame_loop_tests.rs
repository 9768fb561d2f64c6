use anyhow::{bail, Result};
use fps_camera::config::{AppConfig, SceneConfig, SceneKind};
use fps_camera::core::{
    Clock, DrawCall, FrameLoop, FrameOutcome, GpuBackend, InputEvent, InputState, Key, LifecycleError, LoopState,
    Platform, ProgramStatus, ResourceError, ResourceId, ResourceKind, ResourceScope, Session, ShaderSource, Uniforms, Vertex,
};
use fps_camera::loaders::ImageData;
use fps_camera::scenes::{create_scene, CubesScene, SceneProvider, TriangleScene, ViewParams};
use fps_camera::Camera;
use glam::Vec3;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

// ============================================================================
// Mocks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    CreateBuffer(ResourceId),
    CreateTexture(ResourceId),
    CreateProgram(ResourceId),
    Release(ResourceId, ResourceKind),
    Resize(u32, u32),
    Clear,
    Draw(ResourceId),
    Present,
    Poll,
}

type CallLog = Rc<RefCell<Vec<Call>>>;

/// Records every backend call into a log shared with the platform
struct MockBackend {
    log: CallLog,
    size: (u32, u32),
    shader_error: Option<String>,
    fail_present: bool,
}

impl MockBackend {
    fn new(log: CallLog) -> Self {
        Self {
            log,
            size: (800, 600),
            shader_error: None,
            fail_present: false,
        }
    }
}

impl GpuBackend for MockBackend {
    fn create_vertex_buffer(&mut self, id: ResourceId, _label: &str, _vertices: &[Vertex]) -> Result<()> {
        self.log.borrow_mut().push(Call::CreateBuffer(id));
        Ok(())
    }

    fn create_texture(&mut self, id: ResourceId, _label: &str, _image: &ImageData) -> Result<()> {
        self.log.borrow_mut().push(Call::CreateTexture(id));
        Ok(())
    }

    fn create_program(&mut self, id: ResourceId, _source: &ShaderSource) -> Result<ProgramStatus> {
        self.log.borrow_mut().push(Call::CreateProgram(id));
        Ok(match &self.shader_error {
            Some(log) => ProgramStatus::Failed { log: log.clone() },
            None => ProgramStatus::Linked,
        })
    }

    fn release(&mut self, id: ResourceId, kind: ResourceKind) {
        self.log.borrow_mut().push(Call::Release(id, kind));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.log.borrow_mut().push(Call::Resize(width, height));
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.log.borrow_mut().push(Call::Clear);
    }

    fn draw(&mut self, call: &DrawCall) {
        self.log.borrow_mut().push(Call::Draw(call.vertex_buffer));
    }

    fn present(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Call::Present);
        if self.fail_present {
            bail!("surface lost");
        }
        Ok(())
    }
}

/// Scripted clock and event source; each poll delivers the next batch
struct MockPlatform {
    log: CallLog,
    times: VecDeque<f64>,
    last_time: f64,
    batches: VecDeque<Vec<InputEvent>>,
}

impl MockPlatform {
    fn new(log: CallLog, times: &[f64]) -> Self {
        Self {
            log,
            times: times.iter().copied().collect(),
            last_time: 0.0,
            batches: VecDeque::new(),
        }
    }

    fn then_deliver(mut self, events: Vec<InputEvent>) -> Self {
        self.batches.push_back(events);
        self
    }
}

impl Platform for MockPlatform {
    fn now(&self) -> f64 {
        self.times.front().copied().unwrap_or(self.last_time)
    }

    fn poll_events(&mut self, input: &mut InputState) {
        if let Some(time) = self.times.pop_front() {
            self.last_time = time;
        }
        self.log.borrow_mut().push(Call::Poll);
        for event in self.batches.pop_front().unwrap_or_default() {
            input.push(event);
        }
    }
}

/// Scene whose acquisition fails after creating one buffer
struct BrokenScene;

impl SceneProvider for BrokenScene {
    fn name(&self) -> &str {
        "broken"
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        resources.vertex_buffer("orphan", &[Vertex::default()])?;
        bail!("scene data missing")
    }

    fn draw_calls(&self, _params: &ViewParams) -> Vec<DrawCall> {
        Vec::new()
    }
}

/// Scene that draws a buffer it never acquired
struct DanglingScene;

impl SceneProvider for DanglingScene {
    fn name(&self) -> &str {
        "dangling"
    }

    fn acquire(&mut self, _resources: &mut ResourceScope<'_>) -> Result<()> {
        Ok(())
    }

    fn draw_calls(&self, _params: &ViewParams) -> Vec<DrawCall> {
        let id = fps_camera::core::ResourceRegistry::new().peek_id();
        vec![DrawCall {
            program: id,
            vertex_buffer: id,
            vertex_count: 3,
            texture: None,
            uniforms: Uniforms::identity(),
        }]
    }
}

/// Scene that binds its program where a texture belongs
struct MisboundTextureScene {
    handles: Option<(ResourceId, ResourceId)>,
}

impl SceneProvider for MisboundTextureScene {
    fn name(&self) -> &str {
        "misbound"
    }

    fn acquire(&mut self, resources: &mut ResourceScope<'_>) -> Result<()> {
        let program = resources.program(&ShaderSource::textured())?;
        let vertices = resources.vertex_buffer("quad", &[Vertex::default(); 3])?;
        self.handles = Some((program, vertices));
        Ok(())
    }

    fn draw_calls(&self, _params: &ViewParams) -> Vec<DrawCall> {
        let Some((program, vertex_buffer)) = self.handles else {
            return Vec::new();
        };
        let good = DrawCall {
            program,
            vertex_buffer,
            vertex_count: 3,
            texture: None,
            uniforms: Uniforms::identity(),
        };
        vec![
            good,
            DrawCall {
                texture: Some(program),
                ..good
            },
        ]
    }
}

fn session() -> Session {
    Session::new(Camera::new(Vec3::new(0.0, 0.0, 3.0)), Clock::new(Some(0.25)))
}

fn triangle_loop(log: &CallLog) -> FrameLoop<MockBackend> {
    FrameLoop::new(
        MockBackend::new(log.clone()),
        Box::new(TriangleScene::new(None)),
        session(),
    )
}

fn missing_texture_config() -> SceneConfig {
    SceneConfig {
        kind: SceneKind::Cubes,
        texture: PathBuf::from("does/not/exist.png"),
        ..SceneConfig::default()
    }
}

fn calls_after_acquire(log: &CallLog) -> Vec<Call> {
    log.borrow()
        .iter()
        .filter(|c| {
            !matches!(
                c,
                Call::CreateBuffer(_) | Call::CreateTexture(_) | Call::CreateProgram(_)
            )
        })
        .cloned()
        .collect()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_new_loop_is_uninitialized() {
    let log = CallLog::default();
    let frame_loop = triangle_loop(&log);
    assert_eq!(frame_loop.state(), LoopState::Uninitialized);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_acquire_creates_scene_resources_once() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);

    frame_loop.acquire().unwrap();
    assert_eq!(frame_loop.state(), LoopState::ResourcesAcquired);
    assert_eq!(frame_loop.registry().live_count(), 2);

    let err = frame_loop.acquire().unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            state: LoopState::ResourcesAcquired,
            ..
        }
    ));
    assert_eq!(frame_loop.registry().acquired_count(), 2);
}

#[test]
fn test_run_frame_before_acquire_is_rejected() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);

    assert!(matches!(
        frame_loop.run_frame(&mut platform),
        Err(LifecycleError::InvalidTransition { .. })
    ));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_failed_acquire_keeps_loop_uninitialized() {
    let log = CallLog::default();
    let mut frame_loop = FrameLoop::new(MockBackend::new(log.clone()), Box::new(BrokenScene), session());

    assert!(matches!(frame_loop.acquire(), Err(LifecycleError::Acquire(_))));
    assert_eq!(frame_loop.state(), LoopState::Uninitialized);
}

#[test]
fn test_release_happens_once_in_reverse_order() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();

    let created: Vec<ResourceId> = log
        .borrow()
        .iter()
        .filter_map(|c| match c {
            Call::CreateProgram(id) | Call::CreateBuffer(id) => Some(*id),
            _ => None,
        })
        .collect();

    assert_eq!(frame_loop.release().unwrap(), 2);
    assert_eq!(frame_loop.state(), LoopState::ResourcesReleased);

    let released: Vec<ResourceId> = log
        .borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Release(id, _) => Some(*id),
            _ => None,
        })
        .collect();
    let mut expected = created;
    expected.reverse();
    assert_eq!(released, expected);

    assert!(frame_loop.release().is_err());
    assert_eq!(frame_loop.registry().released_count(), 2);
}

#[test]
fn test_release_before_acquire_is_rejected() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    assert!(frame_loop.release().is_err());
    assert!(frame_loop.terminate().is_err());
}

#[test]
fn test_shutdown_reaches_terminated() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    frame_loop.shutdown().unwrap();
    assert_eq!(frame_loop.state(), LoopState::Terminated);

    let mut platform = MockPlatform::new(log.clone(), &[0.016]);
    assert!(frame_loop.run_frame(&mut platform).is_err());
}

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn test_iteration_steps_run_in_order() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);

    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Continue);
    assert_eq!(frame_loop.state(), LoopState::Running);

    let steps = calls_after_acquire(&log);
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0], Call::Clear);
    assert!(matches!(steps[1], Call::Draw(_)));
    assert_eq!(steps[2], Call::Present);
    assert_eq!(steps[3], Call::Poll);
    assert_eq!(frame_loop.frame_number(), 1);
}

#[test]
fn test_close_is_observed_at_next_iteration() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform =
        MockPlatform::new(log.clone(), &[0.016, 0.032]).then_deliver(vec![InputEvent::CloseRequested]);

    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Continue);
    let after_first = log.borrow().len();

    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Exit);
    assert_eq!(log.borrow().len(), after_first, "no work after close");
    assert_eq!(frame_loop.frame_number(), 1);

    frame_loop.shutdown().unwrap();
    assert_eq!(frame_loop.state(), LoopState::Terminated);
}

#[test]
fn test_escape_finishes_current_frame_then_exits() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016, 0.032, 0.048]).then_deliver(vec![InputEvent::Key {
        key: Key::Escape,
        pressed: true,
    }]);

    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Continue);
    // Escape is handled in the input step, so this frame still presents
    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Continue);
    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Exit);
    assert_eq!(frame_loop.frame_number(), 2);
}

#[test]
fn test_run_drives_until_close_then_releases() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.01, 0.02, 0.03])
        .then_deliver(vec![])
        .then_deliver(vec![])
        .then_deliver(vec![InputEvent::CloseRequested]);

    frame_loop.run(&mut platform).unwrap();

    assert_eq!(frame_loop.frame_number(), 3);
    assert_eq!(frame_loop.state(), LoopState::Terminated);
    let releases = log
        .borrow()
        .iter()
        .filter(|c| matches!(c, Call::Release(..)))
        .count();
    assert_eq!(releases, 2);
}

#[test]
fn test_held_key_moves_camera_by_delta() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.0, 0.1]).then_deliver(vec![InputEvent::Key {
        key: Key::KeyW,
        pressed: true,
    }]);

    frame_loop.run_frame(&mut platform).unwrap();
    let start = frame_loop.session().camera.position();
    frame_loop.run_frame(&mut platform).unwrap();
    let moved = frame_loop.session().camera.position() - start;

    // speed 2.5 * delta 0.1 along the default front (0, 0, -1)
    assert!((moved - Vec3::new(0.0, 0.0, -0.25)).length() < 1e-4);
}

#[test]
fn test_large_delta_is_clamped() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.0, 5.0]).then_deliver(vec![InputEvent::Key {
        key: Key::KeyS,
        pressed: true,
    }]);

    frame_loop.run_frame(&mut platform).unwrap();
    let start = frame_loop.session().camera.position();
    frame_loop.run_frame(&mut platform).unwrap();
    let moved = (frame_loop.session().camera.position() - start).length();

    assert!((moved - 2.5 * 0.25).abs() < 1e-4);
}

#[test]
fn test_first_cursor_sample_sets_baseline_only() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.01, 0.02, 0.03])
        .then_deliver(vec![InputEvent::CursorMoved { x: 400.0, y: 300.0 }])
        .then_deliver(vec![InputEvent::CursorMoved { x: 410.0, y: 290.0 }]);

    frame_loop.run_frame(&mut platform).unwrap();
    frame_loop.run_frame(&mut platform).unwrap();
    assert_eq!(frame_loop.session().camera.yaw(), -90.0);
    assert_eq!(frame_loop.session().camera.pitch(), 0.0);

    frame_loop.run_frame(&mut platform).unwrap();
    let camera = &frame_loop.session().camera;
    assert!((camera.yaw() - -89.0).abs() < 1e-4);
    assert!((camera.pitch() - 1.0).abs() < 1e-4);
}

#[test]
fn test_captured_motion_turns_past_window_edge() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut turn = vec![InputEvent::MouseMotion { dx: 100.0, dy: 0.0 }; 40];
    turn.push(InputEvent::MouseMotion { dx: 0.0, dy: -10.0 });
    let mut platform = MockPlatform::new(log.clone(), &[0.01, 0.02, 0.03])
        .then_deliver(vec![InputEvent::MouseMotion { dx: 25.0, dy: 25.0 }])
        .then_deliver(turn);

    frame_loop.run_frame(&mut platform).unwrap();
    assert_eq!(frame_loop.session().camera.yaw(), -90.0);

    frame_loop.run_frame(&mut platform).unwrap();
    let camera = &frame_loop.session().camera;
    assert!((camera.yaw() - 310.0).abs() < 1e-3);
    assert!((camera.pitch() - 1.0).abs() < 1e-4);
}

#[test]
fn test_scroll_and_resize_are_applied() {
    let log = CallLog::default();
    let mut frame_loop = triangle_loop(&log);
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.01, 0.02]).then_deliver(vec![
        InputEvent::Scroll { y: 10.0 },
        InputEvent::Resized {
            width: 1024,
            height: 768,
        },
    ]);

    frame_loop.run_frame(&mut platform).unwrap();
    frame_loop.run_frame(&mut platform).unwrap();

    assert_eq!(frame_loop.session().camera.zoom(), 35.0);
    assert_eq!(frame_loop.backend().size(), (1024, 768));
    assert!(log.borrow().contains(&Call::Resize(1024, 768)));
}

#[test]
fn test_present_failure_is_reported() {
    let log = CallLog::default();
    let mut backend = MockBackend::new(log.clone());
    backend.fail_present = true;
    let mut frame_loop = FrameLoop::new(backend, Box::new(TriangleScene::new(None)), session());
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);

    assert!(matches!(
        frame_loop.run_frame(&mut platform),
        Err(LifecycleError::Present(_))
    ));
    // Nothing stays pending, so release still succeeds
    assert_eq!(frame_loop.release().unwrap(), 2);
}

#[test]
fn test_draw_of_unacquired_resource_is_rejected() {
    let log = CallLog::default();
    let mut frame_loop = FrameLoop::new(MockBackend::new(log.clone()), Box::new(DanglingScene), session());
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);

    assert!(matches!(
        frame_loop.run_frame(&mut platform),
        Err(LifecycleError::Resource(_))
    ));
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::Draw(_))));
}

#[test]
fn test_rejected_frame_leaves_nothing_pinned() {
    let log = CallLog::default();
    let scene = MisboundTextureScene { handles: None };
    let mut frame_loop = FrameLoop::new(MockBackend::new(log.clone()), Box::new(scene), session());
    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);

    assert!(matches!(
        frame_loop.run_frame(&mut platform),
        Err(LifecycleError::Resource(ResourceError::WrongKind { .. }))
    ));
    // The valid first draw was never submitted either
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::Draw(_))));
    for call in log.borrow().iter() {
        if let Call::CreateProgram(id) | Call::CreateBuffer(id) = call {
            assert!(!frame_loop.registry().is_pending(*id));
        }
    }

    assert_eq!(frame_loop.release().unwrap(), 2);
    frame_loop.terminate().unwrap();
    assert_eq!(frame_loop.state(), LoopState::Terminated);
}

// ============================================================================
// Asset failures
// ============================================================================

#[test]
fn test_failed_shader_is_not_fatal() {
    let log = CallLog::default();
    let mut backend = MockBackend::new(log.clone());
    backend.shader_error = Some("error: expected ';'".to_string());
    let mut frame_loop = FrameLoop::new(backend, Box::new(TriangleScene::new(None)), session());

    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);
    assert_eq!(frame_loop.run_frame(&mut platform).unwrap(), FrameOutcome::Continue);

    // The failed program is still released with everything else
    assert_eq!(frame_loop.release().unwrap(), 2);
}

#[test]
fn test_missing_shader_file_is_not_fatal() {
    let log = CallLog::default();
    let scene = TriangleScene::new(Some(PathBuf::from("does/not/exist.wgsl")));
    let mut frame_loop = FrameLoop::new(MockBackend::new(log.clone()), Box::new(scene), session());

    frame_loop.acquire().unwrap();
    assert_eq!(frame_loop.registry().live_count(), 2);
}

#[test]
fn test_missing_texture_draws_untextured() {
    let log = CallLog::default();
    let scene = CubesScene::new(&missing_texture_config());
    let mut frame_loop = FrameLoop::new(MockBackend::new(log.clone()), Box::new(scene), session());

    frame_loop.acquire().unwrap();
    assert!(!log.borrow().iter().any(|c| matches!(c, Call::CreateTexture(_))));
    // program and cube vertices only
    assert_eq!(frame_loop.registry().live_count(), 2);

    let mut platform = MockPlatform::new(log.clone(), &[0.016]);
    frame_loop.run_frame(&mut platform).unwrap();
    let draws = log.borrow().iter().filter(|c| matches!(c, Call::Draw(_))).count();
    assert_eq!(draws, 10);
}

#[test]
fn test_missing_model_draws_nothing() {
    let log = CallLog::default();
    let mut config = AppConfig::default();
    config.scene.kind = SceneKind::Model;
    config.scene.model = PathBuf::from("does/not/exist.gltf");
    let scene = create_scene(&config.scene);
    let mut frame_loop = FrameLoop::from_config(MockBackend::new(log.clone()), scene, &config);

    frame_loop.acquire().unwrap();
    let mut platform = MockPlatform::new(log.clone(), &[0.016]);
    frame_loop.run_frame(&mut platform).unwrap();

    assert!(!log.borrow().iter().any(|c| matches!(c, Call::Draw(_))));
    frame_loop.shutdown().unwrap();
}

#[test]
fn test_animated_scenes_draw_through_frame_loop() {
    for (kind, name) in [(SceneKind::Uniforms, "uniforms"), (SceneKind::Rotating, "rotating")] {
        let log = CallLog::default();
        let mut config = AppConfig::default();
        config.scene.kind = kind;
        config.scene.texture = PathBuf::from("does/not/exist.png");
        let scene = create_scene(&config.scene);
        assert_eq!(scene.name(), name);
        let mut frame_loop = FrameLoop::from_config(MockBackend::new(log.clone()), scene, &config);

        frame_loop.acquire().unwrap();
        let mut platform = MockPlatform::new(log.clone(), &[0.016, 0.032]);
        frame_loop.run_frame(&mut platform).unwrap();
        frame_loop.run_frame(&mut platform).unwrap();

        let draws = log.borrow().iter().filter(|c| matches!(c, Call::Draw(_))).count();
        assert_eq!(draws, 2);
        assert_eq!(frame_loop.release().unwrap(), 2);
    }
}
