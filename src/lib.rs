pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod frame;
pub mod loaders;
pub mod scenes;
pub mod window;

pub use camera::{Camera, CameraMovement, CameraSettings};
pub use config::{AppConfig, SceneKind};
pub use core::{FrameLoop, FrameOutcome, GpuBackend, LoopState, Platform, ResourceRegistry, ResourceScope, Session};
pub use scenes::{create_scene, SceneProvider};
