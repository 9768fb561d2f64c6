pub mod backend;
pub mod clock;
pub mod controller;
pub mod frame_loop;
pub mod gpu_context;
pub mod input_adapter;
pub mod resources;
pub mod surface_renderer;
pub mod timer;

pub use backend::{DrawCall, GpuBackend, ProgramStatus, ResourceScope, ShaderSource, Uniforms, Vertex};
pub use clock::Clock;
pub use controller::{Controller, Key};
pub use frame_loop::{FrameLoop, FrameOutcome, LifecycleError, LoopState, Platform, Session};
pub use gpu_context::GpuContext;
pub use input_adapter::{InputEvent, InputState, PointerMode};
pub use resources::{ResourceEntry, ResourceError, ResourceId, ResourceKind, ResourceRegistry};
pub use surface_renderer::WgpuBackend;
pub use timer::FpsCounter;
