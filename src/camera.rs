use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::controller::Key;

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 45.0;

pub const PITCH_LIMIT: f32 = 89.0;
pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 45.0;

/// Direction of a keyboard-driven camera move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

impl CameraMovement {
    pub const ALL: [CameraMovement; 4] = [
        CameraMovement::Forward,
        CameraMovement::Backward,
        CameraMovement::Left,
        CameraMovement::Right,
    ];

    /// Movement bound to a key, WASD layout
    pub const fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::KeyW => Some(CameraMovement::Forward),
            Key::KeyS => Some(CameraMovement::Backward),
            Key::KeyA => Some(CameraMovement::Left),
            Key::KeyD => Some(CameraMovement::Right),
            _ => None,
        }
    }

    pub const fn key(self) -> Key {
        match self {
            CameraMovement::Forward => Key::KeyW,
            CameraMovement::Backward => Key::KeyS,
            CameraMovement::Left => Key::KeyA,
            CameraMovement::Right => Key::KeyD,
        }
    }
}

/// Initial state and tuning for a [`Camera`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub world_up: [f32; 3],
    /// Degrees
    pub yaw: f32,
    /// Degrees
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub zoom: f32,
    /// World units per second
    pub movement_speed: f32,
    /// Degrees per cursor pixel
    pub mouse_sensitivity: f32,
    pub constrain_pitch: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 3.0],
            world_up: [0.0, 1.0, 0.0],
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            zoom: DEFAULT_ZOOM,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            constrain_pitch: true,
        }
    }
}

/// First-person camera driven by Euler angles
///
/// The basis (`front`, `right`, `up`) is always rebuilt from `yaw` and
/// `pitch`, never integrated, so it cannot drift away from orthonormal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Camera {
    /// Camera at `position` facing -Z with world up +Y
    pub fn new(position: Vec3) -> Self {
        Self::with_orientation(position, Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH)
    }

    /// Starting pitch is clamped to [`PITCH_LIMIT`]
    pub fn with_orientation(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            front: Vec3::NEG_Z,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            zoom: DEFAULT_ZOOM,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
        };
        camera.update_vectors();
        camera
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        let mut camera = Self::with_orientation(
            Vec3::from_array(settings.position),
            Vec3::from_array(settings.world_up),
            settings.yaw,
            settings.pitch,
        );
        camera.zoom = settings.zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        camera.movement_speed = settings.movement_speed;
        camera.mouse_sensitivity = settings.mouse_sensitivity;
        if !settings.constrain_pitch && camera.pitch != settings.pitch {
            camera.pitch = settings.pitch;
            camera.update_vectors();
        }
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Field of view in degrees
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// World-to-eye transform looking from `position` along `front`
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection using the current zoom as vertical FOV
    pub fn projection_matrix(&self, aspect_ratio: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom.to_radians(), aspect_ratio, near, far)
    }

    /// Move along `front` or `right`; the position is unbounded
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Apply cursor offsets in pixels; positive y looks up
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_vectors();
    }

    /// Scrolling up narrows the field of view
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}
