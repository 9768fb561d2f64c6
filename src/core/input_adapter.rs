use std::collections::{HashSet, VecDeque};
use winit::event::{DeviceEvent, ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use super::controller::{Controller, Key};

/// Pixels of touchpad scroll that count as one wheel line
pub const PIXELS_PER_SCROLL_LINE: f32 = 20.0;

/// Platform input, recorded by the windowing callbacks and drained once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    CursorMoved { x: f32, y: f32 },
    /// Raw pointer motion in pixels, y down; unbounded while the cursor is captured
    MouseMotion { dx: f32, dy: f32 },
    Scroll { y: f32 },
    Key { key: Key, pressed: bool },
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Where mouse look reads the pointer from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerMode {
    /// Window cursor positions; look stops at the window edge
    #[default]
    Absolute,
    /// Raw device motion while the cursor is grabbed
    Relative,
}

/// Session input: pending event queue, held keys and cursor baseline
///
/// Callbacks only ever push; the frame loop drains the queue at a single
/// point per iteration, so event order is preserved without shared globals.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    queue: VecDeque<InputEvent>,
    pressed_keys: HashSet<Key>,
    pressed_vec: Vec<Key>,
    last_cursor: Option<(f32, f32)>,
    pointer_mode: PointerMode,
    close_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; a platform close request also latches the close flag
    /// so the loop sees it before the next frame starts
    pub fn push(&mut self, event: InputEvent) {
        if event == InputEvent::CloseRequested {
            self.close_requested = true;
        }
        self.queue.push_back(event);
    }

    /// Translate a winit event into the queue; returns false for events we ignore
    pub fn push_window_event(&mut self, event: &WindowEvent) -> bool {
        let translated = match event {
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) => Self::keycode_to_key(code).map(|key| InputEvent::Key {
                    key,
                    pressed: event.state == ElementState::Pressed,
                }),
                PhysicalKey::Unidentified(_) => None,
            },
            WindowEvent::CursorMoved { .. } if self.pointer_mode == PointerMode::Relative => None,
            WindowEvent::CursorMoved { position, .. } => Some(InputEvent::CursorMoved {
                x: position.x as f32,
                y: position.y as f32,
            }),
            WindowEvent::MouseWheel { delta, .. } => Some(InputEvent::Scroll {
                y: match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_SCROLL_LINE,
                },
            }),
            WindowEvent::Resized(size) => Some(InputEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::CloseRequested => Some(InputEvent::CloseRequested),
            _ => None,
        };

        match translated {
            Some(event) => {
                self.push(event);
                true
            }
            None => false,
        }
    }

    /// Queue raw pointer motion; only used in [`PointerMode::Relative`]
    pub fn push_device_event(&mut self, event: &DeviceEvent) -> bool {
        match event {
            DeviceEvent::MouseMotion { delta: (dx, dy) } if self.pointer_mode == PointerMode::Relative => {
                self.push(InputEvent::MouseMotion {
                    dx: *dx as f32,
                    dy: *dy as f32,
                });
                true
            }
            _ => false,
        }
    }

    /// Switch pointer source; the baseline restarts since the two sources
    /// use different coordinates
    pub fn set_pointer_mode(&mut self, mode: PointerMode) {
        if self.pointer_mode != mode {
            self.pointer_mode = mode;
            self.reset_baseline();
        }
    }

    pub fn pointer_mode(&self) -> PointerMode {
        self.pointer_mode
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.queue.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            if self.pressed_keys.insert(key) {
                self.pressed_vec.push(key);
            }
        } else if self.pressed_keys.remove(&key) {
            self.pressed_vec.retain(|&k| k != key);
        }
    }

    /// Offset since the previous cursor sample, y inverted so up is positive.
    /// The first sample after start or [`reset_baseline`](Self::reset_baseline)
    /// only records the position.
    pub fn cursor_offset(&mut self, x: f32, y: f32) -> (f32, f32) {
        let offset = match self.last_cursor {
            Some((last_x, last_y)) => (x - last_x, last_y - y),
            None => (0.0, 0.0),
        };
        self.last_cursor = Some((x, y));
        offset
    }

    /// Offset for relative motion, applied to a virtual cursor so the same
    /// first-sample baseline holds as for absolute positions
    pub fn motion_offset(&mut self, dx: f32, dy: f32) -> (f32, f32) {
        let (x, y) = self.last_cursor.unwrap_or((0.0, 0.0));
        self.cursor_offset(x + dx, y + dy)
    }

    /// Forget the last cursor sample, e.g. after regaining focus
    pub fn reset_baseline(&mut self) {
        self.last_cursor = None;
    }

    pub fn last_cursor(&self) -> Option<(f32, f32)> {
        self.last_cursor
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    fn keycode_to_key(keycode: KeyCode) -> Option<Key> {
        match keycode {
            KeyCode::KeyW => Some(Key::KeyW),
            KeyCode::KeyA => Some(Key::KeyA),
            KeyCode::KeyS => Some(Key::KeyS),
            KeyCode::KeyD => Some(Key::KeyD),
            KeyCode::Escape => Some(Key::Escape),
            _ => None,
        }
    }
}

impl Controller for InputState {
    fn is_down(&self, key: Key) -> bool {
        self.pressed_keys.contains(&key)
    }

    fn get_down_keys(&self) -> &[Key] {
        &self.pressed_vec
    }
}
