/// Keys the session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    Escape,
}

/// Controller - handles key input states
pub trait Controller {
    /// Check if key is currently down
    fn is_down(&self, key: Key) -> bool;

    /// Get all currently pressed keys, in press order
    fn get_down_keys(&self) -> &[Key];
}
