/// Frame metadata - carries frame number and timing info
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub number: u64,
    /// Seconds since the platform clock started
    pub time: f64,
    /// Seconds since the previous frame, after clamping
    pub delta: f32,
}

impl FrameInfo {
    pub fn new(number: u64, time: f64, delta: f32) -> Self {
        Self { number, time, delta }
    }
}
