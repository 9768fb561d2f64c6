/// Frame rate meter - averages frames over a fixed reporting interval
#[derive(Debug, Clone, Copy)]
pub struct FpsCounter {
    interval: f32,
    elapsed: f32,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    /// Create counter reporting every `interval` seconds
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: 0.0,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame, returns the new average when an interval completes
    pub fn tick(&mut self, delta: f32) -> Option<f32> {
        self.frames += 1;
        self.elapsed += delta;

        if self.elapsed >= self.interval {
            self.fps = self.frames as f32 / self.elapsed;
            self.frames = 0;
            self.elapsed = 0.0;
            Some(self.fps)
        } else {
            None
        }
    }

    /// Last reported average
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(1.0)
    }
}
