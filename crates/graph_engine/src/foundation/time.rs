//! Time management utilities

use std::time::Instant;

/// High-precision timer for frame timing
#[derive(Debug)]
pub struct Timer {
    last_frame: Instant,
    delta_time: f64,
    total_time: f64,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Update the timer from the wall clock (call once per frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;
        self.advance(elapsed);
    }

    /// Advance the timer by an explicit amount of seconds
    ///
    /// Used for fixed-step and headless runs where wall-clock time must not
    /// leak into the simulation.
    pub fn advance(&mut self, delta: f64) {
        self.delta_time = delta.max(0.0);
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since timer creation
    pub fn average_fps(&self) -> f64 {
        if self.total_time > 0.0 {
            self.frame_count as f64 / self.total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_advance_accumulates() {
        let mut timer = Timer::new();
        timer.advance(0.5);
        timer.advance(0.25);
        assert_eq!(timer.frame_count(), 2);
        assert_relative_eq!(timer.total_time(), 0.75);
        assert_relative_eq!(timer.delta_time(), 0.25);
    }

    #[test]
    fn test_negative_delta_clamped() {
        let mut timer = Timer::new();
        timer.advance(-1.0);
        assert_relative_eq!(timer.total_time(), 0.0);
    }
}
