//! Variable-timestep frame timing.
//!
//! The engine updates the active scene once per rendered frame with the
//! wall-clock time since the previous frame. The very first tick has nothing
//! to measure against, so it yields no delta and the caller skips the scene
//! update for that frame.

use std::time::Instant;

const FPS_SAMPLE_COUNT: usize = 60;

pub struct FrameTimer {
    start_instant: Instant,
    last_instant: Option<Instant>,
    /// Seconds between the two most recent ticks.
    pub real_dt: f32,
    /// Seconds since the timer was created, sampled at the last tick.
    pub total_time: f32,
    pub frame_count: u64,

    fps_samples: [f32; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f32,
    pub smoothed_frame_time_ms: f32,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start_instant: start,
            last_instant: None,
            real_dt: 0.0,
            total_time: 0.0,
            frame_count: 0,
            fps_samples: [1.0 / 60.0; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 60.0,
            smoothed_frame_time_ms: 16.667,
        }
    }

    /// Advances the timer to now. Returns `None` on the first tick.
    pub fn tick(&mut self) -> Option<f32> {
        self.tick_at(Instant::now())
    }

    /// Advances the timer to `now`. Returns `None` on the first tick and a
    /// non-negative delta in seconds afterwards.
    pub fn tick_at(&mut self, now: Instant) -> Option<f32> {
        self.frame_count += 1;
        self.total_time = now.saturating_duration_since(self.start_instant).as_secs_f32();

        let Some(last) = self.last_instant.replace(now) else {
            log::debug!("First frame: no elapsed time yet, scene update skipped");
            return None;
        };

        // Instants handed in out of order clamp to zero rather than going negative.
        let dt = now.saturating_duration_since(last).as_secs_f32();
        self.real_dt = dt;

        // FPS smoothing
        self.fps_samples[self.fps_sample_index] = dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f32 = self.fps_samples.iter().sum::<f32>() / FPS_SAMPLE_COUNT as f32;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };

        Some(dt)
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
