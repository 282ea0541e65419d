#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Fixed-step accumulator.
///
/// Host loops feed variable frame deltas in with [`FrameClock::accumulate`]
/// and drain whole steps with [`FrameClock::next_step`]. At most
/// `max_steps_per_frame` steps are produced per accumulate call; any surplus
/// is dropped so a long stall cannot spiral.
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: f32,
    max_steps_per_frame: u32,
    accumulator: f32,
    pending_steps: u32,
    total_steps: u64,
    last_tick: Option<Instant>,
}

impl FrameClock {
    /// Default step cap per accumulated frame.
    pub const DEFAULT_MAX_STEPS: u32 = 8;

    /// Creates a clock producing steps of `step` seconds.
    #[must_use]
    pub fn fixed(step: f32) -> Self {
        debug_assert!(step > 0.0, "FrameClock step must be positive");
        Self {
            step,
            max_steps_per_frame: Self::DEFAULT_MAX_STEPS,
            accumulator: 0.0,
            pending_steps: 0,
            total_steps: 0,
            last_tick: None,
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps_per_frame: u32) -> Self {
        self.max_steps_per_frame = max_steps_per_frame.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn step(&self) -> f32 {
        self.step
    }

    #[inline]
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Adds `dt` seconds of elapsed time and returns how many steps are ready.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        if dt.is_finite() && dt > 0.0 {
            self.accumulator += dt;
        }

        let mut ready = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            ready += 1;
        }

        if ready > self.max_steps_per_frame {
            log::debug!(
                "FrameClock: dropping {} steps (cap {})",
                ready - self.max_steps_per_frame,
                self.max_steps_per_frame
            );
            ready = self.max_steps_per_frame;
        }

        self.pending_steps += ready;
        self.pending_steps
    }

    /// Samples the wall clock and accumulates the time since the previous
    /// tick. The first call only starts the clock.
    pub fn tick(&mut self) -> u32 {
        let now = Instant::now();
        let dt = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.duration_since(last));
        self.last_tick = Some(now);
        self.accumulate(dt.as_secs_f32())
    }

    /// Pops one pending step, returning its length in seconds.
    pub fn next_step(&mut self) -> Option<f32> {
        if self.pending_steps == 0 {
            return None;
        }
        self.pending_steps -= 1;
        self.total_steps += 1;
        Some(self.step)
    }

    /// Fraction of a step left over in the accumulator, in `[0, 1)`.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }
}
