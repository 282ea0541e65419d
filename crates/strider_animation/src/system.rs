use strider_core::FrameClock;
use strider_scene::TransformChanges;

use crate::controller::AnimationController;
use crate::settings::AnimationSettings;

/// The state an [`AnimationSystem`] drives: a controller plus the
/// transform-change recorder its update pass brackets.
#[derive(Debug, Default)]
pub struct AnimationWorld {
    pub controller: AnimationController,
    pub transforms: TransformChanges,
}

impl AnimationWorld {
    /// Creates a world with an initialized controller.
    #[must_use]
    pub fn new(settings: AnimationSettings) -> Self {
        let mut controller = AnimationController::new(settings);
        controller.initialize();
        Self {
            controller,
            transforms: TransformChanges::new(),
        }
    }
}

/// Fixed-step animation driver.
///
/// Converts variable host frame times into whole controller updates of
/// `step` seconds each.
#[derive(Debug, Clone)]
pub struct AnimationSystem {
    clock: FrameClock,
}

impl AnimationSystem {
    #[must_use]
    pub fn fixed(step: f32) -> Self {
        Self {
            clock: FrameClock::fixed(step),
        }
    }

    #[must_use]
    pub fn with_clock(clock: FrameClock) -> Self {
        Self { clock }
    }

    #[inline]
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Feeds `frame_dt` seconds of host time and runs every step that became
    /// due. Returns the number of controller updates performed.
    pub fn advance(&mut self, world: &mut AnimationWorld, frame_dt: f32) -> u32 {
        self.clock.accumulate(frame_dt);
        let mut steps = 0;
        while let Some(step) = self.clock.next_step() {
            world.controller.update(step, &world.transforms);
            steps += 1;
        }
        steps
    }
}
