//! # Strider
//!
//! Umbrella crate for the Strider engine. Re-exports the member crates:
//!
//! - [`core`]: errors and frame timing
//! - [`scene`]: transforms and batched change notification
//! - [`animation`]: clip scheduling, cross-fades and synchronized groups
//!
//! ```rust,ignore
//! use strider::prelude::*;
//!
//! let mut world = AnimationWorld::new(AnimationSettings::default());
//! let walk = world.controller.create_clip(AnimationClip::new("walk", 1.2).with_loop_mode(LoopMode::Loop));
//! world.controller.play(walk);
//!
//! let mut system = AnimationSystem::fixed(1.0 / 60.0);
//! system.advance(&mut world, frame_dt);
//! ```

pub use strider_animation as animation;
pub use strider_core as core;
pub use strider_scene as scene;

pub use strider_core::errors::{Result, StriderError};

pub mod prelude {
    pub use strider_animation::{
        AnimationClip, AnimationController, AnimationSettings, AnimationSystem, AnimationTarget,
        AnimationWorld, ClipEvent, ClipKey, ClipListener, ClipSample, ClipStateFlags,
        ControllerState, LoopMode, MAX_CROSS_FADE_HOPS, PausedSchedulePolicy,
    };
    pub use strider_core::FrameClock;
    pub use strider_scene::{NodeKey, Transform, TransformChanges};
}
