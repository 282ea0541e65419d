//! Strider Animation
//!
//! Frame-driven scheduling of animation clips:
//!
//! - [`AnimationClip`]: playback instance with loop policy, blend weight and
//!   status flags
//! - [`ClipPool`]: reference-counted arena the clips live in
//! - [`AnimationController`]: the running set, its state machine, and the
//!   restart / cross-fade / synchronized-group termination protocol
//! - [`AnimationSystem`]: fixed-step driver over an [`AnimationWorld`]

pub mod clip;
pub mod controller;
pub mod listener;
pub mod pool;
pub mod settings;
pub mod system;

pub use clip::{AnimationClip, AnimationTarget, ClipSample, ClipStateFlags, LoopMode};
pub use controller::{AnimationController, ControllerState, MAX_CROSS_FADE_HOPS};
pub use listener::{ClipEvent, ClipListener};
pub use pool::{ClipKey, ClipPool};
pub use settings::{AnimationSettings, PausedSchedulePolicy};
pub use system::{AnimationSystem, AnimationWorld};
