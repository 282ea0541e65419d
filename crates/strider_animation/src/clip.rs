//! Animation Clip
//!
//! One playback instance of an animation resource: local time, loop policy,
//! blend weight, lifecycle flags, and an optional cross-fade successor.
//!
//! Clips do not sample keyframes themselves. After every advance the
//! scheduler hands a [`ClipSample`] to the clip's [`AnimationTarget`], which
//! is where pose evaluation plugs in.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::controller::AnimationController;
use crate::listener::{ClipEvent, ClipListener};
use crate::pool::ClipKey;

bitflags! {
    /// Clip status bits. Each bit is independently settable and clearable.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ClipStateFlags: u16 {
        /// Actively advancing.
        const PLAYING            = 1 << 0;
        /// Restarted this frame; the scheduler ends and re-queues it before
        /// it advances again.
        const RESTARTED          = 1 << 1;
        /// Pending fade-out target, dropped once its weight reaches zero.
        const MARKED_FOR_REMOVAL = 1 << 2;
        /// Member of a locomotion group; force-finished with its driver.
        const SYNCHRONIZED       = 1 << 3;
        /// Driving member of a locomotion group.
        const LOCOMOTION         = 1 << 4;
        /// Begin event already emitted for the current run.
        const STARTED            = 1 << 5;
        /// Frozen in place without leaving the running set.
        const PAUSED             = 1 << 6;
        /// Fading out into its cross-fade successor.
        const FADING_OUT         = 1 << 7;
        /// Fading in from a predecessor.
        const FADING_IN          = 1 << 8;
        /// Finish on the next advance.
        const STOP_REQUESTED     = 1 << 9;

        /// Group roles survive the end of a run.
        const ROLES = Self::SYNCHRONIZED.bits() | Self::LOCOMOTION.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Once,
    Loop,
    PingPong,
}

/// What an [`AnimationTarget`] receives after each advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSample {
    /// Local clip time in seconds.
    pub time: f32,
    /// `time / duration`, in `[0, 1]`.
    pub progress: f32,
    pub weight: f32,
}

/// Consumer of clip samples (pose blending, property animation).
pub trait AnimationTarget {
    fn apply(&mut self, sample: ClipSample);
}

#[derive(Debug, Clone, Copy)]
struct CrossFade {
    elapsed: f32,
    duration: f32,
    start_weight: f32,
}

impl CrossFade {
    fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }
}

pub struct AnimationClip {
    id: String,
    duration: f32,
    speed: f32,
    loop_mode: LoopMode,
    max_cycles: Option<u32>,

    time: f32,
    elapsed: f32,
    cycles: u32,
    blend_weight: f32,
    state: ClipStateFlags,

    cross_fade_to: Option<ClipKey>,
    fade: Option<CrossFade>,

    pending_events: SmallVec<[ClipEvent; 2]>,
    pub(crate) listeners: Vec<Box<dyn ClipListener>>,
    target: Option<Box<dyn AnimationTarget>>,
}

impl AnimationClip {
    /// Creates a non-looping clip of `duration` seconds at full weight.
    #[must_use]
    pub fn new(id: impl Into<String>, duration: f32) -> Self {
        Self {
            id: id.into(),
            duration: duration.max(0.0),
            speed: 1.0,
            loop_mode: LoopMode::Once,
            max_cycles: None,
            time: 0.0,
            elapsed: 0.0,
            cycles: 0,
            blend_weight: 1.0,
            state: ClipStateFlags::empty(),
            cross_fade_to: None,
            fade: None,
            pending_events: SmallVec::new(),
            listeners: Vec::new(),
            target: None,
        }
    }

    #[must_use]
    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    /// Limits `Loop`/`PingPong` playback to `cycles` full cycles.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self.rewind();
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.set_blend_weight(weight);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl AnimationTarget + 'static) -> Self {
        self.target = Some(Box::new(target));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    #[inline]
    #[must_use]
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Local playback time in seconds.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Total unsigned time advanced since the run started.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Completed Loop/PingPong cycles in the current run.
    #[inline]
    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    #[inline]
    #[must_use]
    pub fn blend_weight(&self) -> f32 {
        self.blend_weight
    }

    pub fn set_blend_weight(&mut self, weight: f32) {
        self.blend_weight = weight.clamp(0.0, 1.0);
    }

    // ========================================================================
    // Flags
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn state(&self) -> ClipStateFlags {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn has_flags(&self, flags: ClipStateFlags) -> bool {
        self.state.contains(flags)
    }

    /// Sets `flags`. Setting one group role clears the other.
    pub fn set_flags(&mut self, flags: ClipStateFlags) {
        if flags.contains(ClipStateFlags::ROLES) {
            log::error!(
                "clip '{}': LOCOMOTION and SYNCHRONIZED are exclusive roles",
                self.id
            );
            debug_assert!(false, "LOCOMOTION and SYNCHRONIZED are exclusive roles");
            return;
        }
        if flags.intersects(ClipStateFlags::ROLES) {
            self.state.remove(ClipStateFlags::ROLES);
        }
        self.state.insert(flags);
    }

    pub fn clear_flags(&mut self, flags: ClipStateFlags) {
        self.state.remove(flags);
    }

    pub fn set_locomotion(&mut self, locomotion: bool) {
        if locomotion {
            self.set_flags(ClipStateFlags::LOCOMOTION);
        } else {
            self.clear_flags(ClipStateFlags::LOCOMOTION);
        }
    }

    pub fn set_synchronized(&mut self, synchronized: bool) {
        if synchronized {
            self.set_flags(ClipStateFlags::SYNCHRONIZED);
        } else {
            self.clear_flags(ClipStateFlags::SYNCHRONIZED);
        }
    }

    #[inline]
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.contains(ClipStateFlags::PLAYING)
    }

    // ========================================================================
    // Cross-fade link
    // ========================================================================

    /// The clip that inherits full weight when this one finishes.
    #[inline]
    #[must_use]
    pub fn cross_fade_to(&self) -> Option<ClipKey> {
        self.cross_fade_to
    }

    /// Links a successor without starting a fade.
    pub fn set_cross_fade_to(&mut self, successor: Option<ClipKey>) {
        self.cross_fade_to = successor;
    }

    /// Fade-out progress in `[0, 1]` while fading into a successor.
    #[must_use]
    pub fn fade_progress(&self) -> Option<f32> {
        self.fade.as_ref().map(CrossFade::progress)
    }

    pub(crate) fn begin_fade_out(&mut self, successor: ClipKey, duration: f32) {
        self.cross_fade_to = Some(successor);
        self.fade = Some(CrossFade {
            elapsed: 0.0,
            duration: duration.max(0.0),
            start_weight: self.blend_weight,
        });
        self.state
            .insert(ClipStateFlags::FADING_OUT | ClipStateFlags::MARKED_FOR_REMOVAL);
    }

    pub(crate) fn cancel_fade_out(&mut self) {
        self.cross_fade_to = None;
        self.fade = None;
        self.state
            .remove(ClipStateFlags::FADING_OUT | ClipStateFlags::MARKED_FOR_REMOVAL);
    }

    /// Drops the successor link and any fade in progress.
    pub(crate) fn unlink(&mut self) {
        self.cross_fade_to = None;
        self.fade = None;
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    pub fn add_listener(&mut self, listener: impl ClipListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Registers a listener for [`ClipEvent::End`] only.
    pub fn on_end(&mut self, mut callback: impl FnMut(&mut AnimationController, ClipKey) + 'static) {
        self.add_listener(
            move |controller: &mut AnimationController, clip: ClipKey, event: ClipEvent| {
                if event == ClipEvent::End {
                    callback(controller, clip);
                }
            },
        );
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn take_events(&mut self) -> SmallVec<[ClipEvent; 2]> {
        std::mem::take(&mut self.pending_events)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Moves the playhead back to the start of the clip.
    pub fn rewind(&mut self) {
        self.time = if self.speed < 0.0 { self.duration } else { 0.0 };
        self.elapsed = 0.0;
        self.cycles = 0;
    }

    #[must_use]
    pub fn sample(&self) -> ClipSample {
        let progress = if self.duration > 0.0 {
            (self.time / self.duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        ClipSample {
            time: self.time,
            progress,
            weight: self.blend_weight,
        }
    }

    pub(crate) fn apply_target(&mut self) {
        let sample = self.sample();
        if let Some(target) = self.target.as_mut() {
            target.apply(sample);
        }
    }

    /// Advances the clip by `dt` seconds.
    ///
    /// Returns `true` exactly when the clip reached a terminal condition: the
    /// end of a `Once` clip, the last allowed cycle, a completed fade-out, a
    /// removal-marked clip at zero weight, or a requested stop.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.state.contains(ClipStateFlags::STOP_REQUESTED) {
            return true;
        }
        if self.state.contains(ClipStateFlags::MARKED_FOR_REMOVAL) && self.blend_weight <= 0.0 {
            return true;
        }
        if self.state.contains(ClipStateFlags::PAUSED) {
            return false;
        }

        if !self.state.contains(ClipStateFlags::STARTED) {
            self.state.insert(ClipStateFlags::STARTED);
            self.pending_events.push(ClipEvent::Begin);
        }

        let mut finished = self.step_time(dt);

        if let Some(fade) = self.fade.as_mut() {
            fade.elapsed += dt;
            let progress = fade.progress();
            self.blend_weight = fade.start_weight * (1.0 - progress);
            if progress >= 1.0 {
                finished = true;
            }
        }

        finished
    }

    fn step_time(&mut self, dt: f32) -> bool {
        let delta = dt * self.speed;
        self.elapsed += delta.abs();

        if self.duration <= 0.0 {
            return self.loop_mode == LoopMode::Once;
        }

        let cycles = match self.loop_mode {
            LoopMode::Once => {
                self.time = (self.time + delta).clamp(0.0, self.duration);
                return if self.speed >= 0.0 {
                    self.time >= self.duration
                } else {
                    self.time <= 0.0
                };
            }
            LoopMode::Loop => {
                self.time = (self.time + delta).rem_euclid(self.duration);
                (self.elapsed / self.duration).floor() as u32
            }
            LoopMode::PingPong => {
                let period = 2.0 * self.duration;
                let phase = self.elapsed.rem_euclid(period);
                let forward = if phase > self.duration { period - phase } else { phase };
                self.time = if self.speed < 0.0 {
                    self.duration - forward
                } else {
                    forward
                };
                (self.elapsed / period).floor() as u32
            }
        };

        if cycles > self.cycles {
            self.cycles = cycles;
            self.pending_events.push(ClipEvent::Loop);
        }

        match self.max_cycles {
            Some(max) if self.cycles >= max => {
                // Park on the cycle's final frame.
                self.time = match (self.loop_mode, self.speed < 0.0) {
                    (LoopMode::Loop, false) | (LoopMode::PingPong, true) => self.duration,
                    _ => 0.0,
                };
                true
            }
            _ => false,
        }
    }

    /// Closes out the current run. Group roles and the cross-fade link are
    /// left for the scheduler to resolve. The blend weight is kept;
    /// [`AnimationController::play`] resets it.
    pub(crate) fn end_run(&mut self) {
        self.state &= ClipStateFlags::ROLES;
        self.fade = None;
        self.pending_events.clear();
    }
}

impl std::fmt::Debug for AnimationClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationClip")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("loop_mode", &self.loop_mode)
            .field("time", &self.time)
            .field("blend_weight", &self.blend_weight)
            .field("state", &self.state)
            .field("cross_fade_to", &self.cross_fade_to)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn once_finishes_at_end_and_clamps() {
        let mut clip = AnimationClip::new("jump", 1.0);
        assert!(!clip.advance(0.5));
        assert!(approx(clip.time(), 0.5));
        assert!(clip.advance(0.75));
        assert!(approx(clip.time(), 1.0));
    }

    #[test]
    fn once_reverse_finishes_at_zero() {
        let mut clip = AnimationClip::new("jump", 1.0).with_speed(-1.0);
        assert!(approx(clip.time(), 1.0));
        assert!(!clip.advance(0.25));
        assert!(approx(clip.time(), 0.75));
        assert!(clip.advance(1.0));
        assert!(approx(clip.time(), 0.0));
    }

    #[test]
    fn loop_wraps_and_counts_cycles() {
        let mut clip = AnimationClip::new("walk", 1.0).with_loop_mode(LoopMode::Loop);
        assert!(!clip.advance(0.75));
        assert!(!clip.advance(0.5));
        assert!(approx(clip.time(), 0.25));
        assert_eq!(clip.cycles(), 1);

        let events = clip.take_events();
        assert_eq!(events.as_slice(), &[ClipEvent::Begin, ClipEvent::Loop]);
    }

    #[test]
    fn loop_with_max_cycles_finishes() {
        let mut clip = AnimationClip::new("wave", 1.0)
            .with_loop_mode(LoopMode::Loop)
            .with_max_cycles(2);
        assert!(!clip.advance(1.5));
        assert!(clip.advance(0.5));
        assert!(approx(clip.time(), 1.0));
    }

    #[test]
    fn ping_pong_reflects() {
        let mut clip = AnimationClip::new("sway", 1.0).with_loop_mode(LoopMode::PingPong);
        assert!(!clip.advance(1.5));
        assert!(approx(clip.time(), 0.5));
        assert!(!clip.advance(0.75));
        assert!(approx(clip.time(), 0.25));
        assert_eq!(clip.cycles(), 1);
    }

    #[test]
    fn stop_request_finishes_immediately() {
        let mut clip = AnimationClip::new("idle", 10.0).with_loop_mode(LoopMode::Loop);
        clip.set_flags(ClipStateFlags::STOP_REQUESTED);
        assert!(clip.advance(0.0));
    }

    #[test]
    fn marked_clip_at_zero_weight_finishes() {
        let mut clip = AnimationClip::new("idle", 10.0).with_weight(0.0);
        clip.set_flags(ClipStateFlags::MARKED_FOR_REMOVAL);
        assert!(clip.advance(0.1));
    }

    #[test]
    fn paused_clip_holds_time() {
        let mut clip = AnimationClip::new("idle", 10.0);
        clip.set_flags(ClipStateFlags::PAUSED);
        assert!(!clip.advance(1.0));
        assert!(approx(clip.time(), 0.0));
    }

    #[test]
    fn roles_are_exclusive() {
        let mut clip = AnimationClip::new("run", 1.0);
        clip.set_synchronized(true);
        clip.set_locomotion(true);
        assert!(clip.has_flags(ClipStateFlags::LOCOMOTION));
        assert!(!clip.has_flags(ClipStateFlags::SYNCHRONIZED));
    }

    #[test]
    fn end_run_keeps_roles_only() {
        let mut clip = AnimationClip::new("run", 1.0);
        clip.set_synchronized(true);
        clip.set_flags(ClipStateFlags::PLAYING | ClipStateFlags::MARKED_FOR_REMOVAL);
        clip.end_run();
        assert_eq!(clip.state(), ClipStateFlags::SYNCHRONIZED);
    }

    #[test]
    fn target_receives_samples() {
        struct Recorder(Rc<RefCell<Vec<ClipSample>>>);
        impl AnimationTarget for Recorder {
            fn apply(&mut self, sample: ClipSample) {
                self.0.borrow_mut().push(sample);
            }
        }

        let samples = Rc::new(RefCell::new(Vec::new()));
        let mut clip =
            AnimationClip::new("wave", 2.0).with_target(Recorder(Rc::clone(&samples)));
        clip.advance(1.0);
        clip.apply_target();

        let samples = samples.borrow();
        assert_eq!(samples.len(), 1);
        assert!(approx(samples[0].progress, 0.5));
        assert!(approx(samples[0].weight, 1.0));
    }
}
