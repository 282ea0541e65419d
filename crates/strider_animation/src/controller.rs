//! Animation Controller
//!
//! Owns the running set of clips and advances it once per frame.
//!
//! # State machine
//!
//! ```text
//! Stopped --initialize--> Idle --schedule--> Running --(set empties)--> Idle
//!    ^                       \                 |  ^
//!    |                        \--pause-->   pause  resume
//!    +------finalize-------------------------  v  |
//!                                           Paused
//! ```
//!
//! `unschedule` of the last running clip lands in `Idle` from `Paused` too.
//!
//! # Termination protocol
//!
//! Each [`AnimationController::update`] visits the clips that were running
//! when the pass began, in order:
//!
//! 1. A `RESTARTED` clip (its previous run was closed out by `play`) raises
//!    `End` and moves to the back of the running set without advancing.
//! 2. Otherwise the clip advances. When it finishes:
//!    - a `LOCOMOTION` clip force-finishes every `SYNCHRONIZED` clip in the
//!      running set, promoting each one's cross-fade successor;
//!    - its own cross-fade chain is promoted for at most
//!      [`MAX_CROSS_FADE_HOPS`] links;
//!    - the scheduler's reference is released.
//!
//! Listeners run in the middle of this and may call back into the
//! controller. Every visited clip is retained for the duration of its step so
//! it cannot be destroyed underneath the pass, and clips removed by a
//! listener are skipped when the pass reaches them.
//!
//! # Misuse
//!
//! Stale keys, double scheduling, unscheduling a clip that is not running and
//! scheduling on a stopped controller are contract violations: they trip a
//! debug assertion, and in release builds they are logged and ignored.

use smallvec::SmallVec;
use strider_scene::TransformChanges;

use crate::clip::{AnimationClip, ClipStateFlags};
use crate::listener::ClipEvent;
use crate::pool::{ClipKey, ClipPool};
use crate::settings::{AnimationSettings, PausedSchedulePolicy};

/// Links of a finished clip's cross-fade chain that get promoted.
pub const MAX_CROSS_FADE_HOPS: usize = 2;

macro_rules! contract_violation {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        debug_assert!(false, $($arg)*);
    }};
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Stopped,
    Idle,
    Running,
    Paused,
}

pub struct AnimationController {
    state: ControllerState,
    settings: AnimationSettings,
    clips: ClipPool,
    running: Vec<ClipKey>,
    /// Number of update passes started.
    pass: u64,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new(AnimationSettings::default())
    }
}

impl AnimationController {
    #[must_use]
    pub fn new(settings: AnimationSettings) -> Self {
        Self {
            state: ControllerState::Stopped,
            clips: ClipPool::with_capacity(settings.initial_capacity),
            running: Vec::new(),
            pass: 0,
            settings,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    fn set_state(&mut self, state: ControllerState) {
        if self.state != state {
            log::debug!("AnimationController: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// `Stopped -> Idle`.
    pub fn initialize(&mut self) {
        if self.state != ControllerState::Stopped {
            log::warn!("AnimationController::initialize called while {:?}", self.state);
            return;
        }
        self.running.reserve(self.settings.initial_capacity);
        self.set_state(ControllerState::Idle);
    }

    /// Releases every running clip and stops. Safe to call repeatedly.
    pub fn finalize(&mut self) {
        for key in std::mem::take(&mut self.running) {
            if let Some(entry) = self.clips.entry_mut(key) {
                entry.scheduled = false;
            }
            self.clips.release(key);
        }
        self.set_state(ControllerState::Stopped);
    }

    /// Freezes updates.
    pub fn pause(&mut self) {
        self.set_state(ControllerState::Paused);
    }

    /// Resumes updates; `Idle` if nothing is scheduled.
    pub fn resume(&mut self) {
        if self.state == ControllerState::Stopped {
            log::warn!("AnimationController::resume called on a stopped controller");
            return;
        }
        if self.running.is_empty() {
            self.set_state(ControllerState::Idle);
        } else {
            self.set_state(ControllerState::Running);
        }
    }

    // ========================================================================
    // Clip ownership
    // ========================================================================

    /// Moves `clip` into the pool. The returned key holds one reference,
    /// owned by the caller.
    pub fn create_clip(&mut self, clip: AnimationClip) -> ClipKey {
        self.clips.insert(clip)
    }

    /// Takes an additional reference on `key`.
    pub fn retain_clip(&mut self, key: ClipKey) {
        if self.clips.retain(key).is_none() {
            contract_violation!("retain_clip: stale clip key {key:?}");
        }
    }

    /// Drops a reference on `key`. Returns `true` if the clip was destroyed.
    pub fn release_clip(&mut self, key: ClipKey) -> bool {
        if !self.clips.contains(key) {
            contract_violation!("release_clip: stale clip key {key:?}");
            return false;
        }
        self.clips.release(key)
    }

    #[inline]
    #[must_use]
    pub fn clip(&self, key: ClipKey) -> Option<&AnimationClip> {
        self.clips.get(key)
    }

    #[inline]
    pub fn clip_mut(&mut self, key: ClipKey) -> Option<&mut AnimationClip> {
        self.clips.get_mut(key)
    }

    #[inline]
    #[must_use]
    pub fn ref_count(&self, key: ClipKey) -> u32 {
        self.clips.ref_count(key)
    }

    #[inline]
    #[must_use]
    pub fn clips(&self) -> &ClipPool {
        &self.clips
    }

    // ========================================================================
    // Running set
    // ========================================================================

    /// Keys of the running clips, in visiting order.
    #[inline]
    #[must_use]
    pub fn running_clips(&self) -> &[ClipKey] {
        &self.running
    }

    #[inline]
    #[must_use]
    pub fn is_scheduled(&self, key: ClipKey) -> bool {
        self.clips.entry(key).is_some_and(|e| e.scheduled)
    }

    /// Adds `key` to the running set, taking the scheduler's reference.
    pub fn schedule(&mut self, key: ClipKey) {
        if self.state == ControllerState::Stopped {
            contract_violation!("schedule: controller is stopped");
            return;
        }
        let Some(entry) = self.clips.entry_mut(key) else {
            contract_violation!("schedule: stale clip key {key:?}");
            return;
        };
        if entry.scheduled {
            contract_violation!("schedule: clip {key:?} is already running");
            return;
        }
        entry.scheduled = true;
        entry.scheduled_pass = self.pass;
        self.clips.retain(key);

        let was_empty = self.running.is_empty();
        self.running.push(key);
        log::trace!("clip {key:?} scheduled ({} running)", self.running.len());

        if was_empty {
            match (self.state, self.settings.paused_schedule) {
                (ControllerState::Paused, PausedSchedulePolicy::StayPaused) => {}
                _ => self.set_state(ControllerState::Running),
            }
        }
    }

    /// Removes `key` from the running set and releases the scheduler's
    /// reference. Emptying the set moves a paused or running controller to
    /// `Idle`.
    pub fn unschedule(&mut self, key: ClipKey) {
        if !self.detach(key) {
            contract_violation!("unschedule: clip {key:?} is not running");
            return;
        }
        if self.running.is_empty() && self.state != ControllerState::Stopped {
            self.set_state(ControllerState::Idle);
        }
    }

    /// Requests a stop on every running clip. They finish on the next update.
    pub fn stop_all(&mut self) {
        for &key in &self.running {
            if let Some(clip) = self.clips.get_mut(key) {
                clip.set_flags(ClipStateFlags::STOP_REQUESTED);
            }
        }
    }

    fn settle_if_empty(&mut self) {
        if self.running.is_empty() && self.state == ControllerState::Running {
            self.set_state(ControllerState::Idle);
        }
    }

    /// Drops `key` from the running set if present. Returns whether it was.
    fn detach(&mut self, key: ClipKey) -> bool {
        let Some(index) = self.running.iter().position(|&k| k == key) else {
            return false;
        };
        self.running.remove(index);
        if let Some(entry) = self.clips.entry_mut(key) {
            entry.scheduled = false;
        }
        self.clips.release(key);
        log::trace!("clip {key:?} unscheduled ({} running)", self.running.len());
        true
    }

    // ========================================================================
    // Clip control
    // ========================================================================

    /// Starts `key` at full weight from the top.
    ///
    /// A clip that is already running has its current run closed out here
    /// (fade, link and pending removal dropped) and is flagged `RESTARTED`;
    /// the next update raises its `End` and re-queues it.
    pub fn play(&mut self, key: ClipKey) {
        let scheduled = self.is_scheduled(key);
        let Some(clip) = self.clips.get_mut(key) else {
            contract_violation!("play: stale clip key {key:?}");
            return;
        };

        clip.rewind();
        clip.set_blend_weight(1.0);
        if scheduled {
            clip.end_run();
            clip.unlink();
            clip.set_flags(ClipStateFlags::PLAYING | ClipStateFlags::RESTARTED);
        } else {
            clip.set_flags(ClipStateFlags::PLAYING);
            self.schedule(key);
        }
    }

    /// Requests that `key` finish on the next update.
    pub fn stop(&mut self, key: ClipKey) {
        let scheduled = self.is_scheduled(key);
        match self.clips.get_mut(key) {
            Some(clip) if scheduled => clip.set_flags(ClipStateFlags::STOP_REQUESTED),
            Some(_) => {}
            None => contract_violation!("stop: stale clip key {key:?}"),
        }
    }

    pub fn pause_clip(&mut self, key: ClipKey) {
        match self.clips.get_mut(key) {
            Some(clip) => clip.set_flags(ClipStateFlags::PAUSED),
            None => contract_violation!("pause_clip: stale clip key {key:?}"),
        }
    }

    pub fn resume_clip(&mut self, key: ClipKey) {
        match self.clips.get_mut(key) {
            Some(clip) => clip.clear_flags(ClipStateFlags::PAUSED),
            None => contract_violation!("resume_clip: stale clip key {key:?}"),
        }
    }

    /// Fades `from` out and `to` in over `duration` seconds.
    ///
    /// `from` is linked to `to` and marked for removal; `to` starts (or
    /// restarts) at zero weight. If `to` was itself fading into `from`, that
    /// fade is cancelled so the link is reversed.
    pub fn cross_fade(&mut self, from: ClipKey, to: ClipKey, duration: f32) {
        if from == to {
            contract_violation!("cross_fade: clip {from:?} cannot fade into itself");
            return;
        }
        if !self.clips.contains(from) || !self.clips.contains(to) {
            contract_violation!("cross_fade: stale clip key ({from:?} -> {to:?})");
            return;
        }

        if let Some(target) = self.clips.get_mut(to)
            && target.cross_fade_to() == Some(from)
        {
            target.cancel_fade_out();
        }

        if !self.is_scheduled(from) {
            self.play(from);
        }
        if let Some(source) = self.clips.get_mut(from) {
            source.begin_fade_out(to, duration);
        }

        self.play(to);
        if let Some(target) = self.clips.get_mut(to) {
            target.set_blend_weight(0.0);
            target.set_flags(ClipStateFlags::FADING_IN);
        }
    }

    // ========================================================================
    // Frame update
    // ========================================================================

    /// Advances every running clip by `dt` seconds.
    ///
    /// No-op unless running. Transform change delivery is suspended for the
    /// whole pass.
    pub fn update(&mut self, dt: f32, changes: &TransformChanges) {
        if self.state != ControllerState::Running {
            return;
        }
        let dt = self.settings.scale_delta(dt);

        let _suspended = changes.suspend();

        self.pass += 1;
        let pass = self.pass;
        let snapshot: SmallVec<[ClipKey; 16]> = SmallVec::from_slice(&self.running);
        for key in snapshot {
            // Skip clips removed, or removed and re-added, since the pass began.
            let visit = self
                .clips
                .entry(key)
                .is_some_and(|e| e.scheduled && e.scheduled_pass < pass);
            if visit {
                self.update_clip(key, dt);
            }
        }

        self.settle_if_empty();
    }

    fn update_clip(&mut self, key: ClipKey, dt: f32) {
        self.clips.retain(key);

        let restarted = self
            .clips
            .get(key)
            .is_some_and(|c| c.has_flags(ClipStateFlags::RESTARTED));

        if restarted {
            // `play` already closed out the previous run.
            if let Some(clip) = self.clips.get_mut(key) {
                clip.clear_flags(ClipStateFlags::RESTARTED);
            }
            self.dispatch(key, ClipEvent::End);
            if !self.is_scheduled(key)
                && let Some(clip) = self.clips.get_mut(key)
            {
                clip.clear_flags(ClipStateFlags::PLAYING);
            }
            if let Some(index) = self.running.iter().position(|&k| k == key) {
                self.running.remove(index);
                self.running.push(key);
            }
        } else {
            let finished = match self.clips.get_mut(key) {
                Some(clip) => {
                    let finished = clip.advance(dt);
                    clip.apply_target();
                    finished
                }
                None => false,
            };

            if !finished {
                self.push_fade_weight(key);
            }
            self.flush_events(key);

            if finished && self.is_scheduled(key) {
                self.finish_clip(key);
            }
        }

        self.clips.release(key);
    }

    /// Mirrors a fading clip's progress onto its successor's weight.
    fn push_fade_weight(&mut self, key: ClipKey) {
        let Some(clip) = self.clips.get(key) else {
            return;
        };
        let (Some(successor), Some(progress)) = (clip.cross_fade_to(), clip.fade_progress()) else {
            return;
        };
        if let Some(next) = self.clips.get_mut(successor) {
            next.set_blend_weight(progress);
        }
    }

    fn finish_clip(&mut self, key: ClipKey) {
        self.end_clip(key);

        let locomotion = self
            .clips
            .get(key)
            .is_some_and(|c| c.has_flags(ClipStateFlags::LOCOMOTION));
        if locomotion {
            self.finish_synchronized(key);
        }

        let mut next = self.clips.get(key).and_then(AnimationClip::cross_fade_to);
        for _ in 0..MAX_CROSS_FADE_HOPS {
            let Some(successor) = next else {
                break;
            };
            next = self.promote(successor);
        }

        if let Some(clip) = self.clips.get_mut(key) {
            clip.unlink();
            log::debug!("clip {key:?} ('{}') finished", clip.id());
        }
        self.detach(key);
    }

    /// Force-finishes every `SYNCHRONIZED` clip driven by `leader`.
    fn finish_synchronized(&mut self, leader: ClipKey) {
        let group: SmallVec<[ClipKey; 8]> = self
            .running
            .iter()
            .copied()
            .filter(|&k| {
                k != leader
                    && self
                        .clips
                        .get(k)
                        .is_some_and(|c| c.has_flags(ClipStateFlags::SYNCHRONIZED))
            })
            .collect();

        log::debug!(
            "locomotion clip {leader:?} finished, finalizing {} synchronized clips",
            group.len()
        );

        for member in group {
            // An earlier member's listener may already have removed it.
            if !self.is_scheduled(member) {
                continue;
            }
            self.clips.retain(member);

            self.end_clip(member);
            if let Some(successor) = self.clips.get(member).and_then(AnimationClip::cross_fade_to) {
                self.promote(successor);
            }
            if let Some(clip) = self.clips.get_mut(member) {
                clip.unlink();
            }
            self.detach(member);

            self.clips.release(member);
        }
    }

    /// Gives `key` full weight and cancels its pending removal. Returns the
    /// next link of its chain.
    fn promote(&mut self, key: ClipKey) -> Option<ClipKey> {
        let clip = self.clips.get_mut(key)?;
        clip.set_blend_weight(1.0);
        clip.clear_flags(ClipStateFlags::MARKED_FOR_REMOVAL | ClipStateFlags::FADING_IN);
        clip.cross_fade_to()
    }

    fn end_clip(&mut self, key: ClipKey) {
        if let Some(clip) = self.clips.get_mut(key) {
            clip.end_run();
        }
        self.dispatch(key, ClipEvent::End);
    }

    fn flush_events(&mut self, key: ClipKey) {
        let Some(clip) = self.clips.get_mut(key) else {
            return;
        };
        for event in clip.take_events() {
            self.dispatch(key, event);
        }
    }

    fn dispatch(&mut self, key: ClipKey, event: ClipEvent) {
        let Some(clip) = self.clips.get_mut(key) else {
            return;
        };
        let mut listeners = std::mem::take(&mut clip.listeners);
        if listeners.is_empty() {
            return;
        }

        for listener in &mut listeners {
            listener.on_event(self, key, event);
        }

        // Keep listeners registered during dispatch, after the existing ones.
        if let Some(clip) = self.clips.get_mut(key) {
            let added = std::mem::replace(&mut clip.listeners, listeners);
            clip.listeners.extend(added);
        }
    }
}

impl std::fmt::Debug for AnimationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationController")
            .field("state", &self.state)
            .field("running", &self.running)
            .field("clips", &self.clips)
            .finish_non_exhaustive()
    }
}
