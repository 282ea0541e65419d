use crate::controller::AnimationController;
use crate::pool::ClipKey;

/// Lifecycle events delivered to [`ClipListener`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipEvent {
    /// First advance of a run.
    Begin,
    /// A `Loop`/`PingPong` cycle completed.
    Loop,
    /// The run ended: natural completion, restart, stop, or group finalization.
    End,
}

/// Receives clip lifecycle events.
///
/// Listeners get the controller mutably and may schedule, unschedule, play
/// or release clips (including the one that raised the event) from inside
/// the callback.
pub trait ClipListener {
    fn on_event(&mut self, controller: &mut AnimationController, clip: ClipKey, event: ClipEvent);
}

impl<F> ClipListener for F
where
    F: FnMut(&mut AnimationController, ClipKey, ClipEvent),
{
    fn on_event(&mut self, controller: &mut AnimationController, clip: ClipKey, event: ClipEvent) {
        self(controller, clip, event);
    }
}
