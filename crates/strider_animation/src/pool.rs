//! Clip Pool
//!
//! Reference-counted arena holding every live [`AnimationClip`].
//!
//! # Ownership
//! - [`ClipPool::insert`] hands out a [`ClipKey`] carrying one reference
//!   (the creator's).
//! - Every additional holder (the scheduler, a listener that keeps a clip
//!   around) calls [`ClipPool::retain`] and later [`ClipPool::release`].
//! - The clip is dropped the moment its count reaches zero. Keys are
//!   versioned, so a stale key simply stops resolving.

use slotmap::{SlotMap, new_key_type};

use crate::clip::AnimationClip;

new_key_type! {
    pub struct ClipKey;
}

/// Pool slot: the clip plus its bookkeeping.
pub(crate) struct ClipEntry {
    pub(crate) clip: AnimationClip,
    ref_count: u32,
    /// Whether the scheduler currently holds this clip in its running set.
    pub(crate) scheduled: bool,
    /// Update pass during which the clip last entered the running set.
    pub(crate) scheduled_pass: u64,
}

#[derive(Default)]
pub struct ClipPool {
    entries: SlotMap<ClipKey, ClipEntry>,
}

impl ClipPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// Stores `clip` with a reference count of one.
    pub fn insert(&mut self, clip: AnimationClip) -> ClipKey {
        let key = self.entries.insert(ClipEntry {
            clip,
            ref_count: 1,
            scheduled: false,
            scheduled_pass: 0,
        });
        log::trace!("clip {key:?} created");
        key
    }

    /// Adds a reference. Returns the new count, or `None` for a stale key.
    pub fn retain(&mut self, key: ClipKey) -> Option<u32> {
        let entry = self.entries.get_mut(key)?;
        entry.ref_count += 1;
        Some(entry.ref_count)
    }

    /// Drops a reference, destroying the clip when none remain.
    ///
    /// Returns `true` when this call destroyed the clip.
    pub fn release(&mut self, key: ClipKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return false;
        }

        if let Some(entry) = self.entries.remove(key) {
            log::trace!("clip {key:?} ('{}') destroyed", entry.clip.id());
        }
        true
    }

    /// Current reference count; zero once the clip is gone.
    #[inline]
    #[must_use]
    pub fn ref_count(&self, key: ClipKey) -> u32 {
        self.entries.get(key).map_or(0, |e| e.ref_count)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: ClipKey) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: ClipKey) -> Option<&AnimationClip> {
        self.entries.get(key).map(|e| &e.clip)
    }

    #[inline]
    pub fn get_mut(&mut self, key: ClipKey) -> Option<&mut AnimationClip> {
        self.entries.get_mut(key).map(|e| &mut e.clip)
    }

    #[inline]
    pub(crate) fn entry(&self, key: ClipKey) -> Option<&ClipEntry> {
        self.entries.get(key)
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, key: ClipKey) -> Option<&mut ClipEntry> {
        self.entries.get_mut(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ClipPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(key, entry)| (key, (entry.clip.id(), entry.ref_count))),
            )
            .finish()
    }
}
