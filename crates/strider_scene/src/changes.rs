//! Transform change notifications.
//!
//! Every transform that changes reports its node to a [`TransformChanges`]
//! instance. Outside of a suspension the change is delivered to observers
//! straight away. While suspended (see [`TransformChanges::suspend`]) the
//! changes are collected, de-duplicated, and delivered as a single batch when
//! the outermost [`SuspendGuard`] is dropped.

use std::cell::{Cell, RefCell};

use rustc_hash::FxHashSet;

use crate::NodeKey;

type Observer = Box<dyn FnMut(&[NodeKey])>;

/// Recorder for transform change notifications.
///
/// Single-threaded and interior-mutable so that systems holding only a
/// shared reference can bracket their work with [`TransformChanges::suspend`].
#[derive(Default)]
pub struct TransformChanges {
    depth: Cell<u32>,
    pending: RefCell<Vec<NodeKey>>,
    seen: RefCell<FxHashSet<NodeKey>>,
    observers: RefCell<Vec<Observer>>,
    batches: Cell<u64>,
}

impl TransformChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer that receives each delivered batch.
    pub fn observe(&self, observer: impl FnMut(&[NodeKey]) + 'static) {
        self.observers.borrow_mut().push(Box::new(observer));
    }

    /// Suspends delivery until the returned guard is dropped.
    ///
    /// Suspensions nest; only the outermost guard flushes.
    #[must_use = "dropping the guard immediately resumes delivery"]
    pub fn suspend(&self) -> SuspendGuard<'_> {
        self.depth.set(self.depth.get() + 1);
        log::trace!("transform changes suspended (depth {})", self.depth.get());
        SuspendGuard { changes: self }
    }

    #[inline]
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.depth.get() > 0
    }

    /// Number of batches delivered so far.
    #[inline]
    #[must_use]
    pub fn batches_delivered(&self) -> u64 {
        self.batches.get()
    }

    /// Number of distinct nodes waiting for the current suspension to end.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Records that `node` changed.
    pub fn record(&self, node: NodeKey) {
        if self.is_suspended() {
            if self.seen.borrow_mut().insert(node) {
                self.pending.borrow_mut().push(node);
            }
        } else {
            self.deliver(&[node]);
        }
    }

    fn resume(&self) {
        let depth = self.depth.get();
        debug_assert!(depth > 0, "resume without matching suspend");
        let depth = depth.saturating_sub(1);
        self.depth.set(depth);
        log::trace!("transform changes resumed (depth {depth})");

        if depth == 0 {
            let batch = std::mem::take(&mut *self.pending.borrow_mut());
            self.seen.borrow_mut().clear();
            if !batch.is_empty() {
                self.deliver(&batch);
            }
        }
    }

    fn deliver(&self, batch: &[NodeKey]) {
        self.batches.set(self.batches.get() + 1);

        // Observers may subscribe further observers while being called.
        let mut observers = std::mem::take(&mut *self.observers.borrow_mut());
        for observer in &mut observers {
            observer(batch);
        }
        let mut slot = self.observers.borrow_mut();
        let added = std::mem::replace(&mut *slot, observers);
        slot.extend(added);
    }
}

impl std::fmt::Debug for TransformChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChanges")
            .field("depth", &self.depth.get())
            .field("pending", &self.pending.borrow().len())
            .field("observers", &self.observers.borrow().len())
            .field("batches", &self.batches.get())
            .finish()
    }
}

/// Scoped suspension of [`TransformChanges`] delivery.
///
/// Resumes on drop, including during unwinding.
#[derive(Debug)]
pub struct SuspendGuard<'a> {
    changes: &'a TransformChanges,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.changes.resume();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use slotmap::SlotMap;

    use super::*;

    fn keys(n: usize) -> Vec<NodeKey> {
        let mut map: SlotMap<NodeKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn collecting(changes: &TransformChanges) -> Rc<RefCell<Vec<Vec<NodeKey>>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        changes.observe(move |batch| sink.borrow_mut().push(batch.to_vec()));
        log
    }

    #[test]
    fn unsuspended_changes_deliver_immediately() {
        let changes = TransformChanges::new();
        let log = collecting(&changes);
        let k = keys(1);

        changes.record(k[0]);
        assert_eq!(*log.borrow(), vec![vec![k[0]]]);
    }

    #[test]
    fn suspended_changes_are_batched_and_deduplicated() {
        let changes = TransformChanges::new();
        let log = collecting(&changes);
        let k = keys(2);

        {
            let _guard = changes.suspend();
            changes.record(k[0]);
            changes.record(k[1]);
            changes.record(k[0]);
            assert!(log.borrow().is_empty());
            assert_eq!(changes.pending_len(), 2);
        }

        assert_eq!(*log.borrow(), vec![vec![k[0], k[1]]]);
        assert_eq!(changes.batches_delivered(), 1);
        assert!(!changes.is_suspended());
    }

    #[test]
    fn nested_suspension_flushes_once_at_outermost_guard() {
        let changes = TransformChanges::new();
        let log = collecting(&changes);
        let k = keys(1);

        let outer = changes.suspend();
        {
            let _inner = changes.suspend();
            changes.record(k[0]);
        }
        assert!(log.borrow().is_empty());
        drop(outer);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn guard_resumes_during_unwind() {
        let changes = TransformChanges::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = changes.suspend();
            panic!("pass interrupted");
        }));
        assert!(result.is_err());
        assert!(!changes.is_suspended());
    }
}
