//! Scene Integration Tests
//!
//! Tests for:
//! - Transform: dirty checking and local matrix rebuild
//! - TransformChanges: immediate delivery, suspension, nesting, observers

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};
use slotmap::SlotMap;
use strider::prelude::*;

fn nodes(n: usize) -> Vec<NodeKey> {
    let mut map: SlotMap<NodeKey, ()> = SlotMap::with_key();
    (0..n).map(|_| map.insert(())).collect()
}

fn collect_batches(changes: &TransformChanges) -> Rc<RefCell<Vec<Vec<NodeKey>>>> {
    let batches = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    changes.observe(move |batch| sink.borrow_mut().push(batch.to_vec()));
    batches
}

// ============================================================================
// Transform
// ============================================================================

#[test]
fn transform_defaults_to_identity() {
    let transform = Transform::default();
    assert_eq!(transform.position, Vec3::ZERO);
    assert_eq!(transform.rotation, Quat::IDENTITY);
    assert_eq!(transform.scale, Vec3::ONE);
}

#[test]
fn transform_sync_rebuilds_local_matrix() {
    let node = nodes(1)[0];
    let changes = TransformChanges::new();
    let mut transform = Transform::new();

    transform.position = Vec3::new(0.0, 1.0, 0.0);
    transform.scale = Vec3::splat(2.0);
    assert!(transform.sync(node, &changes));

    let moved = transform
        .local_matrix()
        .transform_point3(Vec3::new(1.0, 0.0, 0.0));
    assert!((moved - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-5);
}

#[test]
fn transform_sync_skips_unchanged_state() {
    let node = nodes(1)[0];
    let changes = TransformChanges::new();
    let mut transform = Transform::new();

    transform.sync(node, &changes);
    assert!(!transform.sync(node, &changes));
    assert_eq!(changes.batches_delivered(), 1);

    transform.mark_dirty();
    assert!(transform.sync(node, &changes));
    assert_eq!(changes.batches_delivered(), 2);
}

#[test]
fn transform_euler_rotation() {
    let node = nodes(1)[0];
    let changes = TransformChanges::new();
    let mut transform = Transform::new();

    transform.set_rotation_euler(0.0, std::f32::consts::FRAC_PI_2, 0.0);
    assert!(transform.sync(node, &changes));

    let rotated = transform
        .local_matrix()
        .transform_vector3(Vec3::new(1.0, 0.0, 0.0));
    assert!((rotated - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
}

// ============================================================================
// Change Notification
// ============================================================================

#[test]
fn changes_deliver_immediately_when_not_suspended() {
    let k = nodes(2);
    let changes = TransformChanges::new();
    let batches = collect_batches(&changes);

    changes.record(k[0]);
    changes.record(k[1]);

    assert_eq!(*batches.borrow(), vec![vec![k[0]], vec![k[1]]]);
}

#[test]
fn suspension_batches_transform_syncs() {
    let k = nodes(3);
    let changes = TransformChanges::new();
    let batches = collect_batches(&changes);
    let mut transforms: Vec<Transform> = (0..3).map(|_| Transform::new()).collect();

    {
        let _guard = changes.suspend();
        for (node, transform) in k.iter().zip(&mut transforms) {
            transform.sync(*node, &changes);
        }
        transforms[0].position.x = 5.0;
        transforms[0].sync(k[0], &changes);

        assert!(batches.borrow().is_empty());
        assert_eq!(changes.pending_len(), 3);
    }

    assert_eq!(*batches.borrow(), vec![k.clone()]);
    assert_eq!(changes.pending_len(), 0);
}

#[test]
fn empty_suspension_delivers_nothing() {
    let changes = TransformChanges::new();
    let batches = collect_batches(&changes);

    drop(changes.suspend());

    assert!(batches.borrow().is_empty());
    assert_eq!(changes.batches_delivered(), 0);
}

#[test]
fn nested_suspension_flushes_at_outermost_guard() {
    let k = nodes(2);
    let changes = TransformChanges::new();
    let batches = collect_batches(&changes);

    let outer = changes.suspend();
    {
        let _inner = changes.suspend();
        changes.record(k[0]);
    }
    assert!(changes.is_suspended());
    changes.record(k[1]);
    drop(outer);

    assert_eq!(*batches.borrow(), vec![vec![k[0], k[1]]]);
}

#[test]
fn observer_registered_during_delivery_sees_later_batches() {
    let k = nodes(2);
    let changes = Rc::new(TransformChanges::new());
    let late = Rc::new(RefCell::new(Vec::new()));

    let registrar = Rc::clone(&changes);
    let late_sink = Rc::clone(&late);
    let mut registered = false;
    changes.observe(move |_| {
        if !registered {
            registered = true;
            let sink = Rc::clone(&late_sink);
            registrar.observe(move |batch| sink.borrow_mut().extend_from_slice(batch));
        }
    });

    changes.record(k[0]);
    assert!(late.borrow().is_empty());

    changes.record(k[1]);
    assert_eq!(*late.borrow(), vec![k[1]]);
}
