//! Headless locomotion demo.
//!
//! Walks, cross-fades into a two-cycle run driven by a locomotion clip with a
//! synchronized arm-swing layer, and lands in idle once the run ends.
//!
//! ```text
//! RUST_LOG=debug cargo run -p locomotion [settings.json]
//! ```

use std::cell::Cell;
use std::rc::Rc;

use slotmap::SlotMap;
use strider::prelude::*;

const STEP: f32 = 1.0 / 60.0;

/// Accumulates the weighted bob height of every clip driving the hips.
struct HipBob {
    amplitude: f32,
    height: Rc<Cell<f32>>,
}

impl AnimationTarget for HipBob {
    fn apply(&mut self, sample: ClipSample) {
        let bob = (sample.progress * std::f32::consts::TAU).sin() * self.amplitude;
        self.height.set(self.height.get() + bob * sample.weight);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => AnimationSettings::from_path(path)?,
        None => AnimationSettings::default(),
    };

    let mut world = AnimationWorld::new(settings);
    let mut nodes: SlotMap<NodeKey, ()> = SlotMap::with_key();
    let hips = nodes.insert(());
    let mut hips_transform = Transform::new();
    let height = Rc::new(Cell::new(0.0));

    world.transforms.observe(|batch| log::trace!("{} transforms changed", batch.len()));

    let controller = &mut world.controller;
    let bob = |amplitude| HipBob {
        amplitude,
        height: Rc::clone(&height),
    };

    let walk = controller.create_clip(
        AnimationClip::new("walk", 1.2)
            .with_loop_mode(LoopMode::Loop)
            .with_target(bob(0.03)),
    );
    let run = controller.create_clip(
        AnimationClip::new("run", 0.8)
            .with_loop_mode(LoopMode::Loop)
            .with_max_cycles(2)
            .with_target(bob(0.08)),
    );
    let arms = controller
        .create_clip(AnimationClip::new("arm_swing", 0.4).with_loop_mode(LoopMode::PingPong));
    let idle =
        controller.create_clip(AnimationClip::new("idle", 2.0).with_loop_mode(LoopMode::Loop));

    if let Some(clip) = controller.clip_mut(run) {
        clip.set_locomotion(true);
    }
    if let Some(clip) = controller.clip_mut(arms) {
        clip.set_synchronized(true);
        clip.set_cross_fade_to(Some(idle));
    }

    for key in [walk, run, arms, idle] {
        if let Some(clip) = controller.clip_mut(key) {
            clip.add_listener(|controller: &mut AnimationController, key: ClipKey, event: ClipEvent| {
                if let Some(clip) = controller.clip(key) {
                    log::info!("{:>9} {:?}", clip.id(), event);
                }
            });
        }
    }

    // Start the run layer as soon as walking hands over.
    if let Some(clip) = controller.clip_mut(run) {
        clip.add_listener(move |controller: &mut AnimationController, _: ClipKey, event: ClipEvent| {
            if event == ClipEvent::Begin && !controller.is_scheduled(arms) {
                controller.play(arms);
            }
        });
    }
    // Idle is held at zero weight until the arm layer hands it over.
    controller.play(idle);
    if let Some(clip) = controller.clip_mut(idle) {
        clip.set_blend_weight(0.0);
    }

    controller.play(walk);

    let mut system = AnimationSystem::fixed(STEP);
    let mut frame = 0u32;
    while world.controller.running_clips().len() > 1 || frame < 60 {
        if frame == 90 {
            world.controller.cross_fade(walk, run, 0.25);
        }

        height.set(0.0);
        system.advance(&mut world, STEP);

        hips_transform.position.y = 1.0 + height.get();
        hips_transform.sync(hips, &world.transforms);

        if frame % 15 == 0 {
            let weights: Vec<String> = world
                .controller
                .running_clips()
                .iter()
                .filter_map(|&key| world.controller.clip(key))
                .map(|clip| format!("{}={:.2}", clip.id(), clip.blend_weight()))
                .collect();
            log::info!(
                "frame {frame:>4}: hips y={:.3} [{}]",
                hips_transform.position.y,
                weights.join(", ")
            );
        }

        frame += 1;
        if frame > 600 {
            anyhow::bail!("locomotion sequence did not settle");
        }
    }

    log::info!(
        "settled after {frame} frames, {} transform batches",
        world.transforms.batches_delivered()
    );
    world.controller.finalize();
    Ok(())
}
