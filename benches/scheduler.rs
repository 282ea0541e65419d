use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use strider::prelude::*;

const STEP: f32 = 1.0 / 60.0;

fn populated(count: usize) -> (AnimationController, Vec<ClipKey>) {
    let mut controller = AnimationController::new(AnimationSettings {
        initial_capacity: count,
        ..Default::default()
    });
    controller.initialize();

    let keys = (0..count)
        .map(|i| {
            let clip = AnimationClip::new(format!("clip_{i}"), 1.0 + (i % 7) as f32 * 0.1)
                .with_loop_mode(LoopMode::Loop);
            let key = controller.create_clip(clip);
            controller.play(key);
            key
        })
        .collect();
    (controller, keys)
}

fn update_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_looping");
    for count in [16usize, 128, 1024] {
        let (mut controller, _keys) = populated(count);
        let changes = TransformChanges::new();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| controller.update(black_box(STEP), &changes));
        });
    }
    group.finish();
}

fn cross_fade_benchmark(c: &mut Criterion) {
    c.bench_function("cross_fade_cycle", |b| {
        let (mut controller, keys) = populated(64);
        let changes = TransformChanges::new();
        let mut i = 0;
        b.iter(|| {
            let from = keys[i % keys.len()];
            let to = keys[(i + 1) % keys.len()];
            i += 1;
            controller.cross_fade(from, to, 4.0 * STEP);
            for _ in 0..5 {
                controller.update(STEP, &changes);
            }
            black_box(controller.running_clips().len());
        });
    });
}

fn schedule_benchmark(c: &mut Criterion) {
    c.bench_function("schedule_unschedule_256", |b| {
        let (mut controller, keys) = populated(256);
        for &key in &keys {
            controller.unschedule(key);
        }
        b.iter(|| {
            for &key in &keys {
                controller.schedule(key);
            }
            for &key in keys.iter().rev() {
                controller.unschedule(key);
            }
            black_box(controller.state());
        });
    });
}

criterion_group!(
    benches,
    update_benchmark,
    cross_fade_benchmark,
    schedule_benchmark
);
criterion_main!(benches);
