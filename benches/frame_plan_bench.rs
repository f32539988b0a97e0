//! Frame planning benchmarks.
//!
//! Measures the CPU work done once per frame before any GPU command is
//! recorded: building and validating the plan, and reallocating targets on
//! resize.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use lantern::renderer::graph::FramePlan;
use lantern::renderer::graph::passes::{AoTargets, BloomTargets, TaaHistory};
use lantern::renderer::resources::{GBuffer, ResourcePool, TextureDesc, TextureFactory};
use lantern::settings::{AntiAliasMethod, AoMethod, RenderSettings};

struct DescFactory;

impl TextureFactory for DescFactory {
    type Texture = TextureDesc;

    fn allocate_texture(&self, desc: &TextureDesc) -> TextureDesc {
        desc.clone()
    }
}

fn full_settings() -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.ao = AoMethod::Gtao;
    settings.antialias = AntiAliasMethod::Taa;
    settings.bloom.set_enabled(true);
    settings
}

fn bench_plan(c: &mut Criterion) {
    let minimal = RenderSettings::default();
    let full = full_settings();

    c.bench_function("plan_build_minimal", |b| {
        b.iter(|| FramePlan::build(black_box(&minimal)));
    });
    c.bench_function("plan_build_full", |b| {
        b.iter(|| FramePlan::build(black_box(&full)));
    });
    c.bench_function("plan_build_validate_full", |b| {
        b.iter(|| FramePlan::build(black_box(&full)).validate());
    });
}

fn bench_resize(c: &mut Criterion) {
    let mut pool = ResourcePool::new();
    let mut gbuffer = GBuffer::new(&mut pool, &DescFactory, 1920, 1080);
    let mut ao = AoTargets::new(&mut pool, &DescFactory, 1920, 1080);
    ao.select(&mut pool, &DescFactory, AoMethod::Gtao);
    let mut bloom = BloomTargets::new(&mut pool, &DescFactory, 1920, 1080, 6);
    let mut history = TaaHistory::new(&mut pool, &DescFactory, 1920, 1080);

    let mut flip = false;
    c.bench_function("resize_all_targets", |b| {
        b.iter(|| {
            flip = !flip;
            let (w, h) = if flip { (1280, 720) } else { (1920, 1080) };
            gbuffer.resize(&mut pool, &DescFactory, w, h);
            ao.resize(&mut pool, &DescFactory, w, h);
            bloom.resize(&mut pool, &DescFactory, w, h);
            history.resize(&mut pool, &DescFactory, w, h);
            black_box(pool.live_count())
        });
    });
}

criterion_group!(benches, bench_plan, bench_resize);
criterion_main!(benches);
