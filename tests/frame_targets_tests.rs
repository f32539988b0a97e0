//! Frame Target Tests
//!
//! Tests for:
//! - Lazy allocation of AO, bloom, SMAA and TAA targets from the frame plan
//! - TAA history reset on re-enable, swaps only on frames where TAA ran
//! - Debug output frames provisioning no post-processing targets
//! - Resize of provisioned targets only
//! - Publishing allocated targets into the resource table

mod common;

use common::DescFactory;
use lantern::renderer::graph::passes::max_bloom_range;
use lantern::renderer::graph::{FramePlan, FrameTargets, GraphResource, ResourceTable};
use lantern::renderer::resources::{ResourcePool, TextureDesc};
use lantern::settings::{AntiAliasMethod, AoMethod, DebugOutput, RenderSettings};

struct Harness {
    pool: ResourcePool<TextureDesc>,
    targets: FrameTargets,
}

impl Harness {
    fn new(width: u32, height: u32) -> Self {
        let mut pool = ResourcePool::new();
        let targets = FrameTargets::new(&mut pool, &DescFactory, width, height);
        Self { pool, targets }
    }

    /// Runs the per-frame bookkeeping for `settings`. Returns the plan and
    /// whether the TAA stage would have been told to ignore history.
    fn frame(&mut self, settings: &RenderSettings) -> (FramePlan, Option<bool>) {
        let plan = FramePlan::build(settings);
        self.targets.provision(&mut self.pool, &DescFactory, &plan, settings);
        let reset = self.targets.taa().map(|h| h.needs_reset());
        self.targets.finish_frame(&plan);
        (plan, reset)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.targets.resize(&mut self.pool, &DescFactory, width, height);
    }
}

fn with_aa(antialias: AntiAliasMethod) -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.antialias = antialias;
    settings
}

// ============================================================================
// Lazy provisioning
// ============================================================================

#[test]
fn default_frame_allocates_only_white_occlusion() {
    let mut h = Harness::new(1280, 720);
    for _ in 0..3 {
        h.frame(&RenderSettings::default());
    }

    assert_eq!(h.pool.live_count(), 1);
    assert!(h.targets.bloom().is_none());
    assert!(h.targets.smaa().is_none());
    assert!(h.targets.taa().is_none());
    assert!(!h.targets.taa_active());
}

#[test]
fn bloom_is_allocated_on_first_use_and_kept() {
    let mut h = Harness::new(1280, 720);
    h.frame(&RenderSettings::default());
    assert!(h.targets.bloom().is_none());

    let mut settings = RenderSettings::default();
    settings.bloom.set_enabled(true);
    h.frame(&settings);

    let bloom = h.targets.bloom().unwrap();
    assert_eq!(bloom.range(), settings.bloom.range().min(max_bloom_range(1280, 720)));
    assert_eq!(h.pool.live_count(), 3);
    let chain = bloom.chain();

    // Disabled again: nothing is released or reallocated.
    h.frame(&RenderSettings::default());
    assert_eq!(h.pool.live_count(), 3);
    assert_eq!(h.targets.bloom().unwrap().chain(), chain);
}

#[test]
fn bloom_range_change_applies_at_next_bloom_frame() {
    let mut h = Harness::new(1280, 720);
    let mut settings = RenderSettings::default();
    settings.bloom.set_enabled(true);
    h.frame(&settings);

    settings.bloom.set_range(3);
    h.frame(&settings);

    let bloom = h.targets.bloom().unwrap();
    assert_eq!(bloom.range(), 3);
    assert_eq!(h.pool.get(bloom.chain()).unwrap().mip_level_count, 3);
    assert_eq!(h.pool.live_count(), 3);
}

#[test]
fn antialias_targets_are_allocated_per_method() {
    let mut h = Harness::new(800, 600);

    h.frame(&with_aa(AntiAliasMethod::Smaa));
    assert!(h.targets.smaa().is_some());
    assert!(h.targets.taa().is_none());
    assert_eq!(h.pool.live_count(), 1 + 4);

    h.frame(&with_aa(AntiAliasMethod::Taa));
    assert!(h.targets.smaa().is_some());
    assert!(h.targets.taa().is_some());
    assert_eq!(h.pool.live_count(), 1 + 4 + 2);
}

#[test]
fn ao_targets_follow_the_plan() {
    let mut h = Harness::new(640, 480);
    let mut settings = RenderSettings::default();
    settings.ao = AoMethod::Gtao;
    h.frame(&settings);

    assert!(h.targets.ao().is_allocated(AoMethod::Gtao));
    assert!(!h.targets.ao().is_allocated(AoMethod::Ssao));
}

// ============================================================================
// TAA history bookkeeping
// ============================================================================

#[test]
fn taa_history_advances_only_on_taa_frames() {
    let mut h = Harness::new(640, 360);
    let taa = with_aa(AntiAliasMethod::Taa);

    let resets: Vec<_> = (0..3).map(|_| h.frame(&taa).1).collect();
    assert_eq!(resets, [Some(true), Some(false), Some(false)]);
    let history = h.targets.taa().unwrap();
    assert_eq!(history.completed_frames(), 3);
    let parity = history.write_index();
    assert!(h.targets.taa_active());

    // Frames without TAA leave the history alone.
    for _ in 0..2 {
        h.frame(&RenderSettings::default());
    }
    let history = h.targets.taa().unwrap();
    assert_eq!(history.completed_frames(), 3);
    assert_eq!(history.write_index(), parity);
    assert!(!h.targets.taa_active());

    // Re-enabled: the first frame ignores stale history.
    let (_, reset) = h.frame(&taa);
    assert_eq!(reset, Some(true));
    let history = h.targets.taa().unwrap();
    assert_eq!(history.completed_frames(), 4);
    assert!(!history.needs_reset());
}

#[test]
fn debug_output_frame_skips_post_processing_targets() {
    let mut h = Harness::new(640, 360);
    let mut settings = with_aa(AntiAliasMethod::Taa);
    settings.bloom.set_enabled(true);
    settings.debug_output = DebugOutput::Velocity;

    let (plan, reset) = h.frame(&settings);
    assert_eq!(plan.antialias(), AntiAliasMethod::None);
    assert_eq!(reset, None);
    assert!(h.targets.taa().is_none());
    assert!(h.targets.bloom().is_none());
    assert_eq!(h.pool.live_count(), 1);
}

#[test]
fn debug_output_interrupts_taa() {
    let mut h = Harness::new(640, 360);
    let mut settings = with_aa(AntiAliasMethod::Taa);
    h.frame(&settings);
    h.frame(&settings);

    settings.debug_output = DebugOutput::Normal;
    h.frame(&settings);
    assert!(!h.targets.taa_active());
    assert_eq!(h.targets.taa().unwrap().completed_frames(), 2);

    settings.debug_output = DebugOutput::None;
    let (_, reset) = h.frame(&settings);
    assert_eq!(reset, Some(true));
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_touches_only_provisioned_targets() {
    let mut h = Harness::new(640, 360);
    h.resize(1920, 1080);
    assert_eq!(h.pool.live_count(), 1);
    assert_eq!(h.targets.extent(), (1920, 1080));

    // Allocated later at the new extent.
    let mut settings = RenderSettings::default();
    settings.bloom.set_enabled(true);
    h.frame(&settings);
    let bloom = h.targets.bloom().unwrap();
    let output = h.pool.get(bloom.output()).unwrap();
    assert_eq!((output.width, output.height), (1920, 1080));
}

#[test]
fn resize_keeps_taa_parity_and_resets_history() {
    let mut h = Harness::new(640, 360);
    let taa = with_aa(AntiAliasMethod::Taa);
    for _ in 0..3 {
        h.frame(&taa);
    }
    h.resize(320, 180);

    let history = h.targets.taa().unwrap();
    assert_eq!(history.write_index() as u64, history.completed_frames() % 2);
    let current = h.pool.get(history.current()).unwrap();
    assert_eq!((current.width, current.height), (320, 180));

    let (_, reset) = h.frame(&taa);
    assert_eq!(reset, Some(true));
}

#[test]
fn zero_resize_is_clamped() {
    let mut h = Harness::new(640, 360);
    h.resize(0, 0);
    assert_eq!(h.targets.extent(), (1, 1));
}

// ============================================================================
// Publishing
// ============================================================================

#[test]
fn publish_exposes_allocated_targets() {
    let mut h = Harness::new(640, 360);
    let mut settings = with_aa(AntiAliasMethod::Taa);
    settings.bloom.set_enabled(true);
    settings.ao = AoMethod::Ssao;
    let (plan, _) = h.frame(&settings);

    let mut table = ResourceTable::new();
    h.targets.publish(&plan, &mut table);
    for resource in [
        GraphResource::WhiteOcclusion,
        GraphResource::Occlusion,
        GraphResource::BloomChain,
        GraphResource::BloomOutput,
        GraphResource::TaaHistoryCurrent,
        GraphResource::TaaHistoryPrevious,
    ] {
        assert!(table.contains(resource), "{resource:?} not published");
    }
    assert!(!table.contains(GraphResource::SmaaOutput));
}

#[test]
fn minimal_frame_publishes_white_occlusion_only() {
    let mut h = Harness::new(640, 360);
    let (plan, _) = h.frame(&RenderSettings::default());

    let mut table = ResourceTable::new();
    h.targets.publish(&plan, &mut table);
    assert_eq!(table.len(), 1);
    assert!(table.contains(GraphResource::WhiteOcclusion));
}
