//! Ambient Occlusion Target Tests
//!
//! Tests for:
//! - Lazy allocation per AO method
//! - SSAO / GTAO extents and formats
//! - White-occlusion fallback
//! - Resource table publication
//! - Resize of allocated targets

mod common;

use common::DescFactory;
use lantern::renderer::graph::passes::AoTargets;
use lantern::renderer::graph::passes::ao::{GTAO_FORMAT, SSAO_FORMAT, gtao_extent};
use lantern::renderer::graph::{GraphResource, ResourceTable};
use lantern::renderer::resources::{ResourcePool, TextureDesc};
use lantern::settings::AoMethod;

fn targets(width: u32, height: u32) -> (ResourcePool<TextureDesc>, AoTargets) {
    let mut pool = ResourcePool::new();
    let targets = AoTargets::new(&mut pool, &DescFactory, width, height);
    (pool, targets)
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn only_white_constant_exists_initially() {
    let (pool, ao) = targets(1280, 720);
    assert_eq!(pool.live_count(), 1);
    assert!(ao.is_allocated(AoMethod::None));
    assert!(!ao.is_allocated(AoMethod::Ssao));
    assert!(!ao.is_allocated(AoMethod::Gtao));

    let white = pool.get(ao.white()).unwrap();
    assert_eq!((white.width, white.height), (1, 1));
    assert_eq!(white.format, wgpu::TextureFormat::R8Unorm);
}

#[test]
fn selecting_none_allocates_nothing() {
    let (mut pool, mut ao) = targets(1280, 720);
    ao.select(&mut pool, &DescFactory, AoMethod::None);
    assert_eq!(pool.live_count(), 1);
    assert_eq!(ao.output(AoMethod::None), ao.white());
}

#[test]
fn ssao_is_full_resolution_r8() {
    let (mut pool, mut ao) = targets(1280, 720);
    ao.select(&mut pool, &DescFactory, AoMethod::Ssao);

    assert_eq!(pool.live_count(), 3);
    for handle in [ao.output(AoMethod::Ssao), ao.scratch(AoMethod::Ssao).unwrap()] {
        let desc = pool.get(handle).unwrap();
        assert_eq!((desc.width, desc.height), (1280, 720));
        assert_eq!(desc.format, SSAO_FORMAT);
        assert!(desc.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
    }
}

#[test]
fn gtao_is_half_resolution_storage_float() {
    let (mut pool, mut ao) = targets(1280, 720);
    ao.select(&mut pool, &DescFactory, AoMethod::Gtao);

    for handle in [ao.output(AoMethod::Gtao), ao.scratch(AoMethod::Gtao).unwrap()] {
        let desc = pool.get(handle).unwrap();
        assert_eq!((desc.width, desc.height), (640, 360));
        assert_eq!(desc.format, GTAO_FORMAT);
        assert_eq!(desc.format, wgpu::TextureFormat::R32Float);
        assert!(
            desc.usage
                .contains(wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING)
        );
    }
}

#[test]
fn gtao_extent_never_reaches_zero() {
    assert_eq!(gtao_extent(1, 1), (1, 1));
    assert_eq!(gtao_extent(3, 5), (1, 2));
}

#[test]
fn reselecting_does_not_reallocate() {
    let (mut pool, mut ao) = targets(320, 240);
    ao.select(&mut pool, &DescFactory, AoMethod::Ssao);
    let first = ao.output(AoMethod::Ssao);
    let allocations = pool.total_allocations();

    ao.select(&mut pool, &DescFactory, AoMethod::Ssao);
    assert_eq!(ao.output(AoMethod::Ssao), first);
    assert_eq!(pool.total_allocations(), allocations);
}

#[test]
fn switching_methods_keeps_both_sets() {
    let (mut pool, mut ao) = targets(320, 240);
    ao.select(&mut pool, &DescFactory, AoMethod::Ssao);
    ao.select(&mut pool, &DescFactory, AoMethod::Gtao);
    assert!(ao.is_allocated(AoMethod::Ssao));
    assert!(ao.is_allocated(AoMethod::Gtao));
    assert_eq!(pool.live_count(), 5);
}

#[test]
fn unallocated_method_falls_back_to_white() {
    let (_pool, ao) = targets(320, 240);
    assert_eq!(ao.output(AoMethod::Gtao), ao.white());
    assert_eq!(ao.scratch(AoMethod::Gtao), None);
}

// ============================================================================
// Publication
// ============================================================================

#[test]
fn publish_none_registers_only_white() {
    let (_pool, ao) = targets(320, 240);
    let mut table = ResourceTable::new();
    ao.publish(AoMethod::None, &mut table);

    assert_eq!(table.len(), 1);
    assert_eq!(table.handle(GraphResource::WhiteOcclusion), Some(ao.white()));
    assert!(!table.contains(GraphResource::Occlusion));
    assert!(!table.contains(GraphResource::AoScratch));
}

#[test]
fn publish_gtao_registers_output_and_scratch() {
    let (mut pool, mut ao) = targets(320, 240);
    ao.select(&mut pool, &DescFactory, AoMethod::Gtao);
    let mut table = ResourceTable::new();
    ao.publish(AoMethod::Gtao, &mut table);

    assert_eq!(table.handle(GraphResource::Occlusion), Some(ao.output(AoMethod::Gtao)));
    assert_eq!(table.handle(GraphResource::AoScratch), ao.scratch(AoMethod::Gtao));
    assert!(table.contains(GraphResource::WhiteOcclusion));
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_follows_extent_without_leaking() {
    let (mut pool, mut ao) = targets(320, 240);
    ao.select(&mut pool, &DescFactory, AoMethod::Ssao);
    ao.select(&mut pool, &DescFactory, AoMethod::Gtao);
    let white = ao.white();

    ao.resize(&mut pool, &DescFactory, 1000, 500);
    ao.resize(&mut pool, &DescFactory, 1000, 500);

    assert_eq!(pool.live_count(), 5);
    assert_eq!(ao.white(), white);
    let ssao = pool.get(ao.output(AoMethod::Ssao)).unwrap();
    assert_eq!((ssao.width, ssao.height), (1000, 500));
    let gtao = pool.get(ao.output(AoMethod::Gtao)).unwrap();
    assert_eq!((gtao.width, gtao.height), (500, 250));
}

#[test]
fn lazily_selected_method_uses_latest_extent() {
    let (mut pool, mut ao) = targets(320, 240);
    ao.resize(&mut pool, &DescFactory, 800, 600);
    ao.select(&mut pool, &DescFactory, AoMethod::Ssao);
    let desc = pool.get(ao.output(AoMethod::Ssao)).unwrap();
    assert_eq!((desc.width, desc.height), (800, 600));
}
