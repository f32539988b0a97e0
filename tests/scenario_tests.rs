//! End-to-end Scenario Tests
//!
//! Tests for:
//! - Single shadowed sun: tile assignment, light block and light-space block
//! - Default sun uploaded when no lights are registered
//! - Minimal configuration: resources published for a frame with every
//!   optional stage disabled
//!
//! Everything runs against a CPU texture factory; no GPU is needed.

mod common;

use common::DescFactory;
use glam::Vec3;
use lantern::renderer::graph::passes::{AoTargets, BloomTargets, TaaHistory};
use lantern::renderer::graph::{FramePlan, GraphResource, PassId, ResourceTable, ShadowTileAllocator};
use lantern::renderer::resources::{GBuffer, ResourcePool};
use lantern::scene::light::lights_for_upload;
use lantern::scene::{Light, LightBlock, LightKey, LightSpaceBlock};
use lantern::settings::{AntiAliasMethod, AoMethod, RenderSettings};
use slotmap::SlotMap;

// ============================================================================
// Single shadowed sun
// ============================================================================

#[test]
fn one_shadowed_sun() {
    let mut lights: SlotMap<LightKey, Light> = SlotMap::with_key();
    let mut allocator = ShadowTileAllocator::new();

    let key = lights.insert(Light::directional(Vec3::new(0.2, -1.0, 0.1), Vec3::ONE, 4.0).with_shadow(1.0));
    allocator.assign(key, &mut lights[key]);

    let sun = &lights[key];
    assert_eq!(sun.shadow_tile().map(|t| t.index()), Some(0));
    assert_eq!(allocator.owner(sun.shadow_tile().unwrap()), Some(key));

    let (block, dropped) = LightBlock::pack(lights.values());
    assert_eq!(dropped, 0);
    assert_eq!(block.count, 1);
    assert_eq!(block.lights[0].shadow_tile, 0);
    assert_eq!(block.lights[0].shadow_strength, 1.0);

    let matrices = LightSpaceBlock::pack(lights.values());
    assert_eq!(matrices.matrices[0], sun.light_space_matrix());

    let plan = FramePlan::build(&RenderSettings::default());
    assert!(plan.contains(PassId::Shadow));
    assert!(plan.get(PassId::LightingResolve).unwrap().reads(GraphResource::ShadowMap));
}

#[test]
fn empty_light_list_falls_back_to_default_sun() {
    let mut lights: SlotMap<LightKey, Light> = SlotMap::with_key();
    let fallback = Light::default_sun();

    let uploaded = lights_for_upload(&lights, &fallback);
    let (block, _) = LightBlock::pack(uploaded.iter().copied());
    assert_eq!(block.count, 1);
    assert_eq!(block.lights[0].intensity, 0.0);
    assert_eq!(block.lights[0].shadow_tile, -1);
    drop(uploaded);

    // Registered lights replace the fallback entirely.
    lights.insert(Light::point(Vec3::Y, Vec3::ONE, 2.0, 5.0));
    lights.insert(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
    let uploaded = lights_for_upload(&lights, &fallback);
    assert_eq!(uploaded.len(), 2);
    assert!(uploaded.iter().all(|l| !std::ptr::eq(*l, &fallback)));
}

// ============================================================================
// Minimal configuration
// ============================================================================

#[test]
fn minimal_configuration_frame() {
    let settings = RenderSettings::default();
    assert_eq!(settings.ao, AoMethod::None);
    assert_eq!(settings.antialias, AntiAliasMethod::None);
    assert!(!settings.bloom.enabled());

    let plan = FramePlan::build(&settings);
    assert_eq!(plan.validate(), Ok(()));

    let lighting = plan.get(PassId::LightingResolve).unwrap();
    assert!(lighting.reads(GraphResource::WhiteOcclusion));
    assert!(lighting.writes(GraphResource::LitColor));
    let composite = plan.get(PassId::FinalComposite).unwrap();
    assert_eq!(composite.color_input, Some(GraphResource::LitColor));
    assert!(composite.writes(GraphResource::Surface));

    let mut pool = ResourcePool::new();
    let mut ao = AoTargets::new(&mut pool, &DescFactory, 1280, 720);
    ao.select(&mut pool, &DescFactory, settings.ao);

    let mut table = ResourceTable::new();
    ao.publish(settings.ao, &mut table);
    assert_eq!(table.len(), 1);
    assert!(table.contains(GraphResource::WhiteOcclusion));
    assert!(!table.contains(GraphResource::Occlusion));
    // No AO images were created.
    assert_eq!(pool.live_count(), 1);
}

#[test]
fn every_read_is_published_for_full_configuration() {
    let mut settings = RenderSettings::default();
    settings.ao = AoMethod::Gtao;
    settings.antialias = AntiAliasMethod::Taa;
    settings.bloom.set_enabled(true);
    let plan = FramePlan::build(&settings);

    let (w, h) = (640, 360);
    let mut pool = ResourcePool::new();
    let gbuffer = GBuffer::new(&mut pool, &DescFactory, w, h);
    let mut ao = AoTargets::new(&mut pool, &DescFactory, w, h);
    ao.select(&mut pool, &DescFactory, settings.ao);
    let bloom = BloomTargets::new(&mut pool, &DescFactory, w, h, settings.bloom.range());
    let history = TaaHistory::new(&mut pool, &DescFactory, w, h);

    let mut table = ResourceTable::new();
    for resource in GraphResource::GBUFFER {
        if let GraphResource::GBuffer(target) = resource {
            table.insert(resource, gbuffer.target(target));
        }
    }
    table.insert(GraphResource::DepthStencil, gbuffer.depth_stencil());
    ao.publish(settings.ao, &mut table);
    bloom.publish(&mut table);
    history.publish(&mut table);

    for id in [PassId::Gtao, PassId::Taa, PassId::Bloom] {
        let pass = plan.get(id).unwrap();
        for read in &pass.reads {
            // Uniforms and the lit color image are published by other passes.
            if !matches!(read, GraphResource::FrameUniforms | GraphResource::LitColor) {
                assert!(table.contains(*read), "{id:?} reads unpublished {read:?}");
            }
        }
        for write in &pass.writes {
            assert!(table.contains(*write), "{id:?} writes unpublished {write:?}");
        }
    }
}
