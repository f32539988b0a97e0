//! Light Tests
//!
//! Tests for:
//! - Default sun parameters
//! - Light block packing and truncation
//! - Edge-triggered overflow reporting
//! - Shader layout of a single light

use glam::Vec3;
use lantern::renderer::uniforms::OverflowReport;
use lantern::scene::light::SHADER_LIGHTS_MAX;
use lantern::scene::{Light, LightBlock, LightType, ShaderLight};

fn point(i: usize) -> Light {
    Light::point(Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE, 1.0 + i as f32, 10.0)
}

// ============================================================================
// Default sun
// ============================================================================

#[test]
fn default_sun_is_dark_overhead_directional() {
    let sun = Light::default_sun();
    assert_eq!(sun.kind, LightType::Directional);
    assert_eq!(sun.position, Vec3::new(0.0, 10.0, 0.0));
    assert_eq!(sun.direction(), Vec3::NEG_Y);
    assert_eq!(sun.color, Vec3::ONE);
    assert_eq!(sun.intensity, 0.0);
    assert!(!sun.casts_shadow());
}

#[test]
fn direction_is_normalized() {
    let mut light = Light::directional(Vec3::new(0.0, -4.0, 3.0), Vec3::ONE, 1.0);
    assert!((light.direction().length() - 1.0).abs() < 1e-6);

    // Zero vectors keep the previous direction.
    let before = light.direction();
    light.set_direction(Vec3::ZERO);
    assert_eq!(light.direction(), before);
}

// ============================================================================
// Light block
// ============================================================================

#[test]
fn pack_preserves_order_under_capacity() {
    let lights: Vec<Light> = (0..5).map(point).collect();
    let (block, dropped) = LightBlock::pack(&lights);

    assert_eq!(dropped, 0);
    assert_eq!(block.count, 5);
    for (packed, light) in block.active().iter().zip(&lights) {
        assert_eq!(*packed, light.to_shader());
    }
}

#[test]
fn pack_truncates_past_capacity() {
    let lights: Vec<Light> = (0..SHADER_LIGHTS_MAX + 4).map(point).collect();
    let (block, dropped) = LightBlock::pack(&lights);

    assert_eq!(block.count as usize, SHADER_LIGHTS_MAX);
    assert_eq!(dropped, 4);
    // The first SHADER_LIGHTS_MAX lights survive.
    assert_eq!(block.active().last().unwrap().intensity, SHADER_LIGHTS_MAX as f32);
}

#[test]
fn empty_list_packs_empty_block() {
    let (block, dropped) = LightBlock::pack(std::iter::empty());
    assert_eq!(block.count, 0);
    assert_eq!(dropped, 0);
    assert!(block.active().is_empty());
}

#[test]
fn shader_light_layout() {
    assert_eq!(std::mem::size_of::<ShaderLight>(), 80);
    assert_eq!(std::mem::size_of::<ShaderLight>() % 16, 0);
    assert_eq!(std::mem::size_of::<LightBlock>() % 16, 0);

    let spot = Light::spot(Vec3::ONE, Vec3::NEG_Z, Vec3::X, 2.0, 7.0, 0.4).to_shader();
    assert_eq!(spot.light_type, LightType::Spot as u32);
    assert_eq!(spot.position.w, 1.0);
    assert_eq!(spot.direction.w, 0.0);
    assert_eq!(spot.range, 7.0);
    assert_eq!(spot.shadow_tile, -1);
}

// ============================================================================
// Overflow reporting
// ============================================================================

#[test]
fn overflow_reported_once_per_change() {
    let mut report = OverflowReport::default();

    assert!(!report.report("Lights", 0, SHADER_LIGHTS_MAX));
    assert!(report.report("Lights", 3, SHADER_LIGHTS_MAX));
    assert!(!report.report("Lights", 3, SHADER_LIGHTS_MAX));
    assert!(!report.report("Lights", 3, SHADER_LIGHTS_MAX));
    assert_eq!(report.dropped(), 3);

    assert!(report.report("Lights", 5, SHADER_LIGHTS_MAX));
    assert!(!report.report("Lights", 0, SHADER_LIGHTS_MAX));
    assert_eq!(report.dropped(), 0);
    assert!(report.report("Lights", 1, SHADER_LIGHTS_MAX));
}
