//! Shadow Tests
//!
//! Tests for:
//! - Tile allocation bounds, overflow and remembered refusals
//! - Tile assignment on lights (directional only, strength > 0)
//! - Light-space matrix packing by tile
//! - Atlas layout

use glam::{Mat4, Vec3, Vec4};
use lantern::renderer::graph::ShadowTileAllocator;
use lantern::renderer::graph::shadow_utils::{SHADOW_TILE_SIZE, shadow_atlas_size};
use lantern::scene::light::SHADOWED_DIRECTIONAL_LIGHTS_MAX;
use lantern::scene::{Light, LightKey, LightSpaceBlock};
use slotmap::SlotMap;

fn keys(n: usize) -> Vec<LightKey> {
    let mut map: SlotMap<LightKey, ()> = SlotMap::with_key();
    (0..n).map(|_| map.insert(())).collect()
}

fn sun(strength: f32) -> Light {
    Light::directional(Vec3::new(-0.3, -1.0, -0.2), Vec3::ONE, 3.0).with_shadow(strength)
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn allocation_stays_within_capacity() {
    let mut allocator = ShadowTileAllocator::new();
    let keys = keys(SHADOWED_DIRECTIONAL_LIGHTS_MAX + 3);

    let tiles: Vec<_> = keys.iter().map(|k| allocator.allocate(*k)).collect();

    assert_eq!(tiles.iter().filter(|t| t.is_some()).count(), SHADOWED_DIRECTIONAL_LIGHTS_MAX);
    assert!(tiles[SHADOWED_DIRECTIONAL_LIGHTS_MAX..].iter().all(Option::is_none));
    assert_eq!(allocator.allocated(), allocator.capacity());
    for tile in tiles.into_iter().flatten() {
        assert!(tile.index() < SHADOWED_DIRECTIONAL_LIGHTS_MAX);
    }
}

#[test]
fn allocate_is_idempotent_per_owner() {
    let mut allocator = ShadowTileAllocator::new();
    let key = keys(1)[0];
    let first = allocator.allocate(key);
    assert_eq!(allocator.allocate(key), first);
    assert_eq!(allocator.allocated(), 1);
}

#[test]
fn released_tile_is_reused() {
    let mut allocator = ShadowTileAllocator::new();
    let keys = keys(2);
    let tile = allocator.allocate(keys[0]).unwrap();
    assert_eq!(allocator.allocate(keys[1]), None);

    assert_eq!(allocator.release(tile), Some(keys[0]));
    assert_eq!(allocator.owner(tile), None);
    assert_eq!(allocator.allocate(keys[1]), Some(tile));
    assert_eq!(allocator.tile_of(keys[1]), Some(tile));
}

// ============================================================================
// Assignment on lights
// ============================================================================

#[test]
fn shadowed_sun_gets_a_tile() {
    let mut allocator = ShadowTileAllocator::new();
    let key = keys(1)[0];
    let mut light = sun(1.0);

    allocator.assign(key, &mut light);

    assert!(light.casts_shadow());
    assert_eq!(light.shadow_tile().map(|t| t.index()), Some(0));
    assert_eq!(light.to_shader().shadow_tile, 0);
}

#[test]
fn zero_strength_and_point_lights_get_no_tile() {
    let mut allocator = ShadowTileAllocator::new();
    let keys = keys(2);

    let mut unshadowed = sun(0.0);
    allocator.assign(keys[0], &mut unshadowed);
    assert_eq!(unshadowed.shadow_tile(), None);

    let mut point = Light::point(Vec3::Y, Vec3::ONE, 1.0, 5.0).with_shadow(1.0);
    allocator.assign(keys[1], &mut point);
    assert_eq!(point.shadow_tile(), None);
    assert!(!point.casts_shadow());
    assert_eq!(allocator.allocated(), 0);
}

#[test]
fn overflowing_light_renders_unshadowed() {
    let mut allocator = ShadowTileAllocator::new();
    let keys = keys(SHADOWED_DIRECTIONAL_LIGHTS_MAX + 1);
    let mut lights: Vec<Light> = keys.iter().map(|_| sun(1.0)).collect();
    for (key, light) in keys.iter().zip(&mut lights) {
        allocator.assign(*key, light);
    }

    let extra = lights.last().unwrap();
    assert_eq!(extra.shadow_tile(), None);
    assert_eq!(extra.to_shader().shadow_tile, -1);
    assert_eq!(extra.to_shader().shadow_strength, 0.0);
}

#[test]
fn revoke_frees_the_tile() {
    let mut allocator = ShadowTileAllocator::new();
    let key = keys(1)[0];
    let mut light = sun(0.5);
    allocator.assign(key, &mut light);
    allocator.revoke(key, &mut light);
    assert_eq!(light.shadow_tile(), None);
    assert_eq!(allocator.allocated(), 0);
}

#[test]
fn refusal_is_remembered_until_a_tile_frees_up() {
    let mut allocator = ShadowTileAllocator::new();
    let keys = keys(SHADOWED_DIRECTIONAL_LIGHTS_MAX + 1);
    let mut lights: Vec<Light> = keys.iter().map(|_| sun(1.0)).collect();
    for (key, light) in keys.iter().zip(&mut lights) {
        allocator.assign(*key, light);
    }
    let extra = *keys.last().unwrap();
    assert!(allocator.is_refused(extra));
    assert!(!allocator.is_refused(keys[0]));

    // Repeated requests while full stay refused without changing state.
    for _ in 0..3 {
        let light = lights.last_mut().unwrap();
        allocator.assign(extra, light);
        assert_eq!(light.shadow_tile(), None);
    }
    assert!(allocator.is_refused(extra));
    assert_eq!(allocator.allocated(), allocator.capacity());

    // A freed tile goes to the waiting light and clears the refusal.
    allocator.revoke(keys[0], &mut lights[0]);
    let light = lights.last_mut().unwrap();
    allocator.assign(extra, light);
    assert!(light.shadow_tile().is_some());
    assert!(!allocator.is_refused(extra));
}

#[test]
fn revoke_forgets_a_refusal() {
    let mut allocator = ShadowTileAllocator::new();
    let keys = keys(SHADOWED_DIRECTIONAL_LIGHTS_MAX + 1);
    for key in &keys[..SHADOWED_DIRECTIONAL_LIGHTS_MAX] {
        allocator.allocate(*key);
    }
    let extra = *keys.last().unwrap();
    let mut light = sun(1.0);
    allocator.assign(extra, &mut light);
    assert!(allocator.is_refused(extra));

    allocator.revoke(extra, &mut light);
    assert!(!allocator.is_refused(extra));
}

// ============================================================================
// Light-space matrices
// ============================================================================

#[test]
fn light_space_block_fills_owned_tiles() {
    let mut allocator = ShadowTileAllocator::new();
    let key = keys(1)[0];
    let mut light = sun(1.0);
    allocator.assign(key, &mut light);

    let block = LightSpaceBlock::pack([&light]);
    assert_eq!(block.matrices[0], light.light_space_matrix());
}

#[test]
fn light_space_block_ignores_unshadowed_lights() {
    let lights = [sun(1.0), Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 3.0)];
    let block = LightSpaceBlock::pack(&lights);
    assert!(block.matrices.iter().all(|m| *m == Mat4::ZERO));
}

#[test]
fn directional_matrix_uses_reversed_depth() {
    let light = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);
    let m = light.light_space_matrix();
    // Looking straight down: higher points are closer to the light.
    let near = m * Vec4::new(0.0, 10.0, 0.0, 1.0);
    let far = m * Vec4::new(0.0, -10.0, 0.0, 1.0);
    assert!(near.z > far.z);
    assert!((0.0..=1.0).contains(&near.z) && (0.0..=1.0).contains(&far.z));
}

#[test]
#[should_panic]
fn point_light_has_no_light_space_matrix() {
    let _ = Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 3.0).light_space_matrix();
}

#[test]
#[should_panic]
fn spot_light_has_no_light_space_matrix() {
    let _ = Light::spot(Vec3::ZERO, Vec3::NEG_Z, Vec3::ONE, 1.0, 3.0, 0.5).light_space_matrix();
}

// ============================================================================
// Atlas
// ============================================================================

#[test]
fn atlas_is_a_row_of_tiles() {
    assert_eq!(shadow_atlas_size(1), (SHADOW_TILE_SIZE, SHADOW_TILE_SIZE));
    assert_eq!(shadow_atlas_size(3), (3 * SHADOW_TILE_SIZE, SHADOW_TILE_SIZE));
    assert_eq!(shadow_atlas_size(0), (SHADOW_TILE_SIZE, SHADOW_TILE_SIZE));
}
