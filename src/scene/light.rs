//! Lights
//!
//! [`Light`] is the CPU-side description owned by the renderer's light list.
//! Each frame the list is packed into a fixed-capacity [`LightBlock`] uniform
//! (at most [`SHADER_LIGHTS_MAX`] entries) and the shadow-casting lights'
//! matrices into a [`LightSpaceBlock`] indexed by shadow tile.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use slotmap::SlotMap;
use smallvec::SmallVec;

use super::LightKey;
use crate::renderer::graph::shadow_utils::ShadowTile;

/// Capacity of the light uniform block.
pub const SHADER_LIGHTS_MAX: usize = 12;

/// Number of shadow tiles, i.e. shadow-casting directional lights.
pub const SHADOWED_DIRECTIONAL_LIGHTS_MAX: usize = 1;

/// Half extent of the orthographic box used for directional shadows.
pub const DIRECTIONAL_SHADOW_BOX: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightType {
    Spot = 0,
    Point = 1,
    Directional = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightType,
    pub position: Vec3,
    direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Attenuation range for point and spot lights. Negative means infinite.
    pub range: f32,
    /// Spot cone angle in radians.
    pub spot_angle: f32,
    pub shadow_strength: f32,
    pub(crate) shadow_tile: Option<ShadowTile>,
}

impl Light {
    #[must_use]
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightType::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            range: -1.0,
            spot_angle: 0.0,
            shadow_strength: 0.0,
            shadow_tile: None,
        }
    }

    #[must_use]
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightType::Point,
            position,
            direction: Vec3::NEG_Y,
            color,
            intensity,
            range,
            spot_angle: 0.0,
            shadow_strength: 0.0,
            shadow_tile: None,
        }
    }

    #[must_use]
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, range: f32, angle: f32) -> Self {
        Self {
            kind: LightType::Spot,
            position,
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            range,
            spot_angle: angle,
            shadow_strength: 0.0,
            shadow_tile: None,
        }
    }

    /// The light used when the scene provides none: a white sun overhead
    /// with zero intensity.
    #[must_use]
    pub fn default_sun() -> Self {
        let mut sun = Self::directional(Vec3::NEG_Y, Vec3::ONE, 0.0);
        sun.position = Vec3::new(0.0, 10.0, 0.0);
        sun
    }

    #[must_use]
    pub fn with_shadow(mut self, strength: f32) -> Self {
        self.shadow_strength = strength.max(0.0);
        self
    }

    #[inline]
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or(self.direction);
    }

    #[inline]
    #[must_use]
    pub fn shadow_tile(&self) -> Option<ShadowTile> {
        self.shadow_tile
    }

    /// Whether this light wants a shadow tile at registration.
    #[inline]
    #[must_use]
    pub fn wants_shadow(&self) -> bool {
        self.kind == LightType::Directional && self.shadow_strength > 0.0
    }

    /// Whether the shadow pass renders this light this frame.
    #[inline]
    #[must_use]
    pub fn casts_shadow(&self) -> bool {
        self.shadow_strength > 0.0 && self.shadow_tile.is_some()
    }

    /// World to light clip space for shadow rendering, reversed-Z.
    ///
    /// Only directional lights are supported: an orthographic box of
    /// ±[`DIRECTIONAL_SHADOW_BOX`] around the origin looking along the
    /// light direction.
    ///
    /// # Panics
    ///
    /// Point and spot lights have no light-space matrix.
    #[must_use]
    pub fn light_space_matrix(&self) -> Mat4 {
        match self.kind {
            LightType::Directional => {
                let up = if self.direction.x == 0.0 && self.direction.z == 0.0 {
                    Vec3::X
                } else {
                    Vec3::Y
                };
                let view = Mat4::look_to_rh(Vec3::ZERO, self.direction, up);
                let b = DIRECTIONAL_SHADOW_BOX;
                // near/far swapped: closest to the light maps to depth 1
                let projection = Mat4::orthographic_rh(-b, b, -b, b, b, -b);
                projection * view
            }
            LightType::Point | LightType::Spot => {
                unimplemented!("light-space matrix for {:?} lights", self.kind)
            }
        }
    }

    #[must_use]
    pub fn to_shader(&self) -> ShaderLight {
        ShaderLight {
            position: self.position.extend(1.0),
            direction: self.direction.extend(0.0),
            color: self.color.extend(1.0),
            intensity: self.intensity,
            range: self.range,
            spot_angle: self.spot_angle,
            light_type: self.kind as u32,
            shadow_strength: if self.casts_shadow() { self.shadow_strength } else { 0.0 },
            shadow_tile: self.shadow_tile.map_or(-1, |t| t.index() as i32),
            _pad: [0; 2],
        }
    }
}

// ============================================================================
// GPU layouts
// ============================================================================

/// One light as laid out in the light uniform block (80 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderLight {
    pub position: Vec4,
    pub direction: Vec4,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    pub spot_angle: f32,
    pub light_type: u32,
    pub shadow_strength: f32,
    /// `-1` when the light has no shadow tile.
    pub shadow_tile: i32,
    pub _pad: [u32; 2],
}

/// Lights uploaded for a frame: every registered light in key order, or
/// `fallback` alone when none are registered.
#[must_use]
pub fn lights_for_upload<'a>(
    lights: &'a SlotMap<LightKey, Light>,
    fallback: &'a Light,
) -> SmallVec<[&'a Light; SHADER_LIGHTS_MAX]> {
    if lights.is_empty() {
        SmallVec::from_elem(fallback, 1)
    } else {
        lights.values().collect()
    }
}

/// Fixed-capacity light list uniform.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightBlock {
    pub lights: [ShaderLight; SHADER_LIGHTS_MAX],
    pub count: u32,
    pub _pad: [u32; 3],
}

impl LightBlock {
    /// Packs `lights` in order, dropping everything past the capacity.
    ///
    /// Returns the block and the number of dropped lights.
    pub fn pack<'a>(lights: impl IntoIterator<Item = &'a Light>) -> (Self, usize) {
        let mut block = Self::zeroed();
        let mut dropped = 0;
        for light in lights {
            let slot = block.count as usize;
            if slot < SHADER_LIGHTS_MAX {
                block.lights[slot] = light.to_shader();
                block.count += 1;
            } else {
                dropped += 1;
            }
        }
        (block, dropped)
    }

    #[must_use]
    pub fn active(&self) -> &[ShaderLight] {
        &self.lights[..self.count as usize]
    }
}

/// Light-space matrices indexed by shadow tile.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightSpaceBlock {
    pub matrices: [Mat4; SHADOWED_DIRECTIONAL_LIGHTS_MAX],
}

impl LightSpaceBlock {
    /// Collects the matrices of every shadow-casting light into its tile slot.
    pub fn pack<'a>(lights: impl IntoIterator<Item = &'a Light>) -> Self {
        let mut block = Self::zeroed();
        for light in lights {
            if !light.casts_shadow() {
                continue;
            }
            if let Some(slot) = light
                .shadow_tile
                .and_then(|tile| block.matrices.get_mut(tile.index()))
            {
                *slot = light.light_space_matrix();
            }
        }
        block
    }
}
