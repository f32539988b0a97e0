//! Shadow tile bookkeeping.
//!
//! The directional shadow map is an atlas of square tiles laid out
//! horizontally, one per shadow-casting directional light. Tiles are handed
//! out when a light is registered and returned when it is removed.

use rustc_hash::FxHashSet;

use crate::scene::light::SHADOWED_DIRECTIONAL_LIGHTS_MAX;
use crate::scene::{Light, LightKey, LightType};

/// Edge length of one shadow tile in texels.
pub const SHADOW_TILE_SIZE: u32 = 2048;

pub const SHADOW_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Index of a tile in the shadow atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShadowTile(u32);

impl ShadowTile {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Viewport origin of this tile in the atlas, in texels.
    #[inline]
    #[must_use]
    pub fn origin(self) -> (u32, u32) {
        (self.0 * SHADOW_TILE_SIZE, 0)
    }
}

/// Atlas extent for `tiles` tiles.
#[must_use]
pub fn shadow_atlas_size(tiles: usize) -> (u32, u32) {
    (SHADOW_TILE_SIZE * tiles.max(1) as u32, SHADOW_TILE_SIZE)
}

/// Bounds-checked tile assignment.
#[derive(Debug, Clone)]
pub struct ShadowTileAllocator {
    owners: [Option<LightKey>; SHADOWED_DIRECTIONAL_LIGHTS_MAX],
    /// Lights already told the atlas is full.
    refused: FxHashSet<LightKey>,
}

impl Default for ShadowTileAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowTileAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            owners: [None; SHADOWED_DIRECTIONAL_LIGHTS_MAX],
            refused: FxHashSet::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn allocated(&self) -> usize {
        self.owners.iter().filter(|o| o.is_some()).count()
    }

    /// Assigns the lowest free tile to `owner`.
    ///
    /// Returns `None` when every tile is taken; the light then renders
    /// without a shadow. The error is logged once per light, until it gets a
    /// tile or is forgotten. A light that already owns a tile gets the same
    /// tile back.
    pub fn allocate(&mut self, owner: LightKey) -> Option<ShadowTile> {
        if let Some(tile) = self.tile_of(owner) {
            return Some(tile);
        }
        let Some(index) = self.owners.iter().position(Option::is_none) else {
            if self.refused.insert(owner) {
                log::error!(
                    "Shadow tile limit reached ({} shadow-casting directional lights); light {owner:?} will not cast shadows",
                    self.capacity()
                );
            } else {
                log::debug!("Shadow tile still unavailable for light {owner:?}");
            }
            return None;
        };
        self.refused.remove(&owner);
        self.owners[index] = Some(owner);
        Some(ShadowTile(index as u32))
    }

    /// Light `owner` was refused a tile and has not had one since.
    #[must_use]
    pub fn is_refused(&self, owner: LightKey) -> bool {
        self.refused.contains(&owner)
    }

    /// Frees `tile`. Returns the previous owner.
    pub fn release(&mut self, tile: ShadowTile) -> Option<LightKey> {
        self.owners.get_mut(tile.index()).and_then(Option::take)
    }

    #[must_use]
    pub fn owner(&self, tile: ShadowTile) -> Option<LightKey> {
        self.owners.get(tile.index()).copied().flatten()
    }

    #[must_use]
    pub fn tile_of(&self, owner: LightKey) -> Option<ShadowTile> {
        self.owners
            .iter()
            .position(|o| *o == Some(owner))
            .map(|i| ShadowTile(i as u32))
    }

    /// Gives `light` a tile if it wants one. Lights past the tile limit keep
    /// rendering without a shadow.
    pub fn assign(&mut self, key: LightKey, light: &mut Light) {
        if light.kind != LightType::Directional {
            if light.shadow_strength > 0.0 {
                log::warn!("Only directional lights cast shadows; {:?} light {key:?} ignored", light.kind);
            }
            return;
        }
        if light.wants_shadow() {
            light.shadow_tile = self.allocate(key);
        }
    }

    /// Returns `light`'s tile, if any, and forgets an earlier refusal.
    pub fn revoke(&mut self, key: LightKey, light: &mut Light) {
        self.refused.remove(&key);
        if let Some(tile) = light.shadow_tile.take() {
            self.release(tile);
        }
    }
}
