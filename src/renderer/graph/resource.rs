//! Graph Resources
//!
//! Logical names for everything that flows between passes. The frame plan
//! speaks only in these names; the [`ResourceTable`] maps the texture-backed
//! ones to pool handles for the current frame.
//!
//! | Variant | Lifetime | Read-only in frame |
//! |---------|----------|--------------------|
//! | `FrameUniforms`, `ObjectUniforms`, `Bones`, `Lights`, `LightMatrices` | per frame | no |
//! | `GBuffer(_)`, `DepthStencil` | per frame | no |
//! | `ShadowMap` | per frame | no |
//! | `AoScratch`, `Occlusion` | per frame | no |
//! | `WhiteOcclusion` | persistent | yes |
//! | `Environment` | persistent | yes |
//! | `LitColor`, `BloomChain`, `BloomOutput`, `Smaa*` | per frame | no |
//! | `TaaHistoryPrevious` | persistent | yes |
//! | `TaaHistoryCurrent` | per frame | no |
//! | `PreviousFrameState` | persistent | no |
//! | `Surface` | per frame | no |

use rustc_hash::FxHashMap;

use crate::renderer::resources::gbuffer::GBufferTarget;
use crate::renderer::resources::{GpuTexture, ResourcePool, TextureHandle};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GraphResource {
    // --- Buffers ---
    FrameUniforms,
    ObjectUniforms,
    Bones,
    Lights,
    LightMatrices,

    // --- Geometry ---
    GBuffer(GBufferTarget),
    DepthStencil,
    ShadowMap,

    // --- Occlusion ---
    /// Intermediate AO image (raw SSAO or raw GTAO).
    AoScratch,
    /// Output of the selected AO method.
    Occlusion,
    /// 1×1 constant, used when no AO method runs.
    WhiteOcclusion,

    /// Skybox, irradiance and prefiltered cubes plus the BRDF lookup.
    Environment,

    // --- Color chain ---
    LitColor,
    TaaHistoryPrevious,
    TaaHistoryCurrent,
    BloomChain,
    BloomOutput,
    SmaaEdges,
    SmaaWeights,
    SmaaOutput,
    Surface,

    /// Previous-frame camera matrices and jitter, kept on the CPU.
    PreviousFrameState,
}

impl GraphResource {
    /// Every G-buffer color target, in slot order.
    pub const GBUFFER: [Self; 6] = [
        Self::GBuffer(GBufferTarget::Position),
        Self::GBuffer(GBufferTarget::BaseColor),
        Self::GBuffer(GBufferTarget::MetallicOcclusion),
        Self::GBuffer(GBufferTarget::NormalRoughness),
        Self::GBuffer(GBufferTarget::Emissive),
        Self::GBuffer(GBufferTarget::Velocity),
    ];

    /// Survives from one frame to the next, so it may be read before any
    /// pass of the current frame writes it.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(
            self,
            Self::Environment | Self::WhiteOcclusion | Self::TaaHistoryPrevious | Self::PreviousFrameState
        )
    }

    /// Must not be written by any pass during a frame.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Environment | Self::WhiteOcclusion | Self::TaaHistoryPrevious)
    }
}

/// Per-frame mapping from logical resources to pool textures.
#[derive(Debug, Default, Clone)]
pub struct ResourceTable {
    textures: FxHashMap<GraphResource, TextureHandle>,
}

impl ResourceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: GraphResource, handle: TextureHandle) {
        self.textures.insert(resource, handle);
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }

    #[inline]
    #[must_use]
    pub fn handle(&self, resource: GraphResource) -> Option<TextureHandle> {
        self.textures.get(&resource).copied()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, resource: GraphResource) -> bool {
        self.textures.contains_key(&resource)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Resolves `resource` to its texture for the duration of one call.
    #[inline]
    #[must_use]
    pub fn texture<'p>(&self, pool: &'p ResourcePool<GpuTexture>, resource: GraphResource) -> Option<&'p GpuTexture> {
        pool.get(self.handle(resource)?)
    }

    /// Sampling view of `resource` (depth-only for depth-stencil images).
    #[inline]
    #[must_use]
    pub fn view<'p>(
        &self,
        pool: &'p ResourcePool<GpuTexture>,
        resource: GraphResource,
    ) -> Option<&'p wgpu::TextureView> {
        self.texture(pool, resource).map(GpuTexture::sample_view)
    }
}
