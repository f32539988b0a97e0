//! G-Buffer
//!
//! The geometry pass writes six color targets and one combined depth-stencil
//! surface. They always share one extent and are created, resized and
//! released as a group.
//!
//! | Slot | Target | Format | Contents |
//! |------|--------|--------|----------|
//! | 0 | `Position` | Rgba32Float | world position, w = 1 where geometry |
//! | 1 | `BaseColor` | Rgba16Float | albedo, a = material flag |
//! | 2 | `MetallicOcclusion` | Rgba16Float | r = metallic, g = baked occlusion |
//! | 3 | `NormalRoughness` | Rgba16Float | world normal, a = roughness |
//! | 4 | `Emissive` | Rgba16Float | emitted radiance |
//! | 5 | `Velocity` | Rg16Float | screen-space motion, current − previous |
//! | - | depth-stencil | Depth24PlusStencil8 | reversed-Z depth, stencil 1 = geometry |

use super::pool::{AttachmentMask, AttachmentSet, ResourcePool, TextureDesc, TextureFactory, TextureHandle};

pub const GBUFFER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Stencil reference written wherever geometry is rasterized.
pub const GEOMETRY_STENCIL_REF: u32 = 1;

/// Color attachment bytes per sample used by the full G-buffer. Devices
/// must allow at least this much.
pub const GBUFFER_COLOR_BYTES_PER_SAMPLE: u32 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferTarget {
    Position,
    BaseColor,
    MetallicOcclusion,
    NormalRoughness,
    Emissive,
    Velocity,
}

impl GBufferTarget {
    pub const ALL: [Self; 6] = [
        Self::Position,
        Self::BaseColor,
        Self::MetallicOcclusion,
        Self::NormalRoughness,
        Self::Emissive,
        Self::Velocity,
    ];

    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Position => wgpu::TextureFormat::Rgba32Float,
            Self::Velocity => wgpu::TextureFormat::Rg16Float,
            Self::BaseColor | Self::MetallicOcclusion | Self::NormalRoughness | Self::Emissive => {
                wgpu::TextureFormat::Rgba16Float
            }
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Position => "GBuffer Position",
            Self::BaseColor => "GBuffer BaseColor",
            Self::MetallicOcclusion => "GBuffer MetallicOcclusion",
            Self::NormalRoughness => "GBuffer NormalRoughness",
            Self::Emissive => "GBuffer Emissive",
            Self::Velocity => "GBuffer Velocity",
        }
    }

    #[inline]
    #[must_use]
    pub fn mask(self) -> AttachmentMask {
        AttachmentMask::slot(self.slot()).unwrap_or(AttachmentMask::empty())
    }

    fn desc(self, width: u32, height: u32) -> TextureDesc {
        TextureDesc::new_2d(
            self.label(),
            width,
            height,
            self.format(),
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }
}

/// Every G-buffer color slot.
#[must_use]
pub fn full_mask() -> AttachmentMask {
    GBufferTarget::ALL
        .iter()
        .fold(AttachmentMask::empty(), |mask, t| mask | t.mask())
}

fn depth_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "GBuffer DepthStencil",
        width,
        height,
        GBUFFER_DEPTH_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

/// Handles to the G-buffer images. Owned by the geometry pass.
#[derive(Debug, Clone)]
pub struct GBuffer {
    /// Color targets in slot order, then depth-stencil.
    handles: [TextureHandle; 7],
    width: u32,
    height: u32,
}

impl GBuffer {
    const DEPTH: usize = 6;

    pub fn new<F>(pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32) -> Self
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (width.max(1), height.max(1));
        let handles = std::array::from_fn(|i| match GBufferTarget::ALL.get(i) {
            Some(target) => pool.allocate(factory, target.desc(width, height)),
            None => pool.allocate(factory, depth_desc(width, height)),
        });
        Self { handles, width, height }
    }

    /// Reallocates every image at the new extent. The old images are
    /// released; their handles become stale.
    pub fn resize<F>(&mut self, pool: &mut ResourcePool<F::Texture>, factory: &F, width: u32, height: u32)
    where
        F: TextureFactory + ?Sized,
    {
        let (width, height) = (width.max(1), height.max(1));
        pool.reallocate(factory, &mut self.handles, |desc| desc.clone().with_size(width, height));
        self.width = width;
        self.height = height;
    }

    /// Releases every image.
    pub fn destroy<T>(self, pool: &mut ResourcePool<T>) {
        for handle in self.handles {
            pool.release(handle);
        }
    }

    #[inline]
    #[must_use]
    pub fn target(&self, target: GBufferTarget) -> TextureHandle {
        self.handles[target.slot()]
    }

    #[inline]
    #[must_use]
    pub fn depth_stencil(&self) -> TextureHandle {
        self.handles[Self::DEPTH]
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// All seven handles, colors in slot order then depth-stencil.
    #[inline]
    #[must_use]
    pub fn handles(&self) -> &[TextureHandle] {
        &self.handles
    }

    #[must_use]
    pub fn attachments(&self) -> AttachmentSet {
        AttachmentSet::new(
            self.handles[..Self::DEPTH].iter().copied(),
            Some(self.depth_stencil()),
        )
    }

    /// Color target states for pipelines that write the full G-buffer.
    #[must_use]
    pub fn color_targets() -> [Option<wgpu::ColorTargetState>; 6] {
        GBufferTarget::ALL.map(|t| {
            Some(wgpu::ColorTargetState {
                format: t.format(),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
    }
}
