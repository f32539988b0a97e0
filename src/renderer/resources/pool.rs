//! Resource Pool
//!
//! Owns every render-target image the frame graph uses. Passes hold
//! [`TextureHandle`]s (generation-checked slotmap keys) to the textures they
//! produce; downstream passes resolve handles through a shared `&ResourcePool`
//! for the duration of one call and never keep the resolved reference.
//!
//! # Design
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  ResourcePool<T>                       │
//! │                                                        │
//! │  entries: SlotMap<TextureHandle, { desc, T }>          │
//! │                                                        │
//! │  allocate(factory, desc) → handle                      │
//! │  reallocate(factory, &mut [handle], f)  (group resize) │
//! │  release(handle)         (old handle resolves to None) │
//! │  get(handle) → &T        (execute phase, &self)        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! `T` is whatever the [`TextureFactory`] produces. `wgpu::Device` produces
//! [`GpuTexture`]; tests plug in a CPU factory to observe allocation without
//! a GPU.
//!
//! # Failure
//!
//! Texture creation cannot report failure synchronously in wgpu. An
//! out-of-memory condition reaches the device's uncaptured-error handler,
//! whose default behavior aborts the process.

use bitflags::bitflags;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

new_key_type! {
    /// Handle to a texture owned by a [`ResourcePool`].
    pub struct TextureHandle;
}

// ─── Descriptors ──────────────────────────────────────────────────────────────

/// Everything needed to (re)create a render-target image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl TextureDesc {
    #[must_use]
    pub fn new_2d(
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            label,
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
            mip_level_count: 1,
            format,
            usage,
        }
    }

    #[must_use]
    pub fn with_mips(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count.max(1);
        self
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }

    /// Dimensions of mip `level`, never below one texel.
    #[must_use]
    pub fn mip_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

/// Creates backing storage for a [`TextureDesc`].
pub trait TextureFactory {
    type Texture;

    fn allocate_texture(&self, desc: &TextureDesc) -> Self::Texture;
}

// ─── wgpu backing ─────────────────────────────────────────────────────────────

/// A GPU texture with its pre-built views.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    /// Full view (all mips, all aspects). Used for attachments.
    pub view: wgpu::TextureView,
    /// Depth-only view of a combined depth-stencil format, for sampling.
    depth_view: Option<wgpu::TextureView>,
    /// Single-level views, one per mip.
    mip_views: Vec<wgpu::TextureView>,
}

impl GpuTexture {
    /// View suitable for binding as a sampled texture.
    #[inline]
    #[must_use]
    pub fn sample_view(&self) -> &wgpu::TextureView {
        self.depth_view.as_ref().unwrap_or(&self.view)
    }

    /// View of a single mip level. Falls back to the full view when `level`
    /// is out of range.
    #[inline]
    #[must_use]
    pub fn mip_view(&self, level: u32) -> &wgpu::TextureView {
        self.mip_views.get(level as usize).unwrap_or(&self.view)
    }

    #[inline]
    #[must_use]
    pub fn mip_count(&self) -> u32 {
        self.mip_views.len() as u32
    }
}

impl TextureFactory for wgpu::Device {
    type Texture = GpuTexture;

    fn allocate_texture(&self, desc: &TextureDesc) -> GpuTexture {
        let texture = self.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: desc.extent(),
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            ..Default::default()
        });

        let depth_view = (desc.format.has_depth_aspect() && desc.format.has_stencil_aspect())
            .then(|| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(desc.label),
                    aspect: wgpu::TextureAspect::DepthOnly,
                    ..Default::default()
                })
            });

        let mip_views = (0..desc.mip_level_count)
            .map(|mip| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(desc.label),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        GpuTexture {
            texture,
            view,
            depth_view,
            mip_views,
        }
    }
}

// ─── Pool ─────────────────────────────────────────────────────────────────────

struct PoolEntry<T> {
    desc: TextureDesc,
    resource: T,
}

/// Arena of render-target textures.
pub struct ResourcePool<T> {
    entries: SlotMap<TextureHandle, PoolEntry<T>>,
    total_allocations: u64,
}

impl<T> Default for ResourcePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourcePool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            total_allocations: 0,
        }
    }

    /// Creates a texture and returns its handle.
    pub fn allocate<F>(&mut self, factory: &F, desc: TextureDesc) -> TextureHandle
    where
        F: TextureFactory<Texture = T> + ?Sized,
    {
        let resource = factory.allocate_texture(&desc);
        self.total_allocations += 1;
        log::debug!(
            "Allocated '{}' {}x{} {:?} ({} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            desc.mip_level_count
        );
        self.entries.insert(PoolEntry { desc, resource })
    }

    /// Frees a texture. Returns `false` if the handle was already stale.
    pub fn release(&mut self, handle: TextureHandle) -> bool {
        self.entries.remove(handle).is_some()
    }

    /// Recreates a group of textures in one step.
    ///
    /// `rewrite` maps each current descriptor to its replacement. All new
    /// textures are created before any old one is released, and every handle
    /// in `handles` is replaced, so the group never mixes generations.
    /// Stale handles in `handles` are left untouched.
    pub fn reallocate<F>(
        &mut self,
        factory: &F,
        handles: &mut [TextureHandle],
        rewrite: impl Fn(&TextureDesc) -> TextureDesc,
    ) where
        F: TextureFactory<Texture = T> + ?Sized,
    {
        let replacements: SmallVec<[Option<TextureDesc>; 8]> = handles
            .iter()
            .map(|h| self.entries.get(*h).map(|e| rewrite(&e.desc)))
            .collect();

        let created: SmallVec<[Option<TextureHandle>; 8]> = replacements
            .into_iter()
            .map(|desc| desc.map(|d| self.allocate(factory, d)))
            .collect();

        for (handle, new) in handles.iter_mut().zip(created) {
            if let Some(new) = new {
                self.release(*handle);
                *handle = new;
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: TextureHandle) -> Option<&T> {
        self.entries.get(handle).map(|e| &e.resource)
    }

    #[inline]
    #[must_use]
    pub fn desc(&self, handle: TextureHandle) -> Option<&TextureDesc> {
        self.entries.get(handle).map(|e| &e.desc)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Number of textures currently alive.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of textures ever created by this pool.
    #[inline]
    #[must_use]
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }
}

// ─── Attachment groups ────────────────────────────────────────────────────────

bitflags! {
    /// Selects which color slots of an [`AttachmentSet`] a draw writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttachmentMask: u8 {
        const SLOT_0 = 1 << 0;
        const SLOT_1 = 1 << 1;
        const SLOT_2 = 1 << 2;
        const SLOT_3 = 1 << 3;
        const SLOT_4 = 1 << 4;
        const SLOT_5 = 1 << 5;
        const SLOT_6 = 1 << 6;
        const SLOT_7 = 1 << 7;
    }
}

impl AttachmentMask {
    /// Mask with only `slot` set; `None` past slot 7.
    #[inline]
    #[must_use]
    pub fn slot(slot: usize) -> Option<Self> {
        (slot < 8).then(|| Self::from_bits_retain(1 << slot))
    }
}

/// Framebuffer equivalent: ordered color targets plus an optional
/// depth-stencil target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentSet {
    colors: SmallVec<[TextureHandle; 8]>,
    depth_stencil: Option<TextureHandle>,
}

impl AttachmentSet {
    #[must_use]
    pub fn new(colors: impl IntoIterator<Item = TextureHandle>, depth_stencil: Option<TextureHandle>) -> Self {
        Self {
            colors: colors.into_iter().collect(),
            depth_stencil,
        }
    }

    #[inline]
    #[must_use]
    pub fn colors(&self) -> &[TextureHandle] {
        &self.colors
    }

    #[inline]
    #[must_use]
    pub fn depth_stencil(&self) -> Option<TextureHandle> {
        self.depth_stencil
    }

    /// Color slots in order; slots outside `mask` are `None`.
    pub fn masked(&self, mask: AttachmentMask) -> impl Iterator<Item = Option<TextureHandle>> + '_ {
        self.colors
            .iter()
            .enumerate()
            .map(move |(i, h)| {
                AttachmentMask::slot(i)
                    .is_some_and(|bit| mask.contains(bit))
                    .then_some(*h)
            })
    }

    /// Every handle in the set, colors first.
    pub fn handles(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.colors.iter().copied().chain(self.depth_stencil)
    }
}

impl ResourcePool<GpuTexture> {
    /// Builds render pass color attachments for the masked subset of `set`.
    /// Masked slots become `None` so the pass layout still matches pipelines
    /// declared against the full set.
    pub fn color_attachments(
        &self,
        set: &AttachmentSet,
        mask: AttachmentMask,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 8]> {
        set.masked(mask)
            .map(|slot| {
                let texture = self.get(slot?)?;
                Some(wgpu::RenderPassColorAttachment {
                    view: &texture.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect()
    }
}
